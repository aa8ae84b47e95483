//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                  | Connects to               |
//! |------------|-----------------------------|---------------------------|
//! | `hardware` | SensorPort, RelayPort       | ESP32 ADC, GPIO           |
//! |            | TimePort, WatchdogPort      | esp_timer, TWDT           |
//! | `log_sink` | OperatorPort                | Serial log output         |
//! | `nvs`      | StoragePort                 | NVS / in-memory store     |
//! | `time`     | TimePort                    | ESP32 system timer        |
//! | `sim`      | Board, OperatorPort         | Virtual clock (host only) |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
#[cfg(not(target_os = "espidf"))]
pub mod sim;
pub mod time;
