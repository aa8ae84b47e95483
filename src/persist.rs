//! Persisted layout and the config record store.
//!
//! ```text
//!  namespace "genctl"
//!  ├── cfg      GenConfig (postcard, tagged "GENCTL" v4)
//!  ├── loghdr   LogHeader {count, newest, oldest}
//!  ├── log0
//!  ├── log1     LogEntry slots
//!  └── ...
//! ```
//!
//! A config that fails its tag check, does not decode, or holds an
//! out-of-range field is never repaired: the whole record is replaced
//! with defaults and the caller is told to clear the event log.

use log::{info, warn};

use crate::app::ports::{ConfigError, StorageError, StoragePort};
use crate::config::GenConfig;

pub const NAMESPACE: &str = "genctl";
pub const CONFIG_KEY: &str = "cfg";
pub const LOG_HEADER_KEY: &str = "loghdr";

/// Bytes reserved for the config record.
pub const CONFIG_RECORD_BYTES: usize = 64;
/// Bytes reserved for the log header.
pub const LOG_HEADER_BYTES: usize = 16;
/// Bytes reserved for one log entry slot (including NVS per-key overhead
/// rounded into the slot).
pub const LOG_ENTRY_BYTES: usize = 48;

/// Number of log slots that fit in a store of `store_bytes`.
pub fn log_capacity_for(store_bytes: usize) -> usize {
    (store_bytes.saturating_sub(CONFIG_RECORD_BYTES + LOG_HEADER_BYTES) / LOG_ENTRY_BYTES).max(1)
}

/// How the config was obtained at boot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoad {
    /// A valid record was read back.
    Loaded(GenConfig),
    /// Nothing stored yet.  Defaults were written.
    FirstBoot(GenConfig),
    /// The stored record was unusable.  Defaults were written; the event
    /// log must be cleared.
    Reinitialised(GenConfig, ConfigError),
}

/// Loads and saves [`GenConfig`] through a [`StoragePort`].
pub struct ConfigStore;

impl ConfigStore {
    /// Load the config, replacing an unusable record with defaults.
    pub fn load(storage: &mut dyn StoragePort) -> ConfigLoad {
        match Self::read(storage) {
            Ok(cfg) => {
                info!("ConfigStore: loaded config");
                ConfigLoad::Loaded(cfg)
            }
            Err(ConfigError::NotFound) => {
                info!("ConfigStore: no stored config, writing defaults");
                let cfg = GenConfig::default();
                if let Err(e) = Self::save(storage, &cfg) {
                    warn!("ConfigStore: default save failed: {}", e);
                }
                ConfigLoad::FirstBoot(cfg)
            }
            Err(e) => {
                warn!("ConfigStore: {}, reinitialising to defaults", e);
                let cfg = GenConfig::default();
                if let Err(e) = Self::save(storage, &cfg) {
                    warn!("ConfigStore: default save failed: {}", e);
                }
                ConfigLoad::Reinitialised(cfg, e)
            }
        }
    }

    /// Validate and persist.
    pub fn save(storage: &mut dyn StoragePort, cfg: &GenConfig) -> Result<(), ConfigError> {
        cfg.validate()?;
        let bytes = postcard::to_allocvec(cfg).map_err(|_| StorageError::Codec)?;
        if bytes.len() > CONFIG_RECORD_BYTES {
            return Err(ConfigError::Storage(StorageError::Full));
        }
        storage.write(NAMESPACE, CONFIG_KEY, &bytes)?;
        Ok(())
    }

    fn read(storage: &dyn StoragePort) -> Result<GenConfig, ConfigError> {
        let mut buf = [0u8; CONFIG_RECORD_BYTES];
        let len = match storage.read(NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(len) => len,
            Err(StorageError::NotFound) => return Err(ConfigError::NotFound),
            Err(e) => return Err(e.into()),
        };
        let cfg: GenConfig =
            postcard::from_bytes(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
        if !cfg.has_current_tag() {
            return Err(ConfigError::Corrupted);
        }
        cfg.validate().map_err(|_| ConfigError::Corrupted)?;
        Ok(cfg)
    }
}
