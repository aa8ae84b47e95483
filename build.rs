fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Only the firmware build needs the ESP-IDF environment; host tests
    // compile without the toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
