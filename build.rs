fn main() {
    println!("cargo:rerun-if-env-changed=BADGE_CONFIG_JSON");

    // Host builds (tests, fuzzing) carry no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
