fn main() {
    // Host builds (tests, fuzzing) need no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
