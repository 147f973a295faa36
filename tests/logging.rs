use ote::core::log::init_logging;
use tracing::Level;

// Installs the global subscriber, so it lives in its own test binary
#[test]
fn test_rust_log_enables_debug_without_verbose() {
    // SAFETY: the only test in this binary, no other thread reads the environment
    unsafe { std::env::set_var("RUST_LOG", "debug") };
    init_logging(false, false);

    assert!(tracing::enabled!(target: "ote::providers::ote", Level::DEBUG));
    assert!(tracing::enabled!(Level::INFO));
}
