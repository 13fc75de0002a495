//! Logging helpers
//!
//! The library only emits through the `log` facade; binaries call
//! [`init_logger`] once at startup.

/// Initialise env_logger, using `level` when `RUST_LOG` is unset
///
/// Calling it a second time is a no-op.
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    let _ = env_logger::Builder::from_env(env).try_init();
}
