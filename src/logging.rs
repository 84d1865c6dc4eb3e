//! Console logging setup.

use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::TryInitError;

/// Parses a level name, falling back to `info`.
pub fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "off" | "error" => Level::ERROR,
        "warn" => Level::WARN,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    }
}

fn env_filter(default: Level) -> EnvFilter {
    // RUST_LOG overrides the default
    EnvFilter::builder()
        .with_default_directive(default.into())
        .from_env_lossy()
}

/// Installs a global fmt subscriber at `info`.
///
/// # Panics
///
/// Panics if a global subscriber is already set. Use [`try_init`] where
/// that can happen, such as in tests.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(Level::INFO))
        .with_target(true)
        .init();
}

/// Like [`init`] with a default level, returning an error instead of
/// panicking when a subscriber already exists.
pub fn try_init(default: Level) -> Result<(), TryInitError> {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    tracing_subscriber::registry()
        .with(env_filter(default))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("off"), Level::ERROR);
        assert_eq!(parse_level("verbose"), Level::INFO);
    }

    #[test]
    fn test_try_init_twice() {
        // the first call may lose to another test in this binary
        let _ = try_init(Level::DEBUG);
        assert!(try_init(Level::DEBUG).is_err());
    }
}
