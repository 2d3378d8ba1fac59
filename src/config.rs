use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default (and default maximum) execution timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
/// Default bound on combined captured output, in bytes.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10_000;
/// Delay between the graceful terminate signal and the forced kill.
const DEFAULT_GRACE_MS: u64 = 500;

/// Isolation strategy selection, resolved once at engine startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationMode {
    /// Prefer process isolation, fall back to the thread strategy only when
    /// no runner binary can be resolved.
    #[default]
    Auto,
    Process,
    Thread,
}

/// Read-only engine configuration, shared by every request.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound (and default) for a request's timeout, in seconds.
    pub max_timeout_secs: u64,
    /// Maximum combined captured output, in bytes.
    pub max_output_bytes: usize,
    /// Grace period between terminate and kill under process isolation.
    pub grace_period: Duration,
    pub isolation: IsolationMode,
    /// Binary spawned in child mode by process isolation; the current
    /// executable when unset.
    pub runner_bin: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            grace_period: Duration::from_millis(DEFAULT_GRACE_MS),
            isolation: IsolationMode::default(),
            runner_bin: None,
        }
    }
}

impl EngineConfig {
    /// Loads the environment-provided knobs, keeping defaults for the rest.
    ///
    /// `EXECUTION_TIMEOUT` is the maximum execution timeout in seconds,
    /// `MAX_OUTPUT_SIZE` the output bound in bytes.
    pub fn from_env() -> Self {
        Self {
            max_timeout_secs: env_value("EXECUTION_TIMEOUT", DEFAULT_TIMEOUT_SECS).max(1),
            max_output_bytes: env_value("MAX_OUTPUT_SIZE", DEFAULT_MAX_OUTPUT_BYTES),
            ..Self::default()
        }
    }

    /// Resolves a request timeout against the configured bound.
    ///
    /// `None` means the full bound; explicit values are clamped into
    /// `[1, max_timeout_secs]`.
    pub fn clamp_timeout(&self, requested: Option<u64>) -> u64 {
        match requested {
            None => self.max_timeout_secs,
            Some(secs) => {
                let clamped = secs.clamp(1, self.max_timeout_secs);
                if clamped != secs {
                    log::warn!(
                        "requested timeout {secs}s outside [1, {}], clamped to {clamped}s",
                        self.max_timeout_secs
                    );
                }
                clamped
            }
        }
    }
}

fn env_value<T: FromStr + Copy>(key: &str, fallback: T) -> T {
    parse_value(std::env::var(key).ok().as_deref(), fallback)
}

fn parse_value<T: FromStr + Copy>(raw: Option<&str>, fallback: T) -> T {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_timeout_secs, 10);
        assert_eq!(config.max_output_bytes, 10_000);
        assert_eq!(config.isolation, IsolationMode::Auto);
        assert!(config.runner_bin.is_none());
    }

    #[test]
    fn test_parse_value_fallbacks() {
        assert_eq!(parse_value::<u64>(None, 10), 10);
        assert_eq!(parse_value::<u64>(Some("garbage"), 10), 10);
        assert_eq!(parse_value::<u64>(Some(""), 10), 10);
        assert_eq!(parse_value::<u64>(Some(" 25 "), 10), 25);
        assert_eq!(parse_value::<usize>(Some("4096"), 1), 4096);
    }

    #[test]
    fn test_clamp_timeout() {
        let config = EngineConfig::default();
        assert_eq!(config.clamp_timeout(None), 10);
        assert_eq!(config.clamp_timeout(Some(5)), 5);
        assert_eq!(config.clamp_timeout(Some(0)), 1);
        assert_eq!(config.clamp_timeout(Some(1)), 1);
        assert_eq!(config.clamp_timeout(Some(10)), 10);
        assert_eq!(config.clamp_timeout(Some(9999)), 10);
    }
}
