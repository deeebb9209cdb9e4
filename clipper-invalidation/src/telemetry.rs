//! Tracing subscriber initialization.

use clipper_core::{ClipperError, ClipperResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "clipper_invalidation=debug,clipper_storage=info,info";

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json: std::env::var("CLIPPER_LOG_JSON")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(false),
            default_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Call once at startup. `RUST_LOG` takes precedence over
/// `config.default_filter`.
pub fn init_tracing(config: &TelemetryConfig) -> ClipperResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_filter))
        .map_err(|e| ClipperError::internal(format!("Invalid log filter: {}", e)))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    result.map_err(|e| ClipperError::internal(format!("Failed to init subscriber: {}", e)))?;

    tracing::info!(json = config.json, "Telemetry initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvVarGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvVarGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let original = std::env::var(key).ok();
            match value {
                Some(v) => std::env::set_var(key, v),
                None => std::env::remove_var(key),
            }
            Self { key, original }
        }
    }

    impl Drop for EnvVarGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(v) => std::env::set_var(self.key, v),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    fn test_telemetry_config_reads_json_flag() {
        {
            let _guard = EnvVarGuard::set("CLIPPER_LOG_JSON", Some("1"));
            assert!(TelemetryConfig::default().json);
        }
        {
            let _guard = EnvVarGuard::set("CLIPPER_LOG_JSON", Some("no"));
            assert!(!TelemetryConfig::default().json);
        }
        let _guard = EnvVarGuard::set("CLIPPER_LOG_JSON", None);
        let config = TelemetryConfig::default();
        assert!(!config.json);
        assert_eq!(config.default_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_init_tracing_twice_fails() {
        let config = TelemetryConfig {
            json: false,
            default_filter: "warn".to_string(),
        };
        let _ = init_tracing(&config);
        assert!(init_tracing(&config).is_err());
    }
}
