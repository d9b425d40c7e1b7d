//! Frontend configuration

use stride_core::StrideConfig;
use tracing::Level;

/// Session configuration for the browser build
pub struct SessionConfig;

impl SessionConfig {
    /// TOML overrides baked in at build time through `STRIDE_CONFIG`
    pub const EMBEDDED_TOML: Option<&'static str> = option_env!("STRIDE_CONFIG");

    /// Console log level
    pub const LOG_LEVEL: Level = Level::INFO;

    /// Defaults, overridden by the embedded TOML when present
    pub fn load() -> StrideConfig {
        let Some(toml) = Self::EMBEDDED_TOML else {
            return StrideConfig::default();
        };
        StrideConfig::from_toml(toml).unwrap_or_else(|e| {
            tracing::warn!("Ignoring embedded session configuration: {}", e);
            StrideConfig::default()
        })
    }
}
