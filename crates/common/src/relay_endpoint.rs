use tracing::info;
use url::Url;

use crate::ConfigError;

/// Remote relay endpoint, configured as `URL;ssz=<bool>;gzip=<bool>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEndpointConfig {
    pub endpoint: Url,
    pub ssz_enabled: bool,
    pub gzip_enabled: bool,
}

impl RelayEndpointConfig {
    /// Missing flags default to false. Malformed flag values are logged and also read as false.
    pub fn parse(config: &str) -> Result<Self, ConfigError> {
        let mut parts = config.split(';');
        let endpoint = parts.next().unwrap_or_default().trim();
        if endpoint.is_empty() {
            return Err(ConfigError::EmptyRelayEndpoint);
        }

        let endpoint = Url::parse(endpoint).map_err(|err| ConfigError::InvalidRelayUrl {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        })?;

        let mut ssz_enabled = false;
        let mut gzip_enabled = false;

        for part in parts {
            if let Some(value) = part.strip_prefix("ssz=") {
                ssz_enabled = parse_flag(value).unwrap_or_else(|| {
                    info!(%endpoint, value, "invalid ssz config for relay");
                    false
                });
            } else if let Some(value) = part.strip_prefix("gzip=") {
                gzip_enabled = parse_flag(value).unwrap_or_else(|| {
                    info!(%endpoint, value, "invalid gzip config for relay");
                    false
                });
            }
        }

        Ok(Self { endpoint, ssz_enabled, gzip_enabled })
    }
}

/// Accepts the usual single letter, numeric and spelled out forms.
fn parse_flag(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
