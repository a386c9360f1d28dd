use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{Error, InternalResult};

/// Configuration of the dispatch core. Everything defaults so an empty
/// config document is valid; the engine server is opt-in and its presence
/// changes command discovery (the register command only appears when it is
/// configured).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServerConfig {
    #[serde(default)]
    pub engine_server: Option<EngineServerConfig>,

    #[serde(default)]
    pub platform: PlatformConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineServerConfig {
    pub url: String,

    #[serde(default = "default_engine_timeout", with = "duration_ms")]
    pub request_timeout: Duration,
}

/// Extension hooks threaded into plan generation for the execution platform.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    #[serde(default)]
    pub router_extensions: Vec<String>,

    #[serde(default)]
    pub plan_transformers: Vec<String>,
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> InternalResult<Self> {
        let file = File::open(path.as_ref())
            .map_err(|e| Error::internal(format!("failed to open config file: {}", e)))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .map_err(|e| Error::internal(format!("failed to parse config file: {}", e)))
    }

    pub fn engine_server_configured(&self) -> bool {
        self.engine_server.is_some()
    }
}

fn default_engine_timeout() -> Duration {
    Duration::from_millis(30000)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert!(!config.engine_server_configured());
        assert!(config.platform.router_extensions.is_empty());
    }

    #[test]
    fn test_engine_server_config() {
        let config: ServerConfig = serde_json::from_str(
            r#"{"engine_server": {"url": "http://localhost:6300", "request_timeout": 5000}}"#,
        )
        .unwrap();
        let engine = config.engine_server.as_ref().unwrap();
        assert_eq!(engine.url, "http://localhost:6300");
        assert_eq!(engine.request_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_engine_timeout_defaults() {
        let config: ServerConfig =
            serde_json::from_str(r#"{"engine_server": {"url": "http://localhost:6300"}}"#).unwrap();
        assert_eq!(
            config.engine_server.unwrap().request_timeout,
            Duration::from_millis(30000)
        );
    }
}
