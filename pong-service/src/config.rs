use std::env;
use std::net::SocketAddr;
use std::time::Duration;

pub const DEFAULT_BIND: &str = "0.0.0.0:8081";
pub const DEFAULT_WORK_DELAY_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("PONG_BIND must be a socket address, got {0:?}")]
    InvalidBind(String),
    #[error("PONG_WORK_DELAY_MS must be a non-negative integer, got {0:?}")]
    InvalidDelay(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongConfig {
    pub bind_addr: SocketAddr,
    /// How long an admitted request holds the permit
    pub work_delay: Duration,
}

impl Default for PongConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8081)),
            work_delay: Duration::from_millis(DEFAULT_WORK_DELAY_MS),
        }
    }
}

impl PongConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup("PONG_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr = bind
            .trim()
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidBind(bind.clone()))?;

        let work_delay = match lookup("PONG_WORK_DELAY_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::InvalidDelay(raw))?,
            None => Duration::from_millis(DEFAULT_WORK_DELAY_MS),
        };

        Ok(Self {
            bind_addr,
            work_delay,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = PongConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, PongConfig::default());
        assert_eq!(config.bind_addr.port(), 8081);
        assert_eq!(config.work_delay, Duration::from_secs(1));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = PongConfig::from_lookup(|key| match key {
            "PONG_BIND" => Some("127.0.0.1:9000".to_string()),
            "PONG_WORK_DELAY_MS" => Some(" 0 ".to_string()),
            _ => None,
        })
        .unwrap();

        assert_eq!(config.bind_addr, "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.work_delay, Duration::ZERO);
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert_eq!(
            PongConfig::from_lookup(|key| (key == "PONG_BIND").then(|| "localhost".to_string())),
            Err(ConfigError::InvalidBind("localhost".to_string()))
        );
        assert_eq!(
            PongConfig::from_lookup(|key| {
                (key == "PONG_WORK_DELAY_MS").then(|| "-5".to_string())
            }),
            Err(ConfigError::InvalidDelay("-5".to_string()))
        );
    }
}
