use crate::schedule::{ScheduleAssignment, ScheduleError};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_RPS_LIMIT: u32 = 2;
pub const DEFAULT_PONG_BASE_URL: &str = "http://localhost:8081";
pub const DEFAULT_RATE_LIMIT_FILE: &str = "rate-limit.lock";
pub const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} must be a positive integer, got {value:?}")]
    NotPositive { name: &'static str, value: String },
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

/// Startup configuration of one caller process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingConfig {
    /// 1-based ordinal of this machine within the fleet
    pub machine_id: u32,
    pub total_machines: u32,
    /// Admissions shared by the whole fleet per wall-clock second
    pub rps_limit: u32,
    pub pong_base_url: String,
    /// Shared record consulted by every caller on the host
    pub rate_limit_file: PathBuf,
    pub request_timeout: Duration,
}

impl PingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).map(|v| v.trim().to_string());

        let machine_id = required_positive(&lookup, "MACHINE_ID")?;
        let total_machines = required_positive(&lookup, "TOTAL_MACHINES")?;
        let rps_limit = optional_positive(&lookup, "RPS_LIMIT")?.unwrap_or(DEFAULT_RPS_LIMIT);

        let pong_base_url = match lookup("PONG_BASE_URL") {
            Some(url) if url.is_empty() => return Err(ConfigError::Empty("PONG_BASE_URL")),
            Some(url) => url.trim_end_matches('/').to_string(),
            None => DEFAULT_PONG_BASE_URL.to_string(),
        };

        let rate_limit_file = match lookup("RATE_LIMIT_FILE") {
            Some(path) if path.is_empty() => return Err(ConfigError::Empty("RATE_LIMIT_FILE")),
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_RATE_LIMIT_FILE),
        };

        let timeout_ms = optional_positive(&lookup, "PING_TIMEOUT_MS")?
            .map(u64::from)
            .unwrap_or(DEFAULT_TIMEOUT_MS);

        // Reject an id outside the fleet before anything starts.
        ScheduleAssignment::new(machine_id, total_machines)?;

        Ok(Self {
            machine_id,
            total_machines,
            rps_limit,
            pong_base_url,
            rate_limit_file,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }

    pub fn assignment(&self) -> Result<ScheduleAssignment, ScheduleError> {
        ScheduleAssignment::new(self.machine_id, self.total_machines)
    }

    pub fn ping_url(&self) -> String {
        format!("{}/ping", self.pong_base_url)
    }
}

fn required_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<u32, ConfigError> {
    optional_positive(lookup, name)?.ok_or(ConfigError::Missing(name))
}

fn optional_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u32>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    match raw.parse::<u32>() {
        Ok(value) if value > 0 => Ok(Some(value)),
        _ => Err(ConfigError::NotPositive { name, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<PingConfig, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PingConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_identity_is_set() {
        let config = config(&[("MACHINE_ID", "2"), ("TOTAL_MACHINES", "3")]).unwrap();

        assert_eq!(config.machine_id, 2);
        assert_eq!(config.total_machines, 3);
        assert_eq!(config.rps_limit, 2);
        assert_eq!(config.pong_base_url, "http://localhost:8081");
        assert_eq!(config.rate_limit_file, PathBuf::from("rate-limit.lock"));
        assert_eq!(config.request_timeout, Duration::from_millis(5_000));
        assert_eq!(config.ping_url(), "http://localhost:8081/ping");
    }

    #[test]
    fn overrides_are_trimmed_and_applied() {
        let config = config(&[
            ("MACHINE_ID", " 1 "),
            ("TOTAL_MACHINES", "1"),
            ("RPS_LIMIT", "5"),
            ("PONG_BASE_URL", "http://pong:9000/"),
            ("RATE_LIMIT_FILE", "/var/run/ping/rate.bin"),
            ("PING_TIMEOUT_MS", "250"),
        ])
        .unwrap();

        assert_eq!(config.machine_id, 1);
        assert_eq!(config.rps_limit, 5);
        assert_eq!(config.ping_url(), "http://pong:9000/ping");
        assert_eq!(config.rate_limit_file, PathBuf::from("/var/run/ping/rate.bin"));
        assert_eq!(config.request_timeout, Duration::from_millis(250));
    }

    #[test]
    fn machine_identity_is_required() {
        assert_eq!(
            config(&[("TOTAL_MACHINES", "2")]),
            Err(ConfigError::Missing("MACHINE_ID"))
        );
        assert_eq!(
            config(&[("MACHINE_ID", "1")]),
            Err(ConfigError::Missing("TOTAL_MACHINES"))
        );
    }

    #[test]
    fn zero_and_garbage_are_rejected() {
        assert!(matches!(
            config(&[("MACHINE_ID", "0"), ("TOTAL_MACHINES", "2")]),
            Err(ConfigError::NotPositive { name: "MACHINE_ID", .. })
        ));
        assert!(matches!(
            config(&[("MACHINE_ID", "1"), ("TOTAL_MACHINES", "2"), ("RPS_LIMIT", "two")]),
            Err(ConfigError::NotPositive { name: "RPS_LIMIT", .. })
        ));
    }

    #[test]
    fn machine_id_must_fit_in_fleet() {
        assert_eq!(
            config(&[("MACHINE_ID", "4"), ("TOTAL_MACHINES", "3")]),
            Err(ConfigError::Schedule(ScheduleError::MachineOutOfRange {
                machine_id: 4,
                total_machines: 3,
            }))
        );
    }

    #[test]
    fn blank_url_is_rejected() {
        assert_eq!(
            config(&[("MACHINE_ID", "1"), ("TOTAL_MACHINES", "1"), ("PONG_BASE_URL", "  ")]),
            Err(ConfigError::Empty("PONG_BASE_URL"))
        );
    }
}
