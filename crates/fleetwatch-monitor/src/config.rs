use crate::connection::{
    ConnectionPolicy, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY,
    DEFAULT_SIMULATOR_GRACE,
};
use crate::monitor::MonitorSettings;
use crate::simulator::SimulatorConfig;
use clap::Parser;
use fleetwatch_core::protocol::DEFAULT_MAX_FRAME_BYTES;
use fleetwatch_core::{default_roster, RosterEntry, DEFAULT_MAX_LOGS};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

pub const DEFAULT_URL: &str = "ws://localhost:8765/monitor";
pub const DEFAULT_LOG_DIR: &str = ".fleetwatch/logs";
const ENV_PREFIX: &str = "FLEETWATCH_";

/// Command line flags. Empty or absent values fall back to the matching
/// `FLEETWATCH_*` environment variable, then to built-in defaults.
#[derive(Parser, Debug, Default, Clone)]
#[command(name = "fleetwatch", about = "Live dashboard for a fleet of coding agents")]
pub struct Args {
    /// WebSocket endpoint pushing update messages.
    #[arg(long, default_value = "")]
    pub url: String,
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,
    #[arg(long)]
    pub max_reconnect_attempts: Option<u32>,
    /// Delay before demonstration data starts when no server answers.
    #[arg(long)]
    pub simulator_grace_ms: Option<u64>,
    #[arg(long)]
    pub max_logs: Option<usize>,
    /// Comma separated roster, each entry `id` or `id:Display Name`.
    #[arg(long, default_value = "")]
    pub agents: String,
    #[arg(long)]
    pub no_simulator: bool,
    /// Fixed RNG seed for reproducible demonstration runs.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, default_value = "")]
    pub log_dir: String,
    /// Read NDJSON updates from stdin and log changes instead of drawing.
    #[arg(long)]
    pub headless: bool,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid url {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },
    #[error("unsupported url scheme {0:?}; expected ws or wss")]
    UnsupportedScheme(String),
    #[error("invalid value {value:?} for {key}")]
    InvalidNumber { key: String, value: String },
    #[error("invalid roster entry {0:?}")]
    InvalidRoster(String),
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub url: Url,
    pub monitor: MonitorSettings,
    pub log_dir: PathBuf,
    pub log_stdout: bool,
    pub headless: bool,
}

impl MonitorConfig {
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        resolve(args, |key| env::var(key).ok())
    }
}

/// Builds the runtime configuration; `lookup` supplies environment values.
pub fn resolve(
    args: Args,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<MonitorConfig, ConfigError> {
    let env_value = |name: &str| {
        lookup(&format!("{ENV_PREFIX}{name}")).filter(|value| !value.trim().is_empty())
    };

    let raw_url = non_empty(args.url)
        .or_else(|| env_value("URL"))
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let url = parse_url(&raw_url)?;

    let reconnect_delay = match args.reconnect_delay_ms {
        Some(ms) => Duration::from_millis(ms),
        None => match env_value("RECONNECT_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_number("RECONNECT_DELAY_MS", &raw)?),
            None => DEFAULT_RECONNECT_DELAY,
        },
    };
    let max_reconnect_attempts = match args.max_reconnect_attempts {
        Some(value) => value,
        None => match env_value("MAX_RECONNECT_ATTEMPTS") {
            Some(raw) => parse_number("MAX_RECONNECT_ATTEMPTS", &raw)?,
            None => DEFAULT_MAX_RECONNECT_ATTEMPTS,
        },
    };
    if max_reconnect_attempts == 0 {
        return Err(ConfigError::Zero("max reconnect attempts"));
    }
    let simulator_grace = match args.simulator_grace_ms {
        Some(ms) => Duration::from_millis(ms),
        None => match env_value("SIMULATOR_GRACE_MS") {
            Some(raw) => Duration::from_millis(parse_number("SIMULATOR_GRACE_MS", &raw)?),
            None => DEFAULT_SIMULATOR_GRACE,
        },
    };
    let max_logs = match args.max_logs {
        Some(value) => value,
        None => match env_value("MAX_LOGS") {
            Some(raw) => parse_number("MAX_LOGS", &raw)?,
            None => DEFAULT_MAX_LOGS,
        },
    };
    if max_logs == 0 {
        return Err(ConfigError::Zero("max logs"));
    }
    let simulator_enabled = if args.no_simulator {
        false
    } else {
        env_value("SIMULATOR")
            .and_then(|raw| parse_bool_flag(&raw))
            .unwrap_or(true)
    };
    let seed = match args.seed {
        Some(seed) => Some(seed),
        None => env_value("SEED")
            .map(|raw| parse_number("SEED", &raw))
            .transpose()?,
    };
    let roster = match non_empty(args.agents).or_else(|| env_value("AGENTS")) {
        Some(raw) => parse_roster(&raw)?,
        None => default_roster(),
    };
    let log_dir = non_empty(args.log_dir)
        .or_else(|| env_value("LOG_DIR"))
        .unwrap_or_else(|| DEFAULT_LOG_DIR.to_string());
    let log_stdout = env_value("LOG_STDOUT")
        .and_then(|raw| parse_bool_flag(&raw))
        .unwrap_or(false);

    Ok(MonitorConfig {
        url,
        monitor: MonitorSettings {
            policy: ConnectionPolicy {
                reconnect_delay,
                max_reconnect_attempts,
                simulator_grace,
                simulator_enabled,
            },
            simulator: SimulatorConfig {
                seed,
                ..SimulatorConfig::default()
            },
            roster,
            max_logs,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        },
        log_dir: PathBuf::from(log_dir),
        log_stdout,
        headless: args.headless,
    })
}

pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON" => Some(true),
        "0" | "false" | "FALSE" | "no" | "NO" | "off" | "OFF" => Some(false),
        _ => None,
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

fn parse_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|err| ConfigError::InvalidUrl {
        value: raw.to_string(),
        reason: err.to_string(),
    })?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        key: format!("{ENV_PREFIX}{key}"),
        value: raw.to_string(),
    })
}

fn parse_roster(raw: &str) -> Result<Vec<RosterEntry>, ConfigError> {
    let roster = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<RosterEntry>()
                .map_err(|_| ConfigError::InvalidRoster(part.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if roster.is_empty() {
        return Err(ConfigError::InvalidRoster(raw.to_string()));
    }
    Ok(roster)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve_with(args: Args, vars: &[(&str, &str)]) -> Result<MonitorConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        resolve(args, |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_match_reference_dashboard() {
        let config = resolve_with(Args::default(), &[]).expect("config");
        assert_eq!(config.url.as_str(), DEFAULT_URL);
        let policy = config.monitor.policy;
        assert_eq!(policy.reconnect_delay, Duration::from_millis(5_000));
        assert_eq!(policy.max_reconnect_attempts, 10);
        assert_eq!(policy.simulator_grace, Duration::from_millis(2_000));
        assert!(policy.simulator_enabled);
        assert_eq!(config.monitor.max_logs, 100);
        assert_eq!(config.monitor.roster.len(), 5);
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert!(!config.log_stdout);
    }

    #[test]
    fn flags_win_over_environment() {
        let args = Args {
            url: "wss://fleet.example/monitor".to_string(),
            max_logs: Some(25),
            ..Args::default()
        };
        let config = resolve_with(
            args,
            &[
                ("FLEETWATCH_URL", "ws://ignored:1/"),
                ("FLEETWATCH_MAX_LOGS", "7"),
                ("FLEETWATCH_RECONNECT_DELAY_MS", "250"),
            ],
        )
        .expect("config");
        assert_eq!(config.url.host_str(), Some("fleet.example"));
        assert_eq!(config.monitor.max_logs, 25);
        assert_eq!(config.monitor.policy.reconnect_delay, Duration::from_millis(250));
    }

    #[test]
    fn environment_toggles_and_roster() {
        let config = resolve_with(
            Args::default(),
            &[
                ("FLEETWATCH_SIMULATOR", "off"),
                ("FLEETWATCH_LOG_STDOUT", "1"),
                ("FLEETWATCH_AGENTS", "alpha:Alpha One, beta"),
                ("FLEETWATCH_SEED", "42"),
            ],
        )
        .expect("config");
        assert!(!config.monitor.policy.simulator_enabled);
        assert!(config.log_stdout);
        assert_eq!(config.monitor.simulator.seed, Some(42));
        let ids: Vec<_> = config.monitor.roster.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta"]);
        assert_eq!(config.monitor.roster[0].name, "Alpha One");
    }

    #[test]
    fn rejects_bad_values() {
        let http = Args {
            url: "http://localhost:8765".to_string(),
            ..Args::default()
        };
        assert_eq!(
            resolve_with(http, &[]).expect_err("scheme"),
            ConfigError::UnsupportedScheme("http".to_string())
        );
        assert!(matches!(
            resolve_with(Args::default(), &[("FLEETWATCH_MAX_LOGS", "lots")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        let zero = Args {
            max_reconnect_attempts: Some(0),
            ..Args::default()
        };
        assert!(matches!(resolve_with(zero, &[]), Err(ConfigError::Zero(_))));
    }

    #[test]
    fn parse_bool_flag_accepts_common_spellings() {
        assert_eq!(parse_bool_flag(" on "), Some(true));
        assert_eq!(parse_bool_flag("NO"), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }
}
