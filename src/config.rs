use std::path::PathBuf;
use std::time::Duration;

/// Runtime settings, read from `TRIPLEDGER_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    /// Journal appends between compactions.
    pub compact_threshold: u64,
    pub sweep_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            compact_threshold: 1000,
            sweep_interval: Duration::from_secs(3600),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unset or unparsable values fall back to the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            data_dir: lookup("TRIPLEDGER_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: lookup("TRIPLEDGER_METRICS_PORT").and_then(|s| s.parse().ok()),
            compact_threshold: lookup("TRIPLEDGER_COMPACT_THRESHOLD")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.compact_threshold),
            sweep_interval: lookup("TRIPLEDGER_SWEEP_INTERVAL_SECS")
                .and_then(|s| s.parse().ok())
                .filter(|secs: &u64| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("trips.journal")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
    }

    #[test]
    fn reads_every_variable() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("TRIPLEDGER_DATA_DIR", "/var/lib/tripledger"),
            ("TRIPLEDGER_METRICS_PORT", "9100"),
            ("TRIPLEDGER_COMPACT_THRESHOLD", "50"),
            ("TRIPLEDGER_SWEEP_INTERVAL_SECS", "30"),
        ]));
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/tripledger"));
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.sweep_interval, Duration::from_secs(30));
        assert_eq!(cfg.journal_path(), PathBuf::from("/var/lib/tripledger/trips.journal"));
    }

    #[test]
    fn garbage_falls_back() {
        let cfg = Config::from_lookup(lookup_from(&[
            ("TRIPLEDGER_METRICS_PORT", "ninety"),
            ("TRIPLEDGER_COMPACT_THRESHOLD", "-1"),
            ("TRIPLEDGER_SWEEP_INTERVAL_SECS", "0"),
        ]));
        assert_eq!(cfg, Config::default());
    }
}
