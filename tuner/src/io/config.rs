//! Tuner configuration stored in `tuner.toml`.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Tuner configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TunerConfig {
    /// Concurrent training runs. `0` means one per available CPU.
    pub slots: usize,

    /// Seconds between liveness/metric polls.
    pub poll_interval_secs: u64,

    pub trainer: TrainerConfig,

    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TrainerConfig {
    /// Training program to launch once per job.
    pub program: String,

    /// Flags appended to every launch.
    pub args: Vec<String>,

    /// First communication port; slot `i` uses `base_port + i`.
    pub base_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetricsConfig {
    /// Scalars endpoint queried with `run` and `tag` parameters.
    pub endpoint: String,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            program: "mlagents-learn".to_string(),
            args: Vec::new(),
            base_port: 5005,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:6006/data/plugin/scalars/scalars".to_string(),
            timeout_secs: 5,
        }
    }
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            slots: 1,
            poll_interval_secs: 60,
            trainer: TrainerConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl TunerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(anyhow!("poll_interval_secs must be > 0"));
        }
        if self.metrics.timeout_secs == 0 {
            return Err(anyhow!("metrics.timeout_secs must be > 0"));
        }
        if self.metrics.endpoint.trim().is_empty() {
            return Err(anyhow!("metrics.endpoint must be non-empty"));
        }
        if self.trainer.program.trim().is_empty() {
            return Err(anyhow!("trainer.program must be non-empty"));
        }
        Ok(())
    }

    /// Slot count with `0` resolved to the available parallelism.
    pub fn effective_slots(&self) -> usize {
        if self.slots > 0 {
            return self.slots;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn metrics_timeout(&self) -> Duration {
        Duration::from_secs(self.metrics.timeout_secs)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TunerConfig::default()`.
pub fn load_config(path: &Path) -> Result<TunerConfig> {
    if !path.exists() {
        let cfg = TunerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TunerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, TunerConfig::default());
    }

    #[test]
    fn serialized_config_loads_back() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tuner.toml");
        let cfg = TunerConfig {
            slots: 4,
            trainer: TrainerConfig {
                args: vec!["--no-graphics".to_string()],
                ..TrainerConfig::default()
            },
            ..TunerConfig::default()
        };
        fs::write(&path, toml::to_string(&cfg).expect("serialize")).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tuner.toml");
        fs::write(&path, "slots = 3\n[trainer]\nbase_port = 6000\n").expect("write");
        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.slots, 3);
        assert_eq!(cfg.trainer.base_port, 6000);
        assert_eq!(cfg.trainer.program, "mlagents-learn");
        assert_eq!(cfg.poll_interval_secs, 60);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("tuner.toml");
        fs::write(&path, "poll_interval_secs = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("poll_interval_secs"));
    }

    #[test]
    fn zero_slots_resolve_to_cpu_count() {
        let cfg = TunerConfig {
            slots: 0,
            ..TunerConfig::default()
        };
        assert!(cfg.effective_slots() >= 1);
    }
}
