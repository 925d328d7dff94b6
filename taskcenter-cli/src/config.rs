use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use taskcenter_core::time::parse_timezone;
use taskcenter_core::{PlanningConfig, ScoringWeights};

use crate::state::ensure_taskcenter_home;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IANA zone deciding what "today" is for deadlines.
    pub timezone: String,
    pub planning: PlanningConfig,
    pub scoring: ScoringWeights,
    pub llm: LlmSection,
    pub storage: StorageSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub max_retries: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StorageSection {
    /// Defaults to ~/.taskcenter/data
    pub data_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: "Europe/Moscow".to_string(),
            planning: PlanningConfig::default(),
            scoring: ScoringWeights::default(),
            llm: LlmSection::default(),
            storage: StorageSection::default(),
        }
    }
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            temperature: 0.5,
            max_tokens: 1024,
            max_retries: 5,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        parse_timezone(&self.timezone)?;
        self.scoring.validate().context("invalid [scoring] weights")?;
        if !self.planning.available_hours.is_finite() || self.planning.available_hours < 0.0 {
            anyhow::bail!(
                "planning.available_hours must be >= 0, got {}",
                self.planning.available_hours
            );
        }
        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_taskcenter_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(p: &Path) -> Result<Config> {
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(p).with_context(|| format!("read {}", p.display()))?;
    let cfg: Config = toml::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn save_config_to(cfg: &Config, p: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config_to(&Config::default(), &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.planning.available_hours, 8.0);
        assert_eq!(cfg.planning.max_tasks, 5);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        fs::write(&p, "timezone = \"UTC\"\n\n[planning]\nmax_tasks = 3\n").unwrap();

        let cfg = load_config_from(&p).unwrap();
        assert_eq!(cfg.timezone, "UTC");
        assert_eq!(cfg.planning.max_tasks, 3);
        assert_eq!(cfg.planning.available_hours, 8.0);
        assert_eq!(cfg.scoring, ScoringWeights::default());
    }

    #[test]
    fn test_roundtrip_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("config.toml");
        save_config_to(&Config::default(), &p).unwrap();
        assert_eq!(load_config_from(&p).unwrap(), Config::default());

        fs::write(&p, "[scoring]\nblocking = 0.9\n").unwrap();
        assert!(load_config_from(&p).is_err());

        fs::write(&p, "timezone = \"Nowhere/Special\"\n").unwrap();
        assert!(load_config_from(&p).is_err());
    }
}
