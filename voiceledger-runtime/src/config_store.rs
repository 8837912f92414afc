use anyhow::Context;
use std::path::{Path, PathBuf};
use voiceledger_core::config::AppConfig;

use crate::fsutil::write_json_atomic;

#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> anyhow::Result<AppConfig> {
        let bytes = std::fs::read(&self.path)
            .with_context(|| format!("read config: {}", self.path.display()))?;
        let cfg: AppConfig = serde_json::from_slice(&bytes).context("decode config JSON")?;
        cfg.validate()
            .with_context(|| format!("invalid config: {}", self.path.display()))?;
        Ok(cfg)
    }

    /// Loads the config, writing the defaults first if the file does not exist yet.
    pub fn load_or_init(&self) -> anyhow::Result<AppConfig> {
        if !self.path.exists() {
            let cfg = crate::defaults::default_app_config();
            self.save(&cfg)?;
            log::info!("wrote default config to {}", self.path.display());
            return Ok(cfg);
        }
        self.load()
    }

    pub fn save(&self, cfg: &AppConfig) -> anyhow::Result<()> {
        write_json_atomic(&self.path, cfg)
    }
}
