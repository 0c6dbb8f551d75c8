mod env;
mod types;

#[cfg(test)]
mod tests;

pub use types::*;

use std::path::Path;

use anyhow::{Context, bail};

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Reject settings the index and search layers cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid setting.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.store.default_store.trim().is_empty() {
            bail!("store.default_store must not be empty");
        }
        if self.index.max_lines == 0 {
            bail!("index.max_lines must be at least 1");
        }
        if self.index.window_overlap >= self.index.max_lines {
            bail!(
                "index.window_overlap ({}) must be smaller than index.max_lines ({})",
                self.index.window_overlap,
                self.index.max_lines
            );
        }
        if self.index.embedding_dim == 0 {
            bail!("index.embedding_dim must be at least 1");
        }
        if self.search.rrf_k == 0 {
            bail!("search.rrf_k must be at least 1");
        }
        for (name, weight) in &self.search.weights {
            if !weight.is_finite() || *weight < 0.0 {
                bail!("search.weights.{name} must be a non-negative number, got {weight}");
            }
        }
        Ok(())
    }
}
