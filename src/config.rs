use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;

/// Runtime settings, read from `NABCA_*` environment variables
/// (`NABCA_DB_PATH`, `NABCA_SUPABASE_URL`, ...).
#[derive(Clone, Deserialize)]
pub struct Settings {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub db_path: PathBuf,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_key: Option<String>,
    pub supabase_schema: String,
}

/// The service key is never printed.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .field("db_path", &self.db_path)
            .field("supabase_url", &self.supabase_url)
            .field("supabase_key", &self.supabase_key.as_ref().map(|_| "***"))
            .field("supabase_schema", &self.supabase_schema)
            .finish()
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::from_builder(Config::builder().add_source(Environment::with_prefix("NABCA")))
    }

    fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .set_default("input_dir", "data/control-states")?
            .set_default("output_dir", ".")?
            .set_default("db_path", "data/nabca.sqlite")?
            .set_default("supabase_schema", "nabca")?
            .build()
            .context("Failed to load settings")?
            .try_deserialize()
            .context("Invalid settings")
    }
}

// ── Tests ──
