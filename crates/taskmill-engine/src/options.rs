//! Extraction options and vault configuration.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::Deserialize;

const CONFIG_DIR: &str = ".taskmill";
const CONFIG_FILE: &str = "config.toml";

/// Top-level vault configuration loaded from `.taskmill/config.toml`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct VaultConfig {
    /// Extraction options block.
    #[serde(default)]
    pub extract: ExtractOptions,
}

impl VaultConfig {
    /// Load configuration from a vault root directory.
    ///
    /// A missing configuration file yields the defaults.
    ///
    /// # Errors
    /// Returns an error when the file exists but cannot be read or parsed.
    pub fn load(vault_root: impl AsRef<Path>) -> Result<Self> {
        let config_path = vault_root.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;
        Ok(config)
    }
}

/// User-facing options steering the transform pipeline.
///
/// Every field is independently settable; the derived pipeline is rebuilt
/// whenever the options differ from the previous refresh.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Markers or status names whose tasks are hidden.
    pub hide_status: Vec<String>,
    /// Whether tag inclusion filtering is active.
    pub include_tags_enabled: bool,
    /// Tags of which a task must carry at least one.
    pub include_tags: Vec<String>,
    /// Whether tag exclusion filtering is active.
    pub exclude_tags_enabled: bool,
    /// Tags none of which a task may carry.
    pub exclude_tags: Vec<String>,
    /// Drop tasks whose visual text ends up blank.
    pub filter_empty: bool,
    /// Stamp synthetic dates on dateless and overdue tasks.
    pub forward_dates: bool,
    /// Status tokens ordered by display priority.
    pub status_order: Vec<String>,
    /// Date format of daily note file names, when configured.
    pub daily_note_format: Option<String>,
    /// Sort specification, `"<field> [asc|desc]"`.
    pub sort: Option<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            hide_status: Vec::new(),
            include_tags_enabled: false,
            include_tags: Vec::new(),
            exclude_tags_enabled: false,
            exclude_tags: Vec::new(),
            filter_empty: false,
            forward_dates: false,
            status_order: default_status_order(),
            daily_note_format: None,
            sort: None,
        }
    }
}

fn default_status_order() -> Vec<String> {
    [
        "overdue",
        "due",
        "scheduled",
        "start",
        "in_progress",
        "unplanned",
        "done",
        "cancelled",
    ]
    .map(str::to_owned)
    .to_vec()
}
