//! Configuration management for the reconciler
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (reconciler.toml)
//! - Environment variables (RECONCILE__*)
//!
//! ## Example config file (reconciler.toml):
//! ```toml
//! [inputs]
//! terminology = "data/ct.json"
//! class_model = "data/model.json"
//! api_schema = "data/openapi.json"
//!
//! [output]
//! path = "out/deliverable.json"
//! format = "pretty"
//!
//! [template]
//! root_entity = "Study"
//! parent_columns = true
//!
//! [audit]
//! ignored_api_fields = ["id", "instanceType", "extensionAttributes"]
//!
//! [inflection]
//! uncountable = ["masking"]
//!
//! [inflection.irregular]
//! cactus = "cacti"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::api::Inflector;

/// Main configuration for a reconciliation run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Input file locations
    #[serde(default)]
    pub inputs: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,

    /// Template dataset settings
    #[serde(default)]
    pub template: TemplateConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    /// Extra pluralization entries
    #[serde(default)]
    pub inflection: InflectionConfig,
}

/// Input file locations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub terminology: Option<PathBuf>,

    #[serde(default)]
    pub class_model: Option<PathBuf>,

    #[serde(default)]
    pub api_schema: Option<PathBuf>,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Deliverable path; stdout when unset
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

/// Template dataset settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// Entity that gets no parent linkage columns
    #[serde(default = "default_root_entity")]
    pub root_entity: String,

    /// Prefix non-root datasets with parent linkage columns
    #[serde(default = "default_true")]
    pub parent_columns: bool,

    /// Characters of the entity name kept in the dataset file name
    #[serde(default = "default_dataset_name_max_len")]
    pub dataset_name_max_len: usize,

    #[serde(default = "default_dataset_extension")]
    pub dataset_extension: String,
}

/// Auditor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// API fields that never need a terminology counterpart
    #[serde(default = "default_ignored_api_fields")]
    pub ignored_api_fields: Vec<String>,
}

/// Additions to the built-in pluralization dictionary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InflectionConfig {
    /// singular -> plural
    #[serde(default)]
    pub irregular: BTreeMap<String, String>,

    #[serde(default)]
    pub uncountable: Vec<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_root_entity() -> String {
    "Study".to_string()
}

fn default_dataset_name_max_len() -> usize {
    27
}

fn default_dataset_extension() -> String {
    ".xpt".to_string()
}

fn default_ignored_api_fields() -> Vec<String> {
    vec![
        "id".to_string(),
        "instanceType".to_string(),
        "extensionAttributes".to_string(),
    ]
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            root_entity: default_root_entity(),
            parent_columns: true,
            dataset_name_max_len: default_dataset_name_max_len(),
            dataset_extension: default_dataset_extension(),
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            ignored_api_fields: default_ignored_api_fields(),
        }
    }
}

impl InflectionConfig {
    /// Built-in dictionary merged with the configured entries
    pub fn inflector(&self) -> Inflector {
        Inflector::with_overrides(&self.irregular, &self.uncountable)
    }
}

impl ReconcilerConfig {
    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = ["reconciler.toml", ".reconciler.toml", "config/reconciler.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("org", "usdm", "reconciler") {
            let xdg_config = config_dir.config_dir().join("reconciler.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RECONCILE__TEMPLATE__ROOT_ENTITY and friends
        builder = builder.add_source(
            Environment::with_prefix("RECONCILE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
