//! Compiler configuration, loaded from TOML.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Prefix of generated job names, e.g. `GL_HD_SAS_THR_<context>`.
    pub job_prefix: String,
    /// Emit unit bodies as multi-line, indented SQL.
    pub pretty: bool,
    pub extract: ExtractConfig,
    pub catalog: CatalogConfig,
    pub rules: RulesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            job_prefix: "GL_HD_SAS_THR_".to_string(),
            pretty: false,
            extract: ExtractConfig::default(),
            catalog: CatalogConfig::default(),
            rules: RulesConfig::default(),
        }
    }
}

impl Config {
    /// Load from `path` if given, else from the user config file if it
    /// exists, else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => match config_path() {
                Some(p) if p.exists() => Self::from_file(&p),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&data)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn from_toml(data: &str) -> Result<Self> {
        let config: Self = toml::from_str(data)?;
        for key in config.catalog.tables.keys() {
            if key.split('.').count() != 2 {
                warn!(table = %key, "catalog.tables keys are schema.table; entry never matches");
            }
        }
        Ok(config)
    }
}

/// `$XDG_CONFIG_HOME/athena2spark/config.toml` (or the platform equivalent).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("athena2spark").join("config.toml"))
}

/// How references to a CTE defined later in the same WITH are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ForwardReferences {
    /// Any reference to a later (or the same) CTE is a dependency cycle.
    #[default]
    Reject,
    /// Acyclic forward references are allowed; units are reordered.
    Reorder,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Column-name tokens that mark a column as temporal.
    pub temporal_tokens: Vec<String>,
    pub forward_references: ForwardReferences,
    /// Schema assumed for bare table names that are not CTEs. Unset means
    /// such names are unresolved.
    pub default_schema: Option<String>,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            temporal_tokens: ["date", "fecha", "fec", "dt", "corte"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            forward_references: ForwardReferences::Reject,
            default_schema: None,
        }
    }
}

/// Storage format of a physical table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    #[default]
    Hive,
    Iceberg,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Target catalog of non-iceberg tables.
    pub default_catalog: String,
    /// Target catalog of iceberg tables.
    pub iceberg_catalog: String,
    /// Source-side catalog names that are dropped when qualifying tables.
    pub source_catalogs: Vec<String>,
    /// `schema.table` → storage format. Keys are matched case-insensitively.
    pub tables: BTreeMap<String, TableFormat>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_catalog: "spark_catalog".to_string(),
            iceberg_catalog: "glue_catalog".to_string(),
            source_catalogs: vec!["awsdatacatalog".to_string()],
            tables: BTreeMap::new(),
        }
    }
}

impl CatalogConfig {
    pub fn format_of(&self, schema: &str, table: &str) -> TableFormat {
        let key = format!("{}.{}", schema, table);
        self.tables
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
            .map(|(_, f)| *f)
            .unwrap_or_default()
    }

    pub fn target_catalog(&self, format: TableFormat) -> &str {
        match format {
            TableFormat::Iceberg => &self.iceberg_catalog,
            TableFormat::Hive => &self.default_catalog,
        }
    }

    pub fn is_source_catalog(&self, name: &str) -> bool {
        self.source_catalogs
            .iter()
            .any(|c| c.eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// String literal → canonical replacement. Keys match ignoring case and
    /// accents. Empty by default.
    pub literal_aliases: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.job_prefix, "GL_HD_SAS_THR_");
        assert!(!config.pretty);
        assert_eq!(config.extract.forward_references, ForwardReferences::Reject);
        assert!(config.extract.temporal_tokens.contains(&"fecha".to_string()));
        assert_eq!(config.catalog.default_catalog, "spark_catalog");
        assert!(config.rules.literal_aliases.is_empty());
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(Config::from_toml("").unwrap(), Config::default());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = Config::from_toml(
            r#"
job_prefix = "JOB_"
pretty = true

[extract]
temporal_tokens = ["fecha"]
forward_references = "reorder"
default_schema = "default"

[catalog]
iceberg_catalog = "ice"
[catalog.tables]
"dwh_thr_modelo_datos.dim_tiempo" = "iceberg"

[rules.literal_aliases]
"miercoles" = "MIÉRCOLES"
"#,
        )
        .unwrap();

        assert_eq!(config.job_prefix, "JOB_");
        assert!(config.pretty);
        assert_eq!(config.extract.temporal_tokens, vec!["fecha".to_string()]);
        assert_eq!(config.extract.forward_references, ForwardReferences::Reorder);
        assert_eq!(config.extract.default_schema.as_deref(), Some("default"));
        assert_eq!(config.catalog.default_catalog, "spark_catalog");
        assert_eq!(
            config.catalog.format_of("DWH_THR_MODELO_DATOS", "dim_tiempo"),
            TableFormat::Iceberg
        );
        assert_eq!(config.catalog.target_catalog(TableFormat::Iceberg), "ice");
        assert_eq!(
            config.rules.literal_aliases.get("miercoles").map(String::as_str),
            Some("MIÉRCOLES")
        );
    }

    #[test]
    fn test_unknown_forward_policy_is_rejected() {
        assert!(Config::from_toml("[extract]\nforward_references = \"maybe\"").is_err());
    }

    #[test]
    fn test_source_catalog_match() {
        let catalog = CatalogConfig::default();
        assert!(catalog.is_source_catalog("AwsDataCatalog"));
        assert!(!catalog.is_source_catalog("glue_catalog"));
        assert_eq!(catalog.format_of("s", "t"), TableFormat::Hive);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let err = Config::load(Some(Path::new("/nonexistent/athena2spark.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
