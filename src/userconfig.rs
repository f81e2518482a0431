//! User-authored application configuration
//!
//! This is the raw input to a context build. Stage 3 of the pipeline fills in
//! defaults on a working copy of it; the original is never mutated.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{ContextError, Result};

/// Complete application configuration (loaded from TOML)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: AppSection,

    #[serde(default)]
    pub environment: EnvironmentConfig,

    #[serde(default)]
    pub raw_columns: Vec<RawColumnConfig>,

    #[serde(default)]
    pub constants: Vec<ConstantConfig>,

    #[serde(default)]
    pub aggregators: Vec<PluginConfig>,

    #[serde(default)]
    pub transformers: Vec<PluginConfig>,

    #[serde(default)]
    pub aggregates: Vec<AggregateConfig>,

    #[serde(default)]
    pub transformed_columns: Vec<TransformedColumnConfig>,

    #[serde(default)]
    pub models: Vec<ModelConfig>,

    #[serde(default)]
    pub apis: Vec<ApiConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_environment_name")]
    pub name: String,

    #[serde(default)]
    pub data: DataConfig,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            name: default_environment_name(),
            data: DataConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[default]
    Csv,
    Parquet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DataConfig {
    #[serde(rename = "type", default)]
    pub data_type: DataType,

    #[serde(default)]
    pub path: String,

    /// Raw column names, in file order
    #[serde(default)]
    pub schema: Vec<String>,

    #[serde(default)]
    pub drop_null: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnType {
    #[serde(rename = "INT_COLUMN")]
    Int,
    #[serde(rename = "FLOAT_COLUMN")]
    Float,
    #[serde(rename = "STRING_COLUMN")]
    String,
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ColumnType::Int => "INT_COLUMN",
            ColumnType::Float => "FLOAT_COLUMN",
            ColumnType::String => "STRING_COLUMN",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ColumnType {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "INT_COLUMN" => Ok(ColumnType::Int),
            "FLOAT_COLUMN" => Ok(ColumnType::Float),
            "STRING_COLUMN" => Ok(ColumnType::String),
            other => Err(ContextError::config(format!(
                "column type must be one of INT_COLUMN, FLOAT_COLUMN, STRING_COLUMN: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawColumnConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub min: Option<f64>,

    #[serde(default)]
    pub max: Option<f64>,

    #[serde(default)]
    pub values: Option<Vec<Value>>,

    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstantConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub value_type: String,

    pub value: Value,
}

/// User-defined aggregator or transformer backed by a file in the upload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,

    /// Key into the uploaded file map
    pub path: String,

    pub output_type: String,

    #[serde(default)]
    pub inputs: Vec<String>,
}

/// A column input is either a single column name or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Single(String),
    List(Vec<String>),
}

impl ColumnRef {
    pub fn names(&self) -> Vec<&str> {
        match self {
            ColumnRef::Single(name) => vec![name.as_str()],
            ColumnRef::List(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct InputsConfig {
    #[serde(default)]
    pub columns: BTreeMap<String, ColumnRef>,

    /// Literal values, or `"@name"` references to constants and aggregates
    #[serde(default)]
    pub args: BTreeMap<String, Value>,
}

/// Prefix marking an argument value as a reference to another resource
pub const REFERENCE_PREFIX: char = '@';

/// Resource name referenced by an argument value, if it is a reference
pub fn as_reference(value: &Value) -> Option<&str> {
    value.as_str().and_then(|s| s.strip_prefix(REFERENCE_PREFIX))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    pub name: String,

    pub aggregator: String,

    #[serde(default)]
    pub inputs: InputsConfig,

    #[serde(default)]
    pub output_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformedColumnConfig {
    pub name: String,

    pub transformer: String,

    #[serde(default)]
    pub inputs: InputsConfig,

    #[serde(default)]
    pub output_type: Option<ColumnType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Classification,
    Regression,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub model_type: ModelType,

    /// Key into the uploaded file map for the model implementation
    pub path: String,

    pub target_column: String,

    #[serde(default)]
    pub feature_columns: Vec<String>,

    #[serde(default)]
    pub aggregates: Vec<String>,

    #[serde(default)]
    pub training: Option<TrainingConfig>,

    #[serde(default)]
    pub data_partition: Option<DataPartitionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    #[serde(default = "default_num_steps")]
    pub num_steps: u64,

    #[serde(default = "default_true")]
    pub shuffle: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            num_steps: default_num_steps(),
            shuffle: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPartitionConfig {
    #[serde(default = "default_training_ratio")]
    pub training: f64,

    #[serde(default = "default_evaluation_ratio")]
    pub evaluation: f64,
}

impl Default for DataPartitionConfig {
    fn default() -> Self {
        Self {
            training: default_training_ratio(),
            evaluation: default_evaluation_ratio(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    pub name: String,

    pub model: String,

    #[serde(default)]
    pub compute: Option<ComputeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputeConfig {
    #[serde(default = "default_replicas")]
    pub replicas: u32,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
        }
    }
}

// Default value functions
fn default_environment_name() -> String {
    "dev".to_string()
}

fn default_batch_size() -> u32 {
    40
}

fn default_num_steps() -> u64 {
    1000
}

fn default_training_ratio() -> f64 {
    0.8
}

fn default_evaluation_ratio() -> f64 {
    0.2
}

fn default_replicas() -> u32 {
    1
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load an application configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| ContextError::io(path, e))?;
        Self::from_toml_str(&content)
            .map_err(|e| ContextError::config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        // Non-finite floats have no JSON form and would otherwise become null
        let raw: toml::Table =
            toml::from_str(content).map_err(|e| ContextError::config(e.to_string()))?;
        for (key, value) in &raw {
            reject_non_finite(key, value)?;
        }

        let config: AppConfig =
            toml::from_str(content).map_err(|e| ContextError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the fields that every later stage relies on
    pub fn validate(&self) -> Result<()> {
        let name = &self.app.name;
        if name.is_empty() {
            return Err(ContextError::config("app.name must be set"));
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(ContextError::config(format!(
                "app.name must contain only lowercase letters, digits and '-': {}",
                name
            )));
        }

        if self.environment.name.is_empty() {
            return Err(ContextError::config("environment.name must be set"));
        }

        for column in &self.raw_columns {
            for (field, bound) in [("min", column.min), ("max", column.max)] {
                if bound.is_some_and(|v| !v.is_finite()) {
                    return Err(ContextError::config(format!(
                        "raw column {}: {} must be a finite number",
                        column.name, field
                    )));
                }
            }
        }

        for model in &self.models {
            if let Some(partition) = &model.data_partition {
                if !partition.training.is_finite() || !partition.evaluation.is_finite() {
                    return Err(ContextError::config(format!(
                        "model {}: data partition ratios must be finite numbers",
                        model.name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn reject_non_finite(path: &str, value: &toml::Value) -> Result<()> {
    match value {
        toml::Value::Float(f) if !f.is_finite() => Err(ContextError::config(format!(
            "{} must be a finite number, got {}",
            path, f
        ))),
        toml::Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| reject_non_finite(&format!("{}[{}]", path, i), item)),
        toml::Value::Table(table) => table
            .iter()
            .try_for_each(|(key, item)| reject_non_finite(&format!("{}.{}", path, key), item)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAUD: &str = r#"
[app]
name = "fraud"

[environment.data]
type = "csv"
path = "s3://data/fraud.csv"
schema = ["amount", "label"]

[[raw_columns]]
name = "amount"
type = "FLOAT_COLUMN"
min = 0.0

[[raw_columns]]
name = "label"
type = "INT_COLUMN"
values = [0, 1]

[[aggregates]]
name = "amount_mean"
aggregator = "mean"
inputs.columns = { col = "amount" }

[[models]]
name = "m1"
type = "classification"
path = "implementations/models/m1.py"
target_column = "label"
feature_columns = ["amount"]
training = { num_steps = 500 }

[[apis]]
name = "fraud-api"
model = "m1"
"#;

    #[test]
    fn test_parse_app_config() {
        let config = AppConfig::from_toml_str(FRAUD).unwrap();
        assert_eq!(config.app.name, "fraud");
        assert_eq!(config.environment.name, "dev");
        assert_eq!(config.environment.data.data_type, DataType::Csv);
        assert_eq!(config.raw_columns.len(), 2);
        assert_eq!(config.raw_columns[0].column_type, ColumnType::Float);
        assert_eq!(
            config.aggregates[0].inputs.columns["col"],
            ColumnRef::Single("amount".to_string())
        );

        let training = config.models[0].training.as_ref().unwrap();
        assert_eq!(training.num_steps, 500);
        assert_eq!(training.batch_size, 40);
        assert!(config.models[0].data_partition.is_none());
        assert!(config.apis[0].compute.is_none());
    }

    #[test]
    fn test_invalid_app_name() {
        let err = AppConfig::from_toml_str("[app]\nname = \"Fraud_App\"").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_reference_values() {
        assert_eq!(as_reference(&Value::from("@threshold")), Some("threshold"));
        assert_eq!(as_reference(&Value::from("threshold")), None);
        assert_eq!(as_reference(&Value::from(3)), None);
    }

    #[test]
    fn test_rejects_non_finite_floats() {
        for literal in ["nan", "inf", "-inf"] {
            let content = FRAUD.replace("min = 0.0", &format!("min = {}", literal));
            let err = AppConfig::from_toml_str(&content).unwrap_err();
            assert_eq!(err.kind(), crate::error::ErrorKind::Config);
            assert!(err.to_string().contains("raw_columns[0].min"), "{}", err);
        }

        let constant = format!("{}\n[[constants]]\nname = \"c\"\ntype = \"FLOAT\"\nvalue = nan\n", FRAUD);
        let err = AppConfig::from_toml_str(&constant).unwrap_err();
        assert!(err.to_string().contains("constants[0].value"));
    }

    #[test]
    fn test_validate_rejects_non_finite_bounds() {
        let mut config = AppConfig::from_toml_str(FRAUD).unwrap();
        config.raw_columns[0].max = Some(f64::INFINITY);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max must be a finite number"));
    }
}
