use serde::Serialize;
use std::collections::BTreeMap;

use super::inputs::{resolve_inputs, Scope};
use super::{require, BuildState, AGGREGATES, AGGREGATORS_TRANSFORMERS, CONSTANTS, RAW_COLUMNS};
use crate::context::{columns_of, Environment};
use crate::error::{ContextError, Result};
use crate::hash::digest_value;
use crate::keys::transformed_column_key;
use crate::resource::{
    Aggregate, Constant, RawColumn, ResolvedInputs, ResourceRef, TransformedColumn, Transformer,
};
use crate::userconfig::{AppConfig, ColumnType, RawColumnConfig};

#[derive(Serialize)]
struct RawColumnIdentity<'a> {
    environment_id: &'a str,
    config: &'a RawColumnConfig,
}

#[derive(Serialize)]
struct TransformedColumnIdentity<'a> {
    name: &'a str,
    transformer_id: &'a str,
    inputs: &'a ResolvedInputs,
    column_type: ColumnType,
}

pub(super) fn run_raw(state: &mut BuildState<'_>) -> Result<()> {
    let raw_columns = get_raw_columns(state.completed_config()?, &state.environment)?;
    state.raw_columns = Some(raw_columns);
    Ok(())
}

pub fn get_raw_columns(
    config: &AppConfig,
    environment: &Environment,
) -> Result<BTreeMap<String, RawColumn>> {
    let schema = &environment.data.schema;
    let mut columns = BTreeMap::new();

    for column in &config.raw_columns {
        if columns.contains_key(&column.name) {
            return Err(ContextError::config(format!(
                "duplicate raw column name: {}",
                column.name
            )));
        }

        if !schema.is_empty() && !schema.contains(&column.name) {
            return Err(ContextError::config(format!(
                "raw column {} is not in the schema of environment {}",
                column.name, environment.name
            )));
        }

        if let (Some(min), Some(max)) = (column.min, column.max) {
            if min > max {
                return Err(ContextError::config(format!(
                    "raw column {}: min ({}) is greater than max ({})",
                    column.name, min, max
                )));
            }
        }

        let id = digest_value(&RawColumnIdentity {
            environment_id: &environment.id,
            config: column,
        })?;

        columns.insert(
            column.name.clone(),
            RawColumn {
                id,
                name: column.name.clone(),
                column_type: column.column_type,
                required: column.required,
                min: column.min,
                max: column.max,
                values: column.values.clone(),
                tags: column.tags.clone(),
            },
        );
    }

    Ok(columns)
}

pub(super) fn run_transformed(state: &mut BuildState<'_>) -> Result<()> {
    let columns = get_transformed_columns(
        state.completed_config()?,
        require(&state.constants, CONSTANTS)?,
        require(&state.raw_columns, RAW_COLUMNS)?,
        require(&state.aggregates, AGGREGATES)?,
        require(&state.transformers, AGGREGATORS_TRANSFORMERS)?,
        &state.root,
    )?;
    state.transformed_columns = Some(columns);
    Ok(())
}

pub fn get_transformed_columns(
    config: &AppConfig,
    constants: &BTreeMap<String, Constant>,
    raw_columns: &BTreeMap<String, RawColumn>,
    aggregates: &BTreeMap<String, Aggregate>,
    transformers: &BTreeMap<String, Transformer>,
    root: &str,
) -> Result<BTreeMap<String, TransformedColumn>> {
    // Transformers read raw columns only
    let no_transformed = BTreeMap::new();
    let input_columns = columns_of(raw_columns, &no_transformed);
    let scope = Scope {
        columns: &input_columns,
        constants,
        aggregates: Some(aggregates),
    };

    let mut columns = BTreeMap::new();
    for column in &config.transformed_columns {
        if columns.contains_key(&column.name) || raw_columns.contains_key(&column.name) {
            return Err(ContextError::config(format!(
                "duplicate column name: {}",
                column.name
            )));
        }

        let transformer = transformers
            .get(&column.transformer)
            .ok_or_else(|| ContextError::not_found("transformer", &column.transformer))?;

        let inputs = resolve_inputs(&column.name, &column.inputs, transformer, &scope)?;

        let column_type = match column.output_type {
            Some(column_type) => column_type,
            None => transformer.output_type.parse()?,
        };

        let id = digest_value(&TransformedColumnIdentity {
            name: &column.name,
            transformer_id: &transformer.id,
            inputs: &inputs,
            column_type,
        })?;
        let key = transformed_column_key(root, &id);

        columns.insert(
            column.name.clone(),
            TransformedColumn {
                id,
                name: column.name.clone(),
                transformer: ResourceRef {
                    name: transformer.name.clone(),
                    id: transformer.id.clone(),
                },
                inputs,
                column_type,
                key,
            },
        );
    }

    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::test_support::environment;

    const CONFIG: &str = r#"
[app]
name = "fraud"

[environment.data]
schema = ["amount", "label"]

[[raw_columns]]
name = "amount"
type = "FLOAT_COLUMN"
min = 0.0
max = 1000000.0

[[raw_columns]]
name = "label"
type = "INT_COLUMN"
"#;

    #[test]
    fn test_raw_columns() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let env = environment(&config);
        let columns = get_raw_columns(&config, &env).unwrap();
        assert_eq!(columns.len(), 2);
        assert_eq!(columns["label"].column_type, ColumnType::Int);
    }

    #[test]
    fn test_raw_column_id_depends_on_environment() {
        let config = AppConfig::from_toml_str(CONFIG).unwrap();
        let env = environment(&config);
        let mut other_env = env.clone();
        other_env.id = "other".to_string();

        let a = get_raw_columns(&config, &env).unwrap();
        let b = get_raw_columns(&config, &other_env).unwrap();
        assert_ne!(a["amount"].id, b["amount"].id);
    }

    #[test]
    fn test_raw_column_outside_schema() {
        let config = AppConfig::from_toml_str(&CONFIG.replace("\"amount\", ", "")).unwrap();
        let env = environment(&config);
        let err = get_raw_columns(&config, &env).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }

    #[test]
    fn test_min_greater_than_max() {
        let config =
            AppConfig::from_toml_str(&CONFIG.replace("max = 1000000.0", "max = -1.0")).unwrap();
        let env = environment(&config);
        assert!(get_raw_columns(&config, &env).is_err());
    }
}
