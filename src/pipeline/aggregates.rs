use serde::Serialize;
use std::collections::BTreeMap;

use super::inputs::{resolve_inputs, Scope};
use super::{require, BuildState, AGGREGATORS_TRANSFORMERS, CONSTANTS, RAW_COLUMNS};
use crate::context::columns_of;
use crate::error::{ContextError, Result};
use crate::hash::digest_value;
use crate::keys::aggregate_key;
use crate::resource::{Aggregate, Aggregator, Constant, RawColumn, ResolvedInputs, ResourceRef};
use crate::userconfig::AppConfig;

#[derive(Serialize)]
struct AggregateIdentity<'a> {
    name: &'a str,
    aggregator_id: &'a str,
    inputs: &'a ResolvedInputs,
    output_type: &'a str,
}

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let aggregates = get_aggregates(
        state.completed_config()?,
        require(&state.constants, CONSTANTS)?,
        require(&state.raw_columns, RAW_COLUMNS)?,
        require(&state.aggregators, AGGREGATORS_TRANSFORMERS)?,
        &state.root,
    )?;
    state.aggregates = Some(aggregates);
    Ok(())
}

pub fn get_aggregates(
    config: &AppConfig,
    constants: &BTreeMap<String, Constant>,
    raw_columns: &BTreeMap<String, RawColumn>,
    aggregators: &BTreeMap<String, Aggregator>,
    root: &str,
) -> Result<BTreeMap<String, Aggregate>> {
    let no_transformed = BTreeMap::new();
    let input_columns = columns_of(raw_columns, &no_transformed);
    let scope = Scope {
        columns: &input_columns,
        constants,
        aggregates: None,
    };

    let mut aggregates = BTreeMap::new();
    for config in &config.aggregates {
        if aggregates.contains_key(&config.name) {
            return Err(ContextError::config(format!(
                "duplicate aggregate name: {}",
                config.name
            )));
        }

        let aggregator = aggregators
            .get(&config.aggregator)
            .ok_or_else(|| ContextError::not_found("aggregator", &config.aggregator))?;

        let inputs = resolve_inputs(&config.name, &config.inputs, aggregator, &scope)?;
        let output_type = config
            .output_type
            .clone()
            .unwrap_or_else(|| aggregator.output_type.clone());

        let id = digest_value(&AggregateIdentity {
            name: &config.name,
            aggregator_id: &aggregator.id,
            inputs: &inputs,
            output_type: &output_type,
        })?;
        let key = aggregate_key(root, &id);

        aggregates.insert(
            config.name.clone(),
            Aggregate {
                id,
                name: config.name.clone(),
                aggregator: ResourceRef {
                    name: aggregator.name.clone(),
                    id: aggregator.id.clone(),
                },
                inputs,
                output_type,
                key,
            },
        );
    }

    Ok(aggregates)
}
