//! Resolution of aggregate and transformer inputs to resource references

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ContextError, Result};
use crate::resource::{
    Aggregate, ArgValue, Column, Constant, Function, ResolvedInputs, ResourceRef,
};
use crate::userconfig::{as_reference, InputsConfig};

pub(super) struct Scope<'a> {
    pub columns: &'a BTreeMap<&'a str, Column<'a>>,
    pub constants: &'a BTreeMap<String, Constant>,
    /// Aggregates that args may reference; `None` while aggregates are being derived
    pub aggregates: Option<&'a BTreeMap<String, Aggregate>>,
}

/// Resolve inputs and check them against the function's declared inputs
pub(super) fn resolve_inputs(
    owner: &str,
    inputs: &InputsConfig,
    function: &Function,
    scope: &Scope<'_>,
) -> Result<ResolvedInputs> {
    let declared: BTreeSet<&str> = function.inputs.iter().map(String::as_str).collect();
    let provided: BTreeSet<&str> = inputs
        .columns
        .keys()
        .chain(inputs.args.keys())
        .map(String::as_str)
        .collect();

    if let Some(extra) = provided.difference(&declared).next() {
        return Err(ContextError::Validation(format!(
            "{}: {} has no input named {}",
            owner, function.name, extra
        )));
    }

    if let Some(missing) = declared.difference(&provided).next() {
        return Err(ContextError::Validation(format!(
            "{}: missing input {} for {}",
            owner, missing, function.name
        )));
    }

    let mut resolved = ResolvedInputs::default();

    for (input, column_ref) in &inputs.columns {
        if inputs.args.contains_key(input) {
            return Err(ContextError::Validation(format!(
                "{}: input {} is given both as a column and as an arg",
                owner, input
            )));
        }

        let columns = column_ref
            .names()
            .into_iter()
            .map(|name| {
                scope
                    .columns
                    .get(name)
                    .map(Column::to_ref)
                    .ok_or_else(|| ContextError::not_found("column", name))
            })
            .collect::<Result<Vec<_>>>()?;
        resolved.columns.insert(input.clone(), columns);
    }

    for (input, value) in &inputs.args {
        let arg = match as_reference(value) {
            Some(name) => resolve_reference(name, scope)?,
            None => ArgValue::Literal(value.clone()),
        };
        resolved.args.insert(input.clone(), arg);
    }

    Ok(resolved)
}

fn resolve_reference(name: &str, scope: &Scope<'_>) -> Result<ArgValue> {
    if let Some(constant) = scope.constants.get(name) {
        return Ok(ArgValue::Constant(ResourceRef {
            name: constant.name.clone(),
            id: constant.id.clone(),
        }));
    }

    if let Some(aggregate) = scope.aggregates.and_then(|a| a.get(name)) {
        return Ok(ArgValue::Aggregate(ResourceRef {
            name: aggregate.name.clone(),
            id: aggregate.id.clone(),
        }));
    }

    let what = if scope.aggregates.is_some() {
        "constant or aggregate"
    } else {
        "constant"
    };
    Err(ContextError::not_found(what, name))
}
