use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use super::BuildState;
use crate::error::{ContextError, Result};
use crate::hash::digest_value;
use crate::resource::Constant;
use crate::userconfig::ConstantConfig;

#[derive(Serialize)]
struct ConstantIdentity<'a> {
    name: &'a str,
    value_type: &'a str,
    value: &'a Value,
}

pub(super) fn run(state: &mut BuildState<'_>) -> Result<()> {
    let constants = load_constants(&state.completed_config()?.constants)?;
    state.constants = Some(constants);
    Ok(())
}

pub fn load_constants(configs: &[ConstantConfig]) -> Result<BTreeMap<String, Constant>> {
    let mut constants = BTreeMap::new();

    for config in configs {
        if constants.contains_key(&config.name) {
            return Err(ContextError::config(format!(
                "duplicate constant name: {}",
                config.name
            )));
        }

        let id = digest_value(&ConstantIdentity {
            name: &config.name,
            value_type: &config.value_type,
            value: &config.value,
        })?;

        constants.insert(
            config.name.clone(),
            Constant {
                id,
                name: config.name.clone(),
                value_type: config.value_type.clone(),
                value: config.value.clone(),
            },
        );
    }

    Ok(constants)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(name: &str, value: Value) -> ConstantConfig {
        ConstantConfig {
            name: name.to_string(),
            value_type: "INT".to_string(),
            value,
        }
    }

    #[test]
    fn test_constant_id_tracks_value() {
        let a = load_constants(&[constant("n", Value::from(4))]).unwrap();
        let b = load_constants(&[constant("n", Value::from(5))]).unwrap();
        let c = load_constants(&[constant("n", Value::from(4))]).unwrap();
        assert_ne!(a["n"].id, b["n"].id);
        assert_eq!(a["n"].id, c["n"].id);
    }

    #[test]
    fn test_duplicate_constant() {
        let err = load_constants(&[constant("n", Value::from(1)), constant("n", Value::from(2))])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Config);
    }
}
