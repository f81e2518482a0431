//! Built-in aggregators and transformers
//!
//! Built-ins live under the `strata.` namespace. Unqualified names resolve to
//! a user definition first, then to the built-in of the same name.

use std::collections::BTreeSet;

pub const NAMESPACE: &str = "strata";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Builtin {
    pub name: &'static str,
    pub output_type: &'static str,
    pub inputs: &'static [&'static str],
}

pub const AGGREGATORS: &[Builtin] = &[
    Builtin {
        name: "strata.mean",
        output_type: "FLOAT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.sum",
        output_type: "FLOAT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.count",
        output_type: "INT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.min",
        output_type: "FLOAT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.max",
        output_type: "FLOAT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.stddev",
        output_type: "FLOAT",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.class_distribution",
        output_type: "FLOAT_MAP",
        inputs: &["col"],
    },
    Builtin {
        name: "strata.bucket_boundaries",
        output_type: "FLOAT_LIST",
        inputs: &["col", "num_buckets"],
    },
    Builtin {
        name: "strata.index_string",
        output_type: "STRING_LIST",
        inputs: &["col"],
    },
];

pub const TRANSFORMERS: &[Builtin] = &[
    Builtin {
        name: "strata.normalize",
        output_type: "FLOAT_COLUMN",
        inputs: &["col", "mean", "stddev"],
    },
    Builtin {
        name: "strata.bucketize",
        output_type: "INT_COLUMN",
        inputs: &["col", "bucket_boundaries"],
    },
    Builtin {
        name: "strata.index_string",
        output_type: "INT_COLUMN",
        inputs: &["col", "index"],
    },
    Builtin {
        name: "strata.log",
        output_type: "FLOAT_COLUMN",
        inputs: &["col"],
    },
];

pub fn find(catalog: &'static [Builtin], name: &str) -> Option<&'static Builtin> {
    catalog.iter().find(|b| b.name == name)
}

/// Resolve a reference to its canonical name
///
/// Returns `None` when neither a user definition nor a built-in matches.
pub fn resolve(catalog: &'static [Builtin], user_names: &BTreeSet<String>, name: &str) -> Option<String> {
    if name.starts_with(&format!("{}.", NAMESPACE)) {
        return find(catalog, name).map(|b| b.name.to_string());
    }

    if user_names.contains(name) {
        return Some(name.to_string());
    }

    let qualified = format!("{}.{}", NAMESPACE, name);
    find(catalog, &qualified).map(|b| b.name.to_string())
}

pub fn is_builtin(name: &str) -> bool {
    name.starts_with(&format!("{}.", NAMESPACE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_prefers_user_definition() {
        let mut user = BTreeSet::new();
        user.insert("mean".to_string());
        assert_eq!(resolve(AGGREGATORS, &user, "mean").as_deref(), Some("mean"));
        assert_eq!(
            resolve(AGGREGATORS, &BTreeSet::new(), "mean").as_deref(),
            Some("strata.mean")
        );
    }

    #[test]
    fn test_resolve_qualified_and_unknown() {
        let user = BTreeSet::new();
        assert_eq!(
            resolve(TRANSFORMERS, &user, "strata.bucketize").as_deref(),
            Some("strata.bucketize")
        );
        assert_eq!(resolve(TRANSFORMERS, &user, "strata.median"), None);
        assert_eq!(resolve(AGGREGATORS, &user, "median"), None);
    }
}
