//! Post-assembly validation of a context
//!
//! The validator sees the fully populated context before its identity is
//! computed. Any error rejects the whole build.

use std::collections::BTreeMap;

use crate::context::Context;
use crate::error::{ContextError, Result};
use crate::resource::ResourceKind;

pub trait Validator: Send + Sync {
    fn validate(&self, ctx: &Context) -> Result<()>;
}

impl<F> Validator for F
where
    F: Fn(&Context) -> Result<()> + Send + Sync,
{
    fn validate(&self, ctx: &Context) -> Result<()> {
        self(ctx)
    }
}

/// Structural checks that hold for every context
///
/// - Columns, aggregates and constants share one name space, since `@name`
///   arguments look them up by name.
/// - Artifact keys are unique.
/// - Every resource id is a full-length digest.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralValidator;

impl Validator for StructuralValidator {
    fn validate(&self, ctx: &Context) -> Result<()> {
        let mut names: BTreeMap<&str, ResourceKind> = BTreeMap::new();
        for resource in ctx.all_resources() {
            let kind = resource.kind();
            if !matches!(
                kind,
                ResourceKind::RawColumn
                    | ResourceKind::TransformedColumn
                    | ResourceKind::Aggregate
                    | ResourceKind::Constant
            ) {
                continue;
            }

            if let Some(previous) = names.insert(resource.name(), kind) {
                return Err(ContextError::Validation(format!(
                    "name {} is used by both a {} and a {}",
                    resource.name(),
                    previous,
                    kind
                )));
            }
        }

        let mut keys: BTreeMap<&str, &str> = BTreeMap::new();
        for resource in ctx.all_resources() {
            if resource.id().len() != crate::hash::DIGEST_LEN {
                return Err(ContextError::Validation(format!(
                    "{} {} has a malformed id",
                    resource.kind(),
                    resource.name()
                )));
            }

            let Some(key) = resource.key() else {
                continue;
            };
            if let Some(other) = keys.insert(key, resource.name()) {
                // Identical user plugin implementations share an artifact
                if other != resource.name() && !is_implementation_key(key) {
                    return Err(ContextError::Validation(format!(
                        "{} and {} resolve to the same artifact key {}",
                        other,
                        resource.name(),
                        key
                    )));
                }
            }
        }

        Ok(())
    }
}

fn is_implementation_key(key: &str) -> bool {
    key.contains(&format!("/{}/", crate::keys::IMPLEMENTATIONS_DIR))
}
