//! Whole-context identity
//!
//! The context id is the digest of the sorted concatenation of every resource
//! id plus the top-level scalar fields. Sorting makes the id independent of
//! stage execution order and of iteration order over resource sets.

use crate::context::Context;
use crate::hash::digest_str;
use crate::keys::KeyNamespace;

/// Digest of the sorted concatenation of `ids`
pub fn combine_ids<I, S>(ids: I) -> String
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut ids: Vec<String> = ids.into_iter().map(Into::into).collect();
    ids.sort();
    digest_str(&ids.concat())
}

pub fn calculate_id(ctx: &Context) -> String {
    let scalars = [
        ctx.global.id.as_str(),
        ctx.dataset_version.as_str(),
        ctx.root.as_str(),
        ctx.raw_dataset.key.as_str(),
        ctx.status_prefix.as_str(),
        ctx.app.id.as_str(),
        ctx.environment.id.as_str(),
    ];

    let resources = ctx.all_resources();
    combine_ids(scalars.into_iter().chain(resources.iter().map(|r| r.id())))
}

/// Compute and attach the id and storage key
pub(crate) fn assign(ctx: &mut Context, namespace: &KeyNamespace) {
    ctx.id = calculate_id(ctx);
    ctx.key = namespace.context_key(&ctx.app.name, &ctx.id);
}

/// Whether the stored id still matches the context content
pub fn verify(ctx: &Context) -> bool {
    !ctx.id.is_empty() && calculate_id(ctx) == ctx.id
}
