//! Dataset version resolution
//!
//! A dataset version names the snapshot of raw data a context was built
//! against. It is reused across builds of the same application until a caller
//! asks for invalidation, which is what keeps context ids (and therefore
//! cached artifacts) stable between builds.

use chrono::Utc;
use rand::Rng;
use std::sync::Arc;
use tracing::info;

use crate::error::{ContextError, Result};
use crate::logging::{operations, status};
use crate::storage::VersionStore;

type Generator = Box<dyn Fn() -> String + Send + Sync>;

/// Fresh version token: UTC timestamp plus a random suffix
pub fn new_version_token() -> String {
    let suffix: u32 = rand::rng().random();
    format!("{}-{:08x}", Utc::now().format("%Y-%m-%d-%H-%M-%S-%6f"), suffix)
}

pub struct DatasetVersionResolver {
    store: Arc<dyn VersionStore>,
    generate: Generator,
}

impl DatasetVersionResolver {
    pub fn new(store: Arc<dyn VersionStore>) -> Self {
        Self {
            store,
            generate: Box::new(new_version_token),
        }
    }

    /// Replace the token generator
    pub fn with_generator<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.generate = Box::new(generate);
        self
    }

    /// Return the current version of `app_name`, creating one if needed
    ///
    /// With `force_invalidate` a fresh version always replaces the current
    /// one. The write is a compare-and-swap against the version read at the
    /// start, so concurrent first builds converge on a single version: the
    /// loser of the race adopts the winner's token instead of its own.
    pub fn resolve(&self, app_name: &str, force_invalidate: bool) -> Result<String> {
        let current = self.store.current(app_name)?;

        if !force_invalidate {
            if let Some(version) = current {
                info!(
                    operation = operations::RESOLVE_VERSION,
                    status = status::HIT,
                    app = app_name,
                    dataset_version = %version,
                    "dataset version reused"
                );
                return Ok(version);
            }
        }

        let mut fresh = (self.generate)();
        while current.as_deref() == Some(fresh.as_str()) {
            fresh = (self.generate)();
        }

        if self
            .store
            .compare_and_swap(app_name, current.as_deref(), &fresh)?
        {
            let outcome = if current.is_some() {
                status::INVALIDATED
            } else {
                status::CREATED
            };
            info!(
                operation = operations::RESOLVE_VERSION,
                status = outcome,
                app = app_name,
                dataset_version = %fresh,
                "dataset version created"
            );
            return Ok(fresh);
        }

        // Another build replaced the version between our read and write
        let winner = self
            .store
            .current(app_name)?
            .ok_or_else(|| ContextError::not_found("dataset version", app_name))?;

        info!(
            operation = operations::RESOLVE_VERSION,
            status = status::CONFLICT,
            app = app_name,
            dataset_version = %winner,
            "dataset version set concurrently, adopting it"
        );

        Ok(winner)
    }
}
