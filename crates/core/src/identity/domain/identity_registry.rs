use std::collections::HashMap;

use crate::shared::cluster_id::{ClusterId, CorpusGeneration};
use crate::shared::error::CoreError;

#[derive(Clone, Debug, PartialEq)]
struct NameEntry {
    name: String,
    assigned_in: CorpusGeneration,
}

/// Operator-assigned display names, keyed by cluster id.
///
/// Keys are bare integers: a name given to cluster `k` stays attached to
/// `k` across reprocessing, even when a new pass assigns different people
/// to `k`. Each entry remembers the generation it was assigned in so
/// callers can detect such stale names. Clearing is always explicit.
#[derive(Clone, Debug, Default)]
pub struct IdentityRegistry {
    names: HashMap<ClusterId, NameEntry>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored name, or the `Person <id>` placeholder.
    pub fn resolve_name(&self, cluster_id: ClusterId) -> String {
        self.names
            .get(&cluster_id)
            .map(|e| e.name.clone())
            .unwrap_or_else(|| placeholder_name(cluster_id))
    }

    /// Generation in which the stored name was assigned, if any.
    pub fn assigned_generation(&self, cluster_id: ClusterId) -> Option<CorpusGeneration> {
        self.names.get(&cluster_id).map(|e| e.assigned_in)
    }

    /// Upserts a name. Empty or whitespace-only names and the noise id are
    /// rejected without touching the registry.
    pub fn rename(
        &mut self,
        cluster_id: ClusterId,
        name: &str,
        generation: CorpusGeneration,
    ) -> Result<(), CoreError> {
        if name.trim().is_empty() {
            return Err(CoreError::InvalidArgument("name must not be empty".into()));
        }
        if cluster_id.is_noise() {
            return Err(CoreError::InvalidArgument(
                "noise observations cannot be named".into(),
            ));
        }
        self.names.insert(
            cluster_id,
            NameEntry {
                name: name.to_string(),
                assigned_in: generation,
            },
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

pub fn placeholder_name(cluster_id: ClusterId) -> String {
    format!("Person {cluster_id}")
}
