use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::identity::domain::identity_registry::IdentityRegistry;
use crate::shared::cluster_id::{ClusterId, CorpusGeneration};
use crate::shared::face_observation::FaceObservation;

/// One non-noise cluster as presented to callers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IdentitySummary {
    pub id: ClusterId,
    pub name: String,
    /// Crop of the first member observation.
    pub thumbnail_ref: String,
    pub image_refs: BTreeSet<String>,
    /// Generation the name was assigned in; `None` for placeholders. Older
    /// than the current generation means the name may describe someone else.
    pub name_generation: Option<CorpusGeneration>,
}

/// Builds one summary per non-noise cluster, ordered by cluster id.
pub fn summarize(
    observations: &[FaceObservation],
    registry: &IdentityRegistry,
) -> Vec<IdentitySummary> {
    let mut by_id: BTreeMap<ClusterId, IdentitySummary> = BTreeMap::new();
    for obs in observations.iter().filter(|o| !o.cluster_id.is_noise()) {
        by_id
            .entry(obs.cluster_id)
            .or_insert_with(|| IdentitySummary {
                id: obs.cluster_id,
                name: registry.resolve_name(obs.cluster_id),
                thumbnail_ref: obs.crop_reference.clone(),
                image_refs: BTreeSet::new(),
                name_generation: registry.assigned_generation(obs.cluster_id),
            })
            .image_refs
            .insert(obs.source_image.clone());
    }
    by_id.into_values().collect()
}
