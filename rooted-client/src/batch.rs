//! Bulk enrichment helpers.
//!
//! Each entity is an independent unit of work sharing only the client. A
//! unit that fails becomes an error record; it never stops the batch.

use crate::client::ApiClient;
use crate::fetch::EntityKind;
use crate::record::EntityRecord;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Fetches and enriches many entities, at most `concurrency` at a time.
/// Output order matches `ids`.
pub async fn enrich(
    client: &ApiClient,
    kind: EntityKind,
    ids: &[String],
    concurrency: usize,
) -> Vec<EntityRecord> {
    stream::iter(ids)
        .map(|id| async move {
            match client.entity_info(kind, id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!(%kind, id = %id, error = %e, "enrichment failed");
                    EntityRecord::failed(id, e.to_string())
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

pub async fn enrich_users(
    client: &ApiClient,
    ids: &[String],
    concurrency: usize,
) -> Vec<EntityRecord> {
    enrich(client, EntityKind::User, ids, concurrency).await
}

pub async fn enrich_groups(
    client: &ApiClient,
    ids: &[String],
    concurrency: usize,
) -> Vec<EntityRecord> {
    enrich(client, EntityKind::Group, ids, concurrency).await
}

/// Sample standard deviation (n - 1). `None` for fewer than two values.
#[must_use]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Spread of controllables counts across a group's members.
///
/// `controllables` maps user ids to their controllables count, typically
/// built from previously enriched user records. Members missing from it are
/// ignored. `None` when the member listing fails or fewer than two members
/// have a count.
pub async fn members_controllables_std(
    client: &ApiClient,
    group_id: &str,
    controllables: &HashMap<String, u64>,
) -> Option<f64> {
    let members = match client.group_members(group_id).await {
        Ok(members) => members,
        Err(e) => {
            warn!(group_id, error = %e, "member listing failed");
            return None;
        }
    };

    let counts: Vec<f64> = members
        .iter()
        .filter_map(|id| controllables.get(id))
        .map(|c| *c as f64)
        .collect();
    debug!(group_id, members = members.len(), counted = counts.len(), "member dispersion");

    sample_std(&counts)
}
