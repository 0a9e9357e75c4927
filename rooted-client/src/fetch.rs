//! Entity fetchers: counts, entity info records and group membership.

use crate::client::{ApiClient, ApiOutcome};
use crate::error::{ClientError, ClientResult};
use crate::record::{
    EntityRecord, MergePolicy, CONTROLLABLES_FIELD, CONTROLLERS_FIELD, MEMBERS_FIELD,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info};

/// Page size for count queries; only `count` is read.
pub const COUNT_LIMIT: u32 = 1;
/// Page size for member listings, large enough to avoid paging.
pub const MEMBERS_LIMIT: u32 = 100_000;
/// Member identifier field.
pub const MEMBER_ID_FIELD: &str = "objectID";

/// Entity collection on the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Group,
}

impl EntityKind {
    /// URL segment of the collection.
    #[must_use]
    pub fn collection(&self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Group => "groups",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => f.write_str("user"),
            Self::Group => f.write_str("group"),
        }
    }
}

/// Direction of a control relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relation {
    /// Entities that control the subject.
    Controllers,
    /// Entities the subject controls.
    Controllables,
}

impl Relation {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Controllers => "controllers",
            Self::Controllables => "controllables",
        }
    }
}

#[must_use]
pub fn entity_path(kind: EntityKind, id: &str) -> String {
    format!("/api/v2/{}/{id}", kind.collection())
}

#[must_use]
pub fn count_path(kind: EntityKind, relation: Relation, id: &str) -> String {
    format!(
        "/api/v2/{}/{id}/{}?limit={COUNT_LIMIT}",
        kind.collection(),
        relation.as_str()
    )
}

#[must_use]
pub fn members_path(group_id: &str) -> String {
    format!("/api/v2/groups/{group_id}/members?limit={MEMBERS_LIMIT}")
}

/// Flattens an entity info response into a record with the Tier Zero flag.
///
/// A body without `data` yields a record holding only the derived flag.
pub fn flatten_entity(body: &Value, policy: MergePolicy) -> ClientResult<EntityRecord> {
    let mut record = match body.get("data") {
        None => EntityRecord::new(),
        Some(Value::Object(data)) => EntityRecord::flatten(data, policy)?,
        Some(other) => {
            return Err(ClientError::Malformed(format!(
                "entity `data` is not an object: {other}"
            )));
        }
    };
    record.apply_tier_zero();
    Ok(record)
}

/// Member ids from a member listing, in response order.
pub fn member_ids(body: &Value) -> ClientResult<Vec<String>> {
    let members = match body.get("data") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(members)) => members,
        Some(other) => {
            return Err(ClientError::Malformed(format!(
                "member `data` is not an array: {other}"
            )));
        }
    };

    members
        .iter()
        .map(|member| {
            member
                .get(MEMBER_ID_FIELD)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| {
                    ClientError::Malformed(format!("member without `{MEMBER_ID_FIELD}`: {member}"))
                })
        })
        .collect()
}

impl ApiClient {
    /// Number of controllers or controllables of an entity.
    pub async fn count(&self, kind: EntityKind, relation: Relation, id: &str) -> ClientResult<u64> {
        let what = format!("{} of {kind} {id}", relation.as_str());
        let outcome = self.get(&count_path(kind, relation, id)).await;

        let body = match outcome {
            ApiOutcome::Success(body) => body,
            other => return Err(ClientError::fetch_failed(what, other.describe())),
        };

        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClientError::fetch_failed(what, "response has no integer `count`"))
    }

    pub async fn user_controllables_count(&self, user_id: &str) -> ClientResult<u64> {
        self.count(EntityKind::User, Relation::Controllables, user_id).await
    }

    pub async fn user_controllers_count(&self, user_id: &str) -> ClientResult<u64> {
        self.count(EntityKind::User, Relation::Controllers, user_id).await
    }

    pub async fn group_controllables_count(&self, group_id: &str) -> ClientResult<u64> {
        self.count(EntityKind::Group, Relation::Controllables, group_id).await
    }

    pub async fn group_controllers_count(&self, group_id: &str) -> ClientResult<u64> {
        self.count(EntityKind::Group, Relation::Controllers, group_id).await
    }

    /// The raw user info response, `None` when the request failed.
    pub async fn user_info_raw(&self, user_id: &str) -> Option<Value> {
        self.get(&entity_path(EntityKind::User, user_id)).await.into_json()
    }

    /// Flattened user record enriched with path-to-Domain-Admins stats.
    pub async fn user_info(&self, user_id: &str) -> ClientResult<EntityRecord> {
        self.entity_info(EntityKind::User, user_id).await
    }

    /// Flattened group record enriched with path-to-Domain-Admins stats and
    /// a control risk score.
    pub async fn group_info(&self, group_id: &str) -> ClientResult<EntityRecord> {
        self.entity_info(EntityKind::Group, group_id).await
    }

    /// Fetches and flattens one entity.
    ///
    /// A failed request yields `{objectID, error: "No data"}`. A path query
    /// that cannot be interpreted is recorded on the record instead of
    /// failing the fetch.
    pub async fn entity_info(&self, kind: EntityKind, id: &str) -> ClientResult<EntityRecord> {
        let outcome = self.get(&entity_path(kind, id)).await;
        let body = match outcome {
            ApiOutcome::Success(body) => body,
            other => {
                debug!(%kind, id, outcome = %other.describe(), "no entity data");
                return Ok(EntityRecord::no_data(id));
            }
        };

        let mut record = flatten_entity(&body, self.config().merge_policy)?;

        match self.shortest_path(id, None).await {
            Ok(path) => record.apply_path(&path),
            Err(e) => record.apply_path_error(e.to_string()),
        }

        record.default_zero(CONTROLLABLES_FIELD);
        record.default_zero(CONTROLLERS_FIELD);
        if kind == EntityKind::Group {
            record.default_zero(MEMBERS_FIELD);
            record.apply_control_risk();
        }

        info!(%kind, id, tier_zero = record.is_tier_zero(), "entity enriched");
        Ok(record)
    }

    /// Ids of a group's members. Empty when the request fails or the
    /// response has no `data`.
    pub async fn group_members(&self, group_id: &str) -> ClientResult<Vec<String>> {
        match self.get(&members_path(group_id)).await {
            ApiOutcome::Success(body) => member_ids(&body),
            other => {
                debug!(group_id, outcome = %other.describe(), "no member data");
                Ok(Vec::new())
            }
        }
    }
}
