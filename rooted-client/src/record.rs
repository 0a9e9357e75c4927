//! Flat entity records.
//!
//! The service nests most entity attributes under `props`. A record lifts
//! them to the top level next to the remaining `data` fields, so one entity
//! becomes one flat row.

use crate::error::{ClientError, ClientResult};
use crate::path::PathOutcome;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// Nested attribute object inside `data`.
pub const PROPS_FIELD: &str = "props";
/// Identifier field of error records.
pub const OBJECT_ID_FIELD: &str = "objectID";
/// Marker field set on records that could not be fetched.
pub const ERROR_FIELD: &str = "error";
/// Error text for entities the service returned nothing for.
pub const NO_DATA: &str = "No data";
/// Field listing the entity's system tags.
pub const SYSTEM_TAGS_FIELD: &str = "system_tags";
/// Tag marking Tier Zero entities. Also the name of the derived flag.
pub const TIER_ZERO_TAG: &str = "admin_tier_0";

pub const CONTROLLABLES_FIELD: &str = "controllables";
pub const CONTROLLERS_FIELD: &str = "controllers";
pub const MEMBERS_FIELD: &str = "members";
pub const CONTROL_RISK_FIELD: &str = "control_risk";

pub const PATH_NODE_COUNT_FIELD: &str = "path_da_nnodes";
pub const PATH_EDGE_COUNT_FIELD: &str = "path_da_nedges";
pub const PATH_NODES_FIELD: &str = "path_da_nodes";
pub const PATH_EDGES_FIELD: &str = "path_da_edges";
pub const PATH_OBJECT_IDS_FIELD: &str = "path_da_nodes_oidlist";
pub const PATH_STATUS_FIELD: &str = "path_da_status";
pub const PATH_ERROR_FIELD: &str = "path_da_error";

/// How `props` fields are merged with top-level fields of the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// The `props` value replaces the top-level one.
    #[default]
    PropsWin,
    /// The top-level value is kept.
    TopLevelWins,
    /// Any collision with differing values is an error.
    Reject,
}

/// One flattened entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRecord {
    fields: Map<String, Value>,
}

impl EntityRecord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The record returned when the service had nothing for `id`.
    #[must_use]
    pub fn no_data(id: &str) -> Self {
        Self::failed(id, NO_DATA)
    }

    /// A record carrying only the id and an error marker.
    #[must_use]
    pub fn failed(id: &str, message: impl Into<String>) -> Self {
        let mut record = Self::new();
        record.insert(OBJECT_ID_FIELD, Value::String(id.to_string()));
        record.insert(ERROR_FIELD, Value::String(message.into()));
        record
    }

    /// Flattens a `data` object: top-level fields first, then `props`
    /// merged under `policy`.
    pub fn flatten(data: &Map<String, Value>, policy: MergePolicy) -> ClientResult<Self> {
        let mut fields: Map<String, Value> = data
            .iter()
            .filter(|(k, _)| k.as_str() != PROPS_FIELD)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let props = match data.get(PROPS_FIELD) {
            None | Some(Value::Null) => return Ok(Self { fields }),
            Some(Value::Object(props)) => props,
            Some(other) => {
                return Err(ClientError::Malformed(format!(
                    "`{PROPS_FIELD}` is not an object: {other}"
                )));
            }
        };

        for (key, value) in props {
            match fields.get(key) {
                Some(existing) if existing != value => match policy {
                    MergePolicy::PropsWin => {
                        warn!(field = %key, "props value overrides top-level field");
                        fields.insert(key.clone(), value.clone());
                    }
                    MergePolicy::TopLevelWins => {
                        warn!(field = %key, "keeping top-level field over props value");
                    }
                    MergePolicy::Reject => {
                        return Err(ClientError::FieldConflict(format!(
                            "`{key}` differs between top level ({existing}) and props ({value})"
                        )));
                    }
                },
                Some(_) => {}
                None => {
                    fields.insert(key.clone(), value.clone());
                }
            }
        }

        Ok(Self { fields })
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    #[must_use]
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    /// The error marker, if this record stands in for a failed fetch.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.get(ERROR_FIELD).and_then(Value::as_str)
    }

    /// Derives the Tier Zero flag from `system_tags` and stores it under
    /// [`TIER_ZERO_TAG`], replacing any value that came from `props`.
    pub fn apply_tier_zero(&mut self) -> bool {
        let tier_zero = self
            .get(SYSTEM_TAGS_FIELD)
            .is_some_and(|tags| has_tag(tags, TIER_ZERO_TAG));
        self.insert(TIER_ZERO_TAG, Value::Bool(tier_zero));
        tier_zero
    }

    #[must_use]
    pub fn is_tier_zero(&self) -> bool {
        self.get(TIER_ZERO_TAG).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Sets `key` to 0 unless present.
    pub fn default_zero(&mut self, key: &str) {
        if !self.contains_key(key) {
            self.insert(key, Value::from(0u64));
        }
    }

    /// Reads a numeric field as a count. Missing or non-numeric reads as 0.
    #[must_use]
    pub fn count(&self, key: &str) -> u64 {
        match self.get(key) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }

    /// Writes the path-to-target fields for a classified path query.
    pub fn apply_path(&mut self, outcome: &PathOutcome) {
        let stats = outcome.stats();
        self.insert(PATH_NODE_COUNT_FIELD, Value::from(stats.node_count));
        self.insert(PATH_EDGE_COUNT_FIELD, Value::from(stats.edge_count));
        self.insert(PATH_NODES_FIELD, stats.node_table.to_value());
        self.insert(PATH_EDGES_FIELD, stats.edge_table.to_value());
        self.insert(
            PATH_OBJECT_IDS_FIELD,
            Value::Array(stats.node_object_ids.into_iter().map(Value::String).collect()),
        );
        self.insert(PATH_STATUS_FIELD, Value::String(outcome.status().to_string()));
        if let Some(message) = outcome.error_message() {
            self.insert(PATH_ERROR_FIELD, Value::String(message.to_string()));
        }
    }

    /// Writes absent path fields for a path query that could not be
    /// interpreted, keeping the reason.
    pub fn apply_path_error(&mut self, message: impl Into<String>) {
        self.apply_path(&PathOutcome::NoPath);
        self.insert(PATH_STATUS_FIELD, Value::String("error".to_string()));
        self.insert(PATH_ERROR_FIELD, Value::String(message.into()));
    }

    /// Group risk score:
    /// `(controllables+1) + (controllers+1) + (path_da_nedges+1) + (members+1)`.
    pub fn apply_control_risk(&mut self) -> u64 {
        let risk: u64 = [
            CONTROLLABLES_FIELD,
            CONTROLLERS_FIELD,
            PATH_EDGE_COUNT_FIELD,
            MEMBERS_FIELD,
        ]
        .iter()
        .map(|key| self.count(key) + 1)
        .sum();
        self.insert(CONTROL_RISK_FIELD, Value::from(risk));
        risk
    }
}

/// Whether `tags` contains `tag`.
///
/// A tag string matches when `tag` appears anywhere in it; the service does
/// not fix a separator. An array matches on an exact element.
#[must_use]
pub fn has_tag(tags: &Value, tag: &str) -> bool {
    match tags {
        Value::String(s) => s.contains(tag),
        Value::Array(items) => items.iter().filter_map(Value::as_str).any(|t| t == tag),
        _ => false,
    }
}
