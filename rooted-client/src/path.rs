//! Shortest attack path statistics.
//!
//! The service computes the path; this module builds the query and turns the
//! graph payload into counts, node and edge tables, and the list of node
//! object ids on the path.
//!
//! # Default target
//!
//! Without an explicit end node the target is the Domain Admins group of the
//! start node's domain. Ids are assumed to be domain-prefixed relative ids
//! (`S-1-5-21-<domain>-<rid>`): the last `-` segment is replaced with `512`.

use crate::client::{ApiClient, ApiOutcome};
use crate::error::{ClientError, ClientResult};
use crate::table::Table;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Relative id of the Domain Admins group.
pub const DOMAIN_ADMINS_RID: &str = "512";

/// Edge kinds a path may traverse.
pub const RELATIONSHIP_KINDS: [&str; 30] = [
    "Owns",
    "GenericAll",
    "GenericWrite",
    "WriteOwner",
    "WriteDacl",
    "MemberOf",
    "ForceChangePassword",
    "AllExtendedRights",
    "AddMember",
    "HasSession",
    "Contains",
    "GPLink",
    "AllowedToDelegate",
    "TrustedBy",
    "AllowedToAct",
    "AdminTo",
    "CanPSRemote",
    "ExecuteDCOM",
    "HasSIDHistory",
    "AddSelf",
    "DCSync",
    "ReadLAPSPassword",
    "ReadGMSAPassword",
    "DumpSMSAPassword",
    "SQLAdmin",
    "AddAllowedToAct",
    "WriteSPN",
    "AddKeyCredentialLink",
    "SyncLAPSPassword",
    "WriteAccountRestrictions",
];

/// Node attribute holding the object id.
pub const NODE_OBJECT_ID_FIELD: &str = "objectId";
/// Index column of the node table.
pub const NODE_INDEX_FIELD: &str = "id";

/// The `relationship_kinds` filter before encoding: `in:Owns,GenericAll,...`.
#[must_use]
pub fn relationship_filter() -> String {
    format!("in:{}", RELATIONSHIP_KINDS.join(","))
}

/// Derives the Domain Admins id for the domain of `start`.
#[must_use]
pub fn default_end_node(start: &str) -> String {
    let domain = start.rfind('-').map_or("", |i| &start[..i]);
    format!("{domain}-{DOMAIN_ADMINS_RID}")
}

/// Query path for a shortest-path request.
#[must_use]
pub fn shortest_path_uri(start: &str, end: &str) -> String {
    format!(
        "/api/v2/graphs/shortest-path?start_node={start}&end_node={end}&relationship_kinds={}",
        urlencoding::encode(&relationship_filter())
    )
}

/// Path statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PathStats {
    pub node_count: usize,
    pub edge_count: usize,
    /// Nodes indexed by graph id.
    pub node_table: Table,
    pub edge_table: Table,
    /// `objectId` of every node, in node order.
    pub node_object_ids: Vec<String>,
}

impl PathStats {
    /// No path: zero counts, empty tables.
    #[must_use]
    pub fn absent() -> Self {
        Self::default()
    }

    /// Stats view of an unexpected service error: one node, one edge,
    /// empty tables.
    #[must_use]
    pub fn unexpected() -> Self {
        Self {
            node_count: 1,
            edge_count: 1,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        *self == Self::absent()
    }

    /// Parses the `data` object of a shortest-path response.
    pub fn from_payload(data: &Value) -> ClientResult<Self> {
        let nodes = data
            .get("nodes")
            .and_then(Value::as_object)
            .ok_or_else(|| {
                ClientError::Malformed("path payload has no `nodes` object".to_string())
            })?;
        let edges = data
            .get("edges")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                ClientError::Malformed("path payload has no `edges` array".to_string())
            })?;

        let mut node_rows = Vec::with_capacity(nodes.len());
        let mut node_object_ids = Vec::with_capacity(nodes.len());
        for (id, attrs) in nodes {
            let mut row: Map<String, Value> = attrs
                .as_object()
                .cloned()
                .ok_or_else(|| ClientError::Malformed(format!("node {id} is not an object")))?;
            let object_id = row
                .get(NODE_OBJECT_ID_FIELD)
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    ClientError::Malformed(format!("node {id} has no `{NODE_OBJECT_ID_FIELD}`"))
                })?;
            node_object_ids.push(object_id.to_string());
            row.insert(NODE_INDEX_FIELD.to_string(), Value::String(id.clone()));
            node_rows.push(row);
        }

        let edge_rows = edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                edge.as_object()
                    .cloned()
                    .ok_or_else(|| ClientError::Malformed(format!("edge {i} is not an object")))
            })
            .collect::<ClientResult<Vec<_>>>()?;

        let node_table = Table::from_records(node_rows, Some(NODE_INDEX_FIELD));
        let edge_table = Table::from_records(edge_rows, None);

        Ok(Self {
            node_count: node_table.len(),
            edge_count: edge_table.len(),
            node_table,
            edge_table,
            node_object_ids,
        })
    }
}

/// Classified shortest-path result.
#[derive(Debug, Clone, PartialEq)]
pub enum PathOutcome {
    /// The service returned a path.
    Found(PathStats),
    /// The service reported that no path (or node) exists.
    NoPath,
    /// The service could not be reached or answered with a failure status.
    Unreachable { reason: String },
    /// The service answered with an error message it does not usually send.
    Unexpected { message: String },
}

impl PathOutcome {
    /// Interprets a shortest-path response.
    ///
    /// Fails only when a successful response does not have the expected
    /// shape.
    pub fn classify(outcome: ApiOutcome) -> ClientResult<Self> {
        match outcome {
            ApiOutcome::Success(body) => {
                if let Some(data) = body.get("data") {
                    return PathStats::from_payload(data).map(PathOutcome::Found);
                }
                match error_message(&body) {
                    Some(message) => Ok(Self::from_error_message(message)),
                    None => Err(ClientError::Malformed(
                        "path response has neither `data` nor `errors`".to_string(),
                    )),
                }
            }
            ApiOutcome::NotFound(body) => Ok(body
                .as_ref()
                .and_then(error_message)
                .map_or(PathOutcome::NoPath, Self::from_error_message)),
            other @ (ApiOutcome::Status { .. } | ApiOutcome::Transport(_)) => {
                Ok(PathOutcome::Unreachable {
                    reason: other.describe(),
                })
            }
        }
    }

    fn from_error_message(message: &str) -> Self {
        if is_not_found(message) {
            PathOutcome::NoPath
        } else {
            PathOutcome::Unexpected {
                message: message.to_string(),
            }
        }
    }

    /// Five-field stats view. `NoPath` and `Unreachable` read as
    /// [`PathStats::absent`], `Unexpected` as [`PathStats::unexpected`].
    #[must_use]
    pub fn stats(&self) -> PathStats {
        match self {
            PathOutcome::Found(stats) => stats.clone(),
            PathOutcome::NoPath | PathOutcome::Unreachable { .. } => PathStats::absent(),
            PathOutcome::Unexpected { .. } => PathStats::unexpected(),
        }
    }

    /// Short status label stored on records.
    #[must_use]
    pub fn status(&self) -> &'static str {
        match self {
            PathOutcome::Found(_) => "found",
            PathOutcome::NoPath => "no_path",
            PathOutcome::Unreachable { .. } => "unreachable",
            PathOutcome::Unexpected { .. } => "unexpected",
        }
    }

    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            PathOutcome::Unreachable { reason } => Some(reason),
            PathOutcome::Unexpected { message } => Some(message),
            _ => None,
        }
    }
}

/// `errors[0].message` of an error envelope.
fn error_message(body: &Value) -> Option<&str> {
    body.get("errors")?
        .as_array()?
        .first()?
        .get("message")?
        .as_str()
}

/// Matches both "Path not found" and generic "... not found" messages.
fn is_not_found(message: &str) -> bool {
    message.to_ascii_lowercase().contains("not found")
}

impl ApiClient {
    /// Shortest path from `start` to `end`, or to the Domain Admins group of
    /// the start node's domain when `end` is `None` or empty.
    pub async fn shortest_path(&self, start: &str, end: Option<&str>) -> ClientResult<PathOutcome> {
        let end = match end.filter(|e| !e.is_empty()) {
            Some(end) => end.to_string(),
            None => default_end_node(start),
        };

        let outcome = self.get(&shortest_path_uri(start, &end)).await;
        let path = PathOutcome::classify(outcome)?;

        match &path {
            PathOutcome::Found(stats) => {
                debug!(
                    start,
                    end = %end,
                    nodes = stats.node_count,
                    edges = stats.edge_count,
                    "path found"
                );
            }
            PathOutcome::NoPath => debug!(start, end = %end, "no path"),
            PathOutcome::Unreachable { reason } => {
                debug!(start, end = %end, reason = %reason, "path query failed");
            }
            PathOutcome::Unexpected { message } => {
                warn!(start, end = %end, message = %message, "unexpected path query error");
            }
        }

        Ok(path)
    }
}
