//! Signed API client for a graph-based access-control analysis service.
//!
//! Talks to a BloodHound Enterprise style attack-path API:
//! - signs every request with a chained HMAC-SHA256 signature
//! - retries transient failures with exponential backoff
//! - fetches controller/controllable counts, entity details and group members
//! - computes shortest-path statistics towards Domain Admins
//!
//! # Components
//!
//! - **Signer**: three-stage HMAC chain and request headers
//! - **ApiClient**: retrying HTTP executor returning typed outcomes
//! - **Fetchers**: counts, flattened entity records, member lists
//! - **Paths**: shortest-path classification and statistics
//!
//! # Example
//!
//! ```no_run
//! use rooted_client::{ApiClient, ClientConfig, Credential};
//!
//! # async fn run() -> rooted_client::ClientResult<()> {
//! let config = ClientConfig::new(
//!     "https://bhe.example.com",
//!     Credential::new("token-id", "token-key"),
//! );
//! let client = ApiClient::new(config)?;
//!
//! let record = client.user_info("S-1-5-21-1004336348-1177238915-682003330-1104").await?;
//! println!("tier zero: {}", record.is_tier_zero());
//! # Ok(())
//! # }
//! ```

pub mod batch;
mod client;
mod config;
mod error;
pub mod fetch;
pub mod path;
pub mod record;
pub mod signer;
mod table;

pub use batch::{enrich, enrich_groups, enrich_users, members_controllables_std, sample_std};
pub use client::{ApiClient, ApiOutcome};
pub use config::{
    ClientConfig, Credential, RetryPolicy, DEFAULT_TIMEOUT_SECS, ENV_BASE_URL, ENV_MAX_RETRIES,
    ENV_TIMEOUT_SECS, ENV_TOKEN_ID, ENV_TOKEN_KEY,
};
pub use error::{ClientError, ClientResult};
pub use fetch::{EntityKind, Relation};
pub use path::{default_end_node, PathOutcome, PathStats, RELATIONSHIP_KINDS};
pub use record::{EntityRecord, MergePolicy};
pub use reqwest::Method;
pub use signer::{RequestSigner, SignedRequest, SigningInput};
pub use table::Table;
