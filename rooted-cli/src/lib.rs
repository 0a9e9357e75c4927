//! Command-line front end for `rooted-client`.
//!
//! Every command prints JSON to the writer it is given. Single results are
//! one JSON document; batches are one JSON object per line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rooted_client::{
    enrich, members_controllables_std, ApiClient, ClientConfig, EntityKind, Relation,
};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default number of entities enriched at once by `batch`.
pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "rooted")]
#[command(about = "Query attack-path statistics from a BloodHound Enterprise style API")]
#[command(version)]
pub struct Cli {
    /// JSON config file. Without it the ROOTED_* environment variables are used
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Flattened user record with path-to-Domain-Admins stats
    User {
        id: String,
        /// Print the service response untouched
        #[arg(long)]
        raw: bool,
    },
    /// Flattened group record with path stats and control risk
    Group { id: String },
    /// Member ids of a group
    Members { group_id: String },
    /// Number of controllers or controllables of an entity
    Count {
        kind: KindArg,
        relation: RelationArg,
        id: String,
    },
    /// Shortest path statistics, to Domain Admins unless --end is given
    Path {
        start: String,
        #[arg(long)]
        end: Option<String>,
    },
    /// Enrich every id in a file (one per line), printing JSON lines
    Batch {
        kind: KindArg,
        file: PathBuf,
        #[arg(long, default_value_t = DEFAULT_CONCURRENCY)]
        concurrency: usize,
    },
    /// Standard deviation of members' controllables counts
    MembersStd {
        group_id: String,
        /// JSON object mapping user ids to controllables counts
        file: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    #[value(alias = "users")]
    User,
    #[value(alias = "groups")]
    Group,
}

impl From<KindArg> for EntityKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::User => EntityKind::User,
            KindArg::Group => EntityKind::Group,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationArg {
    Controllers,
    Controllables,
}

impl From<RelationArg> for Relation {
    fn from(relation: RelationArg) -> Self {
        match relation {
            RelationArg::Controllers => Relation::Controllers,
            RelationArg::Controllables => Relation::Controllables,
        }
    }
}

/// Loads the client config from `path`, or from the environment.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => ClientConfig::from_env().context("failed to load config from environment"),
    }
}

/// Reads one id per line. Blank lines and `#` comments are skipped.
pub fn read_ids(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read ids from {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Reads a JSON object of id to controllables count.
pub fn read_counts(path: &Path) -> Result<HashMap<String, u64>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read counts from {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid counts file {}", path.display()))
}

fn emit<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Runs one command against the configured service.
pub async fn run<W: Write>(cli: &Cli, out: &mut W) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let client = ApiClient::new(config).context("failed to build API client")?;
    execute(&client, &cli.command, out).await
}

/// Runs one command with an existing client.
pub async fn execute<W: Write>(client: &ApiClient, command: &Command, out: &mut W) -> Result<()> {
    match command {
        Command::User { id, raw: true } => {
            let body = client
                .user_info_raw(id)
                .await
                .with_context(|| format!("no data for user {id}"))?;
            emit(out, &body)
        }
        Command::User { id, raw: false } => emit(out, &client.user_info(id).await?),
        Command::Group { id } => emit(out, &client.group_info(id).await?),
        Command::Members { group_id } => emit(out, &client.group_members(group_id).await?),
        Command::Count { kind, relation, id } => {
            let relation = Relation::from(*relation);
            let count = client.count((*kind).into(), relation, id).await?;
            emit(
                out,
                &json!({"objectID": id, "relation": relation.as_str(), "count": count}),
            )
        }
        Command::Path { start, end } => {
            let outcome = client.shortest_path(start, end.as_deref()).await?;
            emit(
                out,
                &json!({
                    "start_node": start,
                    "end_node": end,
                    "status": outcome.status(),
                    "error": outcome.error_message(),
                    "stats": outcome.stats(),
                }),
            )
        }
        Command::Batch {
            kind,
            file,
            concurrency,
        } => {
            let ids = read_ids(file)?;
            info!(count = ids.len(), concurrency, "enriching batch");
            let records = enrich(client, (*kind).into(), &ids, *concurrency).await;
            for record in &records {
                emit(out, record)?;
            }
            let failed = records.iter().filter(|r| r.error().is_some()).count();
            info!(total = records.len(), failed, "batch finished");
            Ok(())
        }
        Command::MembersStd { group_id, file } => {
            let counts = read_counts(file)?;
            let std = members_controllables_std(client, group_id, &counts).await;
            emit(
                out,
                &json!({"group": group_id, "members_controllables_std": std}),
            )
        }
    }
}
