//! The `cgql` command grammar.
//!
//! One grammar serves both entry points: the HTTP endpoint feeds the argv
//! it receives in a request body through [`execute`], and the `exec`
//! subcommand of the binary does the same from the terminal. Results are
//! the JSON envelopes of the wire protocol; parse failures and execution
//! errors become `{"status": "error", "message": ...}` rather than
//! panics or process exits.

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::{json, Value};

use crate::auth;
use crate::cycle::{self, query_cycles, CycleQuery, Direction};
use crate::error::{GraphError, Result};
use crate::model::{EdgeFilter, VertexFilter};
use crate::store::{EdgeQuery, SqliteStore, VertexQuery};

/// Commands that may run without a session.
pub const NO_AUTH_COMMANDS: &[&str] = &["register", "login"];

#[derive(Parser, Debug)]
#[command(
    name = "cgql",
    about = "CycleGraph query language",
    no_binary_name = true,
    disable_help_subcommand = true
)]
struct CommandLine {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Register a new user and provision its graph tables
    Register(Credentials),
    /// Log in and obtain a session token
    Login(Credentials),
    /// Log out and revoke the session token
    Logout,
    /// Show the authenticated user
    Whoami,
    /// Read vertices, edges, or cycles
    #[command(subcommand, visible_alias = "q")]
    Query(QueryCommand),
    /// Insert vertices or edges
    #[command(subcommand, visible_alias = "i")]
    Insert(InsertCommand),
    /// Delete vertices or edges
    #[command(subcommand, visible_alias = "d")]
    Delete(DeleteCommand),
}

#[derive(Args, Debug)]
struct Credentials {
    #[arg(short = 'u', long)]
    username: String,
    #[arg(short = 'p', long)]
    password: String,
}

#[derive(Subcommand, Debug)]
enum QueryCommand {
    /// Query vertices
    #[command(visible_alias = "v")]
    Vertex(QueryVertexArgs),
    /// Query edges
    #[command(visible_alias = "e")]
    Edge(QueryEdgeArgs),
    /// Enumerate cycles through a start vertex
    #[command(visible_alias = "c")]
    Cycle(QueryCycleArgs),
}

#[derive(Args, Debug)]
struct QueryVertexArgs {
    /// Vertex id
    #[arg(long)]
    vid: Option<i64>,
    /// Vertex types
    #[arg(long = "vt", value_name = "TYPE", num_args = 1..)]
    v_types: Option<Vec<String>>,
    /// Minimum creation time
    #[arg(long = "min-time")]
    min_time: Option<i64>,
    /// Maximum creation time
    #[arg(long = "max-time")]
    max_time: Option<i64>,
    /// Minimum balance
    #[arg(long = "min-bal")]
    min_balance: Option<i64>,
    /// Maximum balance
    #[arg(long = "max-bal")]
    max_balance: Option<i64>,
}

#[derive(Args, Debug)]
struct QueryEdgeArgs {
    /// Edge id
    #[arg(long)]
    eid: Option<i64>,
    /// Source vertex id
    #[arg(long = "src")]
    src_vid: Option<i64>,
    /// Destination vertex id
    #[arg(long = "dst")]
    dst_vid: Option<i64>,
    /// Edge types
    #[arg(long = "et", value_name = "TYPE", num_args = 1..)]
    e_types: Option<Vec<String>>,
    /// Minimum amount
    #[arg(long = "min-amt")]
    min_amount: Option<i64>,
    /// Maximum amount
    #[arg(long = "max-amt")]
    max_amount: Option<i64>,
    /// Minimum occurrence time
    #[arg(long = "min-time")]
    min_occur_time: Option<i64>,
    /// Maximum occurrence time
    #[arg(long = "max-time")]
    max_occur_time: Option<i64>,
}

#[derive(Args, Debug)]
struct QueryCycleArgs {
    /// Start vertex id
    #[arg(long = "start")]
    start_vid: i64,
    /// Maximum cycle length in edges
    #[arg(long = "depth")]
    max_depth: u32,
    /// Temporal direction
    #[arg(long = "dir", value_enum, default_value_t = DirectionArg::Forward)]
    direction: DirectionArg,
    /// Vertex type filter
    #[arg(long = "vt", value_name = "TYPE", num_args = 1..)]
    v_types: Option<Vec<String>>,
    /// Minimum vertex balance filter
    #[arg(long = "min-bal")]
    min_balance: Option<i64>,
    /// Edge type filter
    #[arg(long = "et", value_name = "TYPE", num_args = 1..)]
    e_types: Option<Vec<String>>,
    /// Minimum edge amount filter
    #[arg(long = "min-amt")]
    min_amount: Option<i64>,
    /// Maximum edge amount filter
    #[arg(long = "max-amt")]
    max_amount: Option<i64>,
    /// Maximum number of cycles to report
    #[arg(long, default_value_t = cycle::DEFAULT_LIMIT)]
    limit: usize,
    /// Allow a cycle to revisit interior vertices
    #[arg(long = "allow-dup-v")]
    allow_dup_vertices: bool,
    /// Allow a cycle to reuse edges
    #[arg(long = "allow-dup-e")]
    allow_dup_edges: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum DirectionArg {
    /// Timestamps strictly increase along a cycle
    Forward,
    /// No temporal constraint
    Any,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Forward => Direction::Forward,
            DirectionArg::Any => Direction::Any,
        }
    }
}

#[derive(Subcommand, Debug)]
enum InsertCommand {
    /// Insert a vertex
    #[command(visible_alias = "v")]
    Vertex(InsertVertexArgs),
    /// Insert an edge
    #[command(visible_alias = "e")]
    Edge(InsertEdgeArgs),
}

#[derive(Args, Debug)]
struct InsertVertexArgs {
    /// Vertex type
    #[arg(long = "vt")]
    v_type: String,
    /// Vertex id; allocated automatically when omitted
    #[arg(long)]
    vid: Option<i64>,
    /// Creation time; defaults to now
    #[arg(long = "time")]
    create_time: Option<i64>,
    /// Initial balance
    #[arg(long = "bal", default_value_t = 0)]
    balance: i64,
}

#[derive(Args, Debug)]
struct InsertEdgeArgs {
    /// Edge id
    #[arg(long)]
    eid: i64,
    /// Source vertex id
    #[arg(long = "src")]
    src_vid: i64,
    /// Destination vertex id
    #[arg(long = "dst")]
    dst_vid: i64,
    /// Transfer amount
    #[arg(long = "amt")]
    amount: i64,
    /// Occurrence time; defaults to now
    #[arg(long = "time")]
    occur_time: Option<i64>,
    /// Edge type
    #[arg(long = "et", default_value = "+")]
    e_type: String,
    /// Create missing endpoint vertices
    #[arg(long = "create-v")]
    create_vertices: bool,
}

#[derive(Subcommand, Debug)]
enum DeleteCommand {
    /// Delete a vertex and its incident edges
    #[command(visible_alias = "v")]
    Vertex(DeleteVertexArgs),
    /// Delete an edge
    #[command(visible_alias = "e")]
    Edge(DeleteEdgeArgs),
}

#[derive(Args, Debug)]
struct DeleteVertexArgs {
    /// Vertex id
    #[arg(long)]
    vid: i64,
}

#[derive(Args, Debug)]
struct DeleteEdgeArgs {
    /// Edge id
    #[arg(long)]
    eid: i64,
}

/// Parses and executes one command, returning the wire-protocol envelope.
///
/// `actor` is the authenticated tenant, when there is one; commands that
/// touch graph data require it.
pub fn execute(store: &SqliteStore, actor: Option<&str>, argv: &[String]) -> Value {
    let parsed = match CommandLine::try_parse_from(argv) {
        Ok(parsed) => parsed,
        Err(_) => return error_envelope("invalid command or arguments"),
    };

    match run(store, actor, parsed.command) {
        Ok(value) => value,
        Err(err) => error_envelope(&err.to_string()),
    }
}

fn run(store: &SqliteStore, actor: Option<&str>, command: Command) -> Result<Value> {
    match command {
        Command::Register(creds) => {
            auth::register(store, &creds.username, &creds.password)?;
            Ok(json!({
                "status": "success",
                "message": format!("user '{}' registered successfully", creds.username),
            }))
        }
        Command::Login(creds) => {
            let session = auth::login(store, &creds.username, &creds.password)?;
            Ok(json!({
                "status": "success",
                "username": session.username,
                "token": session.token,
            }))
        }
        Command::Logout => Ok(json!({
            "status": "success",
            "message": "logged out and session cleared",
        })),
        Command::Whoami => match actor {
            Some(username) => Ok(json!({"status": "success", "username": username})),
            None => Ok(error_envelope("not logged in")),
        },
        Command::Query(query) => {
            let tenant = require_actor(actor)?;
            run_query(store, tenant, query)
        }
        Command::Insert(insert) => {
            let tenant = require_actor(actor)?;
            run_insert(store, tenant, insert)
        }
        Command::Delete(delete) => {
            let tenant = require_actor(actor)?;
            run_delete(store, tenant, delete)
        }
    }
}

fn run_query(store: &SqliteStore, tenant: &str, command: QueryCommand) -> Result<Value> {
    match command {
        QueryCommand::Vertex(args) => {
            let vertices = store.query_vertices(
                tenant,
                &VertexQuery {
                    vid: args.vid,
                    v_types: args.v_types,
                    min_create_time: args.min_time,
                    max_create_time: args.max_time,
                    min_balance: args.min_balance,
                    max_balance: args.max_balance,
                },
            )?;
            Ok(json!({
                "status": "success",
                "count": vertices.len(),
                "data": to_value(&vertices)?,
            }))
        }
        QueryCommand::Edge(args) => {
            let edges = store.query_edges(
                tenant,
                &EdgeQuery {
                    eid: args.eid,
                    src_vid: args.src_vid,
                    dst_vid: args.dst_vid,
                    e_types: args.e_types,
                    min_amount: args.min_amount,
                    max_amount: args.max_amount,
                    min_occur_time: args.min_occur_time,
                    max_occur_time: args.max_occur_time,
                },
            )?;
            Ok(json!({
                "status": "success",
                "count": edges.len(),
                "data": to_value(&edges)?,
            }))
        }
        QueryCommand::Cycle(args) => {
            let query = CycleQuery {
                start_vid: args.start_vid,
                max_depth: args.max_depth,
                direction: args.direction.into(),
                vertex_filter: VertexFilter {
                    v_types: args.v_types,
                    min_balance: args.min_balance,
                },
                edge_filter: EdgeFilter {
                    e_types: args.e_types,
                    min_amount: args.min_amount,
                    max_amount: args.max_amount,
                },
                limit: args.limit,
                allow_dup_vertices: args.allow_dup_vertices,
                allow_dup_edges: args.allow_dup_edges,
            };
            let outcome = query_cycles(store, tenant, &query)?;

            let mut body = json!({
                "status": "success",
                "found": outcome.found,
                "meta": to_value(&outcome.meta)?,
            });
            if outcome.found {
                body["count"] = outcome.count.into();
                body["data"] = to_value(&outcome.data)?;
            }
            if let Some(message) = outcome.message {
                body["message"] = message.into();
            }
            Ok(body)
        }
    }
}

fn run_insert(store: &SqliteStore, tenant: &str, command: InsertCommand) -> Result<Value> {
    match command {
        InsertCommand::Vertex(args) => {
            let vertex = store.insert_vertex(
                tenant,
                &args.v_type,
                args.vid,
                args.create_time,
                args.balance,
            )?;
            Ok(json!({"status": "success", "data": to_value(&vertex)?}))
        }
        InsertCommand::Edge(args) => {
            let edge = store.insert_edge(
                tenant,
                args.eid,
                args.src_vid,
                args.dst_vid,
                args.amount,
                args.occur_time,
                &args.e_type,
                args.create_vertices,
            )?;
            Ok(json!({"status": "success", "data": to_value(&edge)?}))
        }
    }
}

fn run_delete(store: &SqliteStore, tenant: &str, command: DeleteCommand) -> Result<Value> {
    match command {
        DeleteCommand::Vertex(args) => {
            store.delete_vertex(tenant, args.vid)?;
            Ok(json!({
                "status": "success",
                "message": format!("vertex {} deleted", args.vid),
            }))
        }
        DeleteCommand::Edge(args) => {
            store.delete_edge(tenant, args.eid)?;
            Ok(json!({
                "status": "success",
                "message": format!("edge {} deleted", args.eid),
            }))
        }
    }
}

fn require_actor(actor: Option<&str>) -> Result<&str> {
    actor.ok_or_else(|| GraphError::Auth("authentication required".to_string()))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|err| GraphError::Internal(err.to_string()))
}

fn error_envelope(message: &str) -> Value {
    json!({"status": "error", "message": message})
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn store_with_user(name: &str) -> SqliteStore {
        let store = SqliteStore::open_in_memory().unwrap();
        auth::register(&store, name, "pw").unwrap();
        store
    }

    #[test]
    fn test_unknown_command_is_an_error_envelope() {
        let store = SqliteStore::open_in_memory().unwrap();
        let result = execute(&store, None, &argv(&["frobnicate"]));
        assert_eq!(result["status"], "error");
    }

    #[test]
    fn test_register_and_login_envelopes() {
        let store = SqliteStore::open_in_memory().unwrap();

        let registered = execute(
            &store,
            None,
            &argv(&["register", "-u", "alice", "-p", "pw"]),
        );
        assert_eq!(registered["status"], "success");

        let logged_in = execute(&store, None, &argv(&["login", "-u", "alice", "-p", "pw"]));
        assert_eq!(logged_in["status"], "success");
        assert!(logged_in["token"].as_str().is_some());

        let rejected = execute(&store, None, &argv(&["login", "-u", "alice", "-p", "no"]));
        assert_eq!(rejected["status"], "error");
    }

    #[test]
    fn test_graph_commands_require_actor() {
        let store = store_with_user("alice");
        let result = execute(&store, None, &argv(&["query", "vertex"]));
        assert_eq!(result["status"], "error");

        let result = execute(&store, Some("alice"), &argv(&["query", "vertex"]));
        assert_eq!(result["status"], "success");
        assert_eq!(result["count"], 0);
    }

    #[test]
    fn test_insert_query_delete_roundtrip() {
        let store = store_with_user("alice");
        let actor = Some("alice");

        let inserted = execute(
            &store,
            actor,
            &argv(&["insert", "vertex", "--vt", "account", "--vid", "1", "--bal", "10"]),
        );
        assert_eq!(inserted["status"], "success");
        assert_eq!(inserted["data"]["vid"], 1);

        let edge = execute(
            &store,
            actor,
            &argv(&[
                "insert", "edge", "--eid", "1", "--src", "1", "--dst", "2", "--amt", "5",
                "--time", "100", "--create-v",
            ]),
        );
        assert_eq!(edge["status"], "success");

        let vertices = execute(&store, actor, &argv(&["query", "vertex"]));
        assert_eq!(vertices["count"], 2);

        let deleted = execute(&store, actor, &argv(&["delete", "edge", "--eid", "1"]));
        assert_eq!(deleted["status"], "success");

        let edges = execute(&store, actor, &argv(&["query", "edge"]));
        assert_eq!(edges["count"], 0);
    }

    #[test]
    fn test_cycle_query_through_command_layer() {
        let store = store_with_user("alice");
        let actor = Some("alice");

        for vid in 1..=3 {
            execute(
                &store,
                actor,
                &argv(&["insert", "vertex", "--vt", "account", "--vid", &vid.to_string()]),
            );
        }
        for (eid, src, dst, at) in [(1, 1, 2, 100), (2, 2, 3, 110), (3, 3, 1, 120)] {
            let result = execute(
                &store,
                actor,
                &argv(&[
                    "insert", "edge",
                    "--eid", &eid.to_string(),
                    "--src", &src.to_string(),
                    "--dst", &dst.to_string(),
                    "--amt", "1",
                    "--time", &at.to_string(),
                ]),
            );
            assert_eq!(result["status"], "success");
        }

        let cycles = execute(
            &store,
            actor,
            &argv(&["query", "cycle", "--start", "1", "--depth", "3"]),
        );
        assert_eq!(cycles["status"], "success");
        assert_eq!(cycles["found"], true);
        assert_eq!(cycles["count"], 1);
        assert_eq!(cycles["data"][0]["edges"].as_array().unwrap().len(), 3);

        let missing = execute(
            &store,
            actor,
            &argv(&["query", "cycle", "--start", "99", "--depth", "3"]),
        );
        assert_eq!(missing["status"], "error");
    }
}
