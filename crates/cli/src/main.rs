//! `jsondb` - read and write keys in JSON table files from the shell.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;

use jsondb_core::ResultCode;
use jsondb_infra::config::DEFAULT_ROOT;
use jsondb_infra::{JsonStore, StoreConfig};

/// Read and write keys in JSON table files.
#[derive(Parser, Debug)]
#[command(name = "jsondb", version, about, long_about = None)]
struct Cli {
    /// Directory table paths are resolved against.
    #[arg(long, env = "JSONDB_ROOT", default_value = DEFAULT_ROOT)]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the value stored under KEY as compact JSON.
    Get { table: String, key: String },
    /// Store VALUE under KEY. VALUE is parsed as JSON, or stored as a string.
    Set {
        table: String,
        key: String,
        value: String,
        /// Replace an existing value instead of failing with a collision.
        #[arg(long)]
        overwrite: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // stdout carries values; keep logs quiet unless RUST_LOG asks otherwise.
    jsondb_observability::tracing::init_with_default("warn");

    let store = JsonStore::open(StoreConfig::default().with_root(&cli.root))
        .context("failed to start the store worker")?;

    let code = run(&store, cli.command, &mut std::io::stdout().lock())?;
    store.shutdown();

    if !code.is_success() {
        tracing::debug!(result = %code, "command did not succeed");
        eprintln!("jsondb: {code}");
    }
    Ok(exit_code(code))
}

fn run(store: &JsonStore, command: Commands, out: &mut impl Write) -> anyhow::Result<ResultCode> {
    match command {
        Commands::Get { table, key } => {
            let (value, code) = store.get(&table, &key);
            if let Some(value) = value {
                writeln!(out, "{}", serde_json::to_string(&value)?)?;
            }
            Ok(code)
        }
        Commands::Set {
            table,
            key,
            value,
            overwrite,
        } => Ok(store.set(&table, &key, parse_value(&value), overwrite)),
    }
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn exit_code(code: ResultCode) -> ExitCode {
    match code {
        ResultCode::Success => ExitCode::SUCCESS,
        ResultCode::KeyNotFound => ExitCode::from(2),
        ResultCode::KeyCollision => ExitCode::from(3),
        ResultCode::DatabaseCorrupt => ExitCode::from(4),
        ResultCode::DatabaseError => ExitCode::from(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_set_with_overwrite() {
        let cli = Cli::try_parse_from([
            "jsondb", "--root", "/tmp/x", "set", "t.json", "k", "42", "--overwrite",
        ])
        .unwrap();

        assert_eq!(cli.root, PathBuf::from("/tmp/x"));
        match cli.command {
            Commands::Set { value, overwrite, .. } => {
                assert_eq!(value, "42");
                assert!(overwrite);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn values_are_json_or_plain_strings() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a":[1]}"#), json!({"a": [1]}));
        assert_eq!(parse_value("hello world"), json!("hello world"));
    }

    #[test]
    fn set_then_get_prints_value() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(StoreConfig::default().with_root(dir.path())).unwrap();
        let mut out = Vec::new();

        let set = Commands::Set {
            table: "t.json".into(),
            key: "k".into(),
            value: r#"{"n":1}"#.into(),
            overwrite: false,
        };
        assert_eq!(run(&store, set, &mut out).unwrap(), ResultCode::Success);

        let get = Commands::Get {
            table: "t.json".into(),
            key: "k".into(),
        };
        assert_eq!(run(&store, get, &mut out).unwrap(), ResultCode::Success);
        assert_eq!(String::from_utf8(out).unwrap(), "{\"n\":1}\n");
    }

    #[test]
    fn missing_key_prints_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(StoreConfig::default().with_root(dir.path())).unwrap();
        let mut out = Vec::new();

        let get = Commands::Get {
            table: "t.json".into(),
            key: "nope".into(),
        };
        assert_eq!(run(&store, get, &mut out).unwrap(), ResultCode::KeyNotFound);
        assert!(out.is_empty());
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            ResultCode::Success,
            ResultCode::KeyNotFound,
            ResultCode::KeyCollision,
            ResultCode::DatabaseCorrupt,
            ResultCode::DatabaseError,
        ];
        let rendered: std::collections::HashSet<_> =
            codes.iter().map(|c| format!("{:?}", exit_code(*c))).collect();
        assert_eq!(rendered.len(), codes.len());
    }
}
