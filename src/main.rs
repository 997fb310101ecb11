//! varstore CLI - inspect and edit durable variable databases

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use varstore::clock::{Clock, SystemClock};
use varstore::config::{self, VarStoreConfig};
use varstore::scope::registry::principal_path;
use varstore::scope::ScopeKind;
use varstore::storage::ScopeTable;
use varstore::ui::{self, theme, Icons};
use varstore::world::MemoryWorld;
use varstore::{codec, PatternFilter, TypeMask, Value, VarType};

#[derive(Parser)]
#[command(name = "varstore")]
#[command(version)]
#[command(about = "Typed variable persistence - inspect and edit scope databases")]
#[command(long_about = r#"
varstore keeps typed, tagged, timestamped variables in SQLite, one table per
scope. This tool works on the durable scopes (global and per-principal).

Example usage:
  varstore init
  varstore set day 12 --type int
  varstore list --name "quest_*" --after 1700000000
  varstore get class --scope principal --principal CDKEY123 --type string
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputMode::Text)]
    format: OutputMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    fn is_human(&self) -> bool {
        *self == OutputMode::Text
    }
}

/// Which database and table a command works on
#[derive(clap::Args, Debug)]
struct Target {
    /// Database file (overrides the config layout)
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Scope table: global or principal
    #[arg(short, long, default_value = "global")]
    scope: String,

    /// Principal key, for the principal scope without --database
    #[arg(short, long)]
    principal: Option<String>,
}

#[derive(clap::Args, Debug)]
struct Filters {
    /// Comma separated types, e.g. "int,float"
    #[arg(long, default_value = "all")]
    types: String,

    /// Name glob
    #[arg(long, default_value = "")]
    name: String,

    /// Tag glob
    #[arg(long, default_value = "")]
    tag: String,

    /// Only records written before this unix time
    #[arg(long, conflicts_with = "after")]
    before: Option<i64>,

    /// Only records written after this unix time
    #[arg(long)]
    after: Option<i64>,
}

impl Filters {
    fn to_filter(&self) -> anyhow::Result<PatternFilter> {
        let mut filter = PatternFilter::new()
            .types(TypeMask::parse_list(&self.types)?)
            .name(self.name.clone())
            .tag(self.tag.clone());
        if let Some(t) = self.before {
            filter = filter.before(t);
        }
        if let Some(t) = self.after {
            filter = filter.after(t);
        }
        Ok(filter)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Write a config file and create the data directory
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// List variables matching a pattern
    List {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        filters: Filters,
    },

    /// Read one variable
    Get {
        name: String,

        #[command(flatten)]
        target: Target,

        #[arg(short = 't', long = "type", default_value = "int")]
        var_type: String,

        #[arg(long, default_value = "")]
        tag: String,
    },

    /// Write one variable (int, float, string or json)
    Set {
        name: String,

        #[arg(allow_hyphen_values = true)]
        value: String,

        #[command(flatten)]
        target: Target,

        #[arg(short = 't', long = "type", default_value = "int")]
        var_type: String,

        #[arg(long, default_value = "")]
        tag: String,
    },

    /// Delete variables matching a pattern
    Delete {
        #[command(flatten)]
        target: Target,

        #[command(flatten)]
        filters: Filters,

        /// Allow an unfiltered delete of the whole scope
        #[arg(long)]
        all: bool,
    },

    /// Show row counts per type
    Stats {
        #[command(flatten)]
        target: Target,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
    let mode = cli.format;

    match cli.command {
        Commands::Init { force } => {
            let config = VarStoreConfig::with_defaults();
            config::write_config(&config_path, &config, force)?;
            let base = base_dir(&config_path);
            let global = config.global_database_in(&base);
            config::ensure_db_dir(&global)?;
            std::fs::create_dir_all(config.principal_dir_in(&base))?;
            let table = ScopeTable::open(&global, ScopeKind::Global.table())?;
            table.ensure_schema()?;

            if mode.is_human() {
                ui::header("varstore initialized");
                ui::status(Icons::DATABASE, "Config", &config_path.display().to_string());
                ui::status(Icons::GLOBE, "Global database", &global.display().to_string());
            } else {
                emit(
                    "init",
                    serde_json::json!({
                        "config": config_path,
                        "global_database": global,
                    }),
                )?;
            }
        }

        Commands::List { target, filters } => {
            let (path, table) = open_target(&config_path, &target)?;
            let filter = filters.to_filter()?;
            let records = table.select_pattern(&filter)?;

            if mode.is_human() {
                ui::header(&format!("Variables in {}", path.display()));
                if records.is_empty() {
                    println!("{} No variables found.", Icons::EMPTY);
                } else {
                    println!("{}", ui::variables_table(&records));
                }
            } else {
                let rows: Vec<_> = records
                    .iter()
                    .map(|r| {
                        serde_json::json!({
                            "type": r.var_type,
                            "name": r.name,
                            "tag": r.tag,
                            "value": codec::raw_to_json(r.var_type, &r.value),
                            "timestamp": r.timestamp,
                        })
                    })
                    .collect();
                emit("list", serde_json::json!(rows))?;
            }
        }

        Commands::Get {
            name,
            target,
            var_type,
            tag,
        } => {
            let (_, table) = open_target(&config_path, &target)?;
            let var_type: VarType = var_type.parse()?;
            let stored = table.select_point(var_type, &name, &tag)?;

            if mode.is_human() {
                match &stored {
                    Some(s) => println!(
                        "{} = {} {}",
                        name.style(theme().key.clone()),
                        codec::render_raw(&s.value),
                        ui::muted(&format!("({}, written {})", var_type, s.timestamp))
                    ),
                    None => ui::warn(&format!("{} {} is not set", var_type, name)),
                }
            } else {
                emit(
                    "get",
                    serde_json::json!({
                        "type": var_type,
                        "name": name,
                        "tag": tag,
                        "value": stored.as_ref().map(|s| codec::raw_to_json(var_type, &s.value)),
                        "timestamp": stored.as_ref().map(|s| s.timestamp),
                    }),
                )?;
            }
        }

        Commands::Set {
            name,
            value,
            target,
            var_type,
            tag,
        } => {
            let (_, table) = open_target(&config_path, &target)?;
            let value = parse_value(var_type.parse()?, &value)?;
            let encoded = codec::encode(&value, &MemoryWorld::new())?;
            let now = SystemClock.now();
            table.upsert(value.var_type(), &name, &tag, encoded, now)?;

            if mode.is_human() {
                ui::success(&format!("Set {} {} = {}", value.var_type(), name, value));
            } else {
                emit("set", serde_json::json!({ "name": name, "tag": tag, "timestamp": now }))?;
            }
        }

        Commands::Delete {
            target,
            filters,
            all,
        } => {
            let (path, table) = open_target(&config_path, &target)?;
            let filter = filters.to_filter()?;
            if filter.is_unfiltered() && !all {
                anyhow::bail!("refusing to delete every variable in {} (pass --all)", path.display());
            }
            let removed = table.delete_pattern(&filter)?;

            if mode.is_human() {
                ui::status(Icons::DEL, "Deleted", &removed.to_string());
            } else {
                emit("delete", serde_json::json!({ "removed": removed }))?;
            }
        }

        Commands::Stats { target } => {
            let (path, table) = open_target(&config_path, &target)?;
            let counts = table.type_counts()?;
            let total: usize = counts.iter().map(|(_, n)| n).sum();

            if mode.is_human() {
                ui::header(&format!("{} Statistics ({})", Icons::STATS, path.display()));
                let total_str = total.to_string();
                let per_type: Vec<(String, String)> =
                    counts.iter().map(|(t, n)| (t.to_string(), n.to_string())).collect();
                let mut rows: Vec<(&str, &str)> = vec![("Table", table.table()), ("Variables", total_str.as_str())];
                rows.extend(per_type.iter().map(|(t, n)| (t.as_str(), n.as_str())));
                println!("{}", ui::stats_table(&rows));
            } else {
                let by_type: serde_json::Map<String, serde_json::Value> = counts
                    .iter()
                    .map(|(t, n)| (t.to_string(), serde_json::json!(n)))
                    .collect();
                emit(
                    "stats",
                    serde_json::json!({
                        "database": path,
                        "table": table.table(),
                        "total": total,
                        "by_type": by_type,
                    }),
                )?;
            }
        }
    }

    Ok(())
}

fn emit(command: &str, data: serde_json::Value) -> anyhow::Result<()> {
    let envelope = serde_json::json!({
        "status": "ok",
        "command": command,
        "data": data,
    });
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn base_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Resolve the database file and open its scope table
fn open_target(config_path: &Path, target: &Target) -> anyhow::Result<(PathBuf, ScopeTable)> {
    let kind: ScopeKind = target.scope.parse()?;
    if kind == ScopeKind::Ephemeral {
        anyhow::bail!("the ephemeral scope lives in memory and has no database file");
    }

    let path = match &target.database {
        Some(path) => path.clone(),
        None => {
            let config = config::load_config(Some(config_path))?.unwrap_or_default();
            let base = base_dir(config_path);
            match kind {
                ScopeKind::Principal => {
                    let key = target
                        .principal
                        .as_deref()
                        .context("--principal is required for the principal scope")?;
                    principal_path(&config.principal_dir_in(&base), key)
                }
                _ => config.global_database_in(&base),
            }
        }
    };

    config::ensure_db_dir(&path)?;
    tracing::debug!("Opening {} in {}", kind.table(), path.display());
    let table = ScopeTable::open(&path, kind.table())?;
    table.ensure_schema()?;
    Ok((path, table))
}

fn parse_value(var_type: VarType, raw: &str) -> anyhow::Result<Value> {
    let value = match var_type {
        VarType::Int => Value::Int(raw.parse().with_context(|| format!("not an int: {}", raw))?),
        VarType::Float => Value::Float(raw.parse().with_context(|| format!("not a float: {}", raw))?),
        VarType::String => Value::String(raw.to_string()),
        VarType::Json => Value::Json(serde_json::from_str(raw)?),
        other => anyhow::bail!("{} values need a running world and cannot be set here", other),
    };
    Ok(value)
}
