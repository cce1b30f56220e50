//! esp-config CLI
//!
//! Entry point for the `esp-config` command-line tool.

use clap::{Parser, Subcommand, ValueEnum};
use esp_config::config::{host_config_path, EffectiveSettings, Settings, PROJECT_CONFIG_FILE};
use esp_config::defaults::parse_blob_literal;
use esp_config::summary::render_blob;
use esp_config::{DefaultsTable, OverrideStore, ResolveError, Resolver, Source, Summary};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter directive
const LOG_ENV: &str = "ESP_CONFIG_LOG";

#[derive(Parser)]
#[command(name = "esp-config")]
#[command(about = "Typed configuration values with stored overrides and built-in defaults", version)]
struct Cli {
    /// Project settings file (default: esp-config.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Override store partition file
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Keep overrides in memory for this invocation only
    #[arg(long, global = true, conflicts_with = "store")]
    memory: bool,

    /// Defaults table TOML file (default: built-in example table)
    #[arg(long, global = true)]
    defaults: Option<PathBuf>,

    /// Log resolution details to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a value (override first, then defaults)
    Get {
        namespace: String,
        key: String,

        #[arg(long = "type", value_enum)]
        kind: ValueType,

        /// Report only the stored size (str and blob)
        #[arg(long)]
        size_only: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Store an override
    Set {
        namespace: String,
        key: String,

        #[arg(long = "type", value_enum)]
        kind: ValueType,

        /// Blob values are UTF-8 text or `hex:` followed by hex digits
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Erase every override
    Reset {
        /// Confirm erasing the whole override store
        #[arg(long)]
        yes: bool,
    },

    /// Show the effective value of every key in the defaults table
    Summary {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Show the effective settings and where they came from
    Settings {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ValueType {
    I32,
    Str,
    Blob,
}

fn main() {
    let cli = Cli::parse();

    let project_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    let host_path = host_config_path();

    let effective = match EffectiveSettings::build(
        host_path.as_deref(),
        Some(project_path.as_path()),
        cli_overrides(&cli),
    ) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };

    init_logging(cli.verbose, &effective.settings.log.level);

    match cli.command {
        Commands::Get {
            namespace,
            key,
            kind,
            size_only,
            json,
        } => run_get(&effective.settings, &namespace, &key, kind, size_only, json),
        Commands::Set {
            namespace,
            key,
            kind,
            value,
        } => run_set(&effective.settings, &namespace, &key, kind, &value),
        Commands::Reset { yes } => run_reset(&effective.settings, yes),
        Commands::Summary { json } => run_summary(&effective.settings, json),
        Commands::Settings { json } => {
            if json {
                print_json(effective.to_json());
            } else {
                print!("{}", effective.to_human());
            }
        }
    }
}

/// `ESP_CONFIG_LOG` wins; otherwise `-v` or the configured level
fn init_logging(verbose: bool, level: &str) {
    let fallback = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings layer built from `--store`, `--memory` and `--defaults`
fn cli_overrides(cli: &Cli) -> Option<serde_json::Value> {
    let mut root = serde_json::Map::new();

    if cli.memory {
        root.insert("store".into(), serde_json::json!({ "backend": "memory" }));
    } else if let Some(ref path) = cli.store {
        root.insert(
            "store".into(),
            serde_json::json!({ "backend": "file", "path": path }),
        );
    }
    if let Some(ref path) = cli.defaults {
        root.insert("defaults".into(), serde_json::json!({ "path": path }));
    }

    (!root.is_empty()).then_some(serde_json::Value::Object(root))
}

fn open(settings: &Settings) -> (Box<dyn OverrideStore>, DefaultsTable) {
    let table = match settings.load_defaults() {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error loading defaults table: {}", e);
            process::exit(1);
        }
    };
    (settings.open_store(), table)
}

fn run_get(settings: &Settings, namespace: &str, key: &str, kind: ValueType, size_only: bool, json: bool) {
    let (store, table) = open(settings);
    let resolver = Resolver::new(store, &table);

    if size_only {
        let resolved = match kind {
            ValueType::I32 => {
                eprintln!("--size-only applies to str and blob values");
                process::exit(1);
            }
            ValueType::Str => resolver.get_str(namespace, key, None),
            ValueType::Blob => resolver.get_blob(namespace, key, None),
        };
        let resolved = resolved.unwrap_or_else(|e| exit_with(e));
        if json {
            print_json(serde_json::to_string_pretty(&serde_json::json!({
                "namespace": namespace,
                "key": key,
                "size": resolved.size(),
                "source": resolved.source,
            })));
        } else {
            println!("{} ({})", resolved.size(), resolved.source);
        }
        return;
    }

    let (value, source): (String, Source) = match kind {
        ValueType::I32 => resolver
            .get_i32(namespace, key)
            .map(|v| (v.value.to_string(), v.source)),
        ValueType::Str => resolver.get_string(namespace, key).map(|v| (v.value, v.source)),
        ValueType::Blob => resolver
            .get_blob_vec(namespace, key)
            .map(|v| (render_blob(&v.value), v.source)),
    }
    .unwrap_or_else(|e| exit_with(e));

    if json {
        print_json(serde_json::to_string_pretty(&serde_json::json!({
            "namespace": namespace,
            "key": key,
            "value": value,
            "source": source,
        })));
    } else {
        println!("{} ({})", value, source);
    }
}

fn run_set(settings: &Settings, namespace: &str, key: &str, kind: ValueType, value: &str) {
    let (store, table) = open(settings);
    let resolver = Resolver::new(store, &table);

    let result = match kind {
        ValueType::I32 => match value.parse::<i32>() {
            Ok(v) => resolver.set_i32(namespace, key, v),
            Err(e) => {
                eprintln!("Invalid i32 value '{}': {}", value, e);
                process::exit(1);
            }
        },
        ValueType::Str => resolver.set_str(namespace, key, value),
        ValueType::Blob => match parse_blob_literal(value) {
            Ok(bytes) => resolver.set_blob(namespace, key, &bytes),
            Err(e) => {
                eprintln!("Invalid blob value: {}", e);
                process::exit(1);
            }
        },
    };

    if let Err(e) = result {
        exit_with(e);
    }
}

fn run_reset(settings: &Settings, yes: bool) {
    if !yes {
        eprintln!("Refusing to erase all overrides without --yes");
        process::exit(1);
    }

    let (store, table) = open(settings);
    let resolver = Resolver::new(store, &table);
    if let Err(e) = resolver.reset() {
        exit_with(e);
    }
    println!("Override store erased.");
}

fn run_summary(settings: &Settings, json: bool) {
    let (store, table) = open(settings);
    let resolver = Resolver::new(store, &table);
    let summary = Summary::collect(&resolver);

    if json {
        print_json(summary.to_json());
    } else {
        print!("{}", summary.to_human());
    }
}

fn print_json(json: Result<String, serde_json::Error>) {
    match json {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

/// Not-found exits 1, store faults exit 2
fn exit_with(err: ResolveError) -> ! {
    eprintln!("Error: {}", err);
    process::exit(if err.is_not_found() { 1 } else { 2 });
}
