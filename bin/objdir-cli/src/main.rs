//! ObjDir CLI - Directory index admin tool
//!
//! Opens a redb-backed directory index and runs one command against it.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use objdir_common::Config;
use objdir_index::{DirIndex, ObjectAttrs, ObjectEntry, codec};
use objdir_store::{KvStore, RedbStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "objdir-cli")]
#[command(about = "ObjDir directory index admin CLI")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "OBJDIR_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Log level (overrides config)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Add or overwrite an object
    Put {
        /// Object path, e.g. bucket/dir/file.txt
        path: String,
        /// Object size in bytes
        #[arg(long, default_value_t = 0)]
        size: u64,
        /// Content type
        #[arg(long)]
        content_type: Option<String>,
        /// Extra attribute as name=value (repeatable)
        #[arg(long = "attr", value_parser = parse_attr)]
        attrs: Vec<(String, String)>,
    },
    /// Remove an object
    Rm {
        /// Object path
        path: String,
        /// Keep emptied parent directories
        #[arg(long)]
        no_cascade: bool,
    },
    /// Remove a bucket's root entry
    RmBucket {
        /// Bucket name
        bucket: String,
    },
    /// List a directory
    Ls {
        /// Directory path, e.g. bucket/dir/
        dir: String,
        /// Maximum entries to scan
        #[arg(long, default_value_t = 1000)]
        limit: usize,
    },
    /// Show object metadata
    Stat {
        /// Object path
        path: String,
    },
    /// Add objects from a file of "path [size]" lines
    Load {
        /// Input file
        file: PathBuf,
    },
    /// Dump raw keys
    Dump {
        /// Key prefix
        #[arg(default_value = "")]
        prefix: String,
        /// Maximum keys
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

fn parse_attr(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .ok_or_else(|| format!("expected name=value, got '{s}'"))
}

fn object_attrs(name: &str, size: u64, content_type: Option<String>) -> Result<ObjectAttrs> {
    let mut entry = ObjectEntry::new(name, size);
    if let Some(content_type) = content_type {
        entry.meta.content_type = content_type;
    }
    let mut attrs = ObjectAttrs::new();
    attrs.set_entry(&entry)?;
    Ok(attrs)
}

fn printable(value: &[u8]) -> String {
    match std::str::from_utf8(value) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => format!("0x{}", hex::encode(value)),
    }
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(db) = &args.db {
        config.store.path.clone_from(db);
    }
    if let Some(level) = &args.log_level {
        config.logging.level.clone_from(level);
    }
    Ok(config)
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    let config = load_config(&args)?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = Arc::new(
        RedbStore::open(&config.store.path)
            .with_context(|| format!("opening {}", config.store.path.display()))?,
    );
    let index = DirIndex::new(Arc::clone(&store) as Arc<dyn KvStore>, &config)?;
    index.start()?;

    let result = run(&index, &*store, args.command);
    index.stop();
    result
}

fn run(index: &DirIndex, store: &dyn KvStore, command: Commands) -> Result<()> {
    match command {
        Commands::Put {
            path,
            size,
            content_type,
            attrs,
        } => {
            let name = path.rsplit('/').next().unwrap_or(&path).to_string();
            let mut object = object_attrs(&name, size, content_type)?;
            for (attr, value) in attrs {
                object.insert(attr, value.into_bytes());
            }
            index.submit_object(&path, &object)?;
            index.wait_for_empty();
            println!("put {path}");
        }
        Commands::Rm { path, no_cascade } => {
            index.submit_delete(&path, !no_cascade)?;
            index.wait_for_empty();
            println!("removed {path}");
        }
        Commands::RmBucket { bucket } => {
            let root = if bucket.ends_with('/') {
                bucket
            } else {
                format!("{bucket}/")
            };
            index.submit_delete_bucket_root(&root)?;
            index.wait_for_empty();
            println!("removed bucket root {root}");
        }
        Commands::Ls { dir, limit } => {
            let entries = index.list_dir(&dir, limit)?;
            if entries.is_empty() {
                println!("(empty)");
            }
            for entry in entries {
                let marker = if entry.is_dir { "/" } else { "" };
                println!("{}{marker}", entry.name);
            }
        }
        Commands::Stat { path } => {
            let attrs = index.get_metadata(&path)?;
            if attrs.is_empty() {
                bail!("no metadata for {path}");
            }
            println!("{:<30} VALUE", "ATTRIBUTE");
            for (name, value) in attrs.iter() {
                if name != objdir_index::meta::ENTRY_ATTR {
                    println!("{name:<30} {}", printable(value));
                }
            }
            if let Some(entry) = attrs.entry()? {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            }
        }
        Commands::Load { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let mut loaded = 0u64;
            for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
                let mut fields = line.split_whitespace();
                let Some(path) = fields.next() else {
                    continue;
                };
                let size: u64 = match fields.next() {
                    Some(raw) => raw
                        .parse()
                        .with_context(|| format!("bad size in line '{line}'"))?,
                    None => 0,
                };
                let name = path.rsplit('/').next().unwrap_or(path);
                index.submit_object(path, &object_attrs(name, size, None)?)?;
                loaded += 1;
            }
            index.wait_for_empty();

            let stats = index.worker_stats();
            info!("Loaded {} objects from {}", loaded, file.display());
            println!("Loaded:          {loaded}");
            println!(
                "Markers written: {}",
                stats.markers_written.load(Ordering::Relaxed)
            );
            println!(
                "Markers skipped: {}",
                stats.markers_skipped.load(Ordering::Relaxed)
            );
            println!(
                "Store failures:  {}",
                stats.store_failures.load(Ordering::Relaxed)
            );
            println!(
                "Cache hit ratio: {:.2}",
                index.cache().stats().hit_ratio()
            );
        }
        Commands::Dump { prefix, limit } => {
            for (key, value) in store.scan(prefix.as_bytes(), limit)? {
                let key = String::from_utf8_lossy(&key);
                if codec::is_placeholder(&value) {
                    println!("{key:<50} {}", printable(&value));
                } else {
                    println!("{key:<50} <{} bytes>", value.len());
                }
            }
        }
    }
    Ok(())
}
