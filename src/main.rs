//! Elohim Things admin tool
//!
//! Operates on the registry database directly, without an API front end.
//!
//! ## Usage
//!
//! ```bash
//! # Create or migrate the database
//! elohim-things init
//!
//! # Entity and connection counts
//! elohim-things --storage-dir /data/things stats
//!
//! # Would this device be allowed to publish on the channel?
//! elohim-things check-access --channel <channel-id> --key <thing-key>
//! elohim-things check-access --channel <channel-id> --thing <thing-id>
//!
//! # Which thing holds this key?
//! elohim-things identify --key <thing-key>
//!
//! # One page of an owner's channels
//! elohim-things list channels --owner <owner> --offset 20
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use elohim_things::services::events::spawn_logging_listener;
use elohim_things::{Config, OwnerContext, PageQuery, Services};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "elohim-things")]
#[command(about = "Thing and channel registry for Elohim nodes")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long, env = "ELOHIM_THINGS_DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or migrate the database
    Init {
        /// Also write the effective config to the storage directory
        #[arg(long)]
        write_config: bool,
    },

    /// Print entity and connection counts as JSON
    Stats,

    /// Run an access check against a channel
    CheckAccess {
        #[arg(long)]
        channel: String,

        /// Thing secret key
        #[arg(long, conflicts_with = "thing")]
        key: Option<String>,

        /// Thing ID
        #[arg(long)]
        thing: Option<String>,
    },

    /// Resolve a thing key to its ID
    Identify {
        #[arg(long)]
        key: String,
    },

    /// Print one page of an owner's things or channels as JSON
    List {
        #[arg(value_enum)]
        kind: EntityKind,

        #[arg(long)]
        owner: String,

        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Page size (defaults to default_page_limit from config)
        #[arg(long)]
        limit: Option<u64>,

        /// Exact name filter
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EntityKind {
    Things,
    Channels,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("elohim_things=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => Config::default(),
    };

    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    let services = Services::open(&config).context("Failed to open registry database")?;
    let listener = spawn_logging_listener(services.events.clone());

    match args.command {
        Command::Init { write_config } => {
            if write_config {
                config.save(config.config_path())?;
                info!("Wrote config to {:?}", config.config_path());
            }
            info!("Database ready at {:?}", config.db_path());
        }
        Command::Stats => {
            let stats = services.db.stats()?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::CheckAccess { channel, key, thing } => {
            let allowed = match (key, thing) {
                (Some(key), None) => match services.access.has_thing(&channel, &key) {
                    Ok(thing_id) => {
                        info!(channel = %channel, thing = %thing_id, "Key resolved");
                        true
                    }
                    Err(e) if e.is_not_found() => false,
                    Err(e) => return Err(e.into()),
                },
                (None, Some(thing)) => services.access.can_access_by_id(&channel, &thing)?,
                _ => bail!("exactly one of --key or --thing is required"),
            };

            if !allowed {
                warn!(channel = %channel, "Access denied");
                println!("denied");
                std::process::exit(1);
            }
            println!("allowed");
        }
        Command::Identify { key } => {
            let id = services.things.identify(&key)?;
            println!("{}", id);
        }
        Command::List { kind, owner, offset, limit, name } => {
            let ctx = OwnerContext::new(owner);
            let mut query = PageQuery::new(offset, limit.unwrap_or(config.default_page_limit));
            if let Some(name) = name {
                query = query.with_name(name);
            }

            let json = match kind {
                EntityKind::Things => serde_json::to_string_pretty(&services.things.retrieve_all(&ctx, &query)?)?,
                EntityKind::Channels => serde_json::to_string_pretty(&services.channels.retrieve_all(&ctx, &query)?)?,
            };
            println!("{}", json);
        }
    }

    listener.abort();
    Ok(())
}
