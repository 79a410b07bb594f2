//! Luna CLI - command-line front-end over the Luna command adapter.
//!
//! Each invocation bootstraps the configured database, runs one command
//! against one entity type and prints the result as JSON on stdout. Logs go
//! to stderr.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::Args;
use luna_core::{AppContext, Command, DatabaseSettings};
use tracing::{debug, error, Level};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut settings = DatabaseSettings::from_env()?;
    if let Some(db_type) = args.db_type {
        settings.db_type = db_type;
    }
    if let Some(db_dir) = args.db_dir {
        settings.dir = db_dir;
    }
    debug!("Database settings: {:?}", settings);

    let mut builder = AppContext::builder(settings);
    if let Some(plugins_dir) = args.plugins_dir {
        builder = builder.plugins_dir(plugins_dir);
    }

    let outcome = builder
        .build()
        .and_then(|mut ctx| ctx.execute(args.entity_type, Command::from(args.action)));

    match outcome {
        Ok(output) => {
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            std::process::exit(e.to_exit_code());
        }
    }
}
