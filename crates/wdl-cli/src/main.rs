use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

mod commands;
mod render;

use wdl_config::StoreBackend;

#[derive(Parser)]
#[command(name = "wdl")]
#[command(about = "Wallet deposit ledger: snapshot replay and balance report", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay snapshot documents into a ledger and print the balance report
    Replay {
        /// Layered config paths in merge order
        #[arg(long = "config")]
        config_paths: Vec<String>,

        /// Snapshot document, repeatable; replaces feed.snapshots from config
        #[arg(long = "snapshot")]
        snapshots: Vec<String>,

        /// Address directory JSON
        #[arg(long)]
        directory: Option<String>,

        /// Ledger backend (memory | postgres)
        #[arg(long)]
        store: Option<StoreBackend>,

        /// Depth at which a deposit is final
        #[arg(long)]
        finality_threshold: Option<i64>,

        /// Append run events to this JSONL journal
        #[arg(long)]
        journal: Option<String>,

        /// Leave the Postgres ledger in place after the run
        #[arg(long, default_value_t = false)]
        keep_ledger: bool,
    },

    /// Print the balance report for the ledger already in Postgres
    Report {
        /// Address directory JSON
        #[arg(long)]
        directory: String,
    },

    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run journal utilities
    Journal {
        #[command(subcommand)]
        cmd: JournalCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,

    /// Apply SQL migrations
    Migrate,

    /// Empty the deposits and snapshot archive tables
    Teardown {
        /// Acknowledge that every recorded deposit will be removed
        #[arg(long, default_value_t = false)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum JournalCmd {
    /// Check the hash chain of a journal file
    Verify { path: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Replay {
            config_paths,
            snapshots,
            directory,
            store,
            finality_threshold,
            journal,
            keep_ledger,
        } => {
            let overrides = commands::Overrides {
                snapshots,
                directory,
                store,
                finality_threshold,
                journal,
                keep_ledger,
            };
            let settings = commands::resolve_settings(&config_paths, overrides)?;
            let outcome = commands::replay::run(&settings).await?;
            tracing::info!(
                run_id = %outcome.run_id,
                snapshots = outcome.totals.snapshots,
                inserted = outcome.totals.inserted,
                updated = outcome.totals.updated,
                rejected = outcome.totals.rejected,
                "replay complete"
            );
            print!("{}", render::render_aggregate(&outcome.aggregate));
        }

        Commands::Report { directory } => {
            let res = commands::report(&directory).await?;
            print!("{}", render::render_aggregate(&res));
        }

        Commands::Db { cmd } => {
            let pool = wdl_db::connect_from_env().await?;
            match cmd {
                DbCmd::Status => {
                    let s = wdl_db::status(&pool).await?;
                    println!(
                        "db_ok={} has_deposits_table={} deposit_count={}",
                        s.ok, s.has_deposits_table, s.deposit_count
                    );
                }
                DbCmd::Migrate => {
                    wdl_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
                DbCmd::Teardown { yes } => {
                    if !yes {
                        bail!("REFUSING TEARDOWN: this removes every recorded deposit. Re-run with: `wdl db teardown --yes`");
                    }
                    wdl_db::teardown(&pool).await?;
                    println!("teardown=true");
                }
            }
        }

        Commands::ConfigHash { paths } => {
            let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
            let loaded = wdl_config::load_layered_yaml(&path_refs)?;
            println!("config_hash={}", loaded.config_hash);
            println!("{}", loaded.canonical_json);
        }

        Commands::Journal { cmd } => match cmd {
            JournalCmd::Verify { path } => match wdl_audit::verify_chain(&path)? {
                wdl_audit::VerifyResult::Valid { lines } => {
                    println!("journal_valid=true lines={lines}");
                }
                wdl_audit::VerifyResult::Broken { line, reason } => {
                    println!("journal_valid=false line={line}");
                    bail!("journal chain broken at line {line}: {reason}");
                }
            },
        },
    }

    Ok(())
}

/// Logs go to stderr; stdout carries only command output.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
