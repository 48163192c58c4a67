//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Schedule-driven control of an ASIC miner fleet.
#[derive(Parser, Debug)]
#[command(name = "hashctl", version, about = "Schedule-driven control of an ASIC miner fleet")]
pub struct CliArgs {
    /// Fleet file (TOML) describing schedules, profiles and devices.
    /// Seeds the in-memory store when PostgreSQL is not configured.
    #[arg(long, global = true, env = "HASHCTL_FLEET")]
    pub fleet: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the control API and run the sampling and enforcement loops.
    Serve,
    /// Run one sampling pass and one enforcement pass, then exit.
    RunOnce,
    /// Import a fleet file into PostgreSQL.
    Import {
        /// Path to the fleet file.
        path: PathBuf,
    },
}
