//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::commands::convert::ConvertArgs;
use crate::commands::upload::UploadArgs;

/// SkillPulse daily log tools.
///
/// Normalizes a hand-written daily activity log into dated, sequenced task
/// records and keeps a local task store in sync with it.
#[derive(Debug, Parser)]
#[command(name = "sp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a daily log into `ID;DESCRIPTION;TIMESTAMP` records.
    Convert(ConvertArgs),

    /// Upload a daily log to the task store, skipping unchanged input.
    Upload(UploadArgs),

    /// List stored tasks.
    List {
        /// Output JSON Lines instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show task store status.
    Status,

    /// Delete every stored task.
    Delete {
        /// Confirm the deletion.
        #[arg(long)]
        yes: bool,
    },
}
