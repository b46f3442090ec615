//! CLI argument definitions for trackrig.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("TRK_GIT_COMMIT"),
    " ",
    env!("TRK_BUILD_TIMESTAMP"),
    ")"
);

/// trackrig - ftrack tasks, rig syncing and render uploads from the shell.
#[derive(Parser, Debug)]
#[command(name = "trk")]
#[command(author, version, long_version = LONG_VERSION, about = "Browse ftrack tasks, keep linked rigs current and upload renders", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Log debug output to stderr (same as TRK_LOG=debug)
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// ftrack server URL (overrides FTRACK_SERVER and config.kdl)
    #[arg(long = "server", global = true)]
    pub server_url: Option<String>,

    /// ftrack username (overrides FTRACK_API_USER and config.kdl)
    #[arg(long = "user", global = true)]
    pub username: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List active projects with tasks assigned to you
    Projects,

    /// List tasks assigned to you
    Tasks {
        /// Only tasks of this project (defaults to every active project)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Single-task helpers
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Upload a file to a task as a new reviewable version
    Upload {
        /// Task ID
        task_id: String,

        /// File to upload
        file: PathBuf,

        /// Asset name (defaults to the file stem)
        #[arg(long)]
        asset_name: Option<String>,
    },

    /// Rig manifest and linked rig management
    Rig {
        /// Manifest URL or local path (overrides config.kdl)
        #[arg(long, global = true)]
        manifest: Option<String>,

        #[command(subcommand)]
        command: RigCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// Print the web URL of a task
    Url {
        /// Task ID
        task_id: String,

        /// Project ID the task belongs to
        #[arg(short, long)]
        project: String,
    },
}

/// Rig subcommands
#[derive(Subcommand, Debug)]
pub enum RigCommands {
    /// List rigs published in the manifest
    List,

    /// Download the latest version of a rig next to a document
    Download {
        /// Rig ID from the manifest
        rig_id: String,

        /// Saved document the rig is for
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Link table holding the document path
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// Download the latest version of a rig and link its collection
    Link {
        /// Rig ID from the manifest
        rig_id: String,

        /// Saved document the rig is linked into (recorded in the link table)
        #[arg(short, long)]
        document: Option<PathBuf>,

        /// Link table to update
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// Show linked rigs and whether updates are available
    Status {
        /// Link table to read
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// Replace a linked rig with its latest version
    Update {
        /// Stored path of the linked rig, as shown by `trk rig status`
        path: String,

        /// Link table to update
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// List published versions of a linked rig
    Versions {
        /// Stored path of the linked rig
        path: String,

        /// Link table to read
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// Switch a linked rig to a specific published version
    Switch {
        /// Stored path of the linked rig
        path: String,

        /// Version to switch to
        version: String,

        /// Link table to update
        #[arg(long, default_value = "links.json")]
        links: PathBuf,
    },

    /// Show the rig a file name maps to and its version
    Inspect {
        /// Rig file name, e.g. chr_hero_rig_v3.blend
        filename: String,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show resolved settings and where each came from
    Show,

    /// Set a value (server-url, username, api-key, manifest-url, rig-subdir)
    Set {
        key: String,
        value: String,
    },

    /// Remove a value
    Unset {
        key: String,
    },
}
