use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "markidea", about = "Versioned markdown notebooks", version)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress human-readable output
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Path to config.toml (defaults to <data-dir>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory (defaults to ~/.markidea)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level for diagnostics on stderr (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// User whose notes are operated on
    #[arg(long, short, global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Notebook management
    Notebook {
        #[command(subcommand)]
        cmd: NotebookCommand,
    },

    /// Note editing and listing
    Note {
        #[command(subcommand)]
        cmd: NoteCommand,
    },

    /// Version history of a note
    History {
        #[command(subcommand)]
        cmd: HistoryCommand,
    },

    /// Recycle bin
    Trash {
        #[command(subcommand)]
        cmd: TrashCommand,
    },

    /// Remote repository sync
    Remote {
        #[command(subcommand)]
        cmd: RemoteCommand,
    },

    /// Service configuration
    Config {
        #[command(subcommand)]
        cmd: ConfigCommand,
    },
}

#[derive(Clone, Subcommand)]
pub enum NotebookCommand {
    /// List notebooks
    List,

    /// Create an empty notebook
    Create {
        name: String,
    },

    /// Rename a notebook
    Rename {
        old_name: String,
        new_name: String,
    },

    /// Delete a notebook; its notes go to the recycle bin
    Delete {
        name: String,
    },
}

/// Where note content comes from: `--content`, `--file`, or stdin
#[derive(Clone, clap::Args)]
pub struct ContentArgs {
    /// Note content
    #[arg(long, conflicts_with = "file")]
    pub content: Option<String>,

    /// Read note content from a file
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Clone, Subcommand)]
pub enum NoteCommand {
    /// List notes of a notebook
    List {
        notebook: String,
    },

    /// Print a note
    Show {
        notebook: String,
        title: String,
    },

    /// Write and commit a note
    Save {
        notebook: String,
        title: String,
        #[command(flatten)]
        input: ContentArgs,
    },

    /// Create a note that must not exist yet
    Create {
        notebook: String,
        title: String,
        #[command(flatten)]
        input: ContentArgs,
    },

    /// Write a draft without committing
    TmpSave {
        notebook: String,
        title: String,
        #[command(flatten)]
        input: ContentArgs,
    },

    /// Throw away an unsaved draft
    Discard {
        notebook: String,
        title: String,
    },

    /// Copy a note into another notebook
    Copy {
        notebook: String,
        title: String,
        target: String,
    },

    /// Move a note into another notebook, or rename it
    Move {
        notebook: String,
        title: String,
        /// Destination notebook
        target: String,
        /// New title (defaults to the current one)
        #[arg(long = "title")]
        new_title: Option<String>,
    },

    /// Delete a note (recoverable from the recycle bin)
    Delete {
        notebook: String,
        title: String,
    },

    /// Search titles and contents
    Search {
        keyword: String,

        /// Restrict the search to these notebooks
        #[arg(long = "notebook")]
        notebooks: Vec<String>,
    },
}

#[derive(Clone, Subcommand)]
pub enum HistoryCommand {
    /// List live versions, newest first
    List {
        notebook: String,
        title: String,
    },

    /// Print the content of an older version
    Show {
        notebook: String,
        title: String,
        version: String,
    },

    /// Roll back to an older version
    Reset {
        notebook: String,
        title: String,
        version: String,
    },
}

#[derive(Clone, Subcommand)]
pub enum TrashCommand {
    /// List deleted notes
    List,

    /// Restore a deleted note
    Recover {
        id: u64,
    },

    /// Permanently drop deleted notes
    Clear {
        /// Snapshot id to drop
        #[arg(required_unless_present = "all")]
        id: Option<u64>,

        /// Drop every deleted note
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

#[derive(Clone, Subcommand)]
pub enum RemoteCommand {
    /// Show sync settings
    Show,

    /// Set the remote URL
    Set {
        url: String,
    },

    /// Enable scheduled pushes
    Enable,

    /// Disable scheduled pushes
    Disable,

    /// Push now
    Push,

    /// Fast-forward from the remote
    Pull,
}

#[derive(Clone, Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}
