//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "docqa",
    version,
    about = "Document question answering with hybrid retrieval and cascading fallback",
    long_about = "Docqa ingests plain-text documents, indexes them for hybrid lexical and \
                  vector retrieval, and answers questions through a cascading pipeline: \
                  cached answers first, then generation grounded in retrieved passages, \
                  then a full-corpus fallback before giving up."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/docqa/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question against a set of documents
    Ask {
        /// Question to ask
        question: String,

        /// Document files to ingest before answering
        #[arg(short, long = "doc", value_name = "FILE")]
        docs: Vec<PathBuf>,

        /// Print the answer as JSON with route and source metadata
        #[arg(long)]
        json: bool,
    },

    /// Interactive question answering session
    Chat {
        /// Document files to ingest at startup
        #[arg(short, long = "doc", value_name = "FILE")]
        docs: Vec<PathBuf>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
