use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

#[derive(ValueEnum, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[value(alias = "openai")]
    OpenAI,
    #[value(alias = "claude")]
    Anthropic,
    Ollama,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

#[derive(Parser, Debug)]
#[command(name = "adgenius", version, about = "AI ad-copy generation service")]
pub struct Args {
    /// TOML configuration file; environment variables override it.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, global = true)]
    pub provider: Option<ProviderKind>,

    #[arg(long, global = true)]
    pub model: Option<String>,

    /// SQLite database file. Without it (or without a backend credential) the
    /// service runs in demo mode.
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    #[arg(long, global = true, default_value_t = false)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the HTTP service.
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate one batch of copy from a JSON input file.
    Generate {
        #[arg(long)]
        input: PathBuf,
        /// User id charged for the generation in live mode.
        #[arg(long, default_value = "local")]
        user: String,
        /// Print the raw JSON response instead of the formatted view.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the exact request that would be sent for a JSON input file.
    Prompt {
        #[arg(long)]
        input: PathBuf,
    },
}
