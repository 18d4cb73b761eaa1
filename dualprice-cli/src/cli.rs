//! Command-line argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Dual-currency price annotation tools
#[derive(Debug, Parser)]
#[command(name = "dualprice", version, about)]
pub struct Cli {
    /// Path to a configuration JSON file (defaults apply when omitted)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Annotate a checkout or line-item JSON payload
    Payload(PayloadArgs),
    /// Inject dual-price content into an HTML fragment's wrapper element
    Markup(MarkupArgs),
    /// Convert a minor-units amount and print the secondary display string
    Convert(ConvertArgs),
}

/// Arguments for the `payload` subcommand
#[derive(Debug, Args)]
pub struct PayloadArgs {
    /// Input file, or "-" for stdin
    #[arg(default_value = "-")]
    pub input: String,

    /// REST route used to select the annotation handler
    #[arg(long, default_value = "/shop/v1/checkouts")]
    pub route: String,

    /// Pretty-print the annotated payload
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `markup` subcommand
#[derive(Debug, Args)]
pub struct MarkupArgs {
    /// Input file holding the fragment, or "-" for stdin
    #[arg(default_value = "-")]
    pub input: String,

    /// Wrapper tag to inject inside
    #[arg(long, default_value = "span")]
    pub tag: String,

    /// Content to inject before the wrapper's closing tag
    #[arg(long)]
    pub content: String,
}

/// Arguments for the `convert` subcommand
#[derive(Debug, Args)]
pub struct ConvertArgs {
    /// Amount in primary-currency minor units
    pub amount: i64,

    /// Override the configured conversion rate
    #[arg(long)]
    pub rate: Option<String>,
}
