//! CLI argument definitions for msgate.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `send` | Route one message with failover |
//! | `bulk` | Send a JSON file of messages in paced batches |
//! | `status` | Look up the delivery status of a sent message |
//! | `health` | Check every provider's balance and circuit |
//! | `providers` | List configured providers, optionally for a destination |
//! | `best` | Pick the best provider for a destination |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--config` | `msgate.toml` | Gateway configuration file |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | from config | `EnvFilter` directive for logs on stderr |
//! | `--log-format` | from config | `pretty` or `json` |
//!
//! # Examples
//!
//! ```bash
//! msgate send --to +233244123456 --country GH --message "Your code is 1234"
//! msgate best --country KE --criterion reliability --pretty
//! msgate bulk campaign.json --log-format json
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use msgate_core::{LogFormat, SelectionCriterion, DEFAULT_CONFIG_PATH};

/// msgate - SMS gateway with multi-provider failover
#[derive(Debug, Parser)]
#[command(
    name = "msgate",
    author,
    version,
    about = "SMS gateway with multi-provider routing and failover",
    long_about = "msgate routes each message through the providers configured for its \
destination country, falling back to the next one when a provider fails.\n\
\n\
Every command prints a JSON envelope on stdout; logs go to stderr.\n\
\n\
Use 'msgate <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Gateway configuration file.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log filter directive, e.g. `debug` or `msgate_core=trace`.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log output format.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CriterionArg {
    /// Configured priority order.
    Cost,
    /// Lowest average latency.
    Speed,
    /// Highest success rate.
    Reliability,
}

impl From<CriterionArg> for SelectionCriterion {
    fn from(value: CriterionArg) -> Self {
        match value {
            CriterionArg::Cost => Self::Cost,
            CriterionArg::Speed => Self::Speed,
            CriterionArg::Reliability => Self::Reliability,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Route one message through the destination's providers.
    ///
    /// # Examples
    ///
    ///   msgate send --to +233244123456 --country GH --message "hello"
    ///   msgate send --to 0244123456 --country GH --network MTN --message "hi" --sender SHOP
    Send(SendArgs),

    /// Send every message of a JSON file in paced batches.
    ///
    /// The file holds an array of `{"options": {...}, "country": "GH"}` jobs.
    /// Ctrl-C stops before the next batch; unsent jobs are reported cancelled.
    Bulk(BulkArgs),

    /// Look up a message's delivery status.
    Status(StatusArgs),

    /// Check balances and circuit state of every provider.
    Health,

    /// List configured providers with their statistics.
    Providers(ProvidersArgs),

    /// Pick the best provider for a destination.
    Best(BestArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Recipient phone number.
    #[arg(long)]
    pub to: String,

    /// Message body.
    #[arg(long)]
    pub message: String,

    /// ISO 3166-1 alpha-2 destination country.
    #[arg(long)]
    pub country: String,

    /// Mobile network operator, e.g. MTN.
    #[arg(long)]
    pub network: Option<String>,

    /// Sender id shown to the recipient.
    #[arg(long, default_value = "")]
    pub sender: String,

    /// Caller reference echoed in logs.
    #[arg(long)]
    pub correlation_id: Option<String>,
}

#[derive(Debug, Args)]
pub struct BulkArgs {
    /// JSON file with an array of jobs.
    pub file: PathBuf,
}

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Provider-assigned message id.
    pub external_id: String,

    /// Ask only this provider instead of probing all of them.
    #[arg(long)]
    pub provider: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProvidersArgs {
    /// Only providers serving this country, in routing order.
    #[arg(long)]
    pub country: Option<String>,

    /// Narrow `--country` to a network.
    #[arg(long, requires = "country")]
    pub network: Option<String>,
}

#[derive(Debug, Args)]
pub struct BestArgs {
    #[arg(long)]
    pub country: String,

    #[arg(long)]
    pub network: Option<String>,

    #[arg(long, value_enum, default_value_t = CriterionArg::Cost)]
    pub criterion: CriterionArg,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_send_with_global_options() {
        let cli = Cli::try_parse_from([
            "msgate",
            "send",
            "--to",
            "+233244123456",
            "--message",
            "hello",
            "--country",
            "GH",
            "--pretty",
            "--config",
            "gateway.toml",
        ])
        .expect("valid arguments");

        assert!(cli.pretty);
        assert_eq!(cli.config, PathBuf::from("gateway.toml"));
        match cli.command {
            Command::Send(args) => {
                assert_eq!(args.to, "+233244123456");
                assert_eq!(args.network, None);
                assert_eq!(args.sender, "");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn network_filter_requires_country() {
        assert!(Cli::try_parse_from(["msgate", "providers", "--network", "MTN"]).is_err());
    }

    #[test]
    fn criterion_defaults_to_cost() {
        let cli = Cli::try_parse_from(["msgate", "best", "--country", "KE"]).expect("valid");
        match cli.command {
            Command::Best(args) => assert_eq!(args.criterion, CriterionArg::Cost),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_PATH));
    }
}
