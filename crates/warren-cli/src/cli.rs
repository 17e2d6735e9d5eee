//! Argument parsing and startup for the interactive console.

use std::io::{self, IsTerminal};

use clap::Parser;
use reqwest::Url;
use tokio::io::BufReader;
use tracing::Instrument;
use uuid::Uuid;
use warren_telemetry::{DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, init_logging};

use crate::abort::{AbortFlag, spawn_interrupt_listener};
use crate::client::{
    CliError, CliResult, ManagementClient, io_failure, parse_credentials, parse_url,
};
use crate::editor::{BufferedLines, LineEditor};
use crate::session::Session;

const DEFAULT_API_URL: &str = "http://127.0.0.1:15672";
const DEFAULT_CREDENTIALS: &str = "guest:guest";
const DEFAULT_VHOST: &str = "/";

#[derive(Parser)]
#[command(
    name = "warren",
    about = "Interactive console for a message broker's HTTP management API"
)]
pub(crate) struct Cli {
    /// Base URL of the management API.
    #[arg(
        long,
        env = "WARREN_API_URL",
        value_parser = parse_url,
        default_value = DEFAULT_API_URL
    )]
    api_url: Url,
    /// Basic-auth credentials as `user:password`.
    #[arg(
        long,
        env = "WARREN_CREDENTIALS",
        default_value = DEFAULT_CREDENTIALS,
        hide_default_value = true,
        hide_env_values = true
    )]
    credentials: String,
    /// Vhost active when the console starts.
    #[arg(long, env = "WARREN_VHOST", default_value = DEFAULT_VHOST)]
    vhost: String,
    /// Log level used when `RUST_LOG` is unset.
    #[arg(long, env = "WARREN_LOG_LEVEL", default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,
    /// Log output format (`json` or `pretty`).
    #[arg(long, env = "WARREN_LOG_FORMAT", value_parser = parse_log_format)]
    log_format: Option<LogFormat>,
}

/// Parses CLI arguments and runs the console until the user leaves.
/// Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();

    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli.log_format.unwrap_or_else(LogFormat::infer),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: {err:#}");
    }

    let trace_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!("session", trace_id = %trace_id);

    match console(cli, &trace_id).instrument(span).await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

async fn console(cli: Cli, trace_id: &str) -> CliResult<()> {
    let credentials = parse_credentials(&cli.credentials)?;
    tracing::info!(
        api_url = %cli.api_url,
        user = %credentials.user,
        vhost = %cli.vhost,
        "console started"
    );
    let client =
        ManagementClient::new(cli.api_url, credentials, trace_id).map_err(CliError::failure)?;

    let abort = AbortFlag::new();
    let listener = spawn_interrupt_listener(abort.clone());

    let mut session = Session::new(client, abort, cli.vhost, io::stdout());
    let result = match interactive_editor() {
        Some(editor) => session.run(editor).await,
        None => {
            session
                .run(BufferedLines::new(BufReader::new(tokio::io::stdin())))
                .await
        }
    }
    .map_err(io_failure);

    listener.abort();
    result
}

/// Line editor for terminal input; piped input and editor failures fall back
/// to plain line reading.
fn interactive_editor() -> Option<LineEditor> {
    if !io::stdin().is_terminal() {
        return None;
    }
    LineEditor::new()
        .inspect_err(|err| tracing::warn!(error = %err, "line editor unavailable"))
        .ok()
}

fn parse_log_format(input: &str) -> Result<LogFormat, String> {
    input.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_target_local_broker() {
        let cli = Cli::try_parse_from(["warren"]).expect("defaults parse");
        assert_eq!(cli.api_url.as_str(), "http://127.0.0.1:15672/");
        assert_eq!(cli.credentials, DEFAULT_CREDENTIALS);
        assert_eq!(cli.vhost, "/");
        assert_eq!(cli.log_level, DEFAULT_LOG_LEVEL);
        assert!(cli.log_format.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "warren",
            "--api-url",
            "http://broker.internal:15672",
            "--credentials",
            "admin:secret",
            "--vhost",
            "staging",
            "--log-format",
            "json",
        ])
        .expect("flags parse");
        assert_eq!(cli.api_url.host_str(), Some("broker.internal"));
        assert_eq!(cli.vhost, "staging");
        assert_eq!(cli.log_format, Some(LogFormat::Json));
        let credentials = parse_credentials(&cli.credentials).expect("credentials");
        assert_eq!(credentials.user, "admin");
    }

    #[test]
    fn invalid_url_is_rejected() {
        let result = Cli::try_parse_from(["warren", "--api-url", "not a url"]);
        assert!(result.is_err());
    }
}
