//! Command-line entry point for the Account-Export API client.

use clap::{Parser, Subcommand};
use imperva_export::{
    Artifact, CompletedExport, Config, Deadline, Event, ExportClient, cancel_on_signal,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Level;

#[derive(Parser)]
#[command(
    name = "imperva-export-cli",
    author,
    version,
    about = "A CLI tool for interacting with the Imperva Account-Export API",
    long_about = None
)]
struct Cli {
    /// Config file (default is $HOME/.config/imperva-export-cli.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Imperva API ID
    #[arg(long, env = "API_ID", global = true, hide_env_values = true)]
    api_id: Option<String>,

    /// Imperva API Key
    #[arg(long, env = "API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Log level (none, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory to save exported files
    #[arg(long, env = "OUTPUT_DIR", global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initiate the export process
    Export {
        /// The account ID to work on
        #[arg(long)]
        caid: i64,
    },
    /// Wait for an export to complete and download the zip file
    Status {
        /// The account ID to work on
        #[arg(long)]
        caid: i64,
        /// The handler received in the export response
        #[arg(long)]
        handler: String,
    },
    /// Download the exported zip file after successful export
    Download {
        /// The account ID to work on
        #[arg(long)]
        caid: i64,
        /// The handler received in the export response
        #[arg(long)]
        handler: String,
    },
    /// Initiate the export and download the zip file once it is ready
    Auto {
        /// The account ID to work on
        #[arg(long)]
        caid: i64,
    },
}

/// Where user-facing output goes
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Output {
    /// Logging disabled; progress printed to stdout, errors to stderr
    Plain,
    /// Structured logs on stderr
    Log(Level),
}

impl Output {
    /// Map a configured level name; the flag is false for unknown names
    fn from_level(level: &str) -> (Self, bool) {
        match level.trim().to_ascii_lowercase().as_str() {
            "none" => (Output::Plain, true),
            "debug" => (Output::Log(Level::DEBUG), true),
            "info" => (Output::Log(Level::INFO), true),
            "warn" => (Output::Log(Level::WARN), true),
            "error" => (Output::Log(Level::ERROR), true),
            _ => (Output::Log(Level::INFO), false),
        }
    }

    fn init(self) {
        if let Output::Log(level) = self {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
    }

    fn report_error(self, error: &imperva_export::Error) {
        match self {
            Output::Plain => eprintln!("{error}"),
            Output::Log(_) => {
                tracing::error!(error = %error, kind = error.kind().as_str(), "Error executing command")
            }
        }
    }
}

/// What a finished command produced
enum Outcome {
    Submitted(String),
    Saved(Artifact),
    Completed(CompletedExport),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let (output, known) = Output::from_level(&config.log_level);
    output.init();
    if !known {
        tracing::warn!(level = %config.log_level, "Unknown log level, defaulting to 'info'");
    }

    match run(cli.command, config, output).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output.report_error(&e);
            ExitCode::FAILURE
        }
    }
}

/// Defaults, then the config file, then environment and flags
fn load_config(cli: &Cli) -> imperva_export::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(api_id) = cli.api_id.as_ref().filter(|v| !v.is_empty()) {
        config.api.api_id = api_id.clone();
    }
    if let Some(api_key) = cli.api_key.as_ref().filter(|v| !v.is_empty()) {
        config.api.api_key = api_key.clone();
    }
    if let Some(level) = cli.log_level.as_ref().filter(|v| !v.is_empty()) {
        config.log_level = level.clone();
    }
    if let Some(dir) = cli.output_dir.as_ref().filter(|v| !v.as_os_str().is_empty()) {
        config.output_dir = dir.clone();
    }

    Ok(config)
}

async fn run(command: Commands, config: Config, output: Output) -> imperva_export::Result<()> {
    let client = ExportClient::new(config)?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let progress = (output == Output::Plain)
        .then(|| ProgressPrinter::for_command(&command).spawn(client.subscribe()));
    let result = execute(&client, command, &shutdown).await;

    // Closing the channel lets the printer drain and exit
    drop(client);
    if let Some(progress) = progress {
        progress.await.ok();
    }
    shutdown.cancel();

    match result? {
        Outcome::Submitted(handle) => {
            tracing::debug!(handle = %handle, "Export submitted");
        }
        Outcome::Saved(artifact) => {
            tracing::debug!(path = %artifact.path.display(), bytes = artifact.bytes, "Export saved");
        }
        Outcome::Completed(export) => {
            tracing::info!(handle = %export.handle, "Export completed successfully");
            if output == Output::Plain {
                println!("Export completed successfully. Handler ID: {}", export.handle);
            }
        }
    }
    Ok(())
}

async fn execute(
    client: &ExportClient,
    command: Commands,
    shutdown: &CancellationToken,
) -> imperva_export::Result<Outcome> {
    let timeouts = client.config().timeouts.clone();

    match command {
        Commands::Export { caid } => {
            let deadline = Deadline::after(timeouts.submit).with_parent(shutdown);
            let handle = client.submit_export(caid, &deadline).await?;
            Ok(Outcome::Submitted(handle))
        }
        Commands::Status { caid, handler } => {
            let deadline = Deadline::after(timeouts.wait).with_parent(shutdown);
            let artifact = client.wait_for_export(caid, &handler, &deadline).await?;
            Ok(Outcome::Saved(artifact))
        }
        Commands::Download { caid, handler } => {
            let deadline = Deadline::after(timeouts.download).with_parent(shutdown);
            let artifact = client.download_export(caid, &handler, &deadline).await?;
            Ok(Outcome::Saved(artifact))
        }
        Commands::Auto { caid } => {
            let deadline = Deadline::after(timeouts.wait).with_parent(shutdown);
            let export = client
                .run_export(caid, &deadline)
                .await
                .map_err(|e| e.context("error during auto export"))?;
            Ok(Outcome::Completed(export))
        }
    }
}

/// Print progress events to stdout until the client is dropped
/// Plain-mode rendering of client events
struct ProgressPrinter {
    waiting: bool,
    handler_label: &'static str,
}

impl ProgressPrinter {
    fn for_command(command: &Commands) -> Self {
        let handler_label = match command {
            Commands::Auto { .. } => "Handler ID",
            _ => "Handler",
        };
        Self {
            waiting: false,
            handler_label,
        }
    }

    /// Text to print for `event`, without a trailing flush
    fn render(&mut self, event: &Event) -> String {
        match event {
            Event::Submitted { handle, .. } => {
                format!("Export initiated. {}: {handle}\n", self.handler_label)
            }
            Event::InProgress { .. } if self.waiting => ".".to_string(),
            Event::InProgress { .. } => {
                self.waiting = true;
                "Waiting for export to complete.".to_string()
            }
            Event::Downloading { .. } => {
                let newline = if std::mem::take(&mut self.waiting) { "\n" } else { "" };
                format!("{newline}Export completed. Saving file...\n")
            }
            Event::Saved { path, bytes } => format!(
                "Export file downloaded successfully to {} ({bytes} bytes)\n",
                path.display()
            ),
        }
    }

    fn spawn(mut self, mut events: broadcast::Receiver<Event>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let event = match events.recv().await {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                let mut stdout = std::io::stdout().lock();
                write!(stdout, "{}", self.render(&event)).ok();
                stdout.flush().ok();
            }
        })
    }
}
