use clap::Parser;
use marathon_converge::{
    ClientConfig, ConvergeError, DiffStyle, Goal, Outcome, Params, Reconciler, SyncPolicy,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "marathon-converge",
    about = "Converge a Marathon application to a JSON definition"
)]
struct Cli {
    /// Marathon endpoint (e.g. http://marathon:8080)
    #[arg(long, env = "MARATHON_URI")]
    uri: String,

    /// Desired state of the application
    #[arg(long, value_enum)]
    state: Goal,

    /// Path to a JSON or YAML app definition
    #[arg(long)]
    app_json: Option<PathBuf>,

    /// Inline JSON app definition
    #[arg(long)]
    app: Option<String>,

    /// App id, for the 'get' and 'absent' states
    #[arg(long)]
    app_id: Option<String>,

    /// Override deployment locks (absent and updated only)
    #[arg(long)]
    force: bool,

    /// For the 'diff' state: whole unified diff, or only changed lines
    #[arg(long, value_enum, default_value_t = DiffStyle::Full)]
    diff_style: DiffStyle,

    /// Checks before giving up on a deploy or delete
    #[arg(long, default_value_t = 60)]
    sync_attempts: u32,

    /// Seconds between checks
    #[arg(long, default_value_t = 3)]
    sync_interval_secs: u64,

    /// Per-request HTTP timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,

    #[arg(long, env = "MARATHON_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "MARATHON_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "reconciliation failed");
            eprintln!(
                "{}",
                json!({"failed": true, "msg": e.to_string(), "details": e.details()})
            );
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli) -> Result<serde_json::Value, ConvergeError> {
    let params = Params {
        goal: cli.state,
        app_json: cli.app_json,
        app: cli.app,
        app_id: cli.app_id,
        force: cli.force,
        diff_style: cli.diff_style,
    };
    let invocation = params.into_invocation()?;

    let config = ClientConfig {
        request_timeout: Duration::from_secs(cli.timeout_secs),
        username: cli.username,
        password: cli.password,
        ..ClientConfig::new(&cli.uri)
    };
    let policy = SyncPolicy {
        max_attempts: cli.sync_attempts,
        interval: Duration::from_secs(cli.sync_interval_secs),
    };

    let reconciler = Reconciler::connect(&config, policy)?;
    let outcome = reconciler.reconcile(&invocation).await?;
    info!(app = %invocation.target.id(), changed = outcome.changed(), "done");

    Ok(match outcome {
        Outcome::Converged { document, changed } => json!({"changed": changed, "meta": document}),
        Outcome::Diff(report) => json!({"changed": false, "diff": report}),
    })
}
