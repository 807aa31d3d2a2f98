use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use textflow_core::config_file::{self, ConfigFile};
use textflow_core::report::{self, HistoryPeriod};
use textflow_core::session::{self, Session};
use textflow_core::{AnalyticsBackend, ApiClient, Config, IngestionResult, forms, operation};
use textflow_ingest::{DatasetState, FileSource, IngestOptions, Selection};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// TextFlow - Merge CSV datasets and run them through the analytics backend
#[derive(Parser, Debug)]
#[command(name = "textflow", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Backend base URL [env: TEXTFLOW_API_BASE_URL]
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// HTTP request timeout in seconds [env: TEXTFLOW_TIMEOUT]
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

/// Files to ingest: explicit paths or a whole directory.
#[derive(Args, Debug)]
struct SelectionArgs {
    /// CSV files to merge, in order (the first file's header is kept)
    #[arg(required_unless_present = "dir")]
    files: Vec<PathBuf>,

    /// Merge every CSV file under this directory instead
    #[arg(long, conflicts_with = "files")]
    dir: Option<PathBuf>,

    /// Per-file read timeout in seconds, 0 to disable [env: TEXTFLOW_READ_TIMEOUT]
    #[arg(long)]
    read_timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge CSV files locally and print or save the result
    Merge {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Write the merged CSV here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge CSV files and submit them for analysis
    Analyze {
        #[command(flatten)]
        selection: SelectionArgs,

        /// Comma-separated operations (see `textflow operations`)
        #[arg(short = 'O', long)]
        operations: String,

        /// Identity to report instead of the logged-in user
        #[arg(long)]
        user: Option<String>,

        /// Ask the backend to email a summary to the user
        #[arg(long)]
        email_summary: bool,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },

    /// Search previously indexed dataset cells
    Search {
        query: String,

        /// Show at most this many hits
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List past analysis runs
    History {
        /// today, week, month or all
        #[arg(long, default_value = "month")]
        period: HistoryPeriod,
    },

    /// Show inbox notifications or export an attached report
    Inbox {
        #[command(subcommand)]
        action: Option<InboxAction>,
    },

    /// Log in and remember the account locally
    Login {
        email: String,

        /// Password (prompted when omitted) [env: TEXTFLOW_PASSWORD]
        #[arg(long, env = "TEXTFLOW_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Forget the stored login
    Logout,

    /// Create an account
    Signup {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        /// Password (prompted when omitted)
        #[arg(long)]
        password: Option<String>,

        /// Password confirmation (prompted when omitted)
        #[arg(long)]
        confirm_password: Option<String>,
    },

    /// Set a new password for an existing account
    ResetPassword {
        email: String,

        /// New password (prompted when omitted)
        #[arg(long)]
        new_password: Option<String>,
    },

    /// Send a message to the operators
    Contact {
        #[arg(long)]
        name: String,

        #[arg(long)]
        email: String,

        message: String,
    },

    /// Purge the search index, history and inbox on the backend
    Cleanup {
        /// Confirmation word (prompted when omitted)
        #[arg(long)]
        confirm: Option<String>,
    },

    /// List the available analysis operations
    Operations,

    /// Inspect or initialize the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum InboxAction {
    /// List notifications (default)
    List,

    /// Export the report attached to a notification as CSV
    Export {
        id: i64,

        /// Output path (default: Report_<id>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a config file with the default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// How long exit waits for blocking reads that outlived their timeout.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let _log_guard = init_logging(cli.log_file.as_deref())?;

    // Resolve configuration: CLI flags > env vars > config file > defaults
    let mut config = Config::from_config_file(&config_file::load_config())
        .with_env_overrides(|key| std::env::var(key).ok());
    if let Some(url) = cli.base_url {
        config.base_url = url;
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout_secs = secs;
    }
    if cli.no_color {
        config.color = false;
    }
    let color = ColorMode(config.color);

    block_on_and_shutdown(run(cli.command, &config, color))
}

/// Drive `future` on a fresh runtime, then shut it down without waiting
/// indefinitely on blocking tasks such as a read stuck on a pipe.
fn block_on_and_shutdown<F>(future: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start the async runtime")?;
    let result = runtime.block_on(future);
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn run(command: Command, config: &Config, color: ColorMode) -> anyhow::Result<()> {
    match command {
        Command::Merge { selection, output } => merge(selection, output, config, color).await,
        Command::Analyze {
            selection,
            operations,
            user,
            email_summary,
            json,
        } => {
            analyze(
                selection,
                &operations,
                user.as_deref(),
                email_summary,
                json,
                config,
                color,
            )
            .await
        }
        Command::Search { query, limit } => search(&query, limit, config, color).await,
        Command::History { period } => history(period, config, color).await,
        Command::Inbox { action } => match action.unwrap_or(InboxAction::List) {
            InboxAction::List => inbox(config, color).await,
            InboxAction::Export { id, output } => export_report(id, output, config, color).await,
        },
        Command::Login { email, password } => login(&email, password, config, color).await,
        Command::Logout => logout(color),
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
        } => signup(&name, &email, password, confirm_password, config, color).await,
        Command::ResetPassword {
            email,
            new_password,
        } => reset_password(&email, new_password, config, color).await,
        Command::Contact {
            name,
            email,
            message,
        } => {
            forms::validate_contact(&name, &email, &message)?;
            let client = ApiClient::new(config)?;
            let reply = client.contact(&name, &email, &message).await?;
            let text = reply.message.unwrap_or_else(|| "Message sent".to_string());
            output::print_success(&mut std::io::stdout(), &text, color)?;
            Ok(())
        }
        Command::Cleanup { confirm } => cleanup(confirm, config, color).await,
        Command::Operations => {
            output::print_operations(&mut std::io::stdout(), color)?;
            Ok(())
        }
        Command::Config { action } => config_command(action, config),
    }
}

/// Install the tracing subscriber. `RUST_LOG` controls the filter
/// (default `warn`); the returned guard must live until exit.
fn init_logging(log_file: Option<&Path>) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let Some(path) = log_file else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
        return Ok(None);
    };

    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(dir, file_name));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

/// Read one line from stdin after printing `label`.
fn prompt(label: &str) -> anyhow::Result<String> {
    eprint!("{}: ", label);
    std::io::stderr().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn value_or_prompt(value: Option<String>, label: &str) -> anyhow::Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt(label),
    }
}

/// Build the selection, read and merge it. Ctrl+C cancels the reads.
async fn load_dataset(
    args: &SelectionArgs,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<IngestionResult> {
    let selection = match &args.dir {
        Some(dir) => Selection::from_directory(dir)?,
        None => Selection::from_paths(&args.files),
    };
    check_csv_files_exist(&selection)?;

    let mut options = IngestOptions::from_config(config);
    if let Some(secs) = args.read_timeout {
        options.read_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let skipped: Vec<String> = selection
        .skipped_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut state = DatasetState::new();
    let tracker = state.tracker();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracker.invalidate();
        }
    });
    let outcome = state.load(selection, &options).await;
    ctrl_c.abort();

    if !outcome.context("Failed to load dataset")? {
        anyhow::bail!("Interrupted");
    }
    let dataset = state
        .result()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("Interrupted"))?;

    let skipped: Vec<&str> = skipped.iter().map(String::as_str).collect();
    output::print_dataset_summary(&mut std::io::stderr(), &dataset, &skipped, color)?;
    Ok(dataset)
}

/// Fail early on a missing CSV path. Files that would be skipped anyway
/// are not checked.
fn check_csv_files_exist(selection: &Selection) -> anyhow::Result<()> {
    for file in selection.accepted() {
        if let FileSource::Disk(path) = &file.source {
            if !path.exists() {
                anyhow::bail!("File not found: {}", path.display());
            }
        }
    }
    Ok(())
}

async fn merge(
    args: SelectionArgs,
    output_path: Option<PathBuf>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let dataset = load_dataset(&args, config, color).await?;

    match output_path {
        Some(path) => {
            let mut text = dataset.merged_text.clone();
            text.push('\n');
            std::fs::write(&path, text)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output::print_success(
                &mut std::io::stderr(),
                &format!("Wrote {}", path.display()),
                color,
            )?;
        }
        None => {
            let mut stdout = std::io::stdout();
            writeln!(stdout, "{}", dataset.merged_text)?;
        }
    }
    Ok(())
}

async fn analyze(
    args: SelectionArgs,
    operations: &str,
    user: Option<&str>,
    email_summary: bool,
    json: bool,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    use indicatif::{ProgressBar, ProgressStyle};

    // Validate everything local before touching the disk or the network
    let operations = operation::parse_list(operations)?;
    if operations.is_empty() {
        anyhow::bail!("Select at least one operation (see `textflow operations`)");
    }
    let client = ApiClient::new(config)?;

    let dataset = load_dataset(&args, config, color).await?;

    let stored = session::load();
    let identity = session::resolve_identity(user, stored.as_ref(), config.user_email.as_deref());
    tracing::debug!(identity = ?identity, "resolved identity");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        spinner.set_style(style);
    }
    spinner.set_message(format!(
        "Analyzing {} with {} operations...",
        dataset.submission_filename(),
        operations.len()
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = textflow_core::submit_dataset(
        &client,
        &dataset,
        &operations,
        identity.as_deref(),
        email_summary,
    )
    .await;
    spinner.finish_and_clear();
    let response = result?;

    let mut stdout = std::io::stdout();
    if json {
        writeln!(stdout, "{}", serde_json::to_string_pretty(&response)?)?;
    } else {
        output::print_analysis(&mut stdout, &response, color)?;
    }
    Ok(())
}

async fn search(
    query: &str,
    limit: Option<usize>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let client = ApiClient::new(config)?;
    let mut hits = client.search(query).await?;
    if let Some(limit) = limit {
        hits.truncate(limit);
    }
    output::print_search_hits(&mut std::io::stdout(), query.trim(), &hits, color)?;
    Ok(())
}

async fn history(period: HistoryPeriod, config: &Config, color: ColorMode) -> anyhow::Result<()> {
    let client = ApiClient::new(config)?;
    let entries = client.history().await?;
    let shown = report::filter_history(&entries, period, chrono::Utc::now());
    output::print_history(&mut std::io::stdout(), &shown, period, color)?;
    Ok(())
}

async fn inbox(config: &Config, color: ColorMode) -> anyhow::Result<()> {
    let client = ApiClient::new(config)?;
    let messages = client.inbox().await?;
    output::print_inbox(&mut std::io::stdout(), &messages, color)?;
    Ok(())
}

async fn export_report(
    id: i64,
    output_path: Option<PathBuf>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let client = ApiClient::new(config)?;
    let messages = client.inbox().await?;
    let message = messages
        .iter()
        .find(|m| m.id == id)
        .ok_or_else(|| anyhow::anyhow!("No inbox message with id {}", id))?;
    let Some(data) = message.report_data.as_deref() else {
        anyhow::bail!("Message {} has no attached report", id);
    };

    let results = report::parse_report(data).context("Attached report is malformed")?;
    let path = output_path.unwrap_or_else(|| PathBuf::from(report::report_filename(id)));
    std::fs::write(&path, report::report_to_csv(&results))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    output::print_success(
        &mut std::io::stdout(),
        &format!("Exported {} results to {}", results.len(), path.display()),
        color,
    )?;
    Ok(())
}

async fn login(
    email: &str,
    password: Option<String>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let password = value_or_prompt(password, "Password")?;
    forms::validate_login(email, &password)?;

    let client = ApiClient::new(config)?;
    let user = client.login(email, &password).await?;
    let path = session::save(&Session::new(user.clone()))?;
    tracing::debug!(path = %path.display(), "session saved");
    output::print_success(
        &mut std::io::stdout(),
        &format!("Logged in as {}", user),
        color,
    )?;
    Ok(())
}

fn logout(color: ColorMode) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    if session::clear()? {
        output::print_success(&mut stdout, "Logged out", color)?;
    } else {
        writeln!(stdout, "Not logged in.")?;
    }
    Ok(())
}

async fn signup(
    name: &str,
    email: &str,
    password: Option<String>,
    confirm_password: Option<String>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let password = value_or_prompt(password, "Password")?;
    let confirm = value_or_prompt(confirm_password, "Confirm password")?;
    forms::validate_signup(name, email, &password, &confirm)?;

    let client = ApiClient::new(config)?;
    let reply = client.signup(name, email, &password).await?;
    let text = reply
        .message
        .unwrap_or_else(|| "Account created".to_string());
    output::print_success(&mut std::io::stdout(), &text, color)?;
    Ok(())
}

async fn reset_password(
    email: &str,
    new_password: Option<String>,
    config: &Config,
    color: ColorMode,
) -> anyhow::Result<()> {
    let new_password = value_or_prompt(new_password, "New password")?;
    forms::validate_reset(email, &new_password)?;

    let client = ApiClient::new(config)?;
    client.reset_password(email, &new_password).await?;
    output::print_success(&mut std::io::stdout(), "Password updated", color)?;
    Ok(())
}

async fn cleanup(confirm: Option<String>, config: &Config, color: ColorMode) -> anyhow::Result<()> {
    let confirm = match confirm {
        Some(word) => word,
        None => prompt(&format!(
            "This deletes all history, inbox messages and indexed data. Type {} to continue",
            forms::PURGE_CONFIRMATION
        ))?,
    };
    forms::confirm_purge(&confirm)?;

    let client = ApiClient::new(config)?;
    let reply = client.cleanup().await?;
    let text = reply.message.unwrap_or_else(|| "Purged".to_string());
    output::print_success(&mut std::io::stdout(), &text, color)?;
    Ok(())
}

fn config_command(action: ConfigAction, config: &Config) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();
    match action {
        ConfigAction::Show => {
            let stored = session::load();
            let identity =
                session::resolve_identity(None, stored.as_ref(), config.user_email.as_deref());
            output::print_config(&mut stdout, config, identity.as_deref())?;
        }
        ConfigAction::Path => match config_file::config_path() {
            Some(path) => writeln!(stdout, "{}", path.display())?,
            None => anyhow::bail!("Could not determine config directory"),
        },
        ConfigAction::Init { force } => {
            let path = config_file::config_path()
                .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
            if path.exists() && !force {
                anyhow::bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            config_file::save_to_path(&ConfigFile::with_defaults(), &path)?;
            writeln!(stdout, "Wrote {}", path.display())?;
            writeln!(stdout)?;
            write!(stdout, "{}", toml::to_string_pretty(&ConfigFile::with_defaults())?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_csv_paths_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data.csv");
        std::fs::write(&data, "h\n1").unwrap();

        let with_missing_notes = Selection::from_paths([data.clone(), dir.path().join("notes.txt")]);
        assert!(check_csv_files_exist(&with_missing_notes).is_ok());

        let with_missing_csv = Selection::from_paths([data, dir.path().join("gone.csv")]);
        let err = check_csv_files_exist(&with_missing_csv).unwrap_err();
        assert!(err.to_string().contains("gone.csv"));
    }

    #[test]
    fn exit_does_not_wait_for_stuck_blocking_reads() {
        let started = std::time::Instant::now();
        let result = block_on_and_shutdown(async {
            let _stuck = tokio::task::spawn_blocking(|| std::thread::sleep(Duration::from_secs(30)));
            Err::<(), _>(anyhow::anyhow!("reading stuck.csv timed out"))
        });
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
