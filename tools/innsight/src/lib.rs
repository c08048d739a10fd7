pub mod app;
pub mod config;
pub mod errors;
pub mod hotkeys;
pub mod log_retention;
pub mod logging;
pub mod pager;
pub mod runtime;
pub mod scroll;
pub mod tui;
pub mod types;

use app::run_console;
use clap::{error::ErrorKind, Parser};
use config::{load_config, resolve_log_dir, resolve_token_path, AppConfig, CliOverrides};
use errors::ConsoleError;
use logging::EventLog;
use runtime::{ConsoleRuntime, ProductionFileSystem};
use serde_json::json;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "innsight")]
#[command(about = "Terminal monitoring console for innsight-managed machines")]
pub struct Cli {
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Override the backend base URL.
    #[arg(long)]
    pub server: Option<String>,
    /// Open the log viewer for this machine on startup.
    #[arg(long)]
    pub machine: Option<String>,
    #[arg(long, default_value_t = false)]
    pub login: bool,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub password: Option<String>,
    #[arg(long, default_value_t = false)]
    pub logout: bool,
    /// Print the machine list and exit.
    #[arg(long, default_value_t = false)]
    pub status_only: bool,
}

pub fn run() -> Result<i32, ConsoleError> {
    let args = std::env::args_os().collect::<Vec<_>>();
    let cli = match Cli::try_parse_from(&args) {
        Ok(cli) => cli,
        Err(error) => match error.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{error}");
                return Ok(0);
            }
            _ => return Err(ConsoleError::Cli(error.to_string())),
        },
    };

    let overrides = CliOverrides {
        config_path: cli.config.clone(),
        server: cli.server.clone(),
        machine: cli.machine.clone(),
    };
    let cfg = load_config(&overrides, &ProductionFileSystem)?;

    let home = std::env::var_os("HOME").map(PathBuf::from);
    let token_path = resolve_token_path(&cfg, home.as_deref());
    let runtime = ConsoleRuntime::new(&cfg.server.base_url, token_path);

    let mut event_log = EventLog::new(resolve_log_dir(&cfg, home.as_deref()).join("console.jsonl"));
    event_log.budget_bytes = cfg.logging.budget_bytes;

    run_with_runtime(&cli, &cfg, &runtime, &event_log)
}

pub fn run_with_runtime(
    cli: &Cli,
    cfg: &AppConfig,
    runtime: &ConsoleRuntime,
    event_log: &EventLog,
) -> Result<i32, ConsoleError> {
    if cli.logout {
        runtime.session.clear()?;
        let _ = event_log.info("logout", json!({}));
        runtime.terminal.write_line("signed out")?;
        return Ok(0);
    }

    if cli.login {
        let email = cli
            .email
            .as_deref()
            .ok_or_else(|| ConsoleError::Cli("--login requires --email".to_string()))?;
        let password = cli
            .password
            .as_deref()
            .ok_or_else(|| ConsoleError::Cli("--login requires --password".to_string()))?;
        validate_credentials(email, password)?;
        let token = runtime.auth.login(email, password)?;
        runtime.session.store(&token)?;
        let _ = event_log.info("login", json!({ "email": email }));
        runtime.terminal.write_line("logged in")?;
        return Ok(0);
    }

    // Absent token gates all fetching; it is a normal state, not a failure.
    let Some(token) = runtime.session.token()? else {
        runtime.terminal.write_line(
            "not logged in; run innsight --login --email <email> --password <password>",
        )?;
        return Ok(2);
    };

    if cli.status_only || !runtime.terminal.stdin_is_tty() {
        let machines = runtime.status.machines(&token)?;
        for machine in &machines {
            runtime.terminal.write_line(&format!(
                "{}\t{}\t{}",
                machine.name,
                machine.status.as_str(),
                machine.os
            ))?;
        }
        return Ok(0);
    }

    run_console(runtime, cfg, &token, cli.machine.as_deref(), event_log)
}

/// Same checks the login form runs before submitting.
pub fn validate_credentials(email: &str, password: &str) -> Result<(), ConsoleError> {
    if email.trim().is_empty() {
        return Err(ConsoleError::Auth("email required".to_string()));
    }
    if !email.contains('@') {
        return Err(ConsoleError::Auth("invalid email".to_string()));
    }
    if password.is_empty() {
        return Err(ConsoleError::Auth("password required".to_string()));
    }
    Ok(())
}
