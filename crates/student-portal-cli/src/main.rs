// Copyright 2026 Student Portal Contributors
// SPDX-License-Identifier: Apache-2.0

//! student-portal: command-line front end for the scraping core.
//!
//! Logs in, runs one operation and prints its records as JSON on stdout.
//! Logs go to stderr.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;
use std::path::PathBuf;

use student_portal::{PortalClient, PortalConfig, PortalError};

#[derive(Parser)]
#[command(
    name = "student-portal",
    about = "Scrape timetable, grades, exams and messages from the student portal",
    version,
    after_help = "Credentials default to PORTAL_USERNAME / PORTAL_PASSWORD.\nRun 'student-portal <command> --help' for details on each command."
)]
struct Cli {
    /// Portal origin (default: PORTAL_BASE_URL or https://student.portal.local)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Per-request timeout in milliseconds (default: PORTAL_TIMEOUT_MS or 30000)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,

    /// Portal username
    #[arg(long, short, global = true)]
    username: Option<String>,

    /// Portal password
    #[arg(long, short, global = true)]
    password: Option<String>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and validate the session
    Check,
    /// Lessons of the current week, another week or the week of a date
    Timetable {
        /// Any day of the wanted week (YYYY-MM-DD)
        #[arg(long, conflicts_with = "weeks")]
        date: Option<NaiveDate>,
        /// Weeks to move from the current one (negative for the past)
        #[arg(long, allow_hyphen_values = true)]
        weeks: Option<i32>,
    },
    /// Received messages
    Messages,
    /// Received notifications
    Notifications,
    /// One message or notification with its body
    Message {
        /// Message id from `messages` or `notifications`
        id: u64,
    },
    /// Transcript with ECTS total and average grade
    Grades,
    /// Registered exams across exam periods
    Exams {
        /// List the selectable exam periods instead
        #[arg(long)]
        periods: bool,
    },
    /// Tuition payments with totals
    Payments,
    /// Enrollment history
    Regularity,
    /// Course-material folder tree
    Documents,
    /// Files of one document folder
    Files {
        /// Folder id from `documents`
        folder_id: u64,
    },
    /// Download one file
    Download {
        /// File id from `files`
        file_id: u64,
        /// Output path (default: the file's own name in the current directory)
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Serialize)]
struct SessionReport<'a> {
    user: &'a str,
    valid: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        match err.downcast_ref::<PortalError>() {
            Some(portal) => eprintln!("{}\n  ({portal})", portal.user_message()),
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "student-portal", &mut std::io::stdout());
        return Ok(());
    }

    let config = PortalConfig::resolve(cli.base_url.as_deref(), cli.timeout_ms);
    let username = credential(cli.username, "PORTAL_USERNAME")?;
    let password = credential(cli.password, "PORTAL_PASSWORD")?;

    let mut client = PortalClient::new(config)?;
    let user = client.login(&username, &password).await?;
    tracing::info!(user = %user, "session established");

    let result = execute(&mut client, &user, cli.command, cli.pretty).await;
    client.logout().await;
    result
}

async fn execute(client: &mut PortalClient, user: &str, command: Commands, pretty: bool) -> Result<()> {
    match command {
        Commands::Check => {
            let valid = client.check_session().await;
            print_json(&SessionReport { user, valid }, pretty)
        }
        Commands::Timetable { date, weeks } => {
            let lessons = match (date, weeks) {
                (Some(date), _) => client.timetable_for_date(date).await?,
                (None, Some(shift)) => client.timetable_week(shift).await?,
                (None, None) => client.timetable().await?,
            };
            print_json(&lessons, pretty)
        }
        Commands::Messages => print_json(&client.messages().await?, pretty),
        Commands::Notifications => print_json(&client.notifications().await?, pretty),
        Commands::Message { id } => match client.message_detail(id).await? {
            Some(detail) => print_json(&detail, pretty),
            None => bail!("message {id} not found"),
        },
        Commands::Grades => print_json(&client.grades().await?, pretty),
        Commands::Exams { periods: true } => print_json(&client.exam_periods().await?, pretty),
        Commands::Exams { periods: false } => print_json(&client.exams().await?, pretty),
        Commands::Payments => print_json(&client.payments().await?, pretty),
        Commands::Regularity => print_json(&client.regularity().await?, pretty),
        Commands::Documents => print_json(&client.documents().await?, pretty),
        Commands::Files { folder_id } => print_json(&client.folder_files(folder_id).await?, pretty),
        Commands::Download { file_id, out } => {
            let file = client.download(file_id).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(&file.file_name));
            std::fs::write(&path, &file.bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("saved {} bytes to {}", file.bytes.len(), path.display());
            print_json(&file, pretty)
        }
        Commands::Completions { .. } => Ok(()),
    }
}

fn credential(explicit: Option<String>, env: &str) -> Result<String> {
    match explicit.or_else(|| std::env::var(env).ok()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("missing credential: pass it as a flag or set {env}"),
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
