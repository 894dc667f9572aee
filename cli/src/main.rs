//! `folio`: drive the portfolio admin session from a terminal.
//!
//! Each run opens the persisted storage file (the localStorage analog),
//! restores the session cookie from it, runs one command and writes the
//! cookie back. The trust flag lives in the same file.

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use folio::config::ConfigError;
use folio::guard::GuardDecision;
use folio::net::cookies::COOKIE_KEY;
use folio::net::endpoints::Section;
use folio::state::login::LoginError;
use folio::state::trust::{FileStorage, Storage, StorageError};
use folio::{Access, ApiError, Config, HttpBackend, LoginFlow, LoginProgress, RouteGuard, SessionCookies, SessionStore};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

/// Storage key remembering which address an OTP was sent to.
const PENDING_OTP_KEY: &str = "pendingOtpEmail";

/// Exit code for a guard redirect.
const REDIRECT_EXIT: u8 = 2;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error(transparent)]
    Login(#[from] LoginError),
    #[error("unknown section `{0}`; expected one of home, about, skills, education, certificates, projects, messages")]
    UnknownSection(String),
    #[error("no OTP is pending; pass --email or run `folio login` first")]
    NoPendingOtp,
    #[error("invalid JSON output: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "folio", about = "Portfolio admin session and content CLI")]
struct Cli {
    #[arg(long, env = "FOLIO_API_HOST")]
    api_host: Option<String>,

    #[arg(long, env = "FOLIO_ADMIN_EMAIL")]
    admin_email: Option<String>,

    #[arg(long, env = "FOLIO_STORAGE_PATH")]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit admin credentials.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FOLIO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Submit the emailed one-time code.
    Otp {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        code: String,
    },
    /// Unlock a locked account with the emailed unlock code.
    Unlock {
        #[arg(long)]
        email: String,
        #[arg(long)]
        code: String,
    },
    /// Verify the stored session and print the identity.
    Whoami,
    /// Evaluate the route guard: prints `render` or `redirect <path>`.
    Guard {
        /// Evaluate a public route instead of an admin-only one.
        #[arg(long, default_value_t = false)]
        public: bool,
    },
    /// End the session locally and on the server.
    Logout,
    Content(ContentCommand),
    /// Print the dashboard statistics.
    Stats,
}

#[derive(Args, Debug)]
struct ContentCommand {
    #[command(subcommand)]
    command: ContentSubcommand,
}

#[derive(Subcommand, Debug)]
enum ContentSubcommand {
    List { section: String },
    Delete { section: String, id: String },
}

/// Everything one run needs, wired over the same cookie jar.
struct Session {
    storage: Arc<FileStorage>,
    cookies: Arc<SessionCookies>,
    backend: Arc<HttpBackend>,
    store: SessionStore,
    admin_email: String,
}

impl Session {
    fn open(config: &Config) -> Result<Self, CliError> {
        let storage = Arc::new(FileStorage::open(&config.storage_path)?);
        let cookies = Arc::new(SessionCookies::new());
        if let Some(saved) = storage.get_item(COOKIE_KEY) {
            cookies.import(&saved);
        }
        let backend = Arc::new(HttpBackend::with_cookies(&config.api_host, cookies.clone())?);
        let store = SessionStore::new(backend.clone(), storage.clone(), config.backoff);
        Ok(Self { storage, cookies, backend, store, admin_email: config.admin_email.clone() })
    }

    fn close(self) -> Result<(), CliError> {
        self.store.shutdown();
        let exported = self.cookies.export();
        if exported.is_empty() {
            self.storage.remove_item(COOKIE_KEY)?;
        } else {
            self.storage.set_item(COOKIE_KEY, &exported)?;
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config, CliError> {
    load_config_with(cli, |key| std::env::var(key).ok())
}

/// Flags shadow the environment key by key, so a flag can supply a value
/// the environment lacks.
fn load_config_with(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Config, CliError> {
    Ok(Config::from_lookup(|key| flag_value(cli, key).or_else(|| env(key)))?)
}

fn flag_value(cli: &Cli, key: &str) -> Option<String> {
    match key {
        "FOLIO_API_HOST" => cli.api_host.clone(),
        "FOLIO_ADMIN_EMAIL" => cli.admin_email.clone(),
        "FOLIO_STORAGE_PATH" => cli.storage.as_ref().map(|path| path.to_string_lossy().into_owned()),
        _ => None,
    }
}

async fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = load_config(&cli)?;
    let session = Session::open(&config)?;
    let result = dispatch(&session, cli.command).await;
    session.close()?;
    result
}

async fn dispatch(session: &Session, command: Command) -> Result<ExitCode, CliError> {
    match command {
        Command::Login { email, password } => run_login(session, &email, &password).await,
        Command::Otp { email, code } => run_otp(session, email, &code).await,
        Command::Unlock { email, code } => {
            let message = LoginFlow::new(session.store.clone()).unlock_account(&email, &code).await?;
            println!("{message}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Whoami => run_whoami(session).await,
        Command::Guard { public } => {
            let access = if public { Access::Public } else { Access::admin(session.admin_email.clone()) };
            let decision = RouteGuard::new(session.store.clone(), access).resolve().await;
            println!("{}", decision_line(decision));
            Ok(decision_exit(decision))
        }
        Command::Logout => {
            session.store.logout().await;
            session.storage.remove_item(PENDING_OTP_KEY)?;
            println!("logged out");
            Ok(ExitCode::SUCCESS)
        }
        Command::Content(content) => run_content(session, content).await,
        Command::Stats => {
            print_json(&session.backend.content().dashboard_stats().await?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_login(session: &Session, email: &str, password: &str) -> Result<ExitCode, CliError> {
    let mut flow = LoginFlow::new(session.store.clone());
    match flow.login(email, password).await? {
        LoginProgress::OtpSent => {
            session.storage.set_item(PENDING_OTP_KEY, email.trim())?;
            println!("OTP sent to {}; run `folio otp --code <code>`", email.trim());
        }
        LoginProgress::LoggedIn => println!("logged in as {}", email.trim()),
    }
    Ok(ExitCode::SUCCESS)
}

async fn run_otp(session: &Session, email: Option<String>, code: &str) -> Result<ExitCode, CliError> {
    let email = email.or_else(|| session.storage.get_item(PENDING_OTP_KEY)).ok_or(CliError::NoPendingOtp)?;
    let mut flow = LoginFlow::new(session.store.clone());
    flow.expect_otp(&email);
    flow.verify_otp(code).await?;
    session.storage.remove_item(PENDING_OTP_KEY)?;
    println!("logged in as {email}");
    Ok(ExitCode::SUCCESS)
}

async fn run_whoami(session: &Session) -> Result<ExitCode, CliError> {
    match session.store.resolve().await.identity {
        Some(identity) => {
            print_json(&serde_json::to_value(&identity)?)?;
            Ok(ExitCode::SUCCESS)
        }
        None => {
            println!("not logged in");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run_content(session: &Session, content: ContentCommand) -> Result<ExitCode, CliError> {
    let client = session.backend.content();
    let value = match content.command {
        ContentSubcommand::List { section } => client.list(parse_section(&section)?).await?,
        ContentSubcommand::Delete { section, id } => client.delete(parse_section(&section)?, &id).await?,
    };
    print_json(&value)?;
    Ok(ExitCode::SUCCESS)
}

fn parse_section(name: &str) -> Result<Section, CliError> {
    Section::parse(name).ok_or_else(|| CliError::UnknownSection(name.to_owned()))
}

fn decision_line(decision: GuardDecision) -> String {
    match decision {
        GuardDecision::Render => "render".to_owned(),
        GuardDecision::Redirect(path) => format!("redirect {path}"),
        GuardDecision::Loading => "loading".to_owned(),
    }
}

fn decision_exit(decision: GuardDecision) -> ExitCode {
    match decision {
        GuardDecision::Render => ExitCode::SUCCESS,
        GuardDecision::Redirect(_) => ExitCode::from(REDIRECT_EXIT),
        GuardDecision::Loading => ExitCode::FAILURE,
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
