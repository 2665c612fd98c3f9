use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pocket_portal::SessionController;
use pocket_portal::config::{ConfigError, PortalConfig, validate_max_tokens};
use pocket_portal::net::api::HttpPortalApi;
use pocket_portal::net::error::ApiError;
use pocket_portal::net::types::{AuthMode, SessionId};
use pocket_portal::state::admin::AdminError;
use pocket_portal::state::auth::{AuthError, AuthOrigin, MemoryNavigation, Navigation};
use pocket_portal::state::chat::{ChatError, Message};
use pocket_portal::state::history::HistoryError;
use pocket_portal::storage::FileStore;
use pocket_portal::storage::credentials::CredentialStore;
use reqwest::Url;
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

type Controller = SessionController<HttpPortalApi, FileStore>;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("not logged in; run `pocket login` first")]
    NotLoggedIn,
    #[error("redirect URL carried no usable credential")]
    NoRedirectCredential,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("password is required")]
    MissingPassword,
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    #[error("{}", .0.user_message())]
    Api(#[from] ApiError),
    #[error("{}", .0.user_message())]
    Auth(#[from] AuthError),
    #[error("chat: {0}")]
    Chat(#[from] ChatError),
    #[error("history: {0}")]
    History(#[from] HistoryError),
    #[error("{}", .0.user_message())]
    Admin(#[from] AdminError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "pocket", about = "Pocket Portal chat client")]
struct Cli {
    /// Backend origin; overrides `POCKET_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    /// Credential file; overrides `POCKET_STATE_FILE`.
    #[arg(long)]
    state_file: Option<PathBuf>,

    /// Request deadline; overrides `POCKET_REQUEST_TIMEOUT_SECS`.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Log at debug level instead of warnings only.
    #[arg(long, short, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the backend health endpoint.
    Ping,
    Login(CredentialArgs),
    Register(CredentialArgs),
    /// Print the federated (Google) login URL.
    GoogleUrl,
    /// Complete a federated login from the URL the browser landed on.
    Resume { redirect_url: String },
    Whoami,
    Logout,
    Chat(ChatArgs),
    Sessions(SessionsCommand),
    Admin(AdminCommand),
}

#[derive(Args, Debug)]
struct CredentialArgs {
    #[arg(long)]
    username: String,

    /// Read from stdin when omitted.
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ChatArgs {
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Send one prompt and exit instead of reading prompts from stdin.
    #[arg(long)]
    prompt: Option<String>,
}

#[derive(Args, Debug)]
struct SessionsCommand {
    #[command(subcommand)]
    command: SessionsSubcommand,
}

#[derive(Subcommand, Debug)]
enum SessionsSubcommand {
    List,
    Show { id: String },
}

#[derive(Args, Debug)]
struct AdminCommand {
    #[command(subcommand)]
    command: AdminSubcommand,
}

#[derive(Subcommand, Debug)]
enum AdminSubcommand {
    Metrics,
    ClearCache,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let mut config = PortalConfig::from_env()?;
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url;
    }
    if let Some(state_file) = cli.state_file {
        config.state_file = state_file;
    }
    if let Some(secs) = cli.timeout_secs {
        config.timeouts.request_secs = secs;
    }

    let api = HttpPortalApi::new(&config.base_url, config.timeouts)?;
    let start_url = match &cli.command {
        Command::Resume { redirect_url } => redirect_url.as_str(),
        _ => api.base_url(),
    };
    let mut navigation = MemoryNavigation::new(parse_url(start_url)?);
    tracing::debug!(state_file = %config.state_file.display(), "cli: starting");
    let credentials = CredentialStore::new(FileStore::new(config.state_file.clone()));
    let mut controller = SessionController::start(api, credentials, &mut navigation).with_max_tokens(config.max_tokens);

    match cli.command {
        Command::Ping => run_ping(&controller).await,
        Command::Login(args) => run_auth(&mut controller, AuthMode::Login, args).await,
        Command::Register(args) => run_auth(&mut controller, AuthMode::Register, args).await,
        Command::GoogleUrl => {
            println!("{}", controller.federated_login_url());
            Ok(())
        }
        Command::Resume { .. } => run_resume(&controller, &navigation),
        Command::Whoami => run_whoami(&controller),
        Command::Logout => {
            controller.logout();
            println!("logged out");
            Ok(())
        }
        Command::Chat(args) => run_chat(&controller, args).await,
        Command::Sessions(sessions) => run_sessions(&controller, sessions).await,
        Command::Admin(admin) => run_admin(&controller, admin).await,
    }
}

fn parse_url(raw: &str) -> Result<Url, CliError> {
    Url::parse(raw).map_err(|e| CliError::InvalidUrl(format!("{raw}: {e}")))
}

fn require_login(controller: &Controller) -> Result<(), CliError> {
    if controller.auth().is_authenticated() { Ok(()) } else { Err(CliError::NotLoggedIn) }
}

async fn run_ping(controller: &Controller) -> Result<(), CliError> {
    controller.api().health().await?;
    println!("ok");
    Ok(())
}

async fn run_auth(controller: &mut Controller, mode: AuthMode, args: CredentialArgs) -> Result<(), CliError> {
    let password = match args.password {
        Some(password) => password,
        None => {
            eprint!("password: ");
            let mut lines = stdin_lines();
            lines.next_line().await?.ok_or(CliError::MissingPassword)?
        }
    };
    let credential = controller
        .submit_credentials(mode, &args.username, &password)
        .await?;
    println!("logged in as {} ({})", credential.username(), credential.role());
    Ok(())
}

fn run_resume(controller: &Controller, navigation: &MemoryNavigation) -> Result<(), CliError> {
    if controller.startup_origin() != AuthOrigin::Redirect {
        return Err(CliError::NoRedirectCredential);
    }
    let credential = controller.auth().credential().ok_or(CliError::NoRedirectCredential)?;
    println!("logged in as {} ({})", credential.username(), credential.role());
    eprintln!("location: {}", navigation.current());
    Ok(())
}

fn run_whoami(controller: &Controller) -> Result<(), CliError> {
    let credential = controller.auth().credential().ok_or(CliError::NotLoggedIn)?;
    println!("{} ({})", credential.username(), credential.role());
    Ok(())
}

async fn run_chat(controller: &Controller, args: ChatArgs) -> Result<(), CliError> {
    require_login(controller)?;
    let max_tokens = args.max_tokens.map(validate_max_tokens).transpose()?;

    if let Some(prompt) = args.prompt {
        let reply = controller.send(&prompt, max_tokens).await?;
        print_reply(&reply);
        return Ok(());
    }

    eprintln!("type a prompt; /new starts a new conversation, /quit exits");
    let mut lines = stdin_lines();
    let mut stderr = tokio::io::stderr();
    loop {
        stderr.write_all(b"> ").await?;
        stderr.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => {}
            "/quit" => break,
            "/new" => {
                controller.reset_conversation().await;
                eprintln!("new conversation");
            }
            prompt => match controller.send(prompt, max_tokens).await {
                Ok(reply) => print_reply(&reply),
                Err(e) => eprintln!("{e}"),
            },
        }
    }
    Ok(())
}

fn print_reply(reply: &Message) {
    if reply.is_cached() {
        println!("[cached] {}", reply.content);
    } else {
        println!("{}", reply.content);
    }
}

async fn run_sessions(controller: &Controller, sessions: SessionsCommand) -> Result<(), CliError> {
    require_login(controller)?;
    match sessions.command {
        SessionsSubcommand::List => print_json(&controller.list_sessions().await?),
        SessionsSubcommand::Show { id } => {
            let Ok(id) = id.parse::<SessionId>();
            print_json(&controller.open_session(&id).await?)
        }
    }
}

async fn run_admin(controller: &Controller, admin: AdminCommand) -> Result<(), CliError> {
    require_login(controller)?;
    match admin.command {
        AdminSubcommand::Metrics => print_json(&controller.refresh_metrics().await?),
        AdminSubcommand::ClearCache => {
            controller.clear_cache().await?;
            println!("cache cleared");
            if let Some(metrics) = &controller.admin().await.metrics {
                print_json(metrics)?;
            }
            Ok(())
        }
    }
}

fn stdin_lines() -> Lines<BufReader<Stdin>> {
    BufReader::new(tokio::io::stdin()).lines()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
