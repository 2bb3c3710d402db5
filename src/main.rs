//! wcportal -- command-line client for the mutual-selection portal API.
//!
//! Wires together configuration loading, tracing, the credential store and
//! the authenticated API client, then runs a single command.

use std::io::BufRead;
use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use wcportal::ApiClient;
use wcportal::api::LoginCredentials;
use wcportal::auth::{IdentityClass, SessionEvent, credentials};
use wcportal::config::Config;
use wcportal::net::ApiRequest;
use wcportal::util::format_relative;

// ---------------------------------------------------------------------------
// CLI argument parsing (minimal, no clap dependency)
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Command {
    Login {
        class: IdentityClass,
        identifier: String,
        password: Option<String>,
    },
    Logout,
    Status,
    Profile {
        class: Option<IdentityClass>,
    },
    Get {
        path: String,
    },
    Template {
        class: IdentityClass,
        out: PathBuf,
    },
    BulkRegister {
        class: IdentityClass,
        file: PathBuf,
    },
    Config,
    Help,
    Version,
}

#[derive(Debug)]
struct CliArgs {
    config_path: Option<PathBuf>,
    command: Command,
}

fn parse_class(value: Option<String>, what: &str) -> Result<IdentityClass, String> {
    value
        .ok_or_else(|| format!("{what} requires an identity class (admin, student, teacher)"))?
        .parse()
}

fn parse_args_from(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut args = args.into_iter();
    let mut config_path = None;
    let mut positional = Vec::new();
    let mut password = None;
    let mut out = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().ok_or("--config requires a path argument")?;
                config_path = Some(PathBuf::from(path));
            }
            "--password" | "-p" => {
                password = Some(args.next().ok_or("--password requires a value")?);
            }
            "--out" | "-o" => {
                out = Some(PathBuf::from(args.next().ok_or("--out requires a directory")?));
            }
            "--help" | "-h" => positional.insert(0, "help".to_string()),
            "--version" | "-V" => positional.insert(0, "version".to_string()),
            other if other.starts_with('-') => return Err(format!("Unknown argument: {other}")),
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        None | Some("help") => Command::Help,
        Some("version") => Command::Version,
        Some("login") => {
            let class = parse_class(positional.next(), "login")?;
            let identifier = positional
                .next()
                .ok_or("login requires an identifier (username, student or teacher number)")?;
            Command::Login {
                class,
                identifier,
                password,
            }
        }
        Some("logout") => Command::Logout,
        Some("status") => Command::Status,
        Some("profile") => Command::Profile {
            class: positional.next().map(|c| c.parse()).transpose()?,
        },
        Some("get") => Command::Get {
            path: positional.next().ok_or("get requires an API path")?,
        },
        Some("template") => Command::Template {
            class: parse_class(positional.next(), "template")?,
            out: out.unwrap_or_else(|| PathBuf::from(".")),
        },
        Some("bulk-register") => Command::BulkRegister {
            class: parse_class(positional.next(), "bulk-register")?,
            file: PathBuf::from(positional.next().ok_or("bulk-register requires a file")?),
        },
        Some("config") => Command::Config,
        Some(other) => return Err(format!("Unknown command: {other}")),
    };

    Ok(CliArgs {
        config_path,
        command,
    })
}

fn parse_args() -> CliArgs {
    match parse_args_from(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!("Run with --help for usage information.");
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        "\
wcportal {version} -- mutual-selection portal client

USAGE:
    wcportal [OPTIONS] <COMMAND>

COMMANDS:
    login <CLASS> <ID> [-p PASSWORD]   Log in as admin, student or teacher
    logout                             Clear all stored credentials
    status                             Show stored identities and token expiry
    profile [CLASS]                    Show the profile of the active identity
    get <PATH>                         Authenticated GET, prints JSON
    template <CLASS> [-o DIR]          Download a bulk registration template
    bulk-register <CLASS> <FILE>       Upload a bulk registration spreadsheet
    config                             Print the effective configuration

OPTIONS:
    -c, --config <PATH>    Path to configuration file [default: wcportal.toml]
    -h, --help             Print this help message
    -V, --version          Print version information

ENVIRONMENT:
    RUST_LOG               Override log level (e.g. RUST_LOG=wcportal=debug)
    WCPORTAL_CONFIG        Alternative to --config flag
    WCPORTAL_PASSWORD      Password for login when --password is not given
    WCPORTAL_*             Per-setting overrides (see wcportal config)
",
        version = env!("CARGO_PKG_VERSION")
    );
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> anyhow::Result<()> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build Tokio runtime")?
        .block_on(async_main())
}

async fn async_main() -> anyhow::Result<()> {
    let cli = parse_args();

    match cli.command {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Version => {
            println!("wcportal {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    // Allow WCPORTAL_CONFIG env var as alternative to --config flag
    let config_path = cli
        .config_path
        .or_else(|| std::env::var("WCPORTAL_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("wcportal.toml"));

    let config = Config::load(&config_path)?;
    init_tracing(&config);
    tracing::debug!(config = %config_path.display(), "Configuration loaded");

    let (client, mut events) = ApiClient::from_config(&config)?.build_with_events();
    let outcome = run(&client, &config, cli.command).await;

    while let Ok(event) = events.try_recv() {
        render_event(&event);
    }
    outcome
}

async fn run(client: &ApiClient, config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login {
            class,
            identifier,
            password,
        } => {
            let password = match password.or_else(|| std::env::var("WCPORTAL_PASSWORD").ok()) {
                Some(p) => p,
                None => read_password()?,
            };
            let login = LoginCredentials::new(class, identifier, password);
            let tokens = client.login(&login).await?;
            println!(
                "Logged in as {class}{}",
                if tokens.refresh.is_some() { "" } else { " (no refresh token issued)" }
            );
        }
        Command::Logout => {
            let removed = client.logout()?;
            println!("Cleared {removed} stored token(s)");
        }
        Command::Status => print_status(client)?,
        Command::Profile { class } => {
            let class = match class {
                Some(c) => c,
                None => client
                    .current_identity()?
                    .map(|r| r.class)
                    .context("Not logged in")?,
            };
            client.require(class)?;
            print_json(&client.profile(class).await?)?;
        }
        Command::Get { path } => {
            let value: serde_json::Value = client.send_json(&ApiRequest::get(path)).await?;
            print_json(&value)?;
        }
        Command::Template { class, out } => {
            let download = client.registration_template(class).await?;
            let path = download.save_to(&out, &format!("{class}_template.xlsx"))?;
            println!("Saved {}", path.display());
        }
        Command::BulkRegister { class, file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload.xlsx")
                .to_string();
            print_json(&client.bulk_register(class, &filename, bytes).await?)?;
        }
        Command::Config => {
            print!("{}", toml::to_string_pretty(config)?);
            let mut overrides: Vec<_> = config.env_overrides.all().iter().collect();
            overrides.sort();
            for (key, env) in overrides {
                println!("# {key} overridden by {env}");
            }
        }
        Command::Help | Command::Version => {}
    }
    Ok(())
}

fn print_status(client: &ApiClient) -> anyhow::Result<()> {
    let active = client.current_identity()?;
    let records = client.resolver().resolve_all()?;
    if records.is_empty() {
        println!("Not logged in");
        return Ok(());
    }
    let last = credentials::last_login(client.store().as_ref())?;
    let now = chrono::Utc::now();
    for record in records {
        let marker = if active.as_ref().map(|a| a.class) == Some(record.class) { "*" } else { " " };
        let expiry = record
            .access_expires_at()
            .and_then(|exp| chrono::DateTime::from_timestamp(exp, 0))
            .map(|at| {
                let verb = if at <= now { "expired" } else { "expires" };
                format!("{verb} {}", format_relative(at, now))
            })
            .unwrap_or_else(|| "expiry unknown".to_string());
        println!(
            "{marker} {:<8} {expiry}, refresh token {}",
            record.class,
            if record.refresh_token.is_some() { "present" } else { "missing" }
        );
    }
    if let Some(last) = last {
        println!("Last login: {last}");
    }
    Ok(())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_password() -> anyhow::Result<String> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn render_event(event: &SessionEvent) {
    match event {
        SessionEvent::Notice(notice) => eprintln!("! {}", notice.message),
        SessionEvent::NavigateToLogin { reason } => {
            eprintln!("! Please log in again ({})", reason.as_str());
        }
    }
}

// ---------------------------------------------------------------------------
// Tracing initialization
// ---------------------------------------------------------------------------

/// Set up the tracing subscriber based on configuration.
fn init_tracing(config: &Config) {
    // RUST_LOG env var takes precedence over config file
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &config.logging.level;
        // Set wcportal crate to the configured level, dependencies to warn
        EnvFilter::new(format!("wcportal={level},warn"))
    });

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
