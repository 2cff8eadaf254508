//! Tenant SSO bot entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse CLI and load config
//!   3. Init logger at the effective level (CLI `-v` flags > env > config)
//!   4. Build state, connector client, authenticator, adapter and bot
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Run comms until shutdown

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tenant_sso_bot::bot::TenantSsoBot;
use tenant_sso_bot::botframework::adapter::BotAdapter;
use tenant_sso_bot::botframework::auth::{AnonymousAuthenticator, BotFrameworkAuthenticator, RequestAuthenticator};
use tenant_sso_bot::botframework::connector::{AppCredentials, ConnectorClient};
use tenant_sso_bot::config::{self, Config};
use tenant_sso_bot::error::AppError;
use tenant_sso_bot::logger;
use tenant_sso_bot::subsystems::comms::{self, HttpState};
use tenant_sso_bot::subsystems::memory::{MemoryStorage, UserState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Optional file.
    let _ = dotenvy::dotenv();

    let args = parse_cli_args()?;

    let mut config = config::load(args.config_path.as_deref())?;
    if let Some(port) = args.port {
        config.http.port = port;
    }

    // Bare levels are checked up front; full filter directives go to EnvFilter as-is.
    if !config.log_level.contains(['=', ',']) {
        logger::parse_level(&config.log_level)?;
    }

    let effective_log_level = args.log_level.unwrap_or(config.log_level.as_str());
    logger::init(effective_log_level, args.log_level.is_some())?;

    info!(
        bot_name = %config.bot_name,
        configured_log_level = %config.log_level,
        effective_log_level = %effective_log_level,
        "config loaded"
    );

    if config.credentials.is_anonymous() {
        warn!("MicrosoftAppId is not set; inbound requests are not authenticated");
    }
    if config.oauth_connection_name.is_none() {
        warn!("OAuthConnectionName is not set; sign-in cards will not name a connection");
    }

    let user_state = UserState::new(Arc::new(MemoryStorage::new()));

    let http = ConnectorClient::http_client(&config.connector)?;
    let credentials = Arc::new(AppCredentials::new(&config.credentials, &config.connector, http.clone()));
    if !credentials.is_anonymous() {
        info!(token_endpoint = credentials.token_endpoint(), "connector credentials ready");
    }
    let connector = Arc::new(ConnectorClient::new(http.clone(), credentials));

    let authenticator: Arc<dyn RequestAuthenticator> = if config.credentials.is_anonymous() {
        Arc::new(AnonymousAuthenticator)
    } else {
        Arc::new(BotFrameworkAuthenticator::new(
            config.credentials.app_id.clone(),
            config.auth.clone(),
            http,
        ))
    };

    let adapter = BotAdapter::new(authenticator, connector, config.typing.clone());
    let bot = TenantSsoBot::new(user_state, config.oauth_connection_name.clone());
    let state = HttpState::new(&config.bot_name, adapter, bot);

    let shutdown = CancellationToken::new();

    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    print_startup_summary(&config);

    let comms = comms::start(&config, state, shutdown.clone());
    let result = comms.join().await;
    shutdown.cancel();
    result
}

fn print_startup_summary(config: &Config) {
    let fit = |text: String| -> String {
        const WIDTH: usize = 58;
        if text.chars().count() >= WIDTH {
            let mut out = text.chars().take(WIDTH - 1).collect::<String>();
            out.push('…');
            out
        } else {
            format!("{text:<WIDTH$}")
        }
    };

    let app_id = if config.credentials.is_anonymous() {
        "not set (anonymous)".to_string()
    } else {
        config.credentials.app_id.clone()
    };
    let connection = config.oauth_connection_name.as_deref().unwrap_or("not set");
    let typing = if config.typing.enabled {
        format!("after {}ms, every {}ms", config.typing.delay.as_millis(), config.typing.period.as_millis())
    } else {
        "disabled".to_string()
    };

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ 🤖 Tenant SSO Bot                                            ║");
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("Bot: {}", config.bot_name)));
    println!("║   {}║", fit(format!("PID: {}", std::process::id())));
    println!("║   {}║", fit(format!("App id: {app_id}")));
    println!("║   {}║", fit(format!("OAuth connection: {connection}")));
    println!("╟──────────────────────────────────────────────────────────────╢");
    println!("║   {}║", fit(format!("Endpoint: http://{}/api/messages", config.http.bind_addr())));
    println!("║   {}║", fit(format!("Static views: {}", config.http.static_views_dir.display())));
    println!("║   {}║", fit(format!("Typing: {typing}")));
    println!("╚══════════════════════════════════════════════════════════════╝");
}

struct CliArgs {
    log_level: Option<&'static str>,
    config_path: Option<String>,
    port: Option<u16>,
}

fn parse_cli_args() -> Result<CliArgs, AppError> {
    let mut verbosity = 0u8;
    let mut config_path = None;
    let mut port = None;

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        if arg == "--" {
            break;
        }

        match arg.as_str() {
            "-h" | "--help" => {
                println!("Usage: tenant-sso-bot [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -h, --help                 Print help");
                println!("  -f, --config <PATH>        Path to configuration file (default: config/default.toml)");
                println!("  -p, --port <PORT>          Port to listen on (overrides config and env)");
                println!("  -v, -vv, -vvv, -vvvv       Increase logging verbosity");
                std::process::exit(0);
            }
            "-f" | "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config("-f/--config requires a path argument".into()))?;
                config_path = Some(path);
            }
            "-p" | "--port" => {
                let value = iter
                    .next()
                    .ok_or_else(|| AppError::Config("-p/--port requires a port argument".into()))?;
                let parsed = value
                    .parse::<u16>()
                    .map_err(|e| AppError::Config(format!("invalid port '{value}': {e}")))?;
                port = Some(parsed);
            }
            "--verbose" => verbosity = verbosity.saturating_add(1),
            a if a.starts_with('-') && a.len() > 1 && a.chars().skip(1).all(|c| c == 'v') => {
                verbosity = verbosity.saturating_add((a.len() - 1) as u8);
            }
            _ => {}
        }
    }

    //   -v → warn, -vv → info, -vvv → debug, -vvvv+ → trace
    let log_level = match verbosity {
        0 => None,
        1 => Some("warn"),
        2 => Some("info"),
        3 => Some("debug"),
        _ => Some("trace"),
    };

    Ok(CliArgs { log_level, config_path, port })
}
