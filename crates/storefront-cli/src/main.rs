//! Storefront CLI - drive the storefront session from a terminal.
//!
//! Logs in, restores and ends sessions against the backend selected by
//! `STOREFRONT_API_URL`, and sends authenticated requests through the same
//! refresh-aware pipeline the storefront uses.

mod commands;

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::Value;
use storefront_core::models::RegisterRequest;
use storefront_core::{
    Config, CredentialStore, FileCredentialStore, KeyringCredentialStore,
    SessionController, SessionEvent, SessionStatus,
};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use commands::{Action, Globals};

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines on drop.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let (writer, guard) = tracing_appender::non_blocking(io::stderr());

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

fn build_controller(globals: &Globals) -> Result<SessionController> {
    let mut config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        Config::from_env()
    });
    if let Some(ref url) = globals.api_url {
        config.api_base_url = url.clone();
    }

    let store: Arc<dyn CredentialStore> = if globals.keyring {
        Arc::new(KeyringCredentialStore::new()?)
    } else {
        Arc::new(FileCredentialStore::new(config.cache_dir()?))
    };
    Ok(SessionController::new(config, store)?)
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_password(label: &str) -> Result<String> {
    rpassword::prompt_password(label).context("Failed to read password")
}

async fn run(controller: &SessionController, action: Action) -> Result<()> {
    match action {
        Action::Login { email } => {
            let email = match email {
                Some(email) => email,
                None => prompt("Email: ")?,
            };
            let password = prompt_password("Password: ")?;
            let outcome = controller
                .login(&email, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Logged in as {}", outcome.user.display_name());
            println!("Landing page: {}", outcome.landing.path(controller.config()));
        }
        Action::Logout => {
            let target = controller.logout().await;
            println!("Logged out. Next: {}", target.path(controller.config()));
        }
        Action::Whoami => {
            controller.restore().await;
            let snapshot = controller.api().session().snapshot().await;
            match (snapshot.status, snapshot.user) {
                (SessionStatus::Authenticated, Some(user)) => {
                    println!("{} <{}>", user.display_name(), user.email);
                    if let Some(role) = user.role {
                        println!("role: {}", role);
                    }
                }
                _ => println!("Not logged in"),
            }
        }
        Action::Register {
            email,
            first_name,
            last_name,
        } => {
            let password = prompt_password("Choose a password: ")?;
            let registration = RegisterRequest {
                email,
                password,
                first_name,
                last_name,
                ..Default::default()
            };
            let response = controller
                .register(&registration)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("Account created for {}. Log in to continue.", response.user.email);
        }
        Action::ForgotPassword { email } => {
            let message = controller
                .forgot_password(&email)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", message);
        }
        Action::ResetPassword { token } => {
            let password = prompt_password("New password: ")?;
            let confirm = prompt_password("Confirm password: ")?;
            if password != confirm {
                anyhow::bail!("Passwords do not match");
            }
            let message = controller
                .reset_password(&token, &password)
                .await
                .map_err(|e| anyhow::anyhow!(e.user_message()))?;
            println!("{}", message);
        }
        Action::Get { path } => {
            let mut events = controller.subscribe();
            controller.restore().await;
            match controller.api().get_json::<Value>(&path).await {
                Ok(body) => println!("{}", serde_json::to_string_pretty(&body)?),
                Err(e) => {
                    if let Ok(SessionEvent::Expired { redirect_to }) = events.try_recv() {
                        eprintln!("Session expired, log in again ({})", redirect_to);
                    } else if e.is_unauthorized() {
                        eprintln!("Request rejected with a refreshed token, try `storefront login`");
                    }
                    return Err(anyhow::anyhow!(e.user_message()));
                }
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _guard = init_tracing();

    let matches = commands::new().get_matches();
    let (globals, action) = commands::handler(&matches)?;

    let controller = build_controller(&globals)?;
    info!(api = %controller.config().api_base_url, "Storefront CLI starting");

    run(&controller, action).await
}
