use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use stateless_session::{config::SECRET_ENV_VAR, ConfigToml, SessionManager};

mod logs;

#[derive(Parser, Debug)]
#[command(version, about = "Issue and inspect stateless session tokens")]
struct Cli {
    /// Path to the TOML config file. Without it, the signing secret must be
    /// set through STATELESS_SESSION_JWT_SECRET.
    #[clap(short, long)]
    config: Option<PathBuf>,
    /// [tracing_subscriber::EnvFilter]
    #[clap(short, long)]
    tracing_env_filter: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new anonymous session and print its token.
    New {
        /// Session data as a JSON object.
        #[clap(long)]
        data: Option<String>,
    },
    /// Verify a token and print the session it carries.
    Inspect {
        /// The session token.
        token: String,
    },
    /// Verify a token, stamp it as saved, and print the new token.
    Refresh {
        /// The session token.
        token: String,
    },
    /// Print the default config file.
    DefaultConfig,
}

/// Load the config, initialize logging, and build the manager.
fn session_manager(args: &Cli) -> Result<SessionManager> {
    let config = match &args.config {
        Some(path) => ConfigToml::from_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ConfigToml::default(),
    };

    logs::init_tracing_logs(args.tracing_env_filter.as_deref(), config.logging.as_ref())?;

    let session_config = config.session_config().with_context(|| match &args.config {
        Some(path) => format!("Invalid session settings in {}", path.display()),
        None => format!("Pass --config or set {SECRET_ENV_VAR}"),
    })?;
    let manager = SessionManager::new(session_config)?;
    tracing::debug!(algorithm = %manager.config().algorithm(), "Session manager ready");

    Ok(manager)
}

fn new_session(manager: &SessionManager, data: Option<&str>) -> Result<String> {
    let session_data = data
        .map(|data| serde_json::from_str::<Map<String, Value>>(data))
        .transpose()
        .context("--data must be a JSON object")?;

    let session = manager.create(session_data);
    Ok(manager.to_token(&session)?)
}

fn inspect_session(manager: &SessionManager, token: &str) -> Result<String> {
    let session = manager.from_token(token)?;
    let ttl_ms = manager
        .ttl(&session)
        .map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX));

    let output = json!({
        "session": session,
        "expiresAt": manager.expiry(&session),
        "ttlMs": ttl_ms,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

fn refresh_session(manager: &SessionManager, token: &str) -> Result<String> {
    let mut session = manager.from_token(token)?;
    manager.save(&mut session);
    Ok(manager.to_token(&session)?)
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let output = match &args.command {
        Command::DefaultConfig => ConfigToml::default_string().to_string(),
        Command::New { data } => new_session(&session_manager(&args)?, data.as_deref())?,
        Command::Inspect { token } => inspect_session(&session_manager(&args)?, token)?,
        Command::Refresh { token } => refresh_session(&session_manager(&args)?, token)?,
    };
    println!("{}", output.trim_end());

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::CommandFactory;
    use stateless_session::{SessionConfig, SigningAlgorithm};

    use super::*;

    fn manager() -> SessionManager {
        let config = SessionConfig::new(SigningAlgorithm::HS256, Some("cli secret".into()))
            .with_time_to_live(Duration::from_secs(3600));
        SessionManager::new(config).unwrap()
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_inspect() {
        let cli = Cli::parse_from(["stateless-session", "-c", "config.toml", "inspect", "abc"]);

        assert_eq!(cli.config, Some(PathBuf::from("config.toml")));
        assert!(matches!(cli.command, Command::Inspect { token } if token == "abc"));
    }

    #[test]
    fn new_inspect_refresh() {
        let manager = manager();

        let token = new_session(&manager, Some(r#"{"a":1}"#)).unwrap();

        let inspected: Value =
            serde_json::from_str(&inspect_session(&manager, &token).unwrap()).unwrap();
        assert_eq!(inspected["session"]["sessionData"], json!({ "a": 1 }));
        assert!(inspected["session"].get("subjectId").is_none());
        assert!(inspected["expiresAt"].is_u64());
        assert!(inspected["ttlMs"].as_u64().unwrap() <= 3_600_000);

        let refreshed = refresh_session(&manager, &token).unwrap();
        let session = manager.from_token(&refreshed).unwrap();
        assert_eq!(session.session_data().get("a"), Some(&json!(1)));
        assert!(session.last_modified_at() >= session.created_at());
    }

    #[test]
    fn new_rejects_non_object_data() {
        let result = new_session(&manager(), Some("[1, 2]"));

        assert!(result.is_err());
    }

    #[test]
    fn inspect_rejects_foreign_token() {
        let result = inspect_session(&manager(), "not.a.token");

        assert!(result.is_err());
    }

    #[test]
    fn missing_secret_without_config() {
        let args = Cli::parse_from(["stateless-session", "new"]);

        let result = temp_env::with_vars_unset([SECRET_ENV_VAR, "RUST_LOG"], || {
            session_manager(&args)
        });
        let error = format!("{:#}", result.unwrap_err());

        assert!(error.contains(SECRET_ENV_VAR), "{error}");
    }

    #[test]
    fn secret_from_env_without_config() {
        let args = Cli::parse_from(["stateless-session", "new"]);

        let manager = temp_env::with_vars(
            [(SECRET_ENV_VAR, Some("env secret")), ("RUST_LOG", None)],
            || session_manager(&args),
        )
        .unwrap();

        assert_eq!(manager.config().algorithm(), SigningAlgorithm::HS512);
    }
}
