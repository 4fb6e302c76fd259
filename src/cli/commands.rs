//! CLI command implementations
//!
//! `init` and `token` are one-shot and print a single JSON line. `serve`
//! boots the database and blocks in the HTTP server until Ctrl-C.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::auth::{JwtConfig, JwtManager, Principal};
use crate::catalog::Catalog;
use crate::http_server::{HttpServer, HttpServerConfig};
use crate::observability::{init_tracing, log_event, log_event_with_fields, Event};
use crate::store::Database;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::write_response;

/// Configuration file structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file (optional, default "./retailpos.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP listener and CORS settings
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Bearer token settings
    #[serde(default)]
    pub jwt: JwtConfig,

    /// Default log filter; `RUST_LOG` takes precedence
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./retailpos.db")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            http: HttpServerConfig::default(),
            jwt: JwtConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| CliError::config_error(format!("Failed to read config {:?}: {}", path, e)))?;

        Self::from_json(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_json(content: &str) -> CliResult<Self> {
        let config: AppConfig = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(CliError::config_error("database_path must not be empty"));
        }

        self.http.validate().map_err(CliError::config_error)?;

        if self.jwt.secret.is_empty() {
            return Err(CliError::config_error("jwt.secret must not be empty"));
        }

        if self.jwt.ttl_minutes <= 0 {
            return Err(CliError::config_error("jwt.ttl_minutes must be > 0"));
        }

        Ok(())
    }
}

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Serve { config, port } => serve(&config, port),
        Command::Token {
            config,
            user,
            roles,
            permissions,
            shops,
        } => token(&config, &user, &roles, &permissions, &shops),
    }
}

/// Open the database and create every catalog table
fn open_database(config: &AppConfig) -> CliResult<Database> {
    let db = Database::open(&config.database_path)?;
    log_event_with_fields(
        Event::DatabaseOpened,
        &[("database_path", &config.database_path.display().to_string())],
    );
    Catalog::new().migrate(&db)?;
    Ok(db)
}

/// Create the database file and its tables
///
/// Safe to run repeatedly; existing tables and rows are left untouched.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    init_tracing(&config.log_filter);

    open_database(&config)?;

    write_response(json!({
        "initialized": true,
        "database_path": config.database_path.display().to_string(),
    }))
}

/// Boot and serve the REST API
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    init_tracing(&config.log_filter);
    log_event(Event::BootStart);
    log_event(Event::ConfigLoaded);

    if let Some(port) = port {
        config.http.port = port;
    }

    let server = match build_server(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(event = Event::BootFailed.as_str(), error = %e);
            return Err(e);
        }
    };
    log_event(Event::BootComplete);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    log_event(Event::ShutdownComplete);
    Ok(())
}

fn build_server(config: &AppConfig) -> CliResult<HttpServer> {
    let db = Arc::new(open_database(config)?);
    let jwt = JwtManager::new(config.jwt.clone());
    let registry = Catalog::new().registry(db, jwt)?;

    Ok(HttpServer::new(config.http.clone(), registry.router()))
}

/// Mint a bearer token for the given identity
pub fn token(
    config_path: &Path,
    user: &str,
    roles: &[String],
    permissions: &[String],
    shops: &[String],
) -> CliResult<()> {
    let config = AppConfig::load(config_path)?;
    init_tracing(&config.log_filter);

    let principal = build_principal(user, roles, permissions, shops);
    let token = JwtManager::new(config.jwt.clone()).issue(&principal)?;
    info!(event = Event::TokenIssued.as_str(), user, "token issued");

    write_response(json!({
        "token": token,
        "expires_in_minutes": config.jwt.ttl_minutes,
    }))
}

fn build_principal(user: &str, roles: &[String], permissions: &[String], shops: &[String]) -> Principal {
    let principal = Principal::authenticated(user);
    let principal = roles.iter().fold(principal, |p, role| p.with_role(role.as_str()));
    let principal = permissions
        .iter()
        .fold(principal, |p, permission| p.with_permission(permission.as_str()));
    shops.iter().fold(principal, |p, shop| p.with_shop(shop.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, TempDir};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_json("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.database_path, PathBuf::from("./retailpos.db"));
        assert_eq!(config.http.port, 8080);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        for doc in [
            r#"{"http": {"port": 0}}"#,
            r#"{"http": {"allowed_origins": [""]}}"#,
            r#"{"jwt": {"secret": ""}}"#,
            r#"{"jwt": {"ttl_minutes": 0}}"#,
            r#"{"database_path": ""}"#,
            r#"{"http": "#,
        ] {
            let result = AppConfig::from_json(doc);
            assert!(matches!(result, Err(CliError::Config(_))), "{}", doc);
        }
    }

    #[test]
    fn test_missing_config_file() {
        let result = AppConfig::load(Path::new("/nonexistent/retailpos.json"));
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn test_init_creates_tables() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("pos.db");
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", json!({"database_path": db_path})).unwrap();

        init(file.path()).unwrap();
        init(file.path()).unwrap();

        let db = Database::open(&db_path).unwrap();
        let conn = db.lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM \"tag\"", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_build_principal_from_flags() {
        let principal = build_principal(
            "u-1",
            &["admin".to_string()],
            &["view_tag".to_string()],
            &["ABC".to_string()],
        );
        assert!(principal.has_role("admin"));
        assert!(principal.has_permission("view_tag"));
        assert!(principal.has_shop_access("abc"));
    }
}
