//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

pub use cli::{CliArgs, Command, DatabaseOverride, MigrateArgs, ServeArgs, ServeOverrides};

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroU64},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use axum::http::HeaderName;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::completion::TemplateRedirect;
use crate::domain::types::{FieldType, UnknownFieldType};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "surveyor";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_UPLOAD_DIR: &str = "uploads";
const DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_USER_HEADER: &str = "x-remote-user";
const DEFAULT_COMPLETE_REDIRECT: &str = "/surveys/{survey_id}/complete";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub uploads: UploadSettings,
    pub auth: AuthSettings,
    pub flow: FlowSettings,
    pub design: DesignSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub directory: PathBuf,
    pub max_request_bytes: NonZeroU64,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    /// Request header set by the fronting proxy with the authenticated user name.
    pub user_header: HeaderName,
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    /// Contains `{survey_id}` when the target depends on the survey.
    pub complete_redirect: String,
}

impl FlowSettings {
    pub fn redirect(&self) -> TemplateRedirect {
        TemplateRedirect::new(self.complete_redirect.clone())
    }
}

#[derive(Debug, Clone)]
pub struct DesignSettings {
    pub field_types: Vec<FieldType>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("SURVEYOR")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("design.field_types")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Migrate(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    uploads: RawUploadSettings,
    auth: RawAuthSettings,
    flow: RawFlowSettings,
    design: RawDesignSettings,
}

/// Replace `slot` when the override carries a value.
fn overlay<T: Clone>(slot: &mut Option<T>, value: &Option<T>) {
    if value.is_some() {
        slot.clone_from(value);
    }
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        overlay(&mut self.server.host, &overrides.server_host);
        overlay(&mut self.server.port, &overrides.server_port);
        overlay(
            &mut self.server.graceful_shutdown_seconds,
            &overrides.server_graceful_shutdown_seconds,
        );
        overlay(&mut self.logging.level, &overrides.log_level);
        overlay(&mut self.logging.json, &overrides.log_json);
        overlay(
            &mut self.database.max_connections,
            &overrides.database_max_connections,
        );
        overlay(&mut self.uploads.directory, &overrides.uploads_directory);
        overlay(
            &mut self.uploads.max_request_bytes,
            &overrides.uploads_max_request_bytes,
        );
        overlay(&mut self.auth.user_header, &overrides.auth_user_header);
        overlay(
            &mut self.flow.complete_redirect,
            &overrides.flow_complete_redirect,
        );
        self.apply_database_override(&overrides.database);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        overlay(&mut self.database.url, &overrides.database_url);
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        Ok(Self {
            server: raw.server.resolve()?,
            logging: raw.logging.resolve()?,
            database: raw.database.resolve()?,
            uploads: raw.uploads.resolve()?,
            auth: raw.auth.resolve()?,
            flow: raw.flow.resolve()?,
            design: raw.design.resolve()?,
        })
    }
}

fn ensure(condition: bool, key: &'static str, reason: &str) -> Result<(), LoadError> {
    if condition {
        Ok(())
    } else {
        Err(LoadError::invalid(key, reason))
    }
}

impl RawServerSettings {
    fn resolve(self) -> Result<ServerSettings, LoadError> {
        let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = self.port.unwrap_or(DEFAULT_PORT);
        ensure(port != 0, "server.port", "port must be greater than zero")?;
        let addr = format!("{host}:{port}")
            .parse::<SocketAddr>()
            .map_err(|err| LoadError::invalid("server.addr", format!("`{host}:{port}`: {err}")))?;

        let grace = self
            .graceful_shutdown_seconds
            .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
        ensure(
            grace > 0,
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        )?;

        Ok(ServerSettings {
            addr,
            graceful_shutdown: Duration::from_secs(grace),
        })
    }
}

impl RawLoggingSettings {
    fn resolve(self) -> Result<LoggingSettings, LoadError> {
        let level = self
            .level
            .as_deref()
            .map(LevelFilter::from_str)
            .transpose()
            .map_err(|err| LoadError::invalid("logging.level", err.to_string()))?
            .unwrap_or(LevelFilter::INFO);
        let format = match self.json {
            Some(true) => LogFormat::Json,
            _ => LogFormat::Compact,
        };
        Ok(LoggingSettings { level, format })
    }
}

impl RawDatabaseSettings {
    fn resolve(self) -> Result<DatabaseSettings, LoadError> {
        let url = self
            .url
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
        let max_connections = NonZeroU32::new(
            self.max_connections.unwrap_or(DEFAULT_DB_MAX_CONNECTIONS),
        )
        .ok_or_else(|| LoadError::invalid("database.max_connections", "must be greater than zero"))?;
        Ok(DatabaseSettings {
            url,
            max_connections,
        })
    }
}

impl RawUploadSettings {
    fn resolve(self) -> Result<UploadSettings, LoadError> {
        let directory = self
            .directory
            .unwrap_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR));
        ensure(
            !directory.as_os_str().is_empty(),
            "uploads.directory",
            "path must not be empty",
        )?;

        let limit = self
            .max_request_bytes
            .unwrap_or(DEFAULT_UPLOAD_REQUEST_LIMIT_BYTES);
        ensure(
            usize::try_from(limit).is_ok(),
            "uploads.max_request_bytes",
            "value exceeds supported range for usize",
        )?;
        let max_request_bytes = NonZeroU64::new(limit).ok_or_else(|| {
            LoadError::invalid("uploads.max_request_bytes", "must be greater than zero")
        })?;

        Ok(UploadSettings {
            directory,
            max_request_bytes,
        })
    }
}

impl RawAuthSettings {
    fn resolve(self) -> Result<AuthSettings, LoadError> {
        let raw = self
            .user_header
            .unwrap_or_else(|| DEFAULT_USER_HEADER.to_string());
        let user_header = HeaderName::from_str(raw.trim())
            .map_err(|err| LoadError::invalid("auth.user_header", err.to_string()))?;
        Ok(AuthSettings { user_header })
    }
}

impl RawFlowSettings {
    fn resolve(self) -> Result<FlowSettings, LoadError> {
        let complete_redirect = self
            .complete_redirect
            .map(|template| template.trim().to_string())
            .unwrap_or_else(|| DEFAULT_COMPLETE_REDIRECT.to_string());
        ensure(
            ["/", "http://", "https://"]
                .iter()
                .any(|prefix| complete_redirect.starts_with(prefix)),
            "flow.complete_redirect",
            "must be an absolute path or an http(s) URL",
        )?;
        Ok(FlowSettings { complete_redirect })
    }
}

impl RawDesignSettings {
    fn resolve(self) -> Result<DesignSettings, LoadError> {
        let Some(names) = self.field_types else {
            return Ok(DesignSettings {
                field_types: FieldType::ALL.to_vec(),
            });
        };

        let mut field_types: Vec<FieldType> = Vec::with_capacity(names.len());
        for name in &names {
            let field_type = name
                .parse()
                .map_err(|err: UnknownFieldType| {
                    LoadError::invalid("design.field_types", err.to_string())
                })?;
            if !field_types.contains(&field_type) {
                field_types.push(field_type);
            }
        }
        ensure(
            !field_types.is_empty(),
            "design.field_types",
            "at least one field type must be enabled",
        )?;

        Ok(DesignSettings { field_types })
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUploadSettings {
    directory: Option<PathBuf>,
    max_request_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    user_header: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFlowSettings {
    complete_redirect: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDesignSettings {
    field_types: Option<Vec<String>>,
}
