use crate::services::{
    cloudinary::{CloudinaryCredentials, DEFAULT_API_BASE},
    identity_gate::{AllowList, IdentityProviderConfig},
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, fmt::Debug, str::FromStr};

pub const CLOUD_NAME_VAR: &str = "CLOUDINARY_CLOUD_NAME";
pub const API_KEY_VAR: &str = "CLOUDINARY_API_KEY";
pub const API_SECRET_VAR: &str = "CLOUDINARY_API_SECRET";

const DEFAULT_FOLDER: &str = "tet-photo-journal";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Request body limit, sized for one compressed photo.
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub allowed_emails: AllowList,
    pub identity: IdentityProviderConfig,
}

/// Media host account settings. Credentials stay optional here: a missing
/// value turns every photo operation into a configuration error instead of
/// stopping the server.
#[derive(Clone)]
pub struct StorageConfig {
    pub cloud_name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub folder: String,
    pub api_base: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Private photo journal API")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_JOURNAL_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_JOURNAL_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root storage folder on the media host (overrides CLOUDINARY_FOLDER)
    #[arg(long)]
    pub folder: Option<String>,

    /// Maximum accepted request body in bytes (overrides PHOTO_JOURNAL_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::from_sources(Args::parse(), |key| env::var(key).ok())
    }

    /// Merge CLI args over values found through `lookup`.
    pub fn from_sources(args: Args, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let setting = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // --- Environment fallback ---
        let env_host = setting("PHOTO_JOURNAL_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_setting(&setting, "PHOTO_JOURNAL_PORT", 3000)?;
        let env_max_upload = parse_setting(
            &setting,
            "PHOTO_JOURNAL_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;
        let env_folder = setting("CLOUDINARY_FOLDER").unwrap_or_else(|| DEFAULT_FOLDER.into());

        let storage = StorageConfig {
            cloud_name: setting(CLOUD_NAME_VAR),
            api_key: setting(API_KEY_VAR),
            api_secret: setting(API_SECRET_VAR),
            folder: args.folder.unwrap_or(env_folder),
            api_base: setting("CLOUDINARY_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.into()),
        };

        let identity = IdentityProviderConfig {
            api_key: setting("FIREBASE_API_KEY").unwrap_or_default(),
            auth_domain: setting("FIREBASE_AUTH_DOMAIN").unwrap_or_default(),
            project_id: setting("FIREBASE_PROJECT_ID").unwrap_or_default(),
            app_id: setting("FIREBASE_APP_ID").unwrap_or_default(),
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            storage,
            allowed_emails: AllowList::from_csv(&setting("ALLOWED_EMAILS").unwrap_or_default()),
            identity,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_setting<T>(setting: impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match setting(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

impl StorageConfig {
    /// Names of the required credentials that are not set, in a fixed order.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (CLOUD_NAME_VAR, &self.cloud_name),
            (API_KEY_VAR, &self.api_key),
            (API_SECRET_VAR, &self.api_secret),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }

    pub fn credentials(&self) -> Option<CloudinaryCredentials> {
        Some(CloudinaryCredentials {
            cloud_name: self.cloud_name.clone()?,
            api_key: self.api_key.clone()?,
            api_secret: self.api_secret.clone()?,
        })
    }
}

impl Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &self.api_key.as_ref().map(|_| "<set>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<set>"))
            .field("folder", &self.folder)
            .field("api_base", &self.api_base)
            .finish()
    }
}
