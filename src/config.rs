use std::{env, path::PathBuf, time::Duration};

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded
/// and shared with handlers through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Controls log format and fail-fast secrets.
    pub env: Env,
    // Port bound on 0.0.0.0.
    pub port: u16,
    // Absolute base URL used when turning uploaded files into document links.
    pub public_base_url: String,
    // The single shared admin secret. There are no user accounts.
    pub admin_password: String,
    // Signs the admin session token.
    pub session_secret: String,
    pub session_ttl_hours: i64,
    // Which substrate holds the collection. Chosen once, here.
    pub backend: BackendConfig,
    // Where uploaded files go.
    pub uploads: UploadConfig,
}

/// Env
///
/// Local development versus production deployment.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

/// BackendConfig
///
/// Storage substrate selection (`STORAGE_BACKEND`).
#[derive(Clone, Debug, PartialEq)]
pub enum BackendConfig {
    Memory,
    File { path: PathBuf },
    Remote(RemoteConfig),
    Postgres { db_url: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    // None means a bin is created on first use.
    pub bin_id: Option<String>,
    // Remembers an auto-created bin id across restarts.
    pub bin_id_file: Option<PathBuf>,
    pub bin_name: String,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq)]
pub enum UploadConfig {
    Disk {
        dir: PathBuf,
    },
    S3 {
        endpoint: String,
        region: String,
        access_key: String,
        secret_key: String,
        bucket: String,
    },
}

pub const DEFAULT_REMOTE_BASE: &str = "https://api.jsonbin.io/v3/b";
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 6;
const LOCAL_ADMIN_PASSWORD: &str = "admin-local-password";
const LOCAL_SESSION_SECRET: &str = "local-session-secret-change-me-0123456789";

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests: memory backend, disk uploads.
    fn default() -> Self {
        Self {
            env: Env::Local,
            port: 3000,
            public_base_url: "http://localhost:3000".to_string(),
            admin_password: LOCAL_ADMIN_PASSWORD.to_string(),
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            session_ttl_hours: 12,
            backend: BackendConfig::Memory,
            uploads: UploadConfig::Disk {
                dir: PathBuf::from("uploads"),
            },
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every setting from the environment.
    ///
    /// # Panics
    /// Panics when a setting required by the selected environment or backend is
    /// missing, or when a value cannot be parsed. The service must not start
    /// half-configured.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").unwrap_or_default().as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let port = env::var("PORT")
            .ok()
            .map(|p| p.parse::<u16>().expect("FATAL: PORT must be a port number"))
            .unwrap_or(3000);

        let (admin_password, session_secret) = match env {
            Env::Production => (
                env::var("ADMIN_PASSWORD").expect("FATAL: ADMIN_PASSWORD must be set in production."),
                env::var("SECRET_KEY").expect("FATAL: SECRET_KEY must be set in production."),
            ),
            Env::Local => (
                env::var("ADMIN_PASSWORD").unwrap_or_else(|_| LOCAL_ADMIN_PASSWORD.to_string()),
                env::var("SECRET_KEY").unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string()),
            ),
        };

        let session_ttl_hours = env::var("SESSION_TTL_HOURS")
            .ok()
            .map(|h| h.parse::<i64>().expect("FATAL: SESSION_TTL_HOURS must be an integer"))
            .unwrap_or(12);

        let public_base_url = env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| format!("http://localhost:{port}"))
            .trim_end_matches('/')
            .to_string();

        Self {
            backend: load_backend(&env),
            uploads: load_uploads(),
            env,
            port,
            public_base_url,
            admin_password,
            session_secret,
            session_ttl_hours,
        }
    }
}

fn load_backend(app_env: &Env) -> BackendConfig {
    let kind = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "file".to_string());

    match kind.as_str() {
        "memory" => BackendConfig::Memory,
        "file" => BackendConfig::File {
            path: env::var("DATA_FILE")
                .unwrap_or_else(|_| "fallback_data.json".to_string())
                .into(),
        },
        "remote" => BackendConfig::Remote(RemoteConfig {
            base_url: env::var("JSONBIN_BASE").unwrap_or_else(|_| DEFAULT_REMOTE_BASE.to_string()),
            api_key: env::var("JSONBIN_API_KEY")
                .expect("FATAL: JSONBIN_API_KEY required for the remote backend"),
            bin_id: env::var("JSONBIN_BIN_ID").ok().filter(|id| !id.trim().is_empty()),
            bin_id_file: Some(
                env::var("JSONBIN_BIN_ID_FILE")
                    .unwrap_or_else(|_| "local_created_bin_id.txt".to_string())
                    .into(),
            ),
            bin_name: "docboard_documents".to_string(),
            timeout: Duration::from_secs(
                env::var("REMOTE_TIMEOUT_SECS")
                    .ok()
                    .map(|s| s.parse().expect("FATAL: REMOTE_TIMEOUT_SECS must be an integer"))
                    .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
            ),
        }),
        "postgres" => {
            let db_url = env::var("DATABASE_URL")
                .expect("FATAL: DATABASE_URL required for the postgres backend");
            let db_url = match app_env {
                Env::Production => ensure_postgres_ssl(&db_url),
                Env::Local => db_url,
            };
            BackendConfig::Postgres { db_url }
        }
        other => panic!("FATAL: unknown STORAGE_BACKEND '{other}' (memory|file|remote|postgres)"),
    }
}

fn load_uploads() -> UploadConfig {
    match env::var("UPLOAD_BACKEND").unwrap_or_else(|_| "disk".to_string()).as_str() {
        "s3" => UploadConfig::S3 {
            endpoint: env::var("S3_ENDPOINT").expect("FATAL: S3_ENDPOINT required for s3 uploads"),
            region: env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key: env::var("S3_ACCESS_KEY").expect("FATAL: S3_ACCESS_KEY required for s3 uploads"),
            secret_key: env::var("S3_SECRET_KEY").expect("FATAL: S3_SECRET_KEY required for s3 uploads"),
            bucket: env::var("S3_BUCKET_NAME").unwrap_or_else(|_| "docboard-uploads".to_string()),
        },
        _ => UploadConfig::Disk {
            dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()).into(),
        },
    }
}

/// Appends `sslmode=require` unless the URL already chooses an sslmode.
pub fn ensure_postgres_ssl(db_url: &str) -> String {
    if db_url.contains("sslmode=") {
        return db_url.to_string();
    }
    let separator = if db_url.contains('?') { '&' } else { '?' };
    format!("{db_url}{separator}sslmode=require")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssl_mode_is_appended_once() {
        assert_eq!(
            ensure_postgres_ssl("postgres://u:p@h/db"),
            "postgres://u:p@h/db?sslmode=require"
        );
        assert_eq!(
            ensure_postgres_ssl("postgres://u:p@h/db?channel_binding=require"),
            "postgres://u:p@h/db?channel_binding=require&sslmode=require"
        );
        assert_eq!(
            ensure_postgres_ssl("postgres://u:p@h/db?sslmode=disable"),
            "postgres://u:p@h/db?sslmode=disable"
        );
    }
}
