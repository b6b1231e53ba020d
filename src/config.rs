use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub media: MediaConfig,
    pub engagement: EngagementConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    /// Anything but an explicit `development` is treated as production.
    pub fn from_app_env(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("development") => Environment::Development,
            _ => Environment::Production,
        }
    }

    pub fn is_development(self) -> bool {
        self == Environment::Development
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub busy_timeout_secs: u64,
    /// Node component of generated ids, must be below 1024
    pub node_id: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_body_bytes: usize,
    pub cors_origin: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub session_ttl_days: i64,
    pub secure_cookies: bool,
    pub password_hash_memory_kib: u32,
    pub password_hash_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub dir: PathBuf,
    /// Path the media directory is mounted at
    pub route: String,
    /// Prefix of URLs handed back to clients
    pub public_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementConfig {
    /// Emit a like notification when users like their own posts
    pub notify_self_likes: bool,
}

const DEVELOPMENT_JWT_SECRET: &str = "development-only-secret";

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            database: DatabaseConfig {
                url: "sqlite:data/social.db".to_string(),
                max_connections: 10,
                busy_timeout_secs: 5,
                node_id: 0,
            },
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
                max_body_bytes: 10 * 1024 * 1024,
                cors_origin: None,
            },
            auth: AuthConfig {
                jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
                session_ttl_days: 7,
                secure_cookies: false,
                password_hash_memory_kib: 19 * 1024,
                password_hash_iterations: 2,
            },
            media: MediaConfig {
                dir: PathBuf::from("data/uploads"),
                route: "/uploads".to_string(),
                public_url: "/uploads".to_string(),
            },
            engagement: EngagementConfig {
                notify_self_likes: false,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Only an explicit
    /// `APP_ENV=development` relaxes cookie security and the secret requirement.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let parsed = |key: &str| var(key).map(|raw| (key.to_string(), raw));

        let environment = Environment::from_app_env(var("APP_ENV").as_deref());

        let jwt_secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if environment.is_development() => defaults.auth.jwt_secret.clone(),
            None => anyhow::bail!("JWT_SECRET must be set unless APP_ENV=development"),
        };

        let media_route = var("MEDIA_ROUTE").unwrap_or(defaults.media.route);

        Ok(Self {
            environment,
            database: DatabaseConfig {
                url: var("DATABASE_URL").unwrap_or(defaults.database.url),
                max_connections: parse_or(parsed("DATABASE_MAX_CONNECTIONS"), defaults.database.max_connections),
                busy_timeout_secs: parse_or(parsed("DATABASE_BUSY_TIMEOUT_SECS"), defaults.database.busy_timeout_secs),
                node_id: parse_or(parsed("NODE_ID"), defaults.database.node_id),
            },
            server: ServerConfig {
                host: var("SERVER_HOST").unwrap_or(defaults.server.host),
                port: parse_or(parsed("SERVER_PORT"), defaults.server.port),
                max_body_bytes: parse_or(parsed("MAX_BODY_BYTES"), defaults.server.max_body_bytes),
                cors_origin: var("CORS_ORIGIN"),
            },
            auth: AuthConfig {
                jwt_secret,
                session_ttl_days: parse_or(parsed("SESSION_TTL_DAYS"), defaults.auth.session_ttl_days),
                secure_cookies: !environment.is_development(),
                password_hash_memory_kib: parse_or(
                    parsed("PASSWORD_HASH_MEMORY_KIB"),
                    defaults.auth.password_hash_memory_kib,
                ),
                password_hash_iterations: parse_or(
                    parsed("PASSWORD_HASH_ITERATIONS"),
                    defaults.auth.password_hash_iterations,
                ),
            },
            media: MediaConfig {
                dir: var("MEDIA_DIR").map(PathBuf::from).unwrap_or(defaults.media.dir),
                public_url: var("MEDIA_PUBLIC_URL").unwrap_or_else(|| media_route.clone()),
                route: media_route,
            },
            engagement: EngagementConfig {
                notify_self_likes: parse_or(parsed("NOTIFY_SELF_LIKES"), defaults.engagement.notify_self_likes),
            },
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parses a `(key, raw)` pair, warning and falling back on garbage.
fn parse_or<T: std::str::FromStr>(entry: Option<(String, String)>, default: T) -> T {
    match entry {
        Some((key, raw)) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring unparseable value for {}: {:?}", key, raw);
            default
        }),
        None => default,
    }
}
