//! Connection settings.

use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::error::BackendError;

/// Where and how to connect to Postgres.
///
/// `(database, host)` identifies the expected database snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: Option<String>,
    pub application_name: String,
    /// Maximum number of pooled connections.
    pub pool_size: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: String::from("localhost"),
            port: 5432,
            database: String::from("postgres"),
            username: String::from("postgres"),
            password: None,
            application_name: String::from(env!("CARGO_PKG_NAME")),
            pool_size: 5,
        }
    }
}

impl DatabaseSettings {
    /// Parses settings from JSON; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `json` is malformed.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Renders the `postgres://` URL for these settings.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let credentials = match &self.password {
            Some(password) => format!("{}:{password}", self.username),
            None => self.username.clone(),
        };
        format!(
            "postgres://{credentials}@{}:{}/{}?application_name={}",
            self.host, self.port, self.database, self.application_name
        )
    }

    /// Connection options equivalent to [`connection_url`](Self::connection_url).
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .application_name(&self.application_name);
        match &self.password {
            Some(password) => options.password(password),
            None => options,
        }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the first connection cannot be established.
    pub async fn connect(&self) -> Result<PgPool, BackendError> {
        info!(
            host = %self.host,
            database = %self.database,
            pool_size = self.pool_size,
            "connecting to postgres"
        );
        let pool = PgPoolOptions::new()
            .max_connections(self.pool_size)
            .connect_with(self.connect_options())
            .await?;
        Ok(pool)
    }
}
