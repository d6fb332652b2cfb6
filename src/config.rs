//! Connection configuration for the Postgres-backed stores.

use std::env;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use crate::error::{Result, StoreError};

const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 5432;
const MAX_CONNECTIONS: u32 = 5;

/// Connection parameters for the Postgres database backing a knowledge base.
///
/// Build one with [`PostgresConfig::builder`]; fields left unset fall back
/// to the `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DB`,
/// `POSTGRES_HOST`, and `POSTGRES_PORT` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PostgresConfig {
    /// Database user.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
    /// Server host. Defaults to `localhost`.
    pub host: String,
    /// Server port. Defaults to `5432`.
    pub port: u16,
}

impl PostgresConfig {
    /// Create a new builder for constructing a [`PostgresConfig`].
    pub fn builder() -> PostgresConfigBuilder {
        PostgresConfigBuilder::default()
    }

    /// Resolve the configuration entirely from `POSTGRES_*` environment
    /// variables.
    pub fn from_env() -> Result<Self> {
        Self::builder().build()
    }

    /// Open a bounded connection pool for this configuration.
    pub async fn connect(&self) -> Result<PgPool> {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .password(&self.password)
            .database(&self.database);
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;
        Ok(pool)
    }
}

/// Builder for constructing a validated [`PostgresConfig`].
#[derive(Debug, Clone, Default)]
pub struct PostgresConfigBuilder {
    username: Option<String>,
    password: Option<String>,
    database: Option<String>,
    host: Option<String>,
    port: Option<u16>,
}

impl PostgresConfigBuilder {
    /// Set the database user.
    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Set the database password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the server host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the server port.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Build the configuration, filling unset fields from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if username, password, or database are
    /// missing from both the builder and the environment, or if
    /// `POSTGRES_PORT` is not a valid port number.
    pub fn build(self) -> Result<PostgresConfig> {
        self.build_with(|name| env::var(name).ok())
    }

    fn build_with(self, lookup: impl Fn(&str) -> Option<String>) -> Result<PostgresConfig> {
        let nonempty = |s: String| if s.is_empty() { None } else { Some(s) };
        let username = self.username.or_else(|| lookup("POSTGRES_USER")).and_then(nonempty);
        let password = self.password.or_else(|| lookup("POSTGRES_PASSWORD")).and_then(nonempty);
        let database = self.database.or_else(|| lookup("POSTGRES_DB")).and_then(nonempty);
        let (Some(username), Some(password), Some(database)) = (username, password, database)
        else {
            return Err(StoreError::Config(
                "Postgres connection requires username, password, and database; provide them \
                 explicitly or set POSTGRES_USER/POSTGRES_PASSWORD/POSTGRES_DB"
                    .to_string(),
            ));
        };
        let host = self
            .host
            .or_else(|| lookup("POSTGRES_HOST"))
            .and_then(nonempty)
            .unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match self.port {
            Some(port) => port,
            None => match lookup("POSTGRES_PORT").and_then(nonempty) {
                Some(raw) => raw
                    .parse()
                    .map_err(|_| StoreError::Config(format!("invalid POSTGRES_PORT value: {raw:?}")))?,
                None => DEFAULT_PORT,
            },
        };
        Ok(PostgresConfig { username, password, database, host, port })
    }
}
