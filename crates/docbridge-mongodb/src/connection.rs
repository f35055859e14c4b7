//! Per-operation connection handling
//!
//! A [`Client`] only holds connection parameters. Every operation dials a fresh
//! driver client, runs, and lets it go; no connection is kept between calls.

use crate::config::{ClientConfig, DEFAULT_TIMEOUT};
use crate::validation::CollectionName;
use bson::doc;
use docbridge_common::{Error, ErrorKind, Result};
use mongodb::{options::ClientOptions, Collection, Database};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Handle used by every docbridge operation
///
/// Cloning is cheap; clones share the same configuration.
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // The connection string may carry credentials.
        f.debug_struct("Client")
            .field("database", &self.config.database)
            .field("timeout", &self.config.timeout)
            .finish()
    }
}

impl Client {
    /// Create a client for `database` on the server at `uri`.
    ///
    /// # Arguments
    ///
    /// * `uri` - connection string, e.g. `mongodb://host:port`
    /// * `database` - the client works against a single database
    /// * `timeout` - deadline for each round trip; `None` or zero means 10 seconds
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
        timeout: impl Into<Option<Duration>>,
    ) -> Self {
        let timeout = timeout
            .into()
            .filter(|t| !t.is_zero())
            .unwrap_or(DEFAULT_TIMEOUT);
        Self {
            config: Arc::new(ClientConfig::new(uri, database).with_timeout(timeout)),
        }
    }

    /// Create a client from an explicit configuration
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn uri(&self) -> &str {
        &self.config.uri
    }

    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Dial a new driver client.
    ///
    /// The per-operation timeout doubles as connect and server selection timeout.
    pub async fn connect(&self) -> Result<mongodb::Client> {
        let mut options = self
            .bounded(ErrorKind::Connection, ClientOptions::parse(self.uri()))
            .await?;

        options.connect_timeout = Some(self.timeout());
        options.server_selection_timeout = Some(self.timeout());
        if let Some(app_name) = &self.config.app_name {
            options.app_name = Some(app_name.clone());
        }

        mongodb::Client::with_options(options).map_err(|e| Error::driver(ErrorKind::Connection, e))
    }

    /// Check that the server answers a `ping` within the timeout
    #[instrument(skip_all, fields(database = %self.database_name()))]
    pub async fn ping(&self) -> bool {
        let client = match self.connect().await {
            Ok(client) => client,
            Err(err) => {
                warn!(error = %err, "Ping could not connect");
                return false;
            }
        };

        let reply = self
            .bounded(
                ErrorKind::Connection,
                client.database("admin").run_command(doc! { "ping": 1 }),
            )
            .await;
        client.shutdown().await;

        match reply {
            Ok(_) => {
                debug!("Ping succeeded");
                true
            }
            Err(err) => {
                warn!(error = %err, "Ping failed");
                false
            }
        }
    }

    pub(crate) async fn database(&self) -> Result<Database> {
        let client = self.connect().await?;
        Ok(client.database(self.database_name()))
    }

    pub(crate) async fn collection<T>(&self, name: &str) -> Result<Collection<T>>
    where
        T: Send + Sync,
    {
        let name = CollectionName::new(name)?;
        let database = self.database().await?;
        Ok(database.collection(name.as_str()))
    }

    /// Run one driver round trip under the per-operation deadline
    pub(crate) async fn bounded<F, T>(&self, kind: ErrorKind, op: F) -> Result<T>
    where
        F: IntoFuture<Output = mongodb::error::Result<T>>,
    {
        let timeout = self.timeout();
        match tokio::time::timeout(timeout, op).await {
            Ok(result) => result.map_err(|e| Error::driver(kind, e)),
            Err(_) => Err(Error::timeout(kind, timeout)),
        }
    }
}
