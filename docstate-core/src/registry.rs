//! Connection configuration and the named connection registry.
//!
//! Connections are declared once in a [`DatabaseConfig`] (typically loaded from JSON) and
//! handed to a [`ConnectionRegistry`] owned by the application. Lookups are read-mostly and
//! go through an async read-write lock; the registry can still be amended at runtime.
//!
//! ```ignore
//! let config = DatabaseConfig::from_json(r#"{
//!     "connections": [
//!         { "name": "catalog", "uri": "mongodb://localhost:27017/catalog" }
//!     ]
//! }"#)?;
//!
//! let registry = ConnectionRegistry::from_config(config);
//! let settings = registry.resolve("catalog").await?;
//! ```

use mea::rwlock::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::error::{DataError, DataResult};

/// URI schemes a connection may use.
pub const SUPPORTED_SCHEMES: [&str; 3] = ["mongodb://", "mongodb+srv://", "memory://"];

/// One named connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    pub name: String,
    pub uri: String,
    /// Database name. Falls back to the path component of `uri` when absent.
    #[serde(default)]
    pub database: Option<String>,
}

impl ConnectionSettings {
    pub fn new(name: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            database: None,
        }
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_SCHEMES
            .iter()
            .any(|scheme| self.uri.starts_with(scheme))
    }

    /// The database to use: the explicit name, or the path of the URI
    /// (`mongodb://host:27017/catalog?w=1` gives `catalog`).
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when neither names a database.
    pub fn database_name(&self) -> DataResult<String> {
        if let Some(database) = &self.database {
            return Ok(database.clone());
        }

        self.uri
            .split_once("://")
            .and_then(|(_, rest)| rest.split_once('/'))
            .map(|(_, path)| path.split('?').next().unwrap_or_default())
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| DataError::Config(format!("connection '{}' names no database", self.name)))
    }
}

/// Declared connections of an application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub connections: Vec<ConnectionSettings>,
}

impl DatabaseConfig {
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when the text is not a valid configuration.
    pub fn from_json(json: &str) -> DataResult<Self> {
        serde_json::from_str(json).map_err(|e| DataError::Config(e.to_string()))
    }
}

/// Named connections, resolved at start-up.
#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, ConnectionSettings>>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Builds a registry from configuration, skipping connections with unsupported schemes.
    pub fn from_config(config: DatabaseConfig) -> Self {
        let connections = config
            .connections
            .into_iter()
            .filter(|settings| {
                if !settings.is_supported() {
                    warn!(connection = %settings.name, "skipping connection with unsupported scheme");
                }
                settings.is_supported()
            })
            .inspect(|settings| debug!(connection = %settings.name, "registered connection"))
            .map(|settings| (settings.name.clone(), settings))
            .collect();

        Self {
            connections: RwLock::new(connections),
        }
    }

    /// Looks up a connection by name.
    ///
    /// An empty name resolves to the only registered connection when there is exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when no connection matches.
    pub async fn resolve(&self, name: &str) -> DataResult<ConnectionSettings> {
        let connections = self.connections.read().await;

        if name.is_empty() && connections.len() == 1 {
            if let Some(settings) = connections.values().next() {
                return Ok(settings.clone());
            }
        }

        connections
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::Config(format!("missing connection '{name}'")))
    }

    /// Adds or replaces a connection.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Config`] when the URI scheme is not supported.
    pub async fn set_connection(&self, settings: ConnectionSettings) -> DataResult<()> {
        if !settings.is_supported() {
            return Err(DataError::Config(format!(
                "unsupported connection uri for '{}'",
                settings.name
            )));
        }

        debug!(connection = %settings.name, "setting connection");
        self.connections
            .write()
            .await
            .insert(settings.name.clone(), settings);

        Ok(())
    }

    /// Removes a connection, returning it if it was registered.
    pub async fn remove_connection(&self, name: &str) -> Option<ConnectionSettings> {
        self.connections
            .write()
            .await
            .remove(name)
    }

    pub async fn names(&self) -> Vec<String> {
        self.connections
            .read()
            .await
            .keys()
            .cloned()
            .collect()
    }
}
