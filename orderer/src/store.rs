//! Client for the shared node-status store.
//!
//! Records live in a document collection and are keyed by `instanceId`. The
//! orderer only ever touches the `status` field of a record.

use crate::Error;
use mongodb::{bson::doc, options::ClientOptions, Client, Collection};
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, time::Duration};
use tracing::{debug, info};

/// Default database holding node records
pub const DEFAULT_DATABASE: &str = "privatehive";

/// Default collection holding orderer records
pub const DEFAULT_COLLECTION: &str = "privatehiveOrderers";

/// Server selection and connect timeout unless the connection string sets one
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle status of a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Status {
    Initializing,
    Running,
    Down,
    /// A status written by some other component
    Other(String),
}

impl Status {
    pub fn as_str(&self) -> &str {
        match self {
            Status::Initializing => "initializing",
            Status::Running => "running",
            Status::Down => "down",
            Status::Other(status) => status,
        }
    }
}

impl From<String> for Status {
    fn from(status: String) -> Self {
        match status.as_str() {
            "initializing" => Status::Initializing,
            "running" => Status::Running,
            "down" => Status::Down,
            _ => Status::Other(status),
        }
    }
}

impl From<Status> for String {
    fn from(status: Status) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node's record in the status store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeStatusRecord {
    #[serde(rename = "instanceId")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

/// Minimal interface to the shared status store.
pub trait StatusStore: Send + Sync {
    /// Fetch the record stored under `key`, if any.
    fn find(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<NodeStatusRecord>, Error>> + Send;

    /// Create the record under `key` if absent, otherwise overwrite only its status.
    fn upsert_status(
        &self,
        key: &str,
        status: Status,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Overwrite the status of an existing record under `key`.
    ///
    /// Never creates a record. Returns whether a record was found.
    fn update_status(
        &self,
        key: &str,
        status: Status,
    ) -> impl Future<Output = Result<bool, Error>> + Send;
}

/// Result of [find_and_transition].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transition {
    /// No record exists for the key
    Absent,
    /// The record's status needs no change
    Unchanged(Status),
    /// The record's status was updated
    Updated { from: Option<Status>, to: Status },
}

/// Move a node's record along its lifecycle when a node (re)starts.
///
/// A record without a status becomes `initializing` and a `down` record becomes
/// `running`. Missing records and records in any other state are left alone,
/// including a record removed between the lookup and the update.
pub async fn find_and_transition<S: StatusStore>(
    store: &S,
    key: &str,
) -> Result<Transition, Error> {
    let Some(record) = store.find(key).await? else {
        debug!(key, "no status record");
        return Ok(Transition::Absent);
    };
    let to = match &record.status {
        None => Status::Initializing,
        Some(Status::Down) => Status::Running,
        Some(status) => return Ok(Transition::Unchanged(status.clone())),
    };
    if !store.update_status(key, to.clone()).await? {
        debug!(key, "status record removed before update");
        return Ok(Transition::Absent);
    }
    info!(key, from = ?record.status, %to, "transitioned status");
    Ok(Transition::Updated {
        from: record.status,
        to,
    })
}

/// Location of the status collection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// MongoDB connection string
    pub uri: String,
    pub database: String,
    pub collection: String,
}

impl StoreConfig {
    /// Load the store configuration from the process environment.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load the store configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let uri = get("STATUS_STORE_URI")
            .ok_or_else(|| Error::Configuration("STATUS_STORE_URI is required".into()))?;
        Ok(Self {
            uri,
            database: get("STATUS_STORE_DATABASE").unwrap_or(DEFAULT_DATABASE.into()),
            collection: get("STATUS_STORE_COLLECTION").unwrap_or(DEFAULT_COLLECTION.into()),
        })
    }
}

/// [StatusStore] backed by a MongoDB collection.
#[derive(Clone, Debug)]
pub struct MongoStore {
    collection: Collection<NodeStatusRecord>,
}

impl MongoStore {
    /// Parse the connection string and open a client.
    ///
    /// The client connects lazily, so an unreachable server surfaces on the
    /// first operation rather than here.
    pub async fn connect(config: &StoreConfig) -> Result<Self, Error> {
        let mut options = ClientOptions::parse(&config.uri).await?;
        if options.server_selection_timeout.is_none() {
            options.server_selection_timeout = Some(REQUEST_TIMEOUT);
        }
        if options.connect_timeout.is_none() {
            options.connect_timeout = Some(REQUEST_TIMEOUT);
        }
        let client = Client::with_options(options)?;
        let collection = client
            .database(&config.database)
            .collection(&config.collection);
        Ok(Self { collection })
    }

    async fn set_status(&self, key: &str, status: &Status, upsert: bool) -> Result<bool, Error> {
        let result = self
            .collection
            .update_one(
                doc! { "instanceId": key },
                doc! { "$set": { "status": status.as_str() } },
            )
            .upsert(upsert)
            .await?;
        Ok(result.matched_count > 0 || result.upserted_id.is_some())
    }
}

impl StatusStore for MongoStore {
    async fn find(&self, key: &str) -> Result<Option<NodeStatusRecord>, Error> {
        Ok(self.collection.find_one(doc! { "instanceId": key }).await?)
    }

    async fn upsert_status(&self, key: &str, status: Status) -> Result<(), Error> {
        self.set_status(key, &status, true).await?;
        debug!(key, %status, "upserted status");
        Ok(())
    }

    async fn update_status(&self, key: &str, status: Status) -> Result<bool, Error> {
        let matched = self.set_status(key, &status, false).await?;
        debug!(key, %status, matched, "updated status");
        Ok(matched)
    }
}
