//! Thread-blocking facade for callers without an async runtime
//!
//! [`BlockingClient`] owns a multi-threaded tokio runtime and runs every
//! operation of [`Client`] to completion on it, blocking the calling thread.
//!
//! # Example
//! ```rust,ignore
//! let client = BlockingClient::new(Client::new("mongodb://localhost:27017", "shop", None))?;
//! let restaurant: Option<Restaurant> = client.find_one("restaurant", doc! { "name": "restaurant 1" }, None)?;
//!
//! // Spawned operations work too, from inside the runtime context.
//! let _guard = client.enter();
//! let pending = client.client().spawn_count_documents("restaurant", doc! {}, None);
//! let count = pending.blocking_wait()?;
//! ```

use crate::connection::Client;
use crate::results::{
    CommandResult, CountResult, DeleteResult, IndexCreateResult, IndexDropResult, IndexListResult,
    ReadManyResult, ReadOneResult, ReadStreamResult, UpdateResult, WriteManyResult,
    WriteOneResult,
};
use bson::Document as BsonDocument;
use docbridge_common::{Error, ErrorKind, Result};
use mongodb::options::{
    CountOptions, DeleteOptions, DropIndexOptions, FindOneOptions, FindOptions, IndexOptions,
    InsertManyOptions, InsertOneOptions, ListIndexesOptions, ReplaceOptions, SelectionCriteria,
    UpdateModifications, UpdateOptions,
};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use tokio::runtime::{EnterGuard, Runtime};

/// [`Client`] whose operations block the calling thread.
///
/// Must not be used from within an async execution context.
#[derive(Debug, Clone)]
pub struct BlockingClient {
    client: Client,
    runtime: Arc<Runtime>,
}

impl BlockingClient {
    pub fn new(client: Client) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("docbridge-blocking")
            .build()
            .map_err(|e| Error::message(ErrorKind::Runtime, e.to_string()))?;

        Ok(Self {
            client,
            runtime: Arc::new(runtime),
        })
    }

    /// The wrapped async client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Enter the runtime so `spawn_*` operations can be started from this thread
    pub fn enter(&self) -> EnterGuard<'_> {
        self.runtime.enter()
    }

    pub fn ping(&self) -> bool {
        self.runtime.block_on(self.client.ping())
    }

    pub fn insert_one<T>(
        &self,
        collection: &str,
        document: T,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> WriteOneResult
    where
        T: Serialize + Send + Sync,
    {
        self.runtime
            .block_on(self.client.insert_one(collection, document, options))
    }

    pub fn insert_many<T>(
        &self,
        collection: &str,
        documents: Vec<T>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> WriteManyResult
    where
        T: Serialize + Send + Sync,
    {
        self.runtime
            .block_on(self.client.insert_many(collection, documents, options))
    }

    pub fn update_one(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> UpdateResult {
        self.runtime
            .block_on(self.client.update_one(collection, filter, update, options))
    }

    pub fn update_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> UpdateResult {
        self.runtime
            .block_on(self.client.update_many(collection, filter, update, options))
    }

    pub fn replace_one<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        replacement: T,
        options: impl Into<Option<ReplaceOptions>>,
    ) -> UpdateResult
    where
        T: Serialize + Send + Sync,
    {
        self.runtime
            .block_on(self.client.replace_one(collection, filter, replacement, options))
    }

    pub fn find_one<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ReadOneResult<T>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.runtime
            .block_on(self.client.find_one(collection, filter, options))
    }

    pub fn find<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> ReadManyResult<T>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.runtime
            .block_on(self.client.find(collection, filter, options))
    }

    /// Open a document stream; read it with
    /// [`DocumentStream::blocking_recv`](crate::DocumentStream::blocking_recv).
    pub fn find_stream<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> ReadStreamResult<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        self.runtime
            .block_on(self.client.find_stream(collection, filter, options))
    }

    pub fn delete_one(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DeleteResult {
        self.runtime
            .block_on(self.client.delete_one(collection, filter, options))
    }

    pub fn delete_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DeleteResult {
        self.runtime
            .block_on(self.client.delete_many(collection, filter, options))
    }

    pub fn count_documents(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<CountOptions>>,
    ) -> CountResult {
        self.runtime
            .block_on(self.client.count_documents(collection, filter, options))
    }

    pub fn run_command(
        &self,
        command: BsonDocument,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
    ) -> CommandResult {
        self.runtime
            .block_on(self.client.run_command(command, selection_criteria))
    }

    pub fn create_index(
        &self,
        collection: &str,
        keys: BsonDocument,
        options: impl Into<Option<IndexOptions>>,
    ) -> IndexCreateResult {
        self.runtime
            .block_on(self.client.create_index(collection, keys, options))
    }

    pub fn drop_index(
        &self,
        collection: &str,
        name: &str,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> IndexDropResult {
        self.runtime
            .block_on(self.client.drop_index(collection, name, options))
    }

    pub fn drop_all_indexes(
        &self,
        collection: &str,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> IndexDropResult {
        self.runtime
            .block_on(self.client.drop_all_indexes(collection, options))
    }

    pub fn list_indexes(
        &self,
        collection: &str,
        options: impl Into<Option<ListIndexesOptions>>,
    ) -> IndexListResult {
        self.runtime
            .block_on(self.client.list_indexes(collection, options))
    }
}
