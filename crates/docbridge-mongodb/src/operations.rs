//! CRUD operations
//!
//! Every operation dials a fresh connection, forwards its arguments and
//! driver options, and wraps any driver failure in an [`Error`] whose kind
//! names the failing stage. Each server round trip is bounded by the client
//! timeout.
//!
//! [`Error`]: docbridge_common::Error

use crate::connection::Client;
use crate::results::{
    CountResult, DeleteResult, ReadManyResult, ReadOneResult, ReadStreamResult, UpdateResult,
    WriteManyResult, WriteOneResult,
};
use crate::stream::{stream_buffer_size, DocumentStream};
use bson::Document as BsonDocument;
use docbridge_common::ErrorKind;
use mongodb::options::{
    CountOptions, DeleteOptions, FindOneOptions, FindOptions, InsertManyOptions, InsertOneOptions,
    ReplaceOptions, UpdateModifications, UpdateOptions,
};
use mongodb::Cursor;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

impl Client {
    /// Insert a single document into `collection`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn insert_one<T>(
        &self,
        collection: &str,
        document: T,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> WriteOneResult
    where
        T: Serialize + Send + Sync,
    {
        let coll = self.collection::<T>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Insert,
                coll.insert_one(document).with_options(options),
            )
            .await?;

        debug!(inserted_id = %result.inserted_id, "Insert complete");
        Ok(result)
    }

    /// Insert several documents into `collection`.
    ///
    /// On a partial failure the driver's `InsertMany` error, reachable through
    /// [`Error::driver_error`](docbridge_common::Error::driver_error), lists
    /// what was written.
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name(), count = documents.len()))]
    pub async fn insert_many<T>(
        &self,
        collection: &str,
        documents: Vec<T>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> WriteManyResult
    where
        T: Serialize + Send + Sync,
    {
        let coll = self.collection::<T>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Insert,
                coll.insert_many(documents).with_options(options),
            )
            .await?;

        debug!(inserted = result.inserted_ids.len(), "Insert complete");
        Ok(result)
    }

    /// Update the first document matching `filter`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn update_one(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> UpdateResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Update,
                coll.update_one(filter, update).with_options(options),
            )
            .await?;

        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "Update complete"
        );
        Ok(result)
    }

    /// Update every document matching `filter`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn update_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> UpdateResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Update,
                coll.update_many(filter, update).with_options(options),
            )
            .await?;

        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "Update complete"
        );
        Ok(result)
    }

    /// Replace the first document matching `filter` with `replacement`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn replace_one<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        replacement: T,
        options: impl Into<Option<ReplaceOptions>>,
    ) -> UpdateResult
    where
        T: Serialize + Send + Sync,
    {
        let coll = self.collection::<T>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Update,
                coll.replace_one(filter, replacement).with_options(options),
            )
            .await?;

        debug!(
            matched = result.matched_count,
            modified = result.modified_count,
            "Replace complete"
        );
        Ok(result)
    }

    /// Find a single document.
    ///
    /// No match is `Ok(None)`, not an error.
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn find_one<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOneOptions>>,
    ) -> ReadOneResult<T>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let coll = self.collection::<T>(collection).await?;
        let found = self
            .bounded(ErrorKind::Find, coll.find_one(filter).with_options(options))
            .await?;

        debug!(found = found.is_some(), "Find one complete");
        Ok(found)
    }

    /// Find every document matching `filter`.
    ///
    /// Opening the cursor and draining it each get their own deadline.
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn find<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> ReadManyResult<T>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let coll = self.collection::<T>(collection).await?;
        let mut cursor = self
            .bounded(ErrorKind::Cursor, coll.find(filter).with_options(options))
            .await?;
        let documents = self.bounded(ErrorKind::Fetch, drain(&mut cursor)).await?;

        debug!(returned = documents.len(), "Find complete");
        Ok(documents)
    }

    /// Find documents and receive them one by one through a [`DocumentStream`].
    ///
    /// Only opening the cursor is bounded by the timeout; iteration runs as
    /// long as the consumer keeps reading.
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn find_stream<T>(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> ReadStreamResult<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let options = options.into();
        let capacity = stream_buffer_size(options.as_ref());

        let coll = self.collection::<T>(collection).await?;
        let cursor = self
            .bounded(ErrorKind::Cursor, coll.find(filter).with_options(options))
            .await?;

        debug!(capacity, "Streaming documents");
        Ok(DocumentStream::spawn(cursor, capacity))
    }

    /// Delete the first document matching `filter`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn delete_one(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DeleteResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Delete,
                coll.delete_one(filter).with_options(options),
            )
            .await?;

        debug!(deleted = result.deleted_count, "Delete complete");
        Ok(result.deleted_count)
    }

    /// Delete every document matching `filter`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn delete_many(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> DeleteResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let result = self
            .bounded(
                ErrorKind::Delete,
                coll.delete_many(filter).with_options(options),
            )
            .await?;

        debug!(deleted = result.deleted_count, "Delete complete");
        Ok(result.deleted_count)
    }

    /// Count the documents matching `filter`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn count_documents(
        &self,
        collection: &str,
        filter: BsonDocument,
        options: impl Into<Option<CountOptions>>,
    ) -> CountResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let count = self
            .bounded(
                ErrorKind::Count,
                coll.count_documents(filter).with_options(options),
            )
            .await?;

        debug!(count, "Count complete");
        Ok(count)
    }
}

/// Read every remaining document off `cursor`
pub(crate) async fn drain<T>(cursor: &mut Cursor<T>) -> mongodb::error::Result<Vec<T>>
where
    T: DeserializeOwned,
{
    let mut documents = Vec::new();
    while cursor.advance().await? {
        documents.push(cursor.deserialize_current()?);
    }
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Restaurant {
        name: String,
        cuisine: String,
    }

    // Name validation happens before dialing, so these never reach a server.
    fn offline_client() -> Client {
        Client::new("mongodb://127.0.0.1:1", "test_client", None)
    }

    #[tokio::test]
    async fn test_insert_rejects_bad_collection() {
        let client = offline_client();
        let restaurant = Restaurant {
            name: "restaurant 1".to_string(),
            cuisine: "cuisine 1".to_string(),
        };
        let err = client.insert_one("", restaurant, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client
            .insert_many::<Restaurant>("$bad", vec![], None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_reads_reject_bad_collection() {
        let client = offline_client();

        let err = client
            .find_one::<Restaurant>("", doc! { "name": "restaurant 1" }, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client
            .find::<Restaurant>("", doc! {}, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client
            .find_stream::<Restaurant>("", doc! {}, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_writes_reject_bad_collection() {
        let client = offline_client();

        let err = client
            .update_many("", doc! {}, doc! { "$set": { "cuisine": "fusion" } }, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client.delete_many("", doc! {}, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = client.count_documents("", doc! {}, None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[tokio::test]
    async fn test_bad_uri_is_connection_error() {
        let client = Client::new("not-a-connection-string", "test_client", None);
        let err = client
            .delete_one("restaurant", doc! { "name": "restaurant 1" }, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
