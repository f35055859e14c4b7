//! Database commands and index management

use crate::connection::Client;
use crate::operations::drain;
use crate::results::{CommandResult, IndexCreateResult, IndexDropResult, IndexListResult};
use bson::Document as BsonDocument;
use docbridge_common::ErrorKind;
use mongodb::options::{DropIndexOptions, IndexOptions, ListIndexesOptions, SelectionCriteria};
use mongodb::IndexModel;
use tracing::{debug, instrument};

impl Client {
    /// Run a command against the configured database
    #[instrument(skip_all, fields(database = %self.database_name()))]
    pub async fn run_command(
        &self,
        command: BsonDocument,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
    ) -> CommandResult {
        let database = self.database().await?;

        let mut action = database.run_command(command);
        if let Some(criteria) = selection_criteria.into() {
            action = action.selection_criteria(criteria);
        }
        let reply = self.bounded(ErrorKind::Command, action).await?;

        debug!("Command complete");
        Ok(reply)
    }

    /// Create an index over `keys`, e.g. `doc! { "name": 1 }`.
    ///
    /// Returns the index name chosen by the server or given in `options`.
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn create_index(
        &self,
        collection: &str,
        keys: BsonDocument,
        options: impl Into<Option<IndexOptions>>,
    ) -> IndexCreateResult {
        let coll = self.collection::<BsonDocument>(collection).await?;

        let mut model = IndexModel::builder().keys(keys).build();
        model.options = options.into();

        let created = self.bounded(ErrorKind::Index, coll.create_index(model)).await?;

        debug!(index = %created.index_name, "Index created");
        Ok(created.index_name)
    }

    /// Drop the index called `name`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name(), index = %name))]
    pub async fn drop_index(
        &self,
        collection: &str,
        name: &str,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> IndexDropResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        self.bounded(
            ErrorKind::Index,
            coll.drop_index(name).with_options(options),
        )
        .await?;

        debug!("Index dropped");
        Ok(())
    }

    /// Drop every index of `collection` except the one on `_id`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn drop_all_indexes(
        &self,
        collection: &str,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> IndexDropResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        self.bounded(ErrorKind::Index, coll.drop_indexes().with_options(options))
            .await?;

        debug!("Indexes dropped");
        Ok(())
    }

    /// List the indexes of `collection`
    #[instrument(skip_all, fields(collection = %collection, database = %self.database_name()))]
    pub async fn list_indexes(
        &self,
        collection: &str,
        options: impl Into<Option<ListIndexesOptions>>,
    ) -> IndexListResult {
        let coll = self.collection::<BsonDocument>(collection).await?;
        let mut cursor = self
            .bounded(ErrorKind::Cursor, coll.list_indexes().with_options(options))
            .await?;
        let indexes = self.bounded(ErrorKind::Fetch, drain(&mut cursor)).await?;

        debug!(indexes = indexes.len(), "Index listing complete");
        Ok(indexes)
    }
}
