//! Spawned operations
//!
//! Each `spawn_*` method starts the matching operation on a separate tokio
//! task and immediately returns a [`Completion`], a single-slot channel that
//! delivers the result once the worker is done.
//!
//! # Example
//! ```rust,ignore
//! let users = client.spawn_find_one::<User>("users", doc! { "id": "1000" }, None);
//! let address = client.spawn_find_one::<Address>("address", doc! { "userId": "1000" }, None);
//!
//! let (user, address) = (users.await?, address.await?);
//! ```

use crate::connection::Client;
use crate::stream::DocumentStream;
use bson::Document as BsonDocument;
use docbridge_common::{Error, ErrorKind, Result};
use mongodb::options::{
    CountOptions, DeleteOptions, DropIndexOptions, FindOneOptions, FindOptions, IndexOptions,
    InsertManyOptions, InsertOneOptions, ListIndexesOptions, ReplaceOptions, SelectionCriteria,
    UpdateModifications, UpdateOptions,
};
use mongodb::results::{InsertManyResult, InsertOneResult, UpdateResult};
use mongodb::IndexModel;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::{warn, Instrument};

/// Pending result of a spawned operation.
///
/// Await it, or call [`blocking_wait`](Self::blocking_wait) from synchronous
/// code. Dropping it does not cancel the worker; its result is discarded.
#[must_use = "a Completion does nothing unless awaited"]
#[derive(Debug)]
pub struct Completion<T> {
    receiver: oneshot::Receiver<Result<T>>,
}

impl<T> Completion<T> {
    /// Completion that is already resolved with `result`
    pub fn ready(result: Result<T>) -> Self {
        let (sender, receiver) = oneshot::channel();
        // The receiver is alive right here, so the send cannot fail.
        let _ = sender.send(result);
        Self { receiver }
    }

    pub(crate) fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (sender, receiver) = oneshot::channel();
        (sender, Self { receiver })
    }

    /// Wait for the result on the current thread.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_wait(self) -> Result<T> {
        self.receiver
            .blocking_recv()
            .unwrap_or_else(|_| Err(ErrorKind::Worker.into()))
    }
}

impl<T> Unpin for Completion<T> {}

impl<T> Future for Completion<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|delivered| delivered.unwrap_or_else(|_| Err(ErrorKind::Worker.into())))
    }
}

/// Wait for several completions and return their results in input order
pub async fn join_many<T>(completions: impl IntoIterator<Item = Completion<T>>) -> Vec<Result<T>> {
    futures::future::join_all(completions).await
}

/// Run `operation` on a new task of the current runtime
fn spawn_operation<T, F>(operation: F) -> Completion<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(err) => {
            warn!(error = %err, "No tokio runtime to spawn operation on");
            return Completion::ready(Err(Error::message(ErrorKind::Worker, err.to_string())));
        }
    };

    let (sender, completion) = Completion::channel();
    handle.spawn(
        async move {
            // Nobody to deliver to if the caller dropped the completion.
            let _ = sender.send(operation.await);
        }
        .in_current_span(),
    );
    completion
}

impl Client {
    pub fn spawn_insert_one<T>(
        &self,
        collection: impl Into<String>,
        document: T,
        options: impl Into<Option<InsertOneOptions>>,
    ) -> Completion<InsertOneResult>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.insert_one(&collection, document, options).await })
    }

    pub fn spawn_insert_many<T>(
        &self,
        collection: impl Into<String>,
        documents: Vec<T>,
        options: impl Into<Option<InsertManyOptions>>,
    ) -> Completion<InsertManyResult>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.insert_many(&collection, documents, options).await })
    }

    pub fn spawn_update_one(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Completion<UpdateResult> {
        let client = self.clone();
        let collection = collection.into();
        let update = update.into();
        let options = options.into();
        spawn_operation(async move {
            client.update_one(&collection, filter, update, options).await
        })
    }

    pub fn spawn_update_many(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        update: impl Into<UpdateModifications>,
        options: impl Into<Option<UpdateOptions>>,
    ) -> Completion<UpdateResult> {
        let client = self.clone();
        let collection = collection.into();
        let update = update.into();
        let options = options.into();
        spawn_operation(async move {
            client.update_many(&collection, filter, update, options).await
        })
    }

    pub fn spawn_replace_one<T>(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        replacement: T,
        options: impl Into<Option<ReplaceOptions>>,
    ) -> Completion<UpdateResult>
    where
        T: Serialize + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move {
            client.replace_one(&collection, filter, replacement, options).await
        })
    }

    pub fn spawn_find_one<T>(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<FindOneOptions>>,
    ) -> Completion<Option<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.find_one::<T>(&collection, filter, options).await })
    }

    pub fn spawn_find<T>(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> Completion<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.find::<T>(&collection, filter, options).await })
    }

    pub fn spawn_find_stream<T>(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<FindOptions>>,
    ) -> Completion<DocumentStream<T>>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move {
            client.find_stream::<T>(&collection, filter, options).await
        })
    }

    pub fn spawn_delete_one(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> Completion<u64> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.delete_one(&collection, filter, options).await })
    }

    pub fn spawn_delete_many(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<DeleteOptions>>,
    ) -> Completion<u64> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.delete_many(&collection, filter, options).await })
    }

    pub fn spawn_count_documents(
        &self,
        collection: impl Into<String>,
        filter: BsonDocument,
        options: impl Into<Option<CountOptions>>,
    ) -> Completion<u64> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move {
            client.count_documents(&collection, filter, options).await
        })
    }

    pub fn spawn_run_command(
        &self,
        command: BsonDocument,
        selection_criteria: impl Into<Option<SelectionCriteria>>,
    ) -> Completion<BsonDocument> {
        let client = self.clone();
        let selection_criteria = selection_criteria.into();
        spawn_operation(async move { client.run_command(command, selection_criteria).await })
    }

    pub fn spawn_create_index(
        &self,
        collection: impl Into<String>,
        keys: BsonDocument,
        options: impl Into<Option<IndexOptions>>,
    ) -> Completion<String> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.create_index(&collection, keys, options).await })
    }

    pub fn spawn_drop_index(
        &self,
        collection: impl Into<String>,
        name: impl Into<String>,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> Completion<()> {
        let client = self.clone();
        let collection = collection.into();
        let name = name.into();
        let options = options.into();
        spawn_operation(async move { client.drop_index(&collection, &name, options).await })
    }

    pub fn spawn_drop_all_indexes(
        &self,
        collection: impl Into<String>,
        options: impl Into<Option<DropIndexOptions>>,
    ) -> Completion<()> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.drop_all_indexes(&collection, options).await })
    }

    pub fn spawn_list_indexes(
        &self,
        collection: impl Into<String>,
        options: impl Into<Option<ListIndexesOptions>>,
    ) -> Completion<Vec<IndexModel>> {
        let client = self.clone();
        let collection = collection.into();
        let options = options.into();
        spawn_operation(async move { client.list_indexes(&collection, options).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready};

    #[tokio::test]
    async fn test_completion_delivers_result() {
        let (sender, completion) = Completion::<u64>::channel();
        sender.send(Ok(3)).unwrap();
        assert_eq!(completion.await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_completion_worker_gone() {
        let (sender, completion) = Completion::<u64>::channel();
        drop(sender);
        let err = completion.await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Worker);
    }

    #[test]
    fn test_completion_pending_until_sent() {
        let (sender, completion) = Completion::<&'static str>::channel();
        let mut task = tokio_test::task::spawn(completion);

        assert_pending!(task.poll());
        sender.send(Ok("done")).unwrap();
        assert!(task.is_woken());
        let result = assert_ready!(task.poll());
        assert_eq!(result.unwrap(), "done");
    }

    #[test]
    fn test_ready_and_blocking_wait() {
        let completion = Completion::ready(Ok(42));
        assert_eq!(completion.blocking_wait().unwrap(), 42);

        let (sender, completion) = Completion::<i32>::channel();
        let worker = std::thread::spawn(move || sender.send(Ok(7)).unwrap());
        assert_eq!(completion.blocking_wait().unwrap(), 7);
        worker.join().unwrap();
    }

    #[tokio::test]
    async fn test_join_many_keeps_order() {
        let slow = spawn_operation(async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(1)
        });
        let failed =
            spawn_operation(async { Err::<i32, _>(Error::message(ErrorKind::Find, "boom")) });
        let fast = spawn_operation(async { Ok(3) });

        let results = join_many(vec![slow, failed, fast]).await;
        assert_eq!(results.len(), 3);
        assert_eq!(*results[0].as_ref().unwrap(), 1);
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Find);
        assert_eq!(*results[2].as_ref().unwrap(), 3);
    }

    #[tokio::test]
    async fn test_dropped_completion_does_not_cancel() {
        let (done_tx, done_rx) = oneshot::channel();
        let completion = spawn_operation(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = done_tx.send(());
            Ok(())
        });
        drop(completion);
        assert!(done_rx.await.is_ok());
    }

    #[test]
    fn test_spawn_outside_runtime() {
        let client = Client::new("mongodb://127.0.0.1:1", "test_client", None);
        let completion = client.spawn_count_documents("restaurant", doc! {}, None);
        let err = completion.blocking_wait().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Worker);
    }

    #[tokio::test]
    async fn test_spawned_operation_reports_validation_error() {
        let client = Client::new("mongodb://127.0.0.1:1", "test_client", None);
        let err = client
            .spawn_find::<BsonDocument>("", doc! {}, None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
