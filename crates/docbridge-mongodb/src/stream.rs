//! Cursor-to-channel document streaming
//!
//! [`DocumentStream`] is fed by a worker task that walks a server-side cursor
//! and forwards every document, or the error met while reading it, into a
//! bounded channel.

use docbridge_common::{Error, ErrorKind, Result};
use futures::{Stream, StreamExt};
use mongodb::options::FindOptions;
use mongodb::Cursor;
use serde::de::DeserializeOwned;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

/// Channel capacity used when the query sets no batch size
pub const DEFAULT_STREAM_BUFFER: usize = 200;

/// Channel capacity for a streamed query: twice the batch size, never below
/// [`DEFAULT_STREAM_BUFFER`].
pub fn stream_buffer_size(options: Option<&FindOptions>) -> usize {
    options
        .and_then(|o| o.batch_size)
        .map(|batch| (batch as usize).saturating_mul(2).max(DEFAULT_STREAM_BUFFER))
        .unwrap_or(DEFAULT_STREAM_BUFFER)
}

/// Per-document results of a streamed query.
///
/// Yields `Ok(document)` for each decoded document, `Err` with
/// [`ErrorKind::Unmarshal`] for a document that failed to decode (the stream
/// goes on), and a final `Err` with [`ErrorKind::Fetch`] if the cursor
/// breaks. Returns `None` once the cursor is exhausted. Dropping the stream
/// stops the worker and closes the cursor.
pub struct DocumentStream<T> {
    receiver: mpsc::Receiver<Result<T>>,
    capacity: usize,
}

impl<T> Unpin for DocumentStream<T> {}

impl<T> std::fmt::Debug for DocumentStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStream")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl<T> DocumentStream<T> {
    pub(crate) fn channel(capacity: usize) -> (mpsc::Sender<Result<T>>, Self) {
        let (sender, receiver) = mpsc::channel(capacity);
        (sender, Self { receiver, capacity })
    }

    /// Size of the buffer between the cursor worker and the consumer
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Receive the next result, or `None` when the stream has ended
    pub async fn recv(&mut self) -> Option<Result<T>> {
        self.receiver.recv().await
    }

    /// Blocking variant of [`recv`](Self::recv) for synchronous callers.
    ///
    /// Panics if called from within an async execution context.
    pub fn blocking_recv(&mut self) -> Option<Result<T>> {
        self.receiver.blocking_recv()
    }
}

impl<T> DocumentStream<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Start a worker that drains `cursor` into a new stream
    pub(crate) fn spawn(cursor: Cursor<T>, capacity: usize) -> Self {
        Self::spawn_from(documents(cursor), capacity)
    }
}

impl<T> DocumentStream<T>
where
    T: Send + 'static,
{
    /// Start a worker that forwards the driver results of `source` into a new stream
    pub(crate) fn spawn_from<S>(source: S, capacity: usize) -> Self
    where
        S: Stream<Item = mongodb::error::Result<T>> + Send + 'static,
    {
        let (sender, stream) = Self::channel(capacity);
        tokio::spawn(forward(source, sender).in_current_span());
        stream
    }
}

impl<T> Stream for DocumentStream<T> {
    type Item = Result<T>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

/// Documents of `cursor`, decoded one at a time
fn documents<T>(cursor: Cursor<T>) -> impl Stream<Item = mongodb::error::Result<T>> + Send
where
    T: DeserializeOwned + Send + Sync,
{
    futures::stream::unfold(cursor, |mut cursor| async move {
        match cursor.advance().await {
            Ok(true) => {
                let item = cursor.deserialize_current();
                Some((item, cursor))
            }
            Ok(false) => None,
            Err(err) => Some((Err(err), cursor)),
        }
    })
}

async fn forward<T, S>(source: S, sender: mpsc::Sender<Result<T>>)
where
    S: Stream<Item = mongodb::error::Result<T>>,
{
    tokio::pin!(source);
    let mut forwarded: usize = 0;
    loop {
        // A consumer that goes away while the cursor waits on the server still stops us.
        let next = tokio::select! {
            _ = sender.closed() => {
                debug!(forwarded, "Stream consumer went away, closing cursor");
                return;
            }
            next = source.next() => next,
        };

        let item = match next {
            Some(result) => result.map_err(|e| Error::driver(ErrorKind::Fetch, e)),
            None => break,
        };
        // Decode failures are per document; any other error ends the cursor.
        let fatal = matches!(&item, Err(err) if err.kind() != ErrorKind::Unmarshal);

        if sender.send(item).await.is_err() {
            debug!(forwarded, "Stream consumer went away, closing cursor");
            return;
        }
        forwarded += 1;
        if fatal {
            break;
        }
    }
    debug!(forwarded, "Document stream finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn decode_failure() -> mongodb::error::Error {
        let de = bson::from_bson::<i32>(bson::Bson::String("seven".to_string())).unwrap_err();
        mongodb::error::Error::from(de)
    }

    fn cursor_failure() -> mongodb::error::Error {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "connection reset");
        mongodb::error::Error::from(io)
    }

    #[test]
    fn test_buffer_size_without_options() {
        assert_eq!(stream_buffer_size(None), 200);
        assert_eq!(stream_buffer_size(Some(&FindOptions::default())), 200);
    }

    #[test]
    fn test_buffer_size_small_batch() {
        let mut options = FindOptions::default();
        options.batch_size = Some(50);
        assert_eq!(stream_buffer_size(Some(&options)), 200);
    }

    #[test]
    fn test_buffer_size_large_batch() {
        let mut options = FindOptions::default();
        options.batch_size = Some(500);
        assert_eq!(stream_buffer_size(Some(&options)), 1000);
    }

    #[tokio::test]
    async fn test_recv_in_order_then_end() {
        let (sender, mut stream) = DocumentStream::<i32>::channel(4);
        assert_eq!(stream.capacity(), 4);

        tokio::spawn(async move {
            for i in 0..10 {
                sender.send(Ok(i)).await.unwrap();
            }
        });

        let mut received = Vec::new();
        while let Some(item) = stream.recv().await {
            received.push(item.unwrap());
        }
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_errors_are_delivered_inline() {
        let (sender, stream) = DocumentStream::<i32>::channel(8);
        sender.send(Ok(1)).await.unwrap();
        sender
            .send(Err(Error::message(ErrorKind::Unmarshal, "bad document")))
            .await
            .unwrap();
        sender.send(Ok(2)).await.unwrap();
        sender
            .send(Err(Error::message(ErrorKind::Fetch, "cursor killed")))
            .await
            .unwrap();
        drop(sender);

        let items: Vec<Result<i32>> = stream.collect().await;
        assert_eq!(items.len(), 4);
        assert_eq!(*items[0].as_ref().unwrap(), 1);
        assert_eq!(items[1].as_ref().unwrap_err().kind(), ErrorKind::Unmarshal);
        assert_eq!(*items[2].as_ref().unwrap(), 2);
        assert_eq!(items[3].as_ref().unwrap_err().kind(), ErrorKind::Fetch);
    }

    #[tokio::test]
    async fn test_dropped_stream_closes_channel() {
        let (sender, stream) = DocumentStream::<i32>::channel(1);
        drop(stream);
        assert!(sender.send(Ok(1)).await.is_err());
    }

    #[test]
    fn test_blocking_recv() {
        let (sender, mut stream) = DocumentStream::<String>::channel(2);
        let producer = std::thread::spawn(move || {
            for name in ["restaurant 1", "restaurant 2", "restaurant 3"] {
                sender.blocking_send(Ok(name.to_string())).unwrap();
            }
        });

        let mut names = Vec::new();
        while let Some(item) = stream.blocking_recv() {
            names.push(item.unwrap());
        }
        producer.join().unwrap();
        assert_eq!(names, vec!["restaurant 1", "restaurant 2", "restaurant 3"]);
    }

    #[tokio::test]
    async fn test_decode_failure_does_not_end_stream() {
        let source = futures::stream::iter(vec![Ok(1), Err(decode_failure()), Ok(2)]);
        let stream = DocumentStream::spawn_from(source, 4);

        let items: Vec<Result<i32>> = stream.collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(*items[0].as_ref().unwrap(), 1);
        let err = items[1].as_ref().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unmarshal);
        assert!(err.driver_error().is_some());
        assert_eq!(*items[2].as_ref().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_cursor_failure_ends_stream() {
        let source = futures::stream::iter(vec![Ok(1), Err(cursor_failure()), Ok(2)]);
        let mut stream = DocumentStream::spawn_from(source, 4);

        assert_eq!(stream.recv().await.unwrap().unwrap(), 1);
        let err = stream.recv().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Fetch);
        assert!(err.is_retryable());
        assert!(stream.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_worker_stops_when_stream_dropped_while_cursor_idle() {
        let (sender, stream) = DocumentStream::<i32>::channel(1);
        let idle = futures::stream::pending::<mongodb::error::Result<i32>>();
        let worker = tokio::spawn(forward(idle, sender));

        drop(stream);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker should stop once the stream is dropped")
            .unwrap();
    }

    #[tokio::test]
    async fn test_worker_stops_when_stream_dropped_while_channel_full() {
        let (sender, mut stream) = DocumentStream::<i32>::channel(1);
        let source = futures::stream::iter((0..100).map(Ok));
        let worker = tokio::spawn(forward(source, sender));

        assert_eq!(stream.recv().await.unwrap().unwrap(), 0);
        drop(stream);
        tokio::time::timeout(Duration::from_secs(1), worker)
            .await
            .expect("worker should stop once the stream is dropped")
            .unwrap();
    }
}
