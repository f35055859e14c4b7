//! Convenience layer over the MongoDB driver
//!
//! Every operation opens a fresh connection, forwards its arguments to the
//! driver and wraps the driver's error in [`Error`].
//!
//! # Features
//! - Awaited CRUD/admin operations on [`Client`] that run to completion
//! - `spawn_*` variants that run on a separate task and deliver their result
//!   through a single-slot [`Completion`]
//! - [`DocumentStream`]: a query cursor bridged into a channel of per-document results
//! - [`BlockingClient`] for callers without an async runtime
//!
//! # Example
//! ```rust,ignore
//! use bson::doc;
//! use docbridge_mongodb::Client;
//!
//! let client = Client::new("mongodb://localhost:27017", "shop", Duration::from_secs(60));
//! client.insert_one("restaurant", restaurant, None).await?;
//!
//! let found: Option<Restaurant> = client
//!     .find_one("restaurant", doc! { "name": "restaurant 1" }, None)
//!     .await?;
//! ```

pub mod admin;
pub mod blocking;
pub mod config;
pub mod connection;
pub mod operations;
pub mod results;
pub mod spawn;
pub mod stream;
pub mod validation;

pub use blocking::BlockingClient;
pub use config::{ClientConfig, DEFAULT_TIMEOUT, DEFAULT_URI};
pub use connection::Client;
pub use docbridge_common::{Cause, Error, ErrorKind, Result};
pub use results::{
    CommandResult, CountResult, DeleteResult, IndexCreateResult, IndexDropResult, IndexListResult,
    ReadManyResult, ReadOneResult, ReadStreamResult, UpdateResult, WriteManyResult,
    WriteOneResult,
};
pub use spawn::{join_many, Completion};
pub use stream::{stream_buffer_size, DocumentStream, DEFAULT_STREAM_BUFFER};
pub use validation::CollectionName;
