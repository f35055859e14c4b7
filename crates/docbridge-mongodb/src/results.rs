//! Result types, one per operation family
//!
//! Each alias carries either the family's success payload or the [`Error`]
//! that stopped the operation.

use crate::stream::DocumentStream;
use docbridge_common::Error;
use mongodb::results::{InsertManyResult, InsertOneResult};
use mongodb::IndexModel;

/// Single document lookup; `Ok(None)` when nothing matched
pub type ReadOneResult<T> = Result<Option<T>, Error>;

/// Every matching document, fully drained from the cursor
pub type ReadManyResult<T> = Result<Vec<T>, Error>;

/// Open cursor forwarded into a channel of per-document results
pub type ReadStreamResult<T> = Result<DocumentStream<T>, Error>;

pub type WriteOneResult = Result<InsertOneResult, Error>;

pub type WriteManyResult = Result<InsertManyResult, Error>;

/// Matched, modified and upserted counts of an update or replace
pub type UpdateResult = Result<mongodb::results::UpdateResult, Error>;

/// Number of deleted documents
pub type DeleteResult = Result<u64, Error>;

pub type CountResult = Result<u64, Error>;

/// Reply document of a database command
pub type CommandResult = Result<bson::Document, Error>;

/// Name of the created index
pub type IndexCreateResult = Result<String, Error>;

pub type IndexDropResult = Result<(), Error>;

pub type IndexListResult = Result<Vec<IndexModel>, Error>;
