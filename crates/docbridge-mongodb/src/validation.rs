//! Collection name checks run before an operation dials the server

use docbridge_common::{Error, ErrorKind, Result};

/// Maximum length of a collection name in bytes (server namespace limit)
const MAX_COLLECTION_NAME_LENGTH: usize = 255;

/// Collection name that the server will accept as a namespace component
///
/// - Not empty
/// - At most 255 bytes
/// - No null bytes
/// - No `$` characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionName {
    name: String,
}

impl CollectionName {
    pub fn new(name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(Error::message(
                ErrorKind::InvalidArgument,
                "collection name cannot be empty",
            ));
        }

        if name.len() > MAX_COLLECTION_NAME_LENGTH {
            return Err(Error::message(
                ErrorKind::InvalidArgument,
                format!(
                    "collection name exceeds maximum length of {} bytes: '{}'",
                    MAX_COLLECTION_NAME_LENGTH, name
                ),
            ));
        }

        if name.contains('\0') {
            return Err(Error::message(
                ErrorKind::InvalidArgument,
                "collection name cannot contain null bytes",
            ));
        }

        if name.contains('$') {
            return Err(Error::message(
                ErrorKind::InvalidArgument,
                format!("collection name cannot contain '$' character: '{}'", name),
            ));
        }

        Ok(Self {
            name: name.to_string(),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
