//! Common utilities for docbridge
//!
//! This crate provides the error type shared by the docbridge crates.

pub mod error;

pub use error::{Cause, Error, ErrorKind, Result};
