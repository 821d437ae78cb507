//! Time-sortable document identifiers.
//!
//! Ids are ULIDs drawn from one process-wide monotonic generator, so ids generated later always
//! sort after earlier ones, including ids generated within the same millisecond.

use std::sync::{LazyLock, Mutex, PoisonError};
use ulid::Generator;

use crate::error::{DocumentStoreError, DocumentStoreResult};

static GENERATOR: LazyLock<Mutex<Generator>> = LazyLock::new(|| Mutex::new(Generator::new()));

/// Generates a new 26 character ULID string.
///
/// # Errors
///
/// Returns [`DocumentStoreError::IdGeneration`] if the generator's random component overflows
/// within a single millisecond.
pub fn generate_id() -> DocumentStoreResult<String> {
    GENERATOR
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .generate()
        .map(|ulid| ulid.to_string())
        .map_err(|err| DocumentStoreError::IdGeneration(err.to_string()))
}
