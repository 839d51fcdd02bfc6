//! Shared embedded-KV plumbing for long-term memory and the Hebbian graph.
//!
//! Both components can be backed by the same [`sled::Db`] instance — long
//! term entries live under the `entry:` prefix, Hebbian edges under
//! `hebbian:`. Opening the database once and sharing it via `Arc` avoids
//! holding the on-disk lock twice from the same process.

use std::path::Path;
use std::sync::Arc;

use crate::errors::MemoryResult;

pub fn open_db(path: impl AsRef<Path>) -> MemoryResult<Arc<sled::Db>> {
    let db = sled::open(path)?;
    Ok(Arc::new(db))
}
