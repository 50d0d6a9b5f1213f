//! UUID v7 utilities.
//!
//! Every entity id is generated client-side as a UUIDv7, so an entity built
//! in memory already carries its final identity before it is flushed.

use uuid::Uuid;

/// Generate a new UUIDv7 identifier.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}
