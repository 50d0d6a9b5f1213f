//! HTTP handlers for the read-only API.

pub mod collections;
pub mod genomes;
pub mod pangenomes;

use pangbank_core::defaults::{PAGE_LIMIT, PAGE_OFFSET};
use pangbank_core::Pagination;

/// Page from optional `offset`/`limit` query values; bounds are checked by
/// the repositories.
pub(crate) fn page(offset: Option<i64>, limit: Option<i64>) -> Pagination {
    Pagination {
        offset: offset.unwrap_or(PAGE_OFFSET),
        limit: limit.unwrap_or(PAGE_LIMIT),
    }
}
