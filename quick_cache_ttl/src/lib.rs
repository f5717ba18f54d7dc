//! A small TTL-expiring cache built on top of `quick_cache`.
//!
//! Used by `sync_core::ssrf` to avoid re-resolving the same hostname on
//! every admin-submitted URL validation.

mod cache;

pub use cache::CacheWithTTL;
