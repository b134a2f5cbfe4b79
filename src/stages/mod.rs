//! The two pipeline stages.
//!
//! Each stage works one entity at a time and follows the same pattern:
//!
//! 1. **Cache check**: return the cached result untouched when it is usable
//!    and the entity is not forced (see [`crate::policy`])
//! 2. **Fetch**: go to the network, bounded by per-request timeouts
//! 3. **Assemble**: build the entity's whole result privately and hand it
//!    back in one piece
//!
//! | Stage | Module | Input | Output |
//! |-------|--------|-------|--------|
//! | Link discovery | [`discovery`] | entity record | ordered list of result URLs |
//! | Content archival | [`archival`] | entity links | URL -> raw body |
//!
//! Batch scheduling, progress, and persistence live in [`crate::pipeline`].

pub mod archival;
pub mod discovery;

/// Outcome of resolving one entity.
///
/// A cached result is never copied out of the store: `Cached` tells the caller
/// to leave the entity's entry exactly as it is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved<T> {
    /// The cached result stands; no network calls were made.
    Cached,
    /// A complete new result produced by this run.
    Fetched(T),
}

