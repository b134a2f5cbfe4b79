//! The "cached or forced" decision shared by both stages.

use std::collections::HashSet;

/// Whether an entity's result has to be fetched again.
///
/// An entity is fetched when it has no usable cached result, or when the
/// caller forced it. "Usable" means non-empty: an empty link list or an empty
/// page map is treated as never fetched.
pub fn should_refetch(has_cached_result: bool, is_forced: bool) -> bool {
    !has_cached_result || is_forced
}

/// Per-run refresh settings for one stage.
#[derive(Debug, Clone)]
pub struct RefreshPolicy {
    /// When false, every entity is treated as cold.
    pub use_cache: bool,
    /// Titles to refetch even when a cached result exists.
    pub forced: HashSet<String>,
}

impl RefreshPolicy {
    pub fn new(use_cache: bool, forced: impl IntoIterator<Item = String>) -> Self {
        Self {
            use_cache,
            forced: forced.into_iter().collect(),
        }
    }

    /// Cache on, nothing forced.
    #[cfg(test)]
    pub fn cached() -> Self {
        Self::new(true, [])
    }

    pub fn is_forced(&self, title: &str) -> bool {
        self.forced.contains(title)
    }

    /// Apply [`should_refetch`] for `title`, honoring `use_cache`.
    pub fn needs_fetch(&self, title: &str, has_cached_result: bool) -> bool {
        should_refetch(self.use_cache && has_cached_result, self.is_forced(title))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_refetch_table() {
        assert!(should_refetch(false, false));
        assert!(should_refetch(false, true));
        assert!(should_refetch(true, true));
        assert!(!should_refetch(true, false));
    }

    #[test]
    fn test_cached_result_is_reused() {
        let policy = RefreshPolicy::cached();
        assert!(!policy.needs_fetch("Rogue", true));
        assert!(policy.needs_fetch("Rogue", false));
    }

    #[test]
    fn test_forced_title_is_refetched() {
        let policy = RefreshPolicy::new(true, ["NetHack".to_string()]);
        assert!(policy.needs_fetch("NetHack", true));
        assert!(!policy.needs_fetch("Angband", true));
    }

    #[test]
    fn test_cache_disabled_fetches_everything() {
        let policy = RefreshPolicy::new(false, []);
        assert!(policy.needs_fetch("Rogue", true));
    }
}
