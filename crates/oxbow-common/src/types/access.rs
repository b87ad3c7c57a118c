//! Page access hints.

/// Hint describing why a page is being accessed.
///
/// The hint is forwarded to the replacement policy with every recorded
/// access. The baseline LRU-K policy ignores it; the interface reserves it
/// so that scan-resistant policies can be slotted in without changing the
/// buffer pool API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccessType {
    /// No information about the access.
    #[default]
    Unknown,
    /// Point lookup through an index.
    Lookup,
    /// Sequential scan.
    Scan,
    /// Index-internal access.
    Index,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unknown() {
        assert_eq!(AccessType::default(), AccessType::Unknown);
    }
}
