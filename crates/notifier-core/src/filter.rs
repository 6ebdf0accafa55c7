//! Expected-bucket filter
//!
//! Event sources that cannot filter by bucket deliver events for every
//! bucket in the project; only the configured one is acted on.

/// Admits events for the configured bucket, or for any bucket when unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketFilter {
    expected: Option<String>,
}

impl BucketFilter {
    /// An empty expected bucket disables the filter.
    pub fn new(expected: Option<String>) -> Self {
        Self {
            expected: expected.filter(|b| !b.is_empty()),
        }
    }

    pub fn expected(&self) -> Option<&str> {
        self.expected.as_deref()
    }

    pub fn admits(&self, bucket: &str) -> bool {
        match &self.expected {
            Some(expected) => expected == bucket,
            None => true,
        }
    }
}
