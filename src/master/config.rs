use crate::core::{IdStrategy, MasterError, Result, VersionCorrection};
use crate::expression::pattern::DEFAULT_PATTERN_CACHE_SIZE;

/// Master configuration
///
/// Builder-style: start from [`MasterConfig::new`] and chain setters.
#[derive(Debug, Clone)]
pub struct MasterConfig {
    /// Scheme of every object id this master issues
    pub scheme: String,

    /// Reject a business key already held by another current document
    pub enforce_unique_keys: bool,

    /// How object ids are minted
    pub id_strategy: IdStrategy,

    /// Coordinate used when a read does not name one
    pub default_version_correction: VersionCorrection,

    /// Capacity of the change feed before slow subscribers lag
    pub change_buffer: usize,

    /// Compiled wildcard patterns kept for reuse
    pub pattern_cache_size: usize,
}

impl MasterConfig {
    pub fn new(scheme: &str) -> Self {
        Self {
            scheme: scheme.to_string(),
            enforce_unique_keys: false,
            id_strategy: IdStrategy::Sequential,
            default_version_correction: VersionCorrection::LATEST,
            change_buffer: 1024,
            pattern_cache_size: DEFAULT_PATTERN_CACHE_SIZE,
        }
    }

    pub fn enforce_unique_keys(mut self, enforce: bool) -> Self {
        self.enforce_unique_keys = enforce;
        self
    }

    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }

    pub fn default_version_correction(mut self, vc: VersionCorrection) -> Self {
        self.default_version_correction = vc;
        self
    }

    pub fn change_buffer(mut self, capacity: usize) -> Self {
        self.change_buffer = capacity;
        self
    }

    pub fn pattern_cache_size(mut self, size: usize) -> Self {
        self.pattern_cache_size = size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.scheme.is_empty() {
            return Err(MasterError::invalid("Scheme cannot be empty"));
        }

        if self.scheme.contains('~') {
            return Err(MasterError::invalid("Scheme cannot contain '~'"));
        }

        if self.change_buffer == 0 {
            return Err(MasterError::invalid("change_buffer must be > 0"));
        }

        Ok(())
    }
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self::new("DbDoc")
    }
}
