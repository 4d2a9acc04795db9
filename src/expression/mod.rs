pub mod pattern;

pub use pattern::{WildcardMatcher, has_wildcards};
