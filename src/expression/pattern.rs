use crate::core::{MasterError, Result};
use lru::LruCache;
use regex::{Regex, RegexBuilder};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

pub const DEFAULT_PATTERN_CACHE_SIZE: usize = 200;

/// Case-insensitive wildcard matching: `*` is any run, `?` any one char.
///
/// Compiled patterns are kept in an LRU owned by the matcher.
#[derive(Debug)]
pub struct WildcardMatcher {
    compiled: Mutex<LruCache<String, Arc<Regex>>>,
}

impl WildcardMatcher {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            compiled: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn matches(&self, text: &str, pattern: &str) -> Result<bool> {
        if let Some(result) = fast_path(text, pattern) {
            return Ok(result);
        }
        let regex = self.compile(pattern)?;
        Ok(regex.is_match(text))
    }

    pub fn cached_patterns(&self) -> Result<usize> {
        Ok(self.compiled.lock()?.len())
    }

    fn compile(&self, pattern: &str) -> Result<Arc<Regex>> {
        if let Some(regex) = self.compiled.lock()?.get(pattern) {
            return Ok(Arc::clone(regex));
        }

        let regex = RegexBuilder::new(&wildcard_to_regex(pattern))
            .case_insensitive(true)
            .build()
            .map_err(|e| MasterError::invalid(format!("Invalid wildcard pattern '{}': {}", pattern, e)))?;
        let regex = Arc::new(regex);

        self.compiled.lock()?.put(pattern.to_string(), Arc::clone(&regex));
        Ok(regex)
    }
}

impl Default for WildcardMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_CACHE_SIZE)
    }
}

pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?'])
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0u8; 4]))),
        }
    }
    regex.push('$');
    regex
}

/// Patterns with at most a leading and a trailing `*` skip the regex.
fn fast_path(text: &str, pattern: &str) -> Option<bool> {
    if pattern.contains('?') {
        return None;
    }
    let prefix_star = pattern.starts_with('*');
    let suffix_star = pattern.len() > 1 && pattern.ends_with('*');
    let core = pattern
        .strip_prefix('*')
        .unwrap_or(pattern);
    let core = if suffix_star { core.strip_suffix('*').unwrap_or(core) } else { core };
    if core.contains('*') {
        return None;
    }

    let text = text.to_lowercase();
    let core = core.to_lowercase();
    Some(match (prefix_star, suffix_star) {
        (false, false) => text == core,
        (false, true) => text.starts_with(&core),
        (true, false) => text.ends_with(&core),
        (true, true) => text.contains(&core),
    })
}
