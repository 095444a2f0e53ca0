//! Path-pattern rules deriving the metadata headers attached to uploads.

use std::collections::BTreeMap;

use camino::Utf8Path;
use glob::Pattern;
use serde::{Deserialize, Serialize};

pub type Headers = BTreeMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderRule {
    pub pattern: String,
    pub headers: Headers,
}

#[derive(Debug, Default)]
pub struct HeaderRules(Vec<(Pattern, Headers)>);

impl HeaderRules {
    pub fn new(rules: &[HeaderRule]) -> crate::Result<Self> {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            let pattern = Pattern::new(&rule.pattern)?;
            compiled.push((pattern, rule.headers.clone()));
        }
        Ok(Self(compiled))
    }

    /// Merge the headers of every rule matching `path`, in order.
    pub fn headers_for<P: AsRef<Utf8Path>>(&self, path: P) -> Headers {
        let path = path.as_ref().as_str();
        let opts = crate::config::match_options();
        let mut headers = Headers::new();
        for (pattern, hds) in &self.0 {
            if pattern.matches_with(path, opts) {
                headers.extend(hds.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        headers
    }
}
