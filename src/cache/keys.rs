//! Cache key construction.

use std::fmt;

/// Prefix for every index page entry.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

/// Whose rendering an entry holds. Anonymous visitors share entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerScope {
    Anonymous,
    User(i64),
}

impl ViewerScope {
    pub fn from_user_id(id: Option<i64>) -> Self {
        id.map_or(ViewerScope::Anonymous, ViewerScope::User)
    }
}

impl fmt::Display for ViewerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerScope::Anonymous => f.write_str("anon"),
            ViewerScope::User(id) => write!(f, "user:{id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResponseKey(String);

impl ResponseKey {
    /// `prefix|scope|path?sorted-query`. Reordered query pairs map to the same key.
    pub fn new(prefix: &str, scope: ViewerScope, path: &str, query: Option<&str>) -> Self {
        let query = normalize_query(query.unwrap_or(""));
        if query.is_empty() {
            Self(format!("{prefix}|{scope}|{path}"))
        } else {
            Self(format!("{prefix}|{scope}|{path}?{query}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResponseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn normalize_query(query: &str) -> String {
    let mut pairs: Vec<&str> = query.split('&').filter(|pair| !pair.is_empty()).collect();
    pairs.sort_unstable();
    pairs.join("&")
}
