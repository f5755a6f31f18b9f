//! Cookie map fed from `Set-Cookie` headers.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Cookie name → value. Only ever grows or overwrites; the server never gets
/// to delete a cookie, it can only send a new value for it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CookieJar {
    cookies: BTreeMap<String, String>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.cookies.contains_key(name)
    }

    /// Present with a non-empty value. A server "clearing" a cookie sends an
    /// empty value, which still counts as absent here.
    pub fn has_value(&self, name: &str) -> bool {
        self.get(name).is_some_and(|v| !v.is_empty())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.insert(name.into(), value.into());
    }

    /// Upsert the cookie carried by one `Set-Cookie` header value.
    ///
    /// Returns `true` if the map changed.
    pub fn merge_set_cookie(&mut self, header: &str) -> bool {
        let pair = header.split(';').next().unwrap_or_default();
        let Some((name, value)) = pair.split_once('=') else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let value = value.trim();
        if self.get(name) == Some(value) {
            return false;
        }
        self.cookies.insert(name.to_string(), value.to_string());
        true
    }

    /// Upsert every `Set-Cookie` value; returns how many entries changed.
    pub fn merge_set_cookies<'a>(&mut self, headers: impl IntoIterator<Item = &'a str>) -> usize {
        headers
            .into_iter()
            .filter(|h| self.merge_set_cookie(h))
            .count()
    }

    /// Entries whose value differs from `base`: what this jar received
    /// after being copied from it.
    pub fn changed_since<'a>(
        &'a self,
        base: &'a CookieJar,
    ) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.cookies
            .iter()
            .filter(move |(name, value)| base.cookies.get(*name) != Some(*value))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// `name=value; name=value`, or `None` when the jar is empty.
    pub fn header_value(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub fn clear(&mut self) {
        self.cookies.clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.cookies.keys().map(|k| k.as_str())
    }
}

/// Cookie jar shared by concurrent read-only sub-requests.
///
/// Every sub-request sends from the same snapshot and merges back, under one
/// lock, only the values it received. A sub-request that received nothing
/// cannot overwrite a sibling's rotated cookie with the stale snapshot value.
#[derive(Debug)]
pub struct SharedCookieJar {
    snapshot: CookieJar,
    merged: Mutex<CookieJar>,
}

impl SharedCookieJar {
    pub fn new(snapshot: CookieJar) -> Self {
        Self {
            merged: Mutex::new(snapshot.clone()),
            snapshot,
        }
    }

    /// A private copy of the snapshot to send with.
    pub fn snapshot(&self) -> CookieJar {
        self.snapshot.clone()
    }

    /// Merge the entries of `jar` that differ from the snapshot.
    pub fn merge(&self, jar: &CookieJar) {
        let mut merged = self.merged.lock().unwrap_or_else(|e| e.into_inner());
        for (name, value) in jar.changed_since(&self.snapshot) {
            merged.insert(name, value);
        }
    }

    pub fn into_inner(self) -> CookieJar {
        self.merged.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_takes_pair_before_first_semicolon() {
        let mut jar = CookieJar::new();
        assert!(jar.merge_set_cookie("ASP.NET_SessionId=abc123; path=/; HttpOnly"));
        assert_eq!(jar.get("ASP.NET_SessionId"), Some("abc123"));
    }

    #[test]
    fn test_merge_splits_on_first_equals_only() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie(".ASPXAUTH=AB==CD=; path=/");
        assert_eq!(jar.get(".ASPXAUTH"), Some("AB==CD="));
    }

    #[test]
    fn test_replay_is_idempotent() {
        let mut jar = CookieJar::new();
        assert!(jar.merge_set_cookie("a=1; path=/"));
        let after_first = jar.clone();
        assert!(!jar.merge_set_cookie("a=1; path=/"));
        assert_eq!(jar, after_first);
    }

    #[test]
    fn test_new_value_overwrites_only_that_key() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookies(["a=1", "b=2"]);
        assert!(jar.merge_set_cookie("b=3; HttpOnly"));
        assert_eq!(jar.get("a"), Some("1"));
        assert_eq!(jar.get("b"), Some("3"));
        assert_eq!(jar.len(), 2);
    }

    #[test]
    fn test_garbage_is_ignored() {
        let mut jar = CookieJar::new();
        assert!(!jar.merge_set_cookie("no-equals-sign"));
        assert!(!jar.merge_set_cookie("=orphan"));
        assert!(jar.is_empty());
        assert_eq!(jar.header_value(), None);
    }

    #[test]
    fn test_header_value_contains_every_pair() {
        let mut jar = CookieJar::new();
        jar.insert("a", "1");
        jar.insert("b", "2");
        let header = jar.header_value().unwrap();
        let mut parts: Vec<&str> = header.split("; ").collect();
        parts.sort();
        assert_eq!(parts, vec!["a=1", "b=2"]);
    }

    #[test]
    fn test_empty_value_does_not_count_as_logged_in() {
        let mut jar = CookieJar::new();
        jar.merge_set_cookie(".ASPXAUTH=; expires=Mon, 11-Oct-1999 22:00:00 GMT");
        assert!(jar.contains(".ASPXAUTH"));
        assert!(!jar.has_value(".ASPXAUTH"));
    }

    #[test]
    fn test_shared_jar_merges_all_writers() {
        let mut base = CookieJar::new();
        base.insert("session", "s1");
        let shared = SharedCookieJar::new(base);

        let mut first = shared.snapshot();
        first.merge_set_cookie("x=1");
        let mut second = shared.snapshot();
        second.merge_set_cookie("y=2");

        shared.merge(&first);
        shared.merge(&second);
        let merged = shared.into_inner();
        assert_eq!(merged.get("session"), Some("s1"));
        assert_eq!(merged.get("x"), Some("1"));
        assert_eq!(merged.get("y"), Some("2"));
    }

    #[test]
    fn test_untouched_copy_does_not_undo_rotation() {
        let mut base = CookieJar::new();
        base.insert(".ASPXAUTH", "tok");
        base.insert("ASP.NET_SessionId", "old");
        let shared = SharedCookieJar::new(base);

        let mut rotated = shared.snapshot();
        rotated.merge_set_cookie("ASP.NET_SessionId=rotated; path=/; HttpOnly");
        let untouched = shared.snapshot();

        shared.merge(&rotated);
        shared.merge(&untouched);
        let merged = shared.into_inner();
        assert_eq!(merged.get("ASP.NET_SessionId"), Some("rotated"));
        assert_eq!(merged.get(".ASPXAUTH"), Some("tok"));
    }

    #[test]
    fn test_changed_since_lists_only_new_values() {
        let mut base = CookieJar::new();
        base.insert("a", "1");
        base.insert("b", "2");
        let mut later = base.clone();
        later.merge_set_cookies(["b=3", "c=4", "a=1"]);

        let changed: Vec<_> = later.changed_since(&base).collect();
        assert_eq!(changed, vec![("b", "3"), ("c", "4")]);
    }
}
