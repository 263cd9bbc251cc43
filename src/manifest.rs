//! Resource manifest model and request-key normalization.
//!
//! The manifest is a build-time mapping from resource path to content
//! fingerprint, replaced wholesale on each deployment. It includes the
//! `/` root sentinel for the app's entry document. Fingerprint equality
//! is the sole staleness signal between deployments; no byte
//! comparison is ever performed.
//!
//! Stores key cached entries by absolute request URL, while the
//! manifest is keyed by origin-relative path. [`request_key`] and
//! [`request_url`] convert between the two.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sentinel manifest key for the origin root document.
pub const ROOT_KEY: &str = "/";

/// Cache-busting query marker stripped during key normalization.
/// The hosting page appends `?v=<fingerprint>` to shell URLs.
const VERSION_QUERY_MARKER: &str = "?v=";

/// Build-time mapping from resource path to content fingerprint.
///
/// Serializes as a flat JSON object, which is exactly the form
/// persisted in the manifest store after a successful activation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceManifest {
    entries: BTreeMap<String, String>,
}

impl ResourceManifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a resource path is part of this deployment.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Fingerprint recorded for a resource path, if present.
    pub fn fingerprint(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// All resource paths in this deployment.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, String)> for ResourceManifest {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Normalize a request URL to its manifest key.
///
/// Returns `None` when the URL is not under `origin`, which signals
/// the caller to pass the request through untouched. The origin must
/// not carry a trailing slash.
///
/// Mapped onto [`ROOT_KEY`]: the origin itself, an empty path, and
/// client-side route URLs (`origin/#...`). A `?v=` cache-busting
/// suffix is stripped before lookup.
pub fn request_key(origin: &str, url: &str) -> Option<String> {
    let rest = url.strip_prefix(origin)?;
    if rest.is_empty() {
        return Some(ROOT_KEY.to_string());
    }
    // Anything under the origin starts with '/'; a different host that
    // merely shares the origin as a prefix does not.
    let rest = rest.strip_prefix('/')?;
    if rest.starts_with('#') {
        return Some(ROOT_KEY.to_string());
    }
    let key = match rest.find(VERSION_QUERY_MARKER) {
        Some(pos) => &rest[..pos],
        None => rest,
    };
    if key.is_empty() {
        Some(ROOT_KEY.to_string())
    } else {
        Some(key.to_string())
    }
}

/// Canonical absolute URL for a manifest key.
///
/// Inverse of [`request_key`] up to normalization: the root sentinel
/// maps to `origin/`, every other key to `origin/<key>`.
pub fn request_url(origin: &str, key: &str) -> String {
    if key == ROOT_KEY {
        format!("{}/", origin)
    } else {
        format!("{}/{}", origin, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: &str = "https://app.example.com";

    fn manifest() -> ResourceManifest {
        [
            ("/".to_string(), "aaa1".to_string()),
            ("main.dart.js".to_string(), "bbb2".to_string()),
            ("assets/logo.png".to_string(), "ccc3".to_string()),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_manifest_lookup() {
        let m = manifest();
        assert!(m.contains("/"));
        assert_eq!(m.fingerprint("main.dart.js"), Some("bbb2"));
        assert_eq!(m.fingerprint("missing.js"), None);
        assert_eq!(m.len(), 3);
    }

    #[test]
    fn test_manifest_json_round_trip() {
        let m = manifest();
        let json = serde_json::to_string(&m).unwrap();
        // Flat object form, same as the persisted manifest entry.
        assert!(json.starts_with('{'));
        assert!(json.contains("\"main.dart.js\":\"bbb2\""));
        let back: ResourceManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_request_key_root_variants() {
        assert_eq!(request_key(ORIGIN, ORIGIN).as_deref(), Some("/"));
        let with_slash = format!("{}/", ORIGIN);
        assert_eq!(request_key(ORIGIN, &with_slash).as_deref(), Some("/"));
        let route = format!("{}/#/rooms/42", ORIGIN);
        assert_eq!(request_key(ORIGIN, &route).as_deref(), Some("/"));
    }

    #[test]
    fn test_request_key_strips_version_query() {
        let url = format!("{}/app.js?v=5", ORIGIN);
        assert_eq!(request_key(ORIGIN, &url).as_deref(), Some("app.js"));
        // Other query strings are left alone and simply won't match the
        // manifest.
        let url = format!("{}/app.js?debug=1", ORIGIN);
        assert_eq!(request_key(ORIGIN, &url).as_deref(), Some("app.js?debug=1"));
    }

    #[test]
    fn test_request_key_nested_path() {
        let url = format!("{}/assets/fonts/Roboto-Regular.ttf", ORIGIN);
        assert_eq!(
            request_key(ORIGIN, &url).as_deref(),
            Some("assets/fonts/Roboto-Regular.ttf")
        );
    }

    #[test]
    fn test_request_key_foreign_origin() {
        assert_eq!(request_key(ORIGIN, "https://evil.example.com/app.js"), None);
        // A host that merely extends the origin string is not ours.
        assert_eq!(
            request_key(ORIGIN, "https://app.example.com.evil.com/app.js"),
            None
        );
    }

    #[test]
    fn test_request_url_round_trip() {
        for key in ["/", "main.dart.js", "assets/logo.png"] {
            let url = request_url(ORIGIN, key);
            assert_eq!(request_key(ORIGIN, &url).as_deref(), Some(key));
        }
    }
}
