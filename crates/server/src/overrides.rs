//! Per-session backend overrides captured from the `initialize` request's query string.

use ontoportal_http_tools::backend::BackendTarget;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Query parameters accepted as an API key override, in priority order.
pub const API_KEY_PARAMS: [&str; 3] = ["api_key", "apikey", "token"];
/// Query parameters accepted as a base URL override, in priority order.
pub const BASE_URL_PARAMS: [&str; 3] = ["base_url", "rest_url", "rest_base_url"];

/// Overrides requested by one client at connection time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOverride {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl SessionOverride {
    /// Pick the first present, non-empty alias of each override from a raw query string.
    #[must_use]
    pub fn from_query(query: Option<&str>) -> Self {
        let Some(query) = query else {
            return Self::default();
        };
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let first = |aliases: &[&str]| {
            aliases.iter().find_map(|alias| {
                pairs
                    .iter()
                    .find(|(k, v)| k == alias && !v.is_empty())
                    .map(|(_, v)| v.clone())
            })
        };

        Self {
            api_key: first(&API_KEY_PARAMS),
            base_url: first(&BASE_URL_PARAMS),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.base_url.is_none()
    }
}

/// Effective backend target per MCP session.
///
/// Sessions without a record (or requests without a session id) use the defaults.
#[derive(Debug)]
pub struct SessionOverrides {
    defaults: BackendTarget,
    sessions: RwLock<HashMap<String, BackendTarget>>,
}

impl SessionOverrides {
    #[must_use]
    pub fn new(defaults: BackendTarget) -> Self {
        Self {
            defaults,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn defaults(&self) -> &BackendTarget {
        &self.defaults
    }

    /// Store the effective target for `session_id` and return it.
    pub fn record(&self, session_id: &str, overrides: &SessionOverride) -> BackendTarget {
        let target = self
            .defaults
            .with_overrides(overrides.api_key.as_deref(), overrides.base_url.as_deref());
        self.sessions
            .write()
            .insert(session_id.to_string(), target.clone());
        target
    }

    #[must_use]
    pub fn target_for(&self, session_id: Option<&str>) -> BackendTarget {
        session_id
            .and_then(|id| self.sessions.read().get(id).cloned())
            .unwrap_or_else(|| self.defaults.clone())
    }

    pub fn forget(&self, session_id: &str) -> bool {
        self.sessions.write().remove(session_id).is_some()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_is_recognised() {
        for alias in API_KEY_PARAMS {
            let o = SessionOverride::from_query(Some(&format!("{alias}=K")));
            assert_eq!(o.api_key.as_deref(), Some("K"), "{alias}");
            assert_eq!(o.base_url, None);
        }
        for alias in BASE_URL_PARAMS {
            let o = SessionOverride::from_query(Some(&format!("{alias}=https%3A%2F%2Fb.example")));
            assert_eq!(o.base_url.as_deref(), Some("https://b.example"), "{alias}");
            assert_eq!(o.api_key, None);
        }
    }

    #[test]
    fn earlier_alias_wins_and_empty_values_are_skipped() {
        let o = SessionOverride::from_query(Some("token=t&api_key=&apikey=a"));
        assert_eq!(o.api_key.as_deref(), Some("a"));

        let o = SessionOverride::from_query(Some("rest_base_url=c&base_url=a&rest_url=b"));
        assert_eq!(o.base_url.as_deref(), Some("a"));

        assert!(SessionOverride::from_query(None).is_empty());
        assert!(SessionOverride::from_query(Some("other=1")).is_empty());
    }

    #[test]
    fn sessions_are_isolated_and_fall_back_to_defaults() {
        let store = SessionOverrides::new(BackendTarget::new("default-key", "https://default"));
        let a = store.record(
            "a",
            &SessionOverride {
                api_key: Some("key-a".into()),
                base_url: None,
            },
        );
        assert_eq!(a.api_key, "key-a");
        assert_eq!(a.base_url, "https://default");
        assert!(a.api_key_overridden && !a.base_url_overridden);

        store.record(
            "b",
            &SessionOverride {
                api_key: None,
                base_url: Some("https://other".into()),
            },
        );

        assert_eq!(store.target_for(Some("a")).api_key, "key-a");
        assert_eq!(store.target_for(Some("b")).api_key, "default-key");
        assert_eq!(store.target_for(Some("b")).base_url, "https://other");
        assert_eq!(store.target_for(Some("unknown")), *store.defaults());
        assert_eq!(store.target_for(None), *store.defaults());

        assert!(store.forget("a"));
        assert!(!store.forget("a"));
        assert_eq!(store.target_for(Some("a")).api_key, "default-key");
        assert_eq!(store.len(), 1);
    }
}
