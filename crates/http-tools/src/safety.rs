//! Keeping credentials out of logs and error messages.

use url::Url;

/// Query parameter names that may carry an OntoPortal API key.
const SECRET_QUERY_KEYS: &[&str] = &["apikey", "api_key", "token"];

/// Render a URL for logs: userinfo and fragment removed, credential-bearing query params masked.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let mut u = url.clone();
    let _ = u.set_username("");
    let _ = u.set_password(None);
    u.set_fragment(None);

    if u.query().is_some() {
        let pairs: Vec<(String, String)> = u
            .query_pairs()
            .map(|(k, v)| {
                if SECRET_QUERY_KEYS
                    .iter()
                    .any(|s| k.eq_ignore_ascii_case(s))
                {
                    (k.into_owned(), "***".to_string())
                } else {
                    (k.into_owned(), v.into_owned())
                }
            })
            .collect();
        u.query_pairs_mut().clear().extend_pairs(pairs);
    }

    u.to_string()
}

/// `reqwest` error text with the request URL redacted.
#[must_use]
pub fn sanitize_reqwest_error(e: &reqwest::Error) -> String {
    let msg = e.to_string();
    match e.url() {
        Some(u) => msg.replace(u.as_str(), &redact_url(u)),
        None => msg,
    }
}

#[cfg(test)]
mod tests {
    use super::redact_url;
    use url::Url;

    #[test]
    fn redacts_userinfo_and_api_key_query() {
        let url = Url::parse("https://user:pw@data.example.org/search?q=heart&apikey=secret#frag")
            .expect("url");
        let redacted = redact_url(&url);
        assert!(!redacted.contains("secret"));
        assert!(!redacted.contains("pw"));
        assert!(!redacted.contains("frag"));
        assert!(redacted.contains("q=heart"));
        assert!(redacted.contains("apikey=***") || redacted.contains("apikey=%2A%2A%2A"));
    }

    #[test]
    fn leaves_plain_urls_untouched() {
        let url = Url::parse("https://data.example.org/ontologies").expect("url");
        assert_eq!(redact_url(&url), "https://data.example.org/ontologies");
    }
}
