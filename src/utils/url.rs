//! URL utilities for consistent relay endpoint construction.

/// Normalize a base URL by removing trailing slashes.
///
/// # Examples
///
/// ```
/// use palaver::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://relay.example/v1/"), "https://relay.example/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path without doubling slashes.
///
/// # Examples
///
/// ```
/// use palaver::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://relay.example/v1/", "chat/completions"),
///     "https://relay.example/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_stripped() {
        assert_eq!(
            normalize_base_url("https://relay.example/v1"),
            "https://relay.example/v1"
        );
        assert_eq!(
            normalize_base_url("https://relay.example/v1///"),
            "https://relay.example/v1"
        );
        assert_eq!(normalize_base_url(""), "");
    }

    #[test]
    fn join_handles_slashes_on_either_side() {
        assert_eq!(
            construct_api_url("https://relay.example/v1", "chat/completions"),
            "https://relay.example/v1/chat/completions"
        );
        assert_eq!(
            construct_api_url("https://relay.example/v1/", "/chat/completions"),
            "https://relay.example/v1/chat/completions"
        );
    }
}
