use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("scheme pattern is valid"));

/// Compute the storage location of a resource from its URL and crawl time.
///
/// Returns `(directory, file_name)`: the URL without its `http://`/`https://`
/// prefix and without one trailing `/`, and the Unix timestamp in seconds.
///
/// `http://login.google.com/secure/createAccount.html` crawled at `1570788418`
/// gives `("login.google.com/secure/createAccount.html", "1570788418")`.
pub fn compute_path(url: &str, crawl_date: DateTime<Utc>) -> (String, String) {
    (sanitize_url(url), crawl_date.timestamp().to_string())
}

/// Remove the leading `http://` or `https://` and one trailing `/` from a URL
pub fn sanitize_url(url: &str) -> String {
    let without_scheme = SCHEME.replace(url, "");
    without_scheme
        .strip_suffix('/')
        .unwrap_or(&*without_scheme)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn crawl_time() -> DateTime<Utc> {
        Utc.timestamp_opt(1570788418, 0).unwrap()
    }

    #[test]
    fn test_compute_path_https_trailing_slash() {
        let (directory, file_name) =
            compute_path("https://private.creekorful.fr/something/strange/", crawl_time());
        assert_eq!(directory, "private.creekorful.fr/something/strange");
        assert_eq!(file_name, "1570788418");
    }

    #[test]
    fn test_compute_path_http_file() {
        let (directory, file_name) = compute_path(
            "http://private.creekorful.fr/something/strange/index.php",
            crawl_time(),
        );
        assert_eq!(directory, "private.creekorful.fr/something/strange/index.php");
        assert_eq!(file_name, "1570788418");
    }

    #[test]
    fn test_compute_path_strips_single_trailing_slash() {
        let (directory, _) = compute_path("http://example.onion//", crawl_time());
        assert_eq!(directory, "example.onion/");
    }

    #[test]
    fn test_compute_path_scheme_is_prefix_only() {
        // Uppercase scheme and embedded schemes are left untouched
        let (directory, _) = compute_path("HTTP://example.onion", crawl_time());
        assert_eq!(directory, "HTTP://example.onion");

        let (directory, _) =
            compute_path("example.onion/redirect?to=https://other.onion", crawl_time());
        assert_eq!(directory, "example.onion/redirect?to=https://other.onion");
    }

    #[test]
    fn test_compute_path_is_deterministic() {
        let url = "https://example.onion/a/";
        assert_eq!(compute_path(url, crawl_time()), compute_path(url, crawl_time()));
    }
}
