//! URL helpers shared by the REST client and the web links the UI opens.

/// Normalize a server URL by removing trailing slashes.
///
/// # Examples
///
/// ```
/// use quire::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://worksheets.example.org"), "https://worksheets.example.org");
/// assert_eq!(normalize_base_url("https://worksheets.example.org/"), "https://worksheets.example.org");
/// assert_eq!(normalize_base_url("https://worksheets.example.org///"), "https://worksheets.example.org");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a server URL and a path without doubling or dropping slashes.
///
/// # Examples
///
/// ```
/// use quire::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://worksheets.example.org/", "/rest/user"),
///     "https://worksheets.example.org/rest/user"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Browser link for a worksheet.
pub fn worksheet_web_url(base_url: &str, uuid: &str) -> String {
    construct_api_url(base_url, &format!("worksheets/{uuid}/"))
}

/// Browser link for a bundle.
pub fn bundle_web_url(base_url: &str, uuid: &str) -> String {
    construct_api_url(base_url, &format!("bundles/{uuid}/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_base_url() {
        assert_eq!(
            normalize_base_url("https://worksheets.example.org/"),
            "https://worksheets.example.org"
        );
        assert_eq!(normalize_base_url("http://localhost:2900"), "http://localhost:2900");
        assert_eq!(normalize_base_url(""), "");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn test_construct_api_url() {
        assert_eq!(
            construct_api_url("https://worksheets.example.org", "rest/interpret/worksheet/0x1"),
            "https://worksheets.example.org/rest/interpret/worksheet/0x1"
        );
        assert_eq!(
            construct_api_url("https://worksheets.example.org///", "///rest/cli/command"),
            "https://worksheets.example.org/rest/cli/command"
        );
    }

    #[test]
    fn web_urls_point_at_the_browser_pages() {
        assert_eq!(
            worksheet_web_url("https://w.example/", "0xabc"),
            "https://w.example/worksheets/0xabc/"
        );
        assert_eq!(
            bundle_web_url("https://w.example", "0xdef"),
            "https://w.example/bundles/0xdef/"
        );
    }
}
