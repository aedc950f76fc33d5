use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Arguments
///
/// * `url` - The URL to extract the domain from
///
/// # Returns
///
/// * `Some(String)` - The lowercase domain/host
/// * `None` - If the URL has no host
///
/// # Examples
///
/// ```
/// use url::Url;
/// use shelf_harvest::url::extract_domain;
///
/// let url = Url::parse("https://shop.example.com/offer/123").unwrap();
/// assert_eq!(extract_domain(&url), Some("shop.example.com".to_string()));
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
///
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_retailer_subdomain() {
        let url = Url::parse("https://www.pricecheck.co.za/offers/123/phone").unwrap();
        assert_eq!(
            extract_domain(&url),
            Some("www.pricecheck.co.za".to_string())
        );
    }

    #[test]
    fn test_extract_ignores_port() {
        let url = Url::parse("http://127.0.0.1:8080/sitemap.xml").unwrap();
        assert_eq!(extract_domain(&url), Some("127.0.0.1".to_string()));
    }

    #[test]
    fn test_extract_lowercases_host() {
        let url = Url::parse("https://WWW.Takealot.COM/").unwrap();
        assert_eq!(extract_domain(&url), Some("www.takealot.com".to_string()));
    }

    #[test]
    fn test_no_host() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert_eq!(extract_domain(&url), None);
    }
}
