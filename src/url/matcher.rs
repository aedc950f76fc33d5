/// Checks whether a host matches an allowed-domain pattern
///
/// `"shop.example.com"` only matches itself. `"*.example.com"` matches the bare
/// `example.com` and any subdomain at any depth. Both sides are expected in
/// lowercase.
///
/// ```
/// use shelf_harvest::url::matches_wildcard;
///
/// assert!(matches_wildcard("*.example.com", "example.com"));
/// assert!(matches_wildcard("*.example.com", "cdn.shop.example.com"));
/// assert!(!matches_wildcard("*.example.com", "example.org"));
/// ```
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => {
            candidate == base
                || candidate
                    .strip_suffix(base)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        }
        None => candidate == pattern,
    }
}
