use url::Url;

/// Returns the host key used for per-host state: lowercase host, plus the
/// port when it is not the scheme's default
///
/// Rate limiting, robots.txt caching and the same-domain check all key on
/// this value, so `example.org` and `example.org:8080` are distinct hosts.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use rag_crawler::url::host_key;
///
/// let url = Url::parse("https://EXAMPLE.org/path").unwrap();
/// assert_eq!(host_key(&url), Some("example.org".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(host_key(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn host_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    match url.port() {
        Some(port) => Some(format!("{}:{}", host, port)),
        None => Some(host),
    }
}

/// Builds the robots.txt location for the host serving `url`
pub fn robots_url(url: &Url) -> Option<Url> {
    let mut robots = url.clone();
    robots.host_str()?;
    robots.set_path("/robots.txt");
    robots.set_query(None);
    robots.set_fragment(None);
    Some(robots)
}
