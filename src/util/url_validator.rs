use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur during URL validation.
///
/// Feed and webhook endpoints are configured by the operator; validation
/// catches typos early and keeps the webhook secret off plaintext HTTP.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
    /// Plain HTTP was used for a non-loopback host.
    #[error("Insecure URL: HTTPS required for {0} (plain HTTP only allowed for localhost)")]
    InsecureScheme(String),
}

/// Validates an endpoint URL (feed source or webhook target).
///
/// Accepts:
/// - `https://` URLs with any host
/// - `http://` URLs whose host is loopback (`localhost`, `127.0.0.0/8`, `::1`),
///   which is what local test servers use
///
/// # Errors
///
/// - [`UrlValidationError::InvalidUrl`] if the string does not parse
/// - [`UrlValidationError::UnsupportedScheme`] for `file://`, `ftp://`, ...
/// - [`UrlValidationError::MissingHost`] for host-less URLs
/// - [`UrlValidationError::InsecureScheme`] for `http://` on a public host
///
/// # Examples
///
/// ```
/// use diffhook::util::validate_url;
///
/// assert!(validate_url("https://example.com/w/api.php").is_ok());
/// assert!(validate_url("http://127.0.0.1:8080/hook").is_ok());
/// assert!(validate_url("http://example.com/hook").is_err());
/// assert!(validate_url("file:///etc/passwd").is_err());
/// ```
pub fn validate_url(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;

    let scheme = url.scheme().to_owned();
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme));
    }

    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;
    if host.is_empty() {
        return Err(UrlValidationError::MissingHost);
    }

    if scheme == "http" && !is_loopback_host(host) {
        return Err(UrlValidationError::InsecureScheme(host.to_owned()));
    }

    Ok(url)
}

fn is_loopback_host(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }

    // Strip brackets from IPv6 addresses for parsing
    let host_for_parse = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);

    host_for_parse
        .parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        assert!(validate_url("https://switchbrew.org/w/api.php").is_ok());
        assert!(validate_url("https://discord.com/api/webhooks/1/abc").is_ok());
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_url("file:///etc/passwd"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_url("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_plain_http_public_host_rejected() {
        assert!(matches!(
            validate_url("http://example.com/feed"),
            Err(UrlValidationError::InsecureScheme(_))
        ));
    }

    #[test]
    fn test_plain_http_loopback_accepted() {
        assert!(validate_url("http://localhost/feed").is_ok());
        assert!(validate_url("http://127.0.0.1:3000/feed").is_ok());
        assert!(validate_url("http://[::1]:3000/feed").is_ok());
    }

    #[test]
    fn test_unparseable_rejected() {
        assert!(matches!(
            validate_url("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
