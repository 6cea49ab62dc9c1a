//! Referrer domain extraction

use url::Url;

/// Domain used for clicks without a usable referrer
pub const DEFAULT_REFERRER_DOMAIN: &str = "default.com";

/// Extract the hostname of a referrer URL.
///
/// Missing, empty, malformed, or host-less referrers fall back to
/// [`DEFAULT_REFERRER_DOMAIN`].
pub fn referrer_domain(referrer: Option<&str>) -> String {
    referrer
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|r| Url::parse(r).ok())
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| DEFAULT_REFERRER_DOMAIN.to_string())
}
