//! Native cookie store behind the opaque jar handle.
//!
//! # Design
//! The store is the only mutable state shared between calls. It is guarded
//! by a `Mutex` here so hosts can hand the same handle to concurrent
//! requests without locking anything themselves.
//!
//! Cookies set with a `Domain` attribute are only accepted when the domain
//! is a registrable domain (not a public suffix such as `com` or `co.uk`)
//! and the request host matches it on a label boundary. Host-only cookies
//! are always accepted.

use std::sync::Mutex;

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, host: &str, now: DateTime<Utc>) -> bool {
        if self.is_expired(now) {
            return false;
        }
        if self.secure && url.scheme() != "https" {
            return false;
        }
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_matches(host, &self.domain)
        };
        domain_ok && path_matches(url.path(), &self.path)
    }
}

#[derive(Debug, Default)]
pub struct CookieJarStore {
    cookies: Mutex<Vec<StoredCookie>>,
}

impl CookieJarStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live cookies, expired ones excluded.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        let cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());
        cookies.iter().filter(|c| !c.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `cookie` header value for a request to `url`, if any cookie matches.
    ///
    /// Longer paths come first, as browsers send them.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_ascii_lowercase();
        let now = Utc::now();
        let cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());

        let mut matching: Vec<&StoredCookie> = cookies
            .iter()
            .filter(|c| c.matches(url, &host, now))
            .collect();
        if matching.is_empty() {
            return None;
        }
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));

        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Store the `set-cookie` header values received for `url`.
    ///
    /// Returns how many cookies were stored or removed.
    /// Expired cookies are evicted on every call.
    pub fn store<'a>(&self, url: &Url, set_cookies: impl IntoIterator<Item = &'a [u8]>) -> usize {
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return 0;
        };
        let now = Utc::now();
        let mut applied = 0;
        let mut cookies = self.cookies.lock().unwrap_or_else(|e| e.into_inner());

        for raw in set_cookies {
            if !is_cookie_domain_safe(raw, &host) {
                tracing::warn!(host = %host, "dropping set-cookie with unsafe Domain attribute");
                continue;
            }
            let Ok(header) = std::str::from_utf8(raw) else {
                continue;
            };
            let Some(cookie) = parse_set_cookie(header, url, &host, now) else {
                continue;
            };

            cookies.retain(|c| {
                !(c.name == cookie.name && c.domain == cookie.domain && c.path == cookie.path)
            });
            if !cookie.is_expired(now) {
                cookies.push(cookie);
            }
            applied += 1;
        }
        cookies.retain(|c| !c.is_expired(now));
        applied
    }
}

fn parse_set_cookie(
    header: &str,
    url: &Url,
    host: &str,
    now: DateTime<Utc>,
) -> Option<StoredCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        domain: host.to_string(),
        host_only: true,
        path: default_path(url.path()),
        secure: false,
        expires: None,
    };
    let mut max_age: Option<i64> = None;

    for attr in parts {
        let attr = attr.trim();
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr, ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "domain" => {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                if !domain.is_empty() {
                    cookie.domain = domain;
                    cookie.host_only = false;
                }
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "secure" => cookie.secure = true,
            "max-age" => max_age = val.parse().ok(),
            "expires" => {
                if let Some(at) = parse_cookie_date(val) {
                    cookie.expires = Some(at);
                }
            }
            _ => {}
        }
    }

    // Max-Age wins over Expires
    if let Some(seconds) = max_age {
        cookie.expires = if seconds <= 0 {
            Some(DateTime::<Utc>::MIN_UTC)
        } else {
            Duration::try_seconds(seconds).and_then(|ttl| now.checked_add_signed(ttl))
        };
    }
    Some(cookie)
}

/// Date formats seen in `Expires` besides RFC 2822: the RFC 6265 dash
/// form, RFC 850 and asctime.
const COOKIE_DATE_FORMATS: [&str; 3] = [
    "%a, %d-%b-%Y %H:%M:%S GMT",
    "%A, %d-%b-%y %H:%M:%S GMT",
    "%a %b %e %H:%M:%S %Y",
];

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc2822(value) {
        return Some(at.with_timezone(&Utc));
    }
    COOKIE_DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
}

/// Directory of the request path, per RFC 6265 section 5.1.4.
fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

fn path_matches(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path[cookie_path.len()..].starts_with('/'))
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
}

/// Whether a `set-cookie` header's `Domain` attribute may be stored for
/// `request_host`. Non-UTF-8 headers are rejected.
pub(crate) fn is_cookie_domain_safe(header_bytes: &[u8], request_host: &str) -> bool {
    let Ok(header) = std::str::from_utf8(header_bytes) else {
        return false;
    };
    let Some(domain) = extract_cookie_domain(header) else {
        return true;
    };

    let effective_domain = domain.trim_start_matches('.').to_ascii_lowercase();
    if psl::domain(effective_domain.as_bytes()).is_none() {
        return false;
    }
    domain_matches(&request_host.to_ascii_lowercase(), &effective_domain)
}

pub(crate) fn extract_cookie_domain(header: &str) -> Option<&str> {
    header.split(';').skip(1).find_map(|attr| {
        let attr = attr.trim();
        if attr.len() > 7 && attr[..7].eq_ignore_ascii_case("domain=") {
            Some(attr[7..].trim())
        } else {
            None
        }
    })
}
