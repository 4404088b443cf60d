//! Blocking HTTP execution behind `cloak_perform_request`.
//!
//! # Design
//! Agents are cached per `(emulation, insecure_skip_verify, timeout)` so that
//! connection pooling and keep-alive survive across calls. Non-2xx statuses
//! are ordinary responses; only transport failures are errors.
//!
//! Redirects are followed here rather than inside ureq: every hop reads
//! and writes the cookie jar against its own URL, so a `set-cookie` on a
//! 3xx reaches the jar and the next hop carries it.

use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};
use std::time::Duration;

use serde_json::json;
use ureq::http::{Method, Request, Response};
use ureq::tls::TlsConfig;
use ureq::{Agent, Body};
use url::Url;

use crate::cookie_jar::CookieJarStore;
use crate::error::{kinds, NativeError};
use crate::profile;
use crate::request::NativeRequest;
use crate::response::NativeResponseMeta;

/// Cache key: (emulation profile, insecure_skip_verify, receive timeout ms).
type AgentKey = (Option<String>, bool, u64);

static AGENT_CACHE: LazyLock<RwLock<HashMap<AgentKey, Agent>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

const MAX_REDIRECT_HOPS: usize = 10;

/// Headers describing a request body, dropped when a redirect turns it into a GET.
const BODY_HEADERS: [&str; 4] = [
    "content-type",
    "content-length",
    "content-encoding",
    "transfer-encoding",
];

/// Caller credentials that never follow a redirect to another origin.
const CREDENTIAL_HEADERS: [&str; 3] = ["authorization", "proxy-authorization", "cookie"];

fn get_or_build_agent(request: &NativeRequest) -> Agent {
    let key = (
        request.emulation.clone(),
        request.insecure_skip_verify,
        request.receive_timeout_ms,
    );

    {
        let cache = AGENT_CACHE.read().unwrap_or_else(|e| e.into_inner());
        if let Some(agent) = cache.get(&key) {
            return agent.clone();
        }
    }

    let mut cache = AGENT_CACHE.write().unwrap_or_else(|e| e.into_inner());
    if let Some(agent) = cache.get(&key) {
        return agent.clone();
    }

    let mut config = Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .max_redirects(0)
        .max_redirects_will_error(false)
        .timeout_global(Some(Duration::from_millis(request.receive_timeout_ms)));
    if request.insecure_skip_verify {
        config = config.tls_config(TlsConfig::builder().disable_verification(true).build());
    }
    let agent = config.build().new_agent();

    tracing::debug!(
        emulation = ?request.emulation,
        insecure_skip_verify = request.insecure_skip_verify,
        receive_timeout_ms = request.receive_timeout_ms,
        "built HTTP agent"
    );
    cache.insert(key, agent.clone());
    agent
}

/// One request on the way to the final response.
struct Hop {
    method: Method,
    url: Url,
    headers: Vec<(String, String)>,
    body: Option<Vec<u8>>,
}

impl Hop {
    fn send(
        &self,
        agent: &Agent,
        cookie_jar: Option<&CookieJarStore>,
    ) -> Result<Response<Body>, NativeError> {
        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(self.url.as_str());
        for (name, value) in &self.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookie) = cookie_jar.and_then(|jar| jar.cookie_header(&self.url)) {
            builder = builder.header("cookie", cookie);
        }

        let sent = match &self.body {
            Some(bytes) => builder.body(bytes.as_slice()).map(|r| agent.run(r)),
            None => builder.body(()).map(|r| agent.run(r)),
        };
        sent.map_err(|reason| {
            NativeError::invalid_request(
                "invalid request parts",
                json!({"reason": reason.to_string()}),
            )
        })?
        .map_err(|reason| NativeError::transport("request execution failed", &reason))
    }

    /// The request to send to `next` after a `status` redirect.
    fn redirect(self, status: u16, next: Url) -> Hop {
        let Hop {
            mut method,
            url,
            mut headers,
            mut body,
        } = self;

        let to_get = match status {
            303 => method != Method::HEAD,
            301 | 302 => method == Method::POST,
            _ => false,
        };
        if to_get {
            method = Method::GET;
            body = None;
            headers.retain(|(name, _)| !BODY_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)));
        }
        if next.origin() != url.origin() {
            headers.retain(|(name, _)| {
                !CREDENTIAL_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h))
            });
        }

        Hop {
            method,
            url: next,
            headers,
            body,
        }
    }
}

/// Where a redirect response points, resolved against the URL that sent it.
fn redirect_target(response: &Response<Body>, current: &Url) -> Option<Url> {
    if !matches!(response.status().as_u16(), 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let location = response.headers().get("location")?.to_str().ok()?;
    current.join(location).ok()
}

fn store_cookies(jar: &CookieJarStore, url: &Url, response: &Response<Body>) {
    let set_cookies = response
        .headers()
        .get_all("set-cookie")
        .iter()
        .map(|v| v.as_bytes());
    let stored = jar.store(url, set_cookies);
    if stored > 0 {
        tracing::debug!(stored, url = %url, "stored cookies");
    }
}

pub fn execute_request(
    request: NativeRequest,
    body: Option<Vec<u8>>,
    cookie_jar: Option<&CookieJarStore>,
) -> Result<(NativeResponseMeta, Vec<u8>), NativeError> {
    let profile = match request.emulation.as_deref() {
        Some(name) => Some(profile::lookup(name).ok_or_else(|| {
            NativeError::invalid_request("unknown emulation profile", json!({"value": name}))
        })?),
        None => None,
    };

    let method = Method::from_bytes(request.method.as_bytes()).map_err(|reason| {
        NativeError::invalid_request(
            "invalid HTTP method",
            json!({"reason": reason.to_string(), "value": request.method}),
        )
    })?;

    let request_url = Url::parse(&request.url).map_err(|reason| {
        NativeError::invalid_request(
            "invalid url",
            json!({"reason": reason.to_string(), "value": request.url}),
        )
    })?;

    let agent = get_or_build_agent(&request);

    let mut hop = Hop {
        method,
        url: request_url,
        headers: profile::apply(profile, &request.headers),
        body,
    };
    let mut redirects = 0;
    let mut response = loop {
        let response = hop.send(&agent, cookie_jar)?;
        if let Some(jar) = cookie_jar {
            store_cookies(jar, &hop.url, &response);
        }

        let status = response.status().as_u16();
        let Some(next) = redirect_target(&response, &hop.url) else {
            break response;
        };
        if redirects == MAX_REDIRECT_HOPS {
            return Err(NativeError::new(
                kinds::TRANSPORT_ERROR,
                "too many redirects",
                json!({"limit": MAX_REDIRECT_HOPS, "url": next.as_str()}),
            ));
        }
        redirects += 1;
        tracing::debug!(status, from = %hop.url, to = %next, "following redirect");
        hop = hop.redirect(status, next);
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect::<Vec<_>>();

    let limit = request.max_body_size_bytes.unwrap_or(u64::MAX);
    let body_bytes = response
        .body_mut()
        .with_config()
        .limit(limit)
        .read_to_vec()
        .map_err(|reason| match reason {
            ureq::Error::BodyExceedsLimit(_) => NativeError::invalid_request(
                "response body exceeds max_body_size",
                json!({"limit": limit}),
            ),
            other => NativeError::transport("failed to read response body", &other),
        })?;

    Ok((
        NativeResponseMeta {
            status,
            url: hop.url.to_string(),
            headers,
        },
        body_bytes,
    ))
}
