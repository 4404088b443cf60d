use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{AppendHeaders, IntoResponse, Redirect},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use uuid::Uuid;

/// What the server saw of a request, returned by `/echo`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    /// All values of header `name`, in arrival order.
    pub fn header(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CookieEcho {
    pub cookie: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/bytes/{len}", get(bytes))
        .route("/delay/{ms}", get(delay))
        .route("/redirect", get(redirect))
        .route("/headers/duplicate", get(duplicate_headers))
        .route("/cookies", get(cookies))
        .route("/cookies/set", get(set_cookies))
        .route("/cookies/redirect", get(set_cookies_and_redirect))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let reply = Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        headers: headers
            .iter()
            .map(|(n, v)| (n.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect(),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    (
        AppendHeaders([("x-request-id", Uuid::new_v4().to_string())]),
        Json(reply),
    )
}

async fn status(Path(code): Path<u16>) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST)
}

async fn bytes(Path(len): Path<usize>) -> Vec<u8> {
    vec![b'x'; len]
}

async fn delay(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "ok"
}

async fn redirect() -> Redirect {
    Redirect::to("/echo")
}

async fn duplicate_headers() -> impl IntoResponse {
    (
        AppendHeaders([("x-dup", "a"), ("x-dup", "b"), ("content-type", "text/plain")]),
        "dup",
    )
}

async fn cookies(headers: HeaderMap) -> Json<CookieEcho> {
    let cookie = headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    Json(CookieEcho { cookie })
}

/// Sets one host-only cookie per query pair, e.g. `/cookies/set?a=1&b=2`.
async fn set_cookies(Query(pairs): Query<BTreeMap<String, String>>) -> impl IntoResponse {
    (AppendHeaders(cookie_headers(&pairs)), StatusCode::OK)
}

/// Like `/cookies/set`, but answers with a redirect to `/cookies`.
async fn set_cookies_and_redirect(
    Query(pairs): Query<BTreeMap<String, String>>,
) -> impl IntoResponse {
    (AppendHeaders(cookie_headers(&pairs)), Redirect::to("/cookies"))
}

fn cookie_headers(pairs: &BTreeMap<String, String>) -> Vec<(header::HeaderName, String)> {
    pairs
        .iter()
        .map(|(name, value)| (header::SET_COOKIE, format!("{name}={value}; Path=/")))
        .collect()
}
