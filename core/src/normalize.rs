//! Validation of a `HostRequest` into the payload the native engine accepts.
//!
//! # Design
//! Checks run in a fixed order and the first failure wins:
//! streaming, url, headers, `max_body_size`, body, `impersonate`,
//! `receive_timeout`, `insecure_skip_verify`. The payload is only assembled
//! once every check has passed, so nothing half-validated reaches the
//! boundary.

use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::request::{Body, HostRequest, IoData, OptionValue};

/// Value of `max_body_size` that disables the limit.
pub const UNLIMITED: &str = "infinity";

/// Fully validated request, ready to cross into native code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NativePayload {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub receive_timeout_ms: u64,
    pub emulation: Option<String>,
    pub insecure_skip_verify: bool,
    /// `None` when unlimited.
    pub max_body_size_bytes: Option<u64>,
}

/// Validate `request` and split it into a payload and a detached body.
pub fn to_native_payload(
    request: &HostRequest,
    config: &Config,
) -> Result<(NativePayload, Option<Bytes>)> {
    reject_streaming(request)?;
    let url = canonical_url(&request.url)?;
    let headers = flatten_headers(&request.headers);
    let max_body_size_bytes = resolve_max_body_size(request.option("max_body_size"), config)?;

    let body = resolve_body(&request.body)?;
    if let (Some(body), Some(limit)) = (&body, max_body_size_bytes) {
        if body.len() as u64 > limit {
            return Err(Error::invalid_request("request body exceeds max_body_size")
                .detail("size", body.len())
                .detail("limit", limit));
        }
    }

    let emulation = resolve_impersonate(request.option("impersonate"))?;
    let receive_timeout_ms = resolve_receive_timeout(request.option("receive_timeout"), config)?;
    let insecure_skip_verify = resolve_insecure(request.option("insecure_skip_verify"))?;

    let payload = NativePayload {
        method: request.method.to_ascii_uppercase(),
        url,
        headers,
        receive_timeout_ms,
        emulation,
        insecure_skip_verify,
        max_body_size_bytes,
    };
    Ok((payload, body))
}

fn reject_streaming(request: &HostRequest) -> Result<()> {
    if matches!(request.body, Body::Stream(_)) {
        return Err(Error::invalid_request("streaming request bodies are not supported"));
    }
    match request.option("into") {
        None | Some(OptionValue::Nil) => Ok(()),
        Some(_) => Err(Error::invalid_request("streaming response bodies are not supported")),
    }
}

fn canonical_url(raw: &str) -> Result<String> {
    let invalid = || {
        Error::invalid_request("url must be an absolute http(s) URL").detail("url", raw)
    };

    let url = Url::parse(raw).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(invalid());
    }

    // The parser adds a root path; keep the caller's form when it had none.
    let mut serialized = url.to_string();
    if url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && !raw.trim_end().ends_with('/')
    {
        serialized.pop();
    }
    Ok(serialized)
}

/// Expand each `(name, [v1, v2, ..])` entry into repeated pairs.
pub fn flatten_headers(headers: &[(String, Vec<String>)]) -> Vec<(String, String)> {
    headers
        .iter()
        .flat_map(|(name, values)| values.iter().map(move |value| (name.clone(), value.clone())))
        .collect()
}

fn resolve_max_body_size(value: Option<&OptionValue>, config: &Config) -> Result<Option<u64>> {
    match value {
        None => Ok(Some(config.max_body_size)),
        Some(OptionValue::Atom(tag)) if tag == UNLIMITED => Ok(None),
        Some(OptionValue::Int(n)) if *n > 0 => Ok(Some(*n as u64)),
        Some(other) => Err(
            Error::invalid_request("max_body_size must be a positive integer or infinity")
                .detail("type", other.type_name()),
        ),
    }
}

fn resolve_body(body: &Body) -> Result<Option<Bytes>> {
    match body {
        Body::None => Ok(None),
        Body::Bytes(bytes) => Ok(Some(bytes.clone())),
        Body::IoData(chunks) => {
            let mut out = Vec::new();
            for chunk in chunks {
                flatten_iodata(chunk, &mut out)?;
            }
            Ok(Some(Bytes::from(out)))
        }
        Body::Stream(_) => Err(Error::invalid_request(
            "streaming request bodies are not supported",
        )),
    }
}

fn flatten_iodata(data: &IoData, out: &mut Vec<u8>) -> Result<()> {
    match data {
        IoData::Bytes(bytes) => out.extend_from_slice(bytes),
        IoData::Byte(b) => {
            let byte = u8::try_from(*b).map_err(|_| {
                Error::invalid_request("body must be binary or iodata").detail("byte", *b)
            })?;
            out.push(byte);
        }
        IoData::List(items) => {
            for item in items {
                flatten_iodata(item, out)?;
            }
        }
    }
    Ok(())
}

fn resolve_impersonate(value: Option<&OptionValue>) -> Result<Option<String>> {
    match value {
        None | Some(OptionValue::Nil) => Ok(None),
        Some(OptionValue::Atom(profile)) => Ok(Some(profile.clone())),
        Some(other) => Err(Error::invalid_request("impersonate must be a profile atom")
            .detail("type", other.type_name())),
    }
}

fn resolve_receive_timeout(value: Option<&OptionValue>, config: &Config) -> Result<u64> {
    match value {
        None => Ok(config.receive_timeout_ms),
        Some(OptionValue::Int(ms)) if *ms > 0 => Ok(*ms as u64),
        Some(other) => Err(Error::invalid_request("receive_timeout must be a positive integer")
            .detail("type", other.type_name())),
    }
}

fn resolve_insecure(value: Option<&OptionValue>) -> Result<bool> {
    match value {
        None => Ok(false),
        Some(OptionValue::Bool(flag)) => Ok(*flag),
        Some(other) => Err(Error::invalid_request("insecure_skip_verify must be a boolean")
            .detail("type", other.type_name())),
    }
}
