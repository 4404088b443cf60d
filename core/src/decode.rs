//! Native metadata to `HostResponse`.
//!
//! The metadata document is checked field by field; any deviation from
//! `{status: positive integer, headers: [[string, string], ..], url?: string}`
//! is an `invalid_native_response`, never a panic.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::response::{HostResponse, URL_KEY};

pub fn from_native(metadata: &Value, body: Vec<u8>) -> Result<HostResponse> {
    let fields = metadata
        .as_object()
        .ok_or_else(|| Error::invalid_native_response("native metadata must be a map"))?;

    let status = fields
        .get("status")
        .and_then(Value::as_u64)
        .filter(|status| *status > 0)
        .and_then(|status| u16::try_from(status).ok())
        .ok_or_else(|| {
            Error::invalid_native_response("status must be a positive integer")
                .detail("status", fields.get("status").cloned().unwrap_or(Value::Null))
        })?;

    let headers = fields
        .get("headers")
        .and_then(Value::as_array)
        .and_then(|items| items.iter().map(header_pair).collect::<Option<Vec<_>>>())
        .ok_or_else(|| Error::invalid_native_response("headers must be a list of string pairs"))?;

    let mut private = BTreeMap::new();
    match fields.get("url") {
        None | Some(Value::Null) => {}
        Some(Value::String(url)) => {
            private.insert(URL_KEY.to_string(), url.clone());
        }
        Some(_) => return Err(Error::invalid_native_response("url must be a string")),
    }

    Ok(HostResponse {
        status,
        headers: HostResponse::group_headers(headers),
        body: Bytes::from(body),
        private,
    })
}

fn header_pair(item: &Value) -> Option<(String, String)> {
    match item.as_array()?.as_slice() {
        [Value::String(name), Value::String(value)] => Some((name.clone(), value.clone())),
        _ => None,
    }
}
