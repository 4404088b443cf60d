//! Native view of an inbound request.
//!
//! `NativeRequest` is the owned copy of an `FfiRequest`. Decoding only checks
//! that the C structs are readable (non-null, UTF-8); semantic validation
//! already happened on the host side.

use std::ffi::CStr;
use std::os::raw::c_char;

use crate::error::NativeError;
use crate::types::{FfiBody, FfiHeader, FfiRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub receive_timeout_ms: u64,
    pub emulation: Option<String>,
    pub insecure_skip_verify: bool,
    pub max_body_size_bytes: Option<u64>,
}

fn read_str(ptr: *const c_char, field: &str) -> Result<String, NativeError> {
    if ptr.is_null() {
        return Err(NativeError::decode(field));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(str::to_string)
        .map_err(|_| NativeError::decode(field))
}

impl NativeRequest {
    /// Copy a request out of its C representation.
    ///
    /// # Safety
    /// `request` must be null or point to a valid `FfiRequest` whose string
    /// pointers are null or NUL-terminated, and whose `headers` array holds
    /// at least `headers_len` entries.
    pub unsafe fn decode(request: *const FfiRequest) -> Result<Self, NativeError> {
        if request.is_null() {
            return Err(NativeError::decode("request"));
        }
        let raw = unsafe { &*request };

        let method = read_str(raw.method, "method")?;
        let url = read_str(raw.url, "url")?;

        let headers = if raw.headers_len == 0 {
            Vec::new()
        } else if raw.headers.is_null() {
            return Err(NativeError::decode("headers"));
        } else {
            let slice: &[FfiHeader] =
                unsafe { std::slice::from_raw_parts(raw.headers, raw.headers_len) };
            slice
                .iter()
                .enumerate()
                .map(|(i, h)| {
                    Ok((
                        read_str(h.name, &format!("headers[{i}].name"))?,
                        read_str(h.value, &format!("headers[{i}].value"))?,
                    ))
                })
                .collect::<Result<Vec<_>, NativeError>>()?
        };

        let emulation = if raw.emulation.is_null() {
            None
        } else {
            Some(read_str(raw.emulation, "emulation")?)
        };

        if raw.receive_timeout_ms == 0 {
            return Err(NativeError::decode("receive_timeout_ms"));
        }

        Ok(NativeRequest {
            method,
            url,
            headers,
            receive_timeout_ms: raw.receive_timeout_ms,
            emulation,
            insecure_skip_verify: raw.insecure_skip_verify,
            max_body_size_bytes: raw.has_max_body_size.then_some(raw.max_body_size_bytes),
        })
    }
}

/// Copy the request body out of its C representation. Null means no body.
///
/// # Safety
/// `body` must be null or point to a valid `FfiBody` whose `data` is null or
/// readable for `len` bytes.
pub unsafe fn decode_body(body: *const FfiBody) -> Result<Option<Vec<u8>>, NativeError> {
    if body.is_null() {
        return Ok(None);
    }
    let raw = unsafe { &*body };
    if raw.len == 0 {
        return Ok(Some(Vec::new()));
    }
    if raw.data.is_null() {
        return Err(NativeError::decode("body"));
    }
    Ok(Some(unsafe { std::slice::from_raw_parts(raw.data, raw.len) }.to_vec()))
}
