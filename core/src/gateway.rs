//! The single crossing into native code.
//!
//! # Overview
//! `Gateway::perform` marshals a `NativePayload` into C structs, calls the
//! native entry point, reads the `FfiResult` envelope back into owned Rust
//! values and frees it through the paired release function.
//!
//! # Design
//! - The native side guards itself, but the call site is guarded again with
//!   `catch_unwind`: a panic unwinding out of the `extern "C-unwind"` entry
//!   point becomes `nif_panic` here instead of taking the host down.
//! - Envelope problems (null result, unknown tag, missing or non-JSON
//!   documents, null body with a length) are `invalid_native_response`.
//! - Native error tags are mapped onto `ErrorKind`; unknown tags become
//!   `native_error` and the original tag is kept in `details.native_type`.
//! - Entry points are plain function pointers so tests can substitute
//!   misbehaving fakes for the real engine.

use std::any::Any;
use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::ptr;

use cloak_ffi::{
    cloak_free_result, cloak_perform_request, FfiBody, FfiCookieJar, FfiHeader, FfiRequest,
    FfiResult, CLOAK_RESULT_ERROR, CLOAK_RESULT_OK,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Details, Error, ErrorKind, Result};
use crate::jar::CookieJar;
use crate::normalize::NativePayload;

pub type PerformFn =
    extern "C-unwind" fn(*const FfiRequest, *const FfiBody, *const FfiCookieJar) -> *mut FfiResult;
pub type FreeFn = extern "C" fn(*mut FfiResult);

#[derive(Debug, Clone, Copy)]
pub struct Gateway {
    perform: PerformFn,
    free: FreeFn,
}

impl Default for Gateway {
    fn default() -> Self {
        Self::native()
    }
}

/// C strings backing one `FfiRequest`; must outlive the call.
struct Marshalled {
    method: CString,
    url: CString,
    headers: Vec<(CString, CString)>,
    emulation: Option<CString>,
}

fn c_string(value: &str, field: impl FnOnce() -> String) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::invalid_request("request contains a NUL byte").detail("field", field()))
}

impl Marshalled {
    fn new(payload: &NativePayload) -> Result<Self> {
        let headers = payload
            .headers
            .iter()
            .enumerate()
            .map(|(i, (name, value))| {
                Ok((
                    c_string(name, || format!("headers[{i}].name"))?,
                    c_string(value, || format!("headers[{i}].value"))?,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Marshalled {
            method: c_string(&payload.method, || "method".to_string())?,
            url: c_string(&payload.url, || "url".to_string())?,
            headers,
            emulation: payload
                .emulation
                .as_deref()
                .map(|e| c_string(e, || "emulation".to_string()))
                .transpose()?,
        })
    }
}

#[derive(Deserialize)]
struct NativeFailure {
    #[serde(rename = "type")]
    kind: String,
    message: String,
    #[serde(default)]
    details: Value,
}

impl Gateway {
    pub const fn new(perform: PerformFn, free: FreeFn) -> Self {
        Gateway { perform, free }
    }

    /// The engine linked into this build.
    pub fn native() -> Self {
        Gateway::new(cloak_perform_request, cloak_free_result)
    }

    /// Execute one request natively, returning the metadata document and the
    /// raw body.
    pub fn perform(
        &self,
        payload: &NativePayload,
        body: Option<&[u8]>,
        jar: Option<&CookieJar>,
    ) -> Result<(Value, Vec<u8>)> {
        let strings = Marshalled::new(payload)?;
        let headers: Vec<FfiHeader> = strings
            .headers
            .iter()
            .map(|(name, value)| FfiHeader {
                name: name.as_ptr(),
                value: value.as_ptr(),
            })
            .collect();

        let request = FfiRequest {
            method: strings.method.as_ptr(),
            url: strings.url.as_ptr(),
            headers: headers.as_ptr(),
            headers_len: headers.len(),
            receive_timeout_ms: payload.receive_timeout_ms,
            emulation: strings.emulation.as_ref().map_or(ptr::null(), |e| e.as_ptr()),
            insecure_skip_verify: payload.insecure_skip_verify,
            has_max_body_size: payload.max_body_size_bytes.is_some(),
            max_body_size_bytes: payload.max_body_size_bytes.unwrap_or(0),
        };
        let ffi_body = body.map(|b| FfiBody {
            data: b.as_ptr(),
            len: b.len(),
        });
        let body_ptr = ffi_body.as_ref().map_or(ptr::null(), |b| b as *const FfiBody);
        let jar_ptr = jar.map_or(ptr::null(), CookieJar::as_ptr);

        let perform = self.perform;
        let raw = catch_unwind(AssertUnwindSafe(|| perform(&request, body_ptr, jar_ptr)))
            .map_err(|panic| {
                let message = panic_message(panic.as_ref());
                tracing::warn!(%message, "contained panic at native call site");
                Error::nif_panic(message).detail("layer", "host")
            })?;

        if raw.is_null() {
            return Err(Error::invalid_native_response("native call returned a null result"));
        }
        let outcome = unsafe { read_envelope(&*raw) };

        (self.free)(raw);
        outcome
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .or_else(|| payload.downcast_ref::<&str>().map(|s| s.to_string()))
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// # Safety
/// Non-null pointers in `result` must be valid for the lengths they claim.
unsafe fn read_envelope(result: &FfiResult) -> Result<(Value, Vec<u8>)> {
    match result.tag {
        CLOAK_RESULT_OK => {
            let meta = unsafe { read_json(result.meta, "meta") }?;
            let body = if result.body_len == 0 {
                Vec::new()
            } else if result.body.is_null() {
                return Err(Error::invalid_native_response("native body pointer is null")
                    .detail("body_len", result.body_len));
            } else {
                unsafe { std::slice::from_raw_parts(result.body, result.body_len) }.to_vec()
            };
            Ok((meta, body))
        }
        CLOAK_RESULT_ERROR => {
            let doc = unsafe { read_json(result.error, "error") }?;
            Err(classify(doc))
        }
        tag => Err(Error::invalid_native_response("unknown native result tag").detail("tag", tag)),
    }
}

unsafe fn read_json(ptr: *const c_char, field: &str) -> Result<Value> {
    let malformed = |message: &str| Error::invalid_native_response(message).detail("field", field);
    if ptr.is_null() {
        return Err(malformed("native result is missing a document"));
    }
    let text = unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| malformed("native document is not UTF-8"))?;
    serde_json::from_str(text).map_err(|_| malformed("native document is not valid JSON"))
}

/// Turn a native `{type, message, details}` document into an `Error`.
fn classify(doc: Value) -> Error {
    let failure: NativeFailure = match serde_json::from_value(doc) {
        Ok(failure) => failure,
        Err(_) => return Error::invalid_native_response("native error must have type and message"),
    };
    let details = match failure.details {
        Value::Object(map) => map,
        Value::Null => Details::new(),
        _ => return Error::invalid_native_response("native error details must be a map"),
    };

    let kind = ErrorKind::from_native_tag(&failure.kind);
    let error = Error::with_details(kind, failure.message, details);
    if kind == ErrorKind::NativeError {
        error.detail("native_type", failure.kind)
    } else {
        error
    }
}
