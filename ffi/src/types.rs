//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Inbound types (`FfiRequest`, `FfiHeader`, `FfiBody`) are owned by the
//! caller and only borrowed for the duration of one call. The outbound
//! `FfiResult` envelope is allocated here and must be released with
//! `cloak_free_result`.
//!
//! Response metadata and error values travel as JSON C strings because the
//! error `details` object is open-ended. Body bytes never go through JSON:
//! they are handed over as a raw buffer next to the metadata.

use std::ffi::CString;
use std::os::raw::c_char;

use crate::cookie_jar::CookieJarStore;
use crate::error::NativeError;
use crate::response::NativeResponseMeta;

/// Tag value of a successful `FfiResult`.
pub const CLOAK_RESULT_OK: u32 = 0;
/// Tag value of a failed `FfiResult`.
pub const CLOAK_RESULT_ERROR: u32 = 1;

// ---------------------------------------------------------------------------
// Request input (caller-provided, borrowed)
// ---------------------------------------------------------------------------

/// A single request header as a pair of NUL-terminated UTF-8 strings.
#[repr(C)]
pub struct FfiHeader {
    pub name: *const c_char,
    pub value: *const c_char,
}

/// Validated request description handed to `cloak_perform_request`.
///
/// `emulation` may be null (no impersonation). `max_body_size_bytes` is only
/// read when `has_max_body_size` is true; otherwise the response size is
/// unlimited.
#[repr(C)]
pub struct FfiRequest {
    pub method: *const c_char,
    pub url: *const c_char,
    pub headers: *const FfiHeader,
    pub headers_len: usize,
    pub receive_timeout_ms: u64,
    pub emulation: *const c_char,
    pub insecure_skip_verify: bool,
    pub has_max_body_size: bool,
    pub max_body_size_bytes: u64,
}

/// Raw request body. A null `FfiBody` pointer means "no body"; a non-null
/// one with `len == 0` is an empty body.
#[repr(C)]
pub struct FfiBody {
    pub data: *const u8,
    pub len: usize,
}

/// Opaque cookie jar handle. C callers only ever see pointers to this type.
///
/// The pointer is an `Arc<CookieJarStore>` turned into a raw pointer; it is
/// reference counted through `cloak_cookie_jar_retain` and
/// `cloak_cookie_jar_release`.
pub struct FfiCookieJar {
    pub(crate) store: CookieJarStore,
}

// ---------------------------------------------------------------------------
// Result envelope
// ---------------------------------------------------------------------------

/// Result envelope of `cloak_perform_request`.
///
/// On success `tag` is `CLOAK_RESULT_OK`, `meta` is a JSON document
/// `{status, url, headers}`, and `body`/`body_len` hold the response bytes.
/// On failure `tag` is `CLOAK_RESULT_ERROR` and `error` is a JSON document
/// `{type, message, details}`; every other pointer is null.
#[repr(C)]
pub struct FfiResult {
    pub tag: u32,
    pub meta: *mut c_char,
    pub body: *mut u8,
    pub body_len: usize,
    pub error: *mut c_char,
}

impl FfiResult {
    pub(crate) fn from_result(
        result: Result<(NativeResponseMeta, Vec<u8>), NativeError>,
    ) -> *mut Self {
        match result {
            Ok((meta, body)) => match serde_json::to_string(&meta) {
                Ok(json) => Self::ok(json, body),
                Err(reason) => Self::error(&NativeError::new(
                    crate::error::kinds::RUNTIME_ERROR,
                    "failed to serialize response metadata",
                    serde_json::json!({"reason": reason.to_string()}),
                )),
            },
            Err(native_error) => Self::error(&native_error),
        }
    }

    fn ok(meta_json: String, body: Vec<u8>) -> *mut Self {
        let meta = match CString::new(meta_json) {
            Ok(meta) => meta.into_raw(),
            Err(_) => {
                return Self::error(&NativeError::new(
                    crate::error::kinds::RUNTIME_ERROR,
                    "response metadata contains a NUL byte",
                    serde_json::json!({}),
                ))
            }
        };
        let body_len = body.len();
        let body = Box::into_raw(body.into_boxed_slice()) as *mut u8;
        Box::into_raw(Box::new(FfiResult {
            tag: CLOAK_RESULT_OK,
            meta,
            body,
            body_len,
            error: std::ptr::null_mut(),
        }))
    }

    pub(crate) fn error(native_error: &NativeError) -> *mut Self {
        Self::error_json(native_error.encode())
    }

    /// Build an error envelope for a panic that escaped the inner guard.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        let doc = serde_json::json!({
            "type": crate::error::kinds::NIF_PANIC,
            "message": msg,
            "details": {}
        });
        Self::error_json(doc.to_string())
    }

    fn error_json(json: String) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            tag: CLOAK_RESULT_ERROR,
            meta: std::ptr::null_mut(),
            body: std::ptr::null_mut(),
            body_len: 0,
            error: CString::new(json).unwrap_or_default().into_raw(),
        }))
    }
}

/// Release every allocation owned by an `FfiResult`, including the struct.
///
/// # Safety
/// `result` must be null or a pointer returned by `FfiResult::from_result`,
/// `FfiResult::error` or `FfiResult::panic` that has not been freed yet.
pub(crate) unsafe fn free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let result = unsafe { Box::from_raw(result) };
    if !result.meta.is_null() {
        drop(unsafe { CString::from_raw(result.meta) });
    }
    if !result.error.is_null() {
        drop(unsafe { CString::from_raw(result.error) });
    }
    if !result.body.is_null() {
        let slice = std::ptr::slice_from_raw_parts_mut(result.body, result.body_len);
        drop(unsafe { Box::from_raw(slice) });
    }
}
