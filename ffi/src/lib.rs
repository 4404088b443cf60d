//! Native HTTP engine exposed through a C ABI.
//!
//! # Overview
//! A host hands over a validated request (`FfiRequest`), an optional raw body
//! and an optional cookie jar handle; the engine performs the exchange and
//! returns an `FfiResult` envelope holding either response metadata plus the
//! raw body, or a structured error.
//!
//! # Design
//! - `cloak_perform_request` never lets a panic escape. The work runs under
//!   `run_with_panic_protection`, which turns a panic into a `nif_panic`
//!   error carrying the panic message; envelope construction sits under a
//!   second `catch_unwind`.
//! - The function is declared `extern "C-unwind"` so a host written in Rust
//!   can add its own guard around the call site.
//! - The caller owns every returned pointer and releases it with the matching
//!   `cloak_free_*` / `cloak_cookie_jar_release` function.
//! - Cookie jars are `Arc`s handed out as raw pointers. The store inside is
//!   internally synchronized; callers never lock anything.

pub mod cookie_jar;
pub mod engine;
pub mod error;
pub mod profile;
pub mod request;
pub mod response;
pub mod types;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use serde_json::json;

use cookie_jar::CookieJarStore;
use error::NativeError;
use request::NativeRequest;

pub use types::*;

pub(crate) fn run_with_panic_protection<T, F>(f: F) -> Result<T, NativeError>
where
    F: FnOnce() -> Result<T, NativeError>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_info) => {
            let message = panic_info
                .downcast_ref::<String>()
                .map(|s| s.as_str())
                .or_else(|| panic_info.downcast_ref::<&str>().copied())
                .unwrap_or("unknown panic");
            tracing::warn!(message, "contained panic in native request");
            Err(NativeError::new(error::kinds::NIF_PANIC, message, json!({})))
        }
    }
}

// ---------------------------------------------------------------------------
// Request execution
// ---------------------------------------------------------------------------

/// Perform one HTTP exchange.
///
/// `body` and `cookie_jar` may be null. Always returns a non-null envelope
/// that must be released with `cloak_free_result`.
#[unsafe(no_mangle)]
pub extern "C-unwind" fn cloak_perform_request(
    request: *const FfiRequest,
    body: *const FfiBody,
    cookie_jar: *const FfiCookieJar,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        let result = run_with_panic_protection(|| {
            let request = unsafe { NativeRequest::decode(request) }?;
            let body = unsafe { crate::request::decode_body(body) }?;
            let jar = if cookie_jar.is_null() {
                None
            } else {
                Some(unsafe { &(*cookie_jar).store })
            };
            engine::execute_request(request, body, jar)
        });
        FfiResult::from_result(result)
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in cloak_perform_request"))
}

/// Free an `FfiResult` returned by `cloak_perform_request`. Safe to call
/// with null.
#[unsafe(no_mangle)]
pub extern "C" fn cloak_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| unsafe { types::free_result(result) }));
}

// ---------------------------------------------------------------------------
// Cookie jar lifecycle
// ---------------------------------------------------------------------------

/// Create a new empty cookie jar with a reference count of one.
///
/// Never returns null. Release with `cloak_cookie_jar_release`.
#[unsafe(no_mangle)]
pub extern "C" fn cloak_cookie_jar_new() -> *const FfiCookieJar {
    Arc::into_raw(Arc::new(FfiCookieJar {
        store: CookieJarStore::new(),
    }))
}

/// Add a reference to `jar`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cloak_cookie_jar_retain(jar: *const FfiCookieJar) {
    if !jar.is_null() {
        unsafe { Arc::increment_strong_count(jar) };
    }
}

/// Drop a reference to `jar`; the store is freed with the last one. Safe to
/// call with null.
#[unsafe(no_mangle)]
pub extern "C" fn cloak_cookie_jar_release(jar: *const FfiCookieJar) {
    if !jar.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Arc::from_raw(jar) });
        }));
    }
}

/// Number of live cookies in `jar`, or 0 for null.
#[unsafe(no_mangle)]
pub extern "C" fn cloak_cookie_jar_len(jar: *const FfiCookieJar) -> usize {
    if jar.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*jar }.store.len())).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
