//! Misbehaving native entry points must never take the host down.
//!
//! # Design
//! Each fake below stands in for `cloak_perform_request` and breaks the
//! contract in one specific way: it panics, returns null, or returns an
//! envelope whose tag, documents or body pointer are wrong. Every case must
//! come back as an `Error`, and the process must keep serving real requests
//! afterwards.

use std::ffi::CString;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use cloak_core::gateway::PerformFn;
use cloak_core::{Adapter, ErrorKind, Gateway, HostRequest, HostResponse, OptionValue, RequestError};
use cloak_ffi::{
    cloak_free_result, FfiBody, FfiCookieJar, FfiRequest, FfiResult, CLOAK_RESULT_ERROR,
    CLOAK_RESULT_OK,
};

fn start_server() -> SocketAddr {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener).await
        })
        .unwrap();
    });

    addr
}

/// Allocate an envelope the way the native library does, so
/// `cloak_free_result` can release it.
fn envelope(
    tag: u32,
    meta: Option<&str>,
    body: Option<Vec<u8>>,
    body_len: usize,
    error: Option<&str>,
) -> *mut FfiResult {
    let into_c = |s: &str| CString::new(s).unwrap().into_raw();
    let body = body.map_or(std::ptr::null_mut(), |b| {
        Box::into_raw(b.into_boxed_slice()) as *mut u8
    });
    Box::into_raw(Box::new(FfiResult {
        tag,
        meta: meta.map_or(std::ptr::null_mut(), into_c),
        body,
        body_len,
        error: error.map_or(std::ptr::null_mut(), into_c),
    }))
}

fn success(meta: &str, body: Option<Vec<u8>>, body_len: usize) -> *mut FfiResult {
    envelope(CLOAK_RESULT_OK, Some(meta), body, body_len, None)
}

fn failure(error: &str) -> *mut FfiResult {
    envelope(CLOAK_RESULT_ERROR, None, None, 0, Some(error))
}

macro_rules! fake_native {
    ($name:ident, $body:expr) => {
        extern "C-unwind" fn $name(
            _: *const FfiRequest,
            _: *const FfiBody,
            _: *const FfiCookieJar,
        ) -> *mut FfiResult {
            $body
        }
    };
}

fake_native!(panics, panic!("segfault simulation"));
fake_native!(returns_null, std::ptr::null_mut());
fake_native!(unknown_tag, envelope(7, None, None, 0, None));
fake_native!(meta_not_json, success("{status: 200", None, 0));
fake_native!(meta_missing, envelope(CLOAK_RESULT_OK, None, None, 0, None));
fake_native!(body_pointer_null, success(r#"{"status":200,"headers":[]}"#, None, 5));
fake_native!(status_missing, success(r#"{"headers":[]}"#, Some(b"ok".to_vec()), 2));
fake_native!(headers_not_list, success(r#"{"status":200,"headers":"x"}"#, None, 0));
fake_native!(error_missing, envelope(CLOAK_RESULT_ERROR, None, None, 0, None));
fake_native!(error_without_message, failure(r#"{"type":"transport_error"}"#));
fake_native!(
    unknown_error_type,
    failure(r#"{"type":"tls_meltdown","message":"handshake","details":{}}"#)
);
fake_native!(
    native_panic,
    failure(r#"{"type":"nif_panic","message":"index out of bounds","details":{}}"#)
);
fake_native!(
    well_formed,
    success(r#"{"status":204,"headers":[["x-fake","1"]]}"#, Some(Vec::new()), 0)
);

static FREED: AtomicUsize = AtomicUsize::new(0);

extern "C" fn counting_free(result: *mut FfiResult) {
    FREED.fetch_add(1, Ordering::SeqCst);
    cloak_free_result(result);
}

fn no_options() -> [(&'static str, OptionValue); 0] {
    []
}

fn run_with(gateway: Gateway) -> Result<HostResponse, RequestError> {
    let adapter = Adapter::new().with_gateway(gateway);
    let request = adapter
        .attach(HostRequest::new("GET", "https://example.com/"), no_options())
        .unwrap();
    request.run()
}

fn kind_of(perform: PerformFn) -> ErrorKind {
    run_with(Gateway::new(perform, cloak_free_result)).unwrap_err().kind()
}

#[test]
fn native_panic_is_contained_and_process_survives() {
    let addr = start_server();

    let err = run_with(Gateway::new(panics, cloak_free_result)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NifPanic);
    assert_eq!(err.to_string(), "nif_panic: segfault simulation");

    // Same process, real engine: still works.
    let request = Adapter::new()
        .attach(HostRequest::new("GET", format!("http://{addr}/status/200")), no_options())
        .unwrap();
    assert_eq!(request.run().unwrap().status, 200);
}

#[test]
fn malformed_envelopes_are_invalid_native_response() {
    for perform in [
        returns_null as PerformFn,
        unknown_tag,
        meta_not_json,
        meta_missing,
        body_pointer_null,
        error_missing,
        error_without_message,
    ] {
        assert_eq!(kind_of(perform), ErrorKind::InvalidNativeResponse);
    }
}

#[test]
fn malformed_metadata_is_invalid_native_response() {
    assert_eq!(kind_of(status_missing), ErrorKind::InvalidNativeResponse);
    assert_eq!(kind_of(headers_not_list), ErrorKind::InvalidNativeResponse);
}

#[test]
fn native_error_tags_are_classified() {
    let err = run_with(Gateway::new(unknown_error_type, cloak_free_result)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NativeError);
    assert_eq!(err.error().details["native_type"], "tls_meltdown");

    let err = run_with(Gateway::new(native_panic, cloak_free_result)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NifPanic);
    assert_eq!(err.error().message, "index out of bounds");
}

#[test]
fn every_envelope_is_freed_once() {
    let before = FREED.load(Ordering::SeqCst);
    run_with(Gateway::new(well_formed, counting_free)).unwrap();
    run_with(Gateway::new(unknown_tag, counting_free)).unwrap_err();
    run_with(Gateway::new(native_panic, counting_free)).unwrap_err();
    assert_eq!(FREED.load(Ordering::SeqCst) - before, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn async_path_contains_native_panics() {
    let adapter = Adapter::new().with_gateway(Gateway::new(panics, cloak_free_result));
    let request = adapter
        .attach(HostRequest::new("GET", "https://example.com/"), no_options())
        .unwrap();

    let err = adapter.run_async(request).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NifPanic);
}
