//! Host side of the cloak bridge: hands HTTP requests to the native engine
//! and keeps native failures from reaching the host as anything but values.
//!
//! # Overview
//! A `HostRequest` runs through four stages:
//! cookie jar resolution, `normalize::to_native_payload`, `Gateway::perform`
//! across the C ABI, and `decode::from_native`. Every stage fails with the
//! same `Error` value; the facade wraps it in a `RequestError` for callers.
//!
//! # Design
//! - The native engine is linked as a library but only reached through its
//!   `extern "C"` functions, the same surface a foreign host would use.
//! - Nothing is validated twice: the normalizer rejects bad input before the
//!   boundary, the native side only checks that the C structs are readable.
//! - `CookieJar` is the only state shared between requests. It is an opaque
//!   reference-counted handle; the store behind it lives and locks natively.

pub mod adapter;
pub mod config;
pub mod decode;
pub mod error;
pub mod gateway;
pub mod jar;
pub mod normalize;
pub mod request;
pub mod response;

pub use adapter::{attach, impersonate, Adapter, RequestError};
pub use config::Config;
pub use decode::from_native;
pub use error::{Details, Error, ErrorKind};
pub use gateway::Gateway;
pub use jar::CookieJar;
pub use normalize::{to_native_payload, NativePayload};
pub use request::{Body, BodyStream, HostRequest, IoData, OptionValue};
pub use response::HostResponse;
