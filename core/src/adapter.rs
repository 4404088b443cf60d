//! Execution facade: jar, normalizer, gateway, decoder.
//!
//! # Design
//! `Adapter` holds no per-request state: a `Config` with defaults and the
//! `Gateway` to call. `attach` and `impersonate` only rewrite the request
//! value; the native engine is reached when the request runs. The blocking
//! call can be moved onto tokio's blocking pool with `run_async` so a slow
//! transport never holds up async workers.

use tokio::task::JoinError;

use crate::config::Config;
use crate::decode::from_native;
use crate::error::{Error, ErrorKind};
use crate::gateway::{panic_message, Gateway};
use crate::jar::CookieJar;
use crate::normalize::to_native_payload;
use crate::request::{HostRequest, OptionValue};
use crate::response::HostResponse;

/// Option names the adapter registers on `attach`.
pub const ADAPTER_OPTIONS: [&str; 4] = [
    "impersonate",
    "insecure_skip_verify",
    "max_body_size",
    "cookie_jar",
];

/// Host-visible failure: the formatted message plus the structured value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    message: String,
    error: Error,
}

impl RequestError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind
    }

    pub fn error(&self) -> &Error {
        &self.error
    }

    pub fn into_error(self) -> Error {
        self.error
    }
}

impl From<Error> for RequestError {
    fn from(error: Error) -> Self {
        RequestError {
            message: error.format(),
            error,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Adapter {
    config: Config,
    gateway: Gateway,
}

impl Adapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Adapter {
            config,
            gateway: Gateway::native(),
        }
    }

    pub fn with_gateway(mut self, gateway: Gateway) -> Self {
        self.gateway = gateway;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register the adapter options, merge `options` and install this adapter
    /// as the request's executor.
    pub fn attach<K, I>(
        &self,
        request: HostRequest,
        options: I,
    ) -> Result<HostRequest, RequestError>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, OptionValue)>,
    {
        let request = request.register_options(ADAPTER_OPTIONS).merge_options(options)?;
        Ok(request.set_adapter(self.clone()))
    }

    /// Attach with `impersonate` set to `profile`.
    pub fn impersonate(
        &self,
        request: HostRequest,
        profile: &str,
    ) -> Result<HostRequest, RequestError> {
        self.attach(request, [("impersonate", OptionValue::atom(profile))])
    }

    /// Run the whole pipeline on the calling thread.
    pub fn execute(&self, request: &HostRequest) -> Result<HostResponse, Error> {
        let jar = CookieJar::resolve(request.option("cookie_jar"))?;
        let (payload, body) = to_native_payload(request, &self.config)?;
        tracing::debug!(
            method = %payload.method,
            url = %payload.url,
            profile = payload.emulation.as_deref().unwrap_or("none"),
            jar = ?jar.as_ref().map(CookieJar::id),
            "executing native request"
        );

        let (metadata, body) = self.gateway.perform(&payload, body.as_deref(), jar.as_ref())?;
        from_native(&metadata, body)
    }

    pub fn run(&self, request: HostRequest) -> Result<HostResponse, RequestError> {
        self.execute(&request).map_err(|error| {
            tracing::debug!(kind = %error.kind, message = %error.message, "native request failed");
            RequestError::from(error)
        })
    }

    /// `run` on tokio's blocking pool.
    pub async fn run_async(&self, request: HostRequest) -> Result<HostResponse, RequestError> {
        let adapter = self.clone();
        tokio::task::spawn_blocking(move || adapter.run(request))
            .await
            .unwrap_or_else(|join_error| Err(join_failure(join_error).into()))
    }
}

fn join_failure(join_error: JoinError) -> Error {
    if join_error.is_panic() {
        let message = panic_message(join_error.into_panic().as_ref());
        tracing::warn!(%message, "contained panic in blocking task");
        Error::nif_panic(message).detail("layer", "task")
    } else {
        Error::new(ErrorKind::RuntimeError, "native call was cancelled")
    }
}

/// `Adapter::attach` with default configuration.
pub fn attach<K, I>(request: HostRequest, options: I) -> Result<HostRequest, RequestError>
where
    K: Into<String>,
    I: IntoIterator<Item = (K, OptionValue)>,
{
    Adapter::new().attach(request, options)
}

/// `Adapter::impersonate` with default configuration.
pub fn impersonate(request: HostRequest, profile: &str) -> Result<HostRequest, RequestError> {
    Adapter::new().impersonate(request, profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cloak_ffi::{FfiBody, FfiCookieJar, FfiRequest, FfiResult};

    extern "C-unwind" fn unreachable_native(
        _: *const FfiRequest,
        _: *const FfiBody,
        _: *const FfiCookieJar,
    ) -> *mut FfiResult {
        panic!("native engine must not be called")
    }

    fn guarded() -> Adapter {
        Adapter::new().with_gateway(Gateway::new(unreachable_native, cloak_ffi::cloak_free_result))
    }

    #[test]
    fn attach_registers_and_merges_options() {
        let request = attach(
            HostRequest::new("GET", "https://example.com"),
            [("insecure_skip_verify", OptionValue::Bool(true))],
        )
        .unwrap();

        assert!(request.adapter().is_some());
        assert!(request.is_registered("cookie_jar"));
        assert_eq!(request.option("insecure_skip_verify"), Some(&OptionValue::Bool(true)));
    }

    #[test]
    fn attach_rejects_unknown_option() {
        let err = attach(
            HostRequest::new("GET", "https://example.com"),
            [("impersonation", OptionValue::atom("chrome_136"))],
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.error().details["option"], "impersonation");
    }

    #[test]
    fn impersonate_sets_profile_without_calling_native() {
        let request = guarded()
            .impersonate(HostRequest::new("GET", "https://example.com"), "safari_18")
            .unwrap();
        assert_eq!(request.option("impersonate"), Some(&OptionValue::atom("safari_18")));
    }

    #[test]
    fn validation_failures_never_reach_native() {
        let adapter = guarded();
        let request = adapter
            .attach(
                HostRequest::new("GET", "https://example.com").body("x".repeat(1000).as_str()),
                [("max_body_size", OptionValue::Int(500))],
            )
            .unwrap();

        let err = request.run().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert_eq!(err.to_string(), "invalid_request: request body exceeds max_body_size");
        assert_eq!(err.error().details["size"], 1000);
        assert_eq!(err.error().details["limit"], 500);
    }

    #[test]
    fn wrong_cookie_jar_shape_is_rejected_first() {
        let request = guarded()
            .attach(
                HostRequest::new("GET", "/not-absolute"),
                [("cookie_jar", OptionValue::from("jar"))],
            )
            .unwrap();
        let err = request.run().unwrap_err();
        assert_eq!(err.error().message, "cookie_jar must be a CookieJar");
    }

    #[test]
    fn request_error_exposes_structured_value() {
        let err = RequestError::from(Error::nif_panic("boom").detail("layer", "host"));
        assert_eq!(err.kind(), ErrorKind::NifPanic);
        assert_eq!(err.to_string(), "nif_panic: boom");
        assert_eq!(err.into_error().details["layer"], "host");
    }

    #[test]
    fn with_config_keeps_settings() {
        let config = Config {
            receive_timeout_ms: 1,
            max_body_size: 2,
        };
        assert_eq!(Adapter::with_config(config).config(), &config);
    }

    #[tokio::test]
    async fn run_async_contains_panicking_tasks() {
        let err = tokio::task::spawn_blocking(|| -> Result<HostResponse, RequestError> {
            panic!("worker died")
        })
        .await
        .map_err(join_failure)
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NifPanic);
        assert_eq!(err.message, "worker died");
    }
}
