use serde::Serialize;

/// Response metadata returned next to the raw body.
///
/// `url` is the final URL after redirects.
#[derive(Debug, Serialize)]
pub struct NativeResponseMeta {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
}
