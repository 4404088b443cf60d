//! Host-side request value.
//!
//! # Design
//! `HostRequest` mirrors the shape a host HTTP client hands to its adapter:
//! method, url, a header multimap, a body and a bag of named options. Options
//! must be registered before they can be merged, so a misspelled option fails
//! loudly instead of being ignored. A request executes through the adapter
//! installed on it by `attach`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use bytes::Bytes;

use crate::adapter::{Adapter, RequestError};
use crate::error::Error;
use crate::jar::CookieJar;
use crate::response::HostResponse;

/// Options every request understands, registered or not.
pub const AMBIENT_OPTIONS: [&str; 2] = ["receive_timeout", "into"];

/// Named option value, loosely typed like the host's keyword options.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    Nil,
    Bool(bool),
    Int(i64),
    /// A symbolic tag such as `chrome_136` or `infinity`.
    Atom(String),
    Str(String),
    List(Vec<OptionValue>),
    CookieJar(CookieJar),
}

impl OptionValue {
    pub fn atom(name: impl Into<String>) -> Self {
        OptionValue::Atom(name.into())
    }

    /// Short name of the variant, used in error details.
    pub fn type_name(&self) -> &'static str {
        match self {
            OptionValue::Nil => "nil",
            OptionValue::Bool(_) => "boolean",
            OptionValue::Int(_) => "integer",
            OptionValue::Atom(_) => "atom",
            OptionValue::Str(_) => "string",
            OptionValue::List(_) => "list",
            OptionValue::CookieJar(_) => "cookie_jar",
        }
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        OptionValue::Bool(value)
    }
}

impl From<i64> for OptionValue {
    fn from(value: i64) -> Self {
        OptionValue::Int(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        OptionValue::Str(value.to_string())
    }
}

impl From<CookieJar> for OptionValue {
    fn from(jar: CookieJar) -> Self {
        OptionValue::CookieJar(jar)
    }
}

impl From<&CookieJar> for OptionValue {
    fn from(jar: &CookieJar) -> Self {
        OptionValue::CookieJar(jar.clone())
    }
}

/// Nested byte chunks, flattened before sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoData {
    Bytes(Bytes),
    /// A single byte; values outside `0..=255` cannot be flattened.
    Byte(i64),
    List(Vec<IoData>),
}

impl From<&str> for IoData {
    fn from(value: &str) -> Self {
        IoData::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

/// Incrementally produced request body. Never sent; the native engine needs
/// the whole body up front.
pub struct BodyStream(Box<dyn Iterator<Item = Bytes> + Send>);

impl BodyStream {
    pub fn new(chunks: impl Iterator<Item = Bytes> + Send + 'static) -> Self {
        BodyStream(Box::new(chunks))
    }
}

impl fmt::Debug for BodyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BodyStream(..)")
    }
}

impl Iterator for BodyStream {
    type Item = Bytes;

    fn next(&mut self) -> Option<Bytes> {
        self.0.next()
    }
}

#[derive(Debug, Default)]
pub enum Body {
    #[default]
    None,
    Bytes(Bytes),
    IoData(Vec<IoData>),
    Stream(BodyStream),
}

impl From<&str> for Body {
    fn from(value: &str) -> Self {
        Body::Bytes(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Vec<u8>> for Body {
    fn from(value: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Body {
    fn from(value: Bytes) -> Self {
        Body::Bytes(value)
    }
}

#[derive(Debug)]
pub struct HostRequest {
    pub method: String,
    pub url: String,
    /// Header multimap: one entry per name, values in insertion order.
    pub headers: Vec<(String, Vec<String>)>,
    pub body: Body,
    options: BTreeMap<String, OptionValue>,
    registered: BTreeSet<String>,
    adapter: Option<Adapter>,
}

impl HostRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: Vec::new(),
            body: Body::None,
            options: BTreeMap::new(),
            registered: BTreeSet::new(),
            adapter: None,
        }
    }

    /// Append a header value, grouping it with an existing entry of the same
    /// name (case-insensitive).
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some((_, values)) => values.push(value),
            None => self.headers.push((name, vec![value])),
        }
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn register_options<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.registered.extend(names.into_iter().map(str::to_string));
        self
    }

    pub fn is_registered(&self, name: &str) -> bool {
        AMBIENT_OPTIONS.contains(&name) || self.registered.contains(name)
    }

    /// Merge options, rejecting names that are neither registered nor ambient.
    pub fn merge_options<K, I>(mut self, options: I) -> Result<Self, Error>
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, OptionValue)>,
    {
        for (name, value) in options {
            let name = name.into();
            if !self.is_registered(&name) {
                return Err(Error::invalid_request("unknown option").detail("option", name));
            }
            self.options.insert(name, value);
        }
        Ok(self)
    }

    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.get(name)
    }

    pub(crate) fn set_adapter(mut self, adapter: Adapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn adapter(&self) -> Option<&Adapter> {
        self.adapter.as_ref()
    }

    /// Execute through the attached adapter, blocking the calling thread.
    pub fn run(mut self) -> Result<HostResponse, RequestError> {
        match self.adapter.take() {
            Some(adapter) => adapter.run(self),
            None => Err(Error::invalid_request("no adapter attached").into()),
        }
    }
}
