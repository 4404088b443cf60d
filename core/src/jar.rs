//! Host handle to a native cookie store.
//!
//! A `CookieJar` owns one reference to a store allocated by the native
//! engine. Cloning retains, dropping releases; the store is freed with the
//! last handle. The host never reads the store, it only passes the pointer
//! back into `cloak_perform_request`.

use std::fmt;

use cloak_ffi::{
    cloak_cookie_jar_new, cloak_cookie_jar_release, cloak_cookie_jar_retain, FfiCookieJar,
};
use uuid::Uuid;

use crate::error::Error;
use crate::request::OptionValue;

pub struct CookieJar {
    raw: *const FfiCookieJar,
    id: Uuid,
}

// The native store is reference counted atomically and locks internally.
unsafe impl Send for CookieJar {}
unsafe impl Sync for CookieJar {}

impl CookieJar {
    /// Allocate an empty native store.
    pub fn new() -> Self {
        CookieJar {
            raw: cloak_cookie_jar_new(),
            id: Uuid::new_v4(),
        }
    }

    /// Label for logs; shared by clones of the same handle.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn as_ptr(&self) -> *const FfiCookieJar {
        self.raw
    }

    /// Read the `cookie_jar` option: absent or nil means no persistence.
    pub(crate) fn resolve(value: Option<&OptionValue>) -> Result<Option<CookieJar>, Error> {
        match value {
            None | Some(OptionValue::Nil) => Ok(None),
            Some(OptionValue::CookieJar(jar)) => Ok(Some(jar.clone())),
            Some(other) => Err(Error::invalid_request("cookie_jar must be a CookieJar")
                .detail("type", other.type_name())),
        }
    }
}

impl Default for CookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CookieJar {
    fn clone(&self) -> Self {
        cloak_cookie_jar_retain(self.raw);
        CookieJar {
            raw: self.raw,
            id: self.id,
        }
    }
}

impl Drop for CookieJar {
    fn drop(&mut self) {
        cloak_cookie_jar_release(self.raw);
    }
}

impl PartialEq for CookieJar {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.raw, other.raw)
    }
}

impl Eq for CookieJar {}

impl fmt::Debug for CookieJar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CookieJar<{}>", self.id)
    }
}
