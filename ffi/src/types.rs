//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String` and tagged enums with explicit
//! discriminants. Conversion functions live here to keep `lib.rs` focused on
//! the `extern "C"` surface.

use std::ffi::CString;
use std::os::raw::c_char;

use sleepy_core::{ApiError, HttpMethod, ResponseRecord};

/// Opaque handle to a `RestClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiRestClient {
    pub(crate) inner: sleepy_core::RestClient,
}

/// Build a C string, dropping interior NULs rather than failing.
pub(crate) fn to_c_string(s: impl Into<String>) -> *mut c_char {
    let mut bytes = s.into().into_bytes();
    bytes.retain(|b| *b != 0);
    CString::new(bytes)
        .map(CString::into_raw)
        .unwrap_or(std::ptr::null_mut())
}

/// Free a string produced by `to_c_string`. Safe with null.
pub(crate) fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
    Put = 2,
    Delete = 3,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
            HttpMethod::Put => FfiHttpMethod::Put,
            HttpMethod::Delete => FfiHttpMethod::Delete,
        }
    }
}

/// A signed, resolved request described as C-compatible plain data.
///
/// `form` holds every field, signature fields included, as an
/// `application/x-www-form-urlencoded` string. The C caller sends it as the
/// body (POST/PUT) or query string (GET/DELETE) and passes the response back
/// through `sleepy_interpret_response`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub form: *mut c_char,
}

impl FfiHttpRequest {
    /// Convert a core `HttpRequest` into a heap-allocated `FfiHttpRequest`.
    pub(crate) fn from_core(req: sleepy_core::HttpRequest) -> *mut Self {
        let form = req.form_body();
        Box::into_raw(Box::new(FfiHttpRequest {
            method: req.method.into(),
            url: to_c_string(req.url),
            form: to_c_string(form),
        }))
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing a request. The
/// FFI layer reads but does not free these fields.
///
/// `headers` is one `Name: value` line per header, separated by `\n`; null
/// means no headers. `body` may hold any bytes; invalid UTF-8 is replaced
/// with U+FFFD rather than dropped.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub headers: *const c_char,
    pub body: *const c_char,
}

/// Split `Name: value` lines into header pairs. Lines without a colon and
/// blank lines are skipped.
pub(crate) fn parse_headers(raw: &str) -> Vec<(String, String)> {
    raw.lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned by the FFI surface.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    Status = 1,
    Undecodable = 2,
    EmptyBody = 3,
    Panic = 4,
    NullArg = 5,
}

/// Result envelope for response interpretation.
///
/// On success `error_code` is `Ok`, `error_message` is null, `headers` holds
/// the captured `Name: value` lines joined by `\n` and `body_json` holds the
/// decoded object re-encoded as JSON. On failure `error_message` is the text
/// the error callback would receive, `headers` and `body_json` are null.
#[repr(C)]
pub struct FfiResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub headers: *mut c_char,
    pub body_json: *mut c_char,
}

impl FfiResult {
    pub(crate) fn ok(record: ResponseRecord) -> *mut Self {
        let body = serde_json::Value::Object(record.body).to_string();
        Box::into_raw(Box::new(FfiResult {
            error_code: FfiErrorCode::Ok,
            error_message: std::ptr::null_mut(),
            http_status: record.status,
            headers: to_c_string(record.headers.join("\n")),
            body_json: to_c_string(body),
        }))
    }

    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let error_code = match err {
            ApiError::Status { .. } => FfiErrorCode::Status,
            ApiError::Undecodable { .. } => FfiErrorCode::Undecodable,
            ApiError::EmptyBody { .. } => FfiErrorCode::EmptyBody,
        };
        Self::failure(error_code, err.status(), err.to_string())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::failure(FfiErrorCode::NullArg, 0, format!("{name} is null"))
    }

    pub(crate) fn panic(message: &str) -> *mut Self {
        Self::failure(FfiErrorCode::Panic, 0, message)
    }

    fn failure(error_code: FfiErrorCode, http_status: u16, message: impl Into<String>) -> *mut Self {
        Box::into_raw(Box::new(FfiResult {
            error_code,
            error_message: to_c_string(message),
            http_status,
            headers: std::ptr::null_mut(),
            body_json: std::ptr::null_mut(),
        }))
    }
}
