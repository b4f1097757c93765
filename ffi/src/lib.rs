//! C-ABI wrapper around `sleepy-core`.
//!
//! # Overview
//! Lets a host with its own HTTP stack use the route table, signer and
//! response rules through `extern "C"` functions: build a signed, resolved
//! request, execute it however the host likes, and hand the response back for
//! interpretation.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Path parameters and form fields cross as JSON objects of strings, in
//!   the order they appear in the text.
//! - An unknown route yields a null request and a `warn` log; it is a
//!   configuration mismatch, not a response to interpret.
//! - The C caller owns all returned pointers and must call the matching
//!   `sleepy_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::{Map, Value};
use sleepy_core::{
    ConfigStore, DeviceId, FileConfigStore, HttpResponse, MemoryConfigStore, RestClient,
};

use types::*;

/// Borrow a C string argument. `None` for null or non-UTF-8 input.
fn str_arg<'a>(ptr: *const c_char) -> Option<&'a str> {
    if ptr.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(ptr) }.to_str().ok()
}

/// Copy a C string argument, replacing invalid UTF-8 with U+FFFD. Empty for
/// null.
fn lossy_arg(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// Parse an optional JSON object of string values into ordered pairs.
///
/// Null means no pairs. Non-string values are rendered as JSON text.
fn pairs_arg(ptr: *const c_char) -> Option<Vec<(String, String)>> {
    if ptr.is_null() {
        return Some(Vec::new());
    }
    let raw = str_arg(ptr)?;
    let map: Map<String, Value> = serde_json::from_str(raw).ok()?;
    Some(
        map.into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
    )
}

fn open_client(store: &impl ConfigStore, device_id: *const c_char) -> *mut FfiRestClient {
    let Some(device_id) = str_arg(device_id) else {
        return std::ptr::null_mut();
    };
    match RestClient::from_store(store, DeviceId::new(device_id)) {
        Ok(client) => Box::into_raw(Box::new(FfiRestClient { inner: client })),
        Err(err) => {
            tracing::error!(error = %err, "failed to load client configuration");
            std::ptr::null_mut()
        }
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Open a client from the configuration file at `config_path`.
///
/// A missing file yields the first-run default configuration. Returns null
/// if an argument is null, if the file is malformed, or on panic.
/// The caller must free the returned pointer with `sleepy_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_client_open(
    config_path: *const c_char,
    device_id: *const c_char,
) -> *mut FfiRestClient {
    catch_unwind(|| {
        let Some(path) = str_arg(config_path) else {
            return std::ptr::null_mut();
        };
        open_client(&FileConfigStore::new(path), device_id)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Open a client from a configuration document held in memory.
///
/// Returns null if an argument is null, if the document is malformed, or on
/// panic.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_client_from_json(
    document: *const c_char,
    device_id: *const c_char,
) -> *mut FfiRestClient {
    catch_unwind(|| {
        let Some(document) = str_arg(document) else {
            return std::ptr::null_mut();
        };
        open_client(&MemoryConfigStore::with_document(document), device_id)
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `sleepy_client_open` or
/// `sleepy_client_from_json`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_client_free(client: *mut FfiRestClient) {
    if !client.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(client) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Build the request for `route`, signed when the route requires it.
///
/// `params_json` maps placeholders to values (`{"{id}": "42"}`),
/// `fields_json` maps form field names to values; either may be null.
/// Returns null if `client` or `route` is null, a JSON argument is not an
/// object, the route is unknown, or on panic.
/// The caller must free the returned pointer with `sleepy_free_request`.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_build_request(
    client: *const FfiRestClient,
    route: *const c_char,
    params_json: *const c_char,
    fields_json: *const c_char,
) -> *mut FfiHttpRequest {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return std::ptr::null_mut();
        }
        let client = unsafe { &*client };
        let (Some(route), Some(params), Some(fields)) =
            (str_arg(route), pairs_arg(params_json), pairs_arg(fields_json))
        else {
            return std::ptr::null_mut();
        };
        let params: Vec<(&str, &str)> = params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        match client.inner.build_request(route, &params, fields) {
            Ok(req) => FfiHttpRequest::from_core(req),
            Err(err) => {
                tracing::warn!(error = %err, "cannot build request");
                std::ptr::null_mut()
            }
        }
    }))
    .unwrap_or(std::ptr::null_mut())
}

/// Free a request returned by `sleepy_build_request`. Safe with null.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_free_request(req: *mut FfiHttpRequest) {
    if req.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let req = unsafe { Box::from_raw(req) };
        free_c_string(req.url);
        free_c_string(req.form);
    }));
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Interpret a response the host executed.
///
/// Succeeds only for status 200 with a non-empty JSON object body.
/// The caller must free the returned pointer with `sleepy_free_result`.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_interpret_response(
    client: *const FfiRestClient,
    response: *const FfiHttpResponse,
) -> *mut FfiResult {
    catch_unwind(AssertUnwindSafe(|| {
        if client.is_null() {
            return FfiResult::null_arg("client");
        }
        if response.is_null() {
            return FfiResult::null_arg("response");
        }
        let client = unsafe { &*client };
        let resp = unsafe { &*response };
        let core_resp = HttpResponse {
            status: resp.status,
            headers: parse_headers(&lossy_arg(resp.headers)),
            body: lossy_arg(resp.body),
        };
        match client.inner.interpret(core_resp) {
            Ok(record) => FfiResult::ok(record),
            Err(err) => FfiResult::from_error(err),
        }
    }))
    .unwrap_or_else(|_| FfiResult::panic("panic in sleepy_interpret_response"))
}

/// Free a result returned by `sleepy_interpret_response`. Safe with null.
#[unsafe(no_mangle)]
pub extern "C" fn sleepy_free_result(result: *mut FfiResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(AssertUnwindSafe(|| {
        let result = unsafe { Box::from_raw(result) };
        free_c_string(result.error_message);
        free_c_string(result.headers);
        free_c_string(result.body_json);
    }));
}
