//! Sending requests and delivering the outcome to callbacks.
//!
//! # Design
//! Every call fires exactly one of `on_success` / `on_error`. Both are
//! `FnOnce`, and the outcome of a call is a single `Result` matched once, so
//! neither "both" nor "neither" can happen short of a panic.
//!
//! Errors that mean the code and the configuration disagree (an unknown
//! route) come back synchronously as `Err` before anything is sent. Only
//! errors from sending the request reach `on_error`.
//!
//! The route's `Execution` decides where the call runs, and the return value
//! says which happened: `Dispatch::Completed` after running on the caller's
//! thread, `Dispatch::Pending` when the call was handed to a background
//! thread. `dispatch_blocking` and `dispatch_background` pin the mode.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error, warn};

use crate::client::RestClient;
use crate::error::{RouteNotFound, TransportError};
use crate::http::{FormFields, HttpRequest, ResponseRecord};
use crate::routes::Execution;
use crate::transport::Transport;

/// A request handed to a background thread.
///
/// Holds no thread when the thread could not be created; `on_error` has
/// already fired in that case.
#[derive(Debug)]
pub struct PendingRequest {
    handle: Option<JoinHandle<()>>,
}

impl PendingRequest {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the callback for this request has run.
    ///
    /// Returns `Err` with the panic payload if a callback panicked.
    pub fn wait(self) -> thread::Result<()> {
        match self.handle {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}

/// How a dispatched call was executed.
#[derive(Debug)]
#[must_use = "a pending request runs detached unless waited on"]
pub enum Dispatch {
    /// Ran on the calling thread; the callback has already fired.
    Completed,
    /// Running on a background thread; the callback fires later.
    Pending(PendingRequest),
}

impl Dispatch {
    pub fn is_pending(&self) -> bool {
        matches!(self, Dispatch::Pending(_))
    }

    /// Block until the callback has run. Immediate for `Completed`.
    pub fn wait(self) -> thread::Result<()> {
        match self {
            Dispatch::Completed => Ok(()),
            Dispatch::Pending(pending) => pending.wait(),
        }
    }
}

/// A `RestClient` paired with a transport.
#[derive(Debug)]
pub struct Dispatcher<T> {
    client: Arc<RestClient>,
    transport: Arc<T>,
}

impl<T> Clone for Dispatcher<T> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport + 'static> Dispatcher<T> {
    pub fn new(client: RestClient, transport: T) -> Self {
        Self {
            client: Arc::new(client),
            transport: Arc::new(transport),
        }
    }

    pub fn client(&self) -> &RestClient {
        &self.client
    }

    /// Start building a call to `route_name`.
    pub fn request(&self, route_name: impl Into<String>) -> RequestBuilder<'_, T> {
        RequestBuilder {
            dispatcher: self,
            route_name: route_name.into(),
            params: Vec::new(),
            fields: Vec::new(),
        }
    }

    /// Send a request on `route_name`, blocking or in the background as the
    /// route is configured.
    pub fn dispatch<S, E>(
        &self,
        route_name: &str,
        replacements: &[(&str, &str)],
        fields: FormFields,
        on_success: S,
        on_error: E,
    ) -> Result<Dispatch, RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let execution = self.client.route(route_name)?.execution;
        self.dispatch_with(execution, route_name, replacements, fields, on_success, on_error)
    }

    /// Send a request on `route_name` on the calling thread, whatever the
    /// route's configured execution. The callback has fired on return.
    pub fn dispatch_blocking<S, E>(
        &self,
        route_name: &str,
        replacements: &[(&str, &str)],
        fields: FormFields,
        on_success: S,
        on_error: E,
    ) -> Result<(), RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let request = self.client.build_request(route_name, replacements, fields)?;
        complete(&self.client, self.transport.as_ref(), request, on_success, on_error);
        Ok(())
    }

    /// Send a request on `route_name` from a background thread, whatever the
    /// route's configured execution.
    pub fn dispatch_background<S, E>(
        &self,
        route_name: &str,
        replacements: &[(&str, &str)],
        fields: FormFields,
        on_success: S,
        on_error: E,
    ) -> Result<PendingRequest, RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let request = self.client.build_request(route_name, replacements, fields)?;
        Ok(self.spawn(request, on_success, on_error))
    }

    fn dispatch_with<S, E>(
        &self,
        execution: Execution,
        route_name: &str,
        replacements: &[(&str, &str)],
        fields: FormFields,
        on_success: S,
        on_error: E,
    ) -> Result<Dispatch, RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        match execution {
            Execution::Blocking => {
                self.dispatch_blocking(route_name, replacements, fields, on_success, on_error)?;
                Ok(Dispatch::Completed)
            }
            Execution::Background => self
                .dispatch_background(route_name, replacements, fields, on_success, on_error)
                .map(Dispatch::Pending),
        }
    }

    fn spawn<S, E>(&self, request: HttpRequest, on_success: S, on_error: E) -> PendingRequest
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let builder = thread::Builder::new().name("sleepy-request".to_string());
        spawn_on(
            builder,
            Arc::clone(&self.client),
            Arc::clone(&self.transport),
            request,
            on_success,
            on_error,
        )
    }
}

/// Run `complete` on a thread made by `builder`.
///
/// The callbacks sit in a shared slot rather than moving into the thread, so
/// they are still reachable when the thread cannot be created and `on_error`
/// can report that instead.
fn spawn_on<T, S, E>(
    builder: thread::Builder,
    client: Arc<RestClient>,
    transport: Arc<T>,
    request: HttpRequest,
    on_success: S,
    on_error: E,
) -> PendingRequest
where
    T: Transport + 'static,
    S: FnOnce(ResponseRecord) + Send + 'static,
    E: FnOnce(String) + Send + 'static,
{
    let callbacks = Arc::new(Mutex::new(Some((on_success, on_error))));
    let slot = Arc::clone(&callbacks);

    let spawned = builder.spawn(move || {
        let taken = slot.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some((on_success, on_error)) = taken {
            complete(&client, transport.as_ref(), request, on_success, on_error);
        }
    });

    match spawned {
        Ok(handle) => PendingRequest {
            handle: Some(handle),
        },
        Err(err) => {
            let error = TransportError::Other(format!("failed to spawn request thread: {err}"));
            warn!(error = %error, "background dispatch failed");
            let taken = callbacks.lock().unwrap_or_else(PoisonError::into_inner).take();
            if let Some((_, on_error)) = taken {
                on_error(error.to_string());
            }
            PendingRequest { handle: None }
        }
    }
}

/// Send `request` and fire exactly one callback with the outcome.
fn complete<T, S, E>(
    client: &RestClient,
    transport: &T,
    request: HttpRequest,
    on_success: S,
    on_error: E,
) where
    T: Transport + ?Sized,
    S: FnOnce(ResponseRecord),
    E: FnOnce(String),
{
    if client.debug() {
        debug!(method = %request.method, url = %request.url, fields = request.fields.len(), "sending request");
    }

    let outcome = match transport.execute(&request) {
        Ok(response) => client.interpret(response).map_err(|err| err.to_string()),
        Err(err) => {
            warn!(method = %request.method, url = %request.url, error = %err, "transport failure");
            Err(err.to_string())
        }
    };

    match outcome {
        Ok(record) => on_success(record),
        Err(message) => on_error(message),
    }
}

/// Builder for a single call, with path parameters and form fields added
/// one at a time.
#[derive(Debug)]
pub struct RequestBuilder<'a, T> {
    dispatcher: &'a Dispatcher<T>,
    route_name: String,
    params: Vec<(String, String)>,
    fields: FormFields,
}

impl<T: Transport + 'static> RequestBuilder<'_, T> {
    /// Replace `placeholder` in the route path with the escaped `value`.
    pub fn param(mut self, placeholder: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((placeholder.into(), value.into()));
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((name.into(), value.into()));
        self
    }

    pub fn send<S, E>(self, on_success: S, on_error: E) -> Result<Dispatch, RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
        E: FnOnce(String) + Send + 'static,
    {
        let params: Vec<(&str, &str)> = self
            .params
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
            .collect();
        self.dispatcher
            .dispatch(&self.route_name, &params, self.fields, on_success, on_error)
    }

    /// Send with a default error handler that logs the failure.
    pub fn send_or_log<S>(self, on_success: S) -> Result<Dispatch, RouteNotFound>
    where
        S: FnOnce(ResponseRecord) + Send + 'static,
    {
        self.send(on_success, |message| error!("Request failed: {message}"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Mutex};
    use std::time::Duration;

    use super::*;
    use crate::config::ClientConfig;
    use crate::error::TransportError;
    use crate::http::{HttpMethod, HttpResponse};
    use crate::routes::RouteSpec;
    use crate::signer::DeviceId;

    /// Answers from a fixed table keyed by URL and records what it saw.
    #[derive(Default)]
    struct StubTransport {
        sent: Mutex<Vec<HttpRequest>>,
        calls: AtomicUsize,
    }

    impl Transport for StubTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.sent.lock().unwrap().push(request.clone());
            let (status, body) = match request.url.as_str() {
                "http://stub/ok" => (200, r#"{"ok":true}"#.to_string()),
                "http://stub/empty" => (200, "{}".to_string()),
                "http://stub/down" => {
                    return Err(TransportError::Connection("refused".to_string()))
                }
                url if url.starts_with("http://stub/echo/") => {
                    (200, format!(r#"{{"echo":"{}"}}"#, &url["http://stub/echo/".len()..]))
                }
                _ => (404, "not found".to_string()),
            };
            Ok(HttpResponse {
                status,
                headers: Vec::new(),
                body,
            })
        }
    }

    fn dispatcher() -> Dispatcher<StubTransport> {
        let config = ClientConfig {
            endpoint: "http://stub".to_string(),
            api_key: "key".to_string(),
            api_secret: "secret".to_string(),
            debug: true,
            routes: vec![
                RouteSpec::new("ok", HttpMethod::Get, "/ok"),
                RouteSpec::new("ok_async", HttpMethod::Get, "/ok").background(),
                RouteSpec::new("empty", HttpMethod::Get, "/empty"),
                RouteSpec::new("down", HttpMethod::Post, "/down"),
                RouteSpec::new("missing", HttpMethod::Get, "/missing"),
                RouteSpec::new("echo", HttpMethod::Get, "/echo/{v}").background(),
            ],
        };
        Dispatcher::new(
            RestClient::new(config, DeviceId::new("d")),
            StubTransport::default(),
        )
    }

    /// Dispatch `route` and collect which callback fired.
    fn outcome(d: &Dispatcher<StubTransport>, route: &str) -> Vec<Result<ResponseRecord, String>> {
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();
        d.dispatch(
            route,
            &[],
            Vec::new(),
            move |record| tx.send(Ok(record)).unwrap(),
            move |message| err_tx.send(Err(message)).unwrap(),
        )
        .unwrap()
        .wait()
        .unwrap();
        rx.try_iter().collect()
    }

    #[test]
    fn unknown_route_returns_err_without_sending() {
        let d = dispatcher();
        let result = d.dispatch("nope", &[], Vec::new(), |_| panic!("success"), |_| panic!("error"));
        assert_eq!(result.unwrap_err().name, "nope");
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn blocking_route_completes_before_return() {
        let d = dispatcher();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        let dispatch = d
            .dispatch(
                "ok",
                &[],
                Vec::new(),
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                |_| panic!("error"),
            )
            .unwrap();
        assert!(!dispatch.is_pending());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn background_route_returns_pending() {
        let d = dispatcher();
        let (tx, rx) = mpsc::channel();
        let dispatch = d
            .dispatch("ok_async", &[], Vec::new(), move |r| tx.send(r).unwrap(), |_| {})
            .unwrap();
        assert!(dispatch.is_pending());
        let record = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(record.get("ok"), Some(&serde_json::Value::Bool(true)));
        dispatch.wait().unwrap();
    }

    #[test]
    fn exactly_one_callback_per_call() {
        let d = dispatcher();
        for _ in 0..20 {
            for route in ["ok", "ok_async", "empty", "down", "missing"] {
                let fired = outcome(&d, route);
                assert_eq!(fired.len(), 1, "route {route}");
            }
        }
    }

    #[test]
    fn failures_reach_error_callback() {
        let d = dispatcher();
        assert_eq!(outcome(&d, "empty")[0], Err("{}".to_string()));
        assert_eq!(
            outcome(&d, "down")[0],
            Err("Connection error: refused".to_string())
        );
        let missing = outcome(&d, "missing").remove(0).unwrap_err();
        assert!(missing.starts_with("404 Error"));
    }

    #[test]
    fn forced_modes_override_route_flag() {
        let d = dispatcher();
        let (tx, rx) = mpsc::channel();
        d.dispatch_blocking("ok_async", &[], Vec::new(), move |r| tx.send(r).unwrap(), |_| {})
            .unwrap();
        assert!(rx.try_recv().is_ok());

        let (tx, rx) = mpsc::channel();
        let pending = d
            .dispatch_background("ok", &[], Vec::new(), move |r| tx.send(r).unwrap(), |_| {})
            .unwrap();
        pending.wait().unwrap();
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn concurrent_background_calls_get_their_own_records() {
        let d = dispatcher();
        let (tx, rx) = mpsc::channel();
        let pending: Vec<_> = (0..16)
            .map(|i| {
                let tx = tx.clone();
                let value = i.to_string();
                d.request("echo")
                    .param("{v}", value.clone())
                    .send(
                        move |record| tx.send((value, record)).unwrap(),
                        |message| panic!("unexpected error: {message}"),
                    )
                    .unwrap()
            })
            .collect();
        for p in pending {
            p.wait().unwrap();
        }
        drop(tx);
        let results: Vec<_> = rx.iter().collect();
        assert_eq!(results.len(), 16);
        for (value, record) in results {
            assert_eq!(record.get("echo"), Some(&serde_json::Value::String(value)));
        }
    }

    #[test]
    #[cfg(all(target_os = "linux", target_pointer_width = "64"))]
    fn thread_spawn_failure_reaches_error_callback() {
        let d = dispatcher();
        let request = d.client().build_request("ok", &[], Vec::new()).unwrap();
        // No address space can hold this stack, so thread creation fails.
        let builder = thread::Builder::new().stack_size(1 << 60);
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();

        let pending = spawn_on(
            builder,
            Arc::clone(&d.client),
            Arc::clone(&d.transport),
            request,
            move |record| tx.send(Ok(record)).unwrap(),
            move |message| err_tx.send(Err(message)).unwrap(),
        );

        assert!(pending.is_finished());
        pending.wait().unwrap();
        let fired: Vec<_> = rx.try_iter().collect();
        assert_eq!(fired.len(), 1);
        let message = fired[0].clone().unwrap_err();
        assert!(
            message.starts_with("General error: failed to spawn request thread"),
            "{message}"
        );
        assert_eq!(d.transport.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn builder_passes_params_and_fields() {
        let d = dispatcher();
        d.request("ok")
            .field("score", "10")
            .field("name", "bob")
            .send_or_log(|_| {})
            .unwrap()
            .wait()
            .unwrap();
        let sent = d.transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].field("score"), Some("10"));
        assert_eq!(sent[0].field("name"), Some("bob"));
    }
}
