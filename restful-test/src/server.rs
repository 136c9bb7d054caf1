//! Exposes an in-process mock of the RESTful objects API for use in integration tests.
//!
//! ```
//! use restful_test::server::TestServer;
//!
//! #[tokio::main]
//! async fn main() {
//!    let server = TestServer::new().await;
//!    let url = server.url("/objects");
//!    // use the URL in tests...
//! }
//! ```
//!
//! The mock stores objects in memory and mimics the responses of the public sample API. Use
//! [`TestServer::set_faults`] to make it misbehave.

use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Map, Value, json};

/// Misbehavior injected into the mock API.
#[derive(Clone, Debug, Default)]
pub struct Faults {
    /// Respond to `POST /objects` with this status and no object.
    pub create_status: Option<StatusCode>,
    /// Respond to `PUT /objects/{id}` with this status without updating.
    pub update_status: Option<StatusCode>,
    /// Respond to `GET /objects/{id}` with this status.
    pub read_status: Option<StatusCode>,
    /// Leave out the `id` field from create responses.
    pub omit_id: bool,
    /// Leave out the `data` field from read responses.
    pub omit_read_data: bool,
    /// Serve the object as it was created, ignoring updates.
    pub stale_read: bool,
    /// Delay read responses by this long.
    pub read_delay: Option<Duration>,
}

/// A request received by the mock API.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    /// The HTTP method.
    pub method: Method,
    /// The request path, without query.
    pub path: String,
    /// The value of the `Accept` header.
    pub accept: Option<String>,
    /// The value of the `Content-Type` header.
    pub content_type: Option<String>,
    /// The decoded JSON body, if any.
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct ApiState {
    next_id: AtomicU64,
    objects: Mutex<HashMap<String, StoredObject>>,
    faults: Mutex<Faults>,
    requests: Mutex<Vec<RecordedRequest>>,
}

#[derive(Clone, Debug)]
struct StoredObject {
    created: Value,
    current: Value,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ApiState {
    fn record(&self, method: Method, path: String, headers: &HeaderMap, body: &str) -> Faults {
        let header_value = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        lock(&self.requests).push(RecordedRequest {
            method,
            path,
            accept: header_value(header::ACCEPT),
            content_type: header_value(header::CONTENT_TYPE),
            body: serde_json::from_str(body).ok(),
        });

        lock(&self.faults).clone()
    }
}

/// An in-process mock objects API for use in integration tests.
///
/// The server listens on a random available port on localhost and is shut down when dropped.
#[derive(Debug)]
pub struct TestServer {
    handle: tokio::task::JoinHandle<()>,
    socket: SocketAddr,
    state: Arc<ApiState>,
}

impl TestServer {
    /// Starts a well-behaved server.
    pub async fn new() -> Self {
        Self::with_faults(Faults::default()).await
    }

    /// Starts a server with the given faults.
    pub async fn with_faults(faults: Faults) -> Self {
        let addr = SocketAddr::from(([127, 0, 0, 1], 0));
        let listener = TcpListener::bind(addr).unwrap();
        listener.set_nonblocking(true).unwrap();
        let socket = listener.local_addr().unwrap();

        let state = Arc::new(ApiState {
            faults: Mutex::new(faults),
            ..Default::default()
        });
        let router = routes().with_state(Arc::clone(&state));

        let handle = tokio::spawn(async move {
            let listener = tokio::net::TcpListener::from_std(listener).unwrap();
            axum::serve(listener, router).await.unwrap();
        });

        Self {
            handle,
            socket,
            state,
        }
    }

    /// Returns a full URL pointing to the given path.
    ///
    /// This URL uses `localhost` as hostname.
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://localhost:{}/{}", self.socket.port(), path)
    }

    /// Replaces the injected faults for subsequent requests.
    pub fn set_faults(&self, faults: Faults) {
        *lock(&self.state.faults) = faults;
    }

    /// Returns all requests received so far, in order of arrival.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        lock(&self.state.requests).clone()
    }

    /// Returns the number of received requests with the given method.
    pub fn request_count(&self, method: Method) -> usize {
        lock(&self.state.requests)
            .iter()
            .filter(|request| request.method == method)
            .count()
    }

    /// Returns the current representation of a stored object.
    pub fn object(&self, id: &str) -> Option<Value> {
        lock(&self.state.objects)
            .get(id)
            .map(|object| object.current.clone())
    }

    /// Returns the body an object was created with, ignoring later updates.
    pub fn created_object(&self, id: &str) -> Option<Value> {
        lock(&self.state.objects)
            .get(id)
            .map(|object| object.created.clone())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn routes() -> Router<Arc<ApiState>> {
    Router::new()
        .route("/objects", routing::post(object_create))
        .route("/objects/{id}", routing::get(object_read).put(object_update))
}

fn not_found(id: &str) -> Response {
    let body = json!({ "error": format!("Object with id={id} was not found.") });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

fn representation(id: &str, body: &Value) -> Map<String, Value> {
    let mut object = Map::new();
    object.insert("id".into(), id.into());
    object.insert("name".into(), body.get("name").cloned().unwrap_or(Value::Null));
    object.insert("data".into(), body.get("data").cloned().unwrap_or(Value::Null));
    object
}

async fn object_create(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let faults = state.record(Method::POST, "/objects".into(), &headers, &body);
    if let Some(status) = faults.create_status {
        return status.into_response();
    }

    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let n = state.next_id.fetch_add(1, Ordering::Relaxed);
    let id = format!("ff808181{n:012x}");
    let mut response = representation(&id, &body);
    let object = Value::Object(response.clone());

    lock(&state.objects).insert(
        id,
        StoredObject {
            created: object.clone(),
            current: object,
        },
    );

    if faults.omit_id {
        response.remove("id");
    }
    response.insert("createdAt".into(), "2025-01-01T00:00:00.000+00:00".into());

    Json(response).into_response()
}

async fn object_update(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> Response {
    let faults = state.record(Method::PUT, format!("/objects/{id}"), &headers, &body);
    if let Some(status) = faults.update_status {
        return status.into_response();
    }

    let Ok(body) = serde_json::from_str::<Value>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    let mut objects = lock(&state.objects);
    let Some(stored) = objects.get_mut(&id) else {
        return not_found(&id);
    };

    let mut response = representation(&id, &body);
    stored.current = Value::Object(response.clone());
    response.insert("updatedAt".into(), "2025-01-01T00:00:01.000+00:00".into());

    Json(response).into_response()
}

async fn object_read(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let faults = state.record(Method::GET, format!("/objects/{id}"), &headers, "");
    if let Some(delay) = faults.read_delay {
        tokio::time::sleep(delay).await;
    }
    if let Some(status) = faults.read_status {
        return status.into_response();
    }

    let Some(stored) = lock(&state.objects).get(&id).cloned() else {
        return not_found(&id);
    };

    let mut object = if faults.stale_read {
        stored.created
    } else {
        stored.current
    };
    if faults.omit_read_data {
        if let Value::Object(ref mut map) = object {
            map.remove("data");
        }
    }

    Json(object).into_response()
}
