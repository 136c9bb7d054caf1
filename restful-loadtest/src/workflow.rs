//! The create, update and read workflow of a single logical user.
//!
//! An iteration runs three dependent requests against the objects API:
//!
//! 1. **create**: `POST {base_url}` with the feeder record. The `id` of the created object is
//!    extracted from the response.
//! 2. **update**: `PUT {base_url}/{id}` replacing the object with [`updated_object`].
//! 3. **read**: `GET {base_url}/{id}`.
//!
//! Finally, the update and read responses are compared by [`consistency::check`]. The first
//! failure ends the iteration; later steps are never attempted.

use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::consistency;
use crate::error::{IterationError, Step};
use crate::feeder::UserRecord;
use crate::http::HttpRemote;

/// Values captured from responses during one iteration.
///
/// A fresh session is created for every iteration and dropped afterwards. It is never shared
/// between logical users.
#[derive(Debug, Default)]
pub struct SessionState {
    /// The `id` assigned by the server in the create step.
    pub created_id: Option<String>,
    /// The raw body of the create response.
    pub create_response_body: Option<String>,
    /// The raw body of the update response.
    pub put_response_body: Option<String>,
    /// The raw body of the read response.
    pub get_response_body: Option<String>,
}

/// Latency of a successful step.
#[derive(Clone, Copy, Debug)]
pub struct StepTiming {
    /// The step that completed.
    pub step: Step,
    /// Time from sending the request until the full body was received.
    pub elapsed: Duration,
}

/// The outcome of one iteration.
#[derive(Debug)]
pub struct Iteration {
    /// The values captured before the iteration ended.
    pub session: SessionState,
    /// Timings of all steps that succeeded, in order.
    pub timings: Vec<StepTiming>,
    /// `Ok` if all steps and the consistency check passed.
    pub result: Result<(), IterationError>,
}

impl Iteration {
    /// Total time spent in successful steps.
    pub fn elapsed(&self) -> Duration {
        self.timings.iter().map(|t| t.elapsed).sum()
    }
}

/// The body sent in the update step.
pub fn updated_object() -> Value {
    json!({
        "name": "Updated Name",
        "data": {
            "year": 2020,
            "price": 1949.99,
            "CPU model": "Intel Core i10",
            "Hard disk size": "2 TB",
        },
    })
}

/// Runs all steps of one iteration for `record`.
///
/// This never panics on server misbehavior; every failure is reported in
/// [`Iteration::result`].
#[tracing::instrument(level = "debug", skip_all, fields(name = %record.name))]
pub async fn run_iteration(remote: &HttpRemote, record: &UserRecord) -> Iteration {
    let mut session = SessionState::default();
    let mut timings = Vec::with_capacity(Step::ALL.len());
    let result = execute(remote, record, &mut session, &mut timings).await;

    if let Err(ref err) = result {
        tracing::debug!(error = err as &dyn std::error::Error, "iteration failed");
    }

    Iteration {
        session,
        timings,
        result,
    }
}

async fn execute(
    remote: &HttpRemote,
    record: &UserRecord,
    session: &mut SessionState,
    timings: &mut Vec<StepTiming>,
) -> Result<(), IterationError> {
    let body = timed(timings, Step::Create, create(remote, record)).await?;
    let id = extract_id(&body);
    session.create_response_body = Some(body);
    let id = id?;
    tracing::debug!(%id, "created object");
    session.created_id = Some(id.clone());

    let put_body = timed(timings, Step::Update, update(remote, &id)).await?;
    tracing::debug!(body = %put_body, "updated object");
    let put_body = session.put_response_body.insert(put_body);

    let get_body = timed(timings, Step::Read, read(remote, &id)).await?;
    let get_body = session.get_response_body.insert(get_body);

    consistency::check(put_body, get_body)
}

async fn timed<F>(timings: &mut Vec<StepTiming>, step: Step, future: F) -> F::Output
where
    F: Future<Output = Result<String, IterationError>>,
{
    let start = Instant::now();
    let result = future.await;
    if result.is_ok() {
        timings.push(StepTiming {
            step,
            elapsed: start.elapsed(),
        });
    }
    result
}

/// Step 1: creates the object and returns the raw response body.
async fn create(remote: &HttpRemote, record: &UserRecord) -> Result<String, IterationError> {
    remote.create(record).await
}

/// Step 2: replaces the object and returns the raw response body.
async fn update(remote: &HttpRemote, id: &str) -> Result<String, IterationError> {
    remote.update(id, &updated_object()).await
}

/// Step 3: reads the object and returns the raw response body.
async fn read(remote: &HttpRemote, id: &str) -> Result<String, IterationError> {
    remote.read(id).await
}

/// Extracts the non-empty `id` of a created object.
///
/// Numeric ids are accepted and rendered in decimal.
fn extract_id(body: &str) -> Result<String, IterationError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|_| IterationError::extraction(Step::Create, "id", body))?;

    match value.get("id") {
        Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
        Some(Value::Number(id)) => Ok(id.to_string()),
        _ => Err(IterationError::extraction(Step::Create, "id", body)),
    }
}
