//! Contains the HTTP remote used to talk to the objects API.

use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;

use crate::error::{IterationError, Step};

/// A remote objects API reachable over HTTP.
///
/// The remote is shared by all logical users; it holds no per-user state.
#[derive(Debug)]
pub struct HttpRemote {
    base_url: Url,
    client: Client,
}

impl HttpRemote {
    /// Creates a remote for the given collection URL.
    ///
    /// Every request carries `Accept` and `Content-Type` headers for JSON and is aborted after
    /// `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "base url `{base_url}` cannot carry object paths"
        );

        let mut headers = HeaderMap::new();
        let json = HeaderValue::from_static("application/json");
        headers.insert(header::ACCEPT, json.clone());
        headers.insert(header::CONTENT_TYPE, json);

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self { base_url, client })
    }

    /// The collection URL that objects are created in.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the URL of the object with the given `id`.
    ///
    /// The id is appended as a single percent-encoded path segment.
    pub fn object_url(&self, id: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(id);
        }
        url
    }

    /// `POST {base_url}` with a JSON body.
    pub(crate) async fn create<T: Serialize>(&self, body: &T) -> Result<String, IterationError> {
        let request = self.client.post(self.base_url.clone()).json(body);
        self.send(Step::Create, request).await
    }

    /// `PUT {base_url}/{id}` with a JSON body.
    pub(crate) async fn update<T: Serialize>(
        &self,
        id: &str,
        body: &T,
    ) -> Result<String, IterationError> {
        let request = self.client.put(self.object_url(id)).json(body);
        self.send(Step::Update, request).await
    }

    /// `GET {base_url}/{id}`.
    pub(crate) async fn read(&self, id: &str) -> Result<String, IterationError> {
        let request = self.client.get(self.object_url(id));
        self.send(Step::Read, request).await
    }

    /// Sends the request and returns the buffered response body.
    ///
    /// Only `200 OK` is accepted. Transport errors and any other status, including other 2xx
    /// codes, are mapped to [`IterationError`]s for `step`.
    async fn send(
        &self,
        step: Step,
        request: reqwest::RequestBuilder,
    ) -> Result<String, IterationError> {
        let transport = |source| IterationError::Transport { step, source };

        let response = request.send().await.map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        tracing::trace!(%step, %status, body_len = body.len(), "received response");

        if status != StatusCode::OK {
            return Err(IterationError::Status { step, status });
        }

        Ok(body)
    }
}
