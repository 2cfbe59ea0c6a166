use std::sync::Arc;
use std::time::Duration;

use conductor_load_instruments::Reporter;
use conductor_load_instruments_derive::conductor_instrument;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_ENCODING, CONTENT_TYPE};
use reqwest::Response;
use serde::Serialize;
use url::Url;

use crate::error::{ConductorClientError, ConductorClientResult};
use crate::types::{
    ExecuteOptions, ReturnStrategy, SearchResult, SignalResponse, StartWorkflowRequest, TaskResult,
    TokenRequest, TokenResponse, WorkflowId, WorkflowResponse, WORKFLOW_ID_HEADER,
};

const X_AUTHORIZATION: HeaderName = HeaderName::from_static("x-authorization");

/// Connection settings for [ConductorClient].
#[derive(Debug, Clone)]
pub struct ConductorClientConfig {
    /// Server URL without the `/api` suffix, for example `https://developer.orkescloud.com`.
    pub base_url: String,
    /// Sent as `X-Authorization` on every request when set.
    pub token: Option<String>,
    pub connect_timeout: Duration,
    /// Only speak HTTP/1.1, for servers or proxies that misbehave with HTTP/2.
    pub http1_only: bool,
}

impl ConductorClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            connect_timeout: Duration::from_secs(5),
            http1_only: false,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    pub fn with_http1_only(mut self, http1_only: bool) -> Self {
        self.http1_only = http1_only;
        self
    }
}

/// HTTP client for the Conductor workflow API that reports the timing of every call.
///
/// Cloning is cheap and clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct ConductorClient {
    client: reqwest::Client,
    base_url: Url,
    reporter: Arc<Reporter>,
}

impl ConductorClient {
    pub fn new(config: &ConductorClientConfig, reporter: Arc<Reporter>) -> ConductorClientResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(ConductorClientError::NotABaseUrl(config.base_url.clone()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(token)?;
            value.set_sensitive(true);
            headers.insert(X_AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout)
            .gzip(true);
        if config.http1_only {
            builder = builder.http1_only();
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            reporter,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Start a workflow and wait, up to [ExecuteOptions::wait_for_seconds], for the configured
    /// return strategy to be satisfied.
    ///
    /// Any status is returned as is. Only transport failures are errors.
    #[conductor_instrument(prefix = "conductor_")]
    pub async fn execute_workflow(
        &self,
        request: &StartWorkflowRequest,
        options: &ExecuteOptions,
    ) -> ConductorClientResult<WorkflowResponse> {
        let version = request.version.to_string();
        let mut url = self.endpoint(&["api", "workflow", "execute", &request.name, &version])?;
        url.query_pairs_mut()
            .append_pair("waitForSeconds", &options.wait_for_seconds.to_string())
            .append_pair("returnStrategy", options.return_strategy.as_str())
            .append_pair("consistency", options.consistency.as_str());

        let response = self.client.post(url).json(request).send().await?;
        let status = response.status().as_u16();
        let workflow_id = response
            .headers()
            .get(WORKFLOW_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(WorkflowId::from);
        discard_body(response).await;

        Ok(WorkflowResponse {
            status,
            workflow_id,
        })
    }

    /// Complete the task that `workflow_id` is blocked on, passing `body` as the task output.
    ///
    /// `workflow_id` is used as given so that callers can decide how a missing id is sent.
    #[conductor_instrument(prefix = "conductor_")]
    pub async fn signal_task<B: Serialize + ?Sized>(
        &self,
        workflow_id: &str,
        task_result: TaskResult,
        body: &B,
        return_strategy: ReturnStrategy,
    ) -> ConductorClientResult<SignalResponse> {
        let task_signal_url = self.task_signal_url(workflow_id, task_result, return_strategy)?;

        let response = self.client.post(task_signal_url).json(body).send().await?;
        let status = response.status().as_u16();
        discard_body(response).await;

        Ok(SignalResponse { status })
    }

    /// The URL that [ConductorClient::signal_task] posts to. Every signal to the same workflow
    /// with the same options goes to the same URL, whatever the body.
    pub fn task_signal_url(
        &self,
        workflow_id: &str,
        task_result: TaskResult,
        return_strategy: ReturnStrategy,
    ) -> ConductorClientResult<Url> {
        let mut url = self.endpoint(&[
            "api",
            "tasks",
            workflow_id,
            task_result.as_str(),
            "signal",
            "sync",
        ])?;
        url.query_pairs_mut()
            .append_pair("returnStrategy", return_strategy.as_str());

        Ok(url)
    }

    /// Exchange an access key for a token to use as `X-Authorization`.
    #[conductor_instrument(prefix = "conductor_")]
    pub async fn generate_token(
        &self,
        key_id: &str,
        key_secret: &str,
    ) -> ConductorClientResult<String> {
        let url = self.endpoint(&["api", "token"])?;
        let response = self
            .client
            .post(url)
            .json(&TokenRequest { key_id, key_secret })
            .send()
            .await?;
        let response = expect_success("generate_token", response).await?;

        Ok(response.json::<TokenResponse>().await?.token)
    }

    /// Register a workflow definition, replacing the existing definition of the same version.
    #[conductor_instrument(prefix = "conductor_")]
    pub async fn publish_workflow(
        &self,
        definition: &serde_json::Value,
    ) -> ConductorClientResult<()> {
        let mut url = self.endpoint(&["api", "metadata", "workflow"])?;
        url.query_pairs_mut()
            .append_pair("overwrite", "true")
            .append_pair("newVersion", "false");

        let response = self.client.post(url).json(definition).send().await?;
        let response = expect_success("publish_workflow", response).await?;
        discard_body(response).await;

        Ok(())
    }

    /// Ids of up to `size` workflows in the `RUNNING` state, bypassing the search cache.
    #[conductor_instrument(prefix = "conductor_")]
    pub async fn search_running_workflows(
        &self,
        size: usize,
    ) -> ConductorClientResult<Vec<WorkflowId>> {
        let mut url = self.endpoint(&["api", "workflow", "search"])?;
        url.query_pairs_mut()
            .append_pair("start", "0")
            .append_pair("size", &size.to_string())
            .append_pair("freeText", "*")
            .append_pair("query", "status = RUNNING")
            .append_pair("skipCache", "true");

        let response = self.client.get(url).send().await?;
        let response = expect_success("search_running_workflows", response).await?;
        let result = response.json::<SearchResult>().await?;

        Ok(result
            .results
            .into_iter()
            .map(|summary| summary.workflow_id)
            .collect())
    }

    #[conductor_instrument(prefix = "conductor_")]
    pub async fn terminate_workflow(&self, workflow_id: &WorkflowId) -> ConductorClientResult<()> {
        let url = self.endpoint(&["api", "workflow", workflow_id.as_str()])?;

        let response = self.client.delete(url).send().await?;
        let response = expect_success("terminate_workflow", response).await?;
        discard_body(response).await;

        Ok(())
    }

    fn endpoint(&self, segments: &[&str]) -> ConductorClientResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ConductorClientError::NotABaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);

        Ok(url)
    }
}

async fn expect_success(
    operation: &'static str,
    response: Response,
) -> ConductorClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ConductorClientError::UnexpectedStatus {
        operation,
        status: status.as_u16(),
        body,
    })
}

/// Read the body to the end so the connection can be reused.
async fn discard_body(response: Response) {
    if let Err(e) = response.bytes().await {
        log::debug!("Failed to read response body: {e}");
    }
}
