// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Request/response client for the assemble service.

use std::future::Future;
use std::time::Duration;

use isa_app_core::config::ClientConfig;
use isa_session_proto::{AssembleRequest, AssembleResult, ServiceInfo};
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of the synthetic diagnostic produced when the service is unreachable.
pub const ASSEMBLE_ERROR_PREFIX: &str = "Assemble error";

/// Per-request timeout for the HTTP client.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport-level failures talking to the assemble service.
#[derive(Debug, Error)]
pub enum AssembleError {
    /// Connect, timeout, or body decode failure.
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// The service answered with a non-success status.
    #[error("service answered HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },
}

/// Port for assembling source text.
///
/// Implementations never fail: transport problems come back as an
/// [`AssembleResult`] with `success == false` and a single diagnostic.
pub trait AssembleClient {
    /// Assemble `source`.
    fn post_assemble(&self, source: &str) -> impl Future<Output = AssembleResult> + Send;
}

/// [`AssembleClient`] over HTTP (`POST {api}/assemble`).
#[derive(Debug, Clone)]
pub struct HttpAssembleClient {
    http: reqwest::Client,
    assemble_url: String,
    info_url: String,
}

impl HttpAssembleClient {
    /// Build a client for the endpoints in `config`.
    pub fn new(config: &ClientConfig) -> Result<Self, AssembleError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, config))
    }

    /// Build around an existing `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, config: &ClientConfig) -> Self {
        Self {
            http,
            assemble_url: config.assemble_url(),
            info_url: config.info_url(),
        }
    }

    /// Assemble, surfacing transport failures as errors.
    pub async fn try_assemble(&self, source: &str) -> Result<AssembleResult, AssembleError> {
        let request = AssembleRequest {
            source: source.to_owned(),
        };
        let response = self
            .http
            .post(&self.assemble_url)
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssembleError::Status {
                status: status.as_u16(),
            });
        }
        let result: AssembleResult = response.json().await?;
        debug!(
            success = result.success,
            words = result.binary.len(),
            errors = result.errors.len(),
            "assemble response"
        );
        Ok(result)
    }

    /// Probe the service root.
    pub async fn service_info(&self) -> Result<ServiceInfo, AssembleError> {
        let response = self.http.get(&self.info_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AssembleError::Status {
                status: status.as_u16(),
            });
        }
        Ok(response.json().await?)
    }
}

impl AssembleClient for HttpAssembleClient {
    fn post_assemble(&self, source: &str) -> impl Future<Output = AssembleResult> + Send {
        let source = source.to_owned();
        async move {
            match self.try_assemble(&source).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(%err, url = %self.assemble_url, "assemble request failed");
                    AssembleResult::failure(format!("{ASSEMBLE_ERROR_PREFIX}: {err}"))
                }
            }
        }
    }
}
