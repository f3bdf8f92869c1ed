//! Creation of the process record a workflow instance is bound to.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{ProcessId, UserId},
    protocol::{CreateProcessRequest, ProcessRecord, SeedGeneralDataRequest, DRAFT_PROCESS_STATUS},
};
use tracing::{debug, warn};
use url::Url;

use crate::engine_client::error_message;

#[async_trait]
pub trait ProcessService: Send + Sync {
    async fn create_process(&self, user_id: &UserId) -> Result<ProcessId>;
}

pub struct MissingProcessService;

#[async_trait]
impl ProcessService for MissingProcessService {
    async fn create_process(&self, _user_id: &UserId) -> Result<ProcessId> {
        Err(anyhow!("process api is not configured"))
    }
}

pub struct HttpProcessService {
    http: Client,
    base_url: Url,
}

impl HttpProcessService {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("invalid process api url '{base_url}'"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("process api url '{base_url}' cannot be used as a base url");
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build process api http client")?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("invalid process api base url {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn seed_general_data(&self, process_id: &ProcessId) -> Result<()> {
        let url = self.endpoint(&["api", "v1", "processos", process_id.as_str(), "dados-gerais"])?;
        let response = self
            .http
            .put(url)
            .json(&SeedGeneralDataRequest {
                processo_id: process_id.clone(),
            })
            .send()
            .await
            .context("general data request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "general data request rejected: {}",
                error_message(status, &body)
            );
        }
        Ok(())
    }
}

#[async_trait]
impl ProcessService for HttpProcessService {
    async fn create_process(&self, user_id: &UserId) -> Result<ProcessId> {
        // trailing empty segment keeps the collection slash
        let url = self.endpoint(&["api", "v1", "processos", ""])?;
        debug!(%url, %user_id, "creating process");
        let response = self
            .http
            .post(url)
            .json(&CreateProcessRequest {
                user_id: user_id.clone(),
                status: DRAFT_PROCESS_STATUS.to_string(),
            })
            .send()
            .await
            .context("process creation request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("process creation rejected: {}", error_message(status, &body));
        }
        let record: ProcessRecord = response
            .json()
            .await
            .context("invalid process creation response")?;

        // the record exists already; a failed seed is left for the form steps to fill
        if let Err(err) = self.seed_general_data(&record.id).await {
            warn!(process_id = %record.id, "failed to seed general data: {err:#}");
        }
        Ok(record.id)
    }
}

#[cfg(test)]
#[path = "tests/process_service_tests.rs"]
mod tests;
