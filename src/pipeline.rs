//! Generation Pipeline
//!
//! Wires the dispatcher, provider client, recovery and status reporting into the
//! single entry point every generator uses: enqueue one provider call, wait for
//! it, then recover a structured record from the raw text.

use crate::config::TaleforgeConfig;
use crate::content::ContentKind;
use crate::error::{DispatchError, PipelineError};
use crate::provider::{CompletionRequest, ProviderClient, ProviderFactory};
use crate::queue::{JobState, QueueDispatcher, QueueSnapshot};
use crate::recovery::{recover, RecoveryOptions};
use crate::status::{Stage, StatusReport, StatusReporter};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a generator endpoint asks for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub kind: ContentKind,
    pub prompt: String,
    /// Form inputs; also the only source for fallback synthesis
    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl GenerationRequest {
    pub fn new(kind: ContentKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            parameters: Map::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// Recovered generation result
#[derive(Debug, Clone, Serialize)]
pub struct Generated {
    pub kind: ContentKind,
    pub data: Value,
    /// Recovery tier that produced `data`
    pub tier: u8,
    /// `data` was synthesized from request parameters
    pub degraded: bool,
    /// The provider stopped at its token limit
    pub truncated: bool,
}

/// Payload for the status-check endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(flatten)]
    pub queue: QueueSnapshot,
    pub stage: Stage,
    #[serde(flatten)]
    pub report: StatusReport,
}

pub struct GenerationPipeline {
    dispatcher: Arc<QueueDispatcher>,
    client: Arc<dyn ProviderClient>,
    reporter: StatusReporter,
    /// Parent of every in-flight call's token
    cancel: CancellationToken,
}

impl GenerationPipeline {
    pub fn new(
        dispatcher: Arc<QueueDispatcher>,
        client: Arc<dyn ProviderClient>,
        reporter: StatusReporter,
    ) -> Self {
        Self {
            dispatcher,
            client,
            reporter,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the dispatcher and provider client from configuration.
    /// Workers are not running until [`GenerationPipeline::start`] is called.
    pub fn from_config(config: &TaleforgeConfig) -> Result<Self, PipelineError> {
        config.queue.validate().map_err(PipelineError::ConfigError)?;
        let client = ProviderFactory::create_client(&config.provider)?;
        Ok(Self::new(
            Arc::new(QueueDispatcher::new(config.queue.clone())),
            client,
            StatusReporter::new(config.status.average_job_seconds),
        ))
    }

    pub fn start(&self) -> Result<(), DispatchError> {
        self.dispatcher.start()
    }

    /// Cancel in-flight provider calls, then stop the dispatcher.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.dispatcher.stop().await;
    }

    pub fn dispatcher(&self) -> &Arc<QueueDispatcher> {
        &self.dispatcher
    }

    pub fn reporter(&self) -> StatusReporter {
        self.reporter
    }

    /// Queue one generation and recover its output.
    ///
    /// Provider failures come back unchanged; nothing here retries.
    pub async fn generate(
        &self,
        user_id: &str,
        request: GenerationRequest,
    ) -> Result<Generated, PipelineError> {
        let GenerationRequest {
            kind,
            prompt,
            parameters,
        } = request;

        let completion = CompletionRequest {
            messages: kind.build_messages(&prompt, &parameters),
            temperature: None,
            max_tokens: None,
        };
        let client = Arc::clone(&self.client);
        let reporter = self.reporter;
        let job_user = user_id.to_string();
        let cancel = self.cancel.child_token();

        let handle = self.dispatcher.enqueue(user_id, move || async move {
            let report = reporter.report(Stage::Generating, None);
            debug!(user_id = %job_user, kind = %kind, progress = report.progress_percent, "{}", report.message);
            client.call(&completion, cancel).await
        })?;

        if let Some(JobState::Queued { position }) = self.dispatcher.job_state(handle.id()) {
            let report = self.reporter.report(Stage::Queued, Some(position));
            debug!(
                user_id,
                kind = %kind,
                position,
                estimated_seconds = report.estimated_seconds,
                "{}",
                report.message
            );
        }

        let raw = match handle.await {
            Ok(raw) => raw,
            Err(e) => {
                let report = self.reporter.report(Stage::Error, None);
                warn!(user_id, kind = %kind, error = %e, "{}", report.message);
                return Err(e);
            }
        };

        let truncated = raw.is_truncated();
        let mut options = RecoveryOptions::truncated(truncated).require(kind.required_fields().iter().copied());
        options.fallback = kind.fallback_from(&parameters);

        let recovered = match recover(&raw.content, &options) {
            Ok(recovered) => recovered,
            Err(e) => {
                let report = self.reporter.report(Stage::Error, None);
                warn!(user_id, kind = %kind, truncated, "{}", report.message);
                return Err(e.into());
            }
        };

        if recovered.is_degraded() {
            warn!(user_id, kind = %kind, "Returning fallback record built from request parameters");
        }
        let report = self.reporter.report(Stage::Complete, None);
        info!(user_id, kind = %kind, tier = recovered.tier, truncated, "{}", report.message);

        Ok(Generated {
            kind,
            degraded: recovered.is_degraded(),
            tier: recovered.tier,
            data: recovered.value,
            truncated,
        })
    }

    /// Status for a polling client. A user with nothing outstanding reads as complete.
    pub fn status(&self, user_id: &str) -> StatusResponse {
        let queue = self.dispatcher.status(user_id);
        let (stage, position) = match self.dispatcher.user_state(user_id) {
            Some(JobState::Queued { position }) => (Stage::Queued, Some(position)),
            Some(JobState::Running) => (Stage::Generating, None),
            None => (Stage::Complete, None),
        };
        StatusResponse {
            queue,
            stage,
            report: self.reporter.report(stage, position),
        }
    }
}
