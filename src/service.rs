//! Caller-side generation service.
//!
//! Generator endpoints check the token ledger, run the pipeline, charge the user
//! and auto-save the result. The ledger and store are external collaborators;
//! only their interfaces live here.

use crate::content::ContentKind;
use crate::error::ServiceError;
use crate::pipeline::{GenerationPipeline, GenerationRequest};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Auto-saved content expires unless the user keeps it
pub const AUTO_SAVE_TTL_DAYS: i64 = 30;

#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn has_enough_tokens(&self, user_id: &str) -> Result<bool, ServiceError>;

    /// Returns `false` when the balance no longer covers `amount`
    async fn deduct_tokens(&self, user_id: &str, amount: u32) -> Result<bool, ServiceError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveRequest {
    pub kind: ContentKind,
    pub data: Value,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedRecord {
    pub id: String,
    pub kind: ContentKind,
    pub user_id: String,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn auto_save_content(&self, request: AutoSaveRequest) -> Result<SavedRecord, ServiceError>;
}

/// Output of a charged and persisted generation
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReceipt {
    pub record: SavedRecord,
    pub tier: u8,
    pub degraded: bool,
}

pub struct GenerationService {
    pipeline: Arc<GenerationPipeline>,
    ledger: Arc<dyn TokenLedger>,
    store: Arc<dyn ContentStore>,
    cost: u32,
}

impl GenerationService {
    pub fn new(
        pipeline: Arc<GenerationPipeline>,
        ledger: Arc<dyn TokenLedger>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        Self {
            pipeline,
            ledger,
            store,
            cost: 1,
        }
    }

    /// Tokens charged per successful generation
    pub fn with_cost(mut self, cost: u32) -> Self {
        self.cost = cost;
        self
    }

    pub fn pipeline(&self) -> &Arc<GenerationPipeline> {
        &self.pipeline
    }

    /// Users are only charged once a record has been recovered.
    pub async fn generate(
        &self,
        user_id: &str,
        request: GenerationRequest,
    ) -> Result<GenerationReceipt, ServiceError> {
        if !self.ledger.has_enough_tokens(user_id).await? {
            warn!(user_id, "Generation refused: insufficient tokens");
            return Err(ServiceError::InsufficientTokens(user_id.to_string()));
        }

        let kind = request.kind;
        let generated = self.pipeline.generate(user_id, request).await?;

        if !self.ledger.deduct_tokens(user_id, self.cost).await? {
            warn!(user_id, cost = self.cost, "Token deduction failed after generation");
            return Err(ServiceError::InsufficientTokens(user_id.to_string()));
        }

        let record = self
            .store
            .auto_save_content(AutoSaveRequest {
                kind,
                data: generated.data,
                user_id: user_id.to_string(),
                expires_at: Utc::now() + Duration::days(AUTO_SAVE_TTL_DAYS),
            })
            .await?;
        info!(user_id, kind = %kind, record_id = %record.id, "Auto-saved generated content");

        Ok(GenerationReceipt {
            record,
            tier: generated.tier,
            degraded: generated.degraded,
        })
    }
}
