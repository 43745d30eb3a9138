use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use upkeep_core::domain::agreement::{AgreementId, ServiceAgreement};
use upkeep_core::submission::{AgreementAuditEntry, CollaboratorError, SignatureRecord};

pub mod agreement;
pub mod memory;

pub use agreement::SqlAgreementRepository;
pub use memory::InMemoryAgreementRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("agreement `{0}` was not found")]
    NotFound(String),
    #[error("agreement `{id}` is {status} and cannot be accepted")]
    Conflict { id: String, status: String },
}

impl From<RepositoryError> for CollaboratorError {
    fn from(value: RepositoryError) -> Self {
        CollaboratorError::new(value.to_string())
    }
}

/// Persistence for agreements loaded from the job-management snapshot and
/// the records written when a customer accepts.
#[async_trait]
pub trait AgreementRepository: Send + Sync {
    async fn find_by_id(&self, id: &AgreementId)
        -> Result<Option<ServiceAgreement>, RepositoryError>;
    async fn save(&self, agreement: &ServiceAgreement) -> Result<(), RepositoryError>;
    /// Moves `draft`/`sent` to `opened`. Returns whether a row changed.
    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, RepositoryError>;
    async fn mark_accepted(
        &self,
        id: &AgreementId,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), RepositoryError>;
    async fn list_audit(
        &self,
        id: &AgreementId,
    ) -> Result<Vec<AgreementAuditEntry>, RepositoryError>;
    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), RepositoryError>;
    async fn find_signature(
        &self,
        id: &AgreementId,
    ) -> Result<Option<SignatureRecord>, RepositoryError>;
}
