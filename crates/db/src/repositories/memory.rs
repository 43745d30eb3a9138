use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use upkeep_core::domain::agreement::{AgreementId, AgreementStatus, ServiceAgreement};
use upkeep_core::submission::{
    AgreementAuditEntry, AgreementStore, CollaboratorError, SignatureRecord,
};

use super::{AgreementRepository, RepositoryError};

/// Keeps agreements, audit rows and signatures in process memory. Used by
/// tests across the workspace.
#[derive(Default)]
pub struct InMemoryAgreementRepository {
    agreements: RwLock<HashMap<String, ServiceAgreement>>,
    audit: RwLock<Vec<AgreementAuditEntry>>,
    signatures: RwLock<HashMap<String, SignatureRecord>>,
}

impl InMemoryAgreementRepository {
    pub fn with_agreements(agreements: impl IntoIterator<Item = ServiceAgreement>) -> Self {
        let map = agreements.into_iter().map(|a| (a.id.0.clone(), a)).collect();
        Self { agreements: RwLock::new(map), ..Self::default() }
    }
}

#[async_trait::async_trait]
impl AgreementRepository for InMemoryAgreementRepository {
    async fn find_by_id(
        &self,
        id: &AgreementId,
    ) -> Result<Option<ServiceAgreement>, RepositoryError> {
        let agreements = self.agreements.read().await;
        Ok(agreements.get(&id.0).cloned())
    }

    async fn save(&self, agreement: &ServiceAgreement) -> Result<(), RepositoryError> {
        let mut agreements = self.agreements.write().await;
        agreements.insert(agreement.id.0.clone(), agreement.clone());
        Ok(())
    }

    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, RepositoryError> {
        let mut agreements = self.agreements.write().await;
        Ok(agreements.get_mut(&id.0).is_some_and(ServiceAgreement::mark_opened))
    }

    async fn mark_accepted(
        &self,
        id: &AgreementId,
        _accepted_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut agreements = self.agreements.write().await;
        let agreement =
            agreements.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound(id.0.clone()))?;
        agreement.transition_to(AgreementStatus::Accepted).map_err(|_| {
            RepositoryError::Conflict {
                id: id.0.clone(),
                status: agreement.status.as_str().to_string(),
            }
        })
    }

    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), RepositoryError> {
        if !self.agreements.read().await.contains_key(&entry.agreement_id.0) {
            return Err(RepositoryError::NotFound(entry.agreement_id.0.clone()));
        }
        self.audit.write().await.push(entry.clone());
        Ok(())
    }

    async fn list_audit(
        &self,
        id: &AgreementId,
    ) -> Result<Vec<AgreementAuditEntry>, RepositoryError> {
        let audit = self.audit.read().await;
        Ok(audit.iter().filter(|entry| entry.agreement_id == *id).cloned().collect())
    }

    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), RepositoryError> {
        let mut signatures = self.signatures.write().await;
        if signatures.contains_key(&record.agreement_id.0) {
            return Err(RepositoryError::Conflict {
                id: record.agreement_id.0.clone(),
                status: AgreementStatus::Accepted.as_str().to_string(),
            });
        }
        signatures.insert(record.agreement_id.0.clone(), record.clone());
        Ok(())
    }

    async fn find_signature(
        &self,
        id: &AgreementId,
    ) -> Result<Option<SignatureRecord>, RepositoryError> {
        let signatures = self.signatures.read().await;
        Ok(signatures.get(&id.0).cloned())
    }
}

#[async_trait::async_trait]
impl AgreementStore for InMemoryAgreementRepository {
    async fn load(&self, id: &AgreementId) -> Result<Option<ServiceAgreement>, CollaboratorError> {
        Ok(AgreementRepository::find_by_id(self, id).await?)
    }

    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, CollaboratorError> {
        Ok(AgreementRepository::mark_opened(self, id).await?)
    }

    async fn mark_accepted(
        &self,
        id: &AgreementId,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::mark_accepted(self, id, accepted_at).await?)
    }

    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::append_audit(self, entry).await?)
    }

    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), CollaboratorError> {
        Ok(AgreementRepository::save_signature(self, record).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use upkeep_core::domain::agreement::{AgreementId, AgreementStatus};
    use upkeep_core::submission::AgreementStore;

    use super::InMemoryAgreementRepository;
    use crate::repositories::fixtures::agreement;
    use crate::repositories::{AgreementRepository, RepositoryError};

    #[tokio::test]
    async fn opened_then_accepted() {
        let repo =
            InMemoryAgreementRepository::with_agreements([agreement(
                "SA-1",
                AgreementStatus::Sent,
            )]);
        let id = AgreementId("SA-1".to_string());

        assert!(AgreementRepository::mark_opened(&repo, &id).await.expect("open"));
        assert!(!AgreementRepository::mark_opened(&repo, &id).await.expect("reopen"));
        AgreementRepository::mark_accepted(&repo, &id, Utc::now()).await.expect("accept");

        let stored = repo.find_by_id(&id).await.expect("find").expect("exists");
        assert_eq!(stored.status, AgreementStatus::Accepted);
    }

    #[tokio::test]
    async fn voided_agreements_conflict_on_accept() {
        let repo = InMemoryAgreementRepository::with_agreements([agreement(
            "SA-2",
            AgreementStatus::Voided,
        )]);

        let error =
            AgreementRepository::mark_accepted(&repo, &AgreementId("SA-2".into()), Utc::now())
                .await
                .expect_err("voided");

        assert!(matches!(
            error,
            RepositoryError::Conflict { ref status, .. } if status == "voided"
        ));
    }

    #[tokio::test]
    async fn store_view_surfaces_missing_agreements_as_none() {
        let repo = InMemoryAgreementRepository::default();

        let loaded = repo.load(&AgreementId("SA-404".into())).await.expect("load");
        let error = AgreementStore::mark_accepted(&repo, &AgreementId("SA-404".into()), Utc::now())
            .await
            .expect_err("missing");

        assert_eq!(loaded, None);
        assert!(error.0.contains("SA-404"));
    }
}
