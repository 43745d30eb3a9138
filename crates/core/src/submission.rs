//! Terminal submission: validate, render, notify, persist.
//!
//! The steps run in a fixed order and are not a transaction. A rendering
//! failure stops before any status write. A failure in any persistence step
//! fails the whole submission even though a document already exists, so an
//! agreement is never silently half-accepted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::audit::{AuditCategory, AuditEvent, AuditOutcome, AuditSink, NoopAuditSink};
use crate::domain::agreement::{check_eligibility, AgreementId, ServiceAgreement};
use crate::errors::{ApplicationError, DomainError};
use crate::pricing::{format_money, AgreementSummary};
use crate::validation::ValidationErrors;
use crate::wizard::{validate_all, WizardError, WizardState};

/// Failure reported by an external collaborator (renderer, mailer, store).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct CollaboratorError(pub String);

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("submission is incomplete: {0}")]
    Validation(ValidationErrors),
    #[error("agreement document could not be generated: {0}")]
    Document(String),
    #[error("agreement could not be saved: {0}")]
    Persistence(String),
    #[error("agreement not found or no longer available")]
    NotFound,
    #[error(transparent)]
    Wizard(#[from] WizardError),
}

impl From<SubmissionError> for ApplicationError {
    fn from(value: SubmissionError) -> Self {
        match value {
            SubmissionError::Validation(errors) => Self::Validation(errors.to_string()),
            SubmissionError::Document(message) => Self::Integration(message),
            SubmissionError::Persistence(message) => Self::Persistence(message),
            SubmissionError::NotFound => Self::NotFound,
            SubmissionError::Wizard(error) => Self::Domain(DomainError::Wizard(error)),
        }
    }
}

/// Everything the document template needs.
#[derive(Clone, Debug, Serialize)]
pub struct AgreementDocument<'a> {
    pub company_name: &'a str,
    pub agreement: &'a ServiceAgreement,
    pub state: &'a WizardState,
    pub summary: &'a AgreementSummary,
    pub signed_on: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedDocument {
    pub file_name: String,
    pub content_type: String,
    /// Where the artifact was stored.
    pub location: String,
    pub size_bytes: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationEmail {
    pub to: String,
    pub cc: Option<String>,
    pub subject: String,
    pub body: String,
    pub attachment: RenderedDocument,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementAuditEntry {
    pub agreement_id: AgreementId,
    pub action: String,
    pub actor: String,
    pub detail: String,
    pub correlation_id: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureRecord {
    pub agreement_id: AgreementId,
    pub signatory_name: String,
    pub signatory_position: String,
    pub signature_data: String,
    pub signed_on: NaiveDate,
    pub document_location: String,
}

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(
        &self,
        document: &AgreementDocument<'_>,
    ) -> Result<RenderedDocument, CollaboratorError>;
}

#[async_trait]
pub trait ConfirmationMailer: Send + Sync {
    async fn send(&self, email: &ConfirmationEmail) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait AgreementStore: Send + Sync {
    async fn load(&self, id: &AgreementId) -> Result<Option<ServiceAgreement>, CollaboratorError>;
    /// Returns whether a write happened.
    async fn mark_opened(&self, id: &AgreementId) -> Result<bool, CollaboratorError>;
    async fn mark_accepted(
        &self,
        id: &AgreementId,
        accepted_at: DateTime<Utc>,
    ) -> Result<(), CollaboratorError>;
    async fn append_audit(&self, entry: &AgreementAuditEntry) -> Result<(), CollaboratorError>;
    async fn save_signature(&self, record: &SignatureRecord) -> Result<(), CollaboratorError>;

    /// Status change, audit entry and signature for one acceptance. Stores
    /// that can write all three atomically should override this.
    async fn record_acceptance(
        &self,
        accepted_at: DateTime<Utc>,
        entry: &AgreementAuditEntry,
        signature: &SignatureRecord,
    ) -> Result<(), CollaboratorError> {
        self.mark_accepted(&entry.agreement_id, accepted_at).await?;
        self.append_audit(entry).await?;
        self.save_signature(signature).await
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmissionSettings {
    pub company_name: String,
    pub currency: String,
    pub email_enabled: bool,
    pub internal_recipient: Option<String>,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self {
            company_name: "Upkeep Services".to_string(),
            currency: "AUD".to_string(),
            email_enabled: false,
            internal_recipient: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub agreement_id: AgreementId,
    pub document: RenderedDocument,
    pub email_sent: bool,
    pub accepted_at: DateTime<Utc>,
    pub summary: AgreementSummary,
}

pub struct SubmissionPipeline<D, M, S> {
    renderer: D,
    mailer: M,
    store: S,
    settings: SubmissionSettings,
    audit_sink: Arc<dyn AuditSink>,
}

impl<D, M, S> SubmissionPipeline<D, M, S>
where
    D: DocumentRenderer,
    M: ConfirmationMailer,
    S: AgreementStore,
{
    pub fn new(renderer: D, mailer: M, store: S, settings: SubmissionSettings) -> Self {
        Self { renderer, mailer, store, settings, audit_sink: Arc::new(NoopAuditSink) }
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit_sink = sink;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SubmissionSettings {
        &self.settings
    }

    /// Loads the agreement and refuses anything no longer eligible before
    /// running [`Self::submit`].
    pub async fn submit_by_id(
        &self,
        id: &AgreementId,
        state: &WizardState,
        today: NaiveDate,
        correlation_id: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let agreement = self
            .store
            .load(id)
            .await
            .map_err(|error| SubmissionError::Persistence(error.to_string()))?
            .ok_or(SubmissionError::NotFound)?;
        if check_eligibility(&agreement, today).is_err() {
            return Err(SubmissionError::NotFound);
        }
        self.submit(&agreement, state, today, correlation_id).await
    }

    pub async fn submit(
        &self,
        agreement: &ServiceAgreement,
        state: &WizardState,
        signed_on: NaiveDate,
        correlation_id: &str,
    ) -> Result<SubmissionReceipt, SubmissionError> {
        let agreement_id = &agreement.id;

        let errors = validate_all(state);
        if !errors.is_empty() {
            info!(
                event_name = "agreement.submission.rejected",
                correlation_id = %correlation_id,
                agreement_id = %agreement_id,
                invalid_fields = errors.len(),
                "submission failed validation"
            );
            self.audit(
                agreement,
                correlation_id,
                "submission.validation_failed",
                AuditOutcome::Rejected,
            );
            return Err(SubmissionError::Validation(errors));
        }

        let summary = state.summary(&self.settings.currency);
        let document = AgreementDocument {
            company_name: &self.settings.company_name,
            agreement,
            state,
            summary: &summary,
            signed_on,
        };
        let rendered = match self.renderer.render(&document).await {
            Ok(rendered) => rendered,
            Err(render_error) => {
                error!(
                    event_name = "agreement.submission.document_failed",
                    correlation_id = %correlation_id,
                    agreement_id = %agreement_id,
                    error = %render_error,
                    "agreement document generation failed"
                );
                self.audit(
                    agreement,
                    correlation_id,
                    "submission.document_failed",
                    AuditOutcome::Failed,
                );
                return Err(SubmissionError::Document(render_error.to_string()));
            }
        };
        info!(
            event_name = "agreement.submission.document_rendered",
            correlation_id = %correlation_id,
            agreement_id = %agreement_id,
            location = %rendered.location,
            "agreement document rendered"
        );

        let email_sent =
            self.send_confirmation(agreement, state, &summary, &rendered, correlation_id).await;

        let accepted_at = Utc::now();
        let persisted = self
            .persist(agreement, state, signed_on, &rendered, accepted_at, correlation_id)
            .await;
        if let Err(persist_error) = persisted {
            error!(
                event_name = "agreement.submission.persistence_failed",
                correlation_id = %correlation_id,
                agreement_id = %agreement_id,
                error = %persist_error,
                "agreement acceptance could not be saved"
            );
            self.audit(
                agreement,
                correlation_id,
                "submission.persistence_failed",
                AuditOutcome::Failed,
            );
            return Err(SubmissionError::Persistence(persist_error.to_string()));
        }

        info!(
            event_name = "agreement.submission.accepted",
            correlation_id = %correlation_id,
            agreement_id = %agreement_id,
            email_sent,
            annual_total = %summary.annual_total,
            "agreement accepted"
        );
        self.audit(agreement, correlation_id, "submission.accepted", AuditOutcome::Success);

        Ok(SubmissionReceipt {
            agreement_id: agreement_id.clone(),
            document: rendered,
            email_sent,
            accepted_at,
            summary,
        })
    }

    async fn send_confirmation(
        &self,
        agreement: &ServiceAgreement,
        state: &WizardState,
        summary: &AgreementSummary,
        rendered: &RenderedDocument,
        correlation_id: &str,
    ) -> bool {
        let recipient = state.billing().contact.email.trim();
        if !self.settings.email_enabled || recipient.is_empty() {
            return false;
        }

        let email = ConfirmationEmail {
            to: recipient.to_string(),
            cc: self.settings.internal_recipient.clone(),
            subject: format!("{} service agreement {}", self.settings.company_name, agreement.id),
            body: format!(
                "Thank you {}. Your service agreement {} has been accepted.\n\
                 Annual total: {}\nContract total ({} years): {}",
                state.signature().signatory_name.trim(),
                agreement.id,
                format_money(summary.annual_total),
                summary.contract_years,
                format_money(summary.contract_total),
            ),
            attachment: rendered.clone(),
        };

        match self.mailer.send(&email).await {
            Ok(()) => {
                info!(
                    event_name = "agreement.submission.email_sent",
                    correlation_id = %correlation_id,
                    agreement_id = %agreement.id,
                    "confirmation email sent"
                );
                true
            }
            Err(mail_error) => {
                warn!(
                    event_name = "agreement.submission.email_failed",
                    correlation_id = %correlation_id,
                    agreement_id = %agreement.id,
                    error = %mail_error,
                    "confirmation email failed; continuing with acceptance"
                );
                false
            }
        }
    }

    async fn persist(
        &self,
        agreement: &ServiceAgreement,
        state: &WizardState,
        signed_on: NaiveDate,
        rendered: &RenderedDocument,
        accepted_at: DateTime<Utc>,
        correlation_id: &str,
    ) -> Result<(), CollaboratorError> {
        let signature = state.signature();
        let entry = AgreementAuditEntry {
            agreement_id: agreement.id.clone(),
            action: "accepted".to_string(),
            actor: signature.signatory_name.trim().to_string(),
            detail: format!(
                "signed by {} ({}); document {}",
                signature.signatory_name.trim(),
                signature.signatory_position.trim(),
                rendered.file_name
            ),
            correlation_id: correlation_id.to_string(),
            recorded_at: accepted_at,
        };
        let record = SignatureRecord {
            agreement_id: agreement.id.clone(),
            signatory_name: signature.signatory_name.trim().to_string(),
            signatory_position: signature.signatory_position.trim().to_string(),
            signature_data: signature.signature.clone().unwrap_or_default(),
            signed_on,
            document_location: rendered.location.clone(),
        };

        self.store.record_acceptance(accepted_at, &entry, &record).await
    }

    fn audit(
        &self,
        agreement: &ServiceAgreement,
        correlation_id: &str,
        event_type: &str,
        outcome: AuditOutcome,
    ) {
        self.audit_sink.emit(AuditEvent::new(
            Some(agreement.id.clone()),
            correlation_id,
            event_type,
            AuditCategory::Submission,
            "submission",
            outcome,
        ));
    }
}
