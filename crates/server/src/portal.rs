//! Customer-facing agreement form endpoints.
//!
//! - `GET  /agreement/{id}`: load an eligible agreement and a fresh form state
//! - `POST /agreement/{id}/summary`: price a form state against the stored agreement
//! - `POST /agreement/{id}/submit`: validate, render, notify and accept

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use upkeep_core::config::AgreementConfig;
use upkeep_core::domain::agreement::{check_eligibility, AgreementId, ServiceAgreement};
use upkeep_core::errors::{ApplicationError, InterfaceError};
use upkeep_core::submission::{
    AgreementStore, CollaboratorError, SubmissionError, SubmissionPipeline, SubmissionReceipt,
};
use upkeep_core::validation::FieldError;
use upkeep_core::{AgreementSummary, WizardState};
use upkeep_db::SqlAgreementRepository;

use crate::email::Mailer;
use crate::pdf::AgreementDocumentRenderer;

pub type AgreementPipeline =
    SubmissionPipeline<AgreementDocumentRenderer, Mailer, SqlAgreementRepository>;

#[derive(Clone)]
pub struct PortalState {
    pipeline: Arc<AgreementPipeline>,
    agreement: AgreementConfig,
}

impl PortalState {
    pub fn new(pipeline: AgreementPipeline, agreement: AgreementConfig) -> Self {
        Self { pipeline: Arc::new(pipeline), agreement }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AgreementView {
    pub agreement: ServiceAgreement,
    pub state: WizardState,
}

#[derive(Debug, Serialize)]
pub struct PortalError {
    pub error: String,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

type PortalResult<T> = Result<Json<T>, (StatusCode, Json<PortalError>)>;

pub fn router(state: PortalState) -> Router {
    Router::new()
        .route("/agreement/{id}", get(view_agreement))
        .route("/agreement/{id}/summary", post(price_agreement))
        .route("/agreement/{id}/submit", post(submit_agreement))
        .with_state(state)
}

async fn view_agreement(
    Path(id): Path<String>,
    State(state): State<PortalState>,
) -> PortalResult<AgreementView> {
    let correlation_id = new_correlation_id();
    let mut agreement = load_eligible(&state, &id, &correlation_id).await?;

    let opened = state
        .pipeline
        .store()
        .mark_opened(&agreement.id)
        .await
        .map_err(|e| persistence_error(&e, &correlation_id))?;
    if opened {
        agreement.mark_opened();
        info!(
            event_name = "portal.agreement.opened",
            correlation_id = %correlation_id,
            agreement_id = %agreement.id,
            "agreement opened for the first time"
        );
    }

    let form = WizardState::for_agreement(&agreement);
    Ok(Json(AgreementView { agreement, state: form }))
}

async fn price_agreement(
    Path(id): Path<String>,
    State(state): State<PortalState>,
    Json(mut form): Json<WizardState>,
) -> PortalResult<AgreementSummary> {
    let correlation_id = new_correlation_id();
    let agreement = load_eligible(&state, &id, &correlation_id).await?;

    form.bind_to(&agreement);
    Ok(Json(form.summary(&state.agreement.currency)))
}

async fn submit_agreement(
    Path(id): Path<String>,
    State(state): State<PortalState>,
    Json(mut form): Json<WizardState>,
) -> PortalResult<SubmissionReceipt> {
    let correlation_id = new_correlation_id();
    let agreement = load_eligible(&state, &id, &correlation_id).await?;

    form.bind_to(&agreement);
    let today = state.agreement.today();
    match state.pipeline.submit(&agreement, &form, today, &correlation_id).await {
        Ok(receipt) => Ok(Json(receipt)),
        Err(SubmissionError::Validation(errors)) => Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(PortalError {
                error: "Some details are missing or invalid.".to_string(),
                correlation_id,
                fields: errors.errors().to_vec(),
            }),
        )),
        Err(other) => Err(interface_error(other.into(), &correlation_id)),
    }
}

/// Every reason an agreement cannot be shown collapses to the same 404.
async fn load_eligible(
    state: &PortalState,
    id: &str,
    correlation_id: &str,
) -> Result<ServiceAgreement, (StatusCode, Json<PortalError>)> {
    let agreement_id = AgreementId(id.to_string());
    let loaded = state
        .pipeline
        .store()
        .load(&agreement_id)
        .await
        .map_err(|e| persistence_error(&e, correlation_id))?;

    let Some(agreement) = loaded else {
        info!(
            event_name = "portal.agreement.unavailable",
            correlation_id = %correlation_id,
            agreement_id = %agreement_id,
            reason = "missing",
            "agreement lookup failed"
        );
        return Err(interface_error(ApplicationError::NotFound, correlation_id));
    };

    if let Err(reason) = check_eligibility(&agreement, state.agreement.today()) {
        info!(
            event_name = "portal.agreement.unavailable",
            correlation_id = %correlation_id,
            agreement_id = %agreement_id,
            reason = ?reason,
            "agreement is not eligible"
        );
        return Err(interface_error(ApplicationError::NotFound, correlation_id));
    }

    Ok(agreement)
}

fn persistence_error(
    error: &CollaboratorError,
    correlation_id: &str,
) -> (StatusCode, Json<PortalError>) {
    interface_error(ApplicationError::Persistence(error.to_string()), correlation_id)
}

fn interface_error(
    error: ApplicationError,
    correlation_id: &str,
) -> (StatusCode, Json<PortalError>) {
    let mapped = error.into_interface(correlation_id);
    let status = match &mapped {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { message, .. } => {
            warn!(
                event_name = "portal.request.unavailable",
                correlation_id = %correlation_id,
                error = %message,
                "collaborator failure"
            );
            StatusCode::SERVICE_UNAVAILABLE
        }
        InterfaceError::Internal { message, .. } => {
            error!(
                event_name = "portal.request.internal",
                correlation_id = %correlation_id,
                error = %message,
                "internal failure"
            );
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (
        status,
        Json(PortalError {
            error: mapped.user_message().to_string(),
            correlation_id: mapped.correlation_id().to_string(),
            fields: Vec::new(),
        }),
    )
}

fn new_correlation_id() -> String {
    format!("req-{}", Uuid::new_v4().simple())
}
