use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::agreement::ServiceAgreement;
use crate::submission::{
    AgreementStore, ConfirmationMailer, DocumentRenderer, SubmissionError, SubmissionPipeline,
    SubmissionReceipt,
};
use crate::validation::ValidationErrors;
use crate::wizard::pages::Page;
use crate::wizard::state::WizardState;
use crate::wizard::validation::validate_page;
use crate::wizard::WizardError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageTransition {
    pub from: Page,
    pub to: Page,
    pub progress: Page,
}

/// Proof that a Continue is in flight. Consumed by
/// [`WizardController::finish_continue`].
#[derive(Debug, PartialEq, Eq)]
pub struct ContinueTicket {
    id: u64,
    page: Page,
}

impl ContinueTicket {
    pub fn page(&self) -> Page {
        self.page
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ContinueOutcome {
    Pending(ContinueTicket),
    Advanced(PageTransition),
    /// Another Continue was already in flight, or the ticket is stale.
    Ignored,
}

/// Owns one session's [`WizardState`] and is the only thing that moves it
/// between pages.
pub struct WizardController {
    state: WizardState,
    pending: Option<u64>,
    next_ticket: u64,
    audit: Option<(Arc<dyn AuditSink>, AuditContext)>,
}

impl WizardController {
    pub fn new(mut state: WizardState) -> Self {
        state.normalize();
        Self { state, pending: None, next_ticket: 0, audit: None }
    }

    pub fn for_agreement(agreement: &ServiceAgreement) -> Self {
        Self::new(WizardState::for_agreement(agreement))
    }

    pub fn with_audit(mut self, sink: Arc<dyn AuditSink>, context: AuditContext) -> Self {
        self.audit = Some((sink, context));
        self
    }

    pub fn state(&self) -> &WizardState {
        &self.state
    }

    /// Field edits go through the state's named setters.
    pub fn state_mut(&mut self) -> &mut WizardState {
        &mut self.state
    }

    pub fn into_state(self) -> WizardState {
        self.state
    }

    pub fn is_continue_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Navigation-link jump. Backward and same-page jumps always succeed;
    /// forward jumps only reach pages already visited.
    pub fn set_page(&mut self, requested: Page) -> Result<PageTransition, WizardError> {
        self.ensure_idle()?;
        let from = self.state.page();
        if requested > from && requested > self.state.progress() {
            let error = WizardError::PageNotReached { requested, progress: self.state.progress() };
            self.record_rejection("wizard.jump_rejected", from, &error);
            return Err(error);
        }
        Ok(self.move_to(from, requested, "wizard.page_jumped"))
    }

    pub fn back(&mut self) -> Result<PageTransition, WizardError> {
        self.ensure_idle()?;
        let from = self.state.page();
        let to = from.previous().ok_or(WizardError::NoPreviousPage)?;
        Ok(self.move_to(from, to, "wizard.page_back"))
    }

    /// Synchronous Continue: the current page contract is the only check.
    pub fn continue_page(&mut self) -> Result<ContinueOutcome, WizardError> {
        match self.begin_continue()? {
            ContinueOutcome::Pending(ticket) => self.finish_continue(ticket, Ok(())),
            other => Ok(other),
        }
    }

    pub fn begin_continue(&mut self) -> Result<ContinueOutcome, WizardError> {
        if self.pending.is_some() {
            return Ok(ContinueOutcome::Ignored);
        }
        let page = self.state.page();
        if page.next().is_none() {
            return Err(WizardError::NoNextPage { page });
        }

        self.next_ticket += 1;
        self.pending = Some(self.next_ticket);
        Ok(ContinueOutcome::Pending(ContinueTicket { id: self.next_ticket, page }))
    }

    /// Completes a Continue. The local page contract and `external` are both
    /// evaluated; the page advances only when neither reported errors.
    pub fn finish_continue(
        &mut self,
        ticket: ContinueTicket,
        external: Result<(), ValidationErrors>,
    ) -> Result<ContinueOutcome, WizardError> {
        if self.pending != Some(ticket.id) || self.state.page() != ticket.page {
            return Ok(ContinueOutcome::Ignored);
        }
        self.pending = None;

        let from = ticket.page;
        let mut errors = validate_page(&self.state, from);
        if let Err(external) = external {
            errors.extend(external);
        }

        if !errors.is_empty() {
            self.state.set_errors(errors.clone());
            let error = WizardError::Validation(errors);
            self.record_rejection("wizard.continue_rejected", from, &error);
            return Err(error);
        }

        let to = from.next().ok_or(WizardError::NoNextPage { page: from })?;
        Ok(ContinueOutcome::Advanced(self.move_to(from, to, "wizard.page_advanced")))
    }

    /// Continue with an awaited check that receives a snapshot of the state.
    pub async fn continue_with<F, Fut>(&mut self, check: F) -> Result<ContinueOutcome, WizardError>
    where
        F: FnOnce(WizardState) -> Fut,
        Fut: Future<Output = Result<(), ValidationErrors>>,
    {
        let ticket = match self.begin_continue()? {
            ContinueOutcome::Pending(ticket) => ticket,
            other => return Ok(other),
        };
        let guard = PendingContinue { id: ticket.id, controller: self };
        let external = check(guard.controller.state.clone()).await;
        guard.controller.finish_continue(ticket, external)
    }

    /// Abandons an in-flight Continue without moving the page.
    pub fn cancel_continue(&mut self, ticket: &ContinueTicket) {
        if self.pending == Some(ticket.id) {
            self.pending = None;
        }
    }

    /// Runs the submission pipeline and, on success, resets the session to
    /// its initial state. Any failure leaves the state untouched for retry.
    pub async fn submit<D, M, S>(
        &mut self,
        pipeline: &SubmissionPipeline<D, M, S>,
        agreement: &ServiceAgreement,
        signed_on: NaiveDate,
        correlation_id: &str,
    ) -> Result<SubmissionReceipt, SubmissionError>
    where
        D: DocumentRenderer,
        M: ConfirmationMailer,
        S: AgreementStore,
    {
        self.ensure_idle()?;
        match pipeline.submit(agreement, &self.state, signed_on, correlation_id).await {
            Ok(receipt) => {
                self.state.reset();
                self.pending = None;
                Ok(receipt)
            }
            Err(SubmissionError::Validation(errors)) => {
                self.state.set_errors(errors.clone());
                Err(SubmissionError::Validation(errors))
            }
            Err(error) => Err(error),
        }
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        if self.pending.is_some() {
            return Err(WizardError::ContinueInFlight);
        }
        Ok(())
    }

    fn move_to(&mut self, from: Page, to: Page, event_type: &str) -> PageTransition {
        self.state.move_to(to);
        let transition = PageTransition { from, to, progress: self.state.progress() };
        if let Some((sink, context)) = &self.audit {
            sink.emit(
                AuditEvent::new(
                    context.agreement_id.clone(),
                    context.correlation_id.clone(),
                    event_type,
                    AuditCategory::Wizard,
                    context.actor.clone(),
                    AuditOutcome::Success,
                )
                .with_metadata("from", from.number().to_string())
                .with_metadata("to", to.number().to_string())
                .with_metadata("progress", transition.progress.number().to_string()),
            );
        }
        transition
    }

    fn record_rejection(&self, event_type: &str, page: Page, error: &WizardError) {
        if let Some((sink, context)) = &self.audit {
            sink.emit(
                AuditEvent::new(
                    context.agreement_id.clone(),
                    context.correlation_id.clone(),
                    event_type,
                    AuditCategory::Wizard,
                    context.actor.clone(),
                    AuditOutcome::Rejected,
                )
                .with_metadata("page", page.number().to_string())
                .with_metadata("error", error.to_string()),
            );
        }
    }
}

/// Clears the pending ticket if a [`WizardController::continue_with`] future
/// is dropped before its check resolves.
struct PendingContinue<'a> {
    id: u64,
    controller: &'a mut WizardController,
}

impl Drop for PendingContinue<'_> {
    fn drop(&mut self) {
        if self.controller.pending == Some(self.id) {
            self.controller.pending = None;
        }
    }
}

impl Default for WizardController {
    fn default() -> Self {
        Self::new(WizardState::default())
    }
}
