//! Seven-page form state machine.
//!
//! [`WizardState`] holds everything the form edits. [`WizardController`]
//! owns one state and is the only way to move between pages: Continue is
//! gated by the page contracts in [`validation`], Back and jumps to visited
//! pages are not.

pub mod engine;
pub mod pages;
pub mod state;
pub mod validation;

use thiserror::Error;

use crate::validation::ValidationErrors;

pub use engine::{ContinueOutcome, ContinueTicket, PageTransition, WizardController};
pub use pages::Page;
pub use state::{BillingDetails, CompanyDetails, SignatureCapture, WizardState};
pub use validation::{validate_all, validate_page};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("{page} is the last page; submit instead of continuing")]
    NoNextPage { page: Page },
    #[error("already on the first page")]
    NoPreviousPage,
    #[error("cannot jump to {requested}; furthest page reached is {progress}")]
    PageNotReached { requested: Page, progress: Page },
    #[error("a continue is already in flight")]
    ContinueInFlight,
    #[error("page validation failed: {0}")]
    Validation(ValidationErrors),
}
