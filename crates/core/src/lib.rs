pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod submission;
pub mod validation;
pub mod wizard;

pub use domain::agreement::{
    check_eligibility, AgreementId, AgreementStatus, Ineligibility, ServiceAgreement, Site,
    SiteKind,
};
pub use domain::service::{Frequency, Service, ServiceSelections, ServiceType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use pricing::{
    format_money, AgreementSummary, DeterministicPricingEngine, PricingEngine, PricingInput,
};
pub use submission::{
    AgreementStore, CollaboratorError, ConfirmationMailer, DocumentRenderer, SubmissionError,
    SubmissionPipeline, SubmissionReceipt, SubmissionSettings,
};
pub use validation::{FieldError, ValidationErrors};
pub use wizard::{Page, WizardController, WizardError, WizardState};
