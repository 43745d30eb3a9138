use crate::domain::agreement::SiteKind;
use crate::domain::service::ServiceType;
use crate::pricing::catalog::project;
use crate::validation::{check_address, check_contact, is_valid_abn, require, ValidationErrors};
use crate::wizard::pages::Page;
use crate::wizard::state::WizardState;

/// Runs the contract that gates leaving `page` through Continue.
pub fn validate_page(state: &WizardState, page: Page) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    match page {
        Page::Services => services(state, &mut errors),
        Page::Company => company(state, &mut errors),
        Page::Billing => billing(state, &mut errors),
        Page::AdditionalContacts => errors = additional_contacts(state),
        Page::SiteDetails => site_details(state, &mut errors),
        Page::Review => {}
        Page::SignAndSubmit => sign_and_submit(state, &mut errors),
    }
    errors
}

/// Every page contract, in page order. Used before submission.
pub fn validate_all(state: &WizardState) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    for page in Page::ALL {
        errors.extend(validate_page(state, page));
    }
    errors
}

fn services(state: &WizardState, errors: &mut ValidationErrors) {
    let selections = state.selections();
    if selections.selected_count() == 0 {
        errors.push("services", "Select a frequency for at least one service");
        return;
    }

    if selections.frequency(ServiceType::OdourControl).is_set() {
        for line in project(state.sites(), ServiceType::OdourControl) {
            let id = line.service.id();
            if selections.odour_units.get(id) == 0 {
                errors.push(
                    format!("services.odour_control.{id}"),
                    format!("Enter a quantity for {} / {}", line.site_name, line.building_name),
                );
            }
        }
    }
}

fn company(state: &WizardState, errors: &mut ValidationErrors) {
    let company = state.company();
    require(errors, "company.company_name".to_string(), &company.company_name, "Company name");
    if !is_valid_abn(company.abn.trim()) {
        errors.push("company.abn", "ABN must be exactly 11 digits");
    }
    check_address(errors, "company.address", &company.address);
}

fn billing(state: &WizardState, errors: &mut ValidationErrors) {
    let billing = state.billing();
    check_contact(errors, "billing.contact", &billing.contact, true);
    check_address(errors, "billing.address", &billing.address);
}

// Each contact is checked independently and the results are combined only
// after all of them have run, so every sub-form shows its own errors.
fn additional_contacts(state: &WizardState) -> ValidationErrors {
    state
        .additional_contacts()
        .iter()
        .enumerate()
        .map(|(index, contact)| {
            let mut errors = ValidationErrors::default();
            check_contact(&mut errors, &format!("additional_contacts.{index}"), contact, false);
            errors
        })
        .fold(ValidationErrors::default(), |mut all, errors| {
            all.extend(errors);
            all
        })
}

fn site_details(state: &WizardState, errors: &mut ValidationErrors) {
    if state.sites().is_empty() {
        errors.push("sites", "At least one site is required");
        return;
    }

    for (site_index, site) in state.sites().iter().enumerate() {
        let prefix = format!("sites.{site_index}");
        if site.kind == SiteKind::New {
            require(errors, format!("{prefix}.name"), &site.name, "Site name");
            check_address(errors, &format!("{prefix}.address"), &site.address);
        }
        if site.contacts.is_empty() {
            errors.push(format!("{prefix}.contacts"), "A primary site contact is required");
        }
        for (contact_index, contact) in site.contacts.iter().enumerate() {
            check_contact(errors, &format!("{prefix}.contacts.{contact_index}"), contact, false);
        }
    }
}

fn sign_and_submit(state: &WizardState, errors: &mut ValidationErrors) {
    let signature = state.signature();
    require(errors, "signature.signatory_name".to_string(), &signature.signatory_name, "Name");
    require(
        errors,
        "signature.signatory_position".to_string(),
        &signature.signatory_position,
        "Position",
    );
    if !signature.has_signature() {
        errors.push("signature.signature", "Please sign the agreement");
    }
    if !signature.terms_accepted {
        errors.push("signature.terms_accepted", "You must accept the terms and conditions");
    }
}
