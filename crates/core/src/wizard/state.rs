use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::agreement::{AgreementId, PostalAddress, ServiceAgreement, Site, SiteId};
use crate::domain::contact::{Contact, MAX_ADDITIONAL_CONTACTS};
use crate::domain::service::{Frequency, LineItemId, ServiceSelections, ServiceType};
use crate::errors::DomainError;
use crate::pricing::catalog::{offered_service_types, project};
use crate::pricing::{AgreementSummary, PricingInput};
use crate::validation::ValidationErrors;
use crate::wizard::pages::Page;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyDetails {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub trading_name: String,
    #[serde(default)]
    pub abn: String,
    #[serde(default)]
    pub address: PostalAddress,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    #[serde(default)]
    pub contact: Contact,
    #[serde(default)]
    pub address: PostalAddress,
    #[serde(default)]
    pub purchase_order: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureCapture {
    #[serde(default)]
    pub signatory_name: String,
    #[serde(default)]
    pub signatory_position: String,
    /// Encoded signature image as captured by the client.
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub terms_accepted: bool,
    #[serde(default)]
    pub signed_on: Option<NaiveDate>,
}

impl SignatureCapture {
    pub fn has_signature(&self) -> bool {
        self.signature.as_deref().map(|value| !value.trim().is_empty()).unwrap_or(false)
    }
}

/// Everything the form renders from and the pricing engine reads. Mutated
/// through the named methods below and the wizard controller only.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WizardState {
    page: Page,
    progress: Page,
    #[serde(default)]
    agreement_id: Option<AgreementId>,
    #[serde(default)]
    incentives: bool,
    #[serde(default)]
    selections: ServiceSelections,
    #[serde(default)]
    company: CompanyDetails,
    #[serde(default)]
    billing: BillingDetails,
    #[serde(default)]
    additional_contacts: Vec<Contact>,
    #[serde(default)]
    sites: Vec<Site>,
    #[serde(default)]
    signature: SignatureCapture,
    #[serde(skip)]
    errors: ValidationErrors,
}

impl Default for WizardState {
    fn default() -> Self {
        Self {
            page: Page::FIRST,
            progress: Page::FIRST,
            agreement_id: None,
            incentives: false,
            selections: ServiceSelections::default(),
            company: CompanyDetails::default(),
            billing: BillingDetails::default(),
            additional_contacts: Vec::new(),
            sites: Vec::new(),
            signature: SignatureCapture::default(),
            errors: ValidationErrors::default(),
        }
    }
}

impl WizardState {
    /// Fresh session state pre-populated from the loaded agreement.
    pub fn for_agreement(agreement: &ServiceAgreement) -> Self {
        let mut sites = agreement.sites.clone();
        for site in &mut sites {
            site.normalize_contacts();
        }

        Self {
            agreement_id: Some(agreement.id.clone()),
            incentives: agreement.incentives,
            company: CompanyDetails {
                company_name: agreement.customer.company_name.clone(),
                trading_name: agreement.customer.trading_name.clone(),
                abn: agreement.customer.abn.clone(),
                address: agreement.customer.address.clone(),
            },
            billing: BillingDetails {
                address: agreement.customer.address.clone(),
                ..BillingDetails::default()
            },
            sites,
            ..Self::default()
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Highest page reached so far.
    pub fn progress(&self) -> Page {
        self.progress
    }

    pub fn agreement_id(&self) -> Option<&AgreementId> {
        self.agreement_id.as_ref()
    }

    pub fn incentives(&self) -> bool {
        self.incentives
    }

    pub fn selections(&self) -> &ServiceSelections {
        &self.selections
    }

    pub fn company(&self) -> &CompanyDetails {
        &self.company
    }

    pub fn billing(&self) -> &BillingDetails {
        &self.billing
    }

    pub fn additional_contacts(&self) -> &[Contact] {
        &self.additional_contacts
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn signature(&self) -> &SignatureCapture {
        &self.signature
    }

    /// Page-local error indicators from the last rejected transition.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn pricing_input<'a>(&'a self, currency: &'a str) -> PricingInput<'a> {
        PricingInput {
            sites: &self.sites,
            selections: &self.selections,
            incentives: self.incentives,
            currency,
        }
    }

    pub fn summary(&self, currency: &str) -> AgreementSummary {
        crate::pricing::summary::summarize(&self.pricing_input(currency))
    }

    pub fn set_frequency(&mut self, service_type: ServiceType, frequency: Frequency) {
        self.selections.set_frequency(service_type, frequency);
    }

    /// Stores raw quantity input for an odour control row, clamped to a
    /// non-negative integer.
    pub fn set_odour_units(&mut self, line_item: LineItemId, raw: &str) -> u32 {
        self.selections.odour_units.set_raw(line_item, raw)
    }

    pub fn update_company(&mut self, company: CompanyDetails) {
        self.company = company;
    }

    pub fn update_billing(&mut self, mut billing: BillingDetails) {
        billing.contact.usage.normalize();
        self.billing = billing;
    }

    pub fn add_additional_contact(&mut self, mut contact: Contact) -> Result<usize, DomainError> {
        if self.additional_contacts.len() >= MAX_ADDITIONAL_CONTACTS {
            return Err(DomainError::ContactLimitReached { limit: MAX_ADDITIONAL_CONTACTS });
        }
        contact.usage.normalize();
        self.additional_contacts.push(contact);
        Ok(self.additional_contacts.len() - 1)
    }

    pub fn update_additional_contact(
        &mut self,
        index: usize,
        mut contact: Contact,
    ) -> Result<(), DomainError> {
        let slot = self
            .additional_contacts
            .get_mut(index)
            .ok_or(DomainError::ContactNotFound { index })?;
        contact.usage.normalize();
        *slot = contact;
        Ok(())
    }

    pub fn remove_additional_contact(&mut self, index: usize) -> Result<Contact, DomainError> {
        if index >= self.additional_contacts.len() {
            return Err(DomainError::ContactNotFound { index });
        }
        Ok(self.additional_contacts.remove(index))
    }

    pub fn rename_site(&mut self, site_id: &SiteId, name: &str) -> Result<(), DomainError> {
        self.site_mut(site_id)?.rename(name)
    }

    pub fn set_site_address(
        &mut self,
        site_id: &SiteId,
        address: PostalAddress,
    ) -> Result<(), DomainError> {
        self.site_mut(site_id)?.set_address(address)
    }

    pub fn add_site_contact(
        &mut self,
        site_id: &SiteId,
        mut contact: Contact,
    ) -> Result<usize, DomainError> {
        contact.usage.normalize();
        self.site_mut(site_id)?.add_contact(contact)
    }

    pub fn update_site_contact(
        &mut self,
        site_id: &SiteId,
        index: usize,
        mut contact: Contact,
    ) -> Result<(), DomainError> {
        contact.usage.normalize();
        *self.site_mut(site_id)?.contact_mut(index)? = contact;
        Ok(())
    }

    pub fn remove_site_contact(
        &mut self,
        site_id: &SiteId,
        index: usize,
    ) -> Result<Contact, DomainError> {
        self.site_mut(site_id)?.remove_contact(index)
    }

    pub fn update_signature(&mut self, signature: SignatureCapture) {
        self.signature = signature;
    }

    /// Repairs a state that arrived from outside the named setters: restores
    /// `progress >= page`, contact limits and primary-flag consistency.
    pub fn normalize(&mut self) {
        if self.progress < self.page {
            self.progress = self.page;
        }
        self.additional_contacts.truncate(MAX_ADDITIONAL_CONTACTS);
        for contact in &mut self.additional_contacts {
            contact.usage.normalize();
        }
        self.billing.contact.usage.normalize();
        for site in &mut self.sites {
            site.normalize_contacts();
        }
    }

    /// Drops frequencies for service types the sites do not offer and
    /// quantities for odour rows that do not exist.
    pub fn restrict_selections_to_catalog(&mut self) {
        let offered = offered_service_types(&self.sites);
        let odour_rows: Vec<LineItemId> = project(&self.sites, ServiceType::OdourControl)
            .into_iter()
            .map(|line| line.service.id().clone())
            .collect();
        self.selections.restrict_to(&offered, &odour_rows);
    }

    /// Re-anchors a state received from a client to the stored agreement.
    /// Prices, site kinds and buildings always come from the agreement, and
    /// locked sites keep their stored name and address. Selections the
    /// stored catalog cannot price are dropped.
    pub fn bind_to(&mut self, agreement: &ServiceAgreement) {
        self.agreement_id = Some(agreement.id.clone());
        self.incentives = agreement.incentives;

        self.sites.retain(|site| agreement.sites.iter().any(|stored| stored.id == site.id));
        for site in &mut self.sites {
            if let Some(stored) = agreement.sites.iter().find(|stored| stored.id == site.id) {
                site.kind = stored.kind;
                site.buildings = stored.buildings.clone();
                if !stored.is_editable() {
                    site.name = stored.name.clone();
                    site.address = stored.address.clone();
                }
            }
        }
        for stored in &agreement.sites {
            if !self.sites.iter().any(|site| site.id == stored.id) {
                self.sites.push(stored.clone());
            }
        }

        self.restrict_selections_to_catalog();
        self.normalize();
    }

    pub(crate) fn move_to(&mut self, page: Page) {
        self.page = page;
        if self.progress < page {
            self.progress = page;
        }
        self.errors = ValidationErrors::default();
    }

    pub(crate) fn set_errors(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    fn site_mut(&mut self, site_id: &SiteId) -> Result<&mut Site, DomainError> {
        self.sites
            .iter_mut()
            .find(|site| &site.id == site_id)
            .ok_or_else(|| DomainError::SiteNotFound { site_id: site_id.0.clone() })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::WizardState;
    use crate::domain::contact::{Contact, ContactRole};
    use crate::domain::service::{Frequency, LineItemId, ServiceType};
    use crate::errors::DomainError;
    use crate::wizard::pages::Page;
    use crate::wizard::validation::validate_page;

    #[test]
    fn default_state_is_the_documented_initial_state() {
        let state = WizardState::default();

        assert_eq!(state.page(), Page::Services);
        assert_eq!(state.progress(), Page::Services);
        assert_eq!(state.selections().selected_count(), 0);
        assert!(state.additional_contacts().is_empty());
    }

    #[test]
    fn additional_contacts_are_capped_at_three() {
        let mut state = WizardState::default();
        for _ in 0..3 {
            state.add_additional_contact(Contact::default()).expect("within limit");
        }

        assert!(matches!(
            state.add_additional_contact(Contact::default()),
            Err(DomainError::ContactLimitReached { limit: 3 })
        ));
    }

    #[test]
    fn contact_updates_repair_orphaned_primary_flags() {
        let mut state = WizardState::default();
        let mut contact: Contact = serde_json::from_value(serde_json::json!({
            "first_name": "Lee",
            "usage": { "invoice": false, "primary_invoice": true }
        }))
        .expect("contact parses");
        contact.usage.set_role(ContactRole::Job, true);

        let index = state.add_additional_contact(contact).expect("added");
        let stored = &state.additional_contacts()[index];

        assert!(!stored.usage.is_primary(ContactRole::Invoice));
        assert!(stored.usage.uses(ContactRole::Job));
    }

    #[test]
    fn normalize_restores_progress_invariant() {
        let mut state: WizardState = serde_json::from_value(serde_json::json!({
            "page": 5,
            "progress": 2
        }))
        .expect("state parses");

        state.normalize();

        assert_eq!(state.page(), Page::SiteDetails);
        assert_eq!(state.progress(), Page::SiteDetails);
    }

    #[test]
    fn binding_discards_client_supplied_prices_and_locked_edits() {
        let agreement = crate::wizard::validation::fixtures::agreement();
        let mut json = serde_json::to_value(WizardState::for_agreement(&agreement)).expect("json");
        json["incentives"] = serde_json::json!(false);
        json["sites"][0]["name"] = serde_json::json!("Renamed");
        json["sites"][0]["buildings"][0]["services"][0]["price"] = serde_json::json!("1");
        let mut state: WizardState = serde_json::from_value(json).expect("state parses");

        state.bind_to(&agreement);

        assert!(state.incentives());
        assert_eq!(state.sites()[0].name, agreement.sites[0].name);
        assert_eq!(state.sites()[0].buildings, agreement.sites[0].buildings);
    }

    #[test]
    fn binding_drops_frequencies_for_services_the_agreement_does_not_offer() {
        let agreement = crate::wizard::validation::fixtures::agreement();
        let mut state = WizardState::for_agreement(&agreement);
        for service_type in ServiceType::ALL {
            state.set_frequency(service_type, Frequency::Quarterly);
        }
        state.set_odour_units(LineItemId("o1".to_string()), "2");
        state.set_odour_units(LineItemId("ghost".to_string()), "9");

        state.bind_to(&agreement);

        let selections = state.selections();
        assert_eq!(selections.selected_count(), 2);
        assert_eq!(selections.frequency(ServiceType::BinCleaning), Frequency::Unset);
        assert_eq!(selections.odour_units.get(&LineItemId("o1".to_string())), 2);
        assert_eq!(selections.odour_units.get(&LineItemId("ghost".to_string())), 0);
        assert_eq!(selections.odour_units.len(), 1);

        let summary = state.summary("AUD");
        assert_eq!(summary.incentive.tier, None);
        assert_eq!(summary.discount_pct, Decimal::ZERO);
        // 650 x 1 chute x 4 visits, plus 180 x 2 units x 4 visits.
        assert_eq!(summary.annual_subtotal, Decimal::new(4040, 0));
        assert_eq!(summary.annual_total, Decimal::new(4040, 0));
    }

    #[test]
    fn binding_only_unoffered_selections_leaves_the_services_page_invalid() {
        let agreement = crate::wizard::validation::fixtures::agreement();
        let mut state = WizardState::for_agreement(&agreement);
        state.set_frequency(ServiceType::BinCleaning, Frequency::Yearly);
        state.set_frequency(ServiceType::EquipmentMaintenance, Frequency::Quarterly);

        state.bind_to(&agreement);

        assert_eq!(state.selections().selected_count(), 0);
        assert_eq!(state.summary("AUD").annual_total, Decimal::ZERO);
        let errors = validate_page(&state, Page::Services);
        assert!(errors.contains_field("services"));
    }

    #[test]
    fn null_frequencies_read_as_unset() {
        let agreement = crate::wizard::validation::fixtures::agreement();
        let mut json = serde_json::to_value(WizardState::for_agreement(&agreement)).expect("json");
        json["selections"]["frequencies"] = serde_json::json!({
            "chute_cleaning": null,
            "odour_control": 4,
        });

        let state: WizardState = serde_json::from_value(json).expect("null frequency parses");

        assert_eq!(state.selections().frequency(ServiceType::ChuteCleaning), Frequency::Unset);
        assert_eq!(state.selections().frequency(ServiceType::OdourControl), Frequency::Unset);
        assert_eq!(state.summary("AUD").annual_subtotal, Decimal::ZERO);
    }

    #[test]
    fn odour_quantities_are_clamped() {
        let mut state = WizardState::default();
        state.set_frequency(ServiceType::OdourControl, Frequency::Yearly);

        assert_eq!(state.set_odour_units(LineItemId("o1".to_string()), "-4"), 0);
        assert_eq!(state.set_odour_units(LineItemId("o1".to_string()), "6"), 6);
        assert_eq!(state.selections().odour_units.get(&LineItemId("o1".to_string())), 6);
    }
}
