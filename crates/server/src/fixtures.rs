use chrono::NaiveDate;
use rust_decimal::Decimal;

use upkeep_core::domain::agreement::{
    AgreementId, AgreementStatus, Building, BuildingId, CustomerSnapshot, PostalAddress,
    ServiceAgreement, Site, SiteId, SiteKind,
};
use upkeep_core::domain::contact::Contact;
use upkeep_core::domain::service::{ChuteCleaning, Frequency, LineItemId, Service, ServiceType};
use upkeep_core::wizard::{BillingDetails, SignatureCapture, WizardState};

fn address() -> PostalAddress {
    PostalAddress {
        street: "12 Circular Quay W".to_string(),
        suburb: "The Rocks".to_string(),
        state: "NSW".to_string(),
        postcode: "2000".to_string(),
    }
}

fn contact(first_name: &str, last_name: &str) -> Contact {
    Contact {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{}@example.com", first_name.to_lowercase()),
        mobile_phone: "0412345678".to_string(),
        ..Contact::default()
    }
}

/// One existing site with a single chute row at $617.50.
pub fn agreement() -> ServiceAgreement {
    ServiceAgreement {
        id: AgreementId("SA-200".to_string()),
        status: AgreementStatus::Sent,
        customer: CustomerSnapshot {
            id: "C-9".to_string(),
            company_name: "Harbour View Owners Corp".to_string(),
            trading_name: String::new(),
            abn: "51824753556".to_string(),
            address: address(),
        },
        proposal_expiry: NaiveDate::from_ymd_opt(2099, 12, 31).expect("valid date"),
        contract_start: NaiveDate::from_ymd_opt(2027, 1, 1).expect("valid date"),
        contract_end: NaiveDate::from_ymd_opt(2028, 12, 31).expect("valid date"),
        incentives: true,
        sites: vec![Site {
            id: SiteId("S-1".to_string()),
            name: "Harbour View".to_string(),
            address: address(),
            kind: SiteKind::Existing,
            buildings: vec![Building {
                id: BuildingId("B-1".to_string()),
                name: "North Tower".to_string(),
                services: vec![Service::ChuteCleaning(ChuteCleaning {
                    id: LineItemId("L-1".to_string()),
                    levels: "1-24".to_string(),
                    chutes: 1,
                    price: Decimal::new(61_750, 2),
                })],
            }],
            contacts: vec![Contact::default()],
        }],
    }
}

/// Quarterly chute cleaning: $2,470.00 a year with no incentive tier.
pub fn completed_state(agreement: &ServiceAgreement) -> WizardState {
    let mut state = WizardState::for_agreement(agreement);
    state.set_frequency(ServiceType::ChuteCleaning, Frequency::Quarterly);
    state
        .update_site_contact(&SiteId("S-1".to_string()), 0, contact("Ana", "Silva"))
        .expect("primary site contact");
    state.update_billing(BillingDetails {
        contact: contact("Priya", "Nguyen"),
        address: address(),
        purchase_order: String::new(),
    });
    state.update_signature(SignatureCapture {
        signatory_name: "Priya Nguyen".to_string(),
        signatory_position: "Strata Manager".to_string(),
        signature: Some("data:image/png;base64,AAAA".to_string()),
        terms_accepted: true,
        signed_on: None,
    });
    state
}
