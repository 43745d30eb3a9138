use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::contact::{Contact, MAX_SITE_CONTACTS};
use crate::domain::service::Service;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgreementId(pub String);

impl fmt::Display for AgreementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SiteId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildingId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgreementStatus {
    Draft,
    Sent,
    Opened,
    Accepted,
    Expired,
    Voided,
}

impl AgreementStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Expired | Self::Voided)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Opened => "opened",
            Self::Accepted => "accepted",
            Self::Expired => "expired",
            Self::Voided => "voided",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "draft" => Some(Self::Draft),
            "sent" => Some(Self::Sent),
            "opened" => Some(Self::Opened),
            "accepted" => Some(Self::Accepted),
            "expired" => Some(Self::Expired),
            "voided" => Some(Self::Voided),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub suburb: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub postcode: String,
}

impl PostalAddress {
    pub fn one_line(&self) -> String {
        [self.street.trim(), self.suburb.trim(), self.state.trim(), self.postcode.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Customer record as pulled from the job-management system.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerSnapshot {
    pub id: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub trading_name: String,
    #[serde(default)]
    pub abn: String,
    #[serde(default)]
    pub address: PostalAddress,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteKind {
    New,
    Existing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: BuildingId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: PostalAddress,
    pub kind: SiteKind,
    #[serde(default)]
    pub buildings: Vec<Building>,
    /// Index 0 is the primary contact and is never removed.
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Site {
    pub fn is_editable(&self) -> bool {
        self.kind == SiteKind::New
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<(), DomainError> {
        self.ensure_editable()?;
        self.name = name.into();
        Ok(())
    }

    pub fn set_address(&mut self, address: PostalAddress) -> Result<(), DomainError> {
        self.ensure_editable()?;
        self.address = address;
        Ok(())
    }

    pub fn add_contact(&mut self, contact: Contact) -> Result<usize, DomainError> {
        if self.contacts.len() >= MAX_SITE_CONTACTS {
            return Err(DomainError::ContactLimitReached { limit: MAX_SITE_CONTACTS });
        }
        self.contacts.push(contact);
        Ok(self.contacts.len() - 1)
    }

    pub fn remove_contact(&mut self, index: usize) -> Result<Contact, DomainError> {
        if index == 0 {
            return Err(DomainError::PrimaryContactRequired);
        }
        if index >= self.contacts.len() {
            return Err(DomainError::ContactNotFound { index });
        }
        Ok(self.contacts.remove(index))
    }

    pub fn contact_mut(&mut self, index: usize) -> Result<&mut Contact, DomainError> {
        self.contacts.get_mut(index).ok_or(DomainError::ContactNotFound { index })
    }

    /// Guarantees the primary slot exists and caps the list at its limit.
    pub fn normalize_contacts(&mut self) {
        if self.contacts.is_empty() {
            self.contacts.push(Contact::default());
        }
        self.contacts.truncate(MAX_SITE_CONTACTS);
        for contact in &mut self.contacts {
            contact.usage.normalize();
        }
    }

    fn ensure_editable(&self) -> Result<(), DomainError> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(DomainError::SiteLocked { site_id: self.id.0.clone() })
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceAgreement {
    pub id: AgreementId,
    pub status: AgreementStatus,
    pub customer: CustomerSnapshot,
    pub proposal_expiry: NaiveDate,
    pub contract_start: NaiveDate,
    pub contract_end: NaiveDate,
    /// Whether discount tiers apply at all.
    #[serde(default)]
    pub incentives: bool,
    #[serde(default)]
    pub sites: Vec<Site>,
}

impl ServiceAgreement {
    pub fn can_transition_to(&self, next: AgreementStatus) -> bool {
        matches!(
            (self.status, next),
            (AgreementStatus::Draft, AgreementStatus::Sent)
                | (AgreementStatus::Draft, AgreementStatus::Opened)
                | (AgreementStatus::Sent, AgreementStatus::Opened)
                | (AgreementStatus::Draft, AgreementStatus::Accepted)
                | (AgreementStatus::Sent, AgreementStatus::Accepted)
                | (AgreementStatus::Opened, AgreementStatus::Accepted)
                | (AgreementStatus::Draft, AgreementStatus::Expired)
                | (AgreementStatus::Sent, AgreementStatus::Expired)
                | (AgreementStatus::Opened, AgreementStatus::Expired)
                | (AgreementStatus::Draft, AgreementStatus::Voided)
                | (AgreementStatus::Sent, AgreementStatus::Voided)
                | (AgreementStatus::Opened, AgreementStatus::Voided)
        )
    }

    pub fn transition_to(&mut self, next: AgreementStatus) -> Result<(), DomainError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }

        Err(DomainError::InvalidStatusTransition { from: self.status, to: next })
    }

    /// Records the first render. Repeat calls and later statuses are no-ops.
    pub fn mark_opened(&mut self) -> bool {
        if matches!(self.status, AgreementStatus::Draft | AgreementStatus::Sent) {
            self.status = AgreementStatus::Opened;
            return true;
        }
        false
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ineligibility {
    Missing,
    Finalized(AgreementStatus),
    PastExpiry { expiry: NaiveDate, today: NaiveDate },
}

/// Returns why a loaded agreement may not be shown. The expiry date itself is
/// still valid.
pub fn check_eligibility(
    agreement: &ServiceAgreement,
    today: NaiveDate,
) -> Result<(), Ineligibility> {
    if agreement.status.is_terminal() {
        return Err(Ineligibility::Finalized(agreement.status));
    }
    if today > agreement.proposal_expiry {
        return Err(Ineligibility::PastExpiry { expiry: agreement.proposal_expiry, today });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{
        check_eligibility, AgreementId, AgreementStatus, CustomerSnapshot, Ineligibility,
        PostalAddress, ServiceAgreement, Site, SiteId, SiteKind,
    };
    use crate::domain::contact::Contact;
    use crate::errors::DomainError;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn agreement(status: AgreementStatus) -> ServiceAgreement {
        ServiceAgreement {
            id: AgreementId("SA-1".to_string()),
            status,
            customer: CustomerSnapshot::default(),
            proposal_expiry: date(2026, 3, 31),
            contract_start: date(2026, 4, 1),
            contract_end: date(2028, 3, 31),
            incentives: true,
            sites: Vec::new(),
        }
    }

    fn site(kind: SiteKind) -> Site {
        Site {
            id: SiteId("site-1".to_string()),
            name: "Harbour Tower".to_string(),
            address: PostalAddress::default(),
            kind,
            buildings: Vec::new(),
            contacts: vec![Contact::default()],
        }
    }

    #[test]
    fn expiry_date_is_inclusive() {
        let agreement = agreement(AgreementStatus::Sent);

        assert!(check_eligibility(&agreement, date(2026, 3, 31)).is_ok());
        assert!(matches!(
            check_eligibility(&agreement, date(2026, 4, 1)),
            Err(Ineligibility::PastExpiry { .. })
        ));
    }

    #[test]
    fn terminal_statuses_are_ineligible() {
        for status in [AgreementStatus::Accepted, AgreementStatus::Expired, AgreementStatus::Voided]
        {
            let agreement = agreement(status);
            assert_eq!(
                check_eligibility(&agreement, date(2026, 1, 1)),
                Err(Ineligibility::Finalized(status))
            );
        }
    }

    #[test]
    fn mark_opened_is_idempotent() {
        let mut agreement = agreement(AgreementStatus::Sent);

        assert!(agreement.mark_opened());
        assert!(!agreement.mark_opened());
        assert_eq!(agreement.status, AgreementStatus::Opened);
    }

    #[test]
    fn accepted_agreements_cannot_be_reaccepted() {
        let mut agreement = agreement(AgreementStatus::Opened);
        agreement.transition_to(AgreementStatus::Accepted).expect("opened -> accepted");

        let error = agreement
            .transition_to(AgreementStatus::Accepted)
            .expect_err("accepted -> accepted should fail");
        assert!(matches!(error, DomainError::InvalidStatusTransition { .. }));
    }

    #[test]
    fn existing_sites_are_locked_but_contacts_stay_editable() {
        let mut site = site(SiteKind::Existing);

        assert!(matches!(site.rename("Other"), Err(DomainError::SiteLocked { .. })));
        assert!(matches!(
            site.set_address(PostalAddress::default()),
            Err(DomainError::SiteLocked { .. })
        ));

        site.contact_mut(0).expect("primary contact").first_name = "Ana".to_string();
        assert_eq!(site.contacts[0].first_name, "Ana");
    }

    #[test]
    fn site_contacts_stay_within_limits() {
        let mut site = site(SiteKind::New);
        site.add_contact(Contact::default()).expect("second contact");
        site.add_contact(Contact::default()).expect("third contact");

        assert!(matches!(
            site.add_contact(Contact::default()),
            Err(DomainError::ContactLimitReached { limit: 3 })
        ));
        assert!(matches!(site.remove_contact(0), Err(DomainError::PrimaryContactRequired)));
        site.remove_contact(2).expect("remove third contact");
        assert_eq!(site.contacts.len(), 2);
    }
}
