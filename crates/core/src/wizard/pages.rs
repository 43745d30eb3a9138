use std::fmt;

use serde::{Deserialize, Serialize};

/// Form pages in order. Serialized as their 1-based page number.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Page {
    Services = 1,
    Company = 2,
    Billing = 3,
    AdditionalContacts = 4,
    SiteDetails = 5,
    Review = 6,
    SignAndSubmit = 7,
}

impl Page {
    pub const FIRST: Page = Page::Services;
    pub const LAST: Page = Page::SignAndSubmit;
    pub const ALL: [Page; 7] = [
        Page::Services,
        Page::Company,
        Page::Billing,
        Page::AdditionalContacts,
        Page::SiteDetails,
        Page::Review,
        Page::SignAndSubmit,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|page| page.number() == number)
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.number().checked_sub(1).and_then(Self::from_number)
    }

    pub fn title(self) -> &'static str {
        match self {
            Self::Services => "Services",
            Self::Company => "Company",
            Self::Billing => "Billing",
            Self::AdditionalContacts => "Additional Contacts",
            Self::SiteDetails => "Site Details",
            Self::Review => "Review",
            Self::SignAndSubmit => "Sign & Submit",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.title(), self.number())
    }
}

impl From<Page> for u8 {
    fn from(page: Page) -> Self {
        page.number()
    }
}

impl TryFrom<u8> for Page {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_number(value).ok_or_else(|| format!("page must be in 1..=7, got {value}"))
    }
}
