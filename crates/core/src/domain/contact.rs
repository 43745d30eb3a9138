use serde::{Deserialize, Serialize};

pub const MAX_ADDITIONAL_CONTACTS: usize = 3;
pub const MAX_SITE_CONTACTS: usize = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactRole {
    Quote,
    Job,
    Invoice,
    Statement,
}

impl ContactRole {
    pub const ALL: [ContactRole; 4] =
        [ContactRole::Quote, ContactRole::Job, ContactRole::Invoice, ContactRole::Statement];
}

/// "Use for" flags on a contact. A primary flag can only be true while the
/// matching role flag is true.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactUsage {
    #[serde(default)]
    quote: bool,
    #[serde(default)]
    primary_quote: bool,
    #[serde(default)]
    job: bool,
    #[serde(default)]
    primary_job: bool,
    #[serde(default)]
    invoice: bool,
    #[serde(default)]
    primary_invoice: bool,
    #[serde(default)]
    statement: bool,
    #[serde(default)]
    primary_statement: bool,
}

impl ContactUsage {
    pub fn uses(&self, role: ContactRole) -> bool {
        match role {
            ContactRole::Quote => self.quote,
            ContactRole::Job => self.job,
            ContactRole::Invoice => self.invoice,
            ContactRole::Statement => self.statement,
        }
    }

    pub fn is_primary(&self, role: ContactRole) -> bool {
        match role {
            ContactRole::Quote => self.primary_quote,
            ContactRole::Job => self.primary_job,
            ContactRole::Invoice => self.primary_invoice,
            ContactRole::Statement => self.primary_statement,
        }
    }

    /// Clearing a role also clears its primary flag.
    pub fn set_role(&mut self, role: ContactRole, enabled: bool) {
        let (flag, primary) = self.slots(role);
        *flag = enabled;
        if !enabled {
            *primary = false;
        }
    }

    /// Ignored while the role itself is off.
    pub fn set_primary(&mut self, role: ContactRole, primary: bool) {
        let (flag, slot) = self.slots(role);
        *slot = primary && *flag;
    }

    /// Forces every orphaned primary flag back to false. Used on payloads that
    /// arrive from outside the named setters.
    pub fn normalize(&mut self) {
        for role in ContactRole::ALL {
            let (flag, primary) = self.slots(role);
            if !*flag {
                *primary = false;
            }
        }
    }

    pub fn is_consistent(&self) -> bool {
        ContactRole::ALL.iter().all(|role| self.uses(*role) || !self.is_primary(*role))
    }

    fn slots(&mut self, role: ContactRole) -> (&mut bool, &mut bool) {
        match role {
            ContactRole::Quote => (&mut self.quote, &mut self.primary_quote),
            ContactRole::Job => (&mut self.job, &mut self.primary_job),
            ContactRole::Invoice => (&mut self.invoice, &mut self.primary_invoice),
            ContactRole::Statement => (&mut self.statement, &mut self.primary_statement),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub office_phone: String,
    #[serde(default)]
    pub mobile_phone: String,
    #[serde(default)]
    pub usage: ContactUsage,
}

impl Contact {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
    }
}
