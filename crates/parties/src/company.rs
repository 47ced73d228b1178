use serde::{Deserialize, Serialize};

use stockwise_core::{DomainResult, Entity, ValidationErrors, typed_id};

typed_id!(
    /// Company identifier (vendors and customers share the address book).
    CompanyId
);

typed_id!(ContactId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactRole {
    Owner,
    Employee,
    Salesperson,
    Procurement,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unspecified,
}

/// Input for registering a company.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCompany {
    pub name: String,
    pub legal_name: String,
    pub e_mail: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    id: CompanyId,
    name: String,
    legal_name: String,
    e_mail: Option<String>,
    website: Option<String>,
    phone: Option<String>,
    description: String,
    deleted: bool,
}

fn check_e_mail(errors: &mut ValidationErrors, e_mail: &Option<String>) {
    if let Some(e) = e_mail {
        if !e.contains('@') {
            errors.push("e_mail", "is not a valid e-mail address");
        }
    }
}

fn check_phone(errors: &mut ValidationErrors, phone: &Option<String>) {
    if let Some(p) = phone {
        if p.chars().count() > 12 {
            errors.push("phone", "must be at most 12 characters");
        }
    }
}

impl Company {
    /// Validates the input. Legal-name uniqueness is checked by the store.
    pub fn register(id: CompanyId, input: NewCompany) -> DomainResult<Self> {
        let mut errors = ValidationErrors::new();
        if input.name.trim().is_empty() {
            errors.push("name", "is required");
        }
        if input.legal_name.trim().is_empty() {
            errors.push("legal_name", "is required");
        }
        check_e_mail(&mut errors, &input.e_mail);
        check_phone(&mut errors, &input.phone);
        errors.into_result()?;

        Ok(Self {
            id,
            name: input.name.trim().to_string(),
            legal_name: input.legal_name.trim().to_string(),
            e_mail: input.e_mail,
            website: input.website,
            phone: input.phone,
            description: input.description,
            deleted: false,
        })
    }

    pub fn id_typed(&self) -> CompanyId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn legal_name(&self) -> &str {
        &self.legal_name
    }

    pub fn e_mail(&self) -> Option<&str> {
        self.e_mail.as_deref()
    }

    pub fn website(&self) -> Option<&str> {
        self.website.as_deref()
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Entity for Company {
    type Id = CompanyId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewContact {
    pub company: Option<CompanyId>,
    pub name: String,
    pub last_name: String,
    pub gender: Gender,
    pub role: Option<ContactRole>,
    pub e_mail: Option<String>,
    pub phone: Option<String>,
    pub description: String,
}

/// A person at a company. Survives the company being deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    id: ContactId,
    company: Option<CompanyId>,
    name: String,
    last_name: String,
    gender: Gender,
    role: Option<ContactRole>,
    e_mail: Option<String>,
    phone: Option<String>,
    description: String,
    deleted: bool,
}

impl Contact {
    pub fn register(id: ContactId, input: NewContact) -> DomainResult<Self> {
        let mut errors = ValidationErrors::new();
        if input.name.trim().is_empty() {
            errors.push("name", "is required");
        }
        check_e_mail(&mut errors, &input.e_mail);
        check_phone(&mut errors, &input.phone);
        errors.into_result()?;

        Ok(Self {
            id,
            company: input.company,
            name: input.name,
            last_name: input.last_name,
            gender: input.gender,
            role: input.role,
            e_mail: input.e_mail,
            phone: input.phone,
            description: input.description,
            deleted: false,
        })
    }

    pub fn company(&self) -> Option<CompanyId> {
        self.company
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.name, self.last_name).trim().to_string()
    }

    pub fn gender(&self) -> Gender {
        self.gender
    }

    pub fn role(&self) -> Option<ContactRole> {
        self.role
    }
}

impl Entity for Contact {
    type Id = ContactId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn is_deleted(&self) -> bool {
        self.deleted
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}
