use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Numeric user identifier. Remote users use small integers, local users
/// get a millisecond timestamp.
pub type UserId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<Company>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub suite: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zipcode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Geo {
    #[serde(default)]
    pub lat: String,
    #[serde(default)]
    pub lng: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "catchPhrase", default)]
    pub catch_phrase: String,
    #[serde(default)]
    pub bs: String,
}

impl User {
    /// Build a local user from validated input.
    pub fn from_new(id: UserId, new_user: NewUser) -> Self {
        Self {
            id,
            name: new_user.name,
            username: None,
            email: new_user.email,
            address: None,
            phone: new_user.phone,
            website: None,
            company: None,
        }
    }

    /// Address as two display lines ("street, suite" and "city, zipcode").
    /// Empty parts are skipped; returns nothing if there is no address.
    pub fn address_lines(&self) -> Vec<String> {
        let Some(ref address) = self.address else {
            return Vec::new();
        };

        [
            join_non_empty(&[&address.street, &address.suite]),
            join_non_empty(&[&address.city, &address.zipcode]),
        ]
        .into_iter()
        .filter(|line| !line.is_empty())
        .collect()
    }

    pub fn company_lines(&self) -> Vec<String> {
        let Some(ref company) = self.company else {
            return Vec::new();
        };

        [&company.name, &company.catch_phrase, &company.bs]
            .into_iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect()
    }
}

fn join_non_empty(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(", ")
}

// ============================================================================
// New user input
// ============================================================================

/// Fields of the add-user form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Email,
    Phone,
}

impl Field {
    pub const ALL: [Field; 3] = [Field::Name, Field::Email, Field::Phone];

    pub fn label(&self) -> &'static str {
        match self {
            Field::Name => "Name",
            Field::Email => "Email",
            Field::Phone => "Phone",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("All fields must be filled.")]
    MissingFields(Vec<Field>),
}

impl ValidationError {
    pub fn missing_fields(&self) -> &[Field] {
        match self {
            ValidationError::MissingFields(fields) => fields,
        }
    }
}

/// Add-user input with every field trimmed and non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewUser {
    name: String,
    email: String,
    phone: String,
}

impl NewUser {
    /// Trim each field and reject the input if any of them ends up empty.
    /// No format checks are made on email or phone.
    pub fn parse(name: &str, email: &str, phone: &str) -> Result<Self, ValidationError> {
        let name = name.trim();
        let email = email.trim();
        let phone = phone.trim();

        let missing: Vec<Field> = Field::ALL
            .into_iter()
            .zip([name, email, phone])
            .filter(|(_, value)| value.is_empty())
            .map(|(field, _)| field)
            .collect();

        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(Self {
            name: name.to_string(),
            email: email.to_string(),
            phone: phone.to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }
}
