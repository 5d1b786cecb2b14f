//! # User Types
//!
//! Account directory types. Credential issuance and verification live
//! outside this service; requests arrive with an already-resolved user id
//! that is checked against the directory.

use serde::{Deserialize, Serialize};

/// Role of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Role::Customer
    }
}

/// A user known to the account directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: String,

    /// Display name
    pub name: String,

    /// Contact email (used for order confirmations)
    pub email: String,

    /// Role
    #[serde(default)]
    pub role: Role,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            role: Role::Customer,
        }
    }

    /// Builder: grant the admin role
    pub fn admin(mut self) -> Self {
        self.role = Role::Admin;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Seed file shape for `config/users.toml`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectorySeed {
    #[serde(default)]
    pub users: Vec<User>,
}

impl DirectorySeed {
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }
}
