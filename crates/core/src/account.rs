//! AccountId - Opaque fixed-form account identifier
//!
//! Uppercase ASCII letters and digits, 1 to 64 characters.
//! Example: `GALICE`, `GBRPYHIL2CI3FNQ4BXLFMNDLFJUNPU2HY3ZMFSHONUCEOASW7QC7OX2H`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Maximum identifier length
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    #[error("Empty account id")]
    Empty,

    #[error("Account id too long (max 64 chars): {0}")]
    TooLong(String),

    #[error("Invalid account id format: {0}")]
    InvalidFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, AccountIdError> {
        let id = id.into();

        if id.is_empty() {
            return Err(AccountIdError::Empty);
        }

        if id.len() > MAX_ACCOUNT_ID_LEN {
            return Err(AccountIdError::TooLong(id));
        }

        if !id.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(AccountIdError::InvalidFormat(id));
        }

        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.trim())
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_ids() {
        assert!(AccountId::new("GALICE").is_ok());
        assert!(AccountId::new("A").is_ok());
        assert!(AccountId::new("G".repeat(64)).is_ok());
    }

    #[test]
    fn test_invalid_ids() {
        assert!(matches!(AccountId::new(""), Err(AccountIdError::Empty)));
        assert!(matches!(
            AccountId::new("G".repeat(65)),
            Err(AccountIdError::TooLong(_))
        ));
        assert!(matches!(
            AccountId::new("galice"),
            Err(AccountIdError::InvalidFormat(_))
        ));
        assert!(matches!(
            AccountId::new("G-ALICE"),
            Err(AccountIdError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_serde_as_plain_string() {
        let id: AccountId = "GALICE".parse().unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"GALICE\"");
        assert!(serde_json::from_str::<AccountId>("\"bad id\"").is_err());
    }
}
