//! AssetKey - Canonical identity of a unit of value
//!
//! Format: `native` or `CODE:ISSUER`
//! Example: `USD:GISSUERACCOUNT`

use crate::account::AccountId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use thiserror::Error;

/// Errors that can occur when parsing assets
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssetError {
    #[error("Empty asset code")]
    EmptyCode,

    #[error("Asset code too long (max 12 chars): {0}")]
    TooLong(String),

    #[error("Invalid asset code format: {0}")]
    InvalidCode(String),

    #[error("Invalid asset issuer: {0}")]
    InvalidIssuer(String),

    #[error("Invalid asset format, expected 'native' or 'CODE:ISSUER': {0}")]
    InvalidFormat(String),

    #[error("Asset type {declared} does not match code {code}")]
    TypeMismatch { declared: AssetType, code: String },
}

/// Asset type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AssetType {
    /// The chain's base asset
    Native,

    /// Issued asset with a 1-4 character code
    #[serde(rename = "credit_alphanum4")]
    #[strum(serialize = "credit_alphanum4")]
    Issued4,

    /// Issued asset with a 5-12 character code
    #[serde(rename = "credit_alphanum12")]
    #[strum(serialize = "credit_alphanum12")]
    Issued12,
}

impl AssetType {
    /// Asset type implied by the length of an issued code
    fn for_code(code: &str) -> Self {
        if code.len() <= 4 {
            AssetType::Issued4
        } else {
            AssetType::Issued12
        }
    }
}

/// The (type, code, issuer) triple identifying an asset.
///
/// `native` always carries empty code and issuer, so equality is plain
/// triple equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "AssetRepr", into = "AssetRepr")]
pub struct AssetKey {
    asset_type: AssetType,
    code: String,
    issuer: String,
}

impl AssetKey {
    /// The native asset
    pub fn native() -> Self {
        Self {
            asset_type: AssetType::Native,
            code: String::new(),
            issuer: String::new(),
        }
    }

    /// An issued asset; the type is derived from the code length
    pub fn issued(code: &str, issuer: &AccountId) -> Result<Self, AssetError> {
        let code = validate_code(code)?;
        Ok(Self {
            asset_type: AssetType::for_code(&code),
            code,
            issuer: issuer.as_str().to_string(),
        })
    }

    /// Rebuild from stored columns, checking that the triple is coherent
    pub fn from_parts(asset_type: AssetType, code: &str, issuer: &str) -> Result<Self, AssetError> {
        match asset_type {
            AssetType::Native => Ok(Self::native()),
            declared => {
                let issuer: AccountId = issuer
                    .parse()
                    .map_err(|_| AssetError::InvalidIssuer(issuer.to_string()))?;
                let key = Self::issued(code, &issuer)?;
                if key.asset_type != declared {
                    return Err(AssetError::TypeMismatch {
                        declared,
                        code: code.to_string(),
                    });
                }
                Ok(key)
            }
        }
    }

    pub fn asset_type(&self) -> AssetType {
        self.asset_type
    }

    /// Asset code ("" for native)
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Issuer account ("" for native)
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn is_native(&self) -> bool {
        self.asset_type == AssetType::Native
    }

    /// Whether `account` may hold a negative balance of this asset.
    ///
    /// Only the issuer of an issued asset may go negative; that negative
    /// balance is the outstanding issuance. Native never goes negative.
    pub fn allows_negative_for(&self, account: &AccountId) -> bool {
        !self.is_native() && self.issuer == account.as_str()
    }
}

impl fmt::Display for AssetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "{}:{}", self.code, self.issuer)
        }
    }
}

impl FromStr for AssetKey {
    type Err = AssetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("native") {
            return Ok(Self::native());
        }

        let (code, issuer) = s
            .split_once(':')
            .ok_or_else(|| AssetError::InvalidFormat(s.to_string()))?;
        let issuer: AccountId = issuer
            .parse()
            .map_err(|_| AssetError::InvalidIssuer(issuer.to_string()))?;
        Self::issued(code, &issuer)
    }
}

fn validate_code(code: &str) -> Result<String, AssetError> {
    let code = code.trim().to_uppercase();

    if code.is_empty() {
        return Err(AssetError::EmptyCode);
    }

    if code.len() > 12 {
        return Err(AssetError::TooLong(code));
    }

    if !code.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AssetError::InvalidCode(code));
    }

    Ok(code)
}

/// Wire representation: `{asset_type, asset_code?, asset_issuer?}`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AssetRepr {
    asset_type: AssetType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    asset_issuer: Option<String>,
}

impl TryFrom<AssetRepr> for AssetKey {
    type Error = AssetError;

    fn try_from(repr: AssetRepr) -> Result<Self, Self::Error> {
        match repr.asset_type {
            AssetType::Native => Ok(AssetKey::native()),
            declared => AssetKey::from_parts(
                declared,
                repr.asset_code.as_deref().unwrap_or_default(),
                repr.asset_issuer.as_deref().unwrap_or_default(),
            ),
        }
    }
}

impl From<AssetKey> for AssetRepr {
    fn from(key: AssetKey) -> Self {
        if key.is_native() {
            return AssetRepr {
                asset_type: AssetType::Native,
                asset_code: None,
                asset_issuer: None,
            };
        }
        AssetRepr {
            asset_type: key.asset_type,
            asset_code: Some(key.code),
            asset_issuer: Some(key.issuer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> AccountId {
        "GISSUER".parse().unwrap()
    }

    #[test]
    fn test_parse_native() {
        let key: AssetKey = "native".parse().unwrap();
        assert!(key.is_native());
        assert_eq!(key.code(), "");
        assert_eq!(key.issuer(), "");
    }

    #[test]
    fn test_parse_issued_picks_type_by_code_length() {
        let short: AssetKey = "USD:GISSUER".parse().unwrap();
        assert_eq!(short.asset_type(), AssetType::Issued4);

        let long: AssetKey = "EUROTOKEN:GISSUER".parse().unwrap();
        assert_eq!(long.asset_type(), AssetType::Issued12);
    }

    #[test]
    fn test_display_roundtrip() {
        let original = "USD:GISSUER";
        let key: AssetKey = original.parse().unwrap();
        assert_eq!(key.to_string(), original);
    }

    #[test]
    fn test_triple_equality() {
        let a = AssetKey::issued("usd", &issuer()).unwrap();
        let b = AssetKey::issued("USD", &issuer()).unwrap();
        let other_issuer: AccountId = "GOTHER".parse().unwrap();
        let c = AssetKey::issued("USD", &other_issuer).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, AssetKey::native());
    }

    #[test]
    fn test_invalid_codes() {
        assert!(matches!(AssetKey::issued("", &issuer()), Err(AssetError::EmptyCode)));
        assert!(matches!(
            AssetKey::issued("VERYLONGASSETCODE", &issuer()),
            Err(AssetError::TooLong(_))
        ));
        assert!(matches!(
            AssetKey::issued("US-D", &issuer()),
            Err(AssetError::InvalidCode(_))
        ));
        assert!(matches!(
            "USD".parse::<AssetKey>(),
            Err(AssetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_from_parts_rejects_type_mismatch() {
        let result = AssetKey::from_parts(AssetType::Issued12, "USD", "GISSUER");
        assert!(matches!(result, Err(AssetError::TypeMismatch { .. })));
    }

    #[test]
    fn test_negative_allowed_only_for_issuer() {
        let usd = AssetKey::issued("USD", &issuer()).unwrap();
        let holder: AccountId = "GHOLDER".parse().unwrap();
        assert!(usd.allows_negative_for(&issuer()));
        assert!(!usd.allows_negative_for(&holder));
        assert!(!AssetKey::native().allows_negative_for(&issuer()));
    }

    #[test]
    fn test_serde_wire_shape() {
        let usd = AssetKey::issued("USD", &issuer()).unwrap();
        let json = serde_json::to_value(&usd).unwrap();
        assert_eq!(json["asset_type"], "credit_alphanum4");
        assert_eq!(json["asset_code"], "USD");
        assert_eq!(json["asset_issuer"], "GISSUER");

        let native = serde_json::to_value(AssetKey::native()).unwrap();
        assert_eq!(native, serde_json::json!({"asset_type": "native"}));

        let parsed: AssetKey = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, usd);
    }

    #[test]
    fn test_asset_type_strings() {
        assert_eq!(AssetType::Issued4.to_string(), "credit_alphanum4");
        assert_eq!("native".parse::<AssetType>().unwrap(), AssetType::Native);
        assert_eq!(
            "credit_alphanum12".parse::<AssetType>().unwrap(),
            AssetType::Issued12
        );
    }
}
