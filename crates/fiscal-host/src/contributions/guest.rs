use std::fmt;

use serde::{Deserialize, Serialize};

/// Contributions above this amount (in cents) must carry the contributor's address.
pub const DEFAULT_LOCATION_THRESHOLD: i64 = 5_000_00;

/// Validation errors for guest contribution input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuestInfoError {
    #[error("'{0}' is not a valid email address")]
    InvalidEmail(String),
    #[error("country must be a two-letter ISO code, got '{0}'")]
    InvalidCountry(String),
    #[error("an address is required for contributions above {threshold} (got {amount})")]
    LocationRequired { amount: i64, threshold: i64 },
}

/// An email address that passed syntactic validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    pub fn parse(raw: &str) -> Result<Self, GuestInfoError> {
        let candidate = raw.trim();
        let invalid = || GuestInfoError::InvalidEmail(raw.to_string());

        if candidate.chars().any(char::is_whitespace) {
            return Err(invalid());
        }
        let (local, domain) = candidate.split_once('@').ok_or_else(invalid)?;
        if local.is_empty() || domain.contains('@') {
            return Err(invalid());
        }
        let labels: Vec<&str> = domain.split('.').collect();
        if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
            return Err(invalid());
        }

        Ok(Self(candidate.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = GuestInfoError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EmailAddress> for String {
    fn from(value: EmailAddress) -> Self {
        value.0
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Postal location of a contributor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Two-letter ISO country code.
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub long: Option<f64>,
}

impl LocationInput {
    pub fn is_empty(&self) -> bool {
        self.address.as_deref().map(str::trim).unwrap_or("").is_empty()
            && self.country.is_none()
    }

    fn validate(&self) -> Result<(), GuestInfoError> {
        if let Some(country) = &self.country {
            let valid = country.len() == 2 && country.chars().all(|c| c.is_ascii_uppercase());
            if !valid {
                return Err(GuestInfoError::InvalidCountry(country.clone()));
            }
        }
        Ok(())
    }
}

/// Input type for guest contributions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuestInfoInput {
    /// Contributor's email.
    pub email: EmailAddress,
    /// Full name of the user.
    #[serde(default)]
    pub name: Option<String>,
    /// The unique guest token.
    #[serde(default)]
    pub token: Option<String>,
    /// Address of the user, mandatory when the amount is above the threshold.
    #[serde(default)]
    pub location: Option<LocationInput>,
}

impl GuestInfoInput {
    pub fn validate_for_amount(&self, amount: i64, threshold: i64) -> Result<(), GuestInfoError> {
        if let Some(location) = &self.location {
            location.validate()?;
        }

        let has_location = self
            .location
            .as_ref()
            .map(|location| !location.is_empty())
            .unwrap_or(false);
        if amount > threshold && !has_location {
            return Err(GuestInfoError::LocationRequired { amount, threshold });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn guest(location: Option<LocationInput>) -> GuestInfoInput {
        GuestInfoInput {
            email: EmailAddress::parse("guest@example.org").expect("valid email"),
            name: Some("Jamie Guest".to_string()),
            token: None,
            location,
        }
    }

    #[test]
    fn email_parsing_normalizes_and_rejects_garbage() {
        let email = EmailAddress::parse("  Guest@Example.ORG ").expect("valid");
        assert_eq!(email.as_str(), "guest@example.org");

        for raw in ["", "guest", "@example.org", "guest@example", "a b@example.org", "a@b@c.org", "guest@.org"] {
            assert!(EmailAddress::parse(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn deserialization_validates_email() {
        let parsed: Result<GuestInfoInput, _> =
            serde_json::from_value(json!({ "email": "not-an-email" }));
        assert!(parsed.is_err());

        let parsed: GuestInfoInput = serde_json::from_value(json!({
            "email": "guest@example.org",
            "location": { "address": "1 Main St", "country": "BE" }
        }))
        .expect("valid payload");
        assert_eq!(parsed.location.and_then(|l| l.country), Some("BE".to_string()));
    }

    #[test]
    fn location_required_above_threshold() {
        let missing = guest(None).validate_for_amount(5_000_01, DEFAULT_LOCATION_THRESHOLD);
        assert_eq!(
            missing,
            Err(GuestInfoError::LocationRequired {
                amount: 5_000_01,
                threshold: DEFAULT_LOCATION_THRESHOLD
            })
        );

        let at_threshold = guest(None).validate_for_amount(5_000_00, DEFAULT_LOCATION_THRESHOLD);
        assert!(at_threshold.is_ok());

        let blank = guest(Some(LocationInput::default()))
            .validate_for_amount(10_000_00, DEFAULT_LOCATION_THRESHOLD);
        assert!(blank.is_err());

        let located = guest(Some(LocationInput {
            address: Some("1 Main St".to_string()),
            country: Some("US".to_string()),
            ..LocationInput::default()
        }));
        assert!(located
            .validate_for_amount(10_000_00, DEFAULT_LOCATION_THRESHOLD)
            .is_ok());
    }

    #[test]
    fn country_must_be_iso_alpha2() {
        let located = guest(Some(LocationInput {
            country: Some("usa".to_string()),
            ..LocationInput::default()
        }));
        assert_eq!(
            located.validate_for_amount(100, DEFAULT_LOCATION_THRESHOLD),
            Err(GuestInfoError::InvalidCountry("usa".to_string()))
        );
    }
}
