//! Opaque keyset cursor for aggregate listings.
//!
//! A token remembers the first-appearance position of the last aggregate on
//! a page and the type filter the page was listed with. The next page starts
//! strictly after that position, so a token always resumes at the same
//! place, and only under the same filter.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Decoded form of a pagination token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageToken {
    /// Type filter of the listing that issued the token.
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub aggregate_type: Option<String>,
    /// First-appearance position of the last aggregate on the page.
    #[serde(rename = "p")]
    pub position: i64,
}

impl PageToken {
    /// Creates a token resuming after `position` under the given filter.
    #[must_use]
    pub fn new(aggregate_type: Option<&str>, position: i64) -> Self {
        Self {
            aggregate_type: aggregate_type.map(str::to_owned),
            position,
        }
    }

    /// Checks that the token is used with the filter it was issued under.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPageToken` when the filters differ.
    pub fn ensure_filter(&self, aggregate_type: Option<&str>) -> Result<(), DomainError> {
        if self.aggregate_type.as_deref() == aggregate_type {
            Ok(())
        } else {
            Err(DomainError::InvalidPageToken(
                "token was issued for a different aggregate type filter".into(),
            ))
        }
    }

    /// Encodes the token into its opaque string form.
    #[must_use]
    pub fn encode(&self) -> String {
        // Plain fields always serialize.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes a token produced by [`PageToken::encode`].
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidPageToken` if the string is not valid
    /// base64 or does not carry a token.
    pub fn decode(token: &str) -> Result<Self, DomainError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| DomainError::InvalidPageToken(e.to_string()))?;
        let decoded: Self = serde_json::from_slice(&bytes)
            .map_err(|e| DomainError::InvalidPageToken(e.to_string()))?;
        if decoded.position < 0 {
            return Err(DomainError::InvalidPageToken(
                "position must not be negative".into(),
            ));
        }
        Ok(decoded)
    }
}
