//! Verified caller identity supplied by the external identity provider
//!
//! The session never validates or decodes the credential. It only forwards it
//! on outbound provider requests.

use std::fmt;

/// Opaque bearer credential
#[derive(Clone, PartialEq, Eq)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BearerToken(***)")
    }
}

/// Principal attached to a session by the identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    pub credential: BearerToken,
}

impl Principal {
    pub fn new(id: impl Into<String>, credential: BearerToken) -> Self {
        Self {
            id: id.into(),
            credential,
        }
    }
}

/// Attach the principal's credential, if any, to an outbound request
pub(crate) fn authorize(
    request: reqwest::RequestBuilder,
    principal: Option<&Principal>,
) -> reqwest::RequestBuilder {
    match principal {
        Some(p) => request.bearer_auth(p.credential.as_str()),
        None => request,
    }
}
