use std::fmt;

use url::Url;

use crate::error::{Error, Result};

/// HTTP Basic credentials attached to every request sent to an endpoint
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Remote service address: an absolute URI plus optional Basic credentials.
///
/// Immutable once built; clone or share it behind an `Arc` across calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    credentials: Option<Credentials>,
}

impl Endpoint {
    /// Build an endpoint from an absolute `http`/`https` URI
    pub fn new(uri: &str) -> Result<Self> {
        let url = Url::parse(uri.trim()).map_err(|e| {
            Error::Precondition(format!("endpoint URI '{uri}' is not absolute: {e}"))
        })?;

        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(Error::Precondition(format!(
                "endpoint URI '{uri}' must be an absolute http(s) URI"
            )));
        }

        Ok(Self {
            url,
            credentials: None,
        })
    }

    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Attach credentials when both parts are configured
    pub fn with_optional_auth(self, username: Option<&str>, password: Option<&str>) -> Self {
        match (username, password) {
            (Some(user), Some(pass)) => self.with_basic_auth(user, pass),
            _ => self,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn rejects_relative_and_non_http_uris() {
        assert!(matches!(Endpoint::new("/sparql"), Err(Error::Precondition(_))));
        assert!(matches!(
            Endpoint::new("mailto:someone@example.org"),
            Err(Error::Precondition(_))
        ));
        assert!(matches!(Endpoint::new(""), Err(Error::Precondition(_))));
    }

    #[test]
    fn keeps_credentials_out_of_debug_output() {
        let endpoint = Endpoint::new("http://localhost:3030/ds/sparql")
            .unwrap()
            .with_basic_auth("admin", "s3cret");
        let debug = format!("{endpoint:?}");
        assert!(debug.contains("admin"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn optional_auth_needs_both_parts() {
        let endpoint = Endpoint::new("http://localhost/sparql").unwrap();
        assert!(
            endpoint
                .clone()
                .with_optional_auth(Some("user"), None)
                .credentials()
                .is_none()
        );
        assert!(
            endpoint
                .with_optional_auth(Some("user"), Some("pass"))
                .credentials()
                .is_some()
        );
    }
}
