use std::{env, fmt};

use crate::ApiError;

/// Environment variables consulted, in order, for an OAuth access token.
const TOKEN_ENV_VARS: &[&str] = &["GOOGLE_OAUTH_ACCESS_TOKEN", "CLOUDSDK_AUTH_ACCESS_TOKEN"];

/// Opaque bearer credential handed to the HTTP client.
///
/// The engine never inspects it; obtaining and refreshing tokens belongs to
/// whatever bootstraps the process.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
}

impl Credential {
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into().trim().to_string(),
        }
    }

    /// Read a token from the first non-empty variable in [`TOKEN_ENV_VARS`].
    pub fn from_env() -> Result<Self, ApiError> {
        TOKEN_ENV_VARS
            .iter()
            .filter_map(|name| env::var(name).ok())
            .find(|value| !value.trim().is_empty())
            .map(Self::bearer)
            .ok_or(ApiError::MissingCredential)
    }

    pub(crate) fn authorization_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").field("token", &"<redacted>").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_env_prefers_google_oauth_token() {
        temp_env::with_vars(
            [
                ("GOOGLE_OAUTH_ACCESS_TOKEN", Some("ya29.primary")),
                ("CLOUDSDK_AUTH_ACCESS_TOKEN", Some("ya29.secondary")),
            ],
            || {
                let credential = Credential::from_env().expect("credential");
                assert_eq!(credential.authorization_value(), "Bearer ya29.primary");
            },
        );
    }

    #[test]
    fn from_env_skips_blank_values() {
        temp_env::with_vars(
            [
                ("GOOGLE_OAUTH_ACCESS_TOKEN", Some("  ")),
                ("CLOUDSDK_AUTH_ACCESS_TOKEN", Some("ya29.secondary")),
            ],
            || {
                let credential = Credential::from_env().expect("credential");
                assert_eq!(credential.authorization_value(), "Bearer ya29.secondary");
            },
        );
    }

    #[test]
    fn from_env_without_token_is_an_error() {
        temp_env::with_vars_unset(["GOOGLE_OAUTH_ACCESS_TOKEN", "CLOUDSDK_AUTH_ACCESS_TOKEN"], || {
            assert!(matches!(Credential::from_env(), Err(ApiError::MissingCredential)));
        });
    }

    #[test]
    fn debug_output_hides_the_token() {
        let rendered = format!("{:?}", Credential::bearer("ya29.secret"));
        assert!(!rendered.contains("ya29.secret"), "{rendered}");
    }
}
