//! Bearer-token providers for the remote cache.

use std::fmt;

/// Supplies the bearer token sent with remote cache requests.
///
/// Returning `None` sends unauthenticated requests; the server then decides
/// whether to answer or reject them with 401.
pub trait CredentialsProvider: Send + Sync + fmt::Debug {
    /// Returns the current token, if any.
    fn token(&self) -> Option<String>;
}

/// A fixed token.
#[derive(Clone)]
pub struct StaticCredentials {
    token: String,
}

impl StaticCredentials {
    /// Creates a provider that always returns `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl fmt::Debug for StaticCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

impl CredentialsProvider for StaticCredentials {
    fn token(&self) -> Option<String> {
        Some(self.token.clone())
    }
}

/// Reads the token from an environment variable on every request.
#[derive(Debug, Clone)]
pub struct EnvCredentials {
    var: String,
}

impl EnvCredentials {
    /// Creates a provider reading `var`.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    /// Returns the variable name.
    pub fn var(&self) -> &str {
        &self.var
    }
}

impl CredentialsProvider for EnvCredentials {
    fn token(&self) -> Option<String> {
        std::env::var(&self.var)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_is_redacted_in_debug() {
        let creds = StaticCredentials::new("secret");
        assert_eq!(creds.token().as_deref(), Some("secret"));
        assert!(!format!("{creds:?}").contains("secret"));
    }

    #[test]
    fn env_missing_variable_is_anonymous() {
        let creds = EnvCredentials::new("HOARD_TEST_TOKEN_THAT_IS_NEVER_SET");
        assert_eq!(creds.token(), None);
        assert_eq!(creds.var(), "HOARD_TEST_TOKEN_THAT_IS_NEVER_SET");
    }
}
