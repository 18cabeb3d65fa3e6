//! Credential suppliers.
//!
//! The executor asks for a token immediately before every attempt, so a
//! supplier may be called many times and from many threads. Implementations
//! must be idempotent; acquiring the token in the first place (login flows,
//! refresh) is the caller's business.

/// Error returned when no token could be produced. Never retried by the core.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct CredentialError(pub String);

/// Produces a bearer token. An empty string means "send no Authorization header".
pub trait CredentialSupplier: Send + Sync {
    fn token(&self) -> Result<String, CredentialError>;
}

/// No authentication (local endpoints, tests).
#[derive(Debug, Clone, Copy, Default)]
pub struct Anonymous;

impl CredentialSupplier for Anonymous {
    fn token(&self) -> Result<String, CredentialError> {
        Ok(String::new())
    }
}

/// Fixed token obtained up front by the caller.
#[derive(Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl std::fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticToken(<redacted>)")
    }
}

impl CredentialSupplier for StaticToken {
    fn token(&self) -> Result<String, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Reads the token from an environment variable on every call, so an external
/// refresher that rewrites the variable is picked up between attempts.
#[derive(Debug, Clone)]
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }

    pub fn var(&self) -> &str {
        &self.var
    }
}

impl CredentialSupplier for EnvToken {
    fn token(&self) -> Result<String, CredentialError> {
        match std::env::var(&self.var) {
            Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
            Ok(_) => Err(CredentialError(format!("{} is empty", self.var))),
            Err(_) => Err(CredentialError(format!("{} is not set", self.var))),
        }
    }
}
