use async_trait::async_trait;

/// Supplies the bearer token for the current session, if any.
///
/// The engines treat the token as an opaque string: absence means
/// unauthenticated operation (the server enforces its own policy), never an
/// error.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Always-unauthenticated provider; history stays in local-only mode.
pub struct NoAuth;

#[async_trait]
impl TokenProvider for NoAuth {
    async fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Fixed token, e.g. read from the environment at startup.
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}
