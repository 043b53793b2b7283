use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use services::BotEngine;
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::metrics::ApiMetrics;

/// State shared across all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BotEngine>,
    api_token: Arc<SecretString>,
    webhook_secret: Option<Arc<SecretString>>,
    pub metrics: Arc<ApiMetrics>,
}

impl AppState {
    pub fn new(
        engine: Arc<BotEngine>,
        api_token: SecretString,
        webhook_secret: Option<SecretString>,
    ) -> Self {
        Self {
            engine,
            api_token: Arc::new(api_token),
            webhook_secret: webhook_secret.map(Arc::new),
            metrics: Arc::new(ApiMetrics::new()),
        }
    }

    /// Accepts the first token the caller supplied, query or body.
    pub(crate) fn authorize<'a>(
        &self,
        route: &str,
        candidates: impl IntoIterator<Item = Option<&'a str>>,
    ) -> Result<(), ApiError> {
        let expected = self.api_token.expose_secret();
        if candidates
            .into_iter()
            .flatten()
            .any(|token| secrets_match(token, expected))
        {
            self.metrics.admin_request(route);
            Ok(())
        } else {
            tracing::warn!(route, "admin api call with a bad token");
            Err(ApiError::Unauthorized)
        }
    }

    /// `true` when no secret is configured.
    pub(crate) fn webhook_secret_matches(&self, observed: Option<&str>) -> bool {
        match &self.webhook_secret {
            None => true,
            Some(expected) => observed
                .map(str::trim)
                .is_some_and(|observed| secrets_match(observed, expected.expose_secret())),
        }
    }
}

/// Compares fixed-length digests without short-circuiting, so the time taken
/// does not depend on how much of the secret a caller guessed.
fn secrets_match(observed: &str, expected: &str) -> bool {
    let observed = Sha256::digest(observed.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    observed
        .iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

#[cfg(test)]
mod tests {
    use super::secrets_match;

    #[test]
    fn secrets_match_only_on_equal_input() {
        assert!(secrets_match("api-token", "api-token"));
        assert!(!secrets_match("api-toke", "api-token"));
        assert!(!secrets_match("api-tokenX", "api-token"));
        assert!(!secrets_match("", "api-token"));
        assert!(secrets_match("", ""));
    }
}
