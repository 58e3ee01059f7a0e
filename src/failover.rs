//! Credential failover for model calls.
//!
//! Each model-call site runs its call once per credential, in order, and
//! moves on only when the current credential reports
//! [`ModelCallResult::RateLimited`]. A [`ModelCallResult::Failure`] stops
//! immediately. When every credential is rate-limited the stage fails with
//! [`PipelineError::QuotaExhausted`]; there is no further retry.

use std::future::Future;

use crate::error::PipelineError;
use crate::llm::{Credential, CredentialSet, ModelCallResult};

/// Run `call` with each credential until one does not report a rate limit.
pub async fn call_with_failover<F, Fut>(
    stage: &'static str,
    credentials: &CredentialSet,
    mut call: F,
) -> Result<String, PipelineError>
where
    F: FnMut(Credential) -> Fut,
    Fut: Future<Output = ModelCallResult>,
{
    let mut attempts = 0;

    for credential in credentials.iter() {
        attempts += 1;
        let label = credential.label().to_string();

        match call(credential.clone()).await {
            ModelCallResult::Success(text) => {
                if attempts > 1 {
                    tracing::info!(stage, credential = %label, "fallback credential succeeded");
                }
                return Ok(text);
            }
            ModelCallResult::RateLimited => {
                tracing::warn!(stage, credential = %label, "credential rate limited");
            }
            ModelCallResult::Failure(err) => {
                tracing::error!(stage, credential = %label, error = %err, "model call failed");
                return Err(err);
            }
        }
    }

    Err(PipelineError::QuotaExhausted { stage, attempts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn creds(n: usize) -> CredentialSet {
        CredentialSet::new(
            (0..n)
                .map(|i| Credential::new(format!("KEY_{}", i), format!("secret-{}", i)))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_primary_success_makes_one_call() {
        let calls = AtomicUsize::new(0);
        let out = call_with_failover("test", &creds(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ModelCallResult::Success("ok".to_string()) }
        })
        .await
        .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_moves_to_next_credential() {
        let seen = std::sync::Mutex::new(Vec::new());
        let out = call_with_failover("test", &creds(2), |cred| {
            seen.lock().unwrap().push(cred.label().to_string());
            let limited = cred.label() == "KEY_0";
            async move {
                if limited {
                    ModelCallResult::RateLimited
                } else {
                    ModelCallResult::Success("from secondary".to_string())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "from secondary");
        assert_eq!(*seen.lock().unwrap(), vec!["KEY_0", "KEY_1"]);
    }

    #[tokio::test]
    async fn test_failure_is_not_failed_over() {
        let calls = AtomicUsize::new(0);
        let err = call_with_failover("test", &creds(2), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ModelCallResult::Failure(PipelineError::unexpected("{}")) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, PipelineError::UnexpectedResponse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_all_rate_limited_exhausts_quota() {
        let calls = AtomicUsize::new(0);
        let err = call_with_failover("generate", &creds(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { ModelCallResult::RateLimited }
        })
        .await
        .unwrap_err();
        match err {
            PipelineError::QuotaExhausted { stage, attempts } => {
                assert_eq!(stage, "generate");
                assert_eq!(attempts, 3);
            }
            other => panic!("expected QuotaExhausted, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
