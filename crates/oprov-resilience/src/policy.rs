//! ---
//! oprov_section: "07-resilience-fault-tolerance"
//! oprov_subsection: "module"
//! oprov_type: "source"
//! oprov_scope: "code"
//! oprov_description: "Retry and fault classification around platform calls."
//! oprov_version: "v0.1.0"
//! oprov_owner: "platform-ops"
//! ---
use std::future::Future;
use std::time::Duration;

use oprov_common::RpcConfig;
use oprov_logging::{prov_error, prov_warn, LogContext};
use oprov_rpc::{ErrorClass, RpcError};
use tokio::time::sleep;
use tracing::debug;

use crate::error::CallError;

/// Policy parameters controlling retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Construct a policy; at least one attempt is always made.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Policy described by the `odoo.rpc` configuration section.
    pub fn from_config(config: &RpcConfig) -> Self {
        Self::new(config.max_attempts, config.retry_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error or
    /// the attempt budget is spent. The closure receives the 1-indexed attempt.
    pub async fn run<T, F, Fut>(
        &self,
        model: &str,
        method: &str,
        mut operation: F,
    ) -> Result<T, CallError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        let ctx = LogContext::new().with_model(model);
        let mut attempt = 1;
        loop {
            let err = match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if let RpcError::Fault(fault) = err {
                prov_error!(
                    context = ctx,
                    "{model}.{method} rejected: fault code {} - {}",
                    fault.code,
                    fault.message
                );
                return Err(CallError::Fault {
                    model: model.to_owned(),
                    method: method.to_owned(),
                    fault,
                });
            }
            match err.class() {
                ErrorClass::Unexpected | ErrorClass::BusinessFault => {
                    prov_error!(context = ctx, "{model}.{method} failed: {err}");
                    return Err(CallError::Unexpected {
                        model: model.to_owned(),
                        method: method.to_owned(),
                        source: err,
                    });
                }
                ErrorClass::Transient if attempt >= self.max_attempts => {
                    prov_error!(
                        context = ctx,
                        "{model}.{method} still failing after {attempt} attempt(s): {err}"
                    );
                    return Err(CallError::RetriesExhausted {
                        model: model.to_owned(),
                        method: method.to_owned(),
                        attempts: attempt,
                        source: err,
                    });
                }
                ErrorClass::Transient => {
                    prov_warn!(
                        context = ctx,
                        "{model}.{method} attempt {attempt}/{} failed: {err}; retrying in {:?}",
                        self.max_attempts,
                        self.delay
                    );
                    sleep(self.delay).await;
                    attempt += 1;
                    debug!(model, method, attempt, "retrying platform call");
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oprov_rpc::RemoteFault;
    use std::cell::Cell;

    #[test]
    fn defaults_match_config_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy, RetryPolicy::from_config(&RpcConfig::default()));
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay, Duration::from_secs(5));
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_wait_between_attempts() {
        let policy = RetryPolicy::default();
        let attempts = Cell::new(0);
        let started = tokio::time::Instant::now();
        let result = policy
            .run("res.users", "search", |attempt| {
                attempts.set(attempt);
                async move {
                    if attempt < 3 {
                        Err(RpcError::Connection("reset".into()))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.get(), 3);
        assert!(started.elapsed() >= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn unexpected_errors_are_not_retried() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let attempts = Cell::new(0);
        let err = policy
            .run("res.users", "read", |attempt| {
                attempts.set(attempt);
                async { Err::<(), _>(RpcError::Malformed("garbage".into())) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, CallError::Unexpected { .. }));
        assert_eq!(attempts.get(), 1);
    }

    #[tokio::test]
    async fn fault_keeps_code_and_message() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let err = policy
            .run("res.users", "create", |_| async {
                Err::<(), _>(RpcError::Fault(RemoteFault::new(200, "login must be unique")))
            })
            .await
            .unwrap_err();
        let fault = err.fault().unwrap();
        assert_eq!(fault.code, 200);
        assert_eq!(fault.message, "login must be unique");
        assert!(!err.is_fatal());
    }
}
