use std::time::Duration;

use alloy::transports::{
    RpcError, TransportError, TransportErrorKind,
    layers::{RetryBackoffLayer, RetryPolicy},
};
use alloy_json_rpc::ErrorPayload;
use serde::Deserialize;
use tokio_retry::{RetryIf, strategy::ExponentialBackoff};

/// The default maximum number of retries for a transport error.
///
/// With a `DEFAULT_INITIAL_BACKOFF_MS` of 1ms we can do 9 retries in ~500ms:
pub const DEFAULT_MAX_RETRIES: u32 = 9;

/// The default initial backoff time in milliseconds for a transport error.
const DEFAULT_INITIAL_BACKOFF_MS: u64 = 1;

/// Compute units per second assumed for a public BSC dataseed endpoint.
const DEFAULT_COMPUTE_UNITS_PER_SECOND: u64 = 100;

/// The default [`RetryBackoffLayer`] for the HTTP JSON-RPC client.
pub const DEFAULT_RETRY_LAYER: RetryBackoffLayer<RateLimitConnRefusedRetryPolicy> =
    RetryBackoffLayer::new_with_policy(
        DEFAULT_MAX_RETRIES,
        DEFAULT_INITIAL_BACKOFF_MS,
        DEFAULT_COMPUTE_UNITS_PER_SECOND,
        RateLimitConnRefusedRetryPolicy,
    );

/// Extension trait to implement methods for [`RpcError<TransportErrorKind, E>`].
///
/// Ported from Alloy because it is private to its crate.
/// Reference: <https://github.com/alloy-rs/alloy/blob/a3d521e18fe335f5762be03656a3470f5f6331d8/crates/transport/src/error.rs#L126>
pub(crate) trait RpcErrorExt {
    /// Analyzes whether to retry the request depending on the error.
    fn is_retryable(&self) -> bool;

    /// Fetches the backoff hint from the error message if present
    fn backoff_hint(&self) -> Option<std::time::Duration>;
}

impl RpcErrorExt for RpcError<TransportErrorKind> {
    fn is_retryable(&self) -> bool {
        match self {
            // There was a transport-level error. This is either a non-retryable error,
            // or a server error that should be retried.
            Self::Transport(err) => err.is_retry_err(),
            Self::DeserError { text, .. } => {
                if let Ok(resp) = serde_json::from_str::<ErrorPayload>(text) {
                    return resp.is_retry_err();
                }

                // some providers send invalid JSON RPC in the error case (no `id:u64`), but the
                // text should be a `JsonRpcError`
                #[derive(Deserialize)]
                struct Resp {
                    error: ErrorPayload,
                }

                if let Ok(resp) = serde_json::from_str::<Resp>(text) {
                    return resp.error.is_retry_err();
                }

                false
            }
            Self::ErrorResp(err) => err.is_retry_err(),
            Self::NullResp => true,
            // The transport could not serialize the error itself. The request was malformed from
            // the start.
            #[allow(clippy::match_same_arms)]
            Self::SerError(_) => false,
            _ => false,
        }
    }

    fn backoff_hint(&self) -> Option<std::time::Duration> {
        if let Self::ErrorResp(resp) = self {
            let data = resp.try_data_as::<serde_json::Value>();
            if let Some(Ok(data)) = data {
                // if daily rate limit exceeded, infura returns the requested backoff in the error
                // response
                let backoff_seconds = &data["rate"]["backoff_seconds"];
                // infura rate limit error
                if let Some(seconds) = backoff_seconds.as_u64() {
                    return Some(std::time::Duration::from_secs(seconds));
                }
                if let Some(seconds) = backoff_seconds.as_f64() {
                    return Some(std::time::Duration::from_secs(seconds as u64 + 1));
                }
            }
        }
        None
    }
}

/// A retry policy that retries also on "connection refused" errors.
#[derive(Debug, Clone)]
pub struct RateLimitConnRefusedRetryPolicy;

impl RetryPolicy for RateLimitConnRefusedRetryPolicy {
    fn should_retry(&self, error: &TransportError) -> bool {
        error.is_retryable() || is_connection_refused(error)
    }

    fn backoff_hint(&self, error: &TransportError) -> Option<Duration> {
        error.backoff_hint()
    }
}

/// Checks whether the error message contains "connection refused".
#[inline]
pub fn is_connection_refused<S: ToString>(e: S) -> bool {
    e.to_string().to_lowercase().contains("connection refused")
}

/// Retry the provided async operation using [`ExponentialBackoff`].
///
/// Retries are attempted as long as the provided `condition` returns `true` for
/// the error produced by the operation. The backoff uses the same
/// `DEFAULT_MAX_RETRIES` and `DEFAULT_INITIAL_BACKOFF_MS` constants as the
/// JSON-RPC retry layer.
pub async fn retry_with_backoff_if<F, Fut, T, E, C>(op: F, condition: C) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
{
    let strategy = ExponentialBackoff::from_millis(DEFAULT_INITIAL_BACKOFF_MS)
        .take(DEFAULT_MAX_RETRIES as usize);
    RetryIf::spawn(strategy, op, condition).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn connection_refused_is_detected_case_insensitively() {
        assert!(is_connection_refused("error sending request: Connection Refused (os error 111)"));
        assert!(!is_connection_refused("execution reverted"));
    }

    #[test]
    fn null_response_is_retryable() {
        let err: TransportError = RpcError::NullResp;
        assert!(RateLimitConnRefusedRetryPolicy.should_retry(&err));
    }

    #[tokio::test]
    async fn retries_until_condition_fails() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), &str> = retry_with_backoff_if(
            || {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move { if n < 2 { Err("busy") } else { Err("fatal") } }
            },
            |e| *e == "busy",
        )
        .await;
        assert_eq!(result, Err("fatal"));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
