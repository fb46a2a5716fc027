use eyre::Report;
use primitives::retries::retry_with_backoff_if;
use reqwest::{Error as ReqwestError, StatusCode};

/// Explorer payload text returned when the API key is throttled.
const RATE_LIMIT_MESSAGE: &str = "rate limit";

/// Determine if an error returned by reqwest/eyre is retryable.
pub fn is_retryable(err: &Report) -> bool {
    if let Some(req_err) = err.downcast_ref::<ReqwestError>() {
        if req_err.is_timeout() || req_err.is_connect() {
            return true;
        }
        if let Some(status) = req_err.status() {
            return status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS;
        }
    }
    err.to_string().to_lowercase().contains(RATE_LIMIT_MESSAGE)
}

/// Retry the provided async operation with exponential backoff if the returned
/// error is considered retryable.
pub async fn retry_op<F, Fut, T>(op: F) -> eyre::Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = eyre::Result<T>>,
{
    retry_with_backoff_if(op, is_retryable).await
}
