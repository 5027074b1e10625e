//! Single retry after a token refresh.

use std::future::Future;

/// Send, and if the response is unauthorized, refresh and send once more.
///
/// The second response is returned whatever it is; a second 401 is left to
/// the caller's status handling.
pub async fn with_refresh_retry<T, E, S, SF, U, R, RF>(
    mut send: S,
    is_unauthorized: U,
    refresh: R,
) -> Result<T, E>
where
    S: FnMut() -> SF,
    SF: Future<Output = Result<T, E>>,
    U: Fn(&T) -> bool,
    R: FnOnce() -> RF,
    RF: Future<Output = Result<(), E>>,
{
    let first = send().await?;
    if !is_unauthorized(&first) {
        return Ok(first);
    }

    tracing::info!("request unauthorized, refreshing token and retrying");
    refresh().await?;
    send().await
}
