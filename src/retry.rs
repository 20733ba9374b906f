use std::future::Future;
use tracing::{debug, warn};

/// Итог одной попытки.
pub enum Step<T> {
    Done(T),
    Retry,
}

/// Повторяет `op` не больше `attempts` раз. `Err` и `Step::Retry` ведут к следующей
/// попытке, после последней возвращается `fallback()`.
pub async fn retry_with_cap<T, F, Fut>(
    label: &'static str,
    attempts: u32,
    fallback: impl FnOnce() -> T,
    mut op: F,
) -> T
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = anyhow::Result<Step<T>>>,
{
    for attempt in 1..=attempts {
        match op(attempt).await {
            Ok(Step::Done(value)) => return value,
            Ok(Step::Retry) => debug!(label, attempt, "attempt declined, retrying"),
            Err(e) => warn!(label, attempt, error = %e, "attempt failed"),
        }
    }
    debug!(label, attempts, "attempts exhausted, using fallback");
    fallback()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn stops_on_first_success() {
        let calls = AtomicU32::new(0);
        let v = retry_with_cap("t", 3, || 0, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { if n == 2 { Ok(Step::Done(n)) } else { Ok(Step::Retry) } }
        })
        .await;
        assert_eq!(v, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn errors_count_as_attempts_and_fallback_is_returned() {
        let calls = AtomicU32::new(0);
        let v: &str = retry_with_cap("t", 3, || "fallback", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(anyhow::anyhow!("network")) }
        })
        .await;
        assert_eq!(v, "fallback");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
