//! Per-stage and end-to-end deadlines for a turn (§4.5 "Deadlines").

use std::time::Duration;

pub const END_TO_END_DEADLINE: Duration = Duration::from_secs(20);
pub const EMOTION_STAGE_DEADLINE: Duration = Duration::from_secs(3);
pub const RESPONSE_STAGE_DEADLINE: Duration = Duration::from_secs(10);
pub const TTS_STAGE_DEADLINE: Duration = Duration::from_secs(8);

/// Runs `fut` against `deadline`, returning `None` on timeout rather than an
/// error — every call site here has an explicit substitution behavior for a
/// stage timeout (§4.5), so there's never an error to propagate.
pub async fn with_deadline<T>(deadline: Duration, fut: impl std::future::Future<Output = T>) -> Option<T> {
    tokio::time::timeout(deadline, fut).await.ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn with_deadline_returns_some_when_fast_enough() {
        let result = with_deadline(Duration::from_millis(50), async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn with_deadline_returns_none_on_timeout() {
        let result = with_deadline(Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            42
        })
        .await;
        assert_eq!(result, None);
    }
}
