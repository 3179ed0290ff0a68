//! Retrying action loop.
//!
//! The chassis shared by both agent directions: run an action, sleep, run it
//! again. Retryable failures double the sleep up to a cap; success resets
//! it. Any other error ends the loop.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use debuglet_core::config::RetryConfig;
use debuglet_core::error::Result;
use tokio_util::sync::CancellationToken;

/// Interval state machine, free of any timing side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    min: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, min: Duration, max: Duration) -> Self {
        Self {
            initial,
            min,
            max,
            current: initial,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.initial_interval(),
            config.min_interval(),
            config.max_interval(),
        )
    }

    /// Interval to sleep before the next iteration.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Reset to the initial interval.
    pub fn on_success(&mut self) -> Duration {
        self.current = self.initial;
        self.current
    }

    /// Double the interval, capped at `max`. Zero becomes `min`.
    pub fn on_failure(&mut self) -> Duration {
        let next = if self.current.is_zero() {
            self.min
        } else {
            self.current.saturating_mul(2)
        };
        self.current = next.min(self.max);
        self.current
    }
}

/// One iteration of a retrying loop.
#[async_trait]
pub trait LoopAction: Send {
    async fn run_once(&mut self) -> Result<()>;
}

#[async_trait]
impl<F, Fut> LoopAction for F
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    async fn run_once(&mut self) -> Result<()> {
        (self)().await
    }
}

/// Drives a [`LoopAction`] until cancelled or until it fails fatally.
pub struct RetryLoop {
    name: String,
    backoff: Backoff,
}

impl RetryLoop {
    pub fn new(name: impl Into<String>, config: &RetryConfig) -> Self {
        Self::with_backoff(name, Backoff::from_config(config))
    }

    pub fn with_backoff(name: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            name: name.into(),
            backoff,
        }
    }

    /// Run until `cancel` fires (returns `Ok`) or the action returns a
    /// non-retryable error (returned as is).
    ///
    /// Cancellation is checked before each iteration and interrupts the
    /// sleep. An action already in flight is left to finish.
    pub async fn run<A>(&mut self, action: &mut A, cancel: &CancellationToken) -> Result<()>
    where
        A: LoopAction + ?Sized,
    {
        while !cancel.is_cancelled() {
            match action.run_once().await {
                Ok(()) => {
                    self.backoff.on_success();
                }
                Err(e) if e.is_retryable() => {
                    let next = self.backoff.on_failure();
                    tracing::warn!(
                        loop_name = %self.name,
                        error = %e,
                        retry_in_ms = next.as_millis() as u64,
                        "Action failed, backing off"
                    );
                }
                Err(e) => {
                    tracing::error!(loop_name = %self.name, error = %e, "Action failed fatally");
                    return Err(e);
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.backoff.current()) => {}
            }
        }

        tracing::debug!(loop_name = %self.name, "Loop cancelled");
        Ok(())
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use debuglet_core::error::DebugletError;
    use std::collections::VecDeque;
    use tokio::time::Instant;

    fn unavailable() -> DebugletError {
        DebugletError::Rpc(tonic::Status::unavailable("control plane down"))
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    /// Runs a scripted sequence of outcomes, cancelling after the last one,
    /// and returns the gaps between consecutive calls.
    async fn gaps_for(backoff: Backoff, script: Vec<Result<()>>) -> Vec<Duration> {
        let cancel = CancellationToken::new();
        let mut script: VecDeque<Result<()>> = script.into();
        let mut calls: Vec<Instant> = Vec::new();

        {
            let stop = cancel.clone();
            let calls = &mut calls;
            let mut action = move || {
                calls.push(Instant::now());
                let outcome = script.pop_front().unwrap_or(Ok(()));
                if script.is_empty() {
                    stop.cancel();
                }
                async move { outcome }
            };
            RetryLoop::with_backoff("test", backoff)
                .run(&mut action, &cancel)
                .await
                .unwrap();
        }

        calls.windows(2).map(|w| w[1] - w[0]).collect()
    }

    #[test]
    fn test_backoff_doubles_and_resets() {
        let mut backoff = Backoff::new(ms(100), ms(50), ms(10_000));
        assert_eq!(backoff.current(), ms(100));
        assert_eq!(backoff.on_failure(), ms(200));
        assert_eq!(backoff.on_failure(), ms(400));
        assert_eq!(backoff.on_success(), ms(100));
    }

    #[test]
    fn test_backoff_zero_initial_uses_min() {
        let mut backoff = Backoff::new(Duration::ZERO, ms(50), ms(10_000));
        assert_eq!(backoff.on_failure(), ms(50));
        assert_eq!(backoff.on_failure(), ms(100));
        assert_eq!(backoff.on_success(), Duration::ZERO);
    }

    #[test]
    fn test_backoff_never_exceeds_max() {
        let mut backoff = Backoff::new(ms(1), ms(1), ms(700));
        for _ in 0..100 {
            assert!(backoff.on_failure() <= ms(700));
        }
        assert_eq!(backoff.current(), ms(700));
    }

    #[test]
    fn test_backoff_from_config() {
        let backoff = Backoff::from_config(&RetryConfig::default());
        assert_eq!(backoff.current(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sleep_doubles_after_failure_and_resets_after_success() {
        let gaps = gaps_for(
            Backoff::new(ms(100), ms(50), ms(10_000)),
            vec![
                Ok(()),
                Err(unavailable()),
                Err(unavailable()),
                Ok(()),
                Err(unavailable()),
                Ok(()),
            ],
        )
        .await;

        assert_eq!(gaps, vec![ms(100), ms(200), ms(400), ms(100), ms(200)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_sleep_is_capped() {
        let mut script: Vec<Result<()>> = (0..8).map(|_| Err(unavailable())).collect();
        script.push(Ok(()));
        let gaps = gaps_for(Backoff::new(ms(100), ms(50), ms(1000)), script).await;

        assert_eq!(
            gaps,
            vec![
                ms(200),
                ms(400),
                ms(800),
                ms(1000),
                ms(1000),
                ms(1000),
                ms(1000),
                ms(1000)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_zero_interval_substitutes_min() {
        let gaps = gaps_for(
            Backoff::new(Duration::ZERO, ms(50), ms(400)),
            vec![Err(unavailable()), Err(unavailable()), Ok(()), Ok(())],
        )
        .await;

        assert_eq!(gaps, vec![ms(50), ms(100), Duration::ZERO]);
    }

    #[tokio::test]
    async fn test_non_retryable_error_ends_loop() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let mut action = || {
            calls += 1;
            async { Err(DebugletError::Framing("bad frame".to_string())) }
        };

        let err = RetryLoop::with_backoff("test", Backoff::new(ms(1), ms(1), ms(1)))
            .run(&mut action, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, DebugletError::Framing(_)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_never_runs() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut calls = 0;
        let mut action = || {
            calls += 1;
            async { Ok(()) }
        };

        RetryLoop::new("test", &RetryConfig::default())
            .run(&mut action, &cancel)
            .await
            .unwrap();
        assert_eq!(calls, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(ms(10)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let mut action = || async { Ok(()) };
        let hour = Duration::from_secs(3600);
        RetryLoop::with_backoff("test", Backoff::new(hour, ms(1), hour))
            .run(&mut action, &cancel)
            .await
            .unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
