//! Periodic Reading Emitter
//!
//! Produces an unbounded, lazy sequence of [`Reading`]s, one per interval.
//!
//! # Semantics
//!
//! - The first reading is emitted one interval after subscription.
//! - Reading ids are the zero-based tick counter of the subscription:
//!   the first reading has id `0`, the second `1`, and so on.
//! - Each reading is generated when its tick fires, never ahead of time.
//! - Ticks missed by a slow consumer are delayed, not burst: after a stall
//!   the next reading is emitted immediately and cadence then resumes one
//!   interval later.
//! - Dropping the stream drops its timer; nothing keeps running.
//! - When the emitter's shutdown token is cancelled, every live stream
//!   yields [`EmitterError::SchedulerShutdown`] once and then ends.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};
use std::time::Duration;

use futures::Stream;
use futures::stream::FusedStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::application::ports::{ValueSource, ValueSourceFactory};
use crate::domain::reading::{Reading, ReadingId};

// =============================================================================
// Errors
// =============================================================================

/// Emitter errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmitterError {
    /// The interval must be non-zero.
    #[error("emission interval must be greater than zero")]
    ZeroInterval,

    /// The scheduler shut down while the stream was live.
    #[error("scheduler shut down")]
    SchedulerShutdown,

    /// The tick counter cannot represent another reading id.
    #[error("tick counter exhausted after id {0}")]
    TickOverflow(ReadingId),
}

// =============================================================================
// Emitter
// =============================================================================

/// Factory of independent periodic reading streams.
#[derive(Clone)]
pub struct ReadingEmitter {
    interval: Duration,
    sources: Arc<dyn ValueSourceFactory>,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for ReadingEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingEmitter")
            .field("interval", &self.interval)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl ReadingEmitter {
    /// Create an emitter.
    ///
    /// # Errors
    ///
    /// Returns [`EmitterError::ZeroInterval`] if `interval` is zero.
    pub fn new(
        interval: Duration,
        sources: Arc<dyn ValueSourceFactory>,
        shutdown: CancellationToken,
    ) -> Result<Self, EmitterError> {
        if interval.is_zero() {
            return Err(EmitterError::ZeroInterval);
        }

        Ok(Self {
            interval,
            sources,
            shutdown,
        })
    }

    /// Time between two emissions.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Start a new, independent reading stream.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime with the time driver enabled.
    #[must_use]
    pub fn subscribe(&self) -> ReadingStream {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        ReadingStream {
            ticker,
            source: self.sources.create(),
            next_id: Some(0),
            shutdown: Box::pin(self.shutdown.clone().cancelled_owned()),
            terminated: false,
        }
    }
}

// =============================================================================
// Stream
// =============================================================================

/// One subscription's reading sequence.
///
/// Yields `Ok(reading)` forever, or a single `Err` followed by the end of
/// the stream.
pub struct ReadingStream {
    ticker: Interval,
    source: Box<dyn ValueSource>,
    next_id: Option<ReadingId>,
    shutdown: Pin<Box<WaitForCancellationFutureOwned>>,
    terminated: bool,
}

impl std::fmt::Debug for ReadingStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadingStream")
            .field("period", &self.ticker.period())
            .field("next_id", &self.next_id)
            .field("terminated", &self.terminated)
            .finish_non_exhaustive()
    }
}

impl ReadingStream {
    fn fail(&mut self, error: EmitterError) -> Poll<Option<Result<Reading, EmitterError>>> {
        self.terminated = true;
        Poll::Ready(Some(Err(error)))
    }
}

impl Stream for ReadingStream {
    type Item = Result<Reading, EmitterError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if this.terminated {
            return Poll::Ready(None);
        }

        if this.shutdown.as_mut().poll(cx).is_ready() {
            return this.fail(EmitterError::SchedulerShutdown);
        }

        ready!(this.ticker.poll_tick(cx));

        let Some(id) = this.next_id else {
            return this.fail(EmitterError::TickOverflow(ReadingId::MAX));
        };
        this.next_id = id.checked_add(1);

        Poll::Ready(Some(Ok(Reading::sample(id, &mut this.source))))
    }
}

impl FusedStream for ReadingStream {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::ops::Range;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::StreamExt;

    use super::*;
    use crate::domain::reading::VALUE_RANGE;

    const INTERVAL: Duration = Duration::from_secs(1);

    /// Cycles through fixed values and counts how often it was sampled.
    struct ScriptedSource {
        values: Vec<f64>,
        calls: Arc<AtomicUsize>,
    }

    impl ValueSource for ScriptedSource {
        fn sample(&mut self, range: Range<f64>) -> f64 {
            assert_eq!(range, VALUE_RANGE);
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.values[n % self.values.len()]
        }
    }

    fn scripted_emitter(values: Vec<f64>) -> (ReadingEmitter, Arc<AtomicUsize>, CancellationToken) {
        let calls = Arc::new(AtomicUsize::new(0));
        let factory_calls = Arc::clone(&calls);
        let factory = move || -> Box<dyn ValueSource> {
            Box::new(ScriptedSource {
                values: values.clone(),
                calls: Arc::clone(&factory_calls),
            })
        };
        let shutdown = CancellationToken::new();
        let emitter = ReadingEmitter::new(INTERVAL, Arc::new(factory), shutdown.clone()).unwrap();
        (emitter, calls, shutdown)
    }

    #[test]
    fn zero_interval_rejected() {
        let factory = || -> Box<dyn ValueSource> { unreachable!() };
        let result = ReadingEmitter::new(Duration::ZERO, Arc::new(factory), CancellationToken::new());
        assert_eq!(result.unwrap_err(), EmitterError::ZeroInterval);
    }

    #[tokio::test(start_paused = true)]
    async fn first_reading_arrives_after_one_interval() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![21.0]);
        let start = Instant::now();

        let mut stream = emitter.subscribe();
        let reading = stream.next().await.unwrap().unwrap();

        assert_eq!(start.elapsed(), INTERVAL);
        assert_eq!(reading.id(), 0);
        assert!((reading.value() - 21.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_emitted_before_the_first_interval() {
        let (emitter, calls, _shutdown) = scripted_emitter(vec![21.0]);
        let mut stream = emitter.subscribe();

        {
            let mut next = tokio_test::task::spawn(stream.next());
            tokio_test::assert_pending!(next.poll());
        }
        tokio::time::advance(INTERVAL - Duration::from_millis(1)).await;
        {
            let mut next = tokio_test::task::spawn(stream.next());
            tokio_test::assert_pending!(next.poll());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_millis(1)).await;
        let reading = stream.next().await.unwrap().unwrap();
        assert_eq!(reading.id(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn three_and_a_half_intervals_yield_three_readings() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![20.5, 27.0, 34.5]);
        let mut stream = emitter.subscribe();
        let mut readings = Vec::new();

        let _ = tokio::time::timeout(INTERVAL.mul_f64(3.5), async {
            while let Some(item) = stream.next().await {
                readings.push(item.unwrap());
            }
        })
        .await;

        let ids: Vec<_> = readings.iter().map(Reading::id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert!(readings.iter().all(Reading::in_range));
        assert!(
            readings
                .windows(2)
                .all(|w| w[0].timestamp() <= w[1].timestamp())
        );
        let values: Vec<_> = readings.iter().map(Reading::value).collect();
        assert_eq!(values, vec![20.5, 27.0, 34.5]);
    }

    #[tokio::test(start_paused = true)]
    async fn cadence_is_one_interval() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![25.0]);
        let mut stream = emitter.subscribe();

        stream.next().await.unwrap().unwrap();
        for _ in 0..5 {
            let before = Instant::now();
            stream.next().await.unwrap().unwrap();
            assert_eq!(before.elapsed(), INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_consumer_gets_delayed_ticks_not_a_burst() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![25.0]);
        let start = Instant::now();
        let mut stream = emitter.subscribe();

        tokio::time::sleep(INTERVAL.mul_f64(3.5)).await;

        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.id(), 0);
        assert_eq!(start.elapsed(), INTERVAL.mul_f64(3.5));

        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(second.id(), 1);
        assert_eq!(start.elapsed(), INTERVAL.mul_f64(4.5));
    }

    #[tokio::test(start_paused = true)]
    async fn values_are_generated_at_emission_time() {
        let (emitter, calls, _shutdown) = scripted_emitter(vec![22.0, 23.0]);
        let mut stream = emitter.subscribe();

        tokio::time::sleep(INTERVAL * 10).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        stream.next().await.unwrap().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stream_releases_source_and_timer() {
        let (emitter, calls, _shutdown) = scripted_emitter(vec![22.0]);
        let mut stream = emitter.subscribe();
        stream.next().await.unwrap().unwrap();

        drop(stream);
        tokio::time::sleep(INTERVAL * 5).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Only the factory closure still holds the counter.
        assert_eq!(Arc::strong_count(&calls), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subscriptions_are_isolated() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![30.0]);
        let mut first = emitter.subscribe();

        first.next().await.unwrap().unwrap();
        first.next().await.unwrap().unwrap();

        let mut second = emitter.subscribe();
        let a = first.next().await.unwrap().unwrap();
        let b = second.next().await.unwrap().unwrap();
        assert_eq!(a.id(), 2);
        assert_eq!(b.id(), 0);

        drop(first);
        let b = second.next().await.unwrap().unwrap();
        assert_eq!(b.id(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_stream_once() {
        let (emitter, _calls, shutdown) = scripted_emitter(vec![30.0]);
        let mut stream = emitter.subscribe();
        stream.next().await.unwrap().unwrap();

        shutdown.cancel();

        assert_eq!(
            stream.next().await.unwrap().unwrap_err(),
            EmitterError::SchedulerShutdown
        );
        assert!(stream.is_terminated());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribe_after_shutdown_aborts_immediately() {
        let (emitter, calls, shutdown) = scripted_emitter(vec![30.0]);
        shutdown.cancel();
        let start = Instant::now();

        let mut stream = emitter.subscribe();

        assert_eq!(
            stream.next().await.unwrap().unwrap_err(),
            EmitterError::SchedulerShutdown
        );
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_counter_overflow_ends_stream() {
        let (emitter, _calls, _shutdown) = scripted_emitter(vec![30.0]);
        let mut stream = emitter.subscribe();
        stream.next_id = Some(ReadingId::MAX);

        let last = stream.next().await.unwrap().unwrap();
        assert_eq!(last.id(), ReadingId::MAX);

        assert_eq!(
            stream.next().await.unwrap().unwrap_err(),
            EmitterError::TickOverflow(ReadingId::MAX)
        );
        assert!(stream.next().await.is_none());
    }
}
