//! Debounced recompression for interactive settings changes.
//!
//! A slider or a stream of typed-in settings produces many requests in
//! quick succession. Encoding each one would be wasted work, and results of
//! older requests could land after newer ones. Two pieces handle that:
//!
//! - [`Debouncer`]: a worker thread that waits for a quiet period before
//!   handling the most recent value. Values that arrive while a window is
//!   open replace the pending one and restart the window (depth 1).
//! - [`ResultSlot`]: hands out increasing [`Ticket`]s and accepts a result
//!   only for the newest ticket, so a slow stale computation can never
//!   overwrite a fresher one.
//!
//! [`LiveCompressor`] wires both to [`compress`](crate::compress::compress).
//! In-flight searches are not cancelled; their results are just discarded
//! when stale.

use crate::compress::{CompressError, CompressReport, compress};
use crate::imaging::{
    EncodeBackend, EncodeRequest, Format, ParseFormatError, ParseQualityError, Quality,
    QualityMode, parse_byte_size,
};
use crate::source::SourceImage;
use std::str::FromStr;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("live worker has stopped")]
pub struct WorkerStopped;

/// Runs `handler` on the last value of each burst, on a worker thread.
///
/// Dropping the debouncer flushes a pending value immediately and waits for
/// the worker to finish.
pub struct Debouncer<T> {
    sender: Option<Sender<T>>,
    worker: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn spawn<F>(window: Duration, mut handler: F) -> Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel::<T>();
        let worker = thread::spawn(move || {
            // Idle until a burst starts.
            while let Ok(mut pending) = receiver.recv() {
                loop {
                    match receiver.recv_timeout(window) {
                        Ok(newer) => pending = newer,
                        Err(RecvTimeoutError::Timeout) => break,
                        Err(RecvTimeoutError::Disconnected) => {
                            handler(pending);
                            return;
                        }
                    }
                }
                handler(pending);
            }
        });
        Self {
            sender: Some(sender),
            worker: Some(worker),
        }
    }

    /// Queue a value, replacing any value still waiting for its window.
    pub fn submit(&self, value: T) -> Result<(), WorkerStopped> {
        match &self.sender {
            Some(sender) => sender.send(value).map_err(|_| WorkerStopped),
            None => Err(WorkerStopped),
        }
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        drop(self.sender.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("live worker panicked");
            }
        }
    }
}

/// Position of a request in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticket(u64);

impl Ticket {
    pub fn value(self) -> u64 {
        self.0
    }
}

struct SlotState<R> {
    issued: u64,
    published: u64,
    latest: Option<Arc<R>>,
}

/// Last-write-wins holder for the newest result.
pub struct ResultSlot<R> {
    state: Mutex<SlotState<R>>,
    ready: Condvar,
}

impl<R> Default for ResultSlot<R> {
    fn default() -> Self {
        Self {
            state: Mutex::new(SlotState {
                issued: 0,
                published: 0,
                latest: None,
            }),
            ready: Condvar::new(),
        }
    }
}

impl<R> ResultSlot<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket newer than every ticket issued before.
    pub fn next_ticket(&self) -> Ticket {
        let mut state = self.lock();
        state.issued += 1;
        Ticket(state.issued)
    }

    /// Store `value` if `ticket` is still the newest one issued.
    ///
    /// Returns `false`, dropping the value, when a newer ticket exists.
    pub fn publish(&self, ticket: Ticket, value: R) -> bool {
        let mut state = self.lock();
        if ticket.0 != state.issued {
            log::debug!(
                "discarding stale result #{} (newest #{})",
                ticket.0,
                state.issued
            );
            return false;
        }
        state.latest = Some(Arc::new(value));
        state.published = ticket.0;
        self.ready.notify_all();
        true
    }

    pub fn latest(&self) -> Option<Arc<R>> {
        self.lock().latest.clone()
    }

    /// Block until a result for `ticket` or a newer one is published.
    ///
    /// Returns `None` on timeout.
    pub fn wait_for(&self, ticket: Ticket, timeout: Duration) -> Option<Arc<R>> {
        let guard = self.lock();
        let (state, _) = self
            .ready
            .wait_timeout_while(guard, timeout, |state| state.published < ticket.0)
            .unwrap_or_else(PoisonError::into_inner);
        if state.published >= ticket.0 {
            state.latest.clone()
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState<R>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// What the live worker publishes for each accepted request.
pub type LiveOutcome = Result<CompressReport, CompressError>;

/// Debounced, last-write-wins compression of one source.
pub struct LiveCompressor {
    slot: Arc<ResultSlot<LiveOutcome>>,
    debouncer: Debouncer<(Ticket, EncodeRequest)>,
    // Held across ticket issue and submit so channel order matches ticket order.
    submit_order: Mutex<()>,
}

impl LiveCompressor {
    pub fn start<B>(backend: Arc<B>, source: Arc<SourceImage>, window: Duration) -> Self
    where
        B: EncodeBackend + Send + 'static,
    {
        Self::start_with_listener(backend, source, window, |_, _| {})
    }

    /// Like [`start`](Self::start), also calling `listener` for every
    /// accepted result, on the worker thread.
    pub fn start_with_listener<B, L>(
        backend: Arc<B>,
        source: Arc<SourceImage>,
        window: Duration,
        listener: L,
    ) -> Self
    where
        B: EncodeBackend + Send + 'static,
        L: Fn(Ticket, &LiveOutcome) + Send + 'static,
    {
        let slot = Arc::new(ResultSlot::new());
        let worker_slot = Arc::clone(&slot);
        let debouncer = Debouncer::spawn(window, move |(ticket, request): (Ticket, EncodeRequest)| {
            let outcome = compress(backend.as_ref(), &source, request);
            match &outcome {
                Ok(report) => log::debug!(
                    "live #{}: {} at {}",
                    ticket.value(),
                    report.size_label(),
                    report.quality_used()
                ),
                Err(e @ CompressError::Encode(_)) => log::error!("live #{}: {e}", ticket.value()),
                Err(e) => log::warn!("live #{}: {e}", ticket.value()),
            }
            // Only this thread publishes, so `latest` is the value just stored.
            if worker_slot.publish(ticket, outcome) {
                if let Some(latest) = worker_slot.latest() {
                    listener(ticket, &latest);
                }
            }
        });
        Self {
            slot,
            debouncer,
            submit_order: Mutex::new(()),
        }
    }

    /// Schedule a recompression with new settings.
    ///
    /// Safe to call from several threads: the request queued last always
    /// carries the newest ticket. After [`WorkerStopped`] no further results
    /// are published.
    pub fn update(&self, request: EncodeRequest) -> Result<Ticket, WorkerStopped> {
        let _order = self
            .submit_order
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let ticket = self.slot.next_ticket();
        self.debouncer.submit((ticket, request))?;
        Ok(ticket)
    }

    pub fn latest(&self) -> Option<Arc<LiveOutcome>> {
        self.slot.latest()
    }

    pub fn wait_for(&self, ticket: Ticket, timeout: Duration) -> Option<Arc<LiveOutcome>> {
        self.slot.wait_for(ticket, timeout)
    }

    /// Flush the pending request, stop the worker, and return the newest
    /// result.
    pub fn finish(self) -> Option<Arc<LiveOutcome>> {
        let Self { slot, debouncer, .. } = self;
        drop(debouncer);
        slot.latest()
    }
}

/// One settings change typed into the `live` command.
///
/// ```text
/// quality 60
/// quality high
/// target 150KB
/// format webp
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveCommand {
    Quality(Quality),
    Target(u64),
    Format(Format),
}

impl LiveCommand {
    /// The request that results from applying this change to `current`.
    pub fn apply(self, current: EncodeRequest) -> EncodeRequest {
        match self {
            LiveCommand::Quality(quality) => EncodeRequest {
                mode: QualityMode::Percentage(quality),
                ..current
            },
            LiveCommand::Target(bytes) => EncodeRequest {
                mode: QualityMode::TargetBytes(bytes),
                ..current
            },
            LiveCommand::Format(format) => EncodeRequest { format, ..current },
        }
    }
}

impl FromStr for LiveCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!(
                "expected '<quality|target|format> <value>', got '{}'",
                s.trim()
            ));
        };
        match key.to_ascii_lowercase().as_str() {
            "quality" | "q" => value
                .parse()
                .map(LiveCommand::Quality)
                .map_err(|e: ParseQualityError| e.to_string()),
            "target" | "t" => parse_byte_size(value)
                .map(LiveCommand::Target)
                .map_err(|e| e.to_string()),
            "format" | "f" => value
                .parse()
                .map(LiveCommand::Format)
                .map_err(|e: ParseFormatError| e.to_string()),
            other => Err(format!("unknown setting '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, mock_source};

    const WAIT: Duration = Duration::from_secs(5);

    // =========================================================================
    // Debouncer
    // =========================================================================

    fn recording_debouncer(window: Duration) -> (Debouncer<u32>, Arc<Mutex<Vec<u32>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let debouncer = Debouncer::spawn(window, move |v| sink.lock().unwrap().push(v));
        (debouncer, seen)
    }

    #[test]
    fn burst_is_coalesced_to_last_value() {
        let (debouncer, seen) = recording_debouncer(Duration::from_millis(200));
        for v in 1..=5 {
            debouncer.submit(v).unwrap();
        }
        drop(debouncer);

        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[test]
    fn separate_bursts_each_fire() {
        let (debouncer, seen) = recording_debouncer(Duration::from_millis(20));
        debouncer.submit(1).unwrap();
        thread::sleep(Duration::from_millis(300));
        debouncer.submit(2).unwrap();
        debouncer.submit(3).unwrap();
        drop(debouncer);

        assert_eq!(*seen.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn idle_debouncer_never_fires() {
        let (debouncer, seen) = recording_debouncer(Duration::from_millis(5));
        drop(debouncer);
        assert!(seen.lock().unwrap().is_empty());
    }

    // =========================================================================
    // ResultSlot
    // =========================================================================

    #[test]
    fn stale_publish_is_rejected() {
        let slot = ResultSlot::new();
        let first = slot.next_ticket();
        let second = slot.next_ticket();

        assert!(slot.publish(second, "fresh"));
        assert!(!slot.publish(first, "stale"));
        assert_eq!(slot.latest().as_deref(), Some(&"fresh"));
    }

    #[test]
    fn older_ticket_rejected_even_before_newer_result() {
        let slot = ResultSlot::new();
        let first = slot.next_ticket();
        let _second = slot.next_ticket();

        assert!(!slot.publish(first, 1));
        assert!(slot.latest().is_none());
    }

    #[test]
    fn tickets_increase() {
        let slot = ResultSlot::<()>::new();
        let a = slot.next_ticket();
        let b = slot.next_ticket();
        assert!(b > a);
    }

    #[test]
    fn wait_times_out_without_result() {
        let slot = ResultSlot::<u8>::new();
        let ticket = slot.next_ticket();
        assert!(slot.wait_for(ticket, Duration::from_millis(10)).is_none());
    }

    #[test]
    fn wait_wakes_on_publish_from_another_thread() {
        let slot = Arc::new(ResultSlot::new());
        let ticket = slot.next_ticket();
        let publisher = Arc::clone(&slot);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            publisher.publish(ticket, 42)
        });

        assert_eq!(slot.wait_for(ticket, WAIT).as_deref(), Some(&42));
        assert!(handle.join().unwrap());
    }

    // =========================================================================
    // LiveCompressor
    // =========================================================================

    #[test]
    fn live_publishes_result_for_latest_request() {
        let backend = Arc::new(MockBackend::linear(20));
        let source = Arc::new(mock_source(&backend, 5000));
        let live = LiveCompressor::start(Arc::clone(&backend), source, Duration::from_millis(30));

        live.update(EncodeRequest::quality(Format::Jpeg, Quality::new(10)))
            .unwrap();
        let last = live
            .update(EncodeRequest::target_bytes(Format::Jpeg, 1000))
            .unwrap();

        let outcome = live.wait_for(last, WAIT).unwrap();
        let Ok(report) = &*outcome else {
            panic!("expected a report, got {outcome:?}");
        };
        assert_eq!(report.quality_used().value(), 50);
        // The quality-10 request was coalesced away.
        assert!(!backend.encode_qualities().contains(&10));
    }

    #[test]
    fn live_publishes_errors_too() {
        let backend = Arc::new(MockBackend::linear(20));
        let source = Arc::new(mock_source(&backend, 5000));
        let live = LiveCompressor::start(backend, source, Duration::from_millis(1));

        let ticket = live
            .update(EncodeRequest::target_bytes(Format::Webp, 15))
            .unwrap();
        let outcome = live.wait_for(ticket, WAIT).unwrap();
        assert!(matches!(
            &*outcome,
            Err(CompressError::BudgetUnreachable { .. })
        ));
    }

    #[test]
    fn concurrent_updates_resolve_the_newest_ticket() {
        let backend = Arc::new(MockBackend::linear(20));
        let source = Arc::new(mock_source(&backend, 5000));
        let live = LiveCompressor::start(backend, source, Duration::from_millis(1));

        let newest = thread::scope(|scope| {
            let handles: Vec<_> = (0..8u32)
                .map(|t| {
                    let live = &live;
                    scope.spawn(move || {
                        (0..25u32)
                            .map(|i| {
                                let quality = Quality::new(1 + (t * 25 + i) % 100);
                                live.update(EncodeRequest::quality(Format::Jpeg, quality))
                                    .unwrap()
                            })
                            .max()
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().unwrap())
                .max()
                .unwrap()
        });

        assert_eq!(newest.value(), 200);
        let outcome = live.wait_for(newest, WAIT).unwrap();
        assert!(outcome.is_ok());
    }

    #[test]
    fn finish_flushes_pending_request() {
        let backend = Arc::new(MockBackend::linear(20));
        let source = Arc::new(mock_source(&backend, 5000));
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let live = LiveCompressor::start_with_listener(
            backend,
            source,
            Duration::from_secs(60),
            move |ticket, _| sink.lock().unwrap().push(ticket.value()),
        );

        live.update(EncodeRequest::quality(Format::Jpeg, Quality::new(30)))
            .unwrap();
        let latest = live.finish().unwrap();
        let Ok(report) = &*latest else {
            panic!("expected a report, got {latest:?}");
        };

        assert_eq!(report.result.size_bytes(), 600);
        assert_eq!(*calls.lock().unwrap(), vec![1]);
    }

    // =========================================================================
    // LiveCommand
    // =========================================================================

    #[test]
    fn parse_live_commands() {
        assert_eq!(
            "quality 150".parse::<LiveCommand>(),
            Ok(LiveCommand::Quality(Quality::MAX))
        );
        assert_eq!(
            "target 2KB".parse::<LiveCommand>(),
            Ok(LiveCommand::Target(2048))
        );
        assert_eq!(
            "  FORMAT   webp ".parse::<LiveCommand>(),
            Ok(LiveCommand::Format(Format::Webp))
        );
        assert_eq!(
            "q good".parse::<LiveCommand>(),
            Ok(LiveCommand::Quality(Quality::new(85)))
        );
        assert!("quality".parse::<LiveCommand>().is_err());
        assert!("quality ten".parse::<LiveCommand>().is_err());
        assert!("speed 3".parse::<LiveCommand>().is_err());
        assert!("format gif".parse::<LiveCommand>().is_err());
    }

    #[test]
    fn live_command_changes_one_setting() {
        let start = EncodeRequest::quality(Format::Jpeg, Quality::new(75));

        let target = LiveCommand::Target(5000).apply(start);
        assert_eq!(target.format, Format::Jpeg);
        assert_eq!(target.mode, QualityMode::TargetBytes(5000));

        let webp = LiveCommand::Format(Format::Webp).apply(target);
        assert_eq!(webp.mode, QualityMode::TargetBytes(5000));
        assert_eq!(webp.format, Format::Webp);
    }
}
