use log_sender::core::shutdown;
use log_sender::core::{DelaySource, Emission, EmitterPhase, LogSink};
use log_sender::{Emitter, Ticker, UniformDelay};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Replays fixed delays, repeating the last one when exhausted.
struct ScriptedDelays {
    delays: VecDeque<Duration>,
    last: Duration,
}

impl ScriptedDelays {
    fn new(millis: &[u64]) -> Self {
        let delays: VecDeque<Duration> = millis.iter().copied().map(Duration::from_millis).collect();
        let last = delays.back().copied().unwrap_or(Duration::from_secs(1));
        Self { delays, last }
    }
}

impl DelaySource for ScriptedDelays {
    fn next_delay(&mut self) -> Duration {
        self.delays.pop_front().unwrap_or(self.last)
    }
}

/// Records every emission with the (paused) tokio time it arrived.
#[derive(Clone, Default)]
struct RecordingSink {
    entries: Arc<Mutex<Vec<(Instant, Emission)>>>,
}

impl RecordingSink {
    fn new() -> Self {
        Self::default()
    }

    fn timed(&self) -> Vec<(Instant, Emission)> {
        self.entries.lock().unwrap().clone()
    }

    fn emissions(&self) -> Vec<Emission> {
        self.timed().into_iter().map(|(_, emission)| emission).collect()
    }
}

impl LogSink for RecordingSink {
    fn emit(&self, emission: &Emission) {
        self.entries
            .lock()
            .unwrap()
            .push((Instant::now(), emission.clone()));
    }
}

fn offsets_ms(sink: &RecordingSink, origin: Instant) -> Vec<(u128, Emission)> {
    sink.timed()
        .into_iter()
        .map(|(at, emission)| (at.duration_since(origin).as_millis(), emission))
        .collect()
}

fn heartbeat_sequence(emission: &Emission) -> Option<u64> {
    match emission {
        Emission::Heartbeat { sequence, .. } => Some(*sequence),
        Emission::Farewell { .. } => None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_fixed_interval_end_to_end() {
    let sink = RecordingSink::new();
    let (handle, signal) = shutdown::channel();
    let origin = Instant::now();

    let mut emitter = Emitter::new(sink.clone());
    let task = tokio::spawn(async move {
        let outcome = emitter
            .run(Ticker::fixed(Duration::from_millis(3000)), signal)
            .await;
        (emitter, outcome)
    });

    tokio::time::sleep(Duration::from_millis(4000)).await;
    let shutdown_at = Instant::now();
    assert!(handle.request());

    let (emitter, outcome) = task.await.unwrap();
    let outcome = outcome.unwrap();

    assert_eq!(Instant::now().duration_since(shutdown_at), Duration::from_millis(200));
    assert_eq!(outcome.final_count, 2);
    assert_eq!(outcome.exit_code, 0);
    assert_eq!(emitter.state().phase, EmitterPhase::Terminated);

    let timeline = offsets_ms(&sink, origin);
    assert_eq!(timeline.len(), 3);
    assert_eq!(timeline[0].0, 0);
    assert_eq!(heartbeat_sequence(&timeline[0].1), Some(1));
    assert_eq!(timeline[1].0, 3000);
    assert_eq!(heartbeat_sequence(&timeline[1].1), Some(2));
    assert_eq!(timeline[2], (4000, Emission::Farewell { final_count: 2 }));
}

#[tokio::test(start_paused = true)]
async fn test_randomized_end_to_end_with_scripted_delay() {
    let sink = RecordingSink::new();
    let (handle, signal) = shutdown::channel();
    let origin = Instant::now();

    let mut emitter = Emitter::new(sink.clone());
    let task = tokio::spawn(async move {
        emitter
            .run(Ticker::randomized(ScriptedDelays::new(&[5000, 9000])), signal)
            .await
    });

    tokio::time::sleep(Duration::from_millis(6000)).await;
    handle.request();
    let outcome = task.await.unwrap().unwrap();

    let timeline = offsets_ms(&sink, origin);
    let heartbeats: Vec<(u128, Option<u64>)> = timeline
        .iter()
        .filter(|(_, emission)| heartbeat_sequence(emission).is_some())
        .map(|(at, emission)| (*at, heartbeat_sequence(emission)))
        .collect();

    assert_eq!(heartbeats, vec![(0, Some(1)), (5000, Some(2))]);
    assert_eq!(outcome.final_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_randomized_delays_stay_within_bounds() {
    let sink = RecordingSink::new();
    let mut emitter = Emitter::new(sink.clone());

    emitter
        .start(Ticker::randomized(UniformDelay::seeded(1_000, 30_000, 2024)))
        .unwrap();
    for _ in 0..200 {
        assert!(emitter.tick().await);
    }

    let times: Vec<Instant> = sink.timed().into_iter().map(|(at, _)| at).collect();
    assert_eq!(times.len(), 201);
    for pair in times.windows(2) {
        let gap = pair[1].duration_since(pair[0]);
        assert!(gap >= Duration::from_millis(1_000), "gap {:?} too short", gap);
        assert!(gap < Duration::from_millis(30_000), "gap {:?} too long", gap);
    }
    assert_eq!(emitter.state().sequence, 201);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_emission() {
    let sink = RecordingSink::new();
    let (handle, signal) = shutdown::channel();

    let mut emitter = Emitter::new(sink.clone());
    let task = tokio::spawn(async move {
        emitter
            .run(Ticker::randomized(ScriptedDelays::new(&[10_000])), signal)
            .await
    });

    tokio::time::sleep(Duration::from_millis(2000)).await;
    handle.request();
    let outcome = task.await.unwrap().unwrap();

    // Well past the cancelled 10s timer.
    tokio::time::sleep(Duration::from_secs(30)).await;

    let emissions = sink.emissions();
    assert_eq!(outcome.final_count, 1);
    assert_eq!(emissions.len(), 2);
    assert_eq!(emissions.last(), Some(&Emission::Farewell { final_count: 1 }));
    assert!(!emissions
        .iter()
        .any(|emission| heartbeat_sequence(emission) == Some(2)));
}

#[tokio::test(start_paused = true)]
async fn test_repeated_signals_emit_final_record_once() {
    let sink = RecordingSink::new();
    let (handle, signal) = shutdown::channel();

    let mut emitter = Emitter::new(sink.clone());
    let task = tokio::spawn(async move {
        emitter
            .run(Ticker::fixed(Duration::from_millis(1000)), signal)
            .await
    });

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(handle.request());
    assert!(!handle.request());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.request());
    task.await.unwrap().unwrap();

    let farewells = sink
        .emissions()
        .iter()
        .filter(|emission| matches!(emission, Emission::Farewell { .. }))
        .count();
    assert_eq!(farewells, 1);
}

#[tokio::test(start_paused = true)]
async fn test_independent_emitters_keep_separate_counters() {
    let fast_sink = RecordingSink::new();
    let slow_sink = RecordingSink::new();
    let (handle, signal) = shutdown::channel();

    let mut fast = Emitter::new(fast_sink.clone());
    let mut slow = Emitter::new(slow_sink.clone()).with_grace_period(Duration::ZERO);
    let fast_signal = signal.clone();
    let fast_task = tokio::spawn(async move {
        fast.run(Ticker::fixed(Duration::from_millis(1000)), fast_signal)
            .await
    });
    let slow_task = tokio::spawn(async move {
        slow.run(Ticker::fixed(Duration::from_millis(1500)), signal)
            .await
    });

    tokio::time::sleep(Duration::from_millis(3100)).await;
    handle.request();

    assert_eq!(fast_task.await.unwrap().unwrap().final_count, 4);
    assert_eq!(slow_task.await.unwrap().unwrap().final_count, 3);
    assert_eq!(fast_sink.emissions().len(), 5);
    assert_eq!(slow_sink.emissions().len(), 4);
}
