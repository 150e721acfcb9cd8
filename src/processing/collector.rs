use std::io::Write;
use std::time::{Duration, Instant};

use crate::processing::stop::StopSignal;
use crate::transport::MessageReceiver;

/// Tracks how long the collector has gone without receiving a result.
#[derive(Debug)]
pub struct IdleMonitor {
    threshold: Duration,
    last_activity: Instant,
}

impl IdleMonitor {
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last_activity: now,
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last_activity) >= self.threshold
    }
}

/// Counts results over a fixed reporting window.
#[derive(Debug)]
pub struct ThroughputMeter {
    window: Duration,
    window_start: Instant,
    count: u64,
}

impl ThroughputMeter {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            window,
            window_start: now,
            count: 0,
        }
    }

    pub fn record(&mut self) {
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the rate in results per second once the window has elapsed,
    /// then starts a new window at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<f64> {
        if now.saturating_duration_since(self.window_start) < self.window {
            return None;
        }
        let speed = self.count as f64 / self.window.as_secs_f64();
        self.count = 0;
        self.window_start = now;
        Some(speed)
    }
}

/// Timing knobs for the collector loop.
#[derive(Debug, Clone, Copy)]
pub struct CollectorTimings {
    pub poll_interval: Duration,
    pub idle_threshold: Duration,
    pub report_window: Duration,
    pub drain_grace: Duration,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectorStats {
    pub written: u64,
    pub write_failures: u64,
    /// Whether this collector set the stop signal after the idle threshold.
    pub stopped_on_idle: bool,
}

/// Writes results to the output and decides when the pipeline is done.
pub struct Collector<R, W> {
    results: R,
    output: W,
    stop: StopSignal,
    timings: CollectorTimings,
}

impl<R, W> Collector<R, W>
where
    R: MessageReceiver,
    W: Write,
{
    pub fn new(results: R, output: W, stop: StopSignal, timings: CollectorTimings) -> Self {
        Self {
            results,
            output,
            stop,
            timings,
        }
    }

    /// Runs until the stop signal is set and in-flight results have drained.
    ///
    /// The collector sets the stop signal itself once no result has arrived
    /// for the idle threshold. The output is flushed before returning.
    pub fn run(mut self) -> CollectorStats {
        let mut stats = CollectorStats::default();
        let started = Instant::now();
        let mut idle = IdleMonitor::new(self.timings.idle_threshold, started);
        let mut throughput = ThroughputMeter::new(self.timings.report_window, started);
        let mut drain_deadline: Option<Instant> = None;

        loop {
            let received = match self.results.try_receive(self.timings.poll_interval) {
                Ok(received) => received,
                Err(e) => {
                    log::error!("Collector failed to receive result: {e}");
                    if self.stop.set() {
                        log::info!("Set stop signal after results channel failure");
                    }
                    break;
                }
            };
            let now = Instant::now();

            match received {
                Some(line) => {
                    if let Err(e) = self.write_line(&line) {
                        stats.write_failures += 1;
                        log::error!("Failed to write result: {e}");
                        if self.stop.set() {
                            log::info!("Set stop signal after output failure");
                        }
                        break;
                    }
                    stats.written += 1;
                    throughput.record();
                    idle.touch(now);
                    if drain_deadline.is_some() {
                        drain_deadline = Some(now + self.timings.drain_grace);
                    }
                }
                None => {
                    if let Some(deadline) = drain_deadline
                        && now >= deadline
                    {
                        break;
                    }
                    if idle.is_idle(now) && self.stop.set() {
                        stats.stopped_on_idle = true;
                        log::info!(
                            "No results for {:?}, set stop signal",
                            self.timings.idle_threshold
                        );
                    }
                }
            }

            if let Some(speed) = throughput.poll(now) {
                log::info!("[check speed] {speed:.2} results/s");
                if let Err(e) = self.output.flush() {
                    log::error!("Failed to flush output: {e}");
                }
            }

            if drain_deadline.is_none() && self.stop.is_set() {
                drain_deadline = Some(now + self.timings.drain_grace);
            }
        }

        if let Err(e) = self.output.flush() {
            log::error!("Failed to flush output: {e}");
        }
        log::info!("Collector stop: written={}", stats.written);
        stats
    }

    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.output.write_all(line)?;
        self.output.write_all(b"\n")
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use super::{Collector, CollectorStats, CollectorTimings, IdleMonitor, ThroughputMeter};
    use crate::processing::stop::StopSignal;
    use crate::transport::{MessageReceiver, TransportError, TransportResult};

    #[test]
    fn idle_after_threshold_without_activity() {
        let start = Instant::now();
        let idle = IdleMonitor::new(Duration::from_secs(20), start);

        assert!(!idle.is_idle(start + Duration::from_secs(19)));
        assert!(idle.is_idle(start + Duration::from_secs(20)));
    }

    #[test]
    fn activity_postpones_idle() {
        let start = Instant::now();
        let mut idle = IdleMonitor::new(Duration::from_secs(20), start);

        idle.touch(start + Duration::from_secs(15));

        assert!(!idle.is_idle(start + Duration::from_secs(30)));
        assert!(idle.is_idle(start + Duration::from_secs(35)));
    }

    #[test]
    fn throughput_reports_rate_and_resets() {
        let start = Instant::now();
        let mut meter = ThroughputMeter::new(Duration::from_secs(60), start);

        for i in 0..120 {
            meter.record();
            assert!(meter.poll(start + Duration::from_millis(i * 500)).is_none());
        }
        let speed = meter
            .poll(start + Duration::from_secs(60))
            .expect("window elapsed");

        assert!((speed - 2.0).abs() < 1e-9);
        assert_eq!(meter.count(), 0);
        assert!(meter.poll(start + Duration::from_secs(61)).is_none());
    }

    /// Replays scripted receive results; an exhausted script reads as silence.
    struct ScriptedResults {
        script: Mutex<VecDeque<TransportResult<Option<Vec<u8>>>>>,
    }

    impl ScriptedResults {
        fn new(script: Vec<TransportResult<Option<Vec<u8>>>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
            }
        }
    }

    impl MessageReceiver for ScriptedResults {
        fn try_receive(&self, timeout: Duration) -> TransportResult<Option<Vec<u8>>> {
            let next = self.script.lock().expect("script mutex poisoned").pop_front();
            match next {
                Some(step) => step,
                None => {
                    std::thread::sleep(timeout);
                    Ok(None)
                }
            }
        }
    }

    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn timings() -> CollectorTimings {
        CollectorTimings {
            poll_interval: Duration::from_millis(5),
            idle_threshold: Duration::from_millis(50),
            report_window: Duration::from_secs(60),
            drain_grace: Duration::from_millis(20),
        }
    }

    #[test]
    fn writes_results_and_stops_when_idle() {
        let results = ScriptedResults::new(vec![
            Ok(Some(b"one\t0.500000".to_vec())),
            Ok(None),
            Ok(Some(b"two\t1.000000".to_vec())),
        ]);
        let stop = StopSignal::new();
        let mut output = Vec::new();

        let started = Instant::now();
        let stats = Collector::new(results, &mut output, stop.clone(), timings()).run();

        assert_eq!(
            stats,
            CollectorStats {
                written: 2,
                write_failures: 0,
                stopped_on_idle: true,
            }
        );
        assert_eq!(output, b"one\t0.500000\ntwo\t1.000000\n".to_vec());
        assert!(stop.is_set());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn empty_results_stop_via_idle_timeout() {
        let stop = StopSignal::new();
        let mut output = Vec::new();

        let results = ScriptedResults::new(vec![]);
        let stats = Collector::new(results, &mut output, stop.clone(), timings()).run();

        assert_eq!(stats.written, 0);
        assert!(stats.stopped_on_idle);
        assert!(output.is_empty());
        assert!(stop.is_set());
    }

    #[test]
    fn idle_while_already_stopped_drains_without_second_transition() {
        let stop = StopSignal::new();
        stop.set();
        let timings = CollectorTimings {
            idle_threshold: Duration::from_millis(10),
            drain_grace: Duration::from_millis(60),
            ..timings()
        };
        let mut output = Vec::new();

        let started = Instant::now();
        let results = ScriptedResults::new(vec![]);
        let stats = Collector::new(results, &mut output, stop.clone(), timings).run();

        assert_eq!(stats, CollectorStats::default());
        assert!(output.is_empty());
        assert!(stop.is_set());
        assert!(started.elapsed() >= timings.drain_grace);
    }

    #[test]
    fn drains_results_arriving_after_stop() {
        let stop = StopSignal::new();
        stop.set();
        let results = ScriptedResults::new(vec![
            Ok(None),
            Ok(Some(b"late".to_vec())),
            Ok(Some(b"later".to_vec())),
        ]);
        let mut output = Vec::new();

        let stats = Collector::new(results, &mut output, stop, timings()).run();

        assert_eq!(stats.written, 2);
        assert!(!stats.stopped_on_idle);
        assert_eq!(output, b"late\nlater\n".to_vec());
    }

    #[test]
    fn receive_failure_ends_collection() {
        let stop = StopSignal::new();
        let results = ScriptedResults::new(vec![
            Ok(Some(b"kept".to_vec())),
            Err(TransportError::Receive(zmq::Error::ETERM)),
            Ok(Some(b"never".to_vec())),
        ]);
        let mut output = Vec::new();

        let stats = Collector::new(results, &mut output, stop.clone(), timings()).run();

        assert_eq!(stats.written, 1);
        assert_eq!(output, b"kept\n".to_vec());
        assert!(stop.is_set());
    }

    #[test]
    fn write_failure_sets_stop_signal() {
        let stop = StopSignal::new();
        let results = ScriptedResults::new(vec![Ok(Some(b"line".to_vec()))]);

        let stats = Collector::new(results, FailingWriter, stop.clone(), timings()).run();

        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.written, 0);
        assert!(stop.is_set());
    }
}
