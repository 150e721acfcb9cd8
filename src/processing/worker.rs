use std::time::Duration;

use crate::domain::record::{ScoringRequest, format_result};
use crate::processing::stop::StopSignal;
use crate::scoring::Scorer;
use crate::transport::{MessageReceiver, MessageSender, SendOutcome};

/// Per-worker counters reported when the worker stops.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub decode_failures: u64,
    pub scoring_failures: u64,
}

/// Scores records pulled from the dispatch channel.
pub struct Worker<S, D, R> {
    id: usize,
    scorer: S,
    dispatch: D,
    results: R,
    stop: StopSignal,
    poll_interval: Duration,
}

impl<S, D, R> Worker<S, D, R>
where
    S: Scorer,
    D: MessageReceiver,
    R: MessageSender,
{
    pub fn new(
        id: usize,
        scorer: S,
        dispatch: D,
        results: R,
        stop: StopSignal,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id,
            scorer,
            dispatch,
            results,
            stop,
            poll_interval,
        }
    }

    /// Processes records one at a time until the stop signal is set.
    ///
    /// Undecodable records and scoring failures are logged and skipped. A
    /// transport failure ends the loop.
    pub fn run(mut self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        log::info!("Worker[{}] started", self.id);

        while !self.stop.is_set() {
            let record = match self.dispatch.try_receive(self.poll_interval) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    log::error!("Worker[{}] failed to receive record: {e}", self.id);
                    break;
                }
            };

            let Some(line) = self.score_record(&record, &mut stats) else {
                continue;
            };

            match self.results.send(&line, &self.stop) {
                Ok(SendOutcome::Sent) => stats.processed += 1,
                Ok(SendOutcome::Cancelled) => {
                    log::warn!("Worker[{}] dropped a result on shutdown", self.id);
                    break;
                }
                Err(e) => {
                    log::error!("Worker[{}] failed to send result: {e}", self.id);
                    break;
                }
            }
        }

        log::info!(
            "Worker[{}] stop: processed={}, decode_failures={}, scoring_failures={}",
            self.id,
            stats.processed,
            stats.decode_failures,
            stats.scoring_failures
        );
        stats
    }

    fn score_record(&mut self, record: &[u8], stats: &mut WorkerStats) -> Option<Vec<u8>> {
        let request = match ScoringRequest::decode(record) {
            Ok(request) => request,
            Err(e) => {
                stats.decode_failures += 1;
                log::warn!(
                    "Worker[{}] skipped malformed record {:?}: {e}",
                    self.id,
                    String::from_utf8_lossy(record)
                );
                return None;
            }
        };

        match self.scorer.score(&request.query, &request.title) {
            Ok(score) => Some(format_result(record, score)),
            Err(e) => {
                stats.scoring_failures += 1;
                log::error!(
                    "Worker[{}] failed to score query {:?} / title {:?}: {e}",
                    self.id,
                    request.query,
                    request.title
                );
                None
            }
        }
    }
}
