use std::io::BufRead;
use std::time::Duration;

use crate::processing::stop::StopSignal;
use crate::transport::{MessageSender, SendOutcome};

/// Streams input lines into the dispatch channel.
pub struct Reader<R, S> {
    input: R,
    dispatch: S,
    stop: StopSignal,
    poll_interval: Duration,
}

impl<R, S> Reader<R, S>
where
    R: BufRead,
    S: MessageSender,
{
    pub fn new(input: R, dispatch: S, stop: StopSignal, poll_interval: Duration) -> Self {
        Self {
            input,
            dispatch,
            stop,
            poll_interval,
        }
    }

    /// Sends every input line and returns how many were sent.
    ///
    /// Lines are forwarded byte for byte without their `\n` terminator. The
    /// input is released as soon as it is exhausted; the dispatch endpoint
    /// stays open until the stop signal so records still queued towards the
    /// workers are not discarded.
    pub fn run(self) -> u64 {
        let Self {
            input,
            dispatch,
            stop,
            poll_interval,
        } = self;

        let sent = stream_lines(input, &dispatch, &stop);
        log::info!("Reader finished input after {sent} records");

        // Dropping the dispatch socket now would let linger discard records
        // still queued towards workers, so it stays open until stop.
        while !stop.is_set() {
            std::thread::sleep(poll_interval);
        }
        log::info!("Reader stop");
        sent
    }
}

fn stream_lines<R, S>(mut input: R, dispatch: &S, stop: &StopSignal) -> u64
where
    R: BufRead,
    S: MessageSender,
{
    let mut sent = 0;
    let mut line = Vec::new();

    loop {
        if stop.is_set() {
            log::info!("Reader interrupted by stop signal");
            break;
        }

        line.clear();
        match input.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                log::error!("Failed to read input: {e}");
                break;
            }
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }

        match dispatch.send(&line, stop) {
            Ok(SendOutcome::Sent) => sent += 1,
            Ok(SendOutcome::Cancelled) => {
                log::info!("Reader interrupted by stop signal");
                break;
            }
            Err(e) => {
                log::error!("Reader failed to dispatch record: {e}");
                break;
            }
        }
    }

    sent
}
