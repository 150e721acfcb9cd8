//! Work-distribution channels connecting the pipeline stages.
//!
//! Both the dispatch channel (reader to workers) and the results channel
//! (workers to collector) deliver every message to exactly one receiver.
//! Components only depend on [`MessageSender`] and [`MessageReceiver`]; the
//! ZeroMQ-backed endpoints live in [`socket`].

use std::time::Duration;

use thiserror::Error;

use crate::processing::stop::StopSignal;

pub mod socket;

pub use socket::{TransportFactory, ZmqReceiver, ZmqSender};

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to create socket: {0}")]
    Socket(#[source] zmq::Error),
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },
    #[error("failed to connect {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: zmq::Error,
    },
    #[error("send failed: {0}")]
    Send(#[source] zmq::Error),
    #[error("receive failed: {0}")]
    Receive(#[source] zmq::Error),
}

pub type TransportResult<T> = Result<T, TransportError>;

/// Result of a send that may be abandoned on shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    /// The stop signal was set while no receiver could accept the message.
    Cancelled,
}

/// Producer side of a channel.
pub trait MessageSender {
    /// Hands `message` to exactly one receiver.
    ///
    /// Blocks while no receiver can accept the message. Once `stop` is set
    /// the send gives up after at most one more bounded attempt.
    fn send(&self, message: &[u8], stop: &StopSignal) -> TransportResult<SendOutcome>;
}

/// Consumer side of a channel.
pub trait MessageReceiver {
    /// Waits up to `timeout` for a message. `Ok(None)` means nothing arrived.
    fn try_receive(&self, timeout: Duration) -> TransportResult<Option<Vec<u8>>>;
}
