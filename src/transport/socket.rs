//! ZeroMQ PUSH/PULL endpoints.
//!
//! A PUSH socket hands each message to one connected PULL peer, which is the
//! work-queue behaviour both pipeline channels need. All sockets of one
//! pipeline run are created from the same [`TransportFactory`] so that
//! `inproc://` endpoints resolve against a shared context.

use std::time::Duration;

use crate::processing::stop::StopSignal;
use crate::transport::{
    MessageReceiver, MessageSender, SendOutcome, TransportError, TransportResult,
};

fn millis_i32(duration: Duration) -> i32 {
    i32::try_from(duration.as_millis()).unwrap_or(i32::MAX)
}

fn millis_i64(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

/// Builds ready-to-use channel endpoints.
///
/// `send_timeout` bounds every individual send attempt so a blocked sender
/// gets to re-check the stop signal. `linger` bounds how long a closed sender
/// keeps delivering messages still queued towards its peers.
pub struct TransportFactory {
    context: zmq::Context,
    send_timeout: Duration,
    linger: Duration,
}

impl TransportFactory {
    pub fn new(send_timeout: Duration, linger: Duration) -> Self {
        Self {
            context: zmq::Context::new(),
            send_timeout,
            linger,
        }
    }

    fn sender_socket(&self) -> TransportResult<zmq::Socket> {
        let socket = self
            .context
            .socket(zmq::PUSH)
            .map_err(TransportError::Socket)?;
        socket
            .set_sndtimeo(millis_i32(self.send_timeout))
            .map_err(TransportError::Socket)?;
        socket
            .set_linger(millis_i32(self.linger))
            .map_err(TransportError::Socket)?;
        Ok(socket)
    }

    fn receiver_socket(&self) -> TransportResult<zmq::Socket> {
        let socket = self
            .context
            .socket(zmq::PULL)
            .map_err(TransportError::Socket)?;
        socket.set_linger(0).map_err(TransportError::Socket)?;
        Ok(socket)
    }

    /// Creates the owning producer side of a channel.
    pub fn bind_sender(&self, endpoint: &str) -> TransportResult<ZmqSender> {
        let socket = self.sender_socket()?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        log::info!("PUSH socket bound to {endpoint}");
        Ok(ZmqSender { socket })
    }

    /// Attaches an additional producer to a channel bound elsewhere.
    pub fn connect_sender(&self, endpoint: &str) -> TransportResult<ZmqSender> {
        let socket = self.sender_socket()?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        Ok(ZmqSender { socket })
    }

    /// Creates the owning consumer side of a channel.
    pub fn bind_receiver(&self, endpoint: &str) -> TransportResult<ZmqReceiver> {
        let socket = self.receiver_socket()?;
        socket.bind(endpoint).map_err(|source| TransportError::Bind {
            endpoint: endpoint.to_string(),
            source,
        })?;
        log::info!("PULL socket bound to {endpoint}");
        Ok(ZmqReceiver { socket })
    }

    /// Attaches an additional consumer to a channel bound elsewhere.
    pub fn connect_receiver(&self, endpoint: &str) -> TransportResult<ZmqReceiver> {
        let socket = self.receiver_socket()?;
        socket
            .connect(endpoint)
            .map_err(|source| TransportError::Connect {
                endpoint: endpoint.to_string(),
                source,
            })?;
        Ok(ZmqReceiver { socket })
    }
}

/// PUSH side of a channel.
pub struct ZmqSender {
    socket: zmq::Socket,
}

impl MessageSender for ZmqSender {
    fn send(&self, message: &[u8], stop: &StopSignal) -> TransportResult<SendOutcome> {
        loop {
            match self.socket.send(message, 0) {
                Ok(()) => return Ok(SendOutcome::Sent),
                // Send timeout expired or the call was interrupted.
                Err(zmq::Error::EAGAIN) | Err(zmq::Error::EINTR) => {
                    if stop.is_set() {
                        return Ok(SendOutcome::Cancelled);
                    }
                }
                Err(e) => return Err(TransportError::Send(e)),
            }
        }
    }
}

/// PULL side of a channel.
pub struct ZmqReceiver {
    socket: zmq::Socket,
}

impl MessageReceiver for ZmqReceiver {
    fn try_receive(&self, timeout: Duration) -> TransportResult<Option<Vec<u8>>> {
        match self.socket.poll(zmq::POLLIN, millis_i64(timeout)) {
            Ok(0) | Err(zmq::Error::EINTR) => Ok(None),
            Ok(_) => match self.socket.recv_bytes(zmq::DONTWAIT) {
                Ok(message) => Ok(Some(message)),
                Err(zmq::Error::EAGAIN) => Ok(None),
                Err(e) => Err(TransportError::Receive(e)),
            },
            Err(e) => Err(TransportError::Receive(e)),
        }
    }
}
