//! # Bus Client
//!
//! This module connects the controller to the bus server over ZMQ.
//!
//! Requests (`GET`, `SET`, `PUB`) are sent as multipart messages on a REQ socket and answered with
//! `OK`, `VAL payload`, `NIL` or `ERR message`. Published messages arrive on a SUB socket as
//! `[key, payload]` pairs.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashSet;

use comms_if::{
    bus::{
        frame::{Reply, Request},
        Bus,
        BusError
    },
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions}
};
use log::trace;
use serde::Deserialize;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Bus connection parameters
#[derive(Debug, Clone, Deserialize)]
pub struct BusParams {
    /// Endpoint of the server's request socket
    pub req_endpoint: String,

    /// Endpoint of the server's publish socket
    pub sub_endpoint: String,

    /// Units: milliseconds
    pub send_timeout_ms: i32,

    /// Units: milliseconds
    pub recv_timeout_ms: i32
}

pub struct BusClient {
    req_socket: MonitoredSocket,

    sub_socket: MonitoredSocket,

    subscriptions: HashSet<String>
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum BusClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Invalid bus parameter: {0}")]
    InvalidParam(String)
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl BusParams {
    pub fn validate(&self) -> Result<(), BusClientError> {
        if self.send_timeout_ms <= 0 || self.recv_timeout_ms <= 0 {
            return Err(BusClientError::InvalidParam(format!(
                "bus timeouts must be positive, found send {} ms, receive {} ms",
                self.send_timeout_ms, self.recv_timeout_ms
            )))
        }

        Ok(())
    }
}

impl BusClient {
    /// Create a new instance of the bus client.
    ///
    /// Blocks until the request socket is connected to the server.
    pub fn new(ctx: &zmq::Context, params: &BusParams) -> Result<Self, BusClientError> {
        params.validate()?;

        // Create the socket options
        let req_socket_options = SocketOptions::bounded_client(
            params.send_timeout_ms,
            params.recv_timeout_ms
        );
        let sub_socket_options = SocketOptions {
            block_on_first_connect: false,
            ..SocketOptions::bounded_client(params.send_timeout_ms, params.recv_timeout_ms)
        };

        // Create the sockets
        let req_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            req_socket_options,
            &params.req_endpoint
        ).map_err(BusClientError::SocketError)?;
        let sub_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            sub_socket_options,
            &params.sub_endpoint
        ).map_err(BusClientError::SocketError)?;

        Ok(Self {
            req_socket,
            sub_socket,
            subscriptions: HashSet::new()
        })
    }

    /// Send a request and wait for the reply.
    fn request(&mut self, request: Request) -> Result<Reply, BusError> {
        // If not connected return now
        if !self.req_socket.connected() {
            return Err(BusError::NotConnected)
        }

        self.req_socket.send_multipart(request.into_frames(), 0)
            .map_err(|e| zmq_error(e, BusError::SendError))?;

        let frames = self.req_socket.recv_multipart(0)
            .map_err(|e| zmq_error(e, BusError::RecvError))?;

        Reply::from_frames(frames)
    }
}

impl Bus for BusClient {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>, BusError> {
        let reply = self.request(Request::Get(key.into()))?;
        value_reply(reply)
    }

    fn set(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let reply = self.request(Request::Set(key.into(), payload.to_vec()))?;
        ack_reply(reply)
    }

    fn publish(&mut self, key: &str, payload: &[u8]) -> Result<(), BusError> {
        let reply = self.request(Request::Publish(key.into(), payload.to_vec()))?;
        ack_reply(reply)
    }

    fn subscribe(&mut self, key: &str) -> Result<(), BusError> {
        self.sub_socket.set_subscribe(key.as_bytes())
            .map_err(|e| BusError::SendError(e.to_string()))?;
        self.subscriptions.insert(key.to_string());

        Ok(())
    }

    fn poll_subscribed(&mut self) -> Result<Vec<(String, Vec<u8>)>, BusError> {
        let mut msgs = Vec::new();

        loop {
            let mut frames = match self.sub_socket.recv_multipart(zmq::DONTWAIT) {
                Ok(f) => f,
                Err(zmq::Error::EAGAIN) => break,
                Err(e) => return Err(BusError::RecvError(e.to_string()))
            };

            // Subscriptions match on prefix, only keep exact keys
            if frames.len() != 2 {
                trace!("Dropping published message with {} frames", frames.len());
                continue
            }
            let payload = frames.remove(1);
            let key = String::from_utf8_lossy(&frames[0]).into_owned();

            if self.subscriptions.contains(&key) {
                msgs.push((key, payload));
            }
        }

        Ok(msgs)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Map a zmq error onto a bus error, timeouts being reported as such.
fn zmq_error(e: zmq::Error, other: fn(String) -> BusError) -> BusError {
    match e {
        zmq::Error::EAGAIN => BusError::Timeout,
        e => other(e.to_string())
    }
}

fn value_reply(reply: Reply) -> Result<Option<Vec<u8>>, BusError> {
    match reply {
        Reply::Value(payload) => Ok(Some(payload)),
        Reply::Nil => Ok(None),
        Reply::Error(msg) => Err(BusError::ServerError(msg)),
        Reply::Ok => Err(BusError::MalformedReply("OK in reply to GET".into()))
    }
}

fn ack_reply(reply: Reply) -> Result<(), BusError> {
    match reply {
        Reply::Ok => Ok(()),
        Reply::Error(msg) => Err(BusError::ServerError(msg)),
        r => Err(BusError::MalformedReply(format!("{:?} in reply to a write", r)))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_replies() {
        assert_eq!(value_reply(Reply::Value(b"1".to_vec())).unwrap(), Some(b"1".to_vec()));
        assert_eq!(value_reply(Reply::Nil).unwrap(), None);
        assert!(matches!(value_reply(Reply::Ok), Err(BusError::MalformedReply(_))));
        assert!(matches!(
            value_reply(Reply::Error("busy".into())),
            Err(BusError::ServerError(_))
        ));

        assert!(ack_reply(Reply::Ok).is_ok());
        assert!(ack_reply(Reply::Nil).is_err());
        assert!(ack_reply(Reply::Value(vec![])).is_err());
    }

    #[test]
    fn test_zmq_errors() {
        assert!(matches!(zmq_error(zmq::Error::EAGAIN, BusError::RecvError), BusError::Timeout));
        assert!(matches!(
            zmq_error(zmq::Error::ETERM, BusError::SendError),
            BusError::SendError(_)
        ));
    }

    #[test]
    fn test_params() {
        let params = BusParams {
            req_endpoint: "tcp://localhost:5030".into(),
            sub_endpoint: "tcp://localhost:5031".into(),
            send_timeout_ms: 20,
            recv_timeout_ms: 0
        };
        assert!(params.validate().is_err());
    }
}
