//! Minimal bus server for bench testing the controller without the rover's state store.
//!
//! Usage: `bus_server [REQ_ENDPOINT] [PUB_ENDPOINT]`, defaulting to `tcp://*:5030` and
//! `tcp://*:5031`.

use std::collections::HashMap;

use comms_if::{
    bus::frame::{Reply, Request},
    net::{MonitoredSocket, SocketOptions}
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    let req_endpoint = args.get(1).map(String::as_str).unwrap_or("tcp://*:5030");
    let pub_endpoint = args.get(2).map(String::as_str).unwrap_or("tcp://*:5031");

    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        bind: true,
        block_on_first_connect: false,
        ..Default::default()
    };

    // Create the sockets
    let rep_socket = MonitoredSocket::new(
        &ctx,
        zmq::REP,
        socket_options.clone(),
        req_endpoint
    )?;
    let pub_socket = MonitoredSocket::new(
        &ctx,
        zmq::PUB,
        socket_options,
        pub_endpoint
    )?;

    println!("Bus server running, requests on {}, publishing on {}", req_endpoint, pub_endpoint);

    let mut values: HashMap<String, Vec<u8>> = HashMap::new();

    // Respond to client requests
    loop {
        let frames = rep_socket.recv_multipart(0)?;

        let reply = match Request::from_frames(frames) {
            Ok(Request::Get(key)) => match values.get(&key) {
                Some(v) => Reply::Value(v.clone()),
                None => Reply::Nil
            },
            Ok(Request::Set(key, payload)) => {
                values.insert(key, payload);
                Reply::Ok
            },
            Ok(Request::Publish(key, payload)) => {
                match pub_socket.send_multipart(vec![key.into_bytes(), payload], 0) {
                    Ok(()) => Reply::Ok,
                    Err(e) => Reply::Error(format!("publish failed: {}", e))
                }
            },
            Err(e) => {
                println!("Bad request: {}", e);
                Reply::Error(e.to_string())
            }
        };

        rep_socket.send_multipart(reply.into_frames(), 0)?;
    }
}
