//! Shared helpers for the networked end-to-end tests: spin up a real
//! `bourse` server on an ephemeral port and speak the wire protocol as a
//! plain `TcpStream` client, exactly as the teacher's own test style drives
//! its in-process engine directly.

#![allow(dead_code)]

use bourse::config::BourseConfig;
use bourse::proto::{Header, MessageType};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub fn start() -> Self {
        let config = BourseConfig {
            port: 0,
            ..BourseConfig::default()
        };
        let listener = bourse::server::bind(&config).expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let handle = std::thread::spawn(move || {
            bourse::server::serve(listener, &config, shutdown_clone).expect("server run");
        });
        Self {
            addr,
            shutdown,
            handle: Some(handle),
        }
    }

    pub fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).expect("connect to test server");
        stream
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        stream
    }

    /// Requests the C3/C4/C2/C1 shutdown sequence and waits for the
    /// server thread to finish draining, mirroring scenario 6 in spec §8.
    pub fn shutdown_and_join(mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.join().expect("server thread panicked");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn send(stream: &mut TcpStream, msg_type: MessageType, payload: &[u8]) {
    let header = Header::now(msg_type, payload.len() as u16);
    header.write_to(stream).expect("write header");
    if !payload.is_empty() {
        stream.write_all(payload).expect("write payload");
    }
}

pub fn recv(stream: &mut TcpStream) -> (MessageType, Vec<u8>) {
    let header = Header::read_from(stream).expect("read header");
    let mut payload = vec![0u8; header.payload_size as usize];
    if !payload.is_empty() {
        stream.read_exact(&mut payload).expect("read payload");
    }
    (header.msg_type, payload)
}

/// Reads frames until one of `want`'s type is seen, discarding any
/// interleaved broadcast the test doesn't care about. POSTED's ordering
/// relative to its own ACK is explicitly unspecified by the design (§9), so
/// callers that only care about one of the two use this instead of
/// asserting a fixed sequence.
pub fn expect(stream: &mut TcpStream, want: MessageType) -> Vec<u8> {
    for _ in 0..16 {
        let (mt, payload) = recv(stream);
        if mt == want {
            return payload;
        }
    }
    panic!("did not see {want:?} within 16 frames");
}

pub fn login(stream: &mut TcpStream, name: &str) {
    send(stream, MessageType::Login, name.as_bytes());
    let (mt, payload) = recv(stream);
    assert_eq!(mt, MessageType::Ack);
    assert!(payload.is_empty());
}

pub fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes(buf[offset..offset + 4].try_into().unwrap())
}
