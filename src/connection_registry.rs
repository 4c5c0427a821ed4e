//! Connection registry (C3)
//!
//! Tracks every currently-accepted socket so a shutdown signal can reach
//! threads that are blocked inside a read. `register`/`unregister` are
//! idempotent bookkeeping; `wait_for_empty` is the barrier the shutdown
//! sequence blocks on after `shutdown_all` until every session thread has
//! unwound.

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream};
use std::sync::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

struct State {
    next_id: u64,
    conns: HashMap<u64, TcpStream>,
}

pub struct ConnectionRegistry {
    state: Mutex<State>,
    became_empty: Condvar,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                conns: HashMap::new(),
            }),
            became_empty: Condvar::new(),
        }
    }

    /// Register a freshly accepted connection. Keeps its own clone of the
    /// descriptor so `shutdown_all` can half-close it independently of
    /// whatever the session loop does with its own handle.
    pub fn register(&self, stream: &TcpStream) -> io::Result<ConnectionId> {
        let clone = stream.try_clone()?;
        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.conns.insert(id, clone);
        Ok(ConnectionId(id))
    }

    /// Idempotent: unregistering an id that transitions the set to empty
    /// fires the one-shot "empty" signal for any `wait_for_empty` caller.
    pub fn unregister(&self, id: ConnectionId) {
        let mut state = self.state.lock().unwrap();
        state.conns.remove(&id.0);
        if state.conns.is_empty() {
            self.became_empty.notify_all();
        }
    }

    /// Half-close every registered descriptor so a session thread blocked
    /// on a read observes end-of-stream and unwinds on its own. Only the
    /// read half is disabled — the write half stays open so a reply or
    /// notification already in flight still lands instead of failing with
    /// a broken pipe.
    pub fn shutdown_all(&self) {
        let state = self.state.lock().unwrap();
        for stream in state.conns.values() {
            let _ = stream.shutdown(Shutdown::Read);
        }
    }

    /// Returns immediately if already empty, otherwise blocks until the last
    /// registered connection unregisters.
    pub fn wait_for_empty(&self) {
        let state = self.state.lock().unwrap();
        let _guard = self
            .became_empty
            .wait_while(state, |s| !s.conns.is_empty())
            .unwrap();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().conns.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
