//! Session registry (C2)
//!
//! A session is a logged-in connection bound to an [`Account`]. Orders and
//! broadcasts need to hold a session alive past logout, so sessions are
//! reference-counted — here, simply an `Arc<Session>`. Rust's own refcount
//! takes the place of the source's manual ref()/unref() pair and its
//! "negative refcount aborts the process" invariant: the only way to get a
//! reference is to clone an existing `Arc`, so it cannot go negative, and the
//! socket closes exactly once, in `Drop`, when the last owner releases it.

use crate::ledger::{Account, AccountLedger};
use crate::proto::{Header, MessageType, ProtocolError};
use std::collections::HashMap;
use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("session registry is full")]
    RegistryFull,

    #[error("no such account")]
    UnknownAccount,

    #[error("account is already logged in")]
    AlreadyLoggedIn,
}

/// A logged-in trader: a user name, its account, and the write half of its
/// socket. The read half lives in the client session loop thread, which
/// needs no lock since it has the only reader.
pub struct Session {
    name: String,
    account: Arc<Account>,
    writer: Mutex<TcpStream>,
}

impl Session {
    fn new(name: String, account: Arc<Account>, writer: TcpStream) -> Self {
        Self {
            name,
            account,
            writer: Mutex::new(writer),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn account(&self) -> &Arc<Account> {
        &self.account
    }

    /// Serialize a header plus optional payload under the write lock, so
    /// concurrent senders (the owning client thread and the matcher's
    /// broadcast) never interleave bytes on the wire.
    pub fn send(&self, msg_type: MessageType, payload: &[u8]) -> Result<(), ProtocolError> {
        let header = Header::now(msg_type, payload.len() as u16);
        let mut writer = self.writer.lock().unwrap();
        header.write_to(&mut *writer)?;
        if !payload.is_empty() {
            writer.write_all(payload)?;
        }
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(writer) = self.writer.lock() {
            let _ = writer.shutdown(Shutdown::Both);
        }
    }
}

/// Process-wide mapping from user name to its live [`Session`].
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Session>>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            max_sessions,
        }
    }

    /// Construct and register a session with refcount 1, held by the
    /// registry itself. Obtains the account via `ledger` (per §4.2, login
    /// itself is responsible for that C1 lookup) and surfaces a failed
    /// lookup as `UnknownAccount`. Fails if `name` is already logged in (see
    /// the open question on double-login: this registry mandates NACK) or
    /// the session cap is reached.
    pub fn login(
        &self,
        name: &str,
        ledger: &AccountLedger,
        writer: TcpStream,
    ) -> Result<Arc<Session>, RegistryError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.contains_key(name) {
            return Err(RegistryError::AlreadyLoggedIn);
        }
        if sessions.len() >= self.max_sessions {
            return Err(RegistryError::RegistryFull);
        }
        let account = ledger.lookup(name).map_err(|_| RegistryError::UnknownAccount)?;
        let session = Arc::new(Session::new(name.to_string(), account, writer));
        sessions.insert(name.to_string(), Arc::clone(&session));
        Ok(session)
    }

    /// Drop the registry's own reference. Residual references held by open
    /// orders keep the `Session` (and its socket) alive until those orders
    /// are matched or canceled.
    pub fn logout(&self, name: &str) {
        self.sessions.lock().unwrap().remove(name);
    }

    pub fn is_logged_in(&self, name: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(name)
    }

    /// Snapshot semantics: clone every current session's `Arc` while holding
    /// the registry lock, then deliver outside the lock so a slow or blocked
    /// socket write never stalls logins/logouts. A per-recipient send
    /// failure is swallowed — broadcast delivery is best-effort.
    pub fn broadcast(&self, msg_type: MessageType, payload: &[u8]) {
        let snapshot: Vec<Arc<Session>> = {
            let sessions = self.sessions.lock().unwrap();
            sessions.values().cloned().collect()
        };
        for session in snapshot {
            let _ = session.send(msg_type, payload);
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}
