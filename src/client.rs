//! Client session loop (C5)
//!
//! One OS thread per accepted connection, driving the state machine from
//! §4.5: `Unauthenticated` accepts only LOGIN, `Authenticated` accepts every
//! other request. There are no async suspension points here — every
//! blocking call is a socket read/write, a mutex acquire inside C1/C2/C4, or
//! nothing at all.
//!
//! Before login there is no [`Session`] yet, so replies go straight over the
//! raw socket; once logged in, every reply goes through `Session::send`,
//! which is what keeps a reply from interleaving with a concurrent
//! broadcast or matcher notification on the same wire.

use crate::core_types::{Price, Quantity};
use crate::exchange::ExchangeError;
use crate::orderbook::Side;
use crate::proto::{
    CancelInfo, EscrowInfo, FundsInfo, Header, MessageType, OrderInfo, ProtocolError, StatusInfo,
};
use crate::server::ServerContext;
use crate::session::{RegistryError, Session};
use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Accept-loop entry point: runs the session to completion, then always
/// unregisters the connection and (if logged in) logs the session out,
/// regardless of how the loop ended.
pub fn handle_connection(stream: TcpStream, ctx: Arc<ServerContext>) {
    let conn_id = match ctx.connections.register(&stream) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "failed to register connection");
            return;
        }
    };

    let name = run(stream, &ctx);

    if let Some(name) = name {
        ctx.sessions.logout(&name);
        ctx.metrics.record_logout();
        info!(user = %name, "session ended");
    }
    ctx.connections.unregister(conn_id);
}

/// Drives one connection until the peer disconnects or a fatal I/O error
/// occurs. Returns the logged-in user name, if any, so the caller can log
/// the session out of C2.
fn run(stream: TcpStream, ctx: &ServerContext) -> Option<String> {
    let mut reader = match stream.try_clone() {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "failed to clone socket for reading");
            return None;
        }
    };
    let mut unauthenticated_writer = Some(stream);
    let mut session: Option<Arc<Session>> = None;

    loop {
        let header = match Header::read_from(&mut reader) {
            Ok(h) => h,
            Err(ProtocolError::PeerClosed) => break,
            Err(e) => {
                debug!(error = %e, "connection read error");
                break;
            }
        };

        let mut payload = vec![0u8; header.payload_size as usize];
        if !payload.is_empty() {
            if let Err(e) = reader.read_exact(&mut payload) {
                debug!(error = %e, "short read on payload");
                break;
            }
        }

        if session.is_none() {
            let writer = unauthenticated_writer
                .as_mut()
                .expect("unauthenticated_writer is only taken on successful login");
            if let Some(new_session) =
                handle_unauthenticated(header.msg_type, &payload, ctx, writer)
            {
                // Login succeeded: the raw writer handle was moved into
                // the new Session; every later reply goes through it.
                session = Some(new_session);
                unauthenticated_writer = None;
            }
        } else {
            let active = session.as_ref().expect("checked Some above");
            if !handle_authenticated(header.msg_type, &payload, ctx, active) {
                break;
            }
        }
    }

    session.map(|s| s.name().to_string())
}

fn send_direct(writer: &mut TcpStream, msg_type: MessageType, payload: &[u8]) {
    let header = Header::now(msg_type, payload.len() as u16);
    if header.write_to(writer).is_ok() && !payload.is_empty() {
        let _ = writer.write_all(payload);
    }
}

/// Handles one request while unauthenticated. Only a well-formed LOGIN
/// advances the state machine; everything else, including malformed
/// LOGINs and any other request type, is a NACK that leaves the connection
/// in `Unauthenticated`. Returns the freshly created session on success.
fn handle_unauthenticated(
    msg_type: MessageType,
    payload: &[u8],
    ctx: &ServerContext,
    writer: &mut TcpStream,
) -> Option<Arc<Session>> {
    if msg_type != MessageType::Login {
        send_direct(writer, MessageType::Nack, &[]);
        return None;
    }

    let name = match std::str::from_utf8(payload) {
        Ok(n) if !n.is_empty() => n,
        _ => {
            send_direct(writer, MessageType::Nack, &[]);
            return None;
        }
    };

    // `writer`'s underlying socket is moved into the Session on success; a
    // cloned handle keeps `writer` usable for the NACK path below.
    let writer_handle = match writer.try_clone() {
        Ok(w) => w,
        Err(_) => {
            send_direct(writer, MessageType::Nack, &[]);
            return None;
        }
    };

    match ctx.sessions.login(name, &ctx.ledger, writer_handle) {
        Ok(new_session) => {
            ctx.metrics.record_login();
            info!(user = %name, "login");
            new_session.send(MessageType::Ack, &[]).ok();
            Some(new_session)
        }
        Err(RegistryError::RegistryFull)
        | Err(RegistryError::UnknownAccount)
        | Err(RegistryError::AlreadyLoggedIn) => {
            send_direct(writer, MessageType::Nack, &[]);
            None
        }
    }
}

/// Handles one request while authenticated. Returns `false` if the
/// connection should be torn down (currently only on a protocol-level send
/// failure, which means the socket is already broken).
fn handle_authenticated(
    msg_type: MessageType,
    payload: &[u8],
    ctx: &ServerContext,
    session: &Arc<Session>,
) -> bool {
    match msg_type {
        MessageType::Login => {
            let _ = session.send(MessageType::Nack, &[]);
        }
        MessageType::Status => {
            if payload.is_empty() {
                ack_status(ctx, session, 0, 0);
            } else {
                nack(session);
            }
        }
        MessageType::Deposit => with_funds_info(payload, session, |info| {
            session.account().credit_balance(info.amount as u64);
            ack_status(ctx, session, 0, 0);
        }),
        MessageType::Withdraw => with_funds_info(payload, session, |info| {
            match session.account().debit_balance(info.amount as u64) {
                Ok(()) => ack_status(ctx, session, 0, 0),
                Err(_) => nack(session),
            }
        }),
        MessageType::Escrow => with_escrow_info(payload, session, |info| {
            session.account().credit_inventory(info.quantity as u64);
            ack_status(ctx, session, 0, 0);
        }),
        MessageType::Release => with_escrow_info(payload, session, |info| {
            match session.account().debit_inventory(info.quantity as u64) {
                Ok(()) => ack_status(ctx, session, 0, 0),
                Err(_) => nack(session),
            }
        }),
        MessageType::Buy => handle_post(payload, ctx, session, Side::Buy),
        MessageType::Sell => handle_post(payload, ctx, session, Side::Sell),
        MessageType::Cancel => handle_cancel(payload, ctx, session),
        _ => nack(session),
    }
    true
}

fn with_funds_info(payload: &[u8], session: &Arc<Session>, f: impl FnOnce(FundsInfo)) {
    if payload.len() != FundsInfo::WIRE_LEN as usize {
        nack(session);
        return;
    }
    match FundsInfo::read_from(&mut std::io::Cursor::new(payload)) {
        Ok(info) => f(info),
        Err(_) => nack(session),
    }
}

fn with_escrow_info(payload: &[u8], session: &Arc<Session>, f: impl FnOnce(EscrowInfo)) {
    if payload.len() != EscrowInfo::WIRE_LEN as usize {
        nack(session);
        return;
    }
    match EscrowInfo::read_from(&mut std::io::Cursor::new(payload)) {
        Ok(info) => f(info),
        Err(_) => nack(session),
    }
}

fn handle_post(payload: &[u8], ctx: &ServerContext, session: &Arc<Session>, side: Side) {
    if payload.len() != OrderInfo::WIRE_LEN as usize {
        nack(session);
        return;
    }
    let info = match OrderInfo::read_from(&mut std::io::Cursor::new(payload)) {
        Ok(info) => info,
        Err(_) => {
            nack(session);
            return;
        }
    };
    let qty = info.quantity as Quantity;
    let price = info.price as Price;

    let result = match side {
        Side::Buy => ctx.exchange.post_buy(Arc::clone(session), qty, price),
        Side::Sell => ctx.exchange.post_sell(Arc::clone(session), qty, price),
    };

    match result {
        Ok(order_id) => {
            ack_status(ctx, session, order_id as u32, 0);
            ctx.exchange.broadcast_posted(side, order_id, qty, price);
        }
        Err(ExchangeError::InvalidOrder) => nack(session),
        Err(_) => nack(session),
    }
}

fn handle_cancel(payload: &[u8], ctx: &ServerContext, session: &Arc<Session>) {
    if payload.len() != CancelInfo::WIRE_LEN as usize {
        nack(session);
        return;
    }
    let info = match CancelInfo::read_from(&mut std::io::Cursor::new(payload)) {
        Ok(info) => info,
        Err(_) => {
            nack(session);
            return;
        }
    };

    match ctx.exchange.cancel(session, info.order_id as u64) {
        Ok(residual) => ack_status(ctx, session, info.order_id, residual as u32),
        Err(_) => nack(session),
    }
}

fn ack_status(ctx: &ServerContext, session: &Arc<Session>, order_id: u32, quantity: u32) {
    let snapshot = ctx.exchange.status(session.account());
    let info = StatusInfo {
        balance: snapshot.balance as u32,
        inventory: snapshot.inventory as u32,
        bid: snapshot.bid as u32,
        ask: snapshot.ask as u32,
        last: snapshot.last as u32,
        order_id,
        quantity,
    };
    let mut buf = Vec::with_capacity(StatusInfo::WIRE_LEN as usize);
    info.write_to(&mut buf).expect("writing to a Vec cannot fail");
    let _ = session.send(MessageType::Ack, &buf);
}

fn nack(session: &Arc<Session>) {
    let _ = session.send(MessageType::Nack, &[]);
}
