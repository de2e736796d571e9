//! Newline-delimited JSON protocol.
//!
//! A connection opens with a `hello` frame carrying the shared password and
//! the acting user. Every later frame is one operation and gets exactly one
//! reply line.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::auth::SessionAuth;
use crate::engine::Engine;
use crate::limits::MAX_LINE_LEN;
use crate::model::*;
use crate::observability;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Frame {
    Hello { password: String, actor: Actor },
    CreateManualReservation { request: ManualReservationRequest },
    Ping,
}

impl Frame {
    fn label(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::CreateManualReservation { .. } => "create_manual_reservation",
            Frame::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub ok: bool,
    pub status: u16,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ReservationSummary>,
}

impl Reply {
    fn ok(code: &str) -> Self {
        Self {
            ok: true,
            status: 200,
            code: code.into(),
            message: None,
            data: None,
        }
    }

    fn error(status: u16, code: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            status,
            code: code.into(),
            message: Some(message.into()),
            data: None,
        }
    }

    fn created(created: &CreatedReservation) -> Self {
        Self {
            ok: true,
            status: CreatedReservation::STATUS,
            code: CreatedReservation::CODE.into(),
            message: None,
            data: Some(created.summary()),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, "BAD_REQUEST", message)
    }
}

type Conn = Framed<TcpStream, LinesCodec>;

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        LinesCodecError::MaxLineLengthExceeded => {
            io::Error::new(io::ErrorKind::InvalidData, "line too long")
        }
    }
}

async fn send(conn: &mut Conn, reply: &Reply) -> io::Result<()> {
    let line = serde_json::to_string(reply).map_err(io::Error::other)?;
    conn.send(line).await.map_err(codec_err)
}

/// Read the next non-blank line. `Ok(None)` on a clean close; oversized
/// lines are answered with `BAD_REQUEST` and skipped.
async fn next_line(conn: &mut Conn) -> io::Result<Option<String>> {
    while let Some(item) = conn.next().await {
        match item {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => return Ok(Some(line)),
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                send(conn, &Reply::bad_request("frame too long")).await?;
            }
            Err(LinesCodecError::Io(e)) => return Err(e),
        }
    }
    Ok(None)
}

/// Expect a `hello` frame and authenticate it.
async fn handshake(conn: &mut Conn, auth: &SessionAuth) -> io::Result<Option<Actor>> {
    let Some(line) = next_line(conn).await? else {
        return Ok(None);
    };
    let actor = match serde_json::from_str::<Frame>(&line) {
        Ok(Frame::Hello { password, actor }) => auth.authenticate(&password, actor),
        _ => None,
    };
    match actor {
        Some(actor) => {
            send(conn, &Reply::ok("HELLO")).await?;
            Ok(Some(actor))
        }
        None => {
            metrics::counter!(observability::AUTH_FAILURES_TOTAL).increment(1);
            send(conn, &Reply::error(401, "UNAUTHENTICATED", "hello with valid password required")).await?;
            Ok(None)
        }
    }
}

/// Handle one post-handshake frame.
pub async fn handle_frame(engine: &Engine, actor: &Actor, line: &str) -> Reply {
    let frame = match serde_json::from_str::<Frame>(line) {
        Ok(frame) => frame,
        Err(e) => {
            metrics::counter!(observability::FRAMES_TOTAL, "op" => "invalid", "code" => "BAD_REQUEST")
                .increment(1);
            return Reply::bad_request(format!("malformed frame: {e}"));
        }
    };
    let op = frame.label();
    let reply = match frame {
        Frame::Ping => Reply::ok("PONG"),
        Frame::Hello { .. } => Reply::bad_request("already authenticated"),
        Frame::CreateManualReservation { request } => {
            match engine.create_manual_reservation(actor, request).await {
                Ok(created) => Reply::created(&created),
                Err(e) => Reply::error(e.status(), e.code(), e.to_string()),
            }
        }
    };
    metrics::counter!(observability::FRAMES_TOTAL, "op" => op, "code" => reply.code.clone())
        .increment(1);
    reply
}

/// Serve one client until it disconnects.
pub async fn process_connection(
    socket: TcpStream,
    engine: Arc<Engine>,
    auth: Arc<SessionAuth>,
) -> io::Result<()> {
    let mut conn = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LEN));
    let Some(actor) = handshake(&mut conn, &auth).await? else {
        return Ok(());
    };
    debug!("session opened for actor {}", actor.id);

    while let Some(line) = next_line(&mut conn).await? {
        let started = Instant::now();
        let reply = handle_frame(&engine, &actor, &line).await;
        if reply.status >= 500 {
            warn!("request from {} failed: {:?}", actor.id, reply.message);
        }
        debug!("{} in {:?}", reply.code, started.elapsed());
        send(&mut conn, &reply).await?;
    }
    Ok(())
}
