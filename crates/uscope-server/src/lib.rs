//! TCP command server for the HIL driver.
//!
//! Accepts connections and, on each, reads one request per round trip: a
//! 10-byte ASCII decimal length prefix followed by a JSON- or
//! MessagePack-encoded `{cmd, args}` envelope (spec.md §6.1). Every
//! connection shares the same [`Dispatcher`], serialized behind a mutex,
//! since the hardware state it owns is process-wide.

use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use uscope_core::{CommandEnvelope, Dispatcher, ResponseEnvelope};

const LENGTH_PREFIX_WIDTH: usize = 10;

/// Shared server state: one [`Dispatcher`] behind a mutex, since the
/// register bus and HIL deployment state it owns are singletons.
struct AppState {
    dispatcher: Mutex<Dispatcher>,
}

pub async fn run_server(dispatcher: Dispatcher, host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("uscope-server listening on {addr}");

    let state = Arc::new(AppState {
        dispatcher: Mutex::new(dispatcher),
    });

    loop {
        let (socket, peer) = listener.accept().await?;
        info!("accepted connection from {peer}");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, &state).await {
                warn!("connection from {peer} closed: {e}");
            }
        });
    }
}

async fn handle_connection(mut socket: TcpStream, state: &AppState) -> std::io::Result<()> {
    loop {
        let envelope = match read_request(&mut socket).await? {
            Some(envelope) => envelope,
            None => return Ok(()),
        };

        let response = {
            let mut dispatcher = state.dispatcher.lock().await;
            dispatcher.dispatch(&envelope)
        };

        write_response(&mut socket, &response).await?;
    }
}

/// Reads one `{cmd, args}` request. Returns `None` on a clean EOF between
/// requests (the connection is simply done).
async fn read_request(socket: &mut TcpStream) -> std::io::Result<Option<CommandEnvelope>> {
    let mut length_buf = [0u8; LENGTH_PREFIX_WIDTH];
    match socket.read_exact(&mut length_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let length_str = std::str::from_utf8(&length_buf)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let length: usize = length_str
        .trim()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, format!("bad length prefix: {e}")))?;

    let mut payload = vec![0u8; length];
    socket.read_exact(&mut payload).await?;

    let envelope = decode_envelope(&payload)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    Ok(Some(envelope))
}

/// Clients may send either JSON or MessagePack; JSON is tried first since
/// it is self-delimiting and fails fast on binary MessagePack input.
fn decode_envelope(payload: &[u8]) -> Result<CommandEnvelope, String> {
    serde_json::from_slice(payload)
        .or_else(|json_err| {
            rmp_serde::from_slice(payload).map_err(|msgpack_err| {
                format!("neither JSON ({json_err}) nor MessagePack ({msgpack_err}) decoding succeeded")
            })
        })
}

async fn write_response(socket: &mut TcpStream, response: &ResponseEnvelope) -> std::io::Result<()> {
    let body = rmp_serde::to_vec_named(response)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    let length = (body.len() as u32).to_be_bytes();
    socket.write_all(&length).await?;
    socket.write_all(&body).await?;
    socket.flush().await
}
