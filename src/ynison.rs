//! The two WebSocket sessions against the sync service.
//!
//! The service models a distributed shared-state join, not a query/response
//! API. Observing a session therefore takes exactly two sequential socket
//! sessions:
//!
//! 1. [`negotiate`] - a short-lived connection to the fixed redirector
//!    endpoint that announces the device and returns a single-use ticket
//!    plus the host that owns the user's live session.
//! 2. [`snapshot`] - a connection to that host which announces a passive
//!    shadow state (the join precondition) and receives the session's
//!    authoritative state once.
//!
//! Each socket sees at most one send and one receive and is closed on every
//! exit path; a step that times out drops its socket immediately. Nothing
//! here retries: a caller that wants resilience re-invokes the whole
//! resolution, because the ticket is single-use and stale handshake state
//! cannot be reused.

use futures_util::{SinkExt, StreamExt};
use http::header::{HeaderValue, AUTHORIZATION, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, handshake::client::Request, Message},
    MaybeTlsStream, WebSocketStream,
};

use crate::{
    config::Config,
    device::Device,
    error::{Error, Result},
    protocol::ynison::{Handshake, Redirect, State, StateUpdate},
    token::Token,
};

/// Service path of the state endpoint on the host named by the redirector.
const SYNC_PATH: &str = "ynison_state.YnisonStateService/PutYnisonState";

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Negotiates a session redirect.
///
/// Opens a socket to the redirector, performs exactly one receive, and
/// closes the socket: the redirector connection is never reused for
/// synchronization. The returned ticket is single-use.
///
/// # Errors
///
/// Returns `Err` if the connection cannot be established within the
/// connect timeout, the step as a whole exceeds the negotiation timeout,
/// or the response is missing `redirect_ticket` or `host`.
pub async fn negotiate(config: &Config, device: &Device, token: &Token) -> Result<Redirect> {
    let subprotocol = Handshake::new(device).subprotocol()?;
    let request = build_request(
        config.redirector_url.as_str(),
        &subprotocol,
        &config.origin,
        token,
    )?;

    debug!("negotiating session redirect as device {device}");

    timeout(config.negotiation_timeout, async {
        let mut socket = connect(request, config).await?;
        let received = receive_payload(&mut socket).await;
        close(socket).await;

        let redirect = serde_json::from_str::<Redirect>(&received?)
            .map_err(|e| Error::invalid_argument(format!("redirect grant invalid: {e}")))?;

        debug!("session lives on {}", redirect.host);
        Ok(redirect)
    })
    .await?
}

/// Reads the session's authoritative state once.
///
/// Connects to the host named by `redirect`, announces a shadow device
/// state to satisfy the join precondition, performs exactly one receive
/// bounded by the receive timeout, and closes the socket unconditionally.
/// This is a one-shot snapshot read, not a streaming subscription.
///
/// # Errors
///
/// Returns `Err` on connect or receive timeout, transport failure, or a
/// malformed state payload.
pub async fn snapshot(
    config: &Config,
    device: &Device,
    token: &Token,
    redirect: &Redirect,
) -> Result<State> {
    let subprotocol =
        Handshake::with_ticket(device, redirect.redirect_ticket.clone()).subprotocol()?;
    let url = format!(
        "{}://{}/{}",
        config.sync_scheme(),
        redirect.host,
        SYNC_PATH
    );
    let request = build_request(&url, &subprotocol, &config.origin, token)?;

    let mut socket = connect(request, config).await?;

    let result = async {
        let announcement = serde_json::to_string(&StateUpdate::shadow_announcement(device))?;
        socket.send(Message::text(announcement)).await?;

        let received = timeout(config.receive_timeout, receive_payload(&mut socket)).await??;
        trace!("state snapshot: {received}");

        serde_json::from_str::<State>(&received)
            .map_err(|e| Error::invalid_argument(format!("state snapshot invalid: {e}")))
    }
    .await;

    close(socket).await;
    result
}

/// Builds the WebSocket upgrade request with the three headers the service
/// requires.
fn build_request(url: &str, subprotocol: &str, origin: &str, token: &Token) -> Result<Request> {
    let mut request = url.into_client_request()?;

    let mut authorization = HeaderValue::from_str(&token.authorization())?;
    authorization.set_sensitive(true);

    let headers = request.headers_mut();
    headers.insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_str(subprotocol)?);
    headers.insert(ORIGIN, HeaderValue::from_str(origin)?);
    headers.insert(AUTHORIZATION, authorization);

    Ok(request)
}

/// Establishes a connection within the configured connect timeout.
async fn connect(request: Request, config: &Config) -> Result<Socket> {
    let (socket, response) = timeout(config.connect_timeout, connect_async(request)).await??;
    trace!("connected with status {}", response.status());
    Ok(socket)
}

/// Receives the next data payload, skipping transport housekeeping frames.
async fn receive_payload(socket: &mut Socket) -> Result<String> {
    while let Some(message) = socket.next().await {
        match message? {
            Message::Text(text) => return Ok(text.as_str().to_owned()),
            Message::Binary(data) => {
                return String::from_utf8(data.to_vec())
                    .map_err(|e| Error::invalid_argument(format!("payload is not UTF-8: {e}")))
            }
            // Pongs are queued automatically; pings carry no payload for us.
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            Message::Close(frame) => {
                return Err(Error::aborted(format!(
                    "connection closed by server: {frame:?}"
                )))
            }
        }
    }

    Err(Error::unavailable(
        "connection ended before a payload was received",
    ))
}

/// Closes a socket, tolerating peers that have already hung up.
async fn close(mut socket: Socket) {
    if let Err(e) = socket.close(None).await {
        trace!("error closing socket: {e}");
    }
}
