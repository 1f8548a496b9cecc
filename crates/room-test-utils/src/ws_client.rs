//! Realtime test client.
//!
//! Wraps a tokio-tungstenite socket speaking the room service's JSON event
//! protocol.

use common::protocol::{encode_event, parse_server_event, ClientEvent, ServerEvent};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

/// How long `recv` waits before failing the test.
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// A connected realtime client.
pub struct TestWsClient {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestWsClient {
    /// Connect with the token in the `Authorization` header.
    pub async fn connect(ws_url: &str, token: &str) -> Result<Self, anyhow::Error> {
        let mut request = ws_url.into_client_request()?;
        request.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );

        let (socket, _) = connect_async(request).await?;
        Ok(Self { socket })
    }

    /// Connect with the token in the `token` query parameter.
    pub async fn connect_with_query(ws_url: &str, token: &str) -> Result<Self, anyhow::Error> {
        let (socket, _) = connect_async(format!("{ws_url}?token={token}")).await?;
        Ok(Self { socket })
    }

    /// Attempt a connection and return the HTTP status of a refused
    /// upgrade. Fails if the upgrade succeeds.
    pub async fn connect_expecting_rejection(
        ws_url: &str,
        token: Option<&str>,
    ) -> Result<StatusCode, anyhow::Error> {
        let mut request = ws_url.into_client_request()?;
        if let Some(token) = token {
            request.headers_mut().insert(
                header::AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))?,
            );
        }

        match connect_async(request).await {
            Ok(_) => anyhow::bail!("upgrade unexpectedly succeeded"),
            Err(WsError::Http(response)) => Ok(response.status()),
            Err(e) => Err(e.into()),
        }
    }

    /// Send a client event.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), anyhow::Error> {
        let text = encode_event(event)?;
        self.socket.send(Message::text(text)).await?;
        Ok(())
    }

    /// Send an arbitrary text frame.
    pub async fn send_raw(&mut self, text: &str) -> Result<(), anyhow::Error> {
        self.socket.send(Message::text(text.to_string())).await?;
        Ok(())
    }

    /// Send a binary frame.
    pub async fn send_binary(&mut self, bytes: Vec<u8>) -> Result<(), anyhow::Error> {
        self.socket.send(Message::binary(bytes)).await?;
        Ok(())
    }

    /// Receive the next server event, failing after `DEFAULT_RECV_TIMEOUT`.
    pub async fn recv(&mut self) -> Result<ServerEvent, anyhow::Error> {
        self.recv_timeout(DEFAULT_RECV_TIMEOUT).await
    }

    /// Receive the next server event within `timeout`.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Result<ServerEvent, anyhow::Error> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.socket.next())
                .await
                .map_err(|_| anyhow::anyhow!("timed out waiting for server event"))?;

            match frame {
                Some(Ok(Message::Text(text))) => return Ok(parse_server_event(&text)?),
                Some(Ok(Message::Close(_))) | None => anyhow::bail!("connection closed"),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Receive events until one matches `predicate`, returning it. Events
    /// skipped on the way are returned too, in arrival order.
    pub async fn recv_until<F>(
        &mut self,
        mut predicate: F,
    ) -> Result<(ServerEvent, Vec<ServerEvent>), anyhow::Error>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let mut skipped = Vec::new();
        loop {
            let event = self.recv().await?;
            if predicate(&event) {
                return Ok((event, skipped));
            }
            skipped.push(event);
        }
    }

    /// Assert that no event arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) -> Result<(), anyhow::Error> {
        match self.recv_timeout(window).await {
            Ok(event) => anyhow::bail!("expected no event, got {:?}", event),
            Err(_) => Ok(()),
        }
    }

    /// Whether the server has closed the connection, waiting up to `window`.
    pub async fn is_closed_within(&mut self, window: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.socket.next()).await {
                Err(_) => return false,
                Ok(None | Some(Err(_)) | Some(Ok(Message::Close(_)))) => return true,
                Ok(Some(Ok(_))) => continue,
            }
        }
    }

    /// Close the connection.
    pub async fn close(mut self) -> Result<(), anyhow::Error> {
        self.socket.close(None).await?;
        Ok(())
    }
}
