//! TCP session for the instrument's HTTP-like protocol.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::BytesMut;
use log::debug;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::Transport;
use crate::config::InstrumentSettings;
use crate::error::{RgaError, RgaResult};

/// Persistent TCP connection to the instrument.
///
/// The connection is opened on first use and dropped after any failed
/// exchange so the next exchange reconnects from scratch. The instrument
/// does not frame its responses, so an exchange reads until the byte budget
/// fills or the exchange timeout elapses and hands back whatever arrived.
pub struct TcpSession {
    host: String,
    port: u16,
    connect_timeout: Duration,
    exchange_timeout: Duration,
    response_byte_budget: usize,
    stream: Option<TcpStream>,
}

impl TcpSession {
    /// Session for the configured instrument; no connection is made yet.
    pub fn new(settings: &InstrumentSettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            connect_timeout: settings.connect_timeout,
            exchange_timeout: settings.exchange_timeout,
            response_byte_budget: settings.response_byte_budget,
            stream: None,
        }
    }

    async fn connect(&mut self) -> RgaResult<()> {
        let addr = format!("{}:{}", self.host, self.port);
        let stream = timeout(self.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| RgaError::ExchangeTimeout(self.connect_timeout))??;
        stream.set_nodelay(true)?;
        debug!("Connected to instrument at {addr}");
        self.stream = Some(stream);
        Ok(())
    }
}

#[async_trait]
impl Transport for TcpSession {
    async fn exchange(&mut self, request: &str) -> RgaResult<Vec<u8>> {
        if self.stream.is_none() {
            self.connect().await?;
        }
        let mut stream = self.stream.take().ok_or(RgaError::NotConnected)?;

        stream.write_all(request.as_bytes()).await?;

        let mut response = BytesMut::with_capacity(4096);
        let deadline = Instant::now() + self.exchange_timeout;
        let mut reusable = true;
        loop {
            if response.len() >= self.response_byte_budget {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match timeout(remaining, stream.read_buf(&mut response)).await {
                // Deadline reached; whatever arrived so far is the response.
                Err(_) => break,
                // Peer closed the connection; reconnect on the next exchange.
                Ok(Ok(0)) => {
                    reusable = false;
                    break;
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => return Err(RgaError::Io(e)),
            }
        }

        if response.is_empty() {
            // Zero bytes inside the full window counts as a failed
            // exchange; the connection is dropped along with the stream.
            return Err(RgaError::ExchangeTimeout(self.exchange_timeout));
        }
        if reusable {
            self.stream = Some(stream);
        }
        Ok(response.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn settings(port: u16, exchange_timeout: Duration) -> InstrumentSettings {
        InstrumentSettings {
            host: "127.0.0.1".to_string(),
            port,
            connect_timeout: Duration::from_secs(1),
            exchange_timeout,
            response_byte_budget: 150_000,
        }
    }

    #[tokio::test]
    async fn test_exchange_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 256];
            let n = stream.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).starts_with("GET /mmsp/scanInfo/get"));
            stream
                .write_all(b"HTTP/1.1 200 OK\r\n\r\n{\"data\":{}}")
                .await
                .unwrap();
            // Hold the connection open so the session can reuse it.
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let mut session = TcpSession::new(&settings(port, Duration::from_millis(100)));
        let response = session
            .exchange("GET /mmsp/scanInfo/get\r\n\r\n")
            .await
            .unwrap();
        assert!(response.ends_with(b"{\"data\":{}}"));
        assert!(session.stream.is_some());
    }

    #[tokio::test]
    async fn test_silent_peer_times_out_with_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
        });

        let mut session = TcpSession::new(&settings(port, Duration::from_millis(50)));
        let err = session.exchange("GET /mmsp/status/get\r\n\r\n").await.unwrap_err();
        assert!(matches!(err, RgaError::ExchangeTimeout(_)));
        assert!(session.stream.is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_surfaces_as_error() {
        // Port 1 on localhost is essentially guaranteed closed.
        let mut session = TcpSession::new(&settings(1, Duration::from_millis(50)));
        assert!(session.exchange("GET /mmsp/status/get\r\n\r\n").await.is_err());
    }
}
