//! Producer/consumer client
//!
//! Talks to the mailbox server over mutual TLS. Each call opens a fresh
//! connection, sends one request and waits for the reply. There is no
//! server push: consumers call `read` (or `poll`) to fetch pending commands.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HOST};
use hyper::{Method, Request, StatusCode};
use hyper_util::rt::TokioIo;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::{debug, info};

use crate::broker::message::{Command, Message};
use crate::broker::topic::Topic;
use crate::config::{self, ClientSettings, ConfigError};
use crate::transport::server::queue_path;
use crate::transport::tls::{self, TlsError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Tls(#[from] TlsError),

    #[error("invalid server name: {0}")]
    ServerName(String),

    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("failed to build request: {0}")]
    Request(String),

    #[error("{0}")]
    InvalidCommand(String),

    #[error("mailbox is full, try again later")]
    Full,

    #[error("received status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode message: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Clone)]
pub struct RelayClient {
    connector: TlsConnector,
    host: String,
    port: u16,
    server_name: ServerName<'static>,
}

impl std::fmt::Debug for RelayClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayClient")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl RelayClient {
    pub fn new(host: &str, port: u16, config: Arc<ClientConfig>) -> Result<Self, ClientError> {
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|e| ClientError::ServerName(format!("{host}: {e}")))?;
        Ok(Self {
            connector: tls::connector(config),
            host: host.to_string(),
            port,
            server_name,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ClientError> {
        let ca = tls::read_pem(config::require_path(&settings.ca_path, "client.ca_path")?)?;
        let cert = tls::read_pem(config::require_path(&settings.cert_path, "client.cert_path")?)?;
        let key = tls::read_pem(config::require_path(&settings.key_path, "client.key_path")?)?;
        let config = tls::client_config(&ca, &cert, &key)?;
        Self::new(&settings.host, settings.port, config)
    }

    async fn send(
        &self,
        method: Method,
        topic: &Topic,
        body: Bytes,
    ) -> Result<(StatusCode, Bytes), ClientError> {
        let stream = TcpStream::connect((self.host.as_str(), self.port)).await?;
        let stream = self
            .connector
            .connect(self.server_name.clone(), stream)
            .await?;

        let (mut sender, connection) =
            hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Client connection closed: {e}");
            }
        });

        let request = Request::builder()
            .method(method)
            .uri(queue_path(topic.as_str()))
            .header(HOST, self.host.as_str())
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(body))
            .map_err(|e| ClientError::Request(e.to_string()))?;

        let response = sender.send_request(request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();
        Ok((status, body))
    }

    /// Enqueue `message` on `topic`. The command is lowercased and must be
    /// one the device understands.
    pub async fn write(&self, topic: &Topic, message: &Message) -> Result<(), ClientError> {
        let command: Command = message.cmd.parse().map_err(ClientError::InvalidCommand)?;
        let message = Message {
            cmd: command.as_str().to_string(),
            ..message.clone()
        };
        let body = Bytes::from(serde_json::to_vec(&message)?);

        let (status, body) = self.send(Method::PUT, topic, body).await?;
        match status {
            StatusCode::OK => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => Err(ClientError::Full),
            other => Err(status_error(other, &body)),
        }
    }

    /// Dequeue the oldest message on `topic`; `None` when nothing is pending.
    pub async fn read(&self, topic: &Topic) -> Result<Option<Message>, ClientError> {
        let (status, body) = self.send(Method::GET, topic, Bytes::new()).await?;
        match status {
            StatusCode::OK => Ok(Some(serde_json::from_slice(&body)?)),
            StatusCode::NO_CONTENT => Ok(None),
            other => Err(status_error(other, &body)),
        }
    }

    /// Read `topic` until `handler` returns `false`, sleeping `period`
    /// whenever the mailbox is empty.
    pub async fn poll<F>(&self, topic: &Topic, period: Duration, mut handler: F) -> Result<(), ClientError>
    where
        F: FnMut(Message) -> bool,
    {
        info!("Polling {topic} every {}s", period.as_secs());
        loop {
            match self.read(topic).await? {
                Some(message) => {
                    if !handler(message) {
                        return Ok(());
                    }
                }
                None => tokio::time::sleep(period).await,
            }
        }
    }
}

pub(crate) fn status_error(status: StatusCode, body: &[u8]) -> ClientError {
    let text = String::from_utf8_lossy(body).trim_end().to_string();
    let body = if text.is_empty() {
        status.canonical_reason().unwrap_or_default().to_string()
    } else {
        text
    };
    ClientError::Status {
        status: status.as_u16(),
        body,
    }
}
