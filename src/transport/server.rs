//! HTTPS front end
//!
//! One route, `/hell/<topic>`: `PUT` produces, `GET` consumes. Each accepted
//! connection is authenticated once, right after the TLS handshake, and the
//! resolved identity (or the reason there is none) is shared by every
//! request served on that connection.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::header::{ALLOW, CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, RETRY_AFTER};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthError, Authenticator, Identity};
use crate::broker::{Dispatcher, Operation, Reply};
use crate::transport::tls::ServerTls;

pub const QUEUE_ENDPOINT: &str = "hell";

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
const RETRY_AFTER_SECS: &str = "5";
const FORBIDDEN_TEXT: &str = "forbidden";

/// Path for a topic's mailbox.
pub fn queue_path(topic: &str) -> String {
    format!("/{QUEUE_ENDPOINT}/{topic}")
}

/// Topic part of a request path, or `None` if the path is not under the
/// queue endpoint.
pub fn topic_from_path(path: &str) -> Option<&str> {
    path.strip_prefix('/')?
        .strip_prefix(QUEUE_ENDPOINT)?
        .strip_prefix('/')
}

struct Connection {
    peer: SocketAddr,
    identity: Result<Identity, AuthError>,
    dispatcher: Dispatcher,
}

pub struct RelayServer {
    listener: TcpListener,
    acceptor: TlsAcceptor,
    tls: Arc<ServerTls>,
    authenticator: Arc<Authenticator>,
    dispatcher: Dispatcher,
}

impl RelayServer {
    pub async fn bind(
        addr: &str,
        tls: ServerTls,
        authenticator: Authenticator,
        dispatcher: Dispatcher,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            acceptor: tls.acceptor(),
            tls: Arc::new(tls),
            authenticator: Arc::new(authenticator),
            dispatcher,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!("Mailbox server listening on https://{addr}/{QUEUE_ENDPOINT}/"),
            Err(e) => warn!("Mailbox server listening on unknown address: {e}"),
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Failed to accept connection: {e}");
                    continue;
                }
            };

            let acceptor = self.acceptor.clone();
            let tls = self.tls.clone();
            let authenticator = self.authenticator.clone();
            let dispatcher = self.dispatcher.clone();
            tokio::spawn(async move {
                serve_connection(stream, peer, acceptor, tls, authenticator, dispatcher).await;
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    tls: Arc<ServerTls>,
    authenticator: Arc<Authenticator>,
    dispatcher: Dispatcher,
) {
    let tls_stream = match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            warn!("TLS handshake with {peer} failed: {e}");
            return;
        }
        Err(_) => {
            warn!("TLS handshake with {peer} timed out");
            return;
        }
    };

    let chains = tls_stream
        .get_ref()
        .1
        .peer_certificates()
        .map(|presented| tls.verified_chains(presented))
        .unwrap_or_default();
    let identity = authenticator.authenticate(&chains).cloned();
    match &identity {
        Ok(identity) => debug!("Connection from {peer} authenticated as {}", identity.name()),
        Err(e) => warn!("Auth failure from {peer}: {e}"),
    }

    let conn = Arc::new(Connection {
        peer,
        identity,
        dispatcher,
    });
    let service = service_fn(move |req: Request<Incoming>| {
        let conn = conn.clone();
        async move {
            let reply = route(req, &conn).await;
            Ok::<_, Infallible>(render(reply))
        }
    });

    if let Err(e) = http1::Builder::new()
        .serve_connection(TokioIo::new(tls_stream), service)
        .await
    {
        debug!("Connection with {peer} closed: {e}");
    }
}

async fn route(req: Request<Incoming>, conn: &Connection) -> Reply {
    let peer = conn.peer.to_string();

    let identity = match &conn.identity {
        Ok(identity) => identity,
        Err(e) => {
            warn!("Rejected {} {} from {peer}: {e}", req.method(), req.uri().path());
            return Reply::Forbidden;
        }
    };

    // 403 rather than 404 so other paths cannot be told apart from queues
    // this identity may not use.
    let Some(topic) = topic_from_path(req.uri().path()) else {
        warn!(
            "Auth failure from {}@{peer}: request for non-existent path {}",
            identity.name(),
            req.uri().path()
        );
        return Reply::Forbidden;
    };

    let operation = match *req.method() {
        Method::PUT => Operation::Produce,
        Method::GET => Operation::Consume,
        _ => {
            warn!("{}@{peer} sent an invalid method: {}", identity.name(), req.method());
            return Reply::MethodNotAllowed;
        }
    };

    let grant = match conn
        .dispatcher
        .authorize(Some(identity), topic, operation, &peer)
    {
        Ok(grant) => grant,
        Err(reply) => return reply,
    };

    match operation {
        Operation::Consume => conn.dispatcher.consume(&grant),
        Operation::Produce => {
            let declared = req
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.parse::<u64>().ok());
            if let Some(declared) = declared {
                if let Err(reply) = conn.dispatcher.check_length(&grant, declared) {
                    return reply;
                }
            }

            let limit = conn.dispatcher.max_payload_bytes();
            match Limited::new(req.into_body(), limit).collect().await {
                Ok(collected) => conn.dispatcher.produce(&grant, &collected.to_bytes()),
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    warn!("Request body from {} exceeded {limit} bytes", grant.source());
                    Reply::TooLarge
                }
                Err(e) => {
                    warn!("Failed to read body in request from {}: {e}", grant.source());
                    Reply::Malformed("unreadable request body".to_string())
                }
            }
        }
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    response
}

/// Map a dispatcher reply onto the wire.
pub fn render(reply: Reply) -> Response<Full<Bytes>> {
    match reply {
        Reply::Accepted => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::OK;
            response
        }
        Reply::Delivered(body) => {
            let mut response = Response::new(Full::new(Bytes::from(body)));
            response
                .headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            response
        }
        Reply::Forbidden => text(StatusCode::FORBIDDEN, FORBIDDEN_TEXT),
        Reply::Malformed(reason) => text(StatusCode::BAD_REQUEST, reason),
        Reply::TooLarge => text(StatusCode::PAYLOAD_TOO_LARGE, "payload too large"),
        Reply::MethodNotAllowed => {
            let mut response = text(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, PUT"));
            response
        }
        Reply::Full => {
            let mut response = text(StatusCode::TOO_MANY_REQUESTS, "mailbox full, retry later");
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
            response
        }
        Reply::Empty => {
            let mut response = Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::NO_CONTENT;
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
            response
        }
        Reply::Internal => text(StatusCode::INTERNAL_SERVER_ERROR, "internal error"),
    }
}
