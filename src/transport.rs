//! Lifecycle of a WebSocket client connection: `open`/`close`/`send`, and the
//! inbound read loop that hands frames to the ring dispatcher.
//!
//! TLS trust is the one piece of config the transport reads directly from
//! the environment rather than through `crate::config` — `FIXP_TRUSTSTORE_PATH`
//! and `FIXP_TRUSTSTORE_PASSWORD`, per the external-interfaces contract.
//! Absent either, `connect_async` falls back to the platform/webpki default
//! trust store.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use crate::buffer_pool::BufferPool;
use crate::dispatcher::{DispatchItem, RingDispatcher};
use crate::error::TransportError;
use crate::session::Session;

const TRUSTSTORE_PATH_VAR: &str = "FIXP_TRUSTSTORE_PATH";
const TRUSTSTORE_PASSWORD_VAR: &str = "FIXP_TRUSTSTORE_PASSWORD";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Owns the WebSocket client connection. Inbound binary frames are handed
/// to the ring dispatcher; outbound bytes go out through `send`.
pub struct Transport {
    source: String,
    write: AsyncMutex<Option<WsSink>>,
    read_task: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Transport {
    /// Connects to `uri`, completing the TLS handshake and WebSocket upgrade
    /// before returning. Spawns the read loop that feeds `dispatcher` and
    /// notifies `session` if the connection ends without an explicit `close`.
    pub async fn open(
        uri: &str,
        pool: Arc<BufferPool>,
        dispatcher: Arc<RingDispatcher>,
        session: Arc<Session>,
    ) -> Result<Arc<Self>, TransportError> {
        let connector = build_connector()?;
        let (ws_stream, _response) =
            tokio_tungstenite::connect_async_tls_with_config(uri, None, false, connector)
                .await
                .map_err(|e| TransportError::HandshakeFailed(e.to_string()))?;

        let (write, read) = ws_stream.split();
        let transport = Arc::new(Self {
            source: uri.to_owned(),
            write: AsyncMutex::new(Some(write)),
            read_task: AsyncMutex::new(None),
        });

        let handle = tokio::spawn(Self::read_loop(
            read,
            pool,
            dispatcher,
            session,
            transport.source.clone(),
        ));
        *transport.read_task.lock().await = Some(handle);

        Ok(transport)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Sends one already-framed message. Ownership of `bytes` transfers to
    /// the socket write regardless of outcome.
    pub async fn send(&self, bytes: Vec<u8>) -> Result<(), TransportError> {
        let mut guard = self.write.lock().await;
        let Some(write) = guard.as_mut() else {
            return Err(TransportError::NotConnected);
        };
        write
            .send(Message::Binary(bytes.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Sends a WebSocket close frame, then stops the read loop. Idempotent.
    pub async fn close(&self) -> Result<(), TransportError> {
        if let Some(write) = self.write.lock().await.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        *self.write.lock().await = None;
        if let Some(handle) = self.read_task.lock().await.take() {
            handle.abort();
        }
        Ok(())
    }

    async fn read_loop(
        mut read: SplitStream<WsStream>,
        pool: Arc<BufferPool>,
        dispatcher: Arc<RingDispatcher>,
        session: Arc<Session>,
        source: String,
    ) {
        loop {
            match read.next().await {
                Some(Ok(Message::Binary(bytes))) => {
                    if Self::enqueue(&pool, &dispatcher, &source, bytes.into()).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) => {
                    debug!(source = %source, "peer closed the websocket");
                    break;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(source = %source, error = %e, "websocket read error");
                    break;
                }
                None => {
                    debug!(source = %source, "websocket stream ended");
                    break;
                }
            }
        }
        session.on_transport_unbound().await;
    }

    async fn enqueue(
        pool: &Arc<BufferPool>,
        dispatcher: &Arc<RingDispatcher>,
        source: &str,
        bytes: Bytes,
    ) -> Result<(), ()> {
        let region = pool.acquire(bytes.len());
        region.with_buf(|buf| buf.extend_from_slice(&bytes));
        dispatcher
            .push(DispatchItem {
                source_id: source.to_owned(),
                region,
            })
            .await
            .map_err(|_| ())
    }
}

/// Builds a custom `rustls` trust store from `FIXP_TRUSTSTORE_PATH` when set,
/// falling back to the platform default (`webpki-roots`, via
/// `tokio-tungstenite`'s default connector) when it is absent.
///
/// The trust material is a PEM-encoded certificate bundle; the accompanying
/// `FIXP_TRUSTSTORE_PASSWORD` is accepted for interface parity with the
/// PKCS#12 bundle the external contract describes, but is not otherwise used
/// since the pem-based trust stack this client builds on has no notion of a
/// password-protected bundle.
fn build_connector() -> Result<Option<Connector>, TransportError> {
    let Ok(path) = std::env::var(TRUSTSTORE_PATH_VAR) else {
        return Ok(None);
    };
    if std::env::var(TRUSTSTORE_PASSWORD_VAR).is_err() {
        debug!("FIXP_TRUSTSTORE_PATH set without FIXP_TRUSTSTORE_PASSWORD; proceeding anyway");
    }

    let pem = std::fs::read(&path)
        .map_err(|e| TransportError::TrustMaterial(format!("reading '{path}': {e}")))?;
    let certs = rustls_pemfile::certs(&mut pem.as_slice())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::TrustMaterial(format!("parsing '{path}': {e}")))?;

    let mut roots = rustls::RootCertStore::empty();
    let (added, rejected) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(TransportError::TrustMaterial(format!(
            "'{path}' contained no usable certificates ({rejected} rejected)"
        )));
    }

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| TransportError::TrustMaterial(e.to_string()))?
        .with_root_certificates(roots)
        .with_no_client_auth();

    Ok(Some(Connector::Rustls(Arc::new(config))))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Both cases live in one test: `FIXP_TRUSTSTORE_PATH` is process-global
    // env state, and `cargo test` runs these in parallel threads by default.
    #[test]
    fn truststore_env_var_controls_connector_selection() {
        unsafe {
            std::env::remove_var(TRUSTSTORE_PATH_VAR);
        }
        assert!(build_connector().unwrap().is_none());

        unsafe {
            std::env::set_var(TRUSTSTORE_PATH_VAR, "/nonexistent/path/to/truststore.pem");
        }
        let err = build_connector().unwrap_err();
        assert!(matches!(err, TransportError::TrustMaterial(_)));

        unsafe {
            std::env::remove_var(TRUSTSTORE_PATH_VAR);
        }
    }
}
