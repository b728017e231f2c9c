//! The trader facade: ties the buffer pool, codec provider, ring dispatcher,
//! transport, and session into a single blocking request/response-capable
//! API with a builder, event subscriber, and close semantics.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::buffer_pool::BufferPool;
use crate::codec::{
    CodecProvider, CodecRegistry, Message, NewOrderSingleBuilder, OrderCancelRequestBuilder,
};
use crate::config::TraderConfig;
use crate::dispatcher::RingDispatcher;
use crate::error::TraderError;
use crate::session::{EventSubscriber, Session, SessionState};
use crate::transport::Transport;
use fixp_protocol::SessionHeader;

/// Ties the session, transport, dispatcher, pool, and codec provider
/// together. Owns all of them exclusively; there is one `Trader` per
/// process instance, matching the 1:1 trader/session/transport assumption.
pub struct Trader {
    id: SessionHeader,
    pool: Arc<BufferPool>,
    codec: Arc<dyn CodecProvider>,
    dispatcher: Arc<RingDispatcher>,
    session: Arc<Session>,
    uri: String,
    timeout: Duration,
    message_rx: AsyncMutex<mpsc::Receiver<Message>>,
    error_rx: AsyncMutex<mpsc::Receiver<TraderError>>,
}

impl Trader {
    /// Builds the trader. Generates the session's UUID once; a later `open`
    /// (after `suspend`, or a fresh process with the same `Trader`) reuses
    /// it rather than minting a new identity.
    pub fn new(config: TraderConfig) -> Result<Arc<Self>, TraderError> {
        let registry = CodecRegistry::discover();
        let codec: Arc<dyn CodecProvider> = Arc::from(registry.resolve(&config.encoding)?);
        let pool = BufferPool::new();
        let (dispatcher, rx) = RingDispatcher::new(config.dispatcher_capacity);

        let (message_tx, message_rx) = mpsc::channel(64);
        let (error_tx, error_rx) = mpsc::channel(64);
        let id = SessionHeader::new(Uuid::new_v4());
        let session = Session::new(id, codec.clone(), config.heartbeat_interval_ms, message_tx, error_tx);

        let sink_session = session.clone();
        dispatcher.start(rx, move |item| {
            let session = sink_session.clone();
            async move { session.handle_inbound(item).await }
        });

        Ok(Arc::new(Self {
            id,
            pool,
            codec,
            dispatcher,
            session,
            uri: config.transport.uri(),
            timeout: Duration::from_secs(config.timeout_seconds),
            message_rx: AsyncMutex::new(message_rx),
            error_rx: AsyncMutex::new(error_rx),
        }))
    }

    pub fn id(&self) -> SessionHeader {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Blocks until the session reaches ESTABLISHED or `timeout` elapses.
    /// Convenience wrapper around the same wait `send` uses internally, for
    /// callers (such as `main`) that want to confirm the handshake finished
    /// before doing anything else.
    pub async fn wait_until_established(&self, timeout: Duration) -> Result<(), TraderError> {
        self.session
            .wait_for_state(SessionState::Established, timeout)
            .await
    }

    /// Opens the transport and binds it to the session, kicking off
    /// negotiate (first open) or re-establishment (after `suspend`).
    /// Returns once the TLS handshake and WebSocket upgrade succeed; it
    /// does not wait for the session to reach ESTABLISHED.
    pub async fn open(&self) -> Result<(), TraderError> {
        let transport = Transport::open(
            &self.uri,
            self.pool.clone(),
            self.dispatcher.clone(),
            self.session.clone(),
        )
        .await
        .map_err(TraderError::Transport)?;
        self.session.bind_transport(transport).await
    }

    /// Finalizes the session, waits (up to `timeout_seconds`) for
    /// `FINALIZED`, then stops the dispatcher.
    pub async fn close(&self) -> Result<(), TraderError> {
        self.session.finalize().await?;
        self.session
            .wait_for_state(SessionState::Finalized, self.timeout)
            .await?;
        self.dispatcher.stop().await;
        Ok(())
    }

    /// Closes the transport and waits for `NOT_ESTABLISHED` without
    /// finalizing the session — a later `open` re-establishes without
    /// renegotiating.
    pub async fn suspend(&self) -> Result<(), TraderError> {
        self.session.unbind_transport().await?;
        self.session
            .wait_for_state(SessionState::NotEstablished, self.timeout)
            .await
    }

    pub fn create_order(&self) -> NewOrderSingleBuilder {
        self.codec.request_factory(self.pool.clone()).new_order_single()
    }

    pub fn create_order_cancel_request(&self) -> OrderCancelRequestBuilder {
        self.codec
            .request_factory(self.pool.clone())
            .order_cancel_request()
    }

    /// Sends an already-built outbound message. Blocks (cooperatively) for
    /// up to `timeout_seconds` while the session is not ESTABLISHED.
    pub async fn send(&self, msg: crate::codec::OutboundMessage) -> Result<u64, TraderError> {
        self.session.send_application_message(msg, self.timeout).await
    }

    /// Registers the session's single event subscriber.
    pub fn subscribe(&self) -> Result<EventSubscriber, TraderError> {
        self.session.subscribe()
    }

    /// Awaits the next decoded application message (`ExecutionReport` or
    /// `OrderCancelReject`). `None` once the dispatcher has stopped and the
    /// channel has drained.
    pub async fn next_message(&self) -> Option<Message> {
        self.message_rx.lock().await.recv().await
    }

    /// Awaits the next error raised by the dispatcher or session (malformed
    /// frames, transport failures, rejected negotiate/establish).
    pub async fn next_error(&self) -> Option<TraderError> {
        self.error_rx.lock().await.recv().await
    }
}
