//! The FIXP-style client session: sequence numbering, heartbeat liveness,
//! negotiate/establish/finalize, and state-change event publication.
//!
//! A dedicated dispatcher task is the only caller of `handle_inbound`, so
//! all inbound decoding and state transitions observe a total order.
//! Outbound senders and the heartbeat timer share the session through
//! `tokio::sync::Mutex`/`watch`, synchronizing on state rather than taking
//! a single coarse lock around the whole object.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use fixp_protocol::header::template;
use fixp_protocol::{Establish, Frame, Negotiate, RetransmitRequest, Sequence, SessionHeader};
use tokio::sync::{mpsc, watch, Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::codec::{CodecProvider, Message, OutboundMessage, SessionControlMessage};
use crate::dispatcher::DispatchItem;
use crate::error::{TraderError, TransportError};
use crate::transport::Transport;

/// One of the five declared session states. `Finalized` is terminal;
/// `NotEstablished` is a transport-unbound pseudo-state reachable only from
/// `Negotiated` or `Established`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotNegotiated,
    Negotiated,
    Established,
    Finalized,
    NotEstablished,
}

/// A state-change notification delivered to the session's subscriber.
#[derive(Debug, Clone)]
pub struct SessionEvent {
    pub state: SessionState,
    pub cause: String,
}

#[derive(Clone)]
struct EventPublisher {
    tx: mpsc::Sender<SessionEvent>,
    demand: Arc<Semaphore>,
}

impl EventPublisher {
    async fn publish(&self, event: SessionEvent) {
        match self.demand.acquire().await {
            Ok(permit) => {
                permit.forget();
                let _ = self.tx.send(event).await;
            }
            Err(_) => {
                // Subscriber cancelled (closed the semaphore); drop the event.
            }
        }
    }
}

/// The session's one allowed event subscriber. `request(n)` grants the
/// publisher permission to deliver up to `n` more events; `cancel` detaches
/// the subscriber so no further events are observed.
pub struct EventSubscriber {
    rx: mpsc::Receiver<SessionEvent>,
    demand: Arc<Semaphore>,
}

impl EventSubscriber {
    pub fn request(&self, n: u32) {
        self.demand.add_permits(n as usize);
    }

    pub async fn recv(&mut self) -> Option<SessionEvent> {
        self.rx.recv().await
    }

    pub fn cancel(&self) {
        self.demand.close();
        self.rx.close();
    }
}

pub struct Session {
    id: SessionHeader,
    codec: Arc<dyn CodecProvider>,
    state_tx: watch::Sender<SessionState>,
    state_rx: watch::Receiver<SessionState>,
    next_outbound_seq: AtomicU64,
    expected_inbound_seq: AtomicU64,
    heartbeat_interval_ms: AtomicU32,
    last_inbound_at: StdMutex<Instant>,
    last_outbound_at: StdMutex<Instant>,
    transport: AsyncMutex<Option<Arc<Transport>>>,
    heartbeat_task: AsyncMutex<Option<JoinHandle<()>>>,
    publisher: StdMutex<Option<EventPublisher>>,
    message_tx: mpsc::Sender<Message>,
    error_tx: mpsc::Sender<TraderError>,
}

impl Session {
    pub fn new(
        id: SessionHeader,
        codec: Arc<dyn CodecProvider>,
        heartbeat_interval_ms: u32,
        message_tx: mpsc::Sender<Message>,
        error_tx: mpsc::Sender<TraderError>,
    ) -> Arc<Self> {
        let (state_tx, state_rx) = watch::channel(SessionState::NotNegotiated);
        let now = Instant::now();
        Arc::new(Self {
            id,
            codec,
            state_tx,
            state_rx,
            next_outbound_seq: AtomicU64::new(1),
            expected_inbound_seq: AtomicU64::new(1),
            heartbeat_interval_ms: AtomicU32::new(heartbeat_interval_ms),
            last_inbound_at: StdMutex::new(now),
            last_outbound_at: StdMutex::new(now),
            transport: AsyncMutex::new(None),
            heartbeat_task: AsyncMutex::new(None),
            publisher: StdMutex::new(None),
            message_tx,
            error_tx,
        })
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn id(&self) -> SessionHeader {
        self.id
    }

    /// Registers the session's single event subscriber. Fails if one is
    /// already attached.
    pub fn subscribe(&self) -> Result<EventSubscriber, TraderError> {
        let mut guard = self.publisher.lock().expect("session lock poisoned");
        if guard.is_some() {
            return Err(TraderError::AlreadySubscribed);
        }
        let demand = Arc::new(Semaphore::new(0));
        let (tx, rx) = mpsc::channel(16);
        *guard = Some(EventPublisher {
            tx,
            demand: demand.clone(),
        });
        Ok(EventSubscriber { rx, demand })
    }

    async fn notify_state(&self, new: SessionState, cause: impl Into<String>) {
        let cause = cause.into();
        self.state_tx.send_replace(new);
        let publisher = self.publisher.lock().expect("session lock poisoned").clone();
        if let Some(publisher) = publisher {
            publisher.publish(SessionEvent { state: new, cause }).await;
        }
    }

    /// Blocks (cooperatively) until the session reaches `target` or
    /// `timeout` elapses.
    pub async fn wait_for_state(
        &self,
        target: SessionState,
        timeout: Duration,
    ) -> Result<(), TraderError> {
        let mut rx = self.state_rx.clone();
        if *rx.borrow() == target {
            return Ok(());
        }
        let wait = async {
            loop {
                if rx.changed().await.is_err() {
                    return Err(TraderError::Interrupted);
                }
                if *rx.borrow() == target {
                    return Ok(());
                }
            }
        };
        match tokio::time::timeout(timeout, wait).await {
            Ok(inner) => inner,
            Err(_) => Err(TraderError::TimedOut(timeout)),
        }
    }

    /// Binds a freshly opened transport. From `NOT_NEGOTIATED` this starts
    /// a fresh negotiate/establish handshake; from `NOT_ESTABLISHED` it
    /// re-establishes directly, reusing the existing session identity and
    /// sequence counters without renegotiating.
    pub async fn bind_transport(&self, transport: Arc<Transport>) -> Result<(), TraderError> {
        *self.transport.lock().await = Some(transport.clone());
        let now = Instant::now();
        *self.last_inbound_at.lock().expect("session lock poisoned") = now;
        *self.last_outbound_at.lock().expect("session lock poisoned") = now;

        match self.state() {
            SessionState::NotNegotiated => self.send_negotiate(&transport).await,
            SessionState::NotEstablished => self.send_establish(&transport).await,
            _ => Ok(()),
        }
    }

    async fn send_negotiate(&self, transport: &Transport) -> Result<(), TraderError> {
        let negotiate = Negotiate {
            timestamp: now_millis(),
            heartbeat_interval_ms: self.heartbeat_interval_ms.load(Ordering::SeqCst),
        };
        let frame = self
            .codec
            .session_messenger()
            .encode_negotiate(self.id, negotiate);
        transport.send(frame).await.map_err(TraderError::Transport)
    }

    async fn send_establish(&self, transport: &Transport) -> Result<(), TraderError> {
        let establish = Establish {
            timestamp: now_millis(),
            heartbeat_interval_ms: self.heartbeat_interval_ms.load(Ordering::SeqCst),
        };
        let frame = self
            .codec
            .session_messenger()
            .encode_establish(self.id, establish);
        transport.send(frame).await.map_err(TraderError::Transport)
    }

    fn start_heartbeat(self: &Arc<Self>) {
        let session = self.clone();
        let interval_ms = self.heartbeat_interval_ms.load(Ordering::SeqCst).max(1) as u64;
        let handle = tokio::spawn(async move {
            session.heartbeat_loop(Duration::from_millis(interval_ms)).await;
        });
        tokio::spawn({
            let task_slot = self.clone();
            async move {
                let mut slot = task_slot.heartbeat_task.lock().await;
                if let Some(old) = slot.replace(handle) {
                    old.abort();
                }
            }
        });
    }

    async fn stop_heartbeat(&self) {
        if let Some(handle) = self.heartbeat_task.lock().await.take() {
            handle.abort();
        }
    }

    async fn heartbeat_loop(self: Arc<Self>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            ticker.tick().await;
            if self.state() == SessionState::Finalized {
                return;
            }
            let now = Instant::now();
            let inbound_elapsed = {
                let last = *self.last_inbound_at.lock().expect("session lock poisoned");
                now.duration_since(last)
            };
            if inbound_elapsed > interval * 2 {
                warn!(session = ?self.id, "heartbeat deadline exceeded, demoting to NOT_ESTABLISHED");
                self.demote_not_established("heartbeat timeout").await;
                return;
            }
            let outbound_elapsed = {
                let last = *self.last_outbound_at.lock().expect("session lock poisoned");
                now.duration_since(last)
            };
            if outbound_elapsed >= interval {
                if let Err(e) = self.send_heartbeat().await {
                    warn!(session = ?self.id, error = %e, "failed to send heartbeat");
                }
            }
        }
    }

    async fn send_heartbeat(&self) -> Result<(), TraderError> {
        let transport = self.transport.lock().await.clone();
        let Some(transport) = transport else {
            return Ok(());
        };
        let next = self.next_outbound_seq.load(Ordering::SeqCst);
        let frame = self
            .codec
            .session_messenger()
            .encode_heartbeat(self.id, Sequence { next_seq_no: next });
        transport.send(frame).await.map_err(TraderError::Transport)?;
        *self.last_outbound_at.lock().expect("session lock poisoned") = Instant::now();
        Ok(())
    }

    async fn demote_not_established(&self, cause: &str) {
        if let Some(transport) = self.transport.lock().await.take() {
            let _ = transport.close().await;
        }
        self.stop_heartbeat().await;
        self.notify_state(SessionState::NotEstablished, cause.to_owned())
            .await;
    }

    /// Called by the transport when its read loop ends without an explicit
    /// `close`/`suspend` request (peer closed, socket error).
    pub async fn on_transport_unbound(&self) {
        if self.state() == SessionState::Finalized {
            return;
        }
        *self.transport.lock().await = None;
        self.stop_heartbeat().await;
        self.notify_state(SessionState::NotEstablished, "transport unbound")
            .await;
    }

    /// Closes the transport and reports `NOT_ESTABLISHED` without
    /// finalizing the session — used by `Trader::suspend`.
    pub async fn unbind_transport(&self) -> Result<(), TraderError> {
        if let Some(transport) = self.transport.lock().await.take() {
            transport.close().await.map_err(TraderError::Transport)?;
        }
        self.stop_heartbeat().await;
        self.notify_state(SessionState::NotEstablished, "suspended")
            .await;
        Ok(())
    }

    /// Sends `Terminate` if a transport is bound, then finalizes.
    pub async fn finalize(&self) -> Result<(), TraderError> {
        if let Some(transport) = self.transport.lock().await.as_ref() {
            let frame = self
                .codec
                .session_messenger()
                .encode_terminate(self.id, fixp_protocol::Terminate { reason_code: 0 });
            let _ = transport.send(frame).await;
        }
        self.stop_heartbeat().await;
        self.notify_state(SessionState::Finalized, "local finalize")
            .await;
        Ok(())
    }

    /// Assigns the next outbound sequence number, frames the message, and
    /// hands it to the bound transport. The buffer is released exactly
    /// once, regardless of outcome.
    pub async fn send_application_message(
        &self,
        msg: OutboundMessage,
        timeout: Duration,
    ) -> Result<u64, TraderError> {
        if self.wait_for_state(SessionState::Established, timeout).await.is_err() {
            msg.region.release();
            return Err(TraderError::NotEstablished);
        }

        let seq = self.next_outbound_seq.fetch_add(1, Ordering::SeqCst);
        let payload = msg.region.with_buf(|buf| buf.split().freeze());
        msg.region.release();
        let frame = fixp_protocol::encode_frame(self.id, seq, msg.template_id, msg.block_length, &payload);

        let transport = self.transport.lock().await.clone();
        let Some(transport) = transport else {
            return Err(TraderError::NotEstablished);
        };
        transport
            .send(frame)
            .await
            .map(|()| {
                *self.last_outbound_at.lock().expect("session lock poisoned") = Instant::now();
                seq
            })
            .map_err(TraderError::Transport)
    }

    /// Entry point for the dispatcher: one already-dequeued inbound frame.
    pub async fn handle_inbound(self: Arc<Self>, item: DispatchItem) {
        let bytes: Bytes = item.region.with_buf(|buf| buf.split().freeze());
        item.region.release();

        match fixp_protocol::decode_frame(bytes) {
            Ok(frame) => {
                *self.last_inbound_at.lock().expect("session lock poisoned") = Instant::now();
                self.dispatch_frame(frame).await;
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed frame");
                let _ = self.error_tx.send(TraderError::from(e)).await;
            }
        }
    }

    async fn dispatch_frame(self: Arc<Self>, frame: Frame) {
        match frame.header.template_id {
            template::EXECUTION_REPORT | template::ORDER_CANCEL_REJECT => {
                self.handle_application(frame).await;
            }
            _ => self.handle_session_control(frame).await,
        }
    }

    async fn handle_application(&self, frame: Frame) {
        let expected = self.expected_inbound_seq.load(Ordering::SeqCst);
        if frame.seq_no < expected {
            debug!(seq_no = frame.seq_no, expected, "discarding duplicate inbound message");
            return;
        }
        if frame.seq_no > expected {
            warn!(seq_no = frame.seq_no, expected, "gap detected in inbound sequence");
            self.request_retransmit(expected, frame.seq_no).await;
            return;
        }

        match self.codec.response_factory().wrap(&frame) {
            Ok(msg) => {
                self.expected_inbound_seq.store(expected + 1, Ordering::SeqCst);
                let _ = self.message_tx.send(msg).await;
            }
            Err(e) => {
                warn!(error = %e, "unrecognized application template");
                let _ = self.error_tx.send(TraderError::Codec(e)).await;
            }
        }
    }

    async fn request_retransmit(&self, from_seq_no: u64, peer_next_seq_no: u64) {
        let count = (peer_next_seq_no - from_seq_no) as u32;
        let transport = self.transport.lock().await.clone();
        if let Some(transport) = transport {
            let frame = self.codec.session_messenger().encode_retransmit_request(
                self.id,
                RetransmitRequest { from_seq_no, count },
            );
            let _ = transport.send(frame).await;
        }
    }

    async fn check_inbound_gap(&self, peer_next_seq_no: u64) {
        let expected = self.expected_inbound_seq.load(Ordering::SeqCst);
        if peer_next_seq_no > expected {
            self.request_retransmit(expected, peer_next_seq_no).await;
        }
    }

    async fn handle_session_control(self: Arc<Self>, frame: Frame) {
        let decoded = self.codec.session_messenger().decode(&frame);
        match decoded {
            Ok(SessionControlMessage::NegotiationResponse(_)) => {
                if self.state() == SessionState::NotNegotiated {
                    self.notify_state(SessionState::Negotiated, "negotiation accepted")
                        .await;
                    self.start_heartbeat();
                    let transport = self.transport.lock().await.clone();
                    if let Some(transport) = transport {
                        if let Err(e) = self.send_establish(&transport).await {
                            warn!(error = %e, "failed to send establish");
                        }
                    }
                }
            }
            Ok(SessionControlMessage::NegotiationReject(reject)) => {
                warn!(reason = reject.reason_code, "negotiation rejected");
                let _ = self.error_tx.send(TraderError::NotEstablished).await;
            }
            Ok(SessionControlMessage::EstablishmentAck(ack)) => {
                let state = self.state();
                if matches!(state, SessionState::Negotiated | SessionState::NotEstablished) {
                    self.next_outbound_seq.store(ack.next_seq_no.max(1), Ordering::SeqCst);
                    if state == SessionState::NotEstablished {
                        self.start_heartbeat();
                    }
                    self.notify_state(SessionState::Established, "establishment acknowledged")
                        .await;
                }
            }
            Ok(SessionControlMessage::EstablishmentReject(reject)) => {
                warn!(reason = reject.reason_code, "establishment rejected");
                let _ = self.error_tx.send(TraderError::NotEstablished).await;
            }
            Ok(SessionControlMessage::Sequence(hb)) => {
                self.check_inbound_gap(hb.next_seq_no).await;
            }
            Ok(SessionControlMessage::RetransmitRequest(_)) => {
                debug!("ignoring peer retransmit request; this client is always the requester");
            }
            Ok(SessionControlMessage::RetransmitResponse(resp)) => {
                info!(from = resp.from_seq_no, count = resp.count, "retransmit acknowledged by peer");
            }
            Ok(SessionControlMessage::Terminate(term)) => {
                info!(reason = term.reason_code, "peer requested termination");
                self.stop_heartbeat().await;
                self.notify_state(SessionState::Finalized, "peer terminated")
                    .await;
            }
            Err(e) => {
                warn!(error = %e, "dropping malformed session-control frame");
                let _ = self.error_tx.send(TraderError::from(e)).await;
            }
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
