//! The session runtime shell.
//!
//! `SessionDriver` is the only place where session logic meets the
//! transport: it funnels the three inbound feeds into one sequential queue,
//! pumps payloads through the state machine one at a time, and executes the
//! resulting actions. Publish failures are logged and swallowed - the
//! optimistic local mutation has already been applied and stands.

use std::sync::Arc;

use palaver_core::Environment;
use palaver_proto::{CorrelationId, Frame, RosterSyncRequest};
use tokio::sync::mpsc;

use crate::{
    error::TransportError,
    event::{SessionAction, SessionEvent},
    session::{ChatSession, SessionConfig},
    transport::{Transport, topics},
};

/// One payload from one of the subscribed feeds.
enum Inbound {
    RoomTraffic(String),
    PrivateRoster(String),
    RoomRoster(String),
}

/// Drives a [`ChatSession`] against a [`Transport`].
pub struct SessionDriver<E: Environment> {
    session: ChatSession<E>,
    transport: Arc<dyn Transport>,
    inbound: mpsc::UnboundedReceiver<Inbound>,
}

impl<E: Environment> SessionDriver<E> {
    /// Subscribe the session's feeds and announce presence.
    ///
    /// The private roster feed is subscribed before the JOIN goes out so the
    /// relay's members push for this session is not missed.
    pub async fn connect(
        transport: Arc<dyn Transport>,
        env: E,
        config: SessionConfig,
    ) -> Result<Self, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let sender = tx.clone();
        transport
            .subscribe(
                &topics::private_roster(&config.username),
                Box::new(move |payload| {
                    let _ = sender.send(Inbound::PrivateRoster(payload));
                }),
            )
            .await?;

        let sender = tx.clone();
        transport
            .subscribe(
                &topics::room_roster(&config.room_id),
                Box::new(move |payload| {
                    let _ = sender.send(Inbound::RoomRoster(payload));
                }),
            )
            .await?;

        let sender = tx;
        transport
            .subscribe(
                topics::ROOM_TRAFFIC,
                Box::new(move |payload| {
                    let _ = sender.send(Inbound::RoomTraffic(payload));
                }),
            )
            .await?;

        let mut driver = Self { session: ChatSession::new(env, config), transport, inbound: rx };

        let actions = driver.session.handle(SessionEvent::Connected);
        driver.execute(actions).await;

        Ok(driver)
    }

    /// The session being driven.
    pub fn session(&self) -> &ChatSession<E> {
        &self.session
    }

    /// Send a chat line.
    pub async fn send_chat(&mut self, text: impl Into<String>) {
        let actions = self.session.handle(SessionEvent::SendChat { text: text.into() });
        self.execute(actions).await;
    }

    /// Replace an earlier message's text.
    pub async fn edit_message(&mut self, correlation_id: CorrelationId, text: impl Into<String>) {
        let actions =
            self.session.handle(SessionEvent::EditMessage { correlation_id, text: text.into() });
        self.execute(actions).await;
    }

    /// Retract an earlier message.
    pub async fn recall_message(&mut self, correlation_id: CorrelationId) {
        let actions = self.session.handle(SessionEvent::RecallMessage { correlation_id });
        self.execute(actions).await;
    }

    /// Remove an earlier message outright.
    pub async fn delete_message(&mut self, correlation_id: CorrelationId) {
        let actions = self.session.handle(SessionEvent::DeleteMessage { correlation_id });
        self.execute(actions).await;
    }

    /// Toggle the reveal override on a flagged message.
    pub fn toggle_reveal(&mut self, correlation_id: CorrelationId) {
        let _ = self.session.handle(SessionEvent::ToggleReveal { correlation_id });
    }

    /// Say goodbye (best effort) and tear the transport down.
    pub async fn logout(&mut self) {
        let actions = self.session.handle(SessionEvent::Logout);
        self.execute(actions).await;

        if let Err(error) = self.transport.disconnect().await {
            tracing::debug!(%error, "disconnect after logout failed");
        }
    }

    /// Wait for the next inbound payload and deliver it to the session.
    /// Returns false once the queue is closed.
    pub async fn pump_once(&mut self) -> bool {
        let Some(inbound) = self.inbound.recv().await else {
            return false;
        };
        let actions = self.process(inbound);
        self.execute(actions).await;
        true
    }

    /// Deliver one already-queued payload, without waiting. Returns false
    /// when the queue is empty.
    pub async fn try_pump(&mut self) -> bool {
        let Ok(inbound) = self.inbound.try_recv() else {
            return false;
        };
        let actions = self.process(inbound);
        self.execute(actions).await;
        true
    }

    /// Deliver every already-queued payload. Returns true if anything was
    /// processed.
    pub async fn drain(&mut self) -> bool {
        let mut any = false;
        while self.try_pump().await {
            any = true;
        }
        any
    }

    /// Process inbound payloads until the queue closes.
    pub async fn run(&mut self) {
        while self.pump_once().await {}
    }

    /// Turn one raw payload into session events.
    fn process(&mut self, inbound: Inbound) -> Vec<SessionAction> {
        match inbound {
            Inbound::RoomTraffic(payload) => {
                let frame = Frame::decode(&payload).unwrap_or_else(|error| {
                    // not frame JSON: wrap as a displayable content-only frame
                    tracing::debug!(%error, "unparseable room traffic");
                    Frame::wrap_raw(payload)
                });
                self.session.handle(SessionEvent::FrameReceived(frame))
            },
            Inbound::PrivateRoster(payload) => match serde_json::from_str::<Vec<String>>(&payload)
            {
                Ok(names) => self.session.handle(SessionEvent::PrivateRoster { names }),
                Err(error) => {
                    tracing::debug!(%error, "unparseable private roster push, ignoring");
                    Vec::new()
                },
            },
            Inbound::RoomRoster(payload) => match serde_json::from_str::<Vec<String>>(&payload) {
                Ok(names) => {
                    let room_id = self.session.room_id().to_owned();
                    self.session.handle(SessionEvent::RoomRoster { room_id, names })
                },
                Err(error) => {
                    tracing::debug!(%error, "unparseable room roster push, ignoring");
                    Vec::new()
                },
            },
        }
    }

    /// Execute actions against the transport, swallowing failures.
    async fn execute(&self, actions: Vec<SessionAction>) {
        for action in actions {
            match action {
                SessionAction::Publish(frame) => match frame.encode() {
                    Ok(payload) => self.publish(&payload).await,
                    Err(error) => tracing::warn!(%error, "frame encode failed, dropping"),
                },
                SessionAction::RequestRosterSync { room_id } => {
                    match (RosterSyncRequest { room_id }).encode() {
                        Ok(payload) => self.publish(&payload).await,
                        Err(error) => {
                            tracing::warn!(%error, "roster sync encode failed, dropping");
                        },
                    }
                },
            }
        }
    }

    async fn publish(&self, payload: &str) {
        if let Err(error) = self.transport.publish(topics::COMMANDS, payload).await {
            // peers never see this frame; local optimistic state stands
            tracing::warn!(%error, "publish failed, dropping frame");
        }
    }
}
