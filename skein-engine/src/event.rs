//! Event Stream (spec §4.6): a single ordered, bounded, cancellable channel
//! per session carrying [`skein_stream::ProtocolEvent`]s. Grounded on the
//! teacher's bounded producer/consumer channel idiom for streaming run output.

use std::collections::HashSet;
use std::sync::Arc;

use skein_stream::ProtocolEvent;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;

/// Producer handle. Cloned into every live agent/tool task for a session.
#[derive(Clone)]
pub struct EventStream {
    tx: mpsc::Sender<ProtocolEvent>,
    cancellation: CancellationToken,
}

/// Consumer handle, held by whoever forwards events to the client.
pub struct EventStreamHandle {
    rx: mpsc::Receiver<ProtocolEvent>,
}

/// Creates a bounded event stream of `capacity` (spec §4.6: producers block on full).
pub fn channel(capacity: usize, cancellation: CancellationToken) -> (EventStream, EventStreamHandle) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventStream { tx, cancellation }, EventStreamHandle { rx })
}

impl EventStream {
    /// Emits `event`, blocking on backpressure until either the event is
    /// delivered or the session is cancelled (spec §4.6, §5).
    pub async fn emit(&self, event: ProtocolEvent) -> Result<(), AgentError> {
        tokio::select! {
            res = self.tx.send(event) => res.map_err(|_| AgentError::Cancelled),
            _ = self.cancellation.cancelled() => Err(AgentError::Cancelled),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub async fn start(&self, agent_id: impl Into<String>) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::Start {
            agent_id: agent_id.into(),
        })
        .await
    }

    pub async fn finish(&self, agent_id: impl Into<String>) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::Finish {
            agent_id: agent_id.into(),
        })
        .await
    }

    pub async fn error(
        &self,
        agent_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::Error {
            agent_id: agent_id.into(),
            message: message.into(),
        })
        .await
    }

    pub async fn text(&self, agent_id: impl Into<String>, text: impl Into<String>) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::Text {
            agent_id: agent_id.into(),
            text: text.into(),
        })
        .await
    }

    /// Emitted by the Spawner before a child's own step loop starts (spec §4.5).
    pub async fn subagent_start(
        &self,
        agent_id: impl Into<String>,
        parent_agent_id: impl Into<String>,
        agent_type: impl Into<String>,
    ) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::SubagentStart {
            agent_id: agent_id.into(),
            parent_agent_id: parent_agent_id.into(),
            agent_type: agent_type.into(),
        })
        .await
    }

    /// Emitted by the Spawner once a child's step loop has returned (spec §4.5).
    pub async fn subagent_finish(
        &self,
        agent_id: impl Into<String>,
        parent_agent_id: impl Into<String>,
    ) -> Result<(), AgentError> {
        self.emit(ProtocolEvent::SubagentFinish {
            agent_id: agent_id.into(),
            parent_agent_id: parent_agent_id.into(),
        })
        .await
    }
}

impl EventStreamHandle {
    pub async fn recv(&mut self) -> Option<ProtocolEvent> {
        self.rx.recv().await
    }
}

/// Fan-in filter enforcing spec §4.6's "unrecognized subagent events (unknown
/// `agentId`) are dropped with a warning rather than propagated." `known`
/// grows as `subagent_start` events are observed for registered agent ids.
pub struct KnownAgentFilter {
    known: Arc<Mutex<HashSet<String>>>,
}

impl KnownAgentFilter {
    pub fn new(root_agent_id: impl Into<String>) -> Self {
        let mut set = HashSet::new();
        set.insert(root_agent_id.into());
        Self {
            known: Arc::new(Mutex::new(set)),
        }
    }

    pub async fn register(&self, agent_id: impl Into<String>) {
        self.known.lock().await.insert(agent_id.into());
    }

    /// Returns `true` if the event's agent is known and it should be forwarded.
    pub async fn admit(&self, event: &ProtocolEvent) -> bool {
        if let ProtocolEvent::SubagentStart { agent_id, .. } = event {
            self.register(agent_id.clone()).await;
            return true;
        }
        self.known.lock().await.contains(event.agent_id())
    }
}
