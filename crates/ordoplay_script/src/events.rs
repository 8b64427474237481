// SPDX-License-Identifier: MIT OR Apache-2.0
//! Notifications a script sends to editor collaborators.

use std::sync::mpsc;

/// Notification emitted by a [`Script`](crate::script::Script)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptEvent {
    /// A graph should be brought into view
    GraphShown {
        /// Graph name
        graph_name: String,
    },
    /// A graph is going away and any view of it should close
    GraphClosed {
        /// Graph name
        graph_name: String,
    },
    /// A graph was renamed
    GraphRenamed {
        /// Previous name
        old_name: String,
        /// Current name
        new_name: String,
    },
    /// A node should receive focus
    NodeFocusRequested {
        /// Graph containing the node
        graph_name: String,
        /// Node to focus
        node_id: u64,
    },
    /// The user asked to override an inherited function
    OverrideRequested,
}

impl ScriptEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            Self::GraphShown { .. } => "graph_shown",
            Self::GraphClosed { .. } => "graph_closed",
            Self::GraphRenamed { .. } => "graph_renamed",
            Self::NodeFocusRequested { .. } => "node_focus_requested",
            Self::OverrideRequested => "override_requested",
        }
    }
}

/// Fan-out of script events to any number of receivers
#[derive(Debug, Default)]
pub struct EventChannel {
    senders: Vec<mpsc::Sender<ScriptEvent>>,
}

impl EventChannel {
    /// Create a channel with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> mpsc::Receiver<ScriptEvent> {
        let (sender, receiver) = mpsc::channel();
        self.senders.push(sender);
        receiver
    }

    /// Number of live subscribers as of the last emit
    pub fn subscriber_count(&self) -> usize {
        self.senders.len()
    }

    /// Deliver an event to every live subscriber
    pub fn emit(&mut self, event: ScriptEvent) {
        tracing::debug!(event = event.name(), subscribers = self.senders.len(), "Emitting script event");
        self.senders.retain(|sender| sender.send(event.clone()).is_ok());
    }
}
