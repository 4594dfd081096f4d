use std::collections::{BTreeMap, HashMap};

use log::{debug, trace};

use super::live_session::LiveSession;
use crate::events::{SessionCommand, SessionEnd, SessionStart, StreamEvent};

/// Folds stream events into the set of sessions currently in progress.
///
/// The reconstructor does no I/O. Each [`apply`](Self::apply) returns a [`Reduction`]
/// describing the transition; side effects such as refreshing the recorded-session
/// view are left to the caller.
///
/// Sessions are keyed by `session_id` (at most one entry per id) and iterate in
/// insertion order, oldest open session first.
///
/// Per session id:
/// - `Unknown -> Open` on `session_start` or on a first `session_command`;
/// - `Open -> Closed` on `session_end`, removing the entry;
/// - a closed id reopens as a brand-new session on a later `session_start`.
///
/// Arrival order is the only order there is: reordering cannot be detected here,
/// only duplicates and missing starts are tolerated.
#[derive(Debug, Clone, Default)]
pub struct SessionReconstructor {
    slots: HashMap<String, u64>,
    sessions: BTreeMap<u64, LiveSession>,
    next_slot: u64,
}

/// What one event did to the live mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// A new session was opened.
    Opened(String),
    /// A duplicate start for an open session; nothing changed.
    AlreadyOpen(String),
    /// A late start filled in the metadata of a synthesized session.
    Reconciled(String),
    /// A command was appended to an open session.
    Appended(String),
    /// A command arrived for an unknown session, which was created around it.
    Synthesized(String),
    /// An open session was closed and removed.
    Closed(String),
    /// An end arrived for a session that was not open.
    EndedUnknown(String),
    /// The event does not concern the live mapping.
    Ignored,
}

impl Reduction {
    /// Whether the recorded-session view should be refreshed after this reduction.
    ///
    /// Every session end qualifies, including ends for sessions that closed before
    /// this consumer attached: the store knows about them either way.
    pub fn requires_refresh(&self) -> bool {
        matches!(self, Reduction::Closed(_) | Reduction::EndedUnknown(_))
    }
}

impl SessionReconstructor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one event into the mapping.
    pub fn apply(&mut self, event: &StreamEvent) -> Reduction {
        let reduction = match event {
            StreamEvent::SessionStart(start) => self.on_start(start),
            StreamEvent::SessionCommand(command) => self.on_command(command),
            StreamEvent::SessionEnd(end) => self.on_end(end),
            _ => Reduction::Ignored,
        };
        trace!("{} -> {:?}", event.event_type(), reduction);
        reduction
    }

    /// Value-to-value form of [`apply`](Self::apply).
    pub fn reduce(mut self, event: &StreamEvent) -> (Self, Reduction) {
        let reduction = self.apply(event);
        (self, reduction)
    }

    /// Open sessions, oldest first.
    pub fn list_live(&self) -> impl Iterator<Item = &LiveSession> + '_ {
        self.sessions.values()
    }

    pub fn get(&self, session_id: &str) -> Option<&LiveSession> {
        let slot = self.slots.get(session_id)?;
        self.sessions.get(slot)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn on_start(&mut self, start: &SessionStart) -> Reduction {
        if let Some(session) = self.get_mut(&start.session_id) {
            if session.synthesized {
                debug!(
                    "Reconciling session {} with late start from {}",
                    start.session_id, start.attacker_ip
                );
                session.reconcile(start);
                return Reduction::Reconciled(start.session_id.clone());
            }
            debug!("Duplicate start for open session {}", start.session_id);
            return Reduction::AlreadyOpen(start.session_id.clone());
        }

        debug!(
            "Session {} opened by {}",
            start.session_id, start.attacker_ip
        );
        self.insert(LiveSession::open(start));
        Reduction::Opened(start.session_id.clone())
    }

    fn on_command(&mut self, event: &SessionCommand) -> Reduction {
        if let Some(session) = self.get_mut(&event.session_id) {
            session.commands.push(event.command.clone());
            return Reduction::Appended(event.session_id.clone());
        }

        debug!(
            "Command for unknown session {}, synthesizing it",
            event.session_id
        );
        self.insert(LiveSession::synthesize(event));
        Reduction::Synthesized(event.session_id.clone())
    }

    fn on_end(&mut self, end: &SessionEnd) -> Reduction {
        match self.slots.remove(&end.session_id) {
            Some(slot) => {
                let closed = self.sessions.remove(&slot);
                debug!(
                    "Session {} closed after {} commands",
                    end.session_id,
                    closed.map(|s| s.command_count()).unwrap_or(0)
                );
                Reduction::Closed(end.session_id.clone())
            }
            None => Reduction::EndedUnknown(end.session_id.clone()),
        }
    }

    fn get_mut(&mut self, session_id: &str) -> Option<&mut LiveSession> {
        let slot = *self.slots.get(session_id)?;
        self.sessions.get_mut(&slot)
    }

    fn insert(&mut self, session: LiveSession) {
        let slot = self.next_slot;
        self.next_slot += 1;
        self.slots.insert(session.session_id.clone(), slot);
        self.sessions.insert(slot, session);
    }
}
