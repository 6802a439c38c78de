use std::time::Instant;

use url::Url;

use super::config::{Options, auto_reconnect};
use super::traits::TransportHandle;

/// Identifies one transport opened by the session manager.
pub(crate) type ConnectionId = u64;

/// Externally observable session state.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No transport handle and no attempt in flight
    Idle,
    /// Open requested, handshake not yet confirmed
    Connecting,
    /// Transport handle is live
    Connected {
        /// When the transport reported open
        since: Instant,
    },
    /// Close requested locally or by the server, handle still present
    Closing,
}

impl SessionPhase {
    /// Check if the session currently has a live transport handle.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected { .. })
    }
}

/// A transport together with the id its callbacks are tagged with.
pub(crate) struct Transport {
    pub(crate) id: ConnectionId,
    pub(crate) handle: Box<dyn TransportHandle>,
}

enum Phase {
    Idle,
    Connecting(Transport),
    Connected { transport: Transport, since: Instant },
    Closing(Transport),
}

/// The mutable session record. Owned by the session manager task only.
///
/// At most one [`Transport`] exists at a time: it lives inside the phase, so
/// replacing the phase drops the previous one.
pub(crate) struct SessionState {
    phase: Phase,
    next_id: ConnectionId,
    restart_attempts: u32,
    /// Bumped whenever pending delayed connects must be discarded
    restart_generation: u64,
    auto_reconnect: bool,
    server_url: Option<Url>,
}

impl SessionState {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Idle,
            next_id: 0,
            restart_attempts: 0,
            restart_generation: 0,
            auto_reconnect: false,
            server_url: None,
        }
    }

    pub(crate) fn phase(&self) -> SessionPhase {
        match &self.phase {
            Phase::Idle => SessionPhase::Idle,
            Phase::Connecting(_) => SessionPhase::Connecting,
            Phase::Connected { since, .. } => SessionPhase::Connected { since: *since },
            Phase::Closing(_) => SessionPhase::Closing,
        }
    }

    /// A transport exists or is being opened.
    pub(crate) fn is_live(&self) -> bool {
        !matches!(self.phase, Phase::Idle)
    }

    pub(crate) fn restart_attempts(&self) -> u32 {
        self.restart_attempts
    }

    pub(crate) fn auto_reconnect(&self) -> bool {
        self.auto_reconnect
    }

    pub(crate) fn server_url(&self) -> Option<&Url> {
        self.server_url.as_ref()
    }

    fn transport(&self) -> Option<&Transport> {
        match &self.phase {
            Phase::Idle => None,
            Phase::Connecting(transport)
            | Phase::Connected { transport, .. }
            | Phase::Closing(transport) => Some(transport),
        }
    }

    fn current_id(&self) -> Option<ConnectionId> {
        self.transport().map(|transport| transport.id)
    }

    /// Handle usable for sends and graceful closes; only present once opened.
    pub(crate) fn open_handle(&self) -> Option<&dyn TransportHandle> {
        match &self.phase {
            Phase::Connected { transport, .. } | Phase::Closing(transport) => {
                Some(transport.handle.as_ref())
            }
            Phase::Idle | Phase::Connecting(_) => None,
        }
    }

    pub(crate) fn allocate_id(&mut self) -> ConnectionId {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }

    /// Record a freshly requested transport. Only valid while idle.
    pub(crate) fn begin_connecting(&mut self, url: Url, options: &Options, transport: Transport) {
        debug_assert!(!self.is_live(), "a transport is already live");
        self.auto_reconnect = auto_reconnect(options);
        self.server_url = Some(url);
        self.phase = Phase::Connecting(transport);
    }

    /// Request a graceful close of whatever transport is live and move to closing.
    ///
    /// Returns `false` when there is nothing to close or a close is already in progress.
    pub(crate) fn request_close(&mut self, code: u16, reason: &str) -> bool {
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        let (requested, phase) = match phase {
            Phase::Connecting(transport) | Phase::Connected { transport, .. } => {
                let requested = transport.handle.close(code, reason);
                (requested, Phase::Closing(transport))
            }
            other => (false, other),
        };
        self.phase = phase;
        requested
    }

    /// Hard-cancel the live transport, if any, and return to idle.
    pub(crate) fn cancel(&mut self) -> bool {
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Idle => false,
            Phase::Connecting(transport)
            | Phase::Connected { transport, .. }
            | Phase::Closing(transport) => {
                transport.handle.cancel();
                true
            }
        }
    }

    pub(crate) fn disable_auto_reconnect(&mut self) {
        self.auto_reconnect = false;
    }

    pub(crate) fn restart_generation(&self) -> u64 {
        self.restart_generation
    }

    /// Invalidate every delayed connect scheduled so far.
    pub(crate) fn abandon_restarts(&mut self) {
        self.restart_generation = self.restart_generation.wrapping_add(1);
        self.restart_attempts = 0;
    }

    pub(crate) fn record_restart_attempt(&mut self) -> u32 {
        self.restart_attempts = self.restart_attempts.saturating_add(1);
        self.restart_attempts
    }

    /// Apply an open callback.
    ///
    /// Returns `false` if the callback is not for the current transport, or if that
    /// transport was asked to close before its handshake finished.
    pub(crate) fn opened(&mut self, id: ConnectionId) -> bool {
        if self.current_id() != Some(id) {
            return false;
        }
        match std::mem::replace(&mut self.phase, Phase::Idle) {
            Phase::Connecting(transport) => {
                self.restart_attempts = 0;
                self.phase = Phase::Connected {
                    transport,
                    since: Instant::now(),
                };
                true
            }
            other => {
                self.phase = other;
                false
            }
        }
    }

    /// Apply a server-initiated closing callback.
    pub(crate) fn closing(&mut self, id: ConnectionId) -> bool {
        if self.current_id() != Some(id) {
            return false;
        }
        let phase = std::mem::replace(&mut self.phase, Phase::Idle);
        self.phase = match phase {
            Phase::Connected { transport, .. } => Phase::Closing(transport),
            other => other,
        };
        true
    }

    /// Apply a closed or failure callback: the handle is dropped and the session goes idle.
    pub(crate) fn terminated(&mut self, id: ConnectionId) -> bool {
        if self.current_id() != Some(id) {
            return false;
        }
        self.phase = Phase::Idle;
        true
    }
}
