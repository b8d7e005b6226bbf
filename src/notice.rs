//! Notices the session machine emits for presentation layers.

use crate::ledger::SessionId;
use crate::session::Role;
use tokio::sync::mpsc;
use tracing::debug;

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionNotice {
    /// A session was created; share its id with the other player.
    ShareSessionId(SessionId),
    /// The session can be cancelled until someone joins.
    CancelAvailable(SessionId),
    /// The second participant joined this client's session.
    OpponentJoined(SessionId),
    /// This client joined as Player-2; Player-1 is already there.
    JoinedAsPlayerTwo(SessionId),
    /// The session was cancelled and the view reset.
    Cancelled(SessionId),
    /// A session record is now being viewed.
    Viewing {
        /// Viewed session.
        id: SessionId,
        /// Role of the viewer.
        role: Role,
    },
    /// An operation failed; the text is suitable for display as-is.
    Failed(String),
}

/// Sender side used by the machine. Sending never fails the caller.
#[derive(Debug, Clone, Default)]
pub(crate) struct NoticeSink {
    sender: Option<mpsc::UnboundedSender<SessionNotice>>,
}

impl NoticeSink {
    pub(crate) fn new(sender: mpsc::UnboundedSender<SessionNotice>) -> Self {
        Self {
            sender: Some(sender),
        }
    }

    pub(crate) fn send(&self, notice: SessionNotice) {
        let Some(sender) = &self.sender else {
            return;
        };
        if sender.send(notice).is_err() {
            debug!("Notice receiver dropped");
        }
    }
}
