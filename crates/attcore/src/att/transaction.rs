//! ATT transaction sequencing
//!
//! A connection may have at most one outstanding Request awaiting its
//! Response and at most one outstanding Indication awaiting its Confirmation,
//! in each direction. [`TransactionTracker`] keeps those four slots for one
//! connection and reports breaches of the rule as [`Check::Violation`].
//!
//! Once a violation has happened (a second transaction started early, or a
//! deadline passed) the connection is marked violated: inbound Requests and
//! Indications are dropped until [`TransactionTracker::clear_violation`] is
//! called. Only the first violation is reported as new, so the owner raises
//! one event per episode.

use super::message::reply_opcode;
use std::time::Instant;

/// Sequencing breach: `opcode` arrived or was due while `pending_opcode` was outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Violation {
    pub opcode: u8,
    pub pending_opcode: u8,
}

/// Outcome of checking one PDU against the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    /// The PDU may proceed
    Proceed,
    /// The connection is violated; drop the PDU silently
    Drop,
    /// The PDU breaks the one-outstanding rule. `first` is set when this is
    /// the transition into the violated state.
    Violation { violation: Violation, first: bool },
    /// Response or confirmation with nothing matching outstanding
    Unsolicited,
}

#[derive(Debug, Clone, Copy)]
struct Outstanding {
    opcode: u8,
    deadline: Instant,
}

/// Per-connection transaction state
#[derive(Debug, Clone, Default)]
pub struct TransactionTracker {
    /// Request we sent, awaiting a response
    client_request: Option<Outstanding>,
    /// Indication we sent, awaiting a confirmation
    server_indication: Option<Outstanding>,
    /// Request we received and still owe a response to
    server_request: Option<u8>,
    /// Indication we received and still owe a confirmation to
    client_indication: Option<u8>,
    violated: bool,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether inbound Requests and Indications are currently being dropped
    pub fn is_violated(&self) -> bool {
        self.violated
    }

    /// Opcode of the request awaiting a response, if any
    pub fn pending_request(&self) -> Option<u8> {
        self.client_request.map(|o| o.opcode)
    }

    /// Whether a sent indication is awaiting its confirmation
    pub fn indication_pending(&self) -> bool {
        self.server_indication.is_some()
    }

    fn violate(&mut self, opcode: u8, pending_opcode: u8) -> Check {
        let first = !self.violated;
        self.violated = true;
        Check::Violation {
            violation: Violation {
                opcode,
                pending_opcode,
            },
            first,
        }
    }

    /// A request is about to be sent; arms its deadline.
    pub fn send_request(&mut self, opcode: u8, deadline: Instant) -> Check {
        if let Some(pending) = self.client_request {
            return self.violate(opcode, pending.opcode);
        }
        self.client_request = Some(Outstanding { opcode, deadline });
        Check::Proceed
    }

    /// An indication is about to be sent; arms its deadline.
    pub fn send_indication(&mut self, opcode: u8, deadline: Instant) -> Check {
        if let Some(pending) = self.server_indication {
            return self.violate(opcode, pending.opcode);
        }
        self.server_indication = Some(Outstanding { opcode, deadline });
        Check::Proceed
    }

    /// A response to `request_opcode` is about to be sent.
    pub fn send_response(&mut self, request_opcode: u8) -> Check {
        match self.server_request {
            Some(pending) if pending == request_opcode => {
                self.server_request = None;
                Check::Proceed
            }
            _ => Check::Unsolicited,
        }
    }

    /// A confirmation is about to be sent.
    pub fn send_confirmation(&mut self) -> Check {
        if self.client_indication.take().is_some() {
            Check::Proceed
        } else {
            Check::Unsolicited
        }
    }

    /// A request arrived from the peer.
    pub fn receive_request(&mut self, opcode: u8) -> Check {
        if self.violated {
            return Check::Drop;
        }
        if let Some(pending) = self.server_request {
            return self.violate(opcode, pending);
        }
        self.server_request = Some(opcode);
        Check::Proceed
    }

    /// An indication arrived from the peer.
    pub fn receive_indication(&mut self, opcode: u8) -> Check {
        if self.violated {
            return Check::Drop;
        }
        if let Some(pending) = self.client_indication {
            return self.violate(opcode, pending);
        }
        self.client_indication = Some(opcode);
        Check::Proceed
    }

    /// A response to `request_opcode` arrived; cancels the request deadline.
    pub fn receive_response(&mut self, request_opcode: u8) -> Check {
        match self.client_request {
            Some(pending) if pending.opcode == request_opcode => {
                self.client_request = None;
                Check::Proceed
            }
            _ => Check::Unsolicited,
        }
    }

    /// A confirmation arrived; cancels the indication deadline.
    pub fn receive_confirmation(&mut self) -> Check {
        if self.server_indication.take().is_some() {
            Check::Proceed
        } else {
            Check::Unsolicited
        }
    }

    /// Expire outstanding transactions whose deadline is at or before `now`.
    ///
    /// Expired slots are released, so each deadline fires once. Returns the
    /// violation only when it is the transition into the violated state.
    pub fn poll_timeout(&mut self, now: Instant) -> Option<Violation> {
        let mut fired = None;
        for slot in [&mut self.client_request, &mut self.server_indication] {
            if let Some(pending) = *slot {
                if pending.deadline <= now {
                    *slot = None;
                    fired.get_or_insert(Violation {
                        opcode: reply_opcode(pending.opcode),
                        pending_opcode: pending.opcode,
                    });
                }
            }
        }

        let violation = fired?;
        match self.violate(violation.opcode, violation.pending_opcode) {
            Check::Violation { first: true, .. } => Some(violation),
            _ => None,
        }
    }

    /// Earliest armed deadline
    pub fn next_deadline(&self) -> Option<Instant> {
        [self.client_request, self.server_indication]
            .into_iter()
            .flatten()
            .map(|o| o.deadline)
            .min()
    }

    /// Lift the violated state so inbound traffic is accepted again.
    pub fn clear_violation(&mut self) {
        self.violated = false;
    }

    /// Release every slot and deadline.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::att::constants::*;
    use std::time::Duration;

    #[test]
    fn test_request_response_cycle() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();

        assert_eq!(tracker.send_request(ATT_READ_REQ, now + ATT_MSG_TIMEOUT), Check::Proceed);
        assert_eq!(tracker.pending_request(), Some(ATT_READ_REQ));
        assert_eq!(tracker.receive_response(ATT_READ_REQ), Check::Proceed);
        assert_eq!(tracker.pending_request(), None);
        assert_eq!(tracker.next_deadline(), None);
    }

    #[test]
    fn test_second_request_violates_once() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();
        tracker.send_request(ATT_READ_REQ, now + ATT_MSG_TIMEOUT);

        match tracker.send_request(ATT_WRITE_REQ, now + ATT_MSG_TIMEOUT) {
            Check::Violation { violation, first } => {
                assert!(first);
                assert_eq!(violation.opcode, ATT_WRITE_REQ);
                assert_eq!(violation.pending_opcode, ATT_READ_REQ);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            tracker.send_request(ATT_WRITE_REQ, now),
            Check::Violation { first: false, .. }
        ));
        assert_eq!(tracker.receive_request(ATT_READ_REQ), Check::Drop);
        assert_eq!(tracker.receive_indication(ATT_HANDLE_VALUE_IND), Check::Drop);

        tracker.clear_violation();
        assert_eq!(tracker.receive_request(ATT_READ_REQ), Check::Proceed);
    }

    #[test]
    fn test_timeout_fires_once() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();
        tracker.send_request(ATT_READ_REQ, now + ATT_MSG_TIMEOUT);

        assert_eq!(tracker.poll_timeout(now + Duration::from_secs(29)), None);
        let violation = tracker.poll_timeout(now + ATT_MSG_TIMEOUT).unwrap();
        assert_eq!(violation.opcode, ATT_READ_RSP);
        assert_eq!(violation.pending_opcode, ATT_READ_REQ);
        assert_eq!(tracker.poll_timeout(now + Duration::from_secs(60)), None);
        assert!(tracker.is_violated());

        // late response is unsolicited
        assert_eq!(tracker.receive_response(ATT_READ_REQ), Check::Unsolicited);
    }

    #[test]
    fn test_indication_confirmation() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();

        assert_eq!(tracker.receive_confirmation(), Check::Unsolicited);
        tracker.send_indication(ATT_HANDLE_VALUE_IND, now + ATT_MSG_TIMEOUT);
        assert!(tracker.indication_pending());
        assert_eq!(tracker.next_deadline(), Some(now + ATT_MSG_TIMEOUT));
        assert_eq!(tracker.receive_confirmation(), Check::Proceed);

        assert_eq!(tracker.send_confirmation(), Check::Unsolicited);
        tracker.receive_indication(ATT_HANDLE_VALUE_IND);
        assert_eq!(tracker.send_confirmation(), Check::Proceed);
    }

    #[test]
    fn test_roles_are_independent() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();

        tracker.send_request(ATT_READ_REQ, now + ATT_MSG_TIMEOUT);
        assert_eq!(tracker.receive_request(ATT_WRITE_REQ), Check::Proceed);
        assert_eq!(tracker.send_response(ATT_READ_REQ), Check::Unsolicited);
        assert_eq!(tracker.send_response(ATT_WRITE_REQ), Check::Proceed);
    }

    #[test]
    fn test_clear_releases_deadlines() {
        let now = Instant::now();
        let mut tracker = TransactionTracker::new();
        tracker.send_request(ATT_READ_REQ, now);
        tracker.send_indication(ATT_HANDLE_VALUE_IND, now);

        tracker.clear();
        assert_eq!(tracker.next_deadline(), None);
        assert_eq!(tracker.poll_timeout(now + ATT_MSG_TIMEOUT), None);
        assert!(!tracker.is_violated());
    }
}
