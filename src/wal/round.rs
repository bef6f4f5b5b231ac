//! Flush rounds: batches of pending appends sharing one flush call.
//!
//! A round is opened by the first submission after the previous round
//! closed, accumulates concurrently arriving members, and is driven to the
//! strongest durability any member asked for. One flush call per round is
//! how N concurrent sync writers end up paying for one sync instead of N.

use crate::durability::DurabilityLevel;
use crate::wal::errors::WalError;
use crate::wal::handle::Completer;

/// Lifecycle of a flush round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Accepting new submissions.
    Open,
    /// Detached from the coordinator; its single flush call is in flight.
    Flushing,
    /// Flush resolved; every member handle has been fired.
    Closed,
}

/// One member of a round: a staged record and its completion signal.
#[derive(Debug)]
struct RoundMember {
    offset: u64,
    /// `None` for `SKIP_WAL` members whose handle fired at append time;
    /// they are tracked only so the round's bookkeeping sees them.
    completer: Option<Completer>,
}

/// An in-flight batch of appends awaiting one shared flush.
#[derive(Debug)]
pub struct FlushRound {
    id: u64,
    state: RoundState,
    members: Vec<RoundMember>,
    required: DurabilityLevel,
    last_offset: u64,
}

impl FlushRound {
    /// Open a fresh, empty round.
    pub fn new(id: u64) -> Self {
        Self {
            id,
            state: RoundState::Open,
            members: Vec::new(),
            // Identity for max(): any waiting member raises it.
            required: DurabilityLevel::SkipWal,
            last_offset: 0,
        }
    }

    /// Round identifier, monotonically increasing per log stream.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Strongest level any member has asked for. Never decreases while the
    /// round is open.
    pub fn required_level(&self) -> DurabilityLevel {
        self.required
    }

    /// Number of members, including already-completed `SKIP_WAL` ones.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the round has no members at all.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Whether any member is still waiting on the round's flush.
    pub fn has_waiters(&self) -> bool {
        self.members.iter().any(|m| m.completer.is_some())
    }

    /// Highest offset appended into this round; the flush call covers the
    /// log up to here.
    pub fn last_offset(&self) -> u64 {
        self.last_offset
    }

    /// Record a member. Raises the required level to the member's level
    /// when stronger; a `SKIP_WAL` member never raises it.
    pub(crate) fn push(
        &mut self,
        offset: u64,
        level: DurabilityLevel,
        completer: Option<Completer>,
    ) {
        debug_assert_eq!(self.state, RoundState::Open, "cannot join a closed round");
        self.required = self.required.max(level);
        self.last_offset = self.last_offset.max(offset);
        self.members.push(RoundMember { offset, completer });
    }

    /// Transition to `Flushing`; the round stops accepting members.
    pub(crate) fn begin_flush(&mut self) {
        debug_assert_eq!(self.state, RoundState::Open);
        self.state = RoundState::Flushing;
    }

    /// Close the round successfully, firing every waiting handle in the
    /// order its payload was appended.
    pub(crate) fn complete_all(&mut self) {
        for member in &self.members {
            if let Some(completer) = &member.completer {
                completer.complete(member.offset);
            }
        }
        self.state = RoundState::Closed;
    }

    /// Close the round as failed, failing every waiting handle. No handle
    /// is left unresolved.
    pub(crate) fn fail_all(&mut self, err: &WalError) {
        for member in &self.members {
            if let Some(completer) = &member.completer {
                completer.fail(err.clone());
            }
        }
        self.state = RoundState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::handle::WriteHandle;

    #[test]
    fn test_new_round_is_open_and_empty() {
        let round = FlushRound::new(1);
        assert_eq!(round.state(), RoundState::Open);
        assert!(round.is_empty());
        assert_eq!(round.required_level(), DurabilityLevel::SkipWal);
    }

    #[test]
    fn test_required_level_is_max_of_members() {
        let mut round = FlushRound::new(1);

        round.push(1, DurabilityLevel::AsyncWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::AsyncWal);

        round.push(2, DurabilityLevel::SyncWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::SyncWal);

        // A weaker member never lowers the requirement.
        round.push(3, DurabilityLevel::AsyncWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::SyncWal);
    }

    #[test]
    fn test_skip_wal_member_never_raises_requirement() {
        let mut round = FlushRound::new(1);
        round.push(1, DurabilityLevel::SkipWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::SkipWal);

        round.push(2, DurabilityLevel::AsyncWal, None);
        round.push(3, DurabilityLevel::SkipWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::AsyncWal);
    }

    #[test]
    fn test_fsync_member_always_raises_to_fsync() {
        let mut round = FlushRound::new(1);
        round.push(1, DurabilityLevel::SyncWal, None);
        round.push(2, DurabilityLevel::FsyncWal, None);
        assert_eq!(round.required_level(), DurabilityLevel::FsyncWal);
    }

    #[test]
    fn test_last_offset_tracks_highest_member() {
        let mut round = FlushRound::new(1);
        round.push(4, DurabilityLevel::AsyncWal, None);
        round.push(7, DurabilityLevel::AsyncWal, None);
        assert_eq!(round.last_offset(), 7);
    }

    #[test]
    fn test_complete_all_fires_handles_in_append_order() {
        let mut round = FlushRound::new(1);
        let (h1, c1) = WriteHandle::pending(1);
        let (h2, c2) = WriteHandle::pending(2);
        round.push(1, DurabilityLevel::SyncWal, Some(c1));
        round.push(2, DurabilityLevel::SyncWal, Some(c2));

        round.begin_flush();
        round.complete_all();

        assert_eq!(round.state(), RoundState::Closed);
        assert_eq!(h1.wait().unwrap(), 1);
        assert_eq!(h2.wait().unwrap(), 2);
    }

    #[test]
    fn test_fail_all_resolves_every_waiter() {
        let mut round = FlushRound::new(1);
        let (h1, c1) = WriteHandle::pending(1);
        let (h2, c2) = WriteHandle::pending(2);
        round.push(1, DurabilityLevel::SyncWal, Some(c1));
        round.push(2, DurabilityLevel::SyncWal, Some(c2));

        round.begin_flush();
        let err = WalError::WriteFailed("sync failed".into());
        round.fail_all(&err);

        assert_eq!(h1.wait().unwrap_err(), err);
        assert_eq!(h2.wait().unwrap_err(), err);
    }

    #[test]
    fn test_has_waiters_ignores_skip_wal_members() {
        let mut round = FlushRound::new(1);
        round.push(1, DurabilityLevel::SkipWal, None);
        assert!(!round.has_waiters());

        let (_h, c) = WriteHandle::pending(2);
        round.push(2, DurabilityLevel::AsyncWal, Some(c));
        assert!(round.has_waiters());
    }
}
