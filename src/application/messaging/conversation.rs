//! Per-submitter conversation state

use std::collections::HashSet;
use std::sync::Mutex;

use crate::domain::entities::UserId;

/// Where a submitter is in the add-phrase dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingPhrase,
}

/// Submitters whose next text message is a phrase submission.
///
/// Unseen submitters are `Idle`. Check-and-clear happens under one lock, so
/// two concurrent events from the same submitter cannot both consume a
/// pending flag.
#[derive(Debug, Default)]
pub struct ConversationStates {
    awaiting: Mutex<HashSet<UserId>>,
}

impl ConversationStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, user_id: UserId) -> ConversationState {
        if self.lock().contains(&user_id) {
            ConversationState::AwaitingPhrase
        } else {
            ConversationState::Idle
        }
    }

    /// Idle -> AwaitingPhrase
    pub fn begin_capture(&self, user_id: UserId) {
        self.lock().insert(user_id);
    }

    /// Clears the flag, returning whether it was set
    pub fn take_awaiting(&self, user_id: UserId) -> bool {
        self.lock().remove(&user_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<UserId>> {
        // a set of flags has no invariant a panicking holder could break
        self.awaiting.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
