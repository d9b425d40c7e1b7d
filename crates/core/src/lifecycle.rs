//! Identity client lifecycle state machine

use crate::error::IdentityError;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Phase of an identity client instance
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IdentityPhase {
    Uninitialized,
    Initializing,
    Authenticated,
    Renewing,
    /// Terminal for the session; only an explicit login re-enters `Initializing`
    Anonymous,
}

impl fmt::Display for IdentityPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Authenticated => "authenticated",
            Self::Renewing => "renewing",
            Self::Anonymous => "anonymous",
        };
        f.write_str(name)
    }
}

impl IdentityPhase {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: IdentityPhase) -> bool {
        use IdentityPhase::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Anonymous, Initializing)
                | (Initializing, Authenticated)
                | (Initializing, Anonymous)
                | (Authenticated, Renewing)
                | (Authenticated, Anonymous)
                | (Renewing, Authenticated)
                | (Renewing, Anonymous)
        )
    }
}

/// Thread-safe holder enforcing [`IdentityPhase`] transitions
#[derive(Debug)]
pub struct PhaseTracker {
    phase: Mutex<IdentityPhase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            phase: Mutex::new(IdentityPhase::Uninitialized),
        }
    }

    pub fn get(&self) -> IdentityPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&self, next: IdentityPhase) -> Result<IdentityPhase, IdentityError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        let current = *phase;
        if !current.can_transition_to(next) {
            return Err(IdentityError::InvalidState(format!(
                "cannot move from {current} to {next}"
            )));
        }
        debug!("Identity client {} -> {}", current, next);
        *phase = next;
        Ok(current)
    }

    /// Move to `next` only if currently in `expected`
    pub fn transition_from(
        &self,
        expected: IdentityPhase,
        next: IdentityPhase,
    ) -> Result<(), IdentityError> {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != expected || !expected.can_transition_to(next) {
            return Err(IdentityError::InvalidState(format!(
                "cannot move from {} to {next}",
                *phase
            )));
        }
        debug!("Identity client {} -> {}", expected, next);
        *phase = next;
        Ok(())
    }

    /// Drop to `Anonymous` from any phase
    pub fn reset_to_anonymous(&self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if *phase != IdentityPhase::Anonymous {
            debug!("Identity client {} -> anonymous", *phase);
            *phase = IdentityPhase::Anonymous;
        }
    }
}
