// Copyright (c) 2025 - Cowboy AI, Inc.
//! Lifecycle tracking for shared resources
//!
//! A shared subnet or security group moves through the sharing lifecycle in
//! two processes: the networks phase grants the share and writes the tag
//! request, and the tag applier later runs in each consumer account. Both
//! record their steps through [`StateMachineWithHistory`], so a tagging
//! summary can say how far each resource got.
//!
//! Transitions never touch the bus or the cloud. The caller writes the record
//! or applies the tags first and then feeds the matching input.
//!
//! # Example
//!
//! ```rust
//! use cim_landing_zone::state_machine::{StateMachine, StateMachineWithHistory};
//! use cim_landing_zone::state_machine::sharing_lifecycle::{SharingInput, SharingState};
//! use chrono::{TimeZone, Utc};
//!
//! let at = Utc.with_ymd_and_hms(2026, 1, 19, 12, 0, 0).unwrap();
//! let mut share = StateMachineWithHistory::new(SharingState::NotShared);
//! share.transition_with_history(SharingInput::GrantIssued { consumers: 2 }, at).unwrap();
//! share.transition_with_history(SharingInput::TagRequestEmitted, at).unwrap();
//! assert_eq!(*share.current_state(), SharingState::TagsRequested);
//! ```

pub mod sharing_lifecycle;

pub type TransitionResult<S> = Result<S, TransitionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    /// The input arrived out of order, e.g. tags applied before any request
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// e.g. a share grant naming no consumer accounts
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
}

/// A lifecycle state that knows which inputs move it forward
pub trait StateMachine: Sized + Clone {
    type Input;
    type Output;

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)>;

    fn can_transition(&self, input: &Self::Input) -> bool {
        self.transition(input).is_ok()
    }

    /// True once no input can move the resource any further
    fn is_terminal(&self) -> bool {
        false
    }
}

/// One recorded lifecycle step
#[derive(Debug, Clone)]
pub struct Transition<S, I> {
    pub from: S,
    pub to: S,
    pub input: I,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<S, I> Transition<S, I> {
    pub fn new(from: S, to: S, input: I, timestamp: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            from,
            to,
            input,
            timestamp,
        }
    }
}

/// Lifecycle of one shared resource plus the steps it took, stamped with the
/// run's timestamp
#[derive(Debug, Clone)]
pub struct StateMachineWithHistory<FSM: StateMachine> {
    pub current: FSM,
    pub history: Vec<Transition<FSM, FSM::Input>>,
}

impl<FSM: StateMachine> StateMachineWithHistory<FSM> {
    pub fn new(initial: FSM) -> Self {
        Self {
            current: initial,
            history: Vec::new(),
        }
    }

    /// Apply `input`; a rejected input leaves state and history untouched
    pub fn transition_with_history(
        &mut self,
        input: FSM::Input,
        timestamp: chrono::DateTime<chrono::Utc>,
    ) -> TransitionResult<FSM::Output>
    where
        FSM::Input: Clone,
    {
        let from = self.current.clone();
        let (to, output) = self.current.transition(&input)?;

        self.history
            .push(Transition::new(from, to.clone(), input, timestamp));

        self.current = to;
        Ok(output)
    }

    pub fn get_history(&self) -> &[Transition<FSM, FSM::Input>] {
        &self.history
    }

    pub fn current_state(&self) -> &FSM {
        &self.current
    }
}
