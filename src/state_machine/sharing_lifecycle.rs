// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cross-Account Sharing Lifecycle
//!
//! # States
//!
//! - NotShared: resource exists only for its owner
//! - Shared: a share grant lists the consumer accounts
//! - TagsRequested: a tag request record was written to the output bus
//! - TagsApplied: the deferred applier copied the tags (terminal)
//!
//! # Inputs
//!
//! - GrantIssued: NotShared → Shared (needs at least one consumer)
//! - TagRequestEmitted: Shared → TagsRequested
//! - TagsApplied: TagsRequested → TagsApplied
//!
//! The builder drives the first two transitions during the networks phase.
//! The last one belongs to the tag applier, which runs with authority in the
//! consumer accounts.

use std::fmt;

use super::{StateMachine, TransitionError, TransitionResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingState {
    NotShared,
    Shared { consumers: usize },
    TagsRequested,
    TagsApplied,
}

impl fmt::Display for SharingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SharingState::NotShared => f.write_str("NotShared"),
            SharingState::Shared { consumers } => write!(f, "Shared({} consumers)", consumers),
            SharingState::TagsRequested => f.write_str("TagsRequested"),
            SharingState::TagsApplied => f.write_str("TagsApplied"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingInput {
    GrantIssued { consumers: usize },
    TagRequestEmitted,
    TagsApplied,
}

impl SharingInput {
    fn target(&self) -> SharingState {
        match *self {
            SharingInput::GrantIssued { consumers } => SharingState::Shared { consumers },
            SharingInput::TagRequestEmitted => SharingState::TagsRequested,
            SharingInput::TagsApplied => SharingState::TagsApplied,
        }
    }
}

impl StateMachine for SharingState {
    type Input = SharingInput;
    type Output = ();

    fn transition(&self, input: &Self::Input) -> TransitionResult<(Self, Self::Output)> {
        match (self, input) {
            (SharingState::NotShared, SharingInput::GrantIssued { consumers: 0 }) => Err(
                TransitionError::PreconditionFailed("a share grant needs at least one consumer".to_string()),
            ),
            (SharingState::NotShared, SharingInput::GrantIssued { consumers }) => {
                Ok((SharingState::Shared { consumers: *consumers }, ()))
            }
            (SharingState::Shared { .. }, SharingInput::TagRequestEmitted) => {
                Ok((SharingState::TagsRequested, ()))
            }
            (SharingState::TagsRequested, SharingInput::TagsApplied) => {
                Ok((SharingState::TagsApplied, ()))
            }
            (from, input) => Err(TransitionError::InvalidTransition {
                from: from.to_string(),
                to: input.target().to_string(),
            }),
        }
    }

    fn is_terminal(&self) -> bool {
        matches!(self, SharingState::TagsApplied)
    }
}
