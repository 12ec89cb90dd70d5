//! Manual status transitions
//!
//! Automatic escalation follows [`TicketStatus::next_escalation`]. Everything a
//! person does to a ticket's status is one of the [`ManualTransition`]s below
//! and is checked by [`apply_manual`].

use eqms_db::TicketStatus;

use crate::error::{ControlError, ControlResult};

/// A status change requested by a person
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualTransition {
    /// Hand the ticket to an agent or manager
    Assign,
    /// Begin work
    Start,
    /// Resolve with a non-empty note
    Resolve { resolution: String },
    /// Move one tier up immediately
    Escalate,
    /// Close (administrators only)
    Close,
    /// Return a resolved or closed ticket to `new` (administrators only)
    Reopen,
}

impl ManualTransition {
    /// Classify a raw status assignment
    ///
    /// Escalated targets are only accepted as the next tier up from `current`.
    pub fn classify(
        current: TicketStatus,
        target: TicketStatus,
        resolution: Option<&str>,
    ) -> ControlResult<Self> {
        let transition = match target {
            TicketStatus::Assigned => ManualTransition::Assign,
            TicketStatus::InProgress => ManualTransition::Start,
            TicketStatus::Resolved => ManualTransition::Resolve {
                resolution: resolution.unwrap_or_default().to_string(),
            },
            TicketStatus::Closed => ManualTransition::Close,
            TicketStatus::New => ManualTransition::Reopen,
            TicketStatus::EscalatedTier1
            | TicketStatus::EscalatedTier2
            | TicketStatus::EscalatedTier3 => {
                if manual_escalation(current) == Some(target) {
                    ManualTransition::Escalate
                } else {
                    return Err(ControlError::InvalidTransition {
                        from: current,
                        to: target,
                    });
                }
            }
        };

        Ok(transition)
    }
}

/// Next tier for a manual escalation
///
/// Differs from the automatic chain in that `assigned` and `in_progress`
/// tickets can be pushed to tier 1.
pub fn manual_escalation(current: TicketStatus) -> Option<TicketStatus> {
    match current {
        TicketStatus::New | TicketStatus::Assigned | TicketStatus::InProgress => {
            Some(TicketStatus::EscalatedTier1)
        }
        TicketStatus::EscalatedTier1 => Some(TicketStatus::EscalatedTier2),
        TicketStatus::EscalatedTier2 => Some(TicketStatus::EscalatedTier3),
        TicketStatus::EscalatedTier3 | TicketStatus::Resolved | TicketStatus::Closed => None,
    }
}

/// Validate `transition` against `current` and return the resulting status
pub fn apply_manual(
    current: TicketStatus,
    transition: &ManualTransition,
) -> ControlResult<TicketStatus> {
    let invalid = |to| ControlError::InvalidTransition { from: current, to };

    match transition {
        ManualTransition::Assign => {
            if current.is_terminal() {
                return Err(invalid(TicketStatus::Assigned));
            }
            Ok(TicketStatus::Assigned)
        }
        ManualTransition::Start => {
            if current.is_terminal() {
                return Err(invalid(TicketStatus::InProgress));
            }
            Ok(TicketStatus::InProgress)
        }
        ManualTransition::Resolve { resolution } => {
            if resolution.trim().is_empty() {
                return Err(ControlError::Validation(
                    "A resolution note is required to resolve a ticket".to_string(),
                ));
            }
            if current == TicketStatus::Closed {
                return Err(invalid(TicketStatus::Resolved));
            }
            Ok(TicketStatus::Resolved)
        }
        ManualTransition::Escalate => match manual_escalation(current) {
            Some(next) => Ok(next),
            None => Err(invalid(
                current
                    .next_escalation()
                    .unwrap_or(TicketStatus::EscalatedTier3),
            )),
        },
        ManualTransition::Close => {
            if current == TicketStatus::Closed {
                return Err(invalid(TicketStatus::Closed));
            }
            Ok(TicketStatus::Closed)
        }
        ManualTransition::Reopen => {
            if !current.is_terminal() {
                return Err(invalid(TicketStatus::New));
            }
            Ok(TicketStatus::New)
        }
    }
}
