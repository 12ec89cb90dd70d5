//! Access policy
//!
//! Every mutation entry point asks [`authorize`] (or [`Actor::authorize`])
//! before touching the store. The decision depends only on the caller's role,
//! the action and the caller's relationship to the ticket.

use eqms_db::{TicketStatus, UserRole};
use uuid::Uuid;

use crate::error::ControlError;

/// Something a caller wants to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    ViewTicket,
    CreateTicket,
    EditTicketDetails,
    /// Set the ticket's status to the given target
    ChangeStatus(TicketStatus),
    ChangePriority,
    AssignTicket,
    EscalateTicket,
    DeleteTicket,
    CommentTicket,
    ViewInternalComments,
    ManageSlaConfigs,
    ViewSlaConfigs,
    ManageTierAssignments,
    ManageUsers,
    ViewUsers,
    ManageSbus,
    SendEmail,
    ViewAnalytics,
}

/// Caller's relationship to the ticket being acted on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership {
    pub is_creator: bool,
    pub is_assignee: bool,
    /// Caller holds a tier assignment in the ticket's SBU
    pub in_sbu_roster: bool,
}

impl Ownership {
    /// No relationship (used for actions not tied to a ticket)
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    /// Turn a denial into [`ControlError::Forbidden`]
    pub fn into_result(self, action: Action) -> Result<(), ControlError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(ControlError::Forbidden(format!(
                "not permitted to perform {:?}",
                action
            ))),
        }
    }
}

impl From<bool> for Decision {
    fn from(allowed: bool) -> Self {
        if allowed {
            Decision::Allow
        } else {
            Decision::Deny
        }
    }
}

/// Who is performing an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// A signed-in user
    User { id: Uuid, role: UserRole },
    /// The escalation scheduler
    System,
}

impl Actor {
    pub fn user(id: Uuid, role: UserRole) -> Self {
        Actor::User { id, role }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Actor::User { id, .. } => Some(*id),
            Actor::System => None,
        }
    }

    pub fn role(&self) -> Option<UserRole> {
        match self {
            Actor::User { role, .. } => Some(*role),
            Actor::System => None,
        }
    }

    pub fn authorize(&self, action: Action, ownership: Ownership) -> Decision {
        match self {
            Actor::User { role, .. } => authorize(*role, action, ownership),
            // The scheduler only ever escalates
            Actor::System => matches!(
                action,
                Action::ChangeStatus(
                    TicketStatus::EscalatedTier1
                        | TicketStatus::EscalatedTier2
                        | TicketStatus::EscalatedTier3
                )
            )
            .into(),
        }
    }

    /// Like [`authorize`](Self::authorize), returning `Forbidden` on denial
    pub fn require(&self, action: Action, ownership: Ownership) -> Result<(), ControlError> {
        self.authorize(action, ownership).into_result(action)
    }
}

/// Close and reopen are reserved for administrators
fn is_admin_only_target(target: TicketStatus) -> bool {
    matches!(target, TicketStatus::Closed | TicketStatus::New)
}

/// Decide whether `role` may perform `action` given `ownership`
pub fn authorize(role: UserRole, action: Action, ownership: Ownership) -> Decision {
    let allowed = match role {
        UserRole::Admin => true,

        UserRole::Manager => match action {
            Action::DeleteTicket | Action::ManageUsers | Action::ManageSbus => false,
            Action::ChangeStatus(target) => !is_admin_only_target(target),
            _ => true,
        },

        UserRole::Agent => {
            let works_ticket = ownership.is_assignee || ownership.in_sbu_roster;
            match action {
                Action::ViewTicket | Action::CommentTicket | Action::ViewInternalComments => {
                    works_ticket
                }
                Action::EscalateTicket => works_ticket,
                Action::ChangeStatus(target) => {
                    ownership.is_assignee && !is_admin_only_target(target)
                }
                Action::ChangePriority | Action::EditTicketDetails => ownership.is_assignee,
                // Hand-off within the SBU roster; the gateway checks the new assignee
                Action::AssignTicket => ownership.is_assignee && ownership.in_sbu_roster,
                Action::CreateTicket
                | Action::ViewSlaConfigs
                | Action::ViewUsers
                | Action::SendEmail => true,
                Action::DeleteTicket
                | Action::ManageSlaConfigs
                | Action::ManageTierAssignments
                | Action::ManageUsers
                | Action::ManageSbus
                | Action::ViewAnalytics => false,
            }
        }

        UserRole::User => match action {
            Action::CreateTicket => true,
            Action::ViewTicket | Action::CommentTicket | Action::EditTicketDetails => {
                ownership.is_creator
            }
            Action::ChangeStatus(_)
            | Action::ChangePriority
            | Action::AssignTicket
            | Action::EscalateTicket
            | Action::DeleteTicket
            | Action::ViewInternalComments
            | Action::ManageSlaConfigs
            | Action::ViewSlaConfigs
            | Action::ManageTierAssignments
            | Action::ManageUsers
            | Action::ViewUsers
            | Action::ManageSbus
            | Action::SendEmail
            | Action::ViewAnalytics => false,
        },
    };

    allowed.into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSIGNEE: Ownership = Ownership {
        is_creator: false,
        is_assignee: true,
        in_sbu_roster: false,
    };
    const ROSTERED: Ownership = Ownership {
        is_creator: false,
        is_assignee: false,
        in_sbu_roster: true,
    };
    const CREATOR: Ownership = Ownership {
        is_creator: true,
        is_assignee: false,
        in_sbu_roster: false,
    };

    #[test]
    fn test_admin_allowed_everything() {
        for action in [
            Action::DeleteTicket,
            Action::ManageUsers,
            Action::ManageSbus,
            Action::ChangeStatus(TicketStatus::Closed),
            Action::ChangeStatus(TicketStatus::New),
        ] {
            assert!(authorize(UserRole::Admin, action, Ownership::none()).is_allowed());
        }
    }

    #[test]
    fn test_manager_restrictions() {
        let none = Ownership::none();
        assert!(authorize(UserRole::Manager, Action::ManageSlaConfigs, none).is_allowed());
        assert!(authorize(UserRole::Manager, Action::AssignTicket, none).is_allowed());
        assert!(!authorize(UserRole::Manager, Action::DeleteTicket, none).is_allowed());
        assert!(!authorize(UserRole::Manager, Action::ManageUsers, none).is_allowed());
        assert!(!authorize(
            UserRole::Manager,
            Action::ChangeStatus(TicketStatus::Closed),
            none
        )
        .is_allowed());
        assert!(authorize(
            UserRole::Manager,
            Action::ChangeStatus(TicketStatus::Resolved),
            none
        )
        .is_allowed());
    }

    #[test]
    fn test_agent_priority_requires_assignment() {
        assert!(authorize(UserRole::Agent, Action::ChangePriority, ASSIGNEE).is_allowed());
        assert!(!authorize(UserRole::Agent, Action::ChangePriority, ROSTERED).is_allowed());
        assert!(!authorize(UserRole::Agent, Action::ChangePriority, Ownership::none()).is_allowed());
    }

    #[test]
    fn test_agent_hand_off_needs_assignment_and_roster() {
        let both = Ownership {
            is_creator: false,
            is_assignee: true,
            in_sbu_roster: true,
        };
        assert!(authorize(UserRole::Agent, Action::AssignTicket, both).is_allowed());
        assert!(!authorize(UserRole::Agent, Action::AssignTicket, ASSIGNEE).is_allowed());
        assert!(!authorize(UserRole::Agent, Action::AssignTicket, ROSTERED).is_allowed());
    }

    #[test]
    fn test_agent_roster_grants_view_and_escalate() {
        assert!(authorize(UserRole::Agent, Action::ViewTicket, ROSTERED).is_allowed());
        assert!(authorize(UserRole::Agent, Action::EscalateTicket, ROSTERED).is_allowed());
        assert!(!authorize(
            UserRole::Agent,
            Action::ChangeStatus(TicketStatus::InProgress),
            ROSTERED
        )
        .is_allowed());
        assert!(!authorize(UserRole::Agent, Action::ViewTicket, Ownership::none()).is_allowed());
    }

    #[test]
    fn test_agent_cannot_close_or_manage_policy() {
        assert!(!authorize(
            UserRole::Agent,
            Action::ChangeStatus(TicketStatus::Closed),
            ASSIGNEE
        )
        .is_allowed());
        assert!(!authorize(UserRole::Agent, Action::ManageSlaConfigs, ASSIGNEE).is_allowed());
        assert!(authorize(UserRole::Agent, Action::ViewSlaConfigs, Ownership::none()).is_allowed());
    }

    #[test]
    fn test_user_sees_only_own_tickets() {
        assert!(authorize(UserRole::User, Action::CreateTicket, Ownership::none()).is_allowed());
        assert!(authorize(UserRole::User, Action::ViewTicket, CREATOR).is_allowed());
        assert!(!authorize(UserRole::User, Action::ViewTicket, Ownership::none()).is_allowed());
        assert!(!authorize(UserRole::User, Action::ViewInternalComments, CREATOR).is_allowed());
        assert!(!authorize(UserRole::User, Action::ManageSlaConfigs, CREATOR).is_allowed());
    }

    #[test]
    fn test_system_actor_only_escalates() {
        let system = Actor::System;
        assert!(system
            .authorize(
                Action::ChangeStatus(TicketStatus::EscalatedTier2),
                Ownership::none()
            )
            .is_allowed());
        assert!(!system
            .authorize(
                Action::ChangeStatus(TicketStatus::Resolved),
                Ownership::none()
            )
            .is_allowed());
        assert!(matches!(
            system.require(Action::DeleteTicket, Ownership::none()),
            Err(ControlError::Forbidden(_))
        ));
    }
}
