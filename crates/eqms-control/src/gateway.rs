//! Ticket update gateway
//!
//! All writes to a ticket's status, priority, assignee and resolution go
//! through [`TicketGateway`]. It checks the access policy, validates the
//! transition, re-stamps `sla_time` from the policy table, persists, publishes
//! a change event and queues notification email.

use chrono::Utc;
use eqms_db::entities::{sbu, ticket, tier_assignment, user, user_profile};
use eqms_db::{SbuStatus, TicketPriority, TicketStatus, UserRole};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, Set,
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::{Action, Actor, Ownership};
use crate::error::{ControlError, ControlResult};
use crate::events::{EventBus, TicketEvent, TicketEventKind};
use crate::notify::{Notifier, TicketNotice};
use crate::policy_table::find_policy;
use crate::status::{apply_manual, ManualTransition};

/// Requested changes to the gateway-owned fields of a ticket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketUpdate {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assignee: Option<Uuid>,
    pub resolution: Option<String>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.assignee.is_none()
            && self.resolution.is_none()
    }
}

/// Free-text fields editable outside the status machine
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketDetails {
    pub title: Option<String>,
    pub description: Option<String>,
    pub card_number: Option<String>,
    pub module: Option<String>,
    pub account_number: Option<String>,
    pub query_type: Option<String>,
}

impl TicketDetails {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.card_number.is_none()
            && self.module.is_none()
            && self.account_number.is_none()
            && self.query_type.is_none()
    }
}

/// A ticket to be created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub priority: TicketPriority,
    pub sbu_id: Uuid,
    pub card_number: Option<String>,
    pub module: Option<String>,
    pub account_number: Option<String>,
    pub query_type: Option<String>,
}

fn require_text(field: &str, value: &str) -> ControlResult<()> {
    if value.trim().is_empty() {
        return Err(ControlError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

/// The single mutation surface for tickets
#[derive(Clone)]
pub struct TicketGateway {
    db: DatabaseConnection,
    events: EventBus,
    notifier: Notifier,
}

impl TicketGateway {
    pub fn new(db: DatabaseConnection, events: EventBus, notifier: Notifier) -> Self {
        Self {
            db,
            events,
            notifier,
        }
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Load a ticket or fail with `NotFound`
    pub async fn load(&self, ticket_id: Uuid) -> ControlResult<ticket::Model> {
        ticket::Entity::find_by_id(ticket_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("Ticket '{}'", ticket_id)))
    }

    /// The actor's relationship to `ticket`
    pub async fn ownership(&self, actor: &Actor, ticket: &ticket::Model) -> ControlResult<Ownership> {
        let Some(user_id) = actor.user_id() else {
            return Ok(Ownership::none());
        };

        let in_sbu_roster = tier_assignment::Entity::find()
            .filter(tier_assignment::Column::UserId.eq(user_id))
            .filter(tier_assignment::Column::SbuId.eq(ticket.sbu_id))
            .count(&self.db)
            .await?
            > 0;

        Ok(Ownership {
            is_creator: ticket.created_by == user_id,
            is_assignee: ticket.assigned_to == Some(user_id),
            in_sbu_roster,
        })
    }

    /// Load a ticket the actor is allowed to see
    pub async fn load_visible(&self, actor: &Actor, ticket_id: Uuid) -> ControlResult<ticket::Model> {
        let ticket = self.load(ticket_id).await?;
        let ownership = self.ownership(actor, &ticket).await?;
        actor.require(Action::ViewTicket, ownership)?;
        Ok(ticket)
    }

    /// Minutes allotted to `status` in `sbu_id`, if configured
    async fn stamp_for(&self, sbu_id: Uuid, status: TicketStatus) -> ControlResult<Option<i32>> {
        let policy = find_policy(&self.db, sbu_id, status).await?;
        if policy.is_none() {
            debug!(sbu_id = %sbu_id, status = %status, "No SLA config, keeping sla_time");
        }
        Ok(policy.map(|p| p.sla_time))
    }

    async fn check_assignee(&self, assignee: Uuid) -> ControlResult<()> {
        let account = user::Entity::find_by_id(assignee)
            .one(&self.db)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("User '{}'", assignee)))?;

        if !account.is_active {
            return Err(ControlError::Validation(
                "Cannot assign a ticket to an inactive user".to_string(),
            ));
        }

        let profile = account
            .find_related(user_profile::Entity)
            .one(&self.db)
            .await?;

        match profile {
            Some(p) if p.role.is_assignable() => Ok(()),
            _ => Err(ControlError::Validation(
                "Tickets can only be assigned to agents or managers".to_string(),
            )),
        }
    }

    /// Agents only hand tickets to colleagues rostered in the same SBU
    async fn check_roster(&self, assignee: Uuid, sbu_id: Uuid) -> ControlResult<()> {
        let rostered = tier_assignment::Entity::find()
            .filter(tier_assignment::Column::UserId.eq(assignee))
            .filter(tier_assignment::Column::SbuId.eq(sbu_id))
            .count(&self.db)
            .await?
            > 0;

        if !rostered {
            return Err(ControlError::Forbidden(
                "agents may only reassign within the SBU roster".to_string(),
            ));
        }
        Ok(())
    }

    /// Create a ticket, stamping its initial `sla_time` from the `(sbu, new)` config
    pub async fn create(&self, actor: &Actor, new: NewTicket) -> ControlResult<ticket::Model> {
        let created_by = actor
            .user_id()
            .ok_or_else(|| ControlError::Forbidden("tickets are created by users".to_string()))?;
        actor.require(Action::CreateTicket, Ownership::none())?;

        require_text("title", &new.title)?;
        require_text("description", &new.description)?;

        let unit = sbu::Entity::find_by_id(new.sbu_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ControlError::NotFound(format!("SBU '{}'", new.sbu_id)))?;
        if unit.status != SbuStatus::Active {
            return Err(ControlError::Validation(format!(
                "SBU '{}' is not accepting tickets",
                unit.name
            )));
        }

        let sla_time = self
            .stamp_for(unit.id, TicketStatus::New)
            .await?
            .unwrap_or(0);

        let now = Utc::now();
        let created = ticket::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(new.title.trim().to_string()),
            description: Set(new.description),
            status: Set(TicketStatus::New),
            priority: Set(new.priority),
            sbu_id: Set(unit.id),
            created_by: Set(created_by),
            assigned_to: Set(None),
            sla_time: Set(sla_time),
            resolution: Set(None),
            card_number: Set(new.card_number),
            module: Set(new.module),
            account_number: Set(new.account_number),
            query_type: Set(new.query_type),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await?;

        info!(ticket_id = %created.id, sbu_id = %created.sbu_id, sla_time, "Ticket created");

        self.events.publish(TicketEvent::new(
            TicketEventKind::Created,
            created.id,
            created.sbu_id,
            created.status,
        ));
        self.notifier.notify(TicketNotice::Created, created.clone());

        Ok(created)
    }

    /// Apply a status/priority/assignee/resolution change
    pub async fn update(
        &self,
        actor: &Actor,
        ticket_id: Uuid,
        update: TicketUpdate,
    ) -> ControlResult<ticket::Model> {
        if update.is_empty() {
            return Err(ControlError::Validation(
                "At least one of status, priority, assignee or resolution is required"
                    .to_string(),
            ));
        }
        self.edit(actor, ticket_id, TicketDetails::default(), update)
            .await
    }

    /// Apply detail edits and gateway-owned changes as one write
    ///
    /// Both parts are authorized and validated before anything is stored, so
    /// a rejected request leaves the ticket untouched.
    pub async fn edit(
        &self,
        actor: &Actor,
        ticket_id: Uuid,
        details: TicketDetails,
        update: TicketUpdate,
    ) -> ControlResult<ticket::Model> {
        let current = self.load(ticket_id).await?;
        if details.is_empty() && update.is_empty() {
            return Ok(current);
        }

        let ownership = self.ownership(actor, &current).await?;

        if !details.is_empty() {
            actor.require(Action::EditTicketDetails, ownership)?;
            if let Some(title) = &details.title {
                require_text("title", title)?;
            }
            if let Some(description) = &details.description {
                require_text("description", description)?;
            }
        }

        // Every named field is authorized, even when it would not change
        if update.assignee.is_some() {
            actor.require(Action::AssignTicket, ownership)?;
        }
        if let Some(priority) = update.priority {
            actor.require(Action::ChangePriority, ownership)?;
            debug!(ticket_id = %ticket_id, priority = %priority, "Priority requested");
        }

        let assignee_changed = match update.assignee {
            Some(assignee) if current.assigned_to != Some(assignee) => {
                self.check_assignee(assignee).await?;
                if actor.role() == Some(UserRole::Agent) {
                    self.check_roster(assignee, current.sbu_id).await?;
                }
                true
            }
            _ => false,
        };
        let assignee = if assignee_changed {
            update.assignee
        } else {
            current.assigned_to
        };

        // Assigning a fresh ticket moves it along unless a status was given
        let requested_status = match update.status {
            None if assignee_changed && current.status == TicketStatus::New => {
                Some(TicketStatus::Assigned)
            }
            other => other,
        };

        if let Some(target) = requested_status {
            actor.require(Action::ChangeStatus(target), ownership)?;
        } else if update.resolution.is_some() {
            actor.require(Action::EditTicketDetails, ownership)?;
        }

        // A resolve carries its own note; an earlier one does not count
        let next_status = match requested_status {
            Some(target) if target != current.status => {
                let transition = ManualTransition::classify(
                    current.status,
                    target,
                    update.resolution.as_deref(),
                )?;
                if transition == ManualTransition::Assign && assignee.is_none() {
                    return Err(ControlError::Validation(
                        "An assignee is required to mark a ticket assigned".to_string(),
                    ));
                }
                Some(apply_manual(current.status, &transition)?)
            }
            _ => None,
        };

        let priority_changed = matches!(update.priority, Some(p) if p != current.priority);

        let resolution = match next_status {
            Some(TicketStatus::New) => None,
            _ => update.resolution.clone().or_else(|| current.resolution.clone()),
        };
        let resolution_changed = resolution != current.resolution;

        if details.is_empty()
            && next_status.is_none()
            && !priority_changed
            && !assignee_changed
            && !resolution_changed
        {
            debug!(ticket_id = %ticket_id, "Update is a no-op");
            return Ok(current);
        }

        let mut active: ticket::ActiveModel = current.clone().into();

        if let Some(title) = details.title {
            active.title = Set(title.trim().to_string());
        }
        if let Some(description) = details.description {
            active.description = Set(description);
        }
        if let Some(card_number) = details.card_number {
            active.card_number = Set(Some(card_number));
        }
        if let Some(module) = details.module {
            active.module = Set(Some(module));
        }
        if let Some(account_number) = details.account_number {
            active.account_number = Set(Some(account_number));
        }
        if let Some(query_type) = details.query_type {
            active.query_type = Set(Some(query_type));
        }

        if let Some(status) = next_status {
            active.status = Set(status);
            if let Some(minutes) = self.stamp_for(current.sbu_id, status).await? {
                active.sla_time = Set(minutes);
            }
        }
        if priority_changed {
            if let Some(priority) = update.priority {
                active.priority = Set(priority);
            }
        }
        if assignee_changed {
            active.assigned_to = Set(assignee);
        }
        if resolution_changed {
            active.resolution = Set(resolution);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;

        info!(
            ticket_id = %updated.id,
            from = %current.status,
            to = %updated.status,
            sla_time = updated.sla_time,
            "Ticket updated"
        );

        self.events.publish(TicketEvent::new(
            TicketEventKind::Updated,
            updated.id,
            updated.sbu_id,
            updated.status,
        ));

        if assignee_changed {
            self.notifier.notify(TicketNotice::Assigned, updated.clone());
        }
        if let Some(status) = next_status {
            if !(assignee_changed && status == TicketStatus::Assigned) {
                self.notifier
                    .notify(TicketNotice::StatusChanged(status), updated.clone());
            }
        }
        if priority_changed {
            self.notifier
                .notify(TicketNotice::PriorityChanged, updated.clone());
        }

        Ok(updated)
    }

    /// Move a ticket one tier up on request
    pub async fn escalate(&self, actor: &Actor, ticket_id: Uuid) -> ControlResult<ticket::Model> {
        let current = self.load(ticket_id).await?;
        let ownership = self.ownership(actor, &current).await?;
        actor.require(Action::EscalateTicket, ownership)?;

        let next = apply_manual(current.status, &ManualTransition::Escalate)?;

        let mut active: ticket::ActiveModel = current.clone().into();
        active.status = Set(next);
        if let Some(minutes) = self.stamp_for(current.sbu_id, next).await? {
            active.sla_time = Set(minutes);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&self.db).await?;

        info!(ticket_id = %updated.id, from = %current.status, to = %next, "Ticket escalated manually");

        self.events.publish(TicketEvent::new(
            TicketEventKind::Updated,
            updated.id,
            updated.sbu_id,
            updated.status,
        ));
        self.notifier
            .notify(TicketNotice::StatusChanged(next), updated.clone());

        Ok(updated)
    }

    /// Escalate a breached ticket on behalf of the scheduler
    ///
    /// The write only lands if the ticket is still in `expected`. Returns
    /// `false` when another writer moved the ticket first.
    pub async fn escalate_breached(
        &self,
        ticket: &ticket::Model,
        expected: TicketStatus,
        next: TicketStatus,
    ) -> ControlResult<bool> {
        Actor::System.require(Action::ChangeStatus(next), Ownership::none())?;

        if expected.next_escalation() != Some(next) {
            return Err(ControlError::InvalidTransition {
                from: expected,
                to: next,
            });
        }

        let sla_time = self
            .stamp_for(ticket.sbu_id, next)
            .await?
            .unwrap_or(ticket.sla_time);

        let result = ticket::Entity::update_many()
            .set(ticket::ActiveModel {
                status: Set(next),
                sla_time: Set(sla_time),
                updated_at: Set(Utc::now()),
                ..Default::default()
            })
            .filter(ticket::Column::Id.eq(ticket.id))
            .filter(ticket::Column::Status.eq(expected))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            debug!(ticket_id = %ticket.id, expected = %expected, "Ticket moved before escalation");
            return Ok(false);
        }

        info!(ticket_id = %ticket.id, from = %expected, to = %next, sla_time, "SLA breached, ticket escalated");

        let escalated = ticket::Model {
            status: next,
            sla_time,
            ..ticket.clone()
        };

        self.events.publish(TicketEvent::new(
            TicketEventKind::Updated,
            escalated.id,
            escalated.sbu_id,
            escalated.status,
        ));
        self.notifier
            .notify(TicketNotice::StatusChanged(next), escalated);

        Ok(true)
    }

    /// Hard-delete a ticket
    pub async fn delete(&self, actor: &Actor, ticket_id: Uuid) -> ControlResult<()> {
        let current = self.load(ticket_id).await?;
        let ownership = self.ownership(actor, &current).await?;
        actor.require(Action::DeleteTicket, ownership)?;

        let (id, sbu_id, status) = (current.id, current.sbu_id, current.status);
        current.delete(&self.db).await?;

        info!(ticket_id = %id, "Ticket deleted");
        self.events.publish(TicketEvent::new(
            TicketEventKind::Deleted,
            id,
            sbu_id,
            status,
        ));

        Ok(())
    }
}
