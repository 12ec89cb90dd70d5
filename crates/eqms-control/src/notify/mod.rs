//! Notification email
//!
//! Sends are fire-and-forget: recipients are resolved and the message is
//! delivered inside a spawned task, at most once, and failures are only
//! logged.

pub mod mailer;
pub mod templates;

pub use mailer::{EmailMessage, LogMailer, MailError, Mailer, MailerConfig, RelayMailer};
pub use templates::{EmailTemplate, RenderedEmail, TemplateContext};

use std::collections::BTreeSet;
use std::sync::Arc;

use eqms_db::entities::{sbu, ticket, tier_assignment, user, user_profile};
use eqms_db::{TicketStatus, UserRole};
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use tracing::{debug, error, warn};
use uuid::Uuid;

/// What happened to a ticket, from the point of view of who should hear about it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketNotice {
    Created,
    Assigned,
    StatusChanged(TicketStatus),
    PriorityChanged,
}

impl TicketNotice {
    pub fn template(&self) -> EmailTemplate {
        match self {
            TicketNotice::Created => EmailTemplate::TicketCreated,
            TicketNotice::Assigned => EmailTemplate::TicketAssigned,
            TicketNotice::StatusChanged(status) => EmailTemplate::for_status(*status),
            TicketNotice::PriorityChanged => EmailTemplate::PriorityChanged,
        }
    }
}

/// Who receives a notice
#[derive(Debug, Clone, PartialEq, Eq)]
enum Audience {
    /// A single user, if present
    User(Option<Uuid>),
    /// Roster of a tier within an SBU, falling back to the SBU's agents
    Tier(Uuid, eqms_db::Tier),
    /// Agents affiliated to an SBU
    SbuAgents(Uuid),
}

fn audience_for(notice: TicketNotice, ticket: &ticket::Model) -> Audience {
    match notice {
        TicketNotice::Created => Audience::SbuAgents(ticket.sbu_id),
        TicketNotice::Assigned | TicketNotice::PriorityChanged => {
            Audience::User(ticket.assigned_to)
        }
        TicketNotice::StatusChanged(status) => match status.escalation_tier() {
            Some(tier) => Audience::Tier(ticket.sbu_id, tier),
            None if status == TicketStatus::Assigned => Audience::User(ticket.assigned_to),
            None => Audience::User(Some(ticket.created_by)),
        },
    }
}

/// Resolves recipients and dispatches notification email
#[derive(Clone)]
pub struct Notifier {
    db: DatabaseConnection,
    mailer: Arc<dyn Mailer>,
}

impl Notifier {
    pub fn new(db: DatabaseConnection, mailer: Arc<dyn Mailer>) -> Self {
        Self { db, mailer }
    }

    /// Email addresses that should hear about `notice`
    pub async fn recipients(
        &self,
        notice: TicketNotice,
        ticket: &ticket::Model,
    ) -> Result<Vec<String>, DbErr> {
        let user_ids: Vec<Uuid> = match audience_for(notice, ticket) {
            Audience::User(Some(id)) => vec![id],
            Audience::User(None) => Vec::new(),
            Audience::Tier(sbu_id, tier) => {
                let roster: Vec<Uuid> = tier_assignment::Entity::find()
                    .filter(tier_assignment::Column::SbuId.eq(sbu_id))
                    .filter(tier_assignment::Column::Tier.eq(tier))
                    .all(&self.db)
                    .await?
                    .into_iter()
                    .map(|row| row.user_id)
                    .collect();

                if roster.is_empty() {
                    debug!(sbu_id = %sbu_id, tier = %tier, "Empty tier roster, notifying SBU agents");
                    self.sbu_agents(sbu_id).await?
                } else {
                    roster
                }
            }
            Audience::SbuAgents(sbu_id) => self.sbu_agents(sbu_id).await?,
        };

        self.active_emails(&user_ids).await
    }

    async fn sbu_agents(&self, sbu_id: Uuid) -> Result<Vec<Uuid>, DbErr> {
        Ok(user_profile::Entity::find()
            .filter(user_profile::Column::SbuId.eq(sbu_id))
            .filter(user_profile::Column::Role.eq(UserRole::Agent))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|profile| profile.user_id)
            .collect())
    }

    async fn active_emails(&self, user_ids: &[Uuid]) -> Result<Vec<String>, DbErr> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let emails: BTreeSet<String> = user::Entity::find()
            .filter(user::Column::Id.is_in(user_ids.iter().copied()))
            .filter(user::Column::IsActive.eq(true))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|u| u.email)
            .collect();

        Ok(emails.into_iter().collect())
    }

    async fn context_for(&self, ticket: &ticket::Model) -> Result<TemplateContext, DbErr> {
        let sbu_name = sbu::Entity::find_by_id(ticket.sbu_id)
            .one(&self.db)
            .await?
            .map(|s| s.name);

        let assignee_name = match ticket.assigned_to {
            Some(id) => user_profile::Entity::find_by_id(id)
                .one(&self.db)
                .await?
                .and_then(|p| p.full_name),
            None => None,
        };

        Ok(TemplateContext {
            ticket_id: ticket.id,
            title: ticket.title.clone(),
            status: ticket.status,
            priority: ticket.priority,
            sbu_name,
            assignee_name,
            resolution: ticket.resolution.clone(),
        })
    }

    async fn deliver(&self, notice: TicketNotice, ticket: &ticket::Model) -> Result<(), MailError> {
        let recipients = match self.recipients(notice, ticket).await {
            Ok(r) => r,
            Err(e) => {
                error!(ticket_id = %ticket.id, "Failed to resolve notification recipients: {}", e);
                return Ok(());
            }
        };

        if recipients.is_empty() {
            debug!(ticket_id = %ticket.id, ?notice, "No recipients for notification");
            return Ok(());
        }

        let ctx = match self.context_for(ticket).await {
            Ok(ctx) => ctx,
            Err(e) => {
                error!(ticket_id = %ticket.id, "Failed to load notification context: {}", e);
                return Ok(());
            }
        };

        let rendered = notice.template().render(&ctx);
        self.mailer
            .send(&EmailMessage {
                to: recipients,
                subject: rendered.subject,
                html: rendered.html,
            })
            .await
    }

    /// Notify the audience of `notice` in a spawned task
    pub fn notify(&self, notice: TicketNotice, ticket: ticket::Model) {
        let notifier = self.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.deliver(notice, &ticket).await {
                warn!(ticket_id = %ticket.id, ?notice, "Notification email failed: {}", e);
            }
        });
    }

    /// Render `template` and send it to explicit recipients in a spawned task
    pub fn send_template(&self, to: Vec<String>, template: EmailTemplate, ctx: TemplateContext) {
        let mailer = self.mailer.clone();
        tokio::spawn(async move {
            let rendered = template.render(&ctx);
            let message = EmailMessage {
                to,
                subject: rendered.subject,
                html: rendered.html,
            };
            if let Err(e) = mailer.send(&message).await {
                warn!(ticket_id = %ctx.ticket_id, ?template, "Email failed: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use eqms_db::TicketPriority;

    fn ticket_with(status: TicketStatus, assignee: Option<Uuid>) -> ticket::Model {
        let now = Utc::now();
        ticket::Model {
            id: Uuid::new_v4(),
            title: "t".to_string(),
            description: "d".to_string(),
            status,
            priority: TicketPriority::Medium,
            sbu_id: Uuid::new_v4(),
            created_by: Uuid::new_v4(),
            assigned_to: assignee,
            sla_time: 0,
            resolution: None,
            card_number: None,
            module: None,
            account_number: None,
            query_type: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_routing() {
        let assignee = Uuid::new_v4();
        let t = ticket_with(TicketStatus::Assigned, Some(assignee));

        assert_eq!(
            audience_for(TicketNotice::Assigned, &t),
            Audience::User(Some(assignee))
        );
        assert_eq!(
            audience_for(TicketNotice::StatusChanged(TicketStatus::Resolved), &t),
            Audience::User(Some(t.created_by))
        );
        assert_eq!(
            audience_for(TicketNotice::StatusChanged(TicketStatus::New), &t),
            Audience::User(Some(t.created_by))
        );
        assert_eq!(
            audience_for(
                TicketNotice::StatusChanged(TicketStatus::EscalatedTier3),
                &t
            ),
            Audience::Tier(t.sbu_id, eqms_db::Tier::Tier3)
        );
        assert_eq!(
            audience_for(TicketNotice::Created, &t),
            Audience::SbuAgents(t.sbu_id)
        );
    }

    #[test]
    fn test_priority_change_without_assignee_has_no_audience() {
        let t = ticket_with(TicketStatus::New, None);
        assert_eq!(
            audience_for(TicketNotice::PriorityChanged, &t),
            Audience::User(None)
        );
    }
}
