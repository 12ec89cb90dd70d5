//! Email templates keyed by ticket event

use eqms_db::{TicketPriority, TicketStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum EmailTemplate {
    TicketCreated,
    TicketAssigned,
    TicketInProgress,
    TicketEscalated,
    TicketResolved,
    TicketClosed,
    TicketReopened,
    PriorityChanged,
}

impl EmailTemplate {
    /// Template announcing a move into `status`
    pub fn for_status(status: TicketStatus) -> Self {
        match status {
            TicketStatus::New => EmailTemplate::TicketReopened,
            TicketStatus::Assigned => EmailTemplate::TicketAssigned,
            TicketStatus::InProgress => EmailTemplate::TicketInProgress,
            TicketStatus::EscalatedTier1
            | TicketStatus::EscalatedTier2
            | TicketStatus::EscalatedTier3 => EmailTemplate::TicketEscalated,
            TicketStatus::Resolved => EmailTemplate::TicketResolved,
            TicketStatus::Closed => EmailTemplate::TicketClosed,
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct TemplateContext {
    pub ticket_id: Uuid,
    pub title: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    #[serde(default)]
    pub sbu_name: Option<String>,
    #[serde(default)]
    pub assignee_name: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn short_id(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

impl EmailTemplate {
    pub fn render(&self, ctx: &TemplateContext) -> RenderedEmail {
        let reference = short_id(&ctx.ticket_id);
        let title = escape_html(&ctx.title);
        let sbu = ctx
            .sbu_name
            .as_deref()
            .map(escape_html)
            .unwrap_or_else(|| "your service unit".to_string());

        let (subject, lead) = match self {
            EmailTemplate::TicketCreated => (
                format!("New ticket #{}: {}", reference, ctx.title),
                format!("A new ticket has been raised for {}.", sbu),
            ),
            EmailTemplate::TicketAssigned => (
                format!("Ticket #{} assigned to you", reference),
                match ctx.assignee_name.as_deref() {
                    Some(name) => format!("This ticket is now assigned to {}.", escape_html(name)),
                    None => "This ticket has been assigned to you.".to_string(),
                },
            ),
            EmailTemplate::TicketInProgress => (
                format!("Ticket #{} is being worked on", reference),
                "An agent has started working on your ticket.".to_string(),
            ),
            EmailTemplate::TicketEscalated => (
                format!("Ticket #{} escalated ({})", reference, ctx.status),
                format!(
                    "The SLA for this ticket was breached and it is now {}.",
                    ctx.status
                ),
            ),
            EmailTemplate::TicketResolved => (
                format!("Ticket #{} resolved", reference),
                "Your ticket has been resolved.".to_string(),
            ),
            EmailTemplate::TicketClosed => (
                format!("Ticket #{} closed", reference),
                "Your ticket has been closed.".to_string(),
            ),
            EmailTemplate::TicketReopened => (
                format!("Ticket #{} reopened", reference),
                "Your ticket has been reopened and is back in the queue.".to_string(),
            ),
            EmailTemplate::PriorityChanged => (
                format!("Ticket #{} priority is now {}", reference, ctx.priority),
                format!("The priority of this ticket changed to {}.", ctx.priority),
            ),
        };

        let mut html = format!(
            "<html><body><h2>{title}</h2><p>{lead}</p><table>\
             <tr><td>Reference</td><td>#{reference}</td></tr>\
             <tr><td>Status</td><td>{status}</td></tr>\
             <tr><td>Priority</td><td>{priority}</td></tr>\
             </table>",
            title = title,
            lead = lead,
            reference = reference,
            status = ctx.status,
            priority = ctx.priority,
        );

        if let Some(resolution) = ctx.resolution.as_deref() {
            if *self == EmailTemplate::TicketResolved {
                html.push_str(&format!(
                    "<h3>Resolution</h3><p>{}</p>",
                    escape_html(resolution)
                ));
            }
        }
        html.push_str("</body></html>");

        RenderedEmail { subject, html }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TemplateContext {
        TemplateContext {
            ticket_id: Uuid::new_v4(),
            title: "Card <blocked> & retained".to_string(),
            status: TicketStatus::Resolved,
            priority: TicketPriority::High,
            sbu_name: Some("Cards".to_string()),
            assignee_name: None,
            resolution: Some("<script>alert(1)</script>".to_string()),
        }
    }

    #[test]
    fn test_user_text_is_escaped() {
        let email = EmailTemplate::TicketResolved.render(&context());

        assert!(email.html.contains("Card &lt;blocked&gt; &amp; retained"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert!(!email.html.contains("<script>"));
    }

    #[test]
    fn test_status_template_mapping() {
        assert_eq!(
            EmailTemplate::for_status(TicketStatus::EscalatedTier2),
            EmailTemplate::TicketEscalated
        );
        assert_eq!(
            EmailTemplate::for_status(TicketStatus::New),
            EmailTemplate::TicketReopened
        );
        assert_eq!(
            EmailTemplate::for_status(TicketStatus::Closed),
            EmailTemplate::TicketClosed
        );
    }

    #[test]
    fn test_escalation_subject_names_tier() {
        let mut ctx = context();
        ctx.status = TicketStatus::EscalatedTier2;

        let email = EmailTemplate::TicketEscalated.render(&ctx);
        assert!(email.subject.contains("escalated_tier2"));
    }
}
