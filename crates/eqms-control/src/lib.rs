//! Control plane for the escalated query management system
//!
//! Holds the SLA countdown, the status machine, the access policy and the
//! single gateway through which tickets are mutated, plus the background
//! escalation sweep and notification email.

pub mod access;
pub mod error;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod policy_table;
pub mod scheduler;
pub mod status;
pub mod timer;

pub use access::{authorize, Action, Actor, Decision, Ownership};
pub use error::{ControlError, ControlResult};
pub use events::{EventBus, TicketEvent, TicketEventKind, DEFAULT_EVENT_CAPACITY};
pub use gateway::{NewTicket, TicketDetails, TicketGateway, TicketUpdate};
pub use notify::{
    EmailMessage, EmailTemplate, LogMailer, MailError, Mailer, MailerConfig, Notifier,
    RelayMailer, TemplateContext, TicketNotice,
};
pub use policy_table::{find_policy, PolicyTable, SlaPolicy};
pub use scheduler::{EscalationScheduler, SchedulerConfig, SchedulerHandle, SweepReport};
pub use status::{apply_manual, manual_escalation, ManualTransition};
pub use timer::{countdown, SlaCountdown};
