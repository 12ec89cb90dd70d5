//! Database entities

pub mod sbu;
pub mod sla_config;
pub mod ticket;
pub mod ticket_comment;
pub mod tier_assignment;
pub mod user;
pub mod user_profile;

pub use sbu::SbuStatus;
pub use ticket::{TicketPriority, TicketStatus};
pub use tier_assignment::Tier;
pub use user_profile::UserRole;

pub mod prelude {
    pub use super::sbu::Entity as Sbu;
    pub use super::sla_config::Entity as SlaConfig;
    pub use super::ticket::Entity as Ticket;
    pub use super::ticket_comment::Entity as TicketComment;
    pub use super::tier_assignment::Entity as TierAssignment;
    pub use super::user::Entity as User;
    pub use super::user_profile::Entity as UserProfile;
}
