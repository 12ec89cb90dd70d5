//! SLA countdown
//!
//! The countdown is a pure function of the ticket's status, its creation
//! time, the policy for the current status and the current instant. The
//! clock is anchored at creation and is not reset by tier transitions, so
//! recomputing it at any point yields the same answer for the same `now`.

use chrono::{DateTime, Utc};
use eqms_db::TicketStatus;
use serde::{Deserialize, Serialize};

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::policy_table::SlaPolicy;

/// State of a ticket's SLA clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlaCountdown {
    /// No SLA config exists for the ticket's SBU and status
    Unknown,
    /// The status does not run an SLA clock
    Paused,
    /// Time is left on the clock
    Running {
        remaining_seconds: u64,
        allotted_seconds: u64,
        /// Remaining time has dropped below the warning threshold
        warning: bool,
    },
    /// The allotment has been used up
    Expired { allotted_seconds: u64 },
}

impl SlaCountdown {
    pub fn is_expired(&self) -> bool {
        matches!(self, SlaCountdown::Expired { .. })
    }

    /// Status to move to, if this countdown calls for an automatic escalation
    pub fn escalation_target(&self, status: TicketStatus) -> Option<TicketStatus> {
        match self {
            SlaCountdown::Expired { .. } => status.next_escalation(),
            SlaCountdown::Unknown | SlaCountdown::Paused | SlaCountdown::Running { .. } => None,
        }
    }

    /// Remaining time as `HH:MM:SS`, or a placeholder when the clock is not running
    pub fn display(&self) -> String {
        match self {
            SlaCountdown::Running {
                remaining_seconds, ..
            } => format_hms(*remaining_seconds),
            SlaCountdown::Expired { .. } => format_hms(0),
            SlaCountdown::Unknown | SlaCountdown::Paused => "--:--:--".to_string(),
        }
    }
}

/// Compute the countdown for a ticket
pub fn countdown(
    status: TicketStatus,
    created_at: DateTime<Utc>,
    policy: Option<&SlaPolicy>,
    now: DateTime<Utc>,
) -> SlaCountdown {
    if status.is_paused() {
        return SlaCountdown::Paused;
    }

    let Some(policy) = policy else {
        return SlaCountdown::Unknown;
    };

    // A creation time in the future counts as no time elapsed
    let elapsed = u64::try_from((now - created_at).num_seconds()).unwrap_or(0);
    let remaining = policy.allotted_seconds.saturating_sub(elapsed);

    if remaining == 0 {
        SlaCountdown::Expired {
            allotted_seconds: policy.allotted_seconds,
        }
    } else {
        SlaCountdown::Running {
            remaining_seconds: remaining,
            allotted_seconds: policy.allotted_seconds,
            warning: remaining < policy.warning_threshold_seconds,
        }
    }
}

fn format_hms(seconds: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        (seconds % 3600) / 60,
        seconds % 60
    )
}
