//! Escalation scheduler
//!
//! A single background task that periodically finds tickets whose SLA has
//! run out and escalates them one tier through the gateway. It runs whether
//! or not anybody is looking at the tickets.

use std::time::Duration;

use chrono::{DateTime, Utc};
use eqms_db::entities::ticket;
use eqms_db::TicketStatus;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ControlResult;
use crate::gateway::TicketGateway;
use crate::policy_table::PolicyTable;
use crate::timer::{countdown, SlaCountdown};

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between sweeps
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
        }
    }
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Tickets in an escalating status
    pub examined: usize,
    /// Tickets moved up one tier
    pub escalated: usize,
    /// Tickets with no SLA config for their status
    pub skipped_unknown: usize,
    /// Tickets another writer changed before the escalation landed
    pub conflicts: usize,
}

impl SweepReport {
    pub fn is_quiet(&self) -> bool {
        self.escalated == 0 && self.skipped_unknown == 0 && self.conflicts == 0
    }
}

/// Periodic SLA breach sweep
pub struct EscalationScheduler {
    gateway: TicketGateway,
    config: SchedulerConfig,
}

impl EscalationScheduler {
    pub fn new(gateway: TicketGateway, config: SchedulerConfig) -> Self {
        Self { gateway, config }
    }

    /// Run one sweep against the current time
    pub async fn sweep(&self) -> ControlResult<SweepReport> {
        self.sweep_at(Utc::now()).await
    }

    /// Run one sweep as if the current time were `now`
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> ControlResult<SweepReport> {
        let db = self.gateway.db();

        let candidates = ticket::Entity::find()
            .filter(ticket::Column::Status.is_in(TicketStatus::ESCALATING))
            .order_by_asc(ticket::Column::CreatedAt)
            .all(db)
            .await?;

        let mut report = SweepReport {
            examined: candidates.len(),
            ..Default::default()
        };
        if candidates.is_empty() {
            return Ok(report);
        }

        let mut sbu_ids: Vec<Uuid> = candidates.iter().map(|t| t.sbu_id).collect();
        sbu_ids.sort();
        sbu_ids.dedup();
        let policies = PolicyTable::load(db, &sbu_ids).await?;

        for ticket in &candidates {
            let state = countdown(
                ticket.status,
                ticket.created_at,
                policies.get(ticket.sbu_id, ticket.status),
                now,
            );

            if state == SlaCountdown::Unknown {
                report.skipped_unknown += 1;
                continue;
            }

            let Some(next) = state.escalation_target(ticket.status) else {
                continue;
            };

            match self
                .gateway
                .escalate_breached(ticket, ticket.status, next)
                .await
            {
                Ok(true) => report.escalated += 1,
                Ok(false) => report.conflicts += 1,
                Err(e) => {
                    error!(ticket_id = %ticket.id, "Failed to escalate ticket: {}", e);
                }
            }
        }

        Ok(report)
    }

    /// Start sweeping in the background
    pub fn spawn(gateway: TicketGateway, config: SchedulerConfig) -> SchedulerHandle {
        let scheduler = Self::new(gateway, config);

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.config.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            info!(
                "Escalation scheduler started (sweeps every {:?})",
                scheduler.config.interval
            );

            loop {
                interval.tick().await;
                match scheduler.sweep().await {
                    Ok(report) if report.is_quiet() => {
                        debug!(examined = report.examined, "Escalation sweep finished");
                    }
                    Ok(report) => {
                        info!(
                            examined = report.examined,
                            escalated = report.escalated,
                            skipped_unknown = report.skipped_unknown,
                            conflicts = report.conflicts,
                            "Escalation sweep finished"
                        );
                    }
                    Err(e) => error!("Escalation sweep failed: {}", e),
                }
            }
        });

        SchedulerHandle { task }
    }
}

/// Handle to the background sweep task
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop sweeping
    pub fn shutdown(self) {
        self.task.abort();
        info!("Escalation scheduler stopped");
    }
}
