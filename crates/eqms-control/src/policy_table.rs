//! SLA policy lookups
//!
//! A [`SlaPolicy`] is the allotment for one `(sbu, status)` pair. The
//! [`PolicyTable`] holds every pair for a set of SBUs so a sweep can evaluate
//! many tickets after a single query.

use std::collections::HashMap;

use eqms_db::entities::sla_config;
use eqms_db::TicketStatus;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

/// Allotment for one `(sbu, status)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaPolicy {
    /// Minutes allotted to the status
    pub sla_time: i32,
    pub allotted_seconds: u64,
    /// Remaining seconds below which the countdown is flagged
    pub warning_threshold_seconds: u64,
}

impl SlaPolicy {
    pub fn from_minutes(sla_time: i32, warning_threshold_seconds: u64) -> Self {
        Self {
            sla_time,
            allotted_seconds: u64::try_from(sla_time).unwrap_or(0) * 60,
            warning_threshold_seconds,
        }
    }
}

impl From<&sla_config::Model> for SlaPolicy {
    fn from(row: &sla_config::Model) -> Self {
        Self {
            sla_time: row.sla_time,
            allotted_seconds: row.allotted_seconds(),
            warning_threshold_seconds: row.warning_threshold_seconds(),
        }
    }
}

/// Look up the policy for a single `(sbu, status)` pair
pub async fn find_policy<C: ConnectionTrait>(
    db: &C,
    sbu_id: Uuid,
    status: TicketStatus,
) -> Result<Option<SlaPolicy>, sea_orm::DbErr> {
    let row = sla_config::Entity::find()
        .filter(sla_config::Column::SbuId.eq(sbu_id))
        .filter(sla_config::Column::TicketStatus.eq(status))
        .one(db)
        .await?;

    Ok(row.as_ref().map(SlaPolicy::from))
}

/// In-memory view of the SLA configs for a set of SBUs
#[derive(Debug, Default, Clone)]
pub struct PolicyTable {
    entries: HashMap<(Uuid, TicketStatus), SlaPolicy>,
}

impl PolicyTable {
    /// Load every config row belonging to `sbu_ids`
    pub async fn load<C: ConnectionTrait>(
        db: &C,
        sbu_ids: &[Uuid],
    ) -> Result<Self, sea_orm::DbErr> {
        if sbu_ids.is_empty() {
            return Ok(Self::default());
        }

        let rows = sla_config::Entity::find()
            .filter(sla_config::Column::SbuId.is_in(sbu_ids.iter().copied()))
            .all(db)
            .await?;

        Ok(Self::from_rows(&rows))
    }

    pub fn from_rows(rows: &[sla_config::Model]) -> Self {
        let entries = rows
            .iter()
            .map(|row| ((row.sbu_id, row.ticket_status), SlaPolicy::from(row)))
            .collect();

        Self { entries }
    }

    pub fn insert(&mut self, sbu_id: Uuid, status: TicketStatus, policy: SlaPolicy) {
        self.entries.insert((sbu_id, status), policy);
    }

    pub fn get(&self, sbu_id: Uuid, status: TicketStatus) -> Option<&SlaPolicy> {
        self.entries.get(&(sbu_id, status))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_minutes_clamp_to_zero() {
        let policy = SlaPolicy::from_minutes(-5, 300);
        assert_eq!(policy.allotted_seconds, 0);
    }

    #[test]
    fn test_table_lookup_is_per_pair() {
        let sbu_a = Uuid::new_v4();
        let sbu_b = Uuid::new_v4();
        let mut table = PolicyTable::default();

        table.insert(sbu_a, TicketStatus::New, SlaPolicy::from_minutes(30, 300));
        table.insert(
            sbu_a,
            TicketStatus::EscalatedTier1,
            SlaPolicy::from_minutes(60, 300),
        );

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(sbu_a, TicketStatus::New).map(|p| p.allotted_seconds),
            Some(1800)
        );
        assert!(table.get(sbu_b, TicketStatus::New).is_none());
        assert!(table.get(sbu_a, TicketStatus::EscalatedTier2).is_none());
    }
}
