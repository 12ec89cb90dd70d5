//! Gateway and scheduler behaviour against an in-memory database

use std::sync::Arc;

use chrono::{Duration, Utc};
use eqms_control::{
    Actor, ControlError, EscalationScheduler, EventBus, LogMailer, NewTicket, Notifier,
    SchedulerConfig, TicketDetails, TicketEventKind, TicketGateway, TicketUpdate,
};
use eqms_db::entities::{sbu, sla_config, ticket, tier_assignment, user, user_profile};
use eqms_db::{connect, migrate, SbuStatus, Tier, TicketPriority, TicketStatus, UserRole};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use uuid::Uuid;

struct Fixture {
    db: DatabaseConnection,
    gateway: TicketGateway,
    sbu_id: Uuid,
    admin: Actor,
    customer: Actor,
    agent_id: Uuid,
}

async fn insert_user(db: &DatabaseConnection, role: UserRole, sbu_id: Option<Uuid>) -> Uuid {
    let now = Utc::now();
    let id = Uuid::new_v4();
    user::ActiveModel {
        id: Set(id),
        email: Set(format!("{}@example.com", id.simple())),
        is_active: Set(true),
        created_at: Set(now),
        last_sign_in_at: Set(None),
    }
    .insert(db)
    .await
    .unwrap();

    user_profile::ActiveModel {
        user_id: Set(id),
        full_name: Set(Some(format!("{} {}", role, id.simple()))),
        role: Set(role),
        phone: Set(None),
        sbu_id: Set(sbu_id),
        avatar_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();

    id
}

async fn insert_config(db: &DatabaseConnection, sbu_id: Uuid, status: TicketStatus, minutes: i32) {
    let now = Utc::now();
    sla_config::ActiveModel {
        id: Set(Uuid::new_v4()),
        sbu_id: Set(sbu_id),
        ticket_status: Set(status),
        sla_time: Set(minutes),
        warning_threshold: Set(300),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .unwrap();
}

async fn setup() -> Fixture {
    let db = connect("sqlite::memory:").await.unwrap();
    migrate(&db).await.unwrap();

    let now = Utc::now();
    let sbu_id = Uuid::new_v4();
    sbu::ActiveModel {
        id: Set(sbu_id),
        name: Set("Cards".to_string()),
        description: Set(None),
        status: Set(SbuStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .unwrap();

    let admin_id = insert_user(&db, UserRole::Admin, None).await;
    let customer_id = insert_user(&db, UserRole::User, None).await;
    let agent_id = insert_user(&db, UserRole::Agent, Some(sbu_id)).await;

    let notifier = Notifier::new(db.clone(), Arc::new(LogMailer));
    let gateway = TicketGateway::new(db.clone(), EventBus::default(), notifier);

    Fixture {
        db,
        gateway,
        sbu_id,
        admin: Actor::user(admin_id, UserRole::Admin),
        customer: Actor::user(customer_id, UserRole::User),
        agent_id,
    }
}

fn new_ticket(sbu_id: Uuid) -> NewTicket {
    NewTicket {
        title: "Card retained by ATM".to_string(),
        description: "The ATM at the branch kept my card".to_string(),
        priority: TicketPriority::High,
        sbu_id,
        card_number: Some("4111".to_string()),
        module: None,
        account_number: None,
        query_type: Some("card".to_string()),
    }
}

/// Push a ticket's creation time into the past
async fn age_ticket(db: &DatabaseConnection, id: Uuid, minutes: i64) {
    let row = ticket::Entity::find_by_id(id).one(db).await.unwrap().unwrap();
    let mut active: ticket::ActiveModel = row.into();
    active.created_at = Set(Utc::now() - Duration::minutes(minutes));
    active.update(db).await.unwrap();
}

async fn reload(db: &DatabaseConnection, id: Uuid) -> ticket::Model {
    ticket::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_create_stamps_initial_sla_from_open_config() {
    let fx = setup().await;
    let status: TicketStatus = "open".parse().unwrap();
    insert_config(&fx.db, fx.sbu_id, status, 30).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    assert_eq!(created.status, TicketStatus::New);
    assert_eq!(created.sla_time, 30);
}

#[tokio::test]
async fn test_create_without_config_stamps_zero() {
    let fx = setup().await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    assert_eq!(created.sla_time, 0);
}

#[tokio::test]
async fn test_create_rejects_blank_title() {
    let fx = setup().await;
    let mut request = new_ticket(fx.sbu_id);
    request.title = "  ".to_string();

    let err = fx.gateway.create(&fx.customer, request).await.unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));
}

#[tokio::test]
async fn test_status_change_restamps_sla_time() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::EscalatedTier2, 120).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    let tier1 = fx.gateway.escalate(&fx.admin, created.id).await.unwrap();
    assert_eq!(tier1.status, TicketStatus::EscalatedTier1);

    let updated = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::EscalatedTier2),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TicketStatus::EscalatedTier2);
    assert_eq!(updated.sla_time, 120);

    let stored = reload(&fx.db, created.id).await;
    assert_eq!(stored.sla_time, 120);
}

#[tokio::test]
async fn test_status_change_without_config_keeps_sla_time() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::New, 45).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let updated = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TicketStatus::InProgress);
    assert_eq!(updated.sla_time, 45);
}

#[tokio::test]
async fn test_empty_update_rejected() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let err = fx
        .gateway
        .update(&fx.admin, created.id, TicketUpdate::default())
        .await
        .unwrap_err();

    assert!(matches!(err, ControlError::Validation(_)));
}

#[tokio::test]
async fn test_update_missing_ticket_not_found() {
    let fx = setup().await;

    let err = fx
        .gateway
        .update(
            &fx.admin,
            Uuid::new_v4(),
            TicketUpdate {
                priority: Some(TicketPriority::Low),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ControlError::NotFound(_)));
}

#[tokio::test]
async fn test_assigning_new_ticket_marks_assigned() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let updated = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                assignee: Some(fx.agent_id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.status, TicketStatus::Assigned);
    assert_eq!(updated.assigned_to, Some(fx.agent_id));
}

#[tokio::test]
async fn test_cannot_assign_to_end_user() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let err = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                assignee: fx.customer.user_id(),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ControlError::Validation(_)));
}

#[tokio::test]
async fn test_unassigned_agent_cannot_change_priority() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    let agent = Actor::user(fx.agent_id, UserRole::Agent);

    let err = fx
        .gateway
        .update(
            &agent,
            created.id,
            TicketUpdate {
                priority: Some(TicketPriority::Urgent),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ControlError::Forbidden(_)));
}

#[tokio::test]
async fn test_resolve_requires_resolution() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let err = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::Resolved),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));

    let resolved = fx
        .gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::Resolved),
                resolution: Some("Card reissued".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resolved.status, TicketStatus::Resolved);
    assert_eq!(resolved.resolution.as_deref(), Some("Card reissued"));
}

#[tokio::test]
async fn test_update_publishes_event() {
    let fx = setup().await;
    let mut events = fx.gateway.events().subscribe();

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    let first = events.recv().await.unwrap();
    assert_eq!(first.kind, TicketEventKind::Created);
    assert_eq!(first.ticket_id, created.id);

    fx.gateway.escalate(&fx.admin, created.id).await.unwrap();
    let second = events.recv().await.unwrap();
    assert_eq!(second.kind, TicketEventKind::Updated);
    assert_eq!(second.status, TicketStatus::EscalatedTier1);
}

#[tokio::test]
async fn test_sweep_escalates_one_tier_per_sweep() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::New, 30).await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::EscalatedTier1, 60).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    // Past both the new and tier 1 allotments
    age_ticket(&fx.db, created.id, 90).await;

    let scheduler = EscalationScheduler::new(fx.gateway.clone(), SchedulerConfig::default());

    let first = scheduler.sweep().await.unwrap();
    assert_eq!(first.examined, 1);
    assert_eq!(first.escalated, 1);
    let after_first = reload(&fx.db, created.id).await;
    assert_eq!(after_first.status, TicketStatus::EscalatedTier1);
    assert_eq!(after_first.sla_time, 60);

    let second = scheduler.sweep().await.unwrap();
    assert_eq!(second.escalated, 1);
    let after_second = reload(&fx.db, created.id).await;
    assert_eq!(after_second.status, TicketStatus::EscalatedTier2);
    // No tier 2 config, allotment carried over
    assert_eq!(after_second.sla_time, 60);

    // Tier 2 has no config, so the ticket is held there
    let third = scheduler.sweep().await.unwrap();
    assert_eq!(third.escalated, 0);
    assert_eq!(third.skipped_unknown, 1);
    assert_eq!(
        reload(&fx.db, created.id).await.status,
        TicketStatus::EscalatedTier2
    );
}

#[tokio::test]
async fn test_sweep_leaves_running_tickets() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::New, 30).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    age_ticket(&fx.db, created.id, 10).await;

    let scheduler = EscalationScheduler::new(fx.gateway.clone(), SchedulerConfig::default());
    let report = scheduler.sweep().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(report.escalated, 0);
    assert_eq!(reload(&fx.db, created.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_sweep_ignores_paused_tickets() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::New, 1).await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::InProgress, 1).await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    fx.gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    age_ticket(&fx.db, created.id, 600).await;

    let scheduler = EscalationScheduler::new(fx.gateway.clone(), SchedulerConfig::default());
    let report = scheduler.sweep().await.unwrap();

    assert_eq!(report.examined, 0);
    assert_eq!(
        reload(&fx.db, created.id).await.status,
        TicketStatus::InProgress
    );
}

#[tokio::test]
async fn test_sweep_without_config_fails_closed() {
    let fx = setup().await;

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    age_ticket(&fx.db, created.id, 10_000).await;

    let scheduler = EscalationScheduler::new(fx.gateway.clone(), SchedulerConfig::default());
    let report = scheduler.sweep().await.unwrap();

    assert_eq!(report.skipped_unknown, 1);
    assert_eq!(report.escalated, 0);
    assert_eq!(reload(&fx.db, created.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_guarded_escalation_detects_concurrent_change() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    // Someone resolves the ticket after the sweep read it
    fx.gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::Resolved),
                resolution: Some("done".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let applied = fx
        .gateway
        .escalate_breached(&created, TicketStatus::New, TicketStatus::EscalatedTier1)
        .await
        .unwrap();

    assert!(!applied);
    assert_eq!(
        reload(&fx.db, created.id).await.status,
        TicketStatus::Resolved
    );
}

#[tokio::test]
async fn test_rostered_agent_can_escalate() {
    let fx = setup().await;
    tier_assignment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(fx.agent_id),
        sbu_id: Set(fx.sbu_id),
        tier: Set(Tier::Tier1),
        created_at: Set(Utc::now()),
    }
    .insert(&fx.db)
    .await
    .unwrap();

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    let agent = Actor::user(fx.agent_id, UserRole::Agent);

    let escalated = fx.gateway.escalate(&agent, created.id).await.unwrap();
    assert_eq!(escalated.status, TicketStatus::EscalatedTier1);

    // Customers cannot escalate their own tickets
    let err = fx
        .gateway
        .escalate(&fx.customer, created.id)
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Forbidden(_)));
}

#[tokio::test]
async fn test_only_admin_deletes() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let manager_id = insert_user(&fx.db, UserRole::Manager, None).await;
    let manager = Actor::user(manager_id, UserRole::Manager);
    assert!(matches!(
        fx.gateway.delete(&manager, created.id).await,
        Err(ControlError::Forbidden(_))
    ));

    fx.gateway.delete(&fx.admin, created.id).await.unwrap();
    assert!(ticket::Entity::find_by_id(created.id)
        .one(&fx.db)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rejected_edit_leaves_details_untouched() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let err = fx
        .gateway
        .edit(
            &fx.customer,
            created.id,
            TicketDetails {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
            TicketUpdate {
                status: Some(TicketStatus::Closed),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Forbidden(_)));

    let stored = reload(&fx.db, created.id).await;
    assert_eq!(stored.title, created.title);
    assert_eq!(stored.status, TicketStatus::New);

    // Details alone are the creator's to edit
    let edited = fx
        .gateway
        .edit(
            &fx.customer,
            created.id,
            TicketDetails {
                title: Some("Renamed".to_string()),
                ..Default::default()
            },
            TicketUpdate::default(),
        )
        .await
        .unwrap();
    assert_eq!(edited.title, "Renamed");
}

#[tokio::test]
async fn test_edit_applies_details_and_status_together() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::InProgress, 90).await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let edited = fx
        .gateway
        .edit(
            &fx.admin,
            created.id,
            TicketDetails {
                module: Some("ATM".to_string()),
                ..Default::default()
            },
            TicketUpdate {
                status: Some(TicketStatus::InProgress),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(edited.module.as_deref(), Some("ATM"));
    assert_eq!(edited.status, TicketStatus::InProgress);
    assert_eq!(edited.sla_time, 90);
}

#[tokio::test]
async fn test_reopened_ticket_needs_fresh_resolution() {
    let fx = setup().await;
    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();

    let status_only = |status| TicketUpdate {
        status: Some(status),
        ..Default::default()
    };

    fx.gateway
        .update(
            &fx.admin,
            created.id,
            TicketUpdate {
                status: Some(TicketStatus::Resolved),
                resolution: Some("Card reissued".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let reopened = fx
        .gateway
        .update(&fx.admin, created.id, status_only(TicketStatus::New))
        .await
        .unwrap();
    assert_eq!(reopened.status, TicketStatus::New);
    assert!(reopened.resolution.is_none());

    let err = fx
        .gateway
        .update(&fx.admin, created.id, status_only(TicketStatus::Resolved))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Validation(_)));
    assert_eq!(reload(&fx.db, created.id).await.status, TicketStatus::New);
}

#[tokio::test]
async fn test_agent_hands_off_within_roster() {
    let fx = setup().await;
    let colleague_id = insert_user(&fx.db, UserRole::Agent, Some(fx.sbu_id)).await;
    let outsider_id = insert_user(&fx.db, UserRole::Agent, None).await;
    for (user_id, tier) in [(fx.agent_id, Tier::Tier1), (colleague_id, Tier::Tier2)] {
        tier_assignment::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            sbu_id: Set(fx.sbu_id),
            tier: Set(tier),
            created_at: Set(Utc::now()),
        }
        .insert(&fx.db)
        .await
        .unwrap();
    }

    let created = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    let assign = |assignee| TicketUpdate {
        assignee: Some(assignee),
        ..Default::default()
    };
    fx.gateway
        .update(&fx.admin, created.id, assign(fx.agent_id))
        .await
        .unwrap();

    let agent = Actor::user(fx.agent_id, UserRole::Agent);
    let err = fx
        .gateway
        .update(&agent, created.id, assign(outsider_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Forbidden(_)));

    let handed = fx
        .gateway
        .update(&agent, created.id, assign(colleague_id))
        .await
        .unwrap();
    assert_eq!(handed.assigned_to, Some(colleague_id));

    // The previous assignee no longer owns the ticket
    let err = fx
        .gateway
        .update(&agent, created.id, assign(fx.agent_id))
        .await
        .unwrap_err();
    assert!(matches!(err, ControlError::Forbidden(_)));
}

#[tokio::test]
async fn test_spawned_scheduler_escalates_until_shutdown() {
    let fx = setup().await;
    insert_config(&fx.db, fx.sbu_id, TicketStatus::New, 30).await;

    let breached = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    age_ticket(&fx.db, breached.id, 45).await;

    let handle = EscalationScheduler::spawn(
        fx.gateway.clone(),
        SchedulerConfig {
            interval: std::time::Duration::from_millis(20),
        },
    );

    let mut escalated = false;
    for _ in 0..100 {
        if reload(&fx.db, breached.id).await.status == TicketStatus::EscalatedTier1 {
            escalated = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(escalated, "background sweep should escalate the breached ticket");

    handle.shutdown();

    let late = fx
        .gateway
        .create(&fx.customer, new_ticket(fx.sbu_id))
        .await
        .unwrap();
    age_ticket(&fx.db, late.id, 45).await;
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    assert_eq!(reload(&fx.db, late.id).await.status, TicketStatus::New);
}
