//! Integration tests for eqms-db
//!
//! Runs the migrations against an in-memory SQLite database and checks the
//! constraints the control plane relies on.

use chrono::Utc;
use eqms_db::entities::{sbu, sla_config, ticket, tier_assignment, user, user_profile};
use eqms_db::{connect, migrate, SbuStatus, Tier, TicketPriority, TicketStatus, UserRole};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, Set, SqlErr,
};
use uuid::Uuid;

async fn setup_test_db() -> DatabaseConnection {
    let db = connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");

    migrate(&db).await.expect("Failed to run migrations");

    db
}

async fn insert_sbu(db: &DatabaseConnection, name: &str) -> sbu::Model {
    let now = Utc::now();
    sbu::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(None),
        status: Set(SbuStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("Failed to insert sbu")
}

async fn insert_user(db: &DatabaseConnection, email: &str, role: UserRole) -> user::Model {
    let now = Utc::now();
    let user = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        is_active: Set(true),
        created_at: Set(now),
        last_sign_in_at: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert user");

    user_profile::ActiveModel {
        user_id: Set(user.id),
        full_name: Set(Some(email.to_string())),
        role: Set(role),
        phone: Set(None),
        sbu_id: Set(None),
        avatar_url: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("Failed to insert profile");

    user
}

fn sla_row(sbu_id: Uuid, status: TicketStatus, minutes: i32) -> sla_config::ActiveModel {
    let now = Utc::now();
    sla_config::ActiveModel {
        id: Set(Uuid::new_v4()),
        sbu_id: Set(sbu_id),
        ticket_status: Set(status),
        sla_time: Set(minutes),
        warning_threshold: Set(sla_config::DEFAULT_WARNING_THRESHOLD_SECS),
        created_at: Set(now),
        updated_at: Set(now),
    }
}

#[tokio::test]
async fn test_database_connection() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    let backend = db.get_database_backend();
    assert!(matches!(backend, sea_orm::DatabaseBackend::Sqlite));
}

#[tokio::test]
async fn test_migrations_run_successfully() {
    let db = connect("sqlite::memory:").await.expect("Failed to connect");

    assert!(migrate(&db).await.is_ok());
}

#[tokio::test]
async fn test_optional_columns_accept_null() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Wealth").await;
    let creator = insert_user(&db, "bare@example.com", UserRole::User).await;
    let now = Utc::now();

    user_profile::ActiveModel {
        user_id: Set(creator.id),
        full_name: Set(None),
        ..Default::default()
    }
    .update(&db)
    .await
    .expect("profile name should be clearable");

    let bare = ticket::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("No extras".to_string()),
        description: Set("Only required fields".to_string()),
        status: Set(TicketStatus::New),
        priority: Set(TicketPriority::Low),
        sbu_id: Set(unit.id),
        created_by: Set(creator.id),
        assigned_to: Set(None),
        sla_time: Set(0),
        resolution: Set(None),
        card_number: Set(None),
        module: Set(None),
        account_number: Set(None),
        query_type: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .expect("ticket without optional fields should insert");

    assert!(unit.description.is_none());
    assert!(creator.last_sign_in_at.is_none());
    assert!(bare.assigned_to.is_none());
    assert!(bare.resolution.is_none());

    let profile = user_profile::Entity::find_by_id(creator.id)
        .one(&db)
        .await
        .unwrap()
        .expect("profile should exist");
    assert!(profile.full_name.is_none());
    assert!(profile.sbu_id.is_none());
}

#[tokio::test]
async fn test_create_and_read_ticket() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Cards").await;
    let creator = insert_user(&db, "customer@example.com", UserRole::User).await;
    let now = Utc::now();

    let inserted = ticket::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set("Card blocked".to_string()),
        description: Set("ATM retained my card".to_string()),
        status: Set(TicketStatus::New),
        priority: Set(TicketPriority::High),
        sbu_id: Set(unit.id),
        created_by: Set(creator.id),
        assigned_to: Set(None),
        sla_time: Set(30),
        resolution: Set(None),
        card_number: Set(Some("4111".to_string())),
        module: Set(None),
        account_number: Set(None),
        query_type: Set(Some("card".to_string())),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&db)
    .await
    .expect("Failed to insert ticket");

    let found = ticket::Entity::find_by_id(inserted.id)
        .one(&db)
        .await
        .unwrap()
        .expect("ticket should exist");

    assert_eq!(found.status, TicketStatus::New);
    assert_eq!(found.priority, TicketPriority::High);
    assert_eq!(found.sla_time, 30);
    assert_eq!(found.card_number.as_deref(), Some("4111"));
}

#[tokio::test]
async fn test_sla_config_pair_is_unique() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Loans").await;

    sla_row(unit.id, TicketStatus::New, 30)
        .insert(&db)
        .await
        .expect("first config should insert");

    let err = sla_row(unit.id, TicketStatus::New, 45)
        .insert(&db)
        .await
        .expect_err("duplicate (sbu, status) must be rejected");

    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));

    // Same status on another SBU is fine
    let other = insert_sbu(&db, "Payments").await;
    assert!(sla_row(other.id, TicketStatus::New, 45)
        .insert(&db)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_warning_threshold_defaults() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Treasury").await;

    let row = sla_row(unit.id, TicketStatus::EscalatedTier1, 60)
        .insert(&db)
        .await
        .unwrap();

    assert_eq!(row.warning_threshold, 300);
    assert_eq!(row.allotted_seconds(), 3600);
    assert_eq!(row.warning_threshold_seconds(), 300);
}

#[tokio::test]
async fn test_tier_assignment_unique_per_user_and_sbu() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Retail").await;
    let agent = insert_user(&db, "agent@example.com", UserRole::Agent).await;

    let row = |tier: Tier| tier_assignment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(agent.id),
        sbu_id: Set(unit.id),
        tier: Set(tier),
        created_at: Set(Utc::now()),
    };

    row(Tier::Tier1).insert(&db).await.unwrap();
    let err = row(Tier::Tier2).insert(&db).await.unwrap_err();

    assert!(matches!(
        err.sql_err(),
        Some(SqlErr::UniqueConstraintViolation(_))
    ));
}

#[tokio::test]
async fn test_deleting_sbu_cascades_policy_rows() {
    let db = setup_test_db().await;
    let unit = insert_sbu(&db, "Operations").await;
    let agent = insert_user(&db, "ops@example.com", UserRole::Agent).await;

    sla_row(unit.id, TicketStatus::New, 30)
        .insert(&db)
        .await
        .unwrap();
    tier_assignment::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(agent.id),
        sbu_id: Set(unit.id),
        tier: Set(Tier::Tier3),
        created_at: Set(Utc::now()),
    }
    .insert(&db)
    .await
    .unwrap();

    unit.delete(&db).await.expect("Failed to delete sbu");

    let configs = sla_config::Entity::find().count(&db).await.unwrap();
    let tiers = tier_assignment::Entity::find().count(&db).await.unwrap();
    assert_eq!(configs, 0);
    assert_eq!(tiers, 0);
}

#[tokio::test]
async fn test_profile_role_filter() {
    let db = setup_test_db().await;
    insert_user(&db, "a1@example.com", UserRole::Agent).await;
    insert_user(&db, "a2@example.com", UserRole::Agent).await;
    insert_user(&db, "m1@example.com", UserRole::Manager).await;

    let agents = user_profile::Entity::find()
        .filter(user_profile::Column::Role.eq(UserRole::Agent))
        .all(&db)
        .await
        .unwrap();

    assert_eq!(agents.len(), 2);
}
