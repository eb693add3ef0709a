//! Shared test utilities for the savings club engine.
//!
//! This module provides common helper functions for setting up test databases
//! and creating test entities with sensible defaults.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        club::{self, add_member_if_absent},
        contribution::{self, ContributionDecision},
        loan::{self, Borrower, LoanTerms, NewLoan},
        user as users,
    },
    entities::{self, LoanApproval, LoanStatus},
    errors::Result,
};
use chrono::{TimeZone, Utc};
use rust_decimal::{Decimal, dec};
use sea_orm::DatabaseConnection;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a file-backed `SQLite` database with all tables initialized.
///
/// Unlike `sqlite::memory:`, which is limited to one pooled connection, this
/// lets concurrent tasks hit the database through separate connections.
/// Pass the returned path to [`remove_file_test_db`] when done.
pub async fn setup_file_test_db() -> Result<(DatabaseConnection, PathBuf)> {
    let path = std::env::temp_dir().join(format!("natillera-test-{}.sqlite", Uuid::new_v4()));
    let url = format!("sqlite://{}?mode=rwc", path.display());
    let db = crate::config::database::create_connection(&url).await?;
    crate::config::database::create_tables(&db).await?;
    Ok((db, path))
}

/// Deletes a database created by [`setup_file_test_db`], journal files included.
pub fn remove_file_test_db(path: &Path) {
    let _ = std::fs::remove_file(path);
    for suffix in ["-wal", "-shm", "-journal"] {
        let mut side = path.as_os_str().to_owned();
        side.push(suffix);
        let _ = std::fs::remove_file(PathBuf::from(side));
    }
}

/// Creates a user whose uid, email and username all derive from `name`.
pub async fn create_test_user(db: &DatabaseConnection, name: &str) -> Result<entities::UserModel> {
    users::create_user(
        db,
        format!("uid-{name}"),
        format!("{name}@example.com"),
        name.to_string(),
        format!("{name} Tester"),
    )
    .await
}

/// Creates an active club owned by `creator`.
///
/// # Defaults
/// * `name`: "Natillera {creator username}"
/// * `monthly_amount`: 50.00
pub async fn create_test_club(
    db: &DatabaseConnection,
    creator: &entities::UserModel,
) -> Result<entities::ClubModel> {
    club::create_club(db, format!("Natillera {}", creator.username), dec!(50.00), creator).await
}

/// Adds `user` to the member set of `club`.
pub async fn add_member(
    db: &DatabaseConnection,
    club: &entities::ClubModel,
    user: &entities::UserModel,
) -> Result<()> {
    add_member_if_absent(db, club.id, user.id).await
}

/// Creator "ana", member "bruno" and ana's club.
pub async fn setup_club_with_member(
    db: &DatabaseConnection,
) -> Result<(entities::UserModel, entities::UserModel, entities::ClubModel)> {
    let creator = create_test_user(db, "ana").await?;
    let member = create_test_user(db, "bruno").await?;
    let club = create_test_club(db, &creator).await?;
    add_member(db, &club, &member).await?;
    Ok((creator, member, club))
}

/// A user model that is never persisted, for mock-database tests.
#[must_use]
pub fn user_model(id: i64, name: &str) -> entities::UserModel {
    entities::UserModel {
        id,
        external_uid: format!("uid-{name}"),
        email: format!("{name}@example.com"),
        username: name.to_string(),
        full_name: format!("{name} Tester"),
        created_at: Utc::now(),
    }
}

/// A pending, active loan model that is never persisted.
#[must_use]
pub fn loan_model(
    id: i64,
    club_id: i64,
    principal: Decimal,
    interest_rate: Decimal,
    term_months: i32,
) -> entities::LoanModel {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    entities::LoanModel {
        id,
        club_id,
        principal,
        interest_rate,
        term_months,
        start_date: start,
        due_date: loan::due_date(start, term_months),
        borrower_name: "Pedro Perez".to_string(),
        borrower_phone: None,
        borrower_email: None,
        borrower_address: None,
        referrer_id: 1,
        approval: LoanApproval::Pending,
        status: LoanStatus::Active,
        amount_paid: Decimal::ZERO,
        notes: None,
        created_by: 1,
        created_at: start,
        updated_at: start,
    }
}

/// Loan input for borrower "Pedro Perez" starting now.
#[must_use]
pub fn new_loan(
    referrer_id: i64,
    principal: Decimal,
    interest_rate: Decimal,
    term_months: i32,
) -> NewLoan {
    NewLoan {
        terms: LoanTerms {
            principal,
            interest_rate,
            term_months,
        },
        start_date: None,
        borrower: Borrower {
            name: "Pedro Perez".to_string(),
            phone: Some("3001234567".to_string()),
            email: None,
            address: None,
        },
        referrer_id,
        notes: None,
    }
}

/// Creates a 1000.00 loan at 12% for 6 months, referred by `actor`.
pub async fn create_test_loan(
    db: &DatabaseConnection,
    club: &entities::ClubModel,
    actor: &entities::UserModel,
) -> Result<entities::LoanModel> {
    loan::create_loan(db, club.id, new_loan(actor.id, dec!(1000.00), dec!(12), 6), actor).await
}

/// Creates a pending contribution of `user` for March 2025.
pub async fn create_test_contribution(
    db: &DatabaseConnection,
    club: &entities::ClubModel,
    user: &entities::UserModel,
    amount: Decimal,
) -> Result<entities::ContributionModel> {
    contribution::create_contribution(db, club.id, amount, 3, 2025, user).await
}

/// Creates a contribution of `member` and approves it as `creator`.
pub async fn create_approved_contribution(
    db: &DatabaseConnection,
    club: &entities::ClubModel,
    creator: &entities::UserModel,
    member: &entities::UserModel,
    amount: Decimal,
) -> Result<entities::ContributionModel> {
    let pending = create_test_contribution(db, club, member, amount).await?;
    contribution::review_contribution(db, pending.id, ContributionDecision::Approve, creator).await
}
