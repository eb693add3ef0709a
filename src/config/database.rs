//! Database configuration module.
//!
//! This module handles database connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! structs. One ledger entry per `event_key` is enforced by the column's
//! unique constraint; one ticket per `(raffle_id, number)` needs a composite
//! index, created here.

use crate::entities::{
    Attachment, Club, ClubMember, Contribution, Invitation, LedgerEntry, Loan, LoanPayment,
    Policy, Raffle, Ticket, User, ticket,
};
use crate::errors::Result;
use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};

/// Establishes a connection to the database at `database_url`.
///
/// # Errors
/// Returns [`crate::errors::Error::Database`] if the connection cannot be opened.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E, C>(db: &C, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates all tables and indexes if they do not exist yet.
///
/// Parent tables are created before the tables referencing them.
///
/// # Errors
/// Returns an error if any DDL statement fails.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, User).await?;
    create_table(db, &schema, Club).await?;
    create_table(db, &schema, ClubMember).await?;
    create_table(db, &schema, Invitation).await?;
    create_table(db, &schema, Contribution).await?;
    create_table(db, &schema, Loan).await?;
    create_table(db, &schema, LoanPayment).await?;
    create_table(db, &schema, LedgerEntry).await?;
    create_table(db, &schema, Raffle).await?;
    create_table(db, &schema, Ticket).await?;
    create_table(db, &schema, Policy).await?;
    create_table(db, &schema, Attachment).await?;

    let ticket_number_index = Index::create()
        .name("idx_tickets_raffle_number")
        .table(Ticket)
        .col(ticket::Column::RaffleId)
        .col(ticket::Column::Number)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(builder.build(&ticket_number_index)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{LedgerEntryModel, LoanModel, TicketModel, UserModel};
    use crate::test_utils::{create_test_club, create_test_user, setup_test_db};
    use sea_orm::{ActiveModelTrait, QuerySelect, Set};

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserModel> = User::find().limit(1).all(&db).await?;
        let _: Vec<LoanModel> = Loan::find().limit(1).all(&db).await?;
        let _: Vec<LedgerEntryModel> = LedgerEntry::find().limit(1).all(&db).await?;
        let _: Vec<TicketModel> = Ticket::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_ticket_number_is_unique_per_raffle() -> Result<()> {
        use crate::entities::{RaffleKind, RaffleStatus, TicketState, raffle};

        let db = setup_test_db().await?;
        let creator = create_test_user(&db, "ana").await?;
        let club = create_test_club(&db, &creator).await?;
        let now = chrono::Utc::now();
        let raffle = raffle::ActiveModel {
            club_id: Set(club.id),
            kind: Set(RaffleKind::Raffle),
            title: Set("Rifa".to_string()),
            description: Set(None),
            created_at: Set(now),
            draw_date: Set(None),
            status: Set(RaffleStatus::Active),
            creator_id: Set(creator.id),
            winning_number: Set(None),
            ..Default::default()
        }
        .insert(&db)
        .await?;

        let ticket = |number: &str| ticket::ActiveModel {
            raffle_id: Set(raffle.id),
            number: Set(number.to_string()),
            state: Set(TicketState::Available),
            claimed_by: Set(None),
            claimed_at: Set(None),
            paid: Set(false),
            ..Default::default()
        };

        ticket("001").insert(&db).await?;
        assert!(ticket("001").insert(&db).await.is_err());
        ticket("002").insert(&db).await?;
        Ok(())
    }
}
