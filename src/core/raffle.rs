//! Raffle business logic - Lotteries and raffles run by a club.
//!
//! A lottery owns exactly 101 tickets, `"000"` to `"100"`, created together
//! with it. A member claims a ticket with a conditional update that only
//! matches an available ticket of an active raffle, so two concurrent claims
//! of the same number cannot both succeed and no claim lands after the draw.
//! Finalization is one-way.

use crate::{
    core::{auth::ClubRoster, club::list_member_clubs},
    entities::{
        Raffle, RaffleKind, RaffleStatus, Ticket, TicketState, User, raffle, ticket, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::{Expr, Query}};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Highest ticket number of a lottery
pub const LOTTERY_MAX_NUMBER: u32 = 100;

/// Input of [`create_raffle`]
#[derive(Debug, Clone)]
pub struct NewRaffle {
    pub kind: RaffleKind,
    pub title: String,
    pub description: Option<String>,
    pub draw_date: Option<DateTime<Utc>>,
}

/// A finalized raffle with the holder of the winning ticket, if any
#[derive(Debug, Clone)]
pub struct RaffleDraw {
    pub raffle: raffle::Model,
    /// `None` when the winning number was not taken
    pub winning_ticket: Option<ticket::Model>,
    pub winner: Option<user::Model>,
}

/// A ticket with its holder, as shown to the club creator
#[derive(Debug, Clone)]
pub struct AdminTicket {
    pub ticket: ticket::Model,
    pub holder: Option<user::Model>,
}

/// Normalises user input to a three-digit ticket number (`"7"` -> `"007"`).
pub fn normalize_ticket_number(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidInput {
            message: format!("ticket number {input:?} is not numeric"),
        });
    }
    let number: u32 = trimmed.parse().map_err(|_| Error::InvalidInput {
        message: format!("ticket number {input:?} is out of range"),
    })?;
    Ok(format!("{number:03}"))
}

async fn find_raffle<C>(db: &C, raffle_id: i64) -> Result<raffle::Model>
where
    C: ConnectionTrait,
{
    Raffle::find_by_id(raffle_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Raffle", raffle_id))
}

async fn find_ticket<C>(db: &C, raffle_id: i64, number: &str) -> Result<Option<ticket::Model>>
where
    C: ConnectionTrait,
{
    Ticket::find()
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .filter(ticket::Column::Number.eq(number))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a raffle and the roster of its club.
async fn raffle_with_roster<C>(db: &C, raffle_id: i64) -> Result<(raffle::Model, ClubRoster)>
where
    C: ConnectionTrait,
{
    let raffle = find_raffle(db, raffle_id).await?;
    let roster = ClubRoster::load(db, raffle.club_id).await?;
    Ok((raffle, roster))
}

/// Creates a raffle; a lottery gets its 101 tickets in the same transaction.
/// Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn create_raffle(
    db: &DatabaseConnection,
    club_id: i64,
    new: NewRaffle,
    actor: &user::Model,
) -> Result<raffle::Model> {
    if new.title.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "raffle title must not be empty".to_string(),
        });
    }

    let txn = db.begin().await?;

    ClubRoster::load(&txn, club_id)
        .await?
        .require_creator(actor.id)?;

    let raffle = raffle::ActiveModel {
        club_id: Set(club_id),
        kind: Set(new.kind),
        title: Set(new.title.trim().to_string()),
        description: Set(new.description),
        created_at: Set(Utc::now()),
        draw_date: Set(new.draw_date),
        status: Set(RaffleStatus::Active),
        creator_id: Set(actor.id),
        winning_number: Set(None),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if raffle.kind == RaffleKind::Lottery {
        let tickets = (0..=LOTTERY_MAX_NUMBER).map(|n| ticket::ActiveModel {
            raffle_id: Set(raffle.id),
            number: Set(format!("{n:03}")),
            state: Set(TicketState::Available),
            claimed_by: Set(None),
            claimed_at: Set(None),
            paid: Set(false),
            ..Default::default()
        });
        Ticket::insert_many(tickets).exec_without_returning(&txn).await?;
    }

    txn.commit().await?;

    info!(raffle_id = raffle.id, kind = ?raffle.kind, "Raffle created");
    Ok(raffle)
}

/// Member-only.
pub async fn get_raffle(
    db: &DatabaseConnection,
    raffle_id: i64,
    actor: &user::Model,
) -> Result<raffle::Model> {
    let (raffle, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_member(actor.id)?;
    Ok(raffle)
}

async fn tickets_of(db: &DatabaseConnection, raffle_id: i64) -> Result<Vec<ticket::Model>> {
    Ticket::find()
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .order_by_asc(ticket::Column::Number)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Tickets of a raffle ordered by number. Member-only.
pub async fn list_tickets(
    db: &DatabaseConnection,
    raffle_id: i64,
    actor: &user::Model,
) -> Result<Vec<ticket::Model>> {
    let (_, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_member(actor.id)?;
    tickets_of(db, raffle_id).await
}

/// Tickets of a raffle with their holders. Creator-only.
pub async fn list_tickets_admin(
    db: &DatabaseConnection,
    raffle_id: i64,
    actor: &user::Model,
) -> Result<Vec<AdminTicket>> {
    let (_, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_creator(actor.id)?;

    let tickets = tickets_of(db, raffle_id).await?;
    let holder_ids: Vec<i64> = tickets.iter().filter_map(|t| t.claimed_by).collect();
    let holders: HashMap<i64, user::Model> = User::find()
        .filter(user::Column::Id.is_in(holder_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();

    Ok(tickets
        .into_iter()
        .map(|ticket| AdminTicket {
            holder: ticket.claimed_by.and_then(|id| holders.get(&id).cloned()),
            ticket,
        })
        .collect())
}

/// Marks the ticket taken by `user_id` in one statement, matching only an
/// available ticket of a raffle that is still active. Returns the number of
/// rows changed, 0 or 1.
async fn take_ticket<C>(db: &C, raffle_id: i64, number: &str, user_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let active_raffle = Query::select()
        .column(raffle::Column::Id)
        .from(Raffle)
        .and_where(raffle::Column::Id.eq(raffle_id))
        .and_where(raffle::Column::Status.eq(RaffleStatus::Active))
        .to_owned();

    let result = Ticket::update_many()
        .col_expr(ticket::Column::State, Expr::value(TicketState::Taken))
        .col_expr(ticket::Column::ClaimedBy, Expr::value(user_id))
        .col_expr(ticket::Column::ClaimedAt, Expr::value(Utc::now()))
        .filter(ticket::Column::RaffleId.in_subquery(active_raffle))
        .filter(ticket::Column::Number.eq(number))
        .filter(ticket::Column::State.eq(TicketState::Available))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Claims an available ticket for `actor`. Member-only.
///
/// Fails with [`Error::TicketNotAvailable`] if the ticket is already taken,
/// including when a concurrent claim won the race, and with
/// [`Error::RaffleAlreadyFinalized`] if the draw happened first.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn claim_ticket(
    db: &DatabaseConnection,
    raffle_id: i64,
    number: &str,
    actor: &user::Model,
) -> Result<ticket::Model> {
    let number = normalize_ticket_number(number)?;
    let (raffle, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_member(actor.id)?;
    if raffle.status == RaffleStatus::Finalized {
        return Err(Error::RaffleAlreadyFinalized { raffle_id });
    }

    if take_ticket(db, raffle_id, &number, actor.id).await? == 0 {
        let raffle = find_raffle(db, raffle_id).await?;
        if raffle.status == RaffleStatus::Finalized {
            return Err(Error::RaffleAlreadyFinalized { raffle_id });
        }
        if find_ticket(db, raffle_id, &number).await?.is_none() {
            return Err(Error::not_found("Ticket", &number));
        }
        return Err(Error::TicketNotAvailable { number });
    }

    let ticket = find_ticket(db, raffle_id, &number)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", &number))?;

    info!(raffle_id, number = %ticket.number, "Ticket claimed");
    Ok(ticket)
}

/// Marks a taken ticket as paid. Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn mark_ticket_paid(
    db: &DatabaseConnection,
    raffle_id: i64,
    number: &str,
    actor: &user::Model,
) -> Result<ticket::Model> {
    let number = normalize_ticket_number(number)?;
    let (_, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_creator(actor.id)?;

    let ticket = find_ticket(db, raffle_id, &number)
        .await?
        .ok_or_else(|| Error::not_found("Ticket", &number))?;
    if ticket.state != TicketState::Taken {
        return Err(Error::TicketNotTaken { number });
    }

    let mut active: ticket::ActiveModel = ticket.into();
    active.paid = Set(true);
    let updated = active.update(db).await?;

    info!(raffle_id, number = %updated.number, "Ticket marked paid");
    Ok(updated)
}

/// Draws the winner and closes the raffle. Creator-only.
///
/// With `winning_number` the draw is manual: if that ticket exists but is not
/// taken, the raffle still closes with the number stored and no winner.
/// Without it, a taken ticket is picked uniformly at random.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn finalize_raffle(
    db: &DatabaseConnection,
    raffle_id: i64,
    winning_number: Option<&str>,
    actor: &user::Model,
) -> Result<RaffleDraw> {
    let explicit = winning_number.map(normalize_ticket_number).transpose()?;

    let txn = db.begin().await?;

    let (raffle, roster) = raffle_with_roster(&txn, raffle_id).await?;
    roster.require_creator(actor.id)?;
    if raffle.status != RaffleStatus::Active {
        return Err(Error::RaffleAlreadyFinalized { raffle_id });
    }

    let taken = Ticket::find()
        .filter(ticket::Column::RaffleId.eq(raffle_id))
        .filter(ticket::Column::State.eq(TicketState::Taken))
        .all(&txn)
        .await?;
    if taken.is_empty() {
        return Err(Error::NoTakenTickets { raffle_id });
    }

    let (number, winning_ticket) = match explicit {
        Some(number) => {
            let ticket = find_ticket(&txn, raffle_id, &number)
                .await?
                .ok_or_else(|| Error::not_found("Ticket", &number))?;
            let winner = (ticket.state == TicketState::Taken).then_some(ticket);
            (number, winner)
        }
        None => {
            let ticket = taken
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or(Error::NoTakenTickets { raffle_id })?;
            (ticket.number.clone(), Some(ticket))
        }
    };

    let result = Raffle::update_many()
        .col_expr(raffle::Column::Status, Expr::value(RaffleStatus::Finalized))
        .col_expr(raffle::Column::WinningNumber, Expr::value(number.clone()))
        .col_expr(raffle::Column::DrawDate, Expr::value(Utc::now()))
        .filter(raffle::Column::Id.eq(raffle_id))
        .filter(raffle::Column::Status.eq(RaffleStatus::Active))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::RaffleAlreadyFinalized { raffle_id });
    }

    let raffle = find_raffle(&txn, raffle_id).await?;
    let winner = match winning_ticket.as_ref().and_then(|t| t.claimed_by) {
        Some(user_id) => User::find_by_id(user_id).one(&txn).await?,
        None => None,
    };

    txn.commit().await?;

    info!(raffle_id, %number, has_winner = winner.is_some(), "Raffle finalized");
    Ok(RaffleDraw {
        raffle,
        winning_ticket,
        winner,
    })
}

/// Changes the status of a raffle directly. Creator-only; a finalized raffle
/// cannot be reopened.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn set_raffle_status(
    db: &DatabaseConnection,
    raffle_id: i64,
    status: RaffleStatus,
    actor: &user::Model,
) -> Result<raffle::Model> {
    let (raffle, roster) = raffle_with_roster(db, raffle_id).await?;
    roster.require_creator(actor.id)?;
    if raffle.status == RaffleStatus::Finalized && status == RaffleStatus::Active {
        return Err(Error::RaffleAlreadyFinalized { raffle_id });
    }

    let mut active: raffle::ActiveModel = raffle.into();
    active.status = Set(status);
    active.update(db).await.map_err(Into::into)
}

async fn member_club_ids(db: &DatabaseConnection, user: &user::Model) -> Result<Vec<i64>> {
    Ok(list_member_clubs(db, user)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect())
}

/// Active raffles of every club the user belongs to, newest first.
pub async fn list_active_raffles(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Vec<raffle::Model>> {
    Raffle::find()
        .filter(raffle::Column::ClubId.is_in(member_club_ids(db, user).await?))
        .filter(raffle::Column::Status.eq(RaffleStatus::Active))
        .order_by_desc(raffle::Column::CreatedAt)
        .order_by_desc(raffle::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Finalized raffles of every club the user belongs to, most recent draw first.
pub async fn list_finalized_raffles(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Vec<RaffleDraw>> {
    let raffles = Raffle::find()
        .filter(raffle::Column::ClubId.is_in(member_club_ids(db, user).await?))
        .filter(raffle::Column::Status.eq(RaffleStatus::Finalized))
        .order_by_desc(raffle::Column::DrawDate)
        .order_by_desc(raffle::Column::Id)
        .all(db)
        .await?;

    let mut draws = Vec::with_capacity(raffles.len());
    for raffle in raffles {
        let winning_ticket = match raffle.winning_number.as_deref() {
            Some(number) => find_ticket(db, raffle.id, number)
                .await?
                .filter(|t| t.state == TicketState::Taken),
            None => None,
        };
        let winner = match winning_ticket.as_ref().and_then(|t| t.claimed_by) {
            Some(user_id) => User::find_by_id(user_id).one(db).await?,
            None => None,
        };
        draws.push(RaffleDraw {
            raffle,
            winning_ticket,
            winner,
        });
    }
    Ok(draws)
}
