//! Payment business logic - Repayments of loans and their approval gate.
//!
//! Only a payment in the `APPROVED` state moves `loan.amount_paid` and writes
//! a `loan-payment` ledger entry, and only the club creator can put a payment
//! in that state. Payments the creator submits are approved on the spot;
//! payments from other members wait in `PENDING` until the creator approves
//! or rejects them.

use crate::{
    core::{
        auth::{ClubRoster, is_referrer},
        ledger::{self, LedgerEvent},
        loan::{LoanTerms, find_loan},
    },
    entities::{Club, Loan, LoanPayment, LoanStatus, PaymentState, club, loan, loan_payment, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{JoinType, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// Result of a payment operation: the payment and its loan after the change
#[derive(Debug, Clone)]
pub struct PaymentOutcome {
    pub payment: loan_payment::Model,
    pub loan: loan::Model,
}

/// A pending payment as shown to the club creator
#[derive(Debug, Clone)]
pub struct PendingPayment {
    pub payment: loan_payment::Model,
    pub club_id: i64,
    pub borrower_name: String,
    pub loan_principal: Decimal,
}

/// Every payment of a loan, oldest first, with the loan itself
#[derive(Debug, Clone)]
pub struct LoanPayments {
    pub loan: loan::Model,
    pub payments: Vec<loan_payment::Model>,
}

async fn find_payment<C>(db: &C, payment_id: i64) -> Result<loan_payment::Model>
where
    C: ConnectionTrait,
{
    LoanPayment::find_by_id(payment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Payment", payment_id))
}

/// Adds an approved payment to its loan and books it in the ledger.
///
/// The increment is a single `amount_paid = amount_paid + x` statement; the
/// result is checked against the total due afterwards, and an overpayment
/// fails the caller's transaction.
async fn apply_approved_payment<C>(
    db: &C,
    loan_id: i64,
    payment: &loan_payment::Model,
    attributed_to: i64,
) -> Result<loan::Model>
where
    C: ConnectionTrait,
{
    Loan::update_many()
        .col_expr(
            loan::Column::AmountPaid,
            Expr::col(loan::Column::AmountPaid).add(payment.amount),
        )
        .col_expr(loan::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(loan::Column::Id.eq(loan_id))
        .exec(db)
        .await?;

    let mut loan = find_loan(db, loan_id).await?;
    // Column scale is 2.
    let amount_paid = loan.amount_paid.round_dp(2);
    let total_due = LoanTerms::from(&loan).total_due();
    if amount_paid > total_due {
        return Err(Error::AmountPaidExceedsTotal {
            amount_paid,
            total_due,
        });
    }

    if amount_paid >= total_due && loan.status != LoanStatus::Paid {
        Loan::update_many()
            .col_expr(loan::Column::Status, Expr::value(LoanStatus::Paid))
            .filter(loan::Column::Id.eq(loan_id))
            .exec(db)
            .await?;
        loan.status = LoanStatus::Paid;
        info!(loan_id, "Loan fully repaid");
    }

    ledger::project(
        db,
        LedgerEvent::LoanPaymentApproved {
            loan: &loan,
            payment,
            attributed_to,
        },
    )
    .await?;

    Ok(loan)
}

/// Registers a payment on a loan. Member-only.
///
/// From the club creator the payment is approved immediately and applied;
/// from anyone else it is stored as `PENDING` with no other effect.
#[instrument(skip(db, notes, actor), fields(actor_id = actor.id))]
pub async fn submit_payment(
    db: &DatabaseConnection,
    loan_id: i64,
    amount: Decimal,
    paid_at: Option<DateTime<Utc>>,
    notes: Option<String>,
    actor: &user::Model,
) -> Result<PaymentOutcome> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let loan = find_loan(&txn, loan_id).await?;
    let roster = ClubRoster::load(&txn, loan.club_id).await?;
    roster.require_member(actor.id)?;

    let now = Utc::now();
    let by_creator = roster.is_creator(actor.id);
    let payment = loan_payment::ActiveModel {
        loan_id: Set(loan_id),
        amount: Set(amount),
        paid_at: Set(paid_at.unwrap_or(now)),
        state: Set(if by_creator {
            PaymentState::Approved
        } else {
            PaymentState::Pending
        }),
        submitted_by: Set(actor.id),
        approved_by: Set(by_creator.then_some(actor.id)),
        approved_at: Set(by_creator.then_some(now)),
        notes: Set(notes),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let loan = if by_creator {
        apply_approved_payment(&txn, loan_id, &payment, actor.id).await?
    } else {
        loan
    };

    txn.commit().await?;

    info!(payment_id = payment.id, state = ?payment.state, %amount, "Payment submitted");
    Ok(PaymentOutcome { payment, loan })
}

/// Moves a pending payment to `state`; fails if another request got there first.
async fn settle_pending<C>(
    db: &C,
    payment_id: i64,
    state: PaymentState,
    actor_id: i64,
) -> Result<()>
where
    C: ConnectionTrait,
{
    let mut update = LoanPayment::update_many()
        .col_expr(loan_payment::Column::State, Expr::value(state))
        .filter(loan_payment::Column::Id.eq(payment_id))
        .filter(loan_payment::Column::State.eq(PaymentState::Pending));
    if state == PaymentState::Approved {
        update = update
            .col_expr(loan_payment::Column::ApprovedBy, Expr::value(actor_id))
            .col_expr(loan_payment::Column::ApprovedAt, Expr::value(Utc::now()));
    }

    if update.exec(db).await?.rows_affected == 1 {
        Ok(())
    } else {
        Err(Error::PaymentNotPending { payment_id })
    }
}

/// Approves a pending payment and applies it to the loan. Creator-only.
///
/// The ledger entry is attributed to the member who submitted the payment.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn approve_pending_payment(
    db: &DatabaseConnection,
    payment_id: i64,
    actor: &user::Model,
) -> Result<PaymentOutcome> {
    let txn = db.begin().await?;

    let payment = find_payment(&txn, payment_id).await?;
    let loan = find_loan(&txn, payment.loan_id).await?;
    ClubRoster::load(&txn, loan.club_id)
        .await?
        .require_creator(actor.id)?;

    settle_pending(&txn, payment_id, PaymentState::Approved, actor.id).await?;
    let payment = find_payment(&txn, payment_id).await?;
    let loan = apply_approved_payment(&txn, loan.id, &payment, payment.submitted_by).await?;

    txn.commit().await?;

    info!(payment_id, loan_id = loan.id, amount = %payment.amount, "Payment approved");
    Ok(PaymentOutcome { payment, loan })
}

/// Rejects a pending payment. Creator-only; the loan and ledger are untouched.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn reject_pending_payment(
    db: &DatabaseConnection,
    payment_id: i64,
    actor: &user::Model,
) -> Result<loan_payment::Model> {
    let txn = db.begin().await?;

    let payment = find_payment(&txn, payment_id).await?;
    let loan = find_loan(&txn, payment.loan_id).await?;
    ClubRoster::load(&txn, loan.club_id)
        .await?
        .require_creator(actor.id)?;

    settle_pending(&txn, payment_id, PaymentState::Rejected, actor.id).await?;
    let payment = find_payment(&txn, payment_id).await?;

    txn.commit().await?;

    info!(payment_id, "Payment rejected");
    Ok(payment)
}

/// Pending payments across every club the actor created, oldest first.
pub async fn list_pending_for_creator(
    db: &DatabaseConnection,
    actor: &user::Model,
) -> Result<Vec<PendingPayment>> {
    let club_ids: Vec<i64> = Club::find()
        .filter(club::Column::CreatorId.eq(actor.id))
        .all(db)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();
    if club_ids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = LoanPayment::find()
        .find_also_related(Loan)
        .filter(loan::Column::ClubId.is_in(club_ids))
        .filter(loan_payment::Column::State.eq(PaymentState::Pending))
        .order_by_asc(loan_payment::Column::PaidAt)
        .order_by_asc(loan_payment::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(payment, loan)| {
            loan.map(|loan| PendingPayment {
                payment,
                club_id: loan.club_id,
                borrower_name: loan.borrower_name,
                loan_principal: loan.principal,
            })
        })
        .collect())
}

/// Every payment of a loan, oldest first. Club creator or the loan's referrer only.
pub async fn list_payments_for_loan(
    db: &DatabaseConnection,
    loan_id: i64,
    actor: &user::Model,
) -> Result<LoanPayments> {
    let loan = find_loan(db, loan_id).await?;
    let roster = ClubRoster::load(db, loan.club_id).await?;
    if !roster.is_creator(actor.id) && !is_referrer(&loan, actor.id) {
        return Err(Error::NotLoanParticipant { loan_id });
    }

    let payments = LoanPayment::find()
        .filter(loan_payment::Column::LoanId.eq(loan_id))
        .order_by_asc(loan_payment::Column::PaidAt)
        .order_by_asc(loan_payment::Column::Id)
        .all(db)
        .await?;
    Ok(LoanPayments { loan, payments })
}

/// Number of payments awaiting approval in a club. Creator-only.
pub async fn count_pending_payments(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<u64> {
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    LoanPayment::find()
        .join(JoinType::InnerJoin, loan_payment::Relation::Loan.def())
        .filter(loan::Column::ClubId.eq(club_id))
        .filter(loan_payment::Column::State.eq(PaymentState::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Number of approved payments on loans the user vouches for.
pub async fn count_approved_referred_payments(
    db: &DatabaseConnection,
    user: &user::Model,
    club_id: Option<i64>,
) -> Result<u64> {
    let mut query = LoanPayment::find()
        .join(JoinType::InnerJoin, loan_payment::Relation::Loan.def())
        .filter(loan::Column::ReferrerId.eq(user.id))
        .filter(loan_payment::Column::State.eq(PaymentState::Approved));
    if let Some(club_id) = club_id {
        query = query.filter(loan::Column::ClubId.eq(club_id));
    }
    query.count(db).await.map_err(Into::into)
}
