//! Loan business logic - Lending club money to outside borrowers.
//!
//! Interest is simple and pro-rated over the term:
//! `total_interest = principal * rate / 100 * term_months / 12`, rounded to
//! cents. None of the derived figures are stored; [`LoanTerms`] recomputes them
//! from the loan row every time, so a change to principal, rate or term can
//! never leave a stale total behind.
//!
//! Approval is a one-shot decision: `Pending` moves to `Approved` or
//! `Rejected` and stays there. Loans registered by the club creator start
//! approved.

use crate::{
    core::{
        auth::ClubRoster,
        ledger::{self, LedgerEvent},
        user::find_user,
    },
    entities::{Loan, LoanApproval, LoanStatus, loan, user},
    errors::{Error, Result},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument, warn};

/// Days counted per month of term when computing the due date
pub const DAYS_PER_TERM_MONTH: i64 = 30;

/// Largest interest rate the `Decimal(5, 2)` column holds
const MAX_INTEREST_RATE: Decimal = Decimal::from_parts(99_999, 0, 0, false, 2);

/// The inputs of the interest formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanTerms {
    pub principal: Decimal,
    /// Annual rate in percent
    pub interest_rate: Decimal,
    pub term_months: i32,
}

impl From<&loan::Model> for LoanTerms {
    fn from(loan: &loan::Model) -> Self {
        Self {
            principal: loan.principal,
            interest_rate: loan.interest_rate,
            term_months: loan.term_months,
        }
    }
}

impl LoanTerms {
    #[must_use]
    pub fn total_interest(&self) -> Decimal {
        // Multiply before dividing so a term like 7/12 is never truncated early.
        (self.principal * self.interest_rate * Decimal::from(self.term_months)
            / Decimal::from(1200))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    #[must_use]
    pub fn total_due(&self) -> Decimal {
        self.principal.round_dp(2) + self.total_interest()
    }

    fn validate(&self) -> Result<()> {
        if self.principal <= Decimal::ZERO {
            return Err(Error::InvalidAmount {
                amount: self.principal,
            });
        }
        if self.interest_rate < Decimal::ZERO || self.interest_rate > MAX_INTEREST_RATE {
            return Err(Error::InvalidInput {
                message: format!("interest rate {} is out of range", self.interest_rate),
            });
        }
        if self.term_months <= 0 {
            return Err(Error::InvalidInput {
                message: format!("term of {} months is not positive", self.term_months),
            });
        }
        Ok(())
    }
}

/// `start + 30 days per month of term`
#[must_use]
pub fn due_date(start: DateTime<Utc>, term_months: i32) -> DateTime<Utc> {
    start + Duration::days(DAYS_PER_TERM_MONTH * i64::from(term_months))
}

/// A loan with its derived figures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanDetail {
    pub loan: loan::Model,
    pub total_interest: Decimal,
    pub total_due: Decimal,
    /// `total_due - amount_paid`
    pub amount_pending: Decimal,
    /// Whole days until the due date, never negative
    pub days_remaining: i64,
}

impl LoanDetail {
    #[must_use]
    pub fn new(loan: loan::Model, now: DateTime<Utc>) -> Self {
        let terms = LoanTerms::from(&loan);
        let total_due = terms.total_due();
        Self {
            total_interest: terms.total_interest(),
            total_due,
            amount_pending: total_due - loan.amount_paid.round_dp(2),
            days_remaining: (loan.due_date - now).num_days().max(0),
            loan,
        }
    }
}

/// Aggregate view over every loan of a club
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanSummary {
    pub active_count: u64,
    /// Sum of principal over all loans
    pub principal_lent: Decimal,
    /// Sum of `amount_paid` over all loans
    pub amount_recovered: Decimal,
    /// Sum of `amount_pending` over active loans only
    pub amount_outstanding: Decimal,
}

impl LoanSummary {
    #[must_use]
    pub fn from_loans<'a>(loans: impl IntoIterator<Item = &'a loan::Model>) -> Self {
        let mut summary = Self::default();
        for loan in loans {
            // Stored amounts may carry float noise past the cent.
            let amount_paid = loan.amount_paid.round_dp(2);
            summary.principal_lent += loan.principal.round_dp(2);
            summary.amount_recovered += amount_paid;
            if loan.status == LoanStatus::Active {
                summary.active_count += 1;
                summary.amount_outstanding += LoanTerms::from(loan).total_due() - amount_paid;
            }
        }
        summary
    }
}

/// Contact details of the outside borrower
#[derive(Debug, Clone, Default)]
pub struct Borrower {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Input of [`create_loan`]
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub terms: LoanTerms,
    /// Defaults to now
    pub start_date: Option<DateTime<Utc>>,
    pub borrower: Borrower,
    /// Member vouching for the borrower
    pub referrer_id: i64,
    pub notes: Option<String>,
}

/// Administrative changes to a loan. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub status: Option<LoanStatus>,
    pub notes: Option<String>,
    pub principal: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    /// Overrides the sum of approved payments
    pub amount_paid: Option<Decimal>,
}

/// Filter for [`list_loans`]
#[derive(Debug, Clone, Copy, Default)]
pub struct LoanFilter {
    pub status: Option<LoanStatus>,
    pub referrer_id: Option<i64>,
}

/// Loans of a club split by approval decision, each newest first
#[derive(Debug, Clone, Default)]
pub struct LoanListing {
    pub approved: Vec<loan::Model>,
    pub rejected: Vec<loan::Model>,
    pub pending: Vec<loan::Model>,
}

/// Loads a loan or fails with `NotFound`.
pub async fn find_loan<C>(db: &C, loan_id: i64) -> Result<loan::Model>
where
    C: ConnectionTrait,
{
    Loan::find_by_id(loan_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Loan", loan_id))
}

/// Registers a loan and writes its disbursement to the ledger.
///
/// The loan is approved on creation when `actor` is the club creator, in
/// which case the interest is booked as income straight away; otherwise it
/// waits for [`approve_loan`].
#[instrument(skip(db, new, actor), fields(actor_id = actor.id, principal = %new.terms.principal))]
pub async fn create_loan(
    db: &DatabaseConnection,
    club_id: i64,
    new: NewLoan,
    actor: &user::Model,
) -> Result<loan::Model> {
    new.terms.validate()?;
    if new.borrower.name.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "borrower name must not be empty".to_string(),
        });
    }

    let txn = db.begin().await?;

    let roster = ClubRoster::load(&txn, club_id).await?;
    roster.require_member(actor.id)?;
    let referrer = find_user(&txn, new.referrer_id).await?;

    let approval = if roster.is_creator(actor.id) {
        LoanApproval::Approved
    } else {
        LoanApproval::Pending
    };
    let now = Utc::now();
    let start_date = new.start_date.unwrap_or(now);

    let loan = loan::ActiveModel {
        club_id: Set(club_id),
        principal: Set(new.terms.principal),
        interest_rate: Set(new.terms.interest_rate),
        term_months: Set(new.terms.term_months),
        start_date: Set(start_date),
        due_date: Set(due_date(start_date, new.terms.term_months)),
        borrower_name: Set(new.borrower.name.trim().to_string()),
        borrower_phone: Set(new.borrower.phone),
        borrower_email: Set(new.borrower.email),
        borrower_address: Set(new.borrower.address),
        referrer_id: Set(referrer.id),
        approval: Set(approval),
        status: Set(LoanStatus::Active),
        amount_paid: Set(Decimal::ZERO),
        notes: Set(new.notes),
        created_by: Set(actor.id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    ledger::project(
        &txn,
        LedgerEvent::LoanDisbursed {
            loan: &loan,
            referrer_name: &referrer.full_name,
        },
    )
    .await?;

    if approval == LoanApproval::Approved {
        ledger::project(
            &txn,
            LedgerEvent::LoanInterestEarned {
                loan: &loan,
                recorded_by: actor.id,
            },
        )
        .await?;
    }

    txn.commit().await?;

    info!(loan_id = loan.id, approval = ?loan.approval, "Loan created");
    Ok(loan)
}

/// Moves a pending loan to `decision`, failing if it was already decided.
async fn decide<C>(db: &C, loan: &loan::Model, decision: LoanApproval) -> Result<()>
where
    C: ConnectionTrait,
{
    let result = Loan::update_many()
        .col_expr(loan::Column::Approval, Expr::value(decision))
        .col_expr(loan::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(loan::Column::Id.eq(loan.id))
        .filter(loan::Column::Approval.eq(LoanApproval::Pending))
        .exec(db)
        .await?;

    if result.rows_affected == 1 {
        return Ok(());
    }

    let current = find_loan(db, loan.id).await?;
    Err(match (decision, current.approval) {
        (LoanApproval::Approved, LoanApproval::Approved) => {
            Error::LoanAlreadyApproved { loan_id: loan.id }
        }
        _ => Error::LoanAlreadyDecided { loan_id: loan.id },
    })
}

/// Approves a pending loan and books its interest as income. Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn approve_loan(
    db: &DatabaseConnection,
    loan_id: i64,
    actor: &user::Model,
) -> Result<loan::Model> {
    let txn = db.begin().await?;

    let loan = find_loan(&txn, loan_id).await?;
    ClubRoster::load(&txn, loan.club_id)
        .await?
        .require_creator(actor.id)?;

    decide(&txn, &loan, LoanApproval::Approved).await?;
    let loan = find_loan(&txn, loan_id).await?;

    let booked = ledger::project(
        &txn,
        LedgerEvent::LoanInterestEarned {
            loan: &loan,
            recorded_by: actor.id,
        },
    )
    .await?;
    if !booked {
        warn!(loan_id, "Interest income was already booked for this loan");
    }

    txn.commit().await?;

    info!(loan_id, "Loan approved");
    Ok(loan)
}

/// Rejects a pending loan. Creator-only; no ledger effect.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn reject_loan(
    db: &DatabaseConnection,
    loan_id: i64,
    actor: &user::Model,
) -> Result<loan::Model> {
    let txn = db.begin().await?;

    let loan = find_loan(&txn, loan_id).await?;
    ClubRoster::load(&txn, loan.club_id)
        .await?
        .require_creator(actor.id)?;

    decide(&txn, &loan, LoanApproval::Rejected).await?;
    let loan = find_loan(&txn, loan_id).await?;

    txn.commit().await?;

    info!(loan_id, "Loan rejected");
    Ok(loan)
}

/// Applies an administrative patch to a loan. Creator-only.
///
/// The resulting `amount_paid` may not exceed the total due under the
/// resulting principal and rate; reaching it marks the loan paid.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn update_loan(
    db: &DatabaseConnection,
    loan_id: i64,
    patch: LoanPatch,
    actor: &user::Model,
) -> Result<loan::Model> {
    let txn = db.begin().await?;

    let loan = find_loan(&txn, loan_id).await?;
    ClubRoster::load(&txn, loan.club_id)
        .await?
        .require_creator(actor.id)?;

    let terms = LoanTerms {
        principal: patch.principal.unwrap_or(loan.principal),
        interest_rate: patch.interest_rate.unwrap_or(loan.interest_rate),
        term_months: loan.term_months,
    };
    terms.validate()?;

    let amount_paid = patch.amount_paid.unwrap_or(loan.amount_paid).round_dp(2);
    if amount_paid < Decimal::ZERO {
        return Err(Error::InvalidAmount {
            amount: amount_paid,
        });
    }
    let total_due = terms.total_due();
    if amount_paid > total_due {
        return Err(Error::AmountPaidExceedsTotal {
            amount_paid,
            total_due,
        });
    }

    let touches_balance =
        patch.amount_paid.is_some() || patch.principal.is_some() || patch.interest_rate.is_some();

    let mut active: loan::ActiveModel = loan.into();
    if let Some(status) = patch.status {
        active.status = Set(status);
    }
    if let Some(notes) = patch.notes {
        active.notes = Set(Some(notes));
    }
    if let Some(principal) = patch.principal {
        active.principal = Set(principal);
    }
    if let Some(rate) = patch.interest_rate {
        active.interest_rate = Set(rate);
    }
    if let Some(paid) = patch.amount_paid {
        active.amount_paid = Set(paid);
    }
    if touches_balance && amount_paid >= total_due {
        active.status = Set(LoanStatus::Paid);
    }
    active.updated_at = Set(Utc::now());

    let updated = active.update(&txn).await?;
    txn.commit().await?;

    info!(loan_id, status = ?updated.status, "Loan updated");
    Ok(updated)
}

/// A loan with its derived figures. Member-only.
pub async fn loan_detail(
    db: &DatabaseConnection,
    loan_id: i64,
    actor: &user::Model,
) -> Result<LoanDetail> {
    let loan = find_loan(db, loan_id).await?;
    ClubRoster::load(db, loan.club_id)
        .await?
        .require_member(actor.id)?;
    Ok(LoanDetail::new(loan, Utc::now()))
}

/// Aggregates over every loan of a club. Member-only.
pub async fn loan_summary(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<LoanSummary> {
    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    let loans = Loan::find()
        .filter(loan::Column::ClubId.eq(club_id))
        .all(db)
        .await?;
    Ok(LoanSummary::from_loans(&loans))
}

/// Loans of a club grouped by approval decision. Member-only.
pub async fn list_loans(
    db: &DatabaseConnection,
    club_id: i64,
    filter: LoanFilter,
    actor: &user::Model,
) -> Result<LoanListing> {
    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    let mut query = Loan::find().filter(loan::Column::ClubId.eq(club_id));
    if let Some(status) = filter.status {
        query = query.filter(loan::Column::Status.eq(status));
    }
    if let Some(referrer_id) = filter.referrer_id {
        query = query.filter(loan::Column::ReferrerId.eq(referrer_id));
    }

    let loans = query
        .order_by_desc(loan::Column::CreatedAt)
        .order_by_desc(loan::Column::Id)
        .all(db)
        .await?;

    let mut listing = LoanListing::default();
    for loan in loans {
        match loan.approval {
            LoanApproval::Approved => listing.approved.push(loan),
            LoanApproval::Rejected => listing.rejected.push(loan),
            LoanApproval::Pending => listing.pending.push(loan),
        }
    }
    Ok(listing)
}

/// Number of loans awaiting approval. Creator-only.
pub async fn count_pending_loans(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<u64> {
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    Loan::find()
        .filter(loan::Column::ClubId.eq(club_id))
        .filter(loan::Column::Approval.eq(LoanApproval::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Number of active loans the user vouches for, optionally within one club.
pub async fn count_active_referred_loans(
    db: &DatabaseConnection,
    user: &user::Model,
    club_id: Option<i64>,
) -> Result<u64> {
    let mut query = Loan::find()
        .filter(loan::Column::ReferrerId.eq(user.id))
        .filter(loan::Column::Status.eq(LoanStatus::Active));
    if let Some(club_id) = club_id {
        query = query.filter(loan::Column::ClubId.eq(club_id));
    }
    query.count(db).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::{EntryFilter, INTEREST_CATEGORY, entries_for_loan};
    use crate::entities::LedgerKind;
    use crate::test_utils::*;
    use chrono::TimeZone;
    use rust_decimal::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn terms(principal: Decimal, rate: Decimal, term_months: i32) -> LoanTerms {
        LoanTerms {
            principal,
            interest_rate: rate,
            term_months,
        }
    }

    #[test]
    fn test_interest_formula() {
        let t = terms(dec!(1000.00), dec!(12), 6);
        assert_eq!(t.total_interest(), dec!(60.00));
        assert_eq!(t.total_due(), dec!(1060.00));

        // 1000 * 5% * 7/12 = 29.1666... rounds to 29.17
        let t = terms(dec!(1000.00), dec!(5), 7);
        assert_eq!(t.total_interest(), dec!(29.17));
        assert_eq!(t.total_due(), dec!(1029.17));

        assert_eq!(terms(dec!(250.00), dec!(0), 3).total_due(), dec!(250.00));
    }

    #[test]
    fn test_due_date_and_days_remaining() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let due = due_date(start, 6);
        assert_eq!(due, Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap());

        let mut loan = loan_model(1, 1, dec!(1000.00), dec!(12), 6);
        loan.due_date = due;
        loan.amount_paid = dec!(200.00);

        let detail = LoanDetail::new(loan.clone(), start);
        assert_eq!(detail.days_remaining, 180);
        assert_eq!(detail.amount_pending, dec!(860.00));

        let late = Utc.with_ymd_and_hms(2025, 8, 1, 0, 0, 0).unwrap();
        assert_eq!(LoanDetail::new(loan, late).days_remaining, 0);
    }

    #[test]
    fn test_summary_counts_only_active_outstanding() {
        let active = loan_model(1, 1, dec!(1000.00), dec!(12), 6);
        let mut paid = loan_model(2, 1, dec!(500.00), dec!(12), 12);
        paid.status = LoanStatus::Paid;
        paid.amount_paid = dec!(560.00);

        let summary = LoanSummary::from_loans([&active, &paid]);
        assert_eq!(summary.active_count, 1);
        assert_eq!(summary.principal_lent, dec!(1500.00));
        assert_eq!(summary.amount_recovered, dec!(560.00));
        assert_eq!(summary.amount_outstanding, dec!(1060.00));
    }

    #[test]
    fn test_summary_rounds_stored_amounts_to_cents() {
        let mut loan = loan_model(1, 1, dec!(1000.00), dec!(12), 6);
        loan.amount_paid = dec!(0.30000000000000004);

        let summary = LoanSummary::from_loans([&loan]);
        assert_eq!(summary.amount_recovered, dec!(0.30));
        assert_eq!(summary.amount_outstanding, dec!(1059.70));
        assert_eq!(
            summary.amount_outstanding,
            LoanDetail::new(loan, Utc::now()).amount_pending
        );
    }

    #[tokio::test]
    async fn test_create_loan_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let actor = user_model(1, "ana");
        let mut new = new_loan(1, dec!(1000.00), dec!(12), 6);

        new.terms.principal = dec!(0);
        let err = create_loan(&db, 1, new.clone(), &actor).await.unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }));

        new.terms.principal = dec!(1000.00);
        new.terms.term_months = 0;
        let err = create_loan(&db, 1, new.clone(), &actor).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        new.terms.term_months = 6;
        new.borrower.name = " ".to_string();
        let err = create_loan(&db, 1, new, &actor).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_member_loan_is_pending_with_disbursement() -> Result<()> {
        init_test_tracing();
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        assert_eq!(club.monthly_amount, dec!(50.00));

        let loan = create_test_loan(&db, &club, &member).await?;
        assert_eq!(loan.approval, LoanApproval::Pending);
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.amount_paid, Decimal::ZERO);

        let entries = entries_for_loan(&db, loan.id).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LedgerKind::LoanDisbursement);
        assert_eq!(entries[0].amount, dec!(1060.00));

        let detail = loan_detail(&db, loan.id, &creator).await?;
        assert_eq!(detail.total_interest, dec!(60.00));
        assert_eq!(detail.total_due, dec!(1060.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_creator_loan_is_approved_with_interest() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, _member, club) = setup_club_with_member(&db).await?;

        let loan = create_test_loan(&db, &club, &creator).await?;
        assert_eq!(loan.approval, LoanApproval::Approved);

        let entries = entries_for_loan(&db, loan.id).await?;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].kind, LedgerKind::Income);
        assert_eq!(entries[1].category, INTEREST_CATEGORY);
        assert_eq!(entries[1].amount, dec!(60.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_approve_twice_books_interest_once() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let loan = create_test_loan(&db, &club, &member).await?;

        let err = approve_loan(&db, loan.id, &member).await.unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));

        let approved = approve_loan(&db, loan.id, &creator).await?;
        assert_eq!(approved.approval, LoanApproval::Approved);

        let err = approve_loan(&db, loan.id, &creator).await.unwrap_err();
        assert!(matches!(err, Error::LoanAlreadyApproved { .. }));
        assert_eq!(err.kind(), crate::errors::ErrorKind::Validation);

        let income = crate::core::ledger::list_entries(
            &db,
            club.id,
            EntryFilter {
                kind: Some(LedgerKind::Income),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(income.len(), 1);
        assert_eq!(income[0].amount, dec!(60.00));
        Ok(())
    }

    #[tokio::test]
    async fn test_reject_only_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let loan = create_test_loan(&db, &club, &member).await?;

        let rejected = reject_loan(&db, loan.id, &creator).await?;
        assert_eq!(rejected.approval, LoanApproval::Rejected);

        let err = reject_loan(&db, loan.id, &creator).await.unwrap_err();
        assert!(matches!(err, Error::LoanAlreadyDecided { .. }));
        let err = approve_loan(&db, loan.id, &creator).await.unwrap_err();
        assert!(matches!(err, Error::LoanAlreadyDecided { .. }));

        assert_eq!(entries_for_loan(&db, loan.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_amount_paid_override() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let loan = create_test_loan(&db, &club, &member).await?;

        let err = update_loan(
            &db,
            loan.id,
            LoanPatch {
                amount_paid: Some(dec!(1100.00)),
                ..Default::default()
            },
            &creator,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AmountPaidExceedsTotal { .. }));

        let err = update_loan(&db, loan.id, LoanPatch::default(), &member)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));

        let partial = update_loan(
            &db,
            loan.id,
            LoanPatch {
                amount_paid: Some(dec!(500.00)),
                notes: Some("paid in cash".to_string()),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(partial.status, LoanStatus::Active);
        assert_eq!(partial.notes.as_deref(), Some("paid in cash"));

        let paid = update_loan(
            &db,
            loan.id,
            LoanPatch {
                amount_paid: Some(dec!(1060.00)),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(paid.status, LoanStatus::Paid);
        Ok(())
    }

    #[tokio::test]
    async fn test_administrative_status_changes() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let late = create_test_loan(&db, &club, &member).await?;
        let written_off = create_test_loan(&db, &club, &member).await?;

        let overdue = update_loan(
            &db,
            late.id,
            LoanPatch {
                status: Some(LoanStatus::Overdue),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(overdue.status, LoanStatus::Overdue);
        assert_eq!(overdue.amount_paid, Decimal::ZERO);

        let cancelled = update_loan(
            &db,
            written_off.id,
            LoanPatch {
                status: Some(LoanStatus::Cancelled),
                notes: Some("borrower moved away".to_string()),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(cancelled.status, LoanStatus::Cancelled);

        // Changing notes alone must not re-derive the status.
        let still_overdue = update_loan(
            &db,
            late.id,
            LoanPatch {
                notes: Some("called twice".to_string()),
                ..Default::default()
            },
            &creator,
        )
        .await?;
        assert_eq!(still_overdue.status, LoanStatus::Overdue);

        let summary = loan_summary(&db, club.id, &member).await?;
        assert_eq!(summary.active_count, 0);
        assert_eq!(summary.amount_outstanding, Decimal::ZERO);
        assert_eq!(summary.principal_lent, dec!(2000.00));
        assert_eq!(count_active_referred_loans(&db, &member, Some(club.id)).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_lowering_principal_below_paid_is_refused() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let loan = create_test_loan(&db, &club, &member).await?;
        update_loan(
            &db,
            loan.id,
            LoanPatch {
                amount_paid: Some(dec!(800.00)),
                ..Default::default()
            },
            &creator,
        )
        .await?;

        let err = update_loan(
            &db,
            loan.id,
            LoanPatch {
                principal: Some(dec!(500.00)),
                ..Default::default()
            },
            &creator,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::AmountPaidExceedsTotal { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_and_counts() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let outsider = create_test_user(&db, "zoe").await?;

        create_test_loan(&db, &club, &creator).await?;
        let pending = create_test_loan(&db, &club, &member).await?;
        let rejected = create_test_loan(&db, &club, &member).await?;
        reject_loan(&db, rejected.id, &creator).await?;

        let listing = list_loans(&db, club.id, LoanFilter::default(), &member).await?;
        assert_eq!(listing.approved.len(), 1);
        assert_eq!(listing.rejected.len(), 1);
        assert_eq!(listing.pending.len(), 1);
        assert_eq!(listing.pending[0].id, pending.id);

        let err = list_loans(&db, club.id, LoanFilter::default(), &outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotClubMember { .. }));

        assert_eq!(count_pending_loans(&db, club.id, &creator).await?, 1);
        assert!(count_pending_loans(&db, club.id, &member).await.is_err());
        // Rejection leaves the repayment status untouched.
        assert_eq!(count_active_referred_loans(&db, &member, Some(club.id)).await?, 2);
        assert_eq!(count_active_referred_loans(&db, &creator, None).await?, 1);

        let summary = loan_summary(&db, club.id, &member).await?;
        assert_eq!(summary.active_count, 3);
        assert_eq!(summary.principal_lent, dec!(3000.00));
        assert_eq!(summary.amount_outstanding, dec!(3180.00));
        Ok(())
    }
}
