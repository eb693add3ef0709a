//! Ledger business logic - The club's books.
//!
//! Entries come from two sources:
//! - domain events (contribution approved, loan disbursed, interest earned,
//!   payment approved), written by [`project`] inside the transaction of the
//!   state change that caused them, at most once per event key;
//! - manual income and expense entries recorded by the club creator, which are
//!   the only entries that may later be edited or deleted.
//!
//! Aggregates are recomputed from the stored rows on every read.

use crate::{
    core::{auth::ClubRoster, loan::LoanTerms},
    entities::{
        LedgerEntry, LedgerKind, contribution, ledger_entry, loan, loan_payment, user,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Datelike, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, prelude::*, sea_query::OnConflict};
use std::ops::Range;
use tracing::{debug, info, instrument};

/// Category of the interest income entry of a loan
pub const INTEREST_CATEGORY: &str = "Interest on Loan";
/// Category of loan disbursement entries
pub const DISBURSEMENT_CATEGORY: &str = "Loan";
/// Category of loan payment entries
pub const PAYMENT_CATEGORY: &str = "Loan payment";

/// A state change that moves money and therefore must appear in the ledger.
#[derive(Debug, Clone, Copy)]
pub enum LedgerEvent<'a> {
    /// A contribution was approved by the club creator
    ContributionApproved {
        contribution: &'a contribution::Model,
        member_name: &'a str,
        approved_by: i64,
    },
    /// A loan was registered; recorded at its total with interest
    LoanDisbursed {
        loan: &'a loan::Model,
        referrer_name: &'a str,
    },
    /// A loan was approved, so its interest counts as income
    LoanInterestEarned {
        loan: &'a loan::Model,
        recorded_by: i64,
    },
    /// A loan payment reached the `APPROVED` state
    LoanPaymentApproved {
        loan: &'a loan::Model,
        payment: &'a loan_payment::Model,
        attributed_to: i64,
    },
}

impl LedgerEvent<'_> {
    /// Idempotency key: source entity id plus event kind.
    #[must_use]
    pub fn event_key(&self) -> String {
        match self {
            Self::ContributionApproved { contribution, .. } => {
                format!("contribution:{}:cash-contribution", contribution.id)
            }
            Self::LoanDisbursed { loan, .. } => format!("loan:{}:disbursement", loan.id),
            Self::LoanInterestEarned { loan, .. } => format!("loan:{}:interest-income", loan.id),
            Self::LoanPaymentApproved { payment, .. } => {
                format!("payment:{}:loan-payment", payment.id)
            }
        }
    }

    fn to_entry(self, now: DateTime<Utc>) -> ledger_entry::ActiveModel {
        let (club_id, kind, category, amount, description, created_by, contribution_id, loan_id) =
            match self {
                Self::ContributionApproved {
                    contribution,
                    member_name,
                    approved_by,
                } => (
                    contribution.club_id,
                    LedgerKind::CashContribution,
                    format!("Contribution {member_name}"),
                    contribution.amount,
                    format!(
                        "Contribution for {:02}/{}",
                        contribution.month, contribution.year
                    ),
                    approved_by,
                    Some(contribution.id),
                    None,
                ),
                Self::LoanDisbursed {
                    loan,
                    referrer_name,
                } => {
                    let terms = LoanTerms::from(loan);
                    (
                        loan.club_id,
                        LedgerKind::LoanDisbursement,
                        DISBURSEMENT_CATEGORY.to_string(),
                        terms.total_due(),
                        format!(
                            "Loan to {} (referrer: {referrer_name}) - principal {}, interest {}, total {}",
                            loan.borrower_name,
                            loan.principal,
                            terms.total_interest(),
                            terms.total_due()
                        ),
                        loan.created_by,
                        None,
                        Some(loan.id),
                    )
                }
                Self::LoanInterestEarned { loan, recorded_by } => (
                    loan.club_id,
                    LedgerKind::Income,
                    INTEREST_CATEGORY.to_string(),
                    LoanTerms::from(loan).total_interest(),
                    format!(
                        "Interest on loan to {} - {}% annual for {} months",
                        loan.borrower_name, loan.interest_rate, loan.term_months
                    ),
                    recorded_by,
                    None,
                    Some(loan.id),
                ),
                Self::LoanPaymentApproved {
                    loan,
                    payment,
                    attributed_to,
                } => (
                    loan.club_id,
                    LedgerKind::LoanPayment,
                    PAYMENT_CATEGORY.to_string(),
                    payment.amount,
                    format!("Payment of {} on loan #{}", payment.amount, loan.id),
                    attributed_to,
                    None,
                    Some(loan.id),
                ),
            };

        ledger_entry::ActiveModel {
            club_id: Set(club_id),
            kind: Set(kind),
            category: Set(category),
            amount: Set(amount),
            description: Set(Some(description)),
            occurred_at: Set(now),
            created_by: Set(created_by),
            contribution_id: Set(contribution_id),
            loan_id: Set(loan_id),
            event_key: Set(Some(self.event_key())),
            created_at: Set(now),
            ..Default::default()
        }
    }
}

/// Writes the ledger entry for `event` unless one with the same event key exists.
///
/// Returns `true` if a new entry was written. Run it on the transaction of the
/// state change that produced the event.
pub async fn project<C>(db: &C, event: LedgerEvent<'_>) -> Result<bool>
where
    C: ConnectionTrait,
{
    let key = event.event_key();
    let inserted = LedgerEntry::insert(event.to_entry(Utc::now()))
        .on_conflict(
            OnConflict::column(ledger_entry::Column::EventKey)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted == 0 {
        debug!(event_key = %key, "Ledger event already projected");
        Ok(false)
    } else {
        debug!(event_key = %key, "Ledger event projected");
        Ok(true)
    }
}

/// Input of a manual income or expense entry
#[derive(Debug, Clone)]
pub struct ManualEntry {
    pub kind: LedgerKind,
    pub category: String,
    pub amount: Decimal,
    pub description: Option<String>,
    /// Defaults to now
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Changes to a manual entry. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub kind: Option<LedgerKind>,
    pub category: Option<String>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Filter for [`list_entries`]
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    pub kind: Option<LedgerKind>,
    /// Calendar month, 1 to 12
    pub month: Option<u32>,
    pub year: Option<i32>,
}

impl EntryFilter {
    fn matches(&self, entry: &ledger_entry::Model) -> bool {
        self.kind.is_none_or(|k| k == entry.kind)
            && self.month.is_none_or(|m| m == entry.occurred_at.month())
            && self.year.is_none_or(|y| y == entry.occurred_at.year())
    }
}

/// Aggregated totals of a club's ledger
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerBalance {
    pub cash_contributions: Decimal,
    pub loan_disbursements: Decimal,
    /// Reported for information; not part of `available_capital`
    pub loan_payments: Decimal,
    pub income: Decimal,
    pub expenses: Decimal,
    /// `cash_contributions - loan_disbursements + income - expenses`
    pub available_capital: Decimal,
}

impl LedgerBalance {
    /// Folds entries into per-kind totals.
    #[must_use]
    pub fn tally<'a>(entries: impl IntoIterator<Item = &'a ledger_entry::Model>) -> Self {
        let mut balance = Self::default();
        for entry in entries {
            match entry.kind {
                LedgerKind::CashContribution => balance.cash_contributions += entry.amount,
                LedgerKind::LoanDisbursement => balance.loan_disbursements += entry.amount,
                LedgerKind::LoanPayment => balance.loan_payments += entry.amount,
                LedgerKind::Income => balance.income += entry.amount,
                LedgerKind::Expense => balance.expenses += entry.amount,
                LedgerKind::LoanPaymentPending => {}
            }
        }
        balance.available_capital =
            balance.cash_contributions - balance.loan_disbursements + balance.income
                - balance.expenses;
        balance
    }
}

fn validate_manual(kind: LedgerKind, amount: Decimal) -> Result<()> {
    if !kind.is_manual() {
        return Err(Error::SystemEntryKind {
            kind: format!("{kind:?}"),
        });
    }
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    Ok(())
}

async fn find_entry(db: &DatabaseConnection, entry_id: i64) -> Result<ledger_entry::Model> {
    LedgerEntry::find_by_id(entry_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Ledger entry", entry_id))
}

/// Loads a manual entry the actor may change.
async fn find_editable_entry(
    db: &DatabaseConnection,
    entry_id: i64,
    actor: &user::Model,
) -> Result<ledger_entry::Model> {
    let entry = find_entry(db, entry_id).await?;
    ClubRoster::load(db, entry.club_id)
        .await?
        .require_creator(actor.id)?;

    if entry.kind == LedgerKind::CashContribution || entry.event_key.is_some() {
        return Err(Error::SystemEntryImmutable { entry_id });
    }
    Ok(entry)
}

/// Records a manual income or expense entry. Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn record_manual_entry(
    db: &DatabaseConnection,
    club_id: i64,
    entry: ManualEntry,
    actor: &user::Model,
) -> Result<ledger_entry::Model> {
    validate_manual(entry.kind, entry.amount)?;
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    let now = Utc::now();
    let model = ledger_entry::ActiveModel {
        club_id: Set(club_id),
        kind: Set(entry.kind),
        category: Set(entry.category),
        amount: Set(entry.amount),
        description: Set(entry.description),
        occurred_at: Set(entry.occurred_at.unwrap_or(now)),
        created_by: Set(actor.id),
        contribution_id: Set(None),
        loan_id: Set(None),
        event_key: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(entry_id = model.id, kind = ?model.kind, amount = %model.amount, "Manual ledger entry recorded");
    Ok(model)
}

/// Edits a manual entry. Creator-only; system-generated entries are refused.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn update_manual_entry(
    db: &DatabaseConnection,
    entry_id: i64,
    patch: EntryPatch,
    actor: &user::Model,
) -> Result<ledger_entry::Model> {
    let entry = find_editable_entry(db, entry_id, actor).await?;
    validate_manual(
        patch.kind.unwrap_or(entry.kind),
        patch.amount.unwrap_or(entry.amount),
    )?;

    let mut active: ledger_entry::ActiveModel = entry.into();
    if let Some(kind) = patch.kind {
        active.kind = Set(kind);
    }
    if let Some(category) = patch.category {
        active.category = Set(category);
    }
    if let Some(amount) = patch.amount {
        active.amount = Set(amount);
    }
    if let Some(description) = patch.description {
        active.description = Set(Some(description));
    }
    if let Some(occurred_at) = patch.occurred_at {
        active.occurred_at = Set(occurred_at);
    }

    let updated = active.update(db).await?;
    info!(entry_id, "Manual ledger entry updated");
    Ok(updated)
}

/// Deletes a manual entry. Creator-only; system-generated entries are refused.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn delete_manual_entry(
    db: &DatabaseConnection,
    entry_id: i64,
    actor: &user::Model,
) -> Result<()> {
    let entry = find_editable_entry(db, entry_id, actor).await?;
    LedgerEntry::delete_by_id(entry.id).exec(db).await?;
    info!(entry_id, "Manual ledger entry deleted");
    Ok(())
}

/// Entries of a club matching `filter`, newest first. Member-only.
pub async fn list_entries(
    db: &DatabaseConnection,
    club_id: i64,
    filter: EntryFilter,
    actor: &user::Model,
) -> Result<Vec<ledger_entry::Model>> {
    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    let mut query = LedgerEntry::find().filter(ledger_entry::Column::ClubId.eq(club_id));
    if let Some(kind) = filter.kind {
        query = query.filter(ledger_entry::Column::Kind.eq(kind));
    }

    let mut entries = query
        .order_by_desc(ledger_entry::Column::OccurredAt)
        .order_by_desc(ledger_entry::Column::Id)
        .all(db)
        .await?;
    entries.retain(|e| filter.matches(e));
    Ok(entries)
}

/// Total amount of `kind` entries, optionally within `[range.start, range.end)`.
pub async fn sum<C>(
    db: &C,
    club_id: i64,
    kind: LedgerKind,
    range: Option<Range<DateTime<Utc>>>,
) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let mut query = LedgerEntry::find()
        .filter(ledger_entry::Column::ClubId.eq(club_id))
        .filter(ledger_entry::Column::Kind.eq(kind));
    if let Some(range) = range {
        query = query
            .filter(ledger_entry::Column::OccurredAt.gte(range.start))
            .filter(ledger_entry::Column::OccurredAt.lt(range.end));
    }

    Ok(query.all(db).await?.iter().map(|e| e.amount).sum())
}

/// Per-kind totals and available capital of a club. Member-only.
pub async fn balance(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<LedgerBalance> {
    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    let entries = LedgerEntry::find()
        .filter(ledger_entry::Column::ClubId.eq(club_id))
        .all(db)
        .await?;
    Ok(LedgerBalance::tally(&entries))
}

/// Entries linked to a loan, oldest first.
pub async fn entries_for_loan<C>(db: &C, loan_id: i64) -> Result<Vec<ledger_entry::Model>>
where
    C: ConnectionTrait,
{
    LedgerEntry::find()
        .filter(ledger_entry::Column::LoanId.eq(loan_id))
        .order_by_asc(ledger_entry::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
