//! Ledger entry entity - One money movement against a club's books.
//!
//! Amounts are always stored positive; direction is implied by `kind`.
//! Entries projected from domain events carry an `event_key` that is unique
//! across the table, which is what makes every projection idempotent.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Kind of money movement.
///
/// Stored by name, so values may be appended but never removed or renamed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "kebab-case")]
pub enum LedgerKind {
    /// Approved member contribution (system generated)
    #[sea_orm(string_value = "cash-contribution")]
    CashContribution,
    /// Money lent out, recorded at its total with interest
    #[sea_orm(string_value = "loan-disbursement")]
    LoanDisbursement,
    /// Approved repayment of a loan
    #[sea_orm(string_value = "loan-payment")]
    LoanPayment,
    /// Repayment reported but not yet approved
    #[sea_orm(string_value = "loan-payment-pending")]
    LoanPaymentPending,
    /// Interest and other income
    #[sea_orm(string_value = "income")]
    Income,
    /// Costs and expenses
    #[sea_orm(string_value = "expense")]
    Expense,
}

impl LedgerKind {
    /// Kinds a club creator may record by hand.
    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(self, Self::Income | Self::Expense)
    }
}

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Club whose books this entry belongs to
    pub club_id: i64,
    /// Direction and origin of the movement
    pub kind: LedgerKind,
    /// Free-text category (e.g. `"Interest on Loan"`)
    pub category: String,
    /// Always positive
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    /// Human-readable description
    pub description: Option<String>,
    /// When the movement happened
    pub occurred_at: DateTimeUtc,
    /// User the entry is attributed to
    pub created_by: i64,
    /// Source contribution, for `cash-contribution` entries
    pub contribution_id: Option<i64>,
    /// Source loan, for loan-related entries
    pub loan_id: Option<i64>,
    /// Idempotency key of the projected domain event, `None` for manual entries
    #[sea_orm(unique)]
    pub event_key: Option<String>,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `LedgerEntry` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to one club
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id"
    )]
    Club,
    /// Loan-related entries point at their loan
    #[sea_orm(
        belongs_to = "super::loan::Entity",
        from = "Column::LoanId",
        to = "super::loan::Column::Id"
    )]
    Loan,
    /// Contribution entries point at their contribution
    #[sea_orm(
        belongs_to = "super::contribution::Entity",
        from = "Column::ContributionId",
        to = "super::contribution::Column::Id"
    )]
    Contribution,
}

impl Related<super::club::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Club.def()
    }
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loan.def()
    }
}

impl Related<super::contribution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contribution.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
