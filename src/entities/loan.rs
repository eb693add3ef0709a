//! Loan entity - Money lent by a club to an outside borrower.
//!
//! The borrower is a third party described by free-text fields; the referrer
//! is the club member who vouches for them. Interest, total due and pending
//! amount are never stored: they are derived from `principal`,
//! `interest_rate` and `term_months` on every read (see `core::loan`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Approval decision on a loan. `Pending` may move once to either terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum LoanApproval {
    /// Awaiting the club creator
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Approved by the creator (or created by them)
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused by the creator
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Repayment status of a loan
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Outstanding
    #[sea_orm(string_value = "active")]
    Active,
    /// Fully repaid
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Marked overdue by the creator
    #[sea_orm(string_value = "overdue")]
    Overdue,
    /// Written off by the creator
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Loan database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    /// Unique identifier for the loan
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Lending club
    pub club_id: i64,
    /// Amount lent
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub principal: Decimal,
    /// Annual interest rate in percent
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub interest_rate: Decimal,
    /// Term in months
    pub term_months: i32,
    /// Disbursement date
    pub start_date: DateTimeUtc,
    /// `start_date` + 30 days per month of term
    pub due_date: DateTimeUtc,
    /// Borrower name (required)
    pub borrower_name: String,
    pub borrower_phone: Option<String>,
    pub borrower_email: Option<String>,
    pub borrower_address: Option<String>,
    /// Member vouching for the borrower
    pub referrer_id: i64,
    /// Approval decision
    pub approval: LoanApproval,
    /// Repayment status
    pub status: LoanStatus,
    /// Sum of approved payments (or the creator's override)
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount_paid: Decimal,
    pub notes: Option<String>,
    /// User who registered the loan
    pub created_by: i64,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Loan and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each loan belongs to one club
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id"
    )]
    Club,
    /// One loan has many payments
    #[sea_orm(has_many = "super::loan_payment::Entity")]
    Payments,
}

impl Related<super::club::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Club.def()
    }
}

impl Related<super::loan_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
