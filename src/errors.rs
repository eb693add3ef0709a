//! Unified error types for the savings club engine.
//!
//! Every expected failure has its own variant so the presentation layer can
//! render an accurate message. [`Error::kind`] folds the variants into the
//! coarse categories a request handler needs (not found, forbidden, ...).

use rust_decimal::Decimal;
use thiserror::Error;

/// Coarse classification of an [`Error`], used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced record does not exist
    NotFound,
    /// The caller is authenticated but lacks the required role
    Forbidden,
    /// The request is well-formed but violates a business rule
    Validation,
    /// The request lost a race against a concurrent writer
    Conflict,
    /// Infrastructure failure (database, I/O, configuration)
    Internal,
}

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    // --- not found ---
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    // --- forbidden ---
    #[error("Only the creator of club {club_id} can do this")]
    NotClubCreator { club_id: i64 },

    #[error("You are not a member of club {club_id}")]
    NotClubMember { club_id: i64 },

    #[error("Only the club creator or the referrer can view payments of loan {loan_id}")]
    NotLoanParticipant { loan_id: i64 },

    #[error("Invitation {invitation_id} is not addressed to you")]
    NotInvitee { invitation_id: i64 },

    #[error("You do not own {entity} {id}")]
    NotOwner { entity: &'static str, id: i64 },

    // --- validation ---
    #[error("Invalid amount: {amount}")]
    InvalidAmount { amount: Decimal },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Loan {loan_id} is already approved")]
    LoanAlreadyApproved { loan_id: i64 },

    #[error("Loan {loan_id} has already been approved or rejected")]
    LoanAlreadyDecided { loan_id: i64 },

    #[error("Amount paid {amount_paid} exceeds the loan total {total_due}")]
    AmountPaidExceedsTotal {
        amount_paid: Decimal,
        total_due: Decimal,
    },

    #[error("Payment {payment_id} is not pending approval")]
    PaymentNotPending { payment_id: i64 },

    #[error("Contribution {contribution_id} is already approved")]
    ContributionAlreadyApproved { contribution_id: i64 },

    #[error("Ledger entry {entry_id} is system generated and cannot be modified")]
    SystemEntryImmutable { entry_id: i64 },

    #[error("Ledger entries of kind {kind} can only be created by the system")]
    SystemEntryKind { kind: String },

    #[error("Raffle {raffle_id} is already finalized")]
    RaffleAlreadyFinalized { raffle_id: i64 },

    #[error("Raffle {raffle_id} has no taken tickets to draw from")]
    NoTakenTickets { raffle_id: i64 },

    #[error("Ticket {number} is not taken")]
    TicketNotTaken { number: String },

    #[error("You cannot invite yourself")]
    SelfInvitation,

    #[error("User {user_id} is already a member of this club")]
    AlreadyMember { user_id: i64 },

    #[error("User {user_id} already has a pending invitation")]
    InvitationAlreadyPending { user_id: i64 },

    #[error("Invitation {invitation_id} has already been processed")]
    InvitationAlreadyProcessed { invitation_id: i64 },

    #[error("Content type {content_type} is not allowed")]
    ContentTypeNotAllowed { content_type: String },

    #[error("File is too large: {size} bytes (limit {limit})")]
    FileTooLarge { size: i64, limit: i64 },

    // --- conflict ---
    #[error("Ticket {number} is not available")]
    TicketNotAvailable { number: String },
}

impl Error {
    /// Shorthand for a [`Error::NotFound`] on any displayable id.
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies the error for the calling layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::Database(_) | Self::Io(_) | Self::EnvVar(_) => {
                ErrorKind::Internal
            }
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NotClubCreator { .. }
            | Self::NotClubMember { .. }
            | Self::NotLoanParticipant { .. }
            | Self::NotInvitee { .. }
            | Self::NotOwner { .. } => ErrorKind::Forbidden,
            Self::TicketNotAvailable { .. } => ErrorKind::Conflict,
            Self::InvalidAmount { .. }
            | Self::InvalidInput { .. }
            | Self::LoanAlreadyApproved { .. }
            | Self::LoanAlreadyDecided { .. }
            | Self::AmountPaidExceedsTotal { .. }
            | Self::PaymentNotPending { .. }
            | Self::ContributionAlreadyApproved { .. }
            | Self::SystemEntryImmutable { .. }
            | Self::SystemEntryKind { .. }
            | Self::RaffleAlreadyFinalized { .. }
            | Self::NoTakenTickets { .. }
            | Self::TicketNotTaken { .. }
            | Self::SelfInvitation
            | Self::AlreadyMember { .. }
            | Self::InvitationAlreadyPending { .. }
            | Self::InvitationAlreadyProcessed { .. }
            | Self::ContentTypeNotAllowed { .. }
            | Self::FileTooLarge { .. } => ErrorKind::Validation,
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
