//! Core business logic - framework-agnostic operations on clubs, loans and the ledger.
//!
//! Every operation takes the database connection and the acting user
//! explicitly; authorization is checked through [`auth::ClubRoster`].

/// Club roles: creator and member checks
pub mod auth;
/// Receipt metadata for the external object store
pub mod attachment;
/// Clubs, membership and statistics
pub mod club;
/// Member contributions and their review
pub mod contribution;
/// Club invitations
pub mod invitation;
/// Per-club ledger and balance
pub mod ledger;
/// Loans, interest and approval
pub mod loan;
/// Loan payments and their approval gate
pub mod payment;
/// Club house rules
pub mod policy;
/// Lotteries and raffles
pub mod raffle;
/// Local mirror of identity-provider users
pub mod user;
