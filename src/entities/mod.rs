//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod attachment;
pub mod club;
pub mod club_member;
pub mod contribution;
pub mod invitation;
pub mod ledger_entry;
pub mod loan;
pub mod loan_payment;
pub mod policy;
pub mod raffle;
pub mod ticket;
pub mod user;

// Re-export specific types to avoid conflicts
pub use attachment::{Entity as Attachment, Model as AttachmentModel};
pub use club::{ClubStatus, Entity as Club, Model as ClubModel};
pub use club_member::{Entity as ClubMember, Model as ClubMemberModel};
pub use contribution::{ContributionStatus, Entity as Contribution, Model as ContributionModel};
pub use invitation::{Entity as Invitation, InvitationStatus, Model as InvitationModel};
pub use ledger_entry::{Entity as LedgerEntry, LedgerKind, Model as LedgerEntryModel};
pub use loan::{Entity as Loan, LoanApproval, LoanStatus, Model as LoanModel};
pub use loan_payment::{Entity as LoanPayment, Model as LoanPaymentModel, PaymentState};
pub use policy::{Entity as Policy, Model as PolicyModel};
pub use raffle::{Entity as Raffle, Model as RaffleModel, RaffleKind, RaffleStatus};
pub use ticket::{Entity as Ticket, Model as TicketModel, TicketState};
pub use user::{Entity as User, Model as UserModel};
