//! Attachment entity - Metadata of a receipt stored in the external object store.
//!
//! The file bytes never pass through this crate; `storage_key` is where the
//! caller put (or will put) them.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Attachment database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Original file name as uploaded
    pub file_name: String,
    /// Object-store key, `{club_id}/attachments/{uuid}{ext}`
    #[sea_orm(unique)]
    pub storage_key: String,
    /// MIME type
    pub content_type: String,
    pub size_bytes: i64,
    pub uploaded_at: DateTimeUtc,
    /// Set when attached to a contribution
    pub contribution_id: Option<i64>,
    /// Set when attached to a loan payment
    pub payment_id: Option<i64>,
    /// Uploader
    pub user_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
