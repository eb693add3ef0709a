//! Receipt attachments - Metadata for files kept in the external object store.
//!
//! This module never sees file bytes. It validates an upload request, picks
//! the storage key and records the metadata; the caller moves the bytes.

use crate::{
    config::settings::AttachmentSettings,
    core::{auth::ClubRoster, loan::find_loan},
    entities::{Attachment, Contribution, LoanPayment, attachment, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::{info, instrument};
use uuid::Uuid;

/// Record an attachment hangs off
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentOwner {
    Contribution(i64),
    Payment(i64),
}

/// Who may touch the owner's attachments
struct OwnerAccess {
    club_id: i64,
    /// Contribution author or payment submitter
    uploader_id: i64,
}

async fn owner_access(db: &DatabaseConnection, owner: AttachmentOwner) -> Result<OwnerAccess> {
    match owner {
        AttachmentOwner::Contribution(id) => {
            let contribution = Contribution::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("Contribution", id))?;
            Ok(OwnerAccess {
                club_id: contribution.club_id,
                uploader_id: contribution.user_id,
            })
        }
        AttachmentOwner::Payment(id) => {
            let payment = LoanPayment::find_by_id(id)
                .one(db)
                .await?
                .ok_or_else(|| Error::not_found("Payment", id))?;
            let loan = find_loan(db, payment.loan_id).await?;
            Ok(OwnerAccess {
                club_id: loan.club_id,
                uploader_id: payment.submitted_by,
            })
        }
    }
}

const fn owner_entity(owner: AttachmentOwner) -> (&'static str, i64) {
    match owner {
        AttachmentOwner::Contribution(id) => ("Contribution", id),
        AttachmentOwner::Payment(id) => ("Payment", id),
    }
}

/// File extension for a content type, `.bin` when unknown.
fn extension_for(content_type: &str) -> &'static str {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match essence.as_str() {
        "application/pdf" => ".pdf",
        "image/jpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "application/msword" => ".doc",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        _ => ".bin",
    }
}

/// Validates an upload and records its metadata.
///
/// Only the author of the contribution, or the member who submitted the
/// payment, can attach a receipt. Returns the new record; its `storage_key`
/// is where the caller must upload the bytes.
#[instrument(skip(db, limits, actor), fields(actor_id = actor.id))]
pub async fn register_attachment(
    db: &DatabaseConnection,
    owner: AttachmentOwner,
    file_name: &str,
    content_type: &str,
    size_bytes: i64,
    actor: &user::Model,
    limits: &AttachmentSettings,
) -> Result<attachment::Model> {
    let access = owner_access(db, owner).await?;
    if access.uploader_id != actor.id {
        let (entity, id) = owner_entity(owner);
        return Err(Error::NotOwner { entity, id });
    }

    if !limits.allows(content_type) {
        return Err(Error::ContentTypeNotAllowed {
            content_type: content_type.to_string(),
        });
    }
    if size_bytes <= 0 {
        return Err(Error::InvalidInput {
            message: "attachment is empty".to_string(),
        });
    }
    if size_bytes > limits.max_size_bytes {
        return Err(Error::FileTooLarge {
            size: size_bytes,
            limit: limits.max_size_bytes,
        });
    }

    let storage_key = format!(
        "{}/attachments/{}{}",
        access.club_id,
        Uuid::new_v4(),
        extension_for(content_type)
    );
    let (contribution_id, payment_id) = match owner {
        AttachmentOwner::Contribution(id) => (Some(id), None),
        AttachmentOwner::Payment(id) => (None, Some(id)),
    };

    let attachment = attachment::ActiveModel {
        file_name: Set(file_name.to_string()),
        storage_key: Set(storage_key),
        content_type: Set(content_type.to_string()),
        size_bytes: Set(size_bytes),
        uploaded_at: Set(Utc::now()),
        contribution_id: Set(contribution_id),
        payment_id: Set(payment_id),
        user_id: Set(actor.id),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(attachment_id = attachment.id, key = %attachment.storage_key, "Attachment registered");
    Ok(attachment)
}

/// Attachments of a contribution or payment, oldest first.
///
/// Visible to the uploader and to every member of the club.
pub async fn list_attachments(
    db: &DatabaseConnection,
    owner: AttachmentOwner,
    actor: &user::Model,
) -> Result<Vec<attachment::Model>> {
    let access = owner_access(db, owner).await?;
    if access.uploader_id != actor.id {
        ClubRoster::load(db, access.club_id)
            .await?
            .require_member(actor.id)?;
    }

    let query = match owner {
        AttachmentOwner::Contribution(id) => {
            Attachment::find().filter(attachment::Column::ContributionId.eq(id))
        }
        AttachmentOwner::Payment(id) => {
            Attachment::find().filter(attachment::Column::PaymentId.eq(id))
        }
    };
    query
        .order_by_asc(attachment::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes an attachment record and returns its storage key so the caller can
/// remove the object. Uploader only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn delete_attachment(
    db: &DatabaseConnection,
    attachment_id: i64,
    actor: &user::Model,
) -> Result<String> {
    let attachment = Attachment::find_by_id(attachment_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Attachment", attachment_id))?;
    if attachment.user_id != actor.id {
        return Err(Error::NotOwner {
            entity: "Attachment",
            id: attachment_id,
        });
    }

    Attachment::delete_by_id(attachment_id).exec(db).await?;
    info!(attachment_id, "Attachment deleted");
    Ok(attachment.storage_key)
}
