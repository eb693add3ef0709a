//! User business logic - Local mirror of identity-provider accounts.
//!
//! The identity provider owns authentication; this module only stores the
//! resolved account under its external UID and guarantees unique usernames.

use crate::{
    entities::{User, user},
    errors::{Error, Result},
};
use rand::Rng;
use sea_orm::{Set, prelude::*};
use tracing::{debug, info, instrument};

/// Numbered suffixes tried before falling back to a random one
const MAX_NUMBERED_SUFFIX: u32 = 100;

async fn username_taken<C>(db: &C, username: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .is_some())
}

/// Picks the first free username among `base`, `base1` .. `base100`, then
/// `base` followed by four random digits.
pub async fn unique_username<C>(db: &C, base: &str) -> Result<String>
where
    C: ConnectionTrait,
{
    if !username_taken(db, base).await? {
        return Ok(base.to_string());
    }

    for suffix in 1..=MAX_NUMBERED_SUFFIX {
        let candidate = format!("{base}{suffix}");
        if !username_taken(db, &candidate).await? {
            return Ok(candidate);
        }
    }

    let digits: u32 = rand::thread_rng().gen_range(0..10_000);
    Ok(format!("{base}{digits:04}"))
}

/// Stores a new user resolved by the identity provider.
///
/// The requested username is adjusted if already taken; see [`unique_username`].
#[instrument(skip(db))]
pub async fn create_user(
    db: &DatabaseConnection,
    external_uid: String,
    email: String,
    username: String,
    full_name: String,
) -> Result<user::Model> {
    let base = username.trim();
    if base.is_empty() {
        return Err(Error::InvalidInput {
            message: "username must not be empty".to_string(),
        });
    }

    let username = unique_username(db, base).await?;
    if username != base {
        debug!("Username {base} taken, using {username}");
    }

    let model = user::ActiveModel {
        external_uid: Set(external_uid),
        email: Set(email),
        username: Set(username),
        full_name: Set(full_name),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(user_id = model.id, username = %model.username, "User created");
    Ok(model)
}

pub async fn get_user_by_id(db: &DatabaseConnection, user_id: i64) -> Result<Option<user::Model>> {
    User::find_by_id(user_id).one(db).await.map_err(Into::into)
}

/// Looks a user up by the identity provider's UID.
pub async fn get_user_by_external_uid(
    db: &DatabaseConnection,
    external_uid: &str,
) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::ExternalUid.eq(external_uid))
        .one(db)
        .await
        .map_err(Into::into)
}

pub async fn get_user_by_email(db: &DatabaseConnection, email: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Loads a user or fails with `NotFound`.
pub(crate) async fn find_user<C>(db: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("User", user_id))
}
