// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User document store with typed operations.
//!
//! Two backends share one API:
//! - Firestore, for deployments (and the emulator)
//! - an in-process `DashMap`, for local development and tests
//!
//! Every write targets a single user document. Partial updates write only
//! the touched fields so concurrent writers to other fields are not clobbered;
//! concurrent writers to the same field are last-write-wins.

use crate::db::{collections, fields};
use crate::error::AppError;
use crate::models::User;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use firestore::FirestoreWritePrecondition;
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Attempts at a conditional refresh-token swap when unrelated writes keep
/// moving the document's update time.
const SWAP_ATTEMPTS: usize = 3;

/// Outcome of [`FirestoreDb::compare_and_set_refresh_token`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSwap {
    /// The stored token matched and now holds the new one.
    Swapped,
    /// The stored token differs (already rotated, cleared, or never issued).
    Mismatch,
    UserMissing,
}

/// Constant-time comparison of a presented refresh token with the stored slot.
pub fn refresh_token_matches(stored: Option<&str>, presented: &str) -> bool {
    stored
        .map(|stored| bool::from(stored.as_bytes().ct_eq(presented.as_bytes())))
        .unwrap_or(false)
}

/// User document store.
#[derive(Clone)]
pub struct FirestoreDb {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Firestore(firestore::FirestoreDb),
    Memory(Arc<DashMap<String, User>>),
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            backend: Backend::Firestore(client),
        })
    }

    /// Create an in-process store. Data lives as long as the last clone.
    pub fn new_in_memory() -> Self {
        Self {
            backend: Backend::Memory(Arc::new(DashMap::new())),
        }
    }

    // ─── Reads ───────────────────────────────────────────────────

    /// Get a user by ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => client
                .fluent()
                .select()
                .by_id_in(collections::USERS)
                .obj()
                .one(user_id)
                .await
                .map_err(|e| AppError::Database(e.to_string())),
            Backend::Memory(users) => Ok(users.get(user_id).map(|u| u.value().clone())),
        }
    }

    /// Get a user by (already lowercased) username.
    pub async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        self.find_one_by(fields::USERNAME, username).await
    }

    /// Get a user by email.
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        self.find_one_by(fields::EMAIL, email).await
    }

    /// Get the first user matching the username, else the email.
    pub async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, AppError> {
        if let Some(username) = username {
            if let Some(user) = self.find_by_username(username).await? {
                return Ok(Some(user));
            }
        }
        match email {
            Some(email) => self.find_by_email(email).await,
            None => Ok(None),
        }
    }

    async fn find_one_by(&self, field: &'static str, value: &str) -> Result<Option<User>, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                let value = value.to_string();
                let mut users: Vec<User> = client
                    .fluent()
                    .select()
                    .from(collections::USERS)
                    .filter(move |q| q.field(field).eq(value.clone()))
                    .limit(1)
                    .obj()
                    .query()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
                Ok(users.pop())
            }
            Backend::Memory(users) => Ok(users
                .iter()
                .find(|entry| match field {
                    fields::USERNAME => entry.username == value,
                    fields::EMAIL => entry.email == value,
                    _ => false,
                })
                .map(|entry| entry.value().clone())),
        }
    }

    /// Fail with `Conflict` if the username or email belongs to a user other
    /// than `except_id`.
    pub async fn ensure_unique(
        &self,
        username: &str,
        email: &str,
        except_id: Option<&str>,
    ) -> Result<(), AppError> {
        let is_other = |user: &User| Some(user.id.as_str()) != except_id;

        if let Some(user) = self.find_by_username(username).await? {
            if is_other(&user) {
                return Err(AppError::Conflict("Username already exists".to_string()));
            }
        }
        if let Some(user) = self.find_by_email(email).await? {
            if is_other(&user) {
                return Err(AppError::Conflict("Email already exists".to_string()));
            }
        }
        Ok(())
    }

    // ─── Writes ──────────────────────────────────────────────────

    /// Insert a new user after checking username/email uniqueness.
    pub async fn create_user(&self, user: &User) -> Result<(), AppError> {
        self.ensure_unique(&user.username, &user.email, None).await?;

        match &self.backend {
            Backend::Firestore(client) => {
                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::USERS)
                    .document_id(&user.id)
                    .object(user)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            Backend::Memory(users) => {
                users.insert(user.id.clone(), user.clone());
            }
        }

        tracing::debug!(user_id = %user.id, "User document created");
        Ok(())
    }

    /// Apply `apply` to the stored user and persist only the `mask` fields.
    ///
    /// Returns the updated user, or `None` if the user does not exist.
    pub async fn patch_user<F>(
        &self,
        user_id: &str,
        mask: &[&'static str],
        apply: F,
    ) -> Result<Option<User>, AppError>
    where
        F: FnOnce(&mut User),
    {
        match &self.backend {
            Backend::Firestore(client) => {
                let Some(mut user) = self.get_user(user_id).await? else {
                    return Ok(None);
                };
                apply(&mut user);

                // Without the precondition a concurrent delete would turn this
                // masked write into a stub document.
                let written: firestore::FirestoreResult<()> = client
                    .fluent()
                    .update()
                    .fields(mask.iter().copied())
                    .in_col(collections::USERS)
                    .precondition(FirestoreWritePrecondition::Exists(true))
                    .document_id(user_id)
                    .object(&user)
                    .execute()
                    .await;

                match written {
                    Ok(()) => Ok(Some(user)),
                    Err(e) => {
                        if self.get_user(user_id).await?.is_none() {
                            tracing::debug!(user_id, "User deleted during patch");
                            return Ok(None);
                        }
                        Err(AppError::Database(e.to_string()))
                    }
                }
            }
            Backend::Memory(users) => Ok(users.get_mut(user_id).map(|mut entry| {
                apply(entry.value_mut());
                entry.value().clone()
            })),
        }
    }

    /// Replace the user's single refresh-token slot (`None` clears it).
    ///
    /// Returns `false` if the user does not exist.
    pub async fn set_refresh_token(
        &self,
        user_id: &str,
        refresh_token: Option<&str>,
    ) -> Result<bool, AppError> {
        let token = refresh_token.map(str::to_string);
        let updated = self
            .patch_user(user_id, &[fields::REFRESH_TOKEN], move |user| {
                user.refresh_token = token;
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Replace the stored refresh token with `new` only if it still equals
    /// `expected`. The compare and the write are atomic with respect to other
    /// swaps, so a token can be exchanged at most once.
    pub async fn compare_and_set_refresh_token(
        &self,
        user_id: &str,
        expected: &str,
        new: &str,
    ) -> Result<RefreshSwap, AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                for attempt in 1..=SWAP_ATTEMPTS {
                    let Some((mut user, update_time)) = read_versioned(client, user_id).await?
                    else {
                        return Ok(RefreshSwap::UserMissing);
                    };
                    if !refresh_token_matches(user.refresh_token.as_deref(), expected) {
                        return Ok(RefreshSwap::Mismatch);
                    }
                    let update_time = update_time.ok_or_else(|| {
                        AppError::Database(format!("User {} has no update time", user_id))
                    })?;

                    user.refresh_token = Some(new.to_string());
                    let written: firestore::FirestoreResult<()> = client
                        .fluent()
                        .update()
                        .fields([fields::REFRESH_TOKEN])
                        .in_col(collections::USERS)
                        .precondition(FirestoreWritePrecondition::UpdateTime(update_time))
                        .document_id(user_id)
                        .object(&user)
                        .execute()
                        .await;

                    match written {
                        Ok(()) => return Ok(RefreshSwap::Swapped),
                        Err(e) => {
                            // The document moved since the read. Re-read to
                            // see whether the token itself changed.
                            tracing::debug!(user_id, attempt, error = %e, "Refresh token swap lost");
                            if attempt == SWAP_ATTEMPTS {
                                return Err(AppError::Database(e.to_string()));
                            }
                        }
                    }
                }
                Err(AppError::Database("Refresh token swap not attempted".to_string()))
            }
            Backend::Memory(users) => {
                let Some(mut entry) = users.get_mut(user_id) else {
                    return Ok(RefreshSwap::UserMissing);
                };
                if !refresh_token_matches(entry.refresh_token.as_deref(), expected) {
                    return Ok(RefreshSwap::Mismatch);
                }
                entry.refresh_token = Some(new.to_string());
                Ok(RefreshSwap::Swapped)
            }
        }
    }

    /// Delete a user document.
    pub async fn delete_user(&self, user_id: &str) -> Result<(), AppError> {
        match &self.backend {
            Backend::Firestore(client) => {
                client
                    .fluent()
                    .delete()
                    .from(collections::USERS)
                    .document_id(user_id)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;
            }
            Backend::Memory(users) => {
                users.remove(user_id);
            }
        }
        tracing::info!(user_id, "User document deleted");
        Ok(())
    }
}

/// Read a user together with the document's last update time.
async fn read_versioned(
    client: &firestore::FirestoreDb,
    user_id: &str,
) -> Result<Option<(User, Option<DateTime<Utc>>)>, AppError> {
    let doc = client
        .fluent()
        .select()
        .by_id_in(collections::USERS)
        .one(user_id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    let Some(doc) = doc else {
        return Ok(None);
    };

    let update_time = doc
        .update_time
        .as_ref()
        .and_then(|ts| DateTime::<Utc>::from_timestamp(ts.seconds, ts.nanos.max(0) as u32));
    let user: User = firestore::FirestoreDb::deserialize_doc_to(&doc)
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Some((user, update_time)))
}
