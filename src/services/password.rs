// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Argon2id password hashing.
//!
//! Both operations run on the blocking pool.

use crate::error::AppError;
use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};

/// Hash `password` into a PHC string.
pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Password hashing failed: {}", e)))
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Hashing task failed: {}", e)))?
}

/// Check `password` against a stored PHC string.
///
/// A malformed stored hash is an internal error, not a failed login.
pub async fn verify_password(password: &str, stored_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let stored_hash = stored_hash.to_string();
    tokio::task::spawn_blocking(move || -> Result<bool, AppError> {
        let parsed = PasswordHash::new(&stored_hash)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Stored hash unreadable: {}", e)))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Verification task failed: {}", e)))?
}
