//! Database layer (Firestore, or an in-process store for local runs).

pub mod firestore;

pub use firestore::{refresh_token_matches, FirestoreDb, RefreshSwap};

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
}

/// Stored field names (camelCase, as serialized).
pub mod fields {
    pub const USERNAME: &str = "username";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const FULLNAME: &str = "fullname";
    pub const AVATAR: &str = "avatar";
    pub const COVER_IMAGE: &str = "coverImage";
    pub const REFRESH_TOKEN: &str = "refreshToken";
    pub const UPDATED_AT: &str = "updatedAt";
}
