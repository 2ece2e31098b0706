// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod account;
pub mod media;
pub mod password;
pub mod session;
pub mod token;

pub use account::{AccountService, NewAccount};
pub use media::{LocalFile, MediaService, MediaSlot};
pub use session::{LoginOutcome, SessionManager};
pub use token::{Claims, TokenError, TokenService};
