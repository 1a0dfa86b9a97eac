//! Row structs and write DTOs.
//!
//! Choice columns are stored as short codes and decoded into the
//! `cantus_core` enums through `#[sqlx(try_from = "String")]`.

pub mod asset;
pub mod session;
pub mod song;
pub mod user;
