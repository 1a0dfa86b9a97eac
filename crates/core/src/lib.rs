//! Cantus domain logic.
//!
//! Pure, database-free building blocks shared by the `db` and `api` crates:
//! vocabularies, slug generation, form validation, moderation planning,
//! browse queries, blob storage, and sheet thumbnails.

pub mod accounts;
pub mod assets;
pub mod browse;
pub mod catalog;
pub mod error;
pub mod forms;
pub mod moderation;
pub mod slug;
pub mod storage;
pub mod submission;
pub mod thumbnail;
pub mod types;
