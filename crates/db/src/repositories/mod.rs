//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod session_repo;
pub mod song_asset_repo;
pub mod song_repo;
pub mod user_repo;

pub use session_repo::SessionRepo;
pub use song_asset_repo::SongAssetRepo;
pub use song_repo::{SongInsertError, SongRepo};
pub use user_repo::UserRepo;
