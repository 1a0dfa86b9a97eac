//! Refresh sessions behind `/accounts/refresh` and `/accounts/logout`.
//!
//! A session row stores only the SHA-256 of its refresh token. Rotation
//! consumes the row with a single conditional `UPDATE`, so one token can
//! mint at most one successor even when presented concurrently.

use cantus_core::types::DbId;
use sqlx::PgPool;

use crate::models::session::{CreateSession, UserSession};

const SESSION_COLUMNS: &str = "id, user_id, refresh_token_hash, expires_at, is_revoked, \
                               user_agent, created_at, updated_at";

/// A session still usable for rotation.
const LIVE: &str = "is_revoked = false AND expires_at > NOW()";

pub struct SessionRepo;

impl SessionRepo {
    /// Open a session for a freshly issued refresh token.
    pub async fn open(pool: &PgPool, input: &CreateSession) -> Result<UserSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions (user_id, refresh_token_hash, expires_at, user_agent) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(input.user_id)
            .bind(&input.refresh_token_hash)
            .bind(input.expires_at)
            .bind(&input.user_agent)
            .fetch_one(pool)
            .await
    }

    /// Spend the live session holding `token_hash`.
    ///
    /// Returns the session as it was consumed, or `None` when the token is
    /// unknown, expired, or already spent. Of two concurrent calls with the
    /// same hash, the second waits on the row lock and then matches nothing.
    pub async fn consume(pool: &PgPool, token_hash: &str) -> Result<Option<UserSession>, sqlx::Error> {
        let query = format!(
            "UPDATE user_sessions SET is_revoked = true \
             WHERE refresh_token_hash = $1 AND {LIVE} \
             RETURNING {SESSION_COLUMNS}"
        );
        sqlx::query_as::<_, UserSession>(&query)
            .bind(token_hash)
            .fetch_optional(pool)
            .await
    }

    /// Close every open session of `user_id` (logout). Returns how many closed.
    pub async fn close_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true \
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Drop spent and expired sessions; run once at startup.
    pub async fn purge_stale(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(&format!("DELETE FROM user_sessions WHERE NOT ({LIVE})"))
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
