use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Blunder {
    pub id: i64,
    pub user_id: i64,
    pub position_id: i64,
    pub bad_move_san: String,
    pub best_move_san: String,
    pub eval_loss_cp: i32,
    pub pass_streak: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The user's blunder at a given position, if one is stored.
pub async fn find_by_position(
    conn: &mut PgConnection,
    user_id: i64,
    position_id: i64,
) -> Result<Option<Blunder>, sqlx::Error> {
    sqlx::query_as::<_, Blunder>(
        r#"
        SELECT id, user_id, position_id, bad_move_san, best_move_san,
               eval_loss_cp, pass_streak, last_reviewed_at, created_at
        FROM blunders
        WHERE user_id = $1 AND position_id = $2
        "#,
    )
    .bind(user_id)
    .bind(position_id)
    .fetch_optional(&mut *conn)
    .await
}

/// Get-or-insert on `(user_id, position_id)`; returns `(blunder_id, is_new)`.
/// An existing blunder keeps its original annotations untouched.
pub async fn upsert(
    conn: &mut PgConnection,
    user_id: i64,
    position_id: i64,
    bad_move_san: &str,
    best_move_san: &str,
    eval_loss_cp: i32,
) -> Result<(i64, bool), sqlx::Error> {
    if let Some(existing) = find_by_position(&mut *conn, user_id, position_id).await? {
        return Ok((existing.id, false));
    }

    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO blunders (user_id, position_id, bad_move_san, best_move_san, eval_loss_cp)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(position_id)
    .bind(bad_move_san)
    .bind(best_move_san)
    .bind(eval_loss_cp)
    .fetch_one(&mut *conn)
    .await?;

    Ok((id, true))
}

pub async fn get_for_user(
    pool: &PgPool,
    user_id: i64,
    blunder_id: i64,
) -> Result<Option<Blunder>, sqlx::Error> {
    sqlx::query_as::<_, Blunder>(
        r#"
        SELECT id, user_id, position_id, bad_move_san, best_move_san,
               eval_loss_cp, pass_streak, last_reviewed_at, created_at
        FROM blunders
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(blunder_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
pub struct BlunderListRow {
    pub id: i64,
    pub fen_raw: String,
    pub bad_move_san: String,
    pub best_move_san: String,
    pub eval_loss_cp: i32,
    pub pass_streak: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

pub async fn list_with_positions(
    pool: &PgPool,
    user_id: i64,
) -> Result<Vec<BlunderListRow>, sqlx::Error> {
    sqlx::query_as::<_, BlunderListRow>(
        r#"
        SELECT b.id, p.fen_raw, b.bad_move_san, b.best_move_san,
               b.eval_loss_cp, b.pass_streak, b.last_reviewed_at, b.created_at
        FROM blunders b
        JOIN positions p ON p.id = b.position_id
        WHERE b.user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Apply one review atomically: streak update + append-only log row.
/// Returns the new pass streak.
pub async fn record_review(
    pool: &PgPool,
    blunder_id: i64,
    session_id: Uuid,
    passed: bool,
    move_played_san: &str,
    eval_delta_cp: i32,
    reviewed_at: DateTime<Utc>,
) -> Result<i32, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let (pass_streak,): (i32,) = sqlx::query_as(
        r#"
        UPDATE blunders
        SET pass_streak = CASE WHEN $2 THEN pass_streak + 1 ELSE 0 END,
            last_reviewed_at = $3
        WHERE id = $1
        RETURNING pass_streak
        "#,
    )
    .bind(blunder_id)
    .bind(passed)
    .bind(reviewed_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO blunder_reviews
            (blunder_id, session_id, reviewed_at, passed, move_played_san, eval_delta_cp)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(blunder_id)
    .bind(session_id)
    .bind(reviewed_at)
    .bind(passed)
    .bind(move_played_san)
    .bind(eval_delta_cp)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(pass_streak)
}
