use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GameSession {
    pub id: Uuid,
    pub user_id: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: String,
    pub result: Option<String>,
    pub engine_elo: i32,
    pub player_color: String,
    pub blunder_recorded: bool,
    pub pgn: Option<String>,
}

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    engine_elo: i32,
    player_color: &str,
) -> Result<GameSession, sqlx::Error> {
    sqlx::query_as::<_, GameSession>(
        r#"
        INSERT INTO game_sessions (id, user_id, status, engine_elo, player_color)
        VALUES ($1, $2, 'active', $3, $4)
        RETURNING id, user_id, started_at, ended_at, status, result,
                  engine_elo, player_color, blunder_recorded, pgn
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(engine_elo)
    .bind(player_color)
    .fetch_one(pool)
    .await
}

pub async fn get(pool: &PgPool, session_id: Uuid) -> Result<Option<GameSession>, sqlx::Error> {
    sqlx::query_as::<_, GameSession>(
        r#"
        SELECT id, user_id, started_at, ended_at, status, result,
               engine_elo, player_color, blunder_recorded, pgn
        FROM game_sessions
        WHERE id = $1
        "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await
}

pub async fn end(
    pool: &PgPool,
    session_id: Uuid,
    result: &str,
    pgn: &str,
) -> Result<GameSession, sqlx::Error> {
    sqlx::query_as::<_, GameSession>(
        r#"
        UPDATE game_sessions
        SET status = 'ended', result = $2, pgn = $3, ended_at = NOW()
        WHERE id = $1
        RETURNING id, user_id, started_at, ended_at, status, result,
                  engine_elo, player_color, blunder_recorded, pgn
        "#,
    )
    .bind(session_id)
    .bind(result)
    .bind(pgn)
    .fetch_one(pool)
    .await
}

/// Sticky flag: once set, the auto recorder is a no-op for this session.
pub async fn mark_blunder_recorded(
    conn: &mut PgConnection,
    session_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE game_sessions SET blunder_recorded = TRUE WHERE id = $1")
        .bind(session_id)
        .execute(conn)
        .await?;
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
pub struct EndedSessionRow {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub result: Option<String>,
    pub engine_elo: i32,
    pub player_color: String,
}

pub async fn list_ended(
    pool: &PgPool,
    user_id: i64,
    limit: i64,
) -> Result<Vec<EndedSessionRow>, sqlx::Error> {
    sqlx::query_as::<_, EndedSessionRow>(
        r#"
        SELECT id, started_at, ended_at, result, engine_elo, player_color
        FROM game_sessions
        WHERE user_id = $1 AND status = 'ended'
        ORDER BY ended_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await
}
