//! Per-user position graph: positions, move edges, and the bounded
//! reachability query behind ghost steering.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

/// Insert a position if absent; returns `(position_id, created)`.
/// Idempotent on `(user_id, fen_hash)`.
pub async fn upsert_position(
    conn: &mut PgConnection,
    user_id: i64,
    fen_hash: &str,
    fen_raw: &str,
    active_color: &str,
) -> Result<(i64, bool), sqlx::Error> {
    let inserted: Option<(i64,)> = sqlx::query_as(
        r#"
        INSERT INTO positions (user_id, fen_hash, fen_raw, active_color)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, fen_hash) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(fen_hash)
    .bind(fen_raw)
    .bind(active_color)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some((id,)) = inserted {
        return Ok((id, true));
    }

    let (id,): (i64,) =
        sqlx::query_as("SELECT id FROM positions WHERE user_id = $1 AND fen_hash = $2")
            .bind(user_id)
            .bind(fen_hash)
            .fetch_one(&mut *conn)
            .await?;
    Ok((id, false))
}

/// Insert an edge if absent; no-op on conflict.
pub async fn upsert_edge(
    conn: &mut PgConnection,
    from_position_id: i64,
    move_san: &str,
    to_position_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO moves (from_position_id, move_san, to_position_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (from_position_id, move_san) DO NOTHING
        "#,
    )
    .bind(from_position_id)
    .bind(move_san)
    .bind(to_position_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn find_position_by_hash(
    pool: &PgPool,
    user_id: i64,
    fen_hash: &str,
) -> Result<Option<i64>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM positions WHERE user_id = $1 AND fen_hash = $2")
            .bind(user_id)
            .bind(fen_hash)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(id,)| id))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct GhostCandidateRow {
    pub first_move: String,
    pub depth: i32,
    pub blunder_id: i64,
    pub eval_loss_cp: i32,
    pub pass_streak: i32,
    pub last_reviewed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Walk outgoing edges from `start_position_id` up to `max_depth` plies and
/// collect every reachable blunder of this user whose position has the
/// player to move.
///
/// The accumulated `path` array blocks revisits of any position already on
/// the path, so cyclic graphs terminate. Each row carries the first SAN
/// taken from the start position; paths sharing a first move share the tag.
pub async fn ghost_candidates(
    pool: &PgPool,
    start_position_id: i64,
    user_id: i64,
    player_color: &str,
    max_depth: i32,
) -> Result<Vec<GhostCandidateRow>, sqlx::Error> {
    sqlx::query_as::<_, GhostCandidateRow>(
        r#"
        WITH RECURSIVE reachable(position_id, depth, path, first_move) AS (
            SELECT
                $1::bigint,
                0,
                ARRAY[$1::bigint],
                NULL::text
            UNION ALL
            SELECT
                m.to_position_id,
                r.depth + 1,
                r.path || m.to_position_id,
                COALESCE(r.first_move, m.move_san)
            FROM reachable r
            JOIN moves m ON m.from_position_id = r.position_id
            WHERE r.depth < $4
              AND NOT (m.to_position_id = ANY(r.path))
        )
        SELECT
            r.first_move,
            r.depth,
            b.id AS blunder_id,
            b.eval_loss_cp,
            b.pass_streak,
            b.last_reviewed_at,
            b.created_at
        FROM reachable r
        JOIN positions p ON p.id = r.position_id
        JOIN blunders b ON b.position_id = r.position_id AND b.user_id = $2
        WHERE p.active_color = $3
          AND r.first_move IS NOT NULL
        "#,
    )
    .bind(start_position_id)
    .bind(user_id)
    .bind(player_color)
    .bind(max_depth)
    .fetch_all(pool)
    .await
}
