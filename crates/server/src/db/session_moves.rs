use sqlx::PgPool;
use uuid::Uuid;

pub struct SessionMoveInsert {
    pub move_number: i32,
    pub color: String,
    pub move_san: String,
    pub fen_after: String,
    pub eval_cp: Option<i32>,
    pub eval_mate: Option<i32>,
    pub best_move_san: Option<String>,
    pub best_move_eval_cp: Option<i32>,
    pub eval_delta: Option<i32>,
    pub classification: Option<String>,
}

/// Bulk upsert a batch of session moves in a single UNNEST query;
/// re-submitting a (move_number, color) pair overwrites its annotations.
pub async fn upsert_batch(
    pool: &PgPool,
    session_id: Uuid,
    moves: &[SessionMoveInsert],
) -> Result<usize, sqlx::Error> {
    if moves.is_empty() {
        return Ok(0);
    }

    let len = moves.len();
    let mut v_move_number: Vec<i32> = Vec::with_capacity(len);
    let mut v_color: Vec<String> = Vec::with_capacity(len);
    let mut v_move_san: Vec<String> = Vec::with_capacity(len);
    let mut v_fen_after: Vec<String> = Vec::with_capacity(len);
    let mut v_eval_cp: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut v_eval_mate: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut v_best_move_san: Vec<Option<String>> = Vec::with_capacity(len);
    let mut v_best_move_eval_cp: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut v_eval_delta: Vec<Option<i32>> = Vec::with_capacity(len);
    let mut v_classification: Vec<Option<String>> = Vec::with_capacity(len);

    for m in moves {
        v_move_number.push(m.move_number);
        v_color.push(m.color.clone());
        v_move_san.push(m.move_san.clone());
        v_fen_after.push(m.fen_after.clone());
        v_eval_cp.push(m.eval_cp);
        v_eval_mate.push(m.eval_mate);
        v_best_move_san.push(m.best_move_san.clone());
        v_best_move_eval_cp.push(m.best_move_eval_cp);
        v_eval_delta.push(m.eval_delta);
        v_classification.push(m.classification.clone());
    }

    sqlx::query(
        r#"
        INSERT INTO session_moves
            (session_id, move_number, color, move_san, fen_after, eval_cp, eval_mate,
             best_move_san, best_move_eval_cp, eval_delta, classification)
        SELECT $1, * FROM UNNEST(
            $2::int[], $3::text[], $4::text[], $5::text[], $6::int[], $7::int[],
            $8::text[], $9::int[], $10::int[], $11::text[]
        ) AS t(move_number, color, move_san, fen_after, eval_cp, eval_mate,
               best_move_san, best_move_eval_cp, eval_delta, classification)
        ON CONFLICT (session_id, move_number, color) DO UPDATE SET
            move_san = EXCLUDED.move_san,
            fen_after = EXCLUDED.fen_after,
            eval_cp = EXCLUDED.eval_cp,
            eval_mate = EXCLUDED.eval_mate,
            best_move_san = EXCLUDED.best_move_san,
            best_move_eval_cp = EXCLUDED.best_move_eval_cp,
            eval_delta = EXCLUDED.eval_delta,
            classification = EXCLUDED.classification
        "#,
    )
    .bind(session_id)
    .bind(&v_move_number)
    .bind(&v_color)
    .bind(&v_move_san)
    .bind(&v_fen_after)
    .bind(&v_eval_cp)
    .bind(&v_eval_mate)
    .bind(&v_best_move_san)
    .bind(&v_best_move_eval_cp)
    .bind(&v_eval_delta)
    .bind(&v_classification)
    .execute(pool)
    .await?;

    Ok(len)
}

#[derive(Debug, sqlx::FromRow)]
pub struct SessionSummaryRow {
    pub session_id: Uuid,
    pub total_moves: i64,
    pub blunders: i64,
    pub mistakes: i64,
    pub inaccuracies: i64,
    pub avg_cp_loss: Option<f64>,
}

pub async fn summaries_for_sessions(
    pool: &PgPool,
    session_ids: &[Uuid],
) -> Result<Vec<SessionSummaryRow>, sqlx::Error> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }

    sqlx::query_as::<_, SessionSummaryRow>(
        r#"
        SELECT
            session_id,
            COUNT(*) AS total_moves,
            COUNT(*) FILTER (WHERE classification = 'blunder') AS blunders,
            COUNT(*) FILTER (WHERE classification = 'mistake') AS mistakes,
            COUNT(*) FILTER (WHERE classification = 'inaccuracy') AS inaccuracies,
            AVG(eval_delta)::float8 AS avg_cp_loss
        FROM session_moves
        WHERE session_id = ANY($1)
        GROUP BY session_id
        "#,
    )
    .bind(session_ids)
    .fetch_all(pool)
    .await
}
