use sqlx::postgres::{PgPool, PgPoolOptions};

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run the full Postgres schema migration inline.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Per-user position graph. Two users reaching the same FEN get two rows.
CREATE TABLE IF NOT EXISTS positions (
    id           BIGSERIAL PRIMARY KEY,
    user_id      BIGINT NOT NULL,
    fen_hash     VARCHAR(64) NOT NULL,
    fen_raw      TEXT NOT NULL,
    active_color VARCHAR(5) NOT NULL CHECK (active_color IN ('white', 'black')),
    created_at   TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, fen_hash)
);

CREATE INDEX IF NOT EXISTS idx_positions_user
    ON positions (user_id);
CREATE INDEX IF NOT EXISTS idx_positions_user_active_color
    ON positions (user_id, active_color);

-- Directed edges between positions; exactly one target per (source, SAN).
CREATE TABLE IF NOT EXISTS moves (
    from_position_id BIGINT NOT NULL REFERENCES positions(id),
    move_san         VARCHAR(10) NOT NULL,
    to_position_id   BIGINT NOT NULL REFERENCES positions(id),
    PRIMARY KEY (from_position_id, move_san)
);

-- Blunder library: one entry per user+position, never deleted.
CREATE TABLE IF NOT EXISTS blunders (
    id               BIGSERIAL PRIMARY KEY,
    user_id          BIGINT NOT NULL,
    position_id      BIGINT NOT NULL REFERENCES positions(id),
    bad_move_san     VARCHAR(10) NOT NULL,
    best_move_san    VARCHAR(10) NOT NULL,
    eval_loss_cp     INTEGER NOT NULL,
    pass_streak      INTEGER NOT NULL DEFAULT 0,
    last_reviewed_at TIMESTAMPTZ,
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (user_id, position_id)
);

CREATE INDEX IF NOT EXISTS idx_blunders_user
    ON blunders (user_id);
CREATE INDEX IF NOT EXISTS idx_blunders_position_user
    ON blunders (position_id, user_id);
CREATE INDEX IF NOT EXISTS idx_blunders_due
    ON blunders (user_id, pass_streak, last_reviewed_at);

-- Game sessions; status moves one way: active -> ended.
CREATE TABLE IF NOT EXISTS game_sessions (
    id               UUID PRIMARY KEY,
    user_id          BIGINT NOT NULL,
    started_at       TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    ended_at         TIMESTAMPTZ,
    status           VARCHAR(20) NOT NULL CHECK (status IN ('active', 'ended')),
    result           VARCHAR(20),
    engine_elo       INTEGER NOT NULL,
    player_color     VARCHAR(5) NOT NULL DEFAULT 'white'
                     CHECK (player_color IN ('white', 'black')),
    blunder_recorded BOOLEAN NOT NULL DEFAULT FALSE,
    pgn              TEXT
);

CREATE INDEX IF NOT EXISTS idx_game_sessions_user
    ON game_sessions (user_id);
CREATE INDEX IF NOT EXISTS idx_game_sessions_status
    ON game_sessions (status);
CREATE INDEX IF NOT EXISTS idx_game_sessions_user_started
    ON game_sessions (user_id, started_at);

-- Append-only review log.
CREATE TABLE IF NOT EXISTS blunder_reviews (
    id              BIGSERIAL PRIMARY KEY,
    blunder_id      BIGINT NOT NULL REFERENCES blunders(id) ON DELETE CASCADE,
    session_id      UUID NOT NULL REFERENCES game_sessions(id),
    reviewed_at     TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    passed          BOOLEAN NOT NULL,
    move_played_san VARCHAR(10) NOT NULL,
    eval_delta_cp   INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_blunder_reviews_blunder
    ON blunder_reviews (blunder_id, reviewed_at);

-- Per-session move log with eval annotations (drives history summaries).
CREATE TABLE IF NOT EXISTS session_moves (
    id                BIGSERIAL PRIMARY KEY,
    session_id        UUID NOT NULL REFERENCES game_sessions(id) ON DELETE CASCADE,
    move_number       INTEGER NOT NULL,
    color             VARCHAR(5) NOT NULL CHECK (color IN ('white', 'black')),
    move_san          VARCHAR(10) NOT NULL,
    fen_after         TEXT NOT NULL,
    eval_cp           INTEGER,
    eval_mate         INTEGER,
    best_move_san     VARCHAR(10),
    best_move_eval_cp INTEGER,
    eval_delta        INTEGER,
    classification    VARCHAR(20),
    UNIQUE (session_id, move_number, color)
);

CREATE INDEX IF NOT EXISTS idx_session_moves_session
    ON session_moves (session_id);
"#;
