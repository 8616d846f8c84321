use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    /// Base URL of the human-move model sidecar
    pub maia_api_url: String,
    /// Per-request timeout for model inference calls
    pub maia_timeout_ms: u64,
    /// Load the model at startup instead of on first request
    pub maia_warmup: bool,
    pub stockfish_path: String,
    pub stockfish_depth: u32,
    /// Strength calibration for sub-floor Elo requests
    pub calibration_enabled: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .expect("DATABASE_URL must be set"),
            jwt_secret: env::var("JWT_SECRET_KEY")
                .unwrap_or_else(|_| "dev-secret-key-change-in-production".to_string()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            maia_api_url: env::var("MAIA_API_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8001".to_string()),
            maia_timeout_ms: env::var("MAIA_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5000),
            maia_warmup: env::var("MAIA_WARMUP")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            stockfish_path: env::var("STOCKFISH_PATH")
                .unwrap_or_else(|_| "/usr/local/bin/stockfish".to_string()),
            stockfish_depth: env::var("STOCKFISH_EVAL_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8),
            calibration_enabled: env::var("CALIBRATION_ENABLED")
                .map(|v| !v.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
        }
    }
}
