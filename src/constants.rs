// Runtime settings, loaded from the environment (after dotenvy) or defaulted.

use std::env;

// Use lazy_static to initialize static variables safely.
lazy_static::lazy_static! {
    pub static ref GEMINI_API_KEY: String = env::var("GEMINI_API_KEY")
        .or_else(|_| env::var("API_KEY"))
        .unwrap_or_default();
    pub static ref GEMINI_MODEL: String = env::var("CHAPLAINCY_MODEL").unwrap_or_else(|_| "gemini-2.5-pro".to_string());
    pub static ref GEMINI_BASE_URL: String = env::var("GEMINI_BASE_URL").unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".to_string());
    pub static ref TEMPLATES_DIR: String = env::var("CHAPLAINCY_TEMPLATES_DIR").unwrap_or_else(|_| "templates".to_string());
    pub static ref STATIC_DIR: String = env::var("CHAPLAINCY_STATIC_DIR").unwrap_or_else(|_| "static".to_string());
}

/// Number of trailing transcript entries sent with each chat turn.
pub const CONTEXT_WINDOW_MESSAGES: usize = 6;

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const CHAT_TOP_P: f32 = 0.9;
pub const CHAT_TOP_K: u32 = 40;

// Lower temperature for more focused, factual results
pub const SEARCH_TEMPERATURE: f32 = 0.3;
pub const MAX_SEARCH_RESULTS: usize = 5;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;

pub const FALLBACK_ASSISTANT_MESSAGE: &str =
    "I'm sorry, I encountered an error and couldn't process your request.";
pub const GENERATION_ERROR_PREFIX: &str = "Failed to get response from AI.";
pub const NO_QUOTES_FOUND: &str = "No quotes found for your query.";

pub const DEFAULT_PORT: u16 = 9900;

// Web sessions untouched for this long are dropped by the sweeper
pub const SESSION_IDLE_TIMEOUT_SECS: u64 = 60 * 60;
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 60;
