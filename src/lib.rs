pub mod chat;
pub mod constants;
pub mod gateway;
pub mod gemini;
pub mod models;
pub mod scenarios;
pub mod search;
pub mod session;
pub mod web_server;
