pub mod admin;
pub mod batch;
pub mod config;
pub mod health;
pub mod models;
pub mod parse;
pub mod warmup;
