//! # Cashout Telegram Bot
//!
//! A Telegram bot that turns free-form messages into income and expense
//! records, walks the user through confirming or correcting them, and stores
//! them in PostgreSQL.

pub mod bot;
pub mod callback_data;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod draft_editor;
pub mod errors;
pub mod extraction;
pub mod localization;
pub mod repository;
pub mod router;
pub mod transaction_model;
pub mod validators;
