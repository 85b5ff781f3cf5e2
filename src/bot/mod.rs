//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles incoming text messages
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `ui_builder`: Reply payloads and keyboards
//! - `dialogue_manager`: Session load-mutate-save and the dialogue handlers

pub mod callback_handler;
pub mod dialogue_manager;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;

pub use dialogue_manager::{DialogueManager, Outcome, Sender};
pub use ui_builder::{Keyboard, Reply};
