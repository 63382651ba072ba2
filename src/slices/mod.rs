//! The application's state slices.

pub mod auth;
pub mod chat;
pub mod documents;
pub mod expenses;
pub mod ui;
