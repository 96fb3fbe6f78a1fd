//! HTTP request handlers organized by domain

pub mod chat;
pub mod health;
pub mod manual;
pub mod settings;
pub mod stream;
