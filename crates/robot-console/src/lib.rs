pub mod config;
pub mod errors;
pub mod playback;
pub mod proxy;
pub mod services;
pub mod streaming;
pub mod web;
