pub mod clip_result;
pub mod config;
pub mod error;
pub mod media;
pub mod state;
