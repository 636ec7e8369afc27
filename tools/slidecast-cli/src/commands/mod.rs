pub mod check;
pub mod config;
pub mod plan;
pub mod render;
pub mod subtitles;
pub mod validate;
