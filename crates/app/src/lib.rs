pub mod config;
pub mod ptt;

pub use config::{PttConfig, PttMode, PttSettings, Settings};
