pub mod config;
pub mod file_utils;
pub mod text;

pub use config::*;
pub use file_utils::*;
pub use text::*;
