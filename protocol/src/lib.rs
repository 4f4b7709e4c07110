//! Wire and storage types shared by the engine, the model client and the CLI.

pub mod models;
pub mod protocol;

pub use models::*;
pub use protocol::*;
