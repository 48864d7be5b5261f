pub mod types;
pub mod client;
pub mod gateway;

pub use types::*;
pub use client::*;
pub use gateway::*;
