pub mod types;
pub mod session;

pub use types::*;
pub use session::*;
