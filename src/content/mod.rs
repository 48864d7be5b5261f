pub mod types;
pub mod codec;
pub mod storage;
pub mod store;
pub mod board;

pub use types::*;
pub use codec::*;
pub use storage::*;
pub use store::*;
pub use board::*;
