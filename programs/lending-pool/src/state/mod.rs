pub mod asset;
pub mod pool;
pub mod user_account;

pub use asset::*;
pub use pool::*;
pub use user_account::*;
