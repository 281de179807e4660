pub mod config;
pub mod delta;
pub mod enumerate;
pub mod error;
pub mod notify;
pub mod pipeline;
pub mod store;
pub mod sync;
pub mod types;

pub use config::Config;
pub use error::{ErrorKind, PlugcountError};
pub use store::HistoryStore;
pub use types::*;
