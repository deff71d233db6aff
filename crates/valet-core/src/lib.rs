pub mod config;
pub mod error;
pub mod plan;
pub mod types;

pub use config::ValetConfig;
pub use error::{Result, ValetError};
pub use plan::{ActionParams, ActionReceipt, Plan, UndoData};
pub use types::*;
