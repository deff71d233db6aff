//! The action execution engine.
//!
//! Decides, per user and per action kind, whether a proposed action runs
//! immediately, runs after a heads-up, or waits for approval; drives the
//! executors that act on backing services; and enforces the undo window.
//! Anything that goes wrong during execution lands on the action record,
//! never in the caller's lap.

pub mod engine;
pub mod error;
pub mod executor;
pub mod policy;
pub mod undo;

pub use engine::{ActionEngine, Outcome, OutcomeStatus};
pub use error::EngineError;
pub use executor::{ActionExecutor, ExecError, Execution, ExecutorRegistry, UndoHandler};
pub use policy::PolicyResolver;
pub use undo::{undo_eligibility, UndoIneligible, UNDO_WINDOW_SECS};
