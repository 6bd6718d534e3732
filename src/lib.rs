pub mod config;
pub mod contracts;
pub mod error;

pub use error::{ReconcileError, ReconcileResult};
