pub mod archive;
pub mod backup_log;
pub mod config;
pub mod constants;
pub mod container;
pub mod error;
pub mod lock;
pub mod notify;
pub mod pipeline;
pub mod replication;
pub mod report;
pub mod restart;
pub mod retention;
pub mod run;
pub mod shutdown;
pub mod snapshot;

#[cfg(test)]
mod test_support;

pub use error::{BackupError, Result};
