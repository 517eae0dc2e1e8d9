//! Background worker that drains the `tasks` queue.

pub mod config;
pub mod runner;

pub use config::WorkerConfig;
pub use runner::TaskWorker;
