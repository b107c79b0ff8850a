pub mod config;
pub mod oracle;
pub mod outcome;
pub mod scheduler;
pub mod simulation;
pub mod sprt;
pub mod worker_pool;
