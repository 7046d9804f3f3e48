// src/models/mod.rs

//! Domain models for the schedule watcher.

mod address;
mod config;
mod schedule;

// Re-export all public types
pub use address::{Address, LookupItem};
pub use config::{
    Config, FetcherConfig, LoggingConfig, SolverConfig, SolverMode, StorageConfig, WorkerConfig,
};
pub use schedule::{
    CurrentDisconnection, DaySchedule, FullCell, HalfCell, HourCell, ScheduleResponse,
};
