// monitoring/mod.rs
pub mod event_log;
