// simulation_engine/mod.rs
pub mod simulation;
pub mod tunnel;
pub mod vehicles;
