//! Run-time configuration of the simulator.

pub mod config;

pub use config::SimulationConfig;
