//! Shared-medium CSMA/CD network simulator.

pub mod common;
pub mod control;
pub mod simulation;
