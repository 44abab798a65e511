//! Traffic Signal Simulation Library
//!
//! A signal-cycling and emergency-dispatch simulation engine that can be driven
//! headless or polled by an external monitoring console.

pub mod simulation;
