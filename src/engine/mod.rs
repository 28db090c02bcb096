//! # engine
//!
//! Session logic: signal, sizing and the lifecycle state machine, plus the
//! clock and cancellation primitives it suspends on.

pub mod cancel;
pub mod clock;
pub mod lifecycle;
pub mod momentum;
pub mod planner;
