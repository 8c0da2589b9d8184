//! Domain types for klinesim

pub mod position;
pub mod sample;

pub use position::{Direction, Position, PositionError};
pub use sample::{PriceSample, SignalAction, Signals};
