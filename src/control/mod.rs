//! Closed-loop motor control: encoder timing and the PI law.

pub mod encoder;
pub mod motor;

pub use encoder::EncoderState;
pub use motor::{MotorController, MotorState};
