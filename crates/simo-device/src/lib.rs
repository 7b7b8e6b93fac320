//! # simo-device
//!
//! Transports that implement [`CommandChannel`](simo_core::CommandChannel)
//! for the motor controller.
//!
//! - **`TcpLink`**: newline-framed ASCII over TCP (a serial-to-network
//!   bridge), with reconnect-on-drop and periodic `SENSOR` polling.
//! - **`RecordingChannel`**: in-memory channel for dry runs and tests.
//!
//! Controller replies are parsed by [`protocol`] into a sensor cache.

pub mod link;
pub mod protocol;
pub mod recording;

pub use link::{LinkOptions, TcpLink};
pub use protocol::{ControllerFrame, SensorCache, render_command};
pub use recording::RecordingChannel;
