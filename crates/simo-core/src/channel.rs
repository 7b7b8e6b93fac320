use serde::{Deserialize, Serialize};

/// Connection status of the controller transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChannelStatus {
    pub connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UltrasonicReading {
    /// Centimetres; `None` until the controller has reported.
    pub distance: Option<f64>,
}

/// Raw IR flags as the controller reports them: 0 means obstacle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InfraredReading {
    pub left: Option<u8>,
    pub right: Option<u8>,
}

/// Latest sensor values cached by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SensorData {
    pub ultrasonic: UltrasonicReading,
    pub infrared: InfraredReading,
}

/// Opaque command transport to the motor controller.
///
/// Implementations must be non-blocking: `send` reports whether the command
/// was accepted for delivery and never retries.
pub trait CommandChannel: Send + Sync {
    /// Send one rendered command (`S`, `F,800`, `BEEP`, ...).
    fn send(&self, command: &str) -> bool;

    /// Send raw bytes, bypassing command framing.
    fn send_raw(&self, bytes: &[u8]) -> bool;

    fn status(&self) -> ChannelStatus;

    fn sensor_data(&self) -> SensorData;
}
