//! Controller line protocol.
//!
//! Commands are ASCII lines terminated by `\n`. The controller answers with:
//!
//! ```text
//! DIST,<tenths of a cm>
//! IR,L<d>R<d>                 0 = obstacle on that side
//! SENSOR,D<tenths>,L<d>R<d>
//! OK,<detail>
//! ERR,<detail>
//! PONG
//! ```

use serde::{Deserialize, Serialize};
use simo_core::{Result, SensorData, SimoError};
use std::str::FromStr;

/// Poll request understood by the controller.
pub const SENSOR_REQUEST: &str = "SENSOR";
pub const PING: &str = "PING";

/// Frame a command for the wire.
pub fn render_command(command: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(command.len() + 1);
    bytes.extend_from_slice(command.trim_end().as_bytes());
    bytes.push(b'\n');
    bytes
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum ControllerFrame {
    Distance {
        cm: f64,
    },
    Infrared {
        left: u8,
        right: u8,
    },
    Sensor {
        distance_cm: Option<f64>,
        infrared: Option<(u8, u8)>,
    },
    /// `OK,...` acknowledgement.
    Ack {
        detail: String,
    },
    /// `ERR,...` reported by the controller.
    Fault {
        detail: String,
    },
    Pong,
}

fn malformed(line: &str) -> SimoError {
    SimoError::MalformedFrame(line.to_string())
}

/// Tenths of a centimetre to centimetres.
fn parse_distance(raw: &str) -> Option<f64> {
    raw.trim().parse::<i64>().ok().map(|tenths| tenths as f64 / 10.0)
}

/// `L<d>R<d>` with single-digit flags.
fn parse_ir(raw: &str) -> Option<(u8, u8)> {
    let rest = raw.trim().strip_prefix('L')?;
    let (left, right) = rest.split_once('R')?;
    let digit = |s: &str| -> Option<u8> {
        let mut chars = s.chars();
        let d = chars.next()?.to_digit(10)?;
        chars.next().is_none().then_some(d as u8)
    };
    Some((digit(left)?, digit(right)?))
}

impl FromStr for ControllerFrame {
    type Err = SimoError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        if line == "PONG" {
            return Ok(ControllerFrame::Pong);
        }
        let (tag, body) = line.split_once(',').ok_or_else(|| malformed(line))?;
        match tag {
            "DIST" => parse_distance(body)
                .map(|cm| ControllerFrame::Distance { cm })
                .ok_or_else(|| malformed(line)),
            "IR" => parse_ir(body)
                .map(|(left, right)| ControllerFrame::Infrared { left, right })
                .ok_or_else(|| malformed(line)),
            "SENSOR" => {
                let mut distance_cm = None;
                let mut infrared = None;
                for part in body.split(',') {
                    if let Some(raw) = part.trim().strip_prefix('D') {
                        distance_cm = parse_distance(raw).or(distance_cm);
                    } else if let Some(ir) = parse_ir(part) {
                        infrared = Some(ir);
                    }
                }
                if distance_cm.is_none() && infrared.is_none() {
                    return Err(malformed(line));
                }
                Ok(ControllerFrame::Sensor {
                    distance_cm,
                    infrared,
                })
            }
            "OK" => Ok(ControllerFrame::Ack {
                detail: body.to_string(),
            }),
            "ERR" => Ok(ControllerFrame::Fault {
                detail: body.to_string(),
            }),
            _ => Err(malformed(line)),
        }
    }
}

/// Latest sensor values reported by the controller. Frames only overwrite
/// the fields they carry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SensorCache {
    data: SensorData,
}

impl SensorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, frame: &ControllerFrame) {
        match frame {
            ControllerFrame::Distance { cm } => self.data.ultrasonic.distance = Some(*cm),
            ControllerFrame::Infrared { left, right } => self.set_ir(*left, *right),
            ControllerFrame::Sensor {
                distance_cm,
                infrared,
            } => {
                if let Some(cm) = distance_cm {
                    self.data.ultrasonic.distance = Some(*cm);
                }
                if let Some((left, right)) = infrared {
                    self.set_ir(*left, *right);
                }
            }
            _ => {}
        }
    }

    fn set_ir(&mut self, left: u8, right: u8) {
        self.data.infrared.left = Some(left);
        self.data.infrared.right = Some(right);
    }

    pub fn data(&self) -> SensorData {
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ir_needs_single_digits() {
        assert_eq!(parse_ir("L0R1"), Some((0, 1)));
        assert_eq!(parse_ir("L10R1"), None);
        assert_eq!(parse_ir("X0R1"), None);
    }

    #[test]
    fn render_appends_newline_once() {
        assert_eq!(render_command("F,800"), b"F,800\n".to_vec());
        assert_eq!(render_command("S\n"), b"S\n".to_vec());
    }
}
