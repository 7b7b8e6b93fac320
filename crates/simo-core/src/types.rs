use serde::{Deserialize, Serialize};

use crate::intent::Intent;

/// Milliseconds on the pipeline's monotonic clock.
pub type Millis = u64;

/// Coarse physical state of the robot, as tracked by the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RobotMode {
    #[default]
    Idle,
    Moving,
    /// The last command could not be delivered to the controller.
    Error,
}

impl RobotMode {
    pub fn is_moving(self) -> bool {
        self == RobotMode::Moving
    }
}

impl std::fmt::Display for RobotMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RobotMode::Idle => write!(f, "idle"),
            RobotMode::Moving => write!(f, "moving"),
            RobotMode::Error => write!(f, "error"),
        }
    }
}

/// What happened when an intent was handed to the execution choke point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    /// True only when a command was written to the transport.
    pub executed: bool,
    /// Rendered controller command, if the intent got that far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Why nothing was executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Execution {
    pub fn sent(command: impl Into<String>) -> Self {
        Self {
            executed: true,
            command: Some(command.into()),
            reason: None,
        }
    }

    pub fn refused(reason: impl Into<String>) -> Self {
        Self {
            executed: false,
            command: None,
            reason: Some(reason.into()),
        }
    }

    /// The command was rendered but the transport did not accept it.
    pub fn undelivered(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            executed: false,
            command: Some(command.into()),
            reason: Some(reason.into()),
        }
    }
}

/// Anything that can turn an approved intent into a controller command.
///
/// Exactly one implementation writes to the transport: the runtime's
/// execution choke point. Other components receive it by injection.
pub trait IntentExecutor: Send + Sync {
    fn execute(&self, intent: &Intent) -> Execution;
}
