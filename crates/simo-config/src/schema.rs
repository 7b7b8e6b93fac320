use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration; maps to `simo.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimoConfig {
    pub guard: GuardConfig,
    pub confirm: ConfirmConfig,
    pub safety: SafetyConfig,
    pub sequence: SequenceConfig,
    pub fluency: FluencyConfig,
    pub nlu: NluConfig,
    pub device: DeviceConfig,
    pub logging: LoggingConfig,
}

// ── Guard ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// MOVE/TURN below this confidence are rejected.
    pub execute_threshold: f64,
    /// Added to a motion's duration before the robot is considered idle again.
    pub revert_grace_ms: u64,
    /// Hard cap on any single motion.
    pub max_duration_ms: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            execute_threshold: 0.8,
            revert_grace_ms: 100,
            max_duration_ms: 3000,
        }
    }
}

// ── Confirmation ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmConfig {
    /// How long a pending question stays answerable.
    pub timeout_ms: u64,
    /// Confidences in `[guard.execute_threshold, boundary_upper)` ask first.
    pub boundary_upper: f64,
    /// MOVEs longer than this ask first.
    pub long_move_ms: u32,
    /// Any motion this soon after a STOP asks first.
    pub stop_settle_ms: u64,
    /// Treat any reply containing a cancel word as a cancel.
    pub permissive_cancel: bool,
}

impl Default for ConfirmConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            boundary_upper: 0.85,
            long_move_ms: 800,
            stop_settle_ms: 1500,
            permissive_cancel: true,
        }
    }
}

// ── Safety ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    /// Ultrasonic distance below which the robot is stopped.
    pub danger_cm: f64,
    /// Ultrasonic distance below which a warning is raised.
    pub warning_cm: f64,
    /// Sensor polling interval; clamped to [100, 5000].
    pub poll_interval_ms: u64,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            danger_cm: 8.0,
            warning_cm: 15.0,
            poll_interval_ms: 500,
        }
    }
}

impl SafetyConfig {
    pub fn effective_poll_interval_ms(&self) -> u64 {
        self.poll_interval_ms.clamp(100, 5000)
    }
}

// ── Sequence ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    pub max_steps: usize,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_steps: simo_core::MAX_SEQUENCE_STEPS,
        }
    }
}

// ── Fluency ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FluencyConfig {
    pub enabled: bool,
    pub ttl_ms: u64,
}

impl Default for FluencyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_ms: 5000,
        }
    }
}

// ── NLU ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// Rule matches at or above this confidence win outright.
    pub rule_floor: f64,
    pub llm: LlmConfig,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            rule_floor: 0.7,
            llm: LlmConfig::default(),
        }
    }
}

/// OpenAI-compatible fallback parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4o-mini".into(),
            api_key: None,
            timeout_ms: 5000,
        }
    }
}

// ── Device ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Controller bridge, e.g. `tcp://192.168.4.1:8888`. None = dry run.
    pub link: Option<String>,
    /// Delay between reconnection attempts.
    pub reconnect_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            link: None,
            reconnect_ms: 5000,
        }
    }
}

impl DeviceConfig {
    /// `host:port` of the configured link, if any.
    pub fn link_address(&self) -> Result<Option<String>, String> {
        let Some(raw) = self.link.as_deref() else {
            return Ok(None);
        };
        let url = Url::parse(raw).map_err(|e| format!("invalid link '{raw}': {e}"))?;
        if url.scheme() != "tcp" {
            return Err(format!(
                "unsupported link scheme '{}' (expected tcp)",
                url.scheme()
            ));
        }
        let host = url
            .host_str()
            .ok_or_else(|| format!("link '{raw}' has no host"))?;
        let port = url
            .port()
            .ok_or_else(|| format!("link '{raw}' has no port"))?;
        Ok(Some(format!("{host}:{port}")))
    }
}

// ── Logging ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Output format: "pretty", "json", "compact".
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "pretty".into(),
        }
    }
}

// ── Validation ─────────────────────────────────────────────────

/// A single config validation issue.
#[derive(Debug)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
    pub severity: WarningSeverity,
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningSeverity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let icon = match self.severity {
            WarningSeverity::Error => "❌",
            WarningSeverity::Warning => "⚠️ ",
            WarningSeverity::Info => "💡",
        };
        write!(f, "{} {}: {}", icon, self.field, self.message)?;
        if let Some(ref h) = self.hint {
            write!(f, "\n   ↳ {}", h)?;
        }
        Ok(())
    }
}

fn unit_interval(value: f64) -> bool {
    (0.0..=1.0).contains(&value)
}

impl SimoConfig {
    /// Validate the config and return a list of warnings/errors.
    /// Returns `Err` with all messages joined if any severity is Error.
    pub fn validate(&self) -> Result<Vec<ConfigWarning>, String> {
        let mut warnings = Vec::new();

        // ── Guard ───
        if !unit_interval(self.guard.execute_threshold) {
            warnings.push(ConfigWarning {
                field: "guard.execute_threshold".into(),
                message: format!("threshold {} is out of range", self.guard.execute_threshold),
                severity: WarningSeverity::Error,
                hint: Some("Must be between 0.0 and 1.0; 0.8 is the tested value".into()),
            });
        } else if self.guard.execute_threshold < 0.8 {
            warnings.push(ConfigWarning {
                field: "guard.execute_threshold".into(),
                message: format!(
                    "threshold {} is below the execution contract floor of 0.8",
                    self.guard.execute_threshold
                ),
                severity: WarningSeverity::Warning,
                hint: Some(
                    "Intents between this value and 0.8 will pass the guard but fail the contract check"
                        .into(),
                ),
            });
        }

        if self.guard.max_duration_ms > 3000 {
            warnings.push(ConfigWarning {
                field: "guard.max_duration_ms".into(),
                message: format!("{}ms exceeds the 3000ms hard cap", self.guard.max_duration_ms),
                severity: WarningSeverity::Error,
                hint: Some("Motions longer than 3s are never executed".into()),
            });
        }

        // ── Confirmation ───
        if !unit_interval(self.confirm.boundary_upper) {
            warnings.push(ConfigWarning {
                field: "confirm.boundary_upper".into(),
                message: format!("boundary {} is out of range", self.confirm.boundary_upper),
                severity: WarningSeverity::Error,
                hint: Some("Must be between 0.0 and 1.0".into()),
            });
        } else if self.confirm.boundary_upper <= self.guard.execute_threshold {
            warnings.push(ConfigWarning {
                field: "confirm.boundary_upper".into(),
                message: "boundary band is empty; no intent will be confirmed for low confidence"
                    .into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set above guard.execute_threshold, e.g. 0.85".into()),
            });
        }

        if self.confirm.timeout_ms == 0 {
            warnings.push(ConfigWarning {
                field: "confirm.timeout_ms".into(),
                message: "timeout is 0; every question expires immediately".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 5000".into()),
            });
        }

        if !self.confirm.permissive_cancel {
            warnings.push(ConfigWarning {
                field: "confirm.permissive_cancel".into(),
                message: "only exact cancel words will cancel a pending question".into(),
                severity: WarningSeverity::Info,
                hint: None,
            });
        }

        // ── Safety ───
        if self.safety.danger_cm <= 0.0 {
            warnings.push(ConfigWarning {
                field: "safety.danger_cm".into(),
                message: "danger distance must be positive".into(),
                severity: WarningSeverity::Error,
                hint: Some("Set to e.g. 8.0".into()),
            });
        }
        if self.safety.danger_cm >= self.safety.warning_cm {
            warnings.push(ConfigWarning {
                field: "safety.warning_cm".into(),
                message: format!(
                    "warning distance {} must be greater than danger distance {}",
                    self.safety.warning_cm, self.safety.danger_cm
                ),
                severity: WarningSeverity::Error,
                hint: Some("Defaults are danger 8.0, warning 15.0".into()),
            });
        }
        if self.safety.poll_interval_ms != self.safety.effective_poll_interval_ms() {
            warnings.push(ConfigWarning {
                field: "safety.poll_interval_ms".into(),
                message: format!(
                    "{}ms is outside [100, 5000]; using {}ms",
                    self.safety.poll_interval_ms,
                    self.safety.effective_poll_interval_ms()
                ),
                severity: WarningSeverity::Warning,
                hint: None,
            });
        }

        // ── Sequence ───
        if self.sequence.max_steps == 0 {
            warnings.push(ConfigWarning {
                field: "sequence.max_steps".into(),
                message: "max_steps is 0; multi-step utterances are ignored".into(),
                severity: WarningSeverity::Warning,
                hint: Some("Set to e.g. 5".into()),
            });
        }

        // ── NLU ───
        if !unit_interval(self.nlu.rule_floor) {
            warnings.push(ConfigWarning {
                field: "nlu.rule_floor".into(),
                message: format!("rule floor {} is out of range", self.nlu.rule_floor),
                severity: WarningSeverity::Error,
                hint: Some("Must be between 0.0 and 1.0".into()),
            });
        }

        if self.nlu.llm.enabled {
            if Url::parse(&self.nlu.llm.base_url).is_err() {
                warnings.push(ConfigWarning {
                    field: "nlu.llm.base_url".into(),
                    message: format!("'{}' is not a valid URL", self.nlu.llm.base_url),
                    severity: WarningSeverity::Error,
                    hint: Some("e.g. 'https://api.openai.com/v1' or 'http://localhost:11434/v1'".into()),
                });
            }
            if self.nlu.llm.api_key.is_none() {
                warnings.push(ConfigWarning {
                    field: "nlu.llm.api_key".into(),
                    message: "no API key set; requests are sent unauthenticated".into(),
                    severity: WarningSeverity::Warning,
                    hint: Some("Set nlu.llm.api_key or SIMO_LLM_API_KEY".into()),
                });
            }
        }

        // ── Device ───
        match self.device.link_address() {
            Ok(Some(_)) => {}
            Ok(None) => warnings.push(ConfigWarning {
                field: "device.link".into(),
                message: "no controller link configured; running dry".into(),
                severity: WarningSeverity::Info,
                hint: Some("Set device.link = \"tcp://host:port\" to drive the robot".into()),
            }),
            Err(e) => warnings.push(ConfigWarning {
                field: "device.link".into(),
                message: e,
                severity: WarningSeverity::Error,
                hint: Some("Use the form tcp://host:port".into()),
            }),
        }

        // ── Logging format ───
        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.format".into(),
                message: format!("unknown log format '{}'", self.logging.format),
                severity: WarningSeverity::Error,
                hint: Some(format!("Valid values: {}", valid_formats.join(", "))),
            });
        }

        // ── Logging level ───
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            warnings.push(ConfigWarning {
                field: "logging.level".into(),
                message: format!("unknown log level '{}'", self.logging.level),
                severity: WarningSeverity::Warning,
                hint: Some(format!("Valid values: {}", valid_levels.join(", "))),
            });
        }

        // Check for hard errors
        let errors: Vec<String> = warnings
            .iter()
            .filter(|w| w.severity == WarningSeverity::Error)
            .map(|w| format!("{}: {}", w.field, w.message))
            .collect();

        if !errors.is_empty() {
            return Err(format!("Configuration errors:\n  • {}", errors.join("\n  • ")));
        }

        Ok(warnings)
    }
}
