use async_trait::async_trait;
use serde_json::Value;
use simo_core::{
    Action, Direction, DurationPreset, MAX_SEQUENCE_STEPS, Result, SimoError, Suggestion,
    collapse_and_cap,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// System prompt handed to the model. It may only classify; it never
/// decides whether anything executes.
pub const SYSTEM_PROMPT: &str = r#"你是一个语言理解模块。
你的任务是把用户的中文指令转换成动作建议列表。

你**不能**决定是否执行动作，
你**不能**输出自然语言解释，
你**不能**创造新的动作类型。

你只能输出 JSON。

允许的动作：
- MOVE(F=前进, B=后退)
- TURN(L=左转, R=右转)
- STOP
- duration_ms ∈ [400, 800, 1200]

输出格式：
{
  "suggestions": [
    { "intent": "MOVE", "direction": "F", "duration_ms": 800 }
  ],
  "confidence": 0.85
}

如果无法理解，输出：
{ "suggestions": [], "confidence": 0 }"#;

/// A text-in, text-out model call.
#[async_trait]
pub trait LlmCall: Send + Sync {
    fn name(&self) -> &str;

    async fn call(&self, system: &str, text: &str) -> Result<String>;
}

/// Sanitized model output.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmOutput {
    pub suggestions: Vec<Suggestion>,
    pub confidence: f64,
}

/// Pull a JSON object out of model text: the whole text if it parses,
/// otherwise the outermost `{...}` span.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

fn sanitize_one(item: &Value, raw_text: &str) -> Option<Suggestion> {
    let intent = item.get("intent")?.as_str()?;
    let direction = item
        .get("direction")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<Direction>().ok());

    let action = match (intent, direction) {
        ("STOP", None) => Action::Stop,
        ("MOVE", Some(d @ (Direction::F | Direction::B)))
        | ("TURN", Some(d @ (Direction::L | Direction::R))) => {
            let duration = item
                .get("duration_ms")
                .and_then(Value::as_f64)
                .map(DurationPreset::snap)
                .unwrap_or(DurationPreset::Medium);
            Action::motion(d, duration)
        }
        _ => return None,
    };
    Some(Suggestion::new(action, raw_text))
}

/// Keep only well-formed MOVE/TURN/STOP items, snap durations onto the
/// presets, cap the list, and collapse it to `[STOP]` if a STOP appears.
pub fn sanitize_suggestions(items: &Value, raw_text: &str, max_steps: usize) -> Vec<Suggestion> {
    let Some(items) = items.as_array() else {
        return Vec::new();
    };
    let kept: Vec<Suggestion> = items
        .iter()
        .filter_map(|item| sanitize_one(item, raw_text))
        .collect();
    if kept.len() < items.len() {
        debug!(dropped = items.len() - kept.len(), "discarded malformed model suggestions");
    }
    collapse_and_cap(kept, max_steps)
}

/// Runs an [`LlmCall`] under a deadline and sanitizes what comes back.
#[derive(Clone)]
pub struct LlmParser {
    llm: Arc<dyn LlmCall>,
    timeout: Duration,
    max_steps: usize,
}

impl LlmParser {
    pub fn new(llm: Arc<dyn LlmCall>, timeout: Duration) -> Self {
        Self {
            llm,
            timeout,
            max_steps: MAX_SEQUENCE_STEPS,
        }
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.clamp(1, MAX_SEQUENCE_STEPS);
        self
    }

    pub fn name(&self) -> &str {
        self.llm.name()
    }

    /// Any failure here means nothing was understood; callers fall back.
    pub async fn parse(&self, text: &str) -> Result<LlmOutput> {
        let call = self.llm.call(SYSTEM_PROMPT, text);
        let reply = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| SimoError::LlmTimeout(self.timeout.as_millis() as u64))??;

        let parsed = extract_json(&reply).ok_or_else(|| {
            warn!(provider = self.llm.name(), "model reply held no JSON");
            SimoError::UnparseableOutput(reply.chars().take(200).collect())
        })?;

        let suggestions = parsed
            .get("suggestions")
            .map(|items| sanitize_suggestions(items, text, self.max_steps))
            .unwrap_or_default();
        let confidence = parsed
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .map_or(0.0, |c| c.clamp(0.0, 1.0));

        Ok(LlmOutput {
            suggestions,
            confidence,
        })
    }
}
