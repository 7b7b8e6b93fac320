use serde::{Deserialize, Serialize};
use simo_core::{Intent, MAX_SEQUENCE_STEPS, Origin, Suggestion};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::LlmParser;
use crate::parser::{Parser, Understanding};
use crate::rules::RuleParser;
use crate::sequence::SequenceParser;

/// Which track produced an [`NluResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NluSource {
    Rule,
    RuleSequence,
    Llm,
    LlmSequence,
    RuleLow,
    None,
}

impl fmt::Display for NluSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NluSource::Rule => "rule",
            NluSource::RuleSequence => "rule_sequence",
            NluSource::Llm => "llm",
            NluSource::LlmSequence => "llm_sequence",
            NluSource::RuleLow => "rule_low",
            NluSource::None => "none",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NluResult {
    pub source: NluSource,
    pub understanding: Understanding,
    pub confidence: f64,
}

impl NluResult {
    fn new(source: NluSource, understanding: Understanding) -> Self {
        let confidence = understanding.confidence();
        Self {
            source,
            understanding,
            confidence,
        }
    }

    fn nothing() -> Self {
        Self::new(NluSource::None, Understanding::Nothing)
    }
}

/// Rules first, model last.
///
/// 1. A multi-clause utterance that segments into two or more steps (or a
///    STOP) becomes suggestions. This runs before the single-clause rule so
///    the "后" inside "然后" is never read as "go backward".
/// 2. A single-clause rule match at or above `rule_floor` wins.
/// 3. A segmented utterance with one recognisable step becomes suggestions.
/// 4. The LLM, if configured. Its output is sanitized and carries no
///    authority: it is parsed into the same intents as everything else.
/// 5. A low-confidence rule match.
/// 6. Nothing understood.
#[derive(Clone)]
pub struct NluMerge {
    rules: Arc<dyn Parser>,
    sequence: Arc<dyn Parser>,
    llm: Option<LlmParser>,
    rule_floor: f64,
}

impl Default for NluMerge {
    fn default() -> Self {
        Self::new(0.7, MAX_SEQUENCE_STEPS)
    }
}

impl NluMerge {
    pub fn new(rule_floor: f64, max_steps: usize) -> Self {
        Self {
            rules: Arc::new(RuleParser::new()),
            sequence: Arc::new(SequenceParser::new(max_steps)),
            llm: None,
            rule_floor,
        }
    }

    pub fn from_config(config: &simo_config::SimoConfig) -> Self {
        Self::new(config.nlu.rule_floor, config.sequence.max_steps)
    }

    pub fn with_llm(mut self, llm: LlmParser) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Swap the single-clause matcher.
    pub fn with_rules(mut self, rules: Arc<dyn Parser>) -> Self {
        self.rules = rules;
        self
    }

    /// Swap the multi-clause segmenter.
    pub fn with_sequence(mut self, sequence: Arc<dyn Parser>) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub async fn understand(&self, text: &str) -> NluResult {
        let text = text.trim();
        if text.is_empty() {
            return NluResult::nothing();
        }

        let sequence = self.sequence.parse(text);
        if let Understanding::Suggestions(ref steps) = sequence {
            if steps.len() >= 2 || steps.iter().any(Suggestion::is_stop) {
                info!(count = steps.len(), "rule sequence matched");
                return NluResult::new(NluSource::RuleSequence, sequence);
            }
        }

        let rule = self.rules.parse(text);
        if let Understanding::Intent(ref intent) = rule {
            if intent.confidence() >= self.rule_floor {
                info!(kind = %intent.kind(), confidence = intent.confidence(), "rule matched");
                return NluResult::new(NluSource::Rule, rule);
            }
        }

        if matches!(sequence, Understanding::Suggestions(_)) {
            return NluResult::new(NluSource::RuleSequence, sequence);
        }

        if let Some(llm) = &self.llm {
            match llm.parse(text).await {
                Ok(out) if out.suggestions.len() == 1 => {
                    let step = &out.suggestions[0];
                    let intent = Intent::new(step.action, out.confidence, text, Origin::Llm);
                    info!(kind = %intent.kind(), confidence = out.confidence, "llm matched");
                    return NluResult {
                        source: NluSource::Llm,
                        understanding: Understanding::Intent(intent),
                        confidence: out.confidence,
                    };
                }
                Ok(out) if !out.suggestions.is_empty() => {
                    info!(
                        count = out.suggestions.len(),
                        confidence = out.confidence,
                        "llm sequence matched"
                    );
                    return NluResult {
                        source: NluSource::LlmSequence,
                        understanding: Understanding::Suggestions(out.suggestions),
                        confidence: out.confidence,
                    };
                }
                Ok(_) => debug!(provider = llm.name(), "llm understood nothing"),
                Err(e) => info!(provider = llm.name(), error = %e, "llm fallback failed"),
            }
        }

        if let Understanding::Intent(ref intent) = rule {
            debug!(
                kind = %intent.kind(),
                confidence = intent.confidence(),
                "using low-confidence rule match"
            );
            return NluResult::new(NluSource::RuleLow, rule);
        }

        debug!(text, "not understood");
        NluResult::nothing()
    }
}
