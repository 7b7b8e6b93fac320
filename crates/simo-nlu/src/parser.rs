use simo_core::{Intent, Suggestion};

/// What a parser made of an utterance.
#[derive(Debug, Clone, PartialEq)]
pub enum Understanding {
    Intent(Intent),
    Suggestions(Vec<Suggestion>),
    Nothing,
}

impl Understanding {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Understanding::Nothing)
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Understanding::Intent(intent) => intent.confidence(),
            Understanding::Suggestions(_) => simo_core::SEQUENCE_STEP_CONFIDENCE,
            Understanding::Nothing => 0.0,
        }
    }
}

/// A local, synchronous matcher. Rule sets are swappable behind this trait.
pub trait Parser: Send + Sync {
    fn name(&self) -> &str;

    fn parse(&self, text: &str) -> Understanding;
}
