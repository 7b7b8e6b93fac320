//! Yes/no classification of short replies.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplyDecision {
    Confirm,
    Cancel,
    Ignore,
}

/// A closed confirm/cancel vocabulary.
///
/// Matching order: exact confirm word, exact cancel word, confirm word plus
/// one of `suffixes`, then (when `permissive_cancel`) any reply that merely
/// contains a cancel word. Everything else is ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyVocabulary {
    pub confirm: &'static [&'static str],
    pub cancel: &'static [&'static str],
    pub suffixes: &'static [&'static str],
    pub permissive_cancel: bool,
}

const CONFIRM_WORDS: &[&str] = &[
    "是", "对", "好", "好的", "执行", "继续", "嗯", "可以", "确认", "走", "转", "行",
];
const CANCEL_WORDS: &[&str] = &[
    "不", "不要", "算了", "取消", "停", "停止", "别", "不用", "否", "不行",
];

const FLUENCY_YES: &[&str] = &[
    "是", "对", "好", "好的", "继续", "执行", "可以", "嗯", "要", "行", "是的", "好啊", "走",
];
const FLUENCY_NO: &[&str] = &[
    "不", "不要", "算了", "取消", "不用", "别", "否", "停", "停止", "不了",
];

impl ReplyVocabulary {
    /// Vocabulary for answering a confirmation question.
    pub const CONFIRMATION: ReplyVocabulary = ReplyVocabulary {
        confirm: CONFIRM_WORDS,
        cancel: CANCEL_WORDS,
        suffixes: &["的", "啊", "呀"],
        permissive_cancel: true,
    };

    /// Vocabulary for answering a "shall I continue?" suggestion.
    pub const FLUENCY: ReplyVocabulary = ReplyVocabulary {
        confirm: FLUENCY_YES,
        cancel: FLUENCY_NO,
        suffixes: &[],
        permissive_cancel: true,
    };

    pub fn with_permissive_cancel(mut self, permissive: bool) -> Self {
        self.permissive_cancel = permissive;
        self
    }

    pub fn parse(&self, text: &str) -> ReplyDecision {
        let t = text.trim().to_lowercase();
        if t.is_empty() {
            return ReplyDecision::Ignore;
        }

        if self.confirm.contains(&t.as_str()) {
            return ReplyDecision::Confirm;
        }
        if self.cancel.contains(&t.as_str()) {
            return ReplyDecision::Cancel;
        }

        let suffixed_confirm = self.confirm.iter().any(|word| {
            t.strip_prefix(word)
                .is_some_and(|rest| self.suffixes.contains(&rest))
        });
        if suffixed_confirm {
            return ReplyDecision::Confirm;
        }

        if self.permissive_cancel && self.cancel.iter().any(|word| t.contains(word)) {
            return ReplyDecision::Cancel;
        }

        ReplyDecision::Ignore
    }
}

impl Default for ReplyVocabulary {
    fn default() -> Self {
        Self::CONFIRMATION
    }
}
