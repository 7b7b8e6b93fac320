use simo_core::{Action, Direction, DurationPreset, Intent, Origin};

use crate::parser::{Parser, Understanding};

pub const STOP_CONFIDENCE: f64 = 0.95;
pub const BEEP_CONFIDENCE: f64 = 0.9;
pub const QUERY_CONFIDENCE: f64 = 0.85;
pub const MOTION_CONFIDENCE: f64 = 0.85;
/// Side-steps only guess a direction.
pub const SIDE_STEP_CONFIDENCE: f64 = 0.7;

const STOP_WORDS: &[&str] = &[
    "停", "别动", "等等", "暂停", "停下", "停止", "stop", "别走", "站住", "不要动", "别跑",
    "慢着", "等一下", "够了", "可以了", "行了", "好了停", "算了", "打住", "收", "定", "住",
];
const BEEP_WORDS: &[&str] = &["响", "叫", "蜂鸣", "滴", "嘀", "哔", "beep", "出声", "吱"];
const QUERY_WORDS: &[&str] = &["状态", "在哪", "你在干嘛", "什么情况", "status"];

const LONG_WORDS: &[&str] = &[
    "多", "远", "久", "大", "快", "使劲", "用力", "狠狠", "猛", "拼命", "加油",
];
const SHORT_WORDS: &[&str] = &[
    "一点", "一下", "稍微", "轻轻", "慢慢", "小心", "一丢丢", "一咪咪", "一丁点",
];

const BACKWARD_WORDS: &[&str] = &[
    "后退", "往后", "向后", "退", "back", "倒", "回", "撤", "后",
];
const LEFT_WORDS: &[&str] = &["左转", "向左", "往左", "left", "左拐", "左"];
const SIDE_WORDS: &[&str] = &[
    "往旁", "旁边", "靠边", "让开", "闪开", "挪", "移", "别挨", "离远", "远点",
];
const RIGHT_WORDS: &[&str] = &["右转", "向右", "往右", "right", "右拐", "右"];
const FORWARD_WORDS: &[&str] = &[
    "前进", "往前", "向前", "go", "forward", "走", "上", "冲", "来", "进", "直行", "动起来",
    "前",
];

fn any_of(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Duration modifier. LONG words win over SHORT ones.
fn duration_of(text: &str) -> DurationPreset {
    if any_of(text, LONG_WORDS) {
        DurationPreset::Long
    } else if any_of(text, SHORT_WORDS) {
        DurationPreset::Short
    } else {
        DurationPreset::Medium
    }
}

/// Match one clause against the colloquial vocabulary.
///
/// Priority: STOP, BEEP, QUERY, then backward, left, side-step, right,
/// forward. Backward is checked before forward so "往后走" is not read as a
/// forward walk.
pub fn match_clause(text: &str) -> Option<(Action, f64)> {
    let t = text.trim().to_lowercase();
    if t.is_empty() {
        return None;
    }

    if any_of(&t, STOP_WORDS) {
        return Some((Action::Stop, STOP_CONFIDENCE));
    }
    if any_of(&t, BEEP_WORDS) {
        return Some((Action::Beep, BEEP_CONFIDENCE));
    }
    if any_of(&t, QUERY_WORDS) {
        return Some((Action::Query, QUERY_CONFIDENCE));
    }

    let duration = duration_of(&t);
    let directional = [
        (BACKWARD_WORDS, Direction::B, MOTION_CONFIDENCE),
        (LEFT_WORDS, Direction::L, MOTION_CONFIDENCE),
        // no way to know which side is free, default right
        (SIDE_WORDS, Direction::R, SIDE_STEP_CONFIDENCE),
        (RIGHT_WORDS, Direction::R, MOTION_CONFIDENCE),
        (FORWARD_WORDS, Direction::F, MOTION_CONFIDENCE),
    ];
    directional
        .into_iter()
        .find(|(words, _, _)| any_of(&t, words))
        .map(|(_, direction, confidence)| (Action::motion(direction, duration), confidence))
}

/// Single-clause keyword matcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleParser;

impl RuleParser {
    pub fn new() -> Self {
        Self
    }
}

impl Parser for RuleParser {
    fn name(&self) -> &str {
        "rules"
    }

    fn parse(&self, text: &str) -> Understanding {
        match match_clause(text) {
            Some((action, confidence)) => {
                Understanding::Intent(Intent::new(action, confidence, text, Origin::Rule))
            }
            None => Understanding::Nothing,
        }
    }
}
