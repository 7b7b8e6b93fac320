//! Templated prompts. Never generated by a model.

use simo_core::{Action, Heading, Intent, RobotMode, Side};

/// Question asked before executing a gated intent.
pub fn confirmation_prompt(intent: &Intent, mode: RobotMode, duration_ms: u32) -> String {
    let hint = if duration_ms > 0 {
        format!("（大约{duration_ms}毫秒）")
    } else {
        String::new()
    };
    match intent.action() {
        Action::Move { heading, .. } => {
            let dir = match heading {
                Heading::Forward => "向前",
                Heading::Backward => "后退",
            };
            format!("要{dir}走一段吗？{hint}")
        }
        Action::Turn { side, .. } => {
            let dir = match side {
                Side::Left => "左转",
                Side::Right => "右转",
            };
            format!("要继续{dir}吗？{hint}")
        }
        Action::Query if mode.is_moving() => "我正在移动，要先停下吗？".to_string(),
        Action::Query => "你是想查询状态吗？".to_string(),
        _ => "要执行吗？".to_string(),
    }
}

/// Offer made after an action completes.
pub fn fluency_prompt(action: &Action) -> String {
    let text = match action {
        Action::Move {
            heading: Heading::Backward,
            ..
        } => "继续后退",
        Action::Move { .. } => "继续向前走",
        Action::Turn {
            side: Side::Right, ..
        } => "继续右转",
        Action::Turn { .. } => "继续左转",
        _ => return "要继续吗？".to_string(),
    };
    format!("我可以{text}，要继续吗？")
}

#[cfg(test)]
mod tests {
    use super::*;
    use simo_core::{Direction, DurationPreset, Origin};

    fn intent(action: Action) -> Intent {
        Intent::new(action, 0.9, "", Origin::Rule)
    }

    #[test]
    fn move_prompt_carries_duration_hint() {
        let i = intent(Action::motion(Direction::F, DurationPreset::Long));
        assert_eq!(
            confirmation_prompt(&i, RobotMode::Idle, 1200),
            "要向前走一段吗？（大约1200毫秒）"
        );
    }

    #[test]
    fn query_prompt_depends_on_motion() {
        let q = intent(Action::Query);
        assert_eq!(
            confirmation_prompt(&q, RobotMode::Moving, 0),
            "我正在移动，要先停下吗？"
        );
        assert_eq!(confirmation_prompt(&q, RobotMode::Idle, 0), "你是想查询状态吗？");
    }

    #[test]
    fn fluency_prompt_templates() {
        let back = Action::motion(Direction::B, DurationPreset::Medium);
        assert_eq!(fluency_prompt(&back), "我可以继续后退，要继续吗？");
        let left = Action::motion(Direction::L, DurationPreset::Short);
        assert_eq!(fluency_prompt(&left), "我可以继续左转，要继续吗？");
    }
}
