//! 路由：两个纯函数，读取会话状态决定下一阶段，无副作用

use crate::workflow::state::SessionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationRoute {
    ContinueGenerating,
    Evaluate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationRoute {
    Fix,
    Succeed,
    Fail,
}

/// 还有未生成的子任务则继续，否则进入评估
pub fn route_after_generation(state: &SessionState) -> GenerationRoute {
    let cursor = state.task_cursor();
    let total = state.subtasks().len();
    tracing::debug!(cursor, total, "router: generation progress");

    if cursor < total {
        GenerationRoute::ContinueGenerating
    } else {
        GenerationRoute::Evaluate
    }
}

/// 达到迭代上限只会阻止继续修复，不会推翻干净的评估结果
pub fn route_after_evaluation(state: &SessionState) -> EvaluationRoute {
    let has_issues = state.has_outstanding_issues();
    let iteration = state.iteration();
    let max_iterations = state.max_iterations();

    let route = if iteration >= max_iterations {
        if has_issues {
            EvaluationRoute::Fail
        } else {
            EvaluationRoute::Succeed
        }
    } else if has_issues {
        EvaluationRoute::Fix
    } else {
        EvaluationRoute::Succeed
    };

    tracing::debug!(iteration, max_iterations, has_issues, ?route, "router: evaluation");
    route
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{EvaluationResult, Subtask};
    use std::collections::BTreeMap;

    fn state_with(iteration: u32, max_iterations: u32, has_issues: bool) -> SessionState {
        let mut state = SessionState::new("req", max_iterations);
        state.iteration = iteration;
        state.evaluation_results = vec![
            EvaluationResult {
                task_id: "task_1".into(),
                passed: true,
                issues: vec![],
                suggestions: vec![],
            },
            EvaluationResult {
                task_id: "task_2".into(),
                passed: !has_issues,
                issues: vec![],
                suggestions: vec![],
            },
        ];
        state
    }

    #[test]
    fn test_terminal_routing() {
        assert_eq!(route_after_evaluation(&state_with(3, 3, false)), EvaluationRoute::Succeed);
        assert_eq!(route_after_evaluation(&state_with(3, 3, true)), EvaluationRoute::Fail);
        assert_eq!(route_after_evaluation(&state_with(1, 3, true)), EvaluationRoute::Fix);
        assert_eq!(route_after_evaluation(&state_with(0, 3, false)), EvaluationRoute::Succeed);
    }

    #[test]
    fn test_zero_iteration_cap_never_fixes() {
        assert_eq!(route_after_evaluation(&state_with(0, 0, true)), EvaluationRoute::Fail);
    }

    #[test]
    fn test_empty_results_succeed() {
        let state = SessionState::new("req", 3);
        assert_eq!(route_after_evaluation(&state), EvaluationRoute::Succeed);
    }

    #[test]
    fn test_generation_routing() {
        let mut state = SessionState::new("req", 3);
        state.apply_plan(
            String::new(),
            BTreeMap::new(),
            vec![
                Subtask::create("a", "a", "a", vec!["a.html".into()], vec![]),
                Subtask::create("b", "b", "b", vec!["b.js".into()], vec![]),
            ],
        );
        assert_eq!(route_after_generation(&state), GenerationRoute::ContinueGenerating);
        state.advance_cursor();
        assert_eq!(route_after_generation(&state), GenerationRoute::ContinueGenerating);
        state.advance_cursor();
        assert_eq!(route_after_generation(&state), GenerationRoute::Evaluate);
    }
}
