//! 会话状态：贯穿每个阶段的唯一可变记录
//!
//! 只由引擎当前的阶段处理函数写入，路由只读。task_cursor 与 iteration 构成单调进度度量，
//! 所有修改方法都不会让二者减小。

use std::collections::BTreeMap;

use serde::Serialize;

use crate::workflow::types::{Artifact, EvaluationResult, Outcome, Subtask};

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub(crate) requirement: String,
    pub(crate) plan: String,
    pub(crate) technology_choices: BTreeMap<String, String>,
    pub(crate) subtasks: Vec<Subtask>,
    pub(crate) artifacts: BTreeMap<String, Artifact>,
    pub(crate) task_cursor: usize,
    pub(crate) evaluation_results: Vec<EvaluationResult>,
    /// 最近一次评估的整体结论，仅作参考，路由只看 evaluation_results
    pub(crate) overall_passed: Option<bool>,
    pub(crate) iteration: u32,
    pub(crate) max_iterations: u32,
    pub(crate) outcome: Outcome,
    pub(crate) summary: String,
}

impl SessionState {
    pub fn new(requirement: impl Into<String>, max_iterations: u32) -> Self {
        Self {
            requirement: requirement.into(),
            plan: String::new(),
            technology_choices: BTreeMap::new(),
            subtasks: Vec::new(),
            artifacts: BTreeMap::new(),
            task_cursor: 0,
            evaluation_results: Vec::new(),
            overall_passed: None,
            iteration: 0,
            max_iterations,
            outcome: Outcome::Undetermined,
            summary: String::new(),
        }
    }

    pub fn requirement(&self) -> &str {
        &self.requirement
    }

    pub fn plan(&self) -> &str {
        &self.plan
    }

    pub fn technology_choices(&self) -> &BTreeMap<String, String> {
        &self.technology_choices
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn artifacts(&self) -> &BTreeMap<String, Artifact> {
        &self.artifacts
    }

    pub fn task_cursor(&self) -> usize {
        self.task_cursor
    }

    pub fn evaluation_results(&self) -> &[EvaluationResult] {
        &self.evaluation_results
    }

    pub fn overall_passed(&self) -> Option<bool> {
        self.overall_passed
    }

    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// 当前游标指向的子任务（本轮已全部生成时为 None）
    pub fn current_subtask(&self) -> Option<&Subtask> {
        self.subtasks.get(self.task_cursor)
    }

    pub(crate) fn current_subtask_mut(&mut self) -> Option<&mut Subtask> {
        self.subtasks.get_mut(self.task_cursor)
    }

    /// 写入规划结果：计划、技术选型与首轮子任务
    pub(crate) fn apply_plan(
        &mut self,
        plan: String,
        technology_choices: BTreeMap<String, String>,
        subtasks: Vec<Subtask>,
    ) {
        self.plan = plan;
        self.technology_choices = technology_choices;
        self.subtasks = subtasks;
        self.task_cursor = 0;
    }

    /// 同路径覆盖（修改语义），不删除其它工件
    pub(crate) fn record_artifact(&mut self, artifact: Artifact) {
        self.artifacts.insert(artifact.path.clone(), artifact);
    }

    /// 游标前进一步，不会越过子任务总数
    pub(crate) fn advance_cursor(&mut self) {
        if self.task_cursor < self.subtasks.len() {
            self.task_cursor += 1;
        }
    }

    pub(crate) fn apply_evaluation(
        &mut self,
        results: Vec<EvaluationResult>,
        overall_passed: bool,
        summary: String,
    ) {
        self.evaluation_results = results;
        self.overall_passed = Some(overall_passed);
        self.summary = summary;
    }

    /// 开始新一轮修复：整体替换子任务、游标归零、迭代数加一
    pub(crate) fn start_fix_round(&mut self, subtasks: Vec<Subtask>) {
        self.subtasks = subtasks;
        self.task_cursor = 0;
        self.iteration += 1;
    }

    /// 设置终态；已有终态时忽略并返回 false
    pub(crate) fn finish(&mut self, outcome: Outcome, summary: impl Into<String>) -> bool {
        if self.outcome != Outcome::Undetermined {
            return false;
        }
        self.outcome = outcome;
        self.summary = summary.into();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.outcome != Outcome::Undetermined
    }

    pub fn has_outstanding_issues(&self) -> bool {
        self.evaluation_results.iter().any(|r| !r.passed)
    }
}
