//! 工作流过程事件：记录阶段切换与关键决策，可序列化为 JSON 供 CLI 或前端展示

use std::collections::VecDeque;

use serde::Serialize;

use crate::workflow::types::{Outcome, SubtaskStatus, WorkflowPhase};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// 进入新阶段
    PhaseEntered { phase: WorkflowPhase, iteration: u32 },
    /// 规划完成
    PlanReady { subtasks: usize },
    /// 单个子任务生成结束
    SubtaskFinished {
        task_id: String,
        status: SubtaskStatus,
        written: Vec<String>,
        failed: Vec<String>,
    },
    /// 评估完成
    EvaluationDone {
        iteration: u32,
        passed: usize,
        failed: usize,
        overall_passed: bool,
    },
    /// 评估结果引用了不存在的子任务
    ResultDropped { task_id: String },
    /// 修复目标文件不存在
    BucketDiscarded { path: String },
    /// 开始新一轮修复
    FixRoundStarted { iteration: u32, fix_tasks: usize },
    /// 运行结束
    Finished { outcome: Outcome, summary: String },
}

/// 有界事件日志，超出容量时丢弃最早的事件
#[derive(Debug, Clone)]
pub struct EventLog {
    events: VecDeque<WorkflowEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, event: WorkflowEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorkflowEvent> {
        self.events.iter()
    }

    pub fn into_vec(self) -> Vec<WorkflowEvent> {
        self.events.into()
    }
}
