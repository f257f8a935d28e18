//! 工作流引擎
//!
//! 状态机 Planning → Generating(循环) → Evaluating → (Fixing → Generating → Evaluating)* → Done。
//! 所有外部调用的错误都在阶段内部消化：规划/评估失败直接结束为 Failure，
//! 单个子任务生成失败只标记该子任务 Failed 并继续下一个；run 本身从不返回错误。

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::agents::summary::{format_existing_files, format_subtasks_status, preview};
use crate::agents::{
    EvaluationRequest, Evaluator, FilePreview, GeneratedFile, GenerationRequest, Generator,
    ModificationContext, Planner,
};
use crate::tools::{normalize_path, ArtifactStore};
use crate::workflow::events::{EventLog, WorkflowEvent};
use crate::workflow::fix::synthesize_fix_tasks;
use crate::workflow::routers::{
    route_after_evaluation, route_after_generation, EvaluationRoute, GenerationRoute,
};
use crate::workflow::state::SessionState;
use crate::workflow::types::{Artifact, Outcome, Subtask, SubtaskMode, WorkflowPhase};

/// 三个能力提供者累计的 token 使用
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UsageTotals {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

impl UsageTotals {
    fn add(&mut self, (prompt, completion, total): (u64, u64, u64)) {
        self.prompt_tokens += prompt;
        self.completion_tokens += completion;
        self.total_tokens += total;
    }
}

/// 结束时仍未通过的子任务及其文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutstandingIssue {
    pub task_id: String,
    pub paths: Vec<String>,
    pub issues: Vec<String>,
}

/// 一次运行的结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub state: SessionState,
    pub events: Vec<WorkflowEvent>,
    pub token_usage: UsageTotals,
}

impl RunReport {
    pub fn outcome(&self) -> Outcome {
        self.state.outcome()
    }

    pub fn is_success(&self) -> bool {
        self.state.outcome().is_success()
    }

    pub fn summary(&self) -> &str {
        self.state.summary()
    }

    pub fn iteration(&self) -> u32 {
        self.state.iteration()
    }

    pub fn artifact_paths(&self) -> Vec<&str> {
        self.state.artifacts().keys().map(String::as_str).collect()
    }

    /// 最近一次评估中未通过的结果（task_id 无法解析时 paths 为空）
    pub fn outstanding_issues(&self) -> Vec<OutstandingIssue> {
        self.state
            .evaluation_results()
            .iter()
            .filter(|r| !r.passed)
            .map(|r| OutstandingIssue {
                task_id: r.task_id.clone(),
                paths: self
                    .state
                    .subtasks()
                    .iter()
                    .find(|t| t.id == r.task_id)
                    .map(|t| t.target_paths.clone())
                    .unwrap_or_default(),
                issues: r.issues.clone(),
            })
            .collect()
    }
}

/// 工作流引擎：持有三个能力提供者与工件存储，按状态机驱动一次完整运行
pub struct WorkflowEngine {
    pub(crate) planner: Arc<dyn Planner>,
    pub(crate) generator: Arc<dyn Generator>,
    pub(crate) evaluator: Arc<dyn Evaluator>,
    pub(crate) store: Arc<dyn ArtifactStore>,
    pub(crate) max_iterations: u32,
    pub(crate) preview_lines: usize,
    pub(crate) event_log_capacity: usize,
    pub(crate) event_tx: Option<mpsc::UnboundedSender<WorkflowEvent>>,
}

impl WorkflowEngine {
    pub fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    /// 执行一次完整运行，结束时 outcome 必为 Success 或 Failure
    pub async fn run(&self, requirement: &str) -> RunReport {
        let run_id = format!("run_{}", uuid::Uuid::new_v4());
        let mut state = SessionState::new(requirement, self.max_iterations);
        let mut events = EventLog::new(self.event_log_capacity);
        let mut phase = WorkflowPhase::Planning;
        let mut entered: Option<WorkflowPhase> = None;

        tracing::info!(run_id = %run_id, max_iterations = self.max_iterations, "workflow started");

        while phase != WorkflowPhase::Done {
            if entered != Some(phase) {
                tracing::info!(%phase, iteration = state.iteration(), "entering phase");
                self.emit(
                    &mut events,
                    WorkflowEvent::PhaseEntered {
                        phase,
                        iteration: state.iteration(),
                    },
                );
                entered = Some(phase);
            }

            phase = match phase {
                WorkflowPhase::Planning => self.plan(&mut state, &mut events).await,
                WorkflowPhase::Generating => {
                    self.generate_current(&mut state, &mut events).await;
                    match route_after_generation(&state) {
                        GenerationRoute::ContinueGenerating => WorkflowPhase::Generating,
                        GenerationRoute::Evaluate => WorkflowPhase::Evaluating,
                    }
                }
                WorkflowPhase::Evaluating => self.evaluate(&mut state, &mut events).await,
                WorkflowPhase::Fixing => self.fix(&mut state, &mut events),
                WorkflowPhase::Done => WorkflowPhase::Done,
            };
        }

        // Done 时必须已有终态
        if !state.is_finished() {
            state.finish(Outcome::Failure, "Workflow ended without a result");
        }

        tracing::info!(
            run_id = %run_id,
            outcome = ?state.outcome(),
            iteration = state.iteration(),
            artifacts = state.artifacts().len(),
            "workflow finished"
        );
        self.emit(
            &mut events,
            WorkflowEvent::Finished {
                outcome: state.outcome(),
                summary: state.summary().to_string(),
            },
        );

        let mut token_usage = UsageTotals::default();
        token_usage.add(self.planner.token_usage());
        token_usage.add(self.generator.token_usage());
        token_usage.add(self.evaluator.token_usage());

        RunReport {
            run_id,
            state,
            events: events.into_vec(),
            token_usage,
        }
    }

    fn emit(&self, events: &mut EventLog, event: WorkflowEvent) {
        if let Some(tx) = &self.event_tx {
            // 接收端已关闭时只保留本地日志
            let _ = tx.send(event.clone());
        }
        events.push(event);
    }

    async fn plan(&self, state: &mut SessionState, events: &mut EventLog) -> WorkflowPhase {
        let plan = match self.planner.plan(state.requirement()).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!(error = %e, "planning failed");
                state.finish(Outcome::Failure, format!("Planning failed: {}", e));
                return WorkflowPhase::Done;
            }
        };
        if let Err(e) = plan.validate() {
            tracing::error!(error = %e, "plan rejected");
            state.finish(Outcome::Failure, format!("Planning failed: {}", e));
            return WorkflowPhase::Done;
        }

        let subtasks = plan.to_subtasks();
        tracing::info!(subtasks = subtasks.len(), "plan accepted");
        self.emit(
            events,
            WorkflowEvent::PlanReady {
                subtasks: subtasks.len(),
            },
        );
        state.apply_plan(plan.plan, plan.technology_choices, subtasks);
        WorkflowPhase::Generating
    }

    fn generation_request(state: &SessionState, subtask: &Subtask) -> GenerationRequest {
        let modification = match &subtask.mode {
            SubtaskMode::Create => None,
            SubtaskMode::Modify {
                target_path,
                issues,
                suggestions,
            } => Some(ModificationContext {
                target_path: target_path.clone(),
                current_content: state
                    .artifacts()
                    .get(target_path)
                    .map(|a| a.content.clone())
                    .unwrap_or_default(),
                issues: issues.clone(),
                suggestions: suggestions.clone(),
                sibling_summary: format_existing_files(state.artifacts(), Some(target_path)),
            }),
        };

        GenerationRequest {
            requirement: state.requirement().to_string(),
            plan: state.plan().to_string(),
            technology_choices: state.technology_choices().clone(),
            subtask: subtask.clone(),
            position: (state.task_cursor() + 1, state.subtasks().len()),
            round_progress: format_subtasks_status(state.subtasks(), state.task_cursor()),
            prior_artifacts_summary: format_existing_files(state.artifacts(), None),
            modification,
        }
    }

    /// 写入生成的文件，返回 (成功路径, 失败路径)；不属于本子任务目标的文件不写入并计为失败
    async fn persist(
        &self,
        state: &mut SessionState,
        subtask: &Subtask,
        files: Vec<GeneratedFile>,
    ) -> (Vec<String>, Vec<String>) {
        let mut written = Vec::new();
        let mut failed = Vec::new();

        for file in files {
            let path = normalize_path(&file.path);
            if !subtask.targets(&path) {
                tracing::warn!(task_id = %subtask.id, path = %path, "generated file is not a target of this subtask");
                failed.push(path);
                continue;
            }
            let outcome = self.store.write(&path, &file.content).await;
            if outcome.success {
                state.record_artifact(Artifact::new(path.clone(), file.content));
                written.push(path);
            } else {
                tracing::error!(task_id = %subtask.id, path = %path, message = %outcome.message, "artifact write failed");
                failed.push(path);
            }
        }
        (written, failed)
    }

    async fn generate_current(&self, state: &mut SessionState, events: &mut EventLog) {
        let Some(subtask) = state.current_subtask().cloned() else {
            return;
        };
        let request = Self::generation_request(state, &subtask);
        tracing::info!(
            task_id = %subtask.id,
            index = request.position.0,
            total = request.position.1,
            modification = subtask.is_modification(),
            "generating subtask"
        );

        let (written, failed, error) = match self.generator.generate(&request).await {
            Ok(files) => {
                let (written, failed) = self.persist(state, &subtask, files).await;
                let error = if !failed.is_empty() {
                    Some(format!("Failed to create files: {}", failed.join(", ")))
                } else {
                    match subtask.target_path() {
                        Some(target) if !written.iter().any(|p| p == target) => {
                            Some(format!("Modified file missing from response: {}", target))
                        }
                        _ => None,
                    }
                };
                (written, failed, error)
            }
            Err(e) => {
                tracing::error!(task_id = %subtask.id, error = %e, "generation failed");
                (Vec::new(), Vec::new(), Some(format!("Generation failed: {}", e)))
            }
        };

        let status = match state.current_subtask_mut() {
            Some(current) => {
                let transition = match error {
                    Some(reason) => current.fail(reason),
                    None => current.complete(),
                };
                if let Err(e) = transition {
                    tracing::error!(task_id = %current.id, error = %e, "subtask status not updated");
                }
                current.status
            }
            None => return,
        };

        tracing::info!(task_id = %subtask.id, %status, written = written.len(), failed = failed.len(), "subtask finished");
        self.emit(
            events,
            WorkflowEvent::SubtaskFinished {
                task_id: subtask.id,
                status,
                written,
                failed,
            },
        );
        state.advance_cursor();
    }

    fn evaluation_request(&self, state: &SessionState) -> EvaluationRequest {
        EvaluationRequest {
            requirement: state.requirement().to_string(),
            subtasks: state.subtasks().to_vec(),
            artifact_paths: state.artifacts().keys().cloned().collect(),
            previews: state
                .artifacts()
                .values()
                .map(|a| FilePreview {
                    path: a.path.clone(),
                    preview: preview(&a.content, self.preview_lines),
                })
                .collect(),
        }
    }

    async fn evaluate(&self, state: &mut SessionState, events: &mut EventLog) -> WorkflowPhase {
        let request = self.evaluation_request(state);
        let report = match self.evaluator.evaluate(&request).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "evaluation failed");
                state.finish(Outcome::Failure, format!("Evaluation failed: {}", e));
                return WorkflowPhase::Done;
            }
        };

        let passed = report.results.iter().filter(|r| r.passed).count();
        let failed = report.results.len() - passed;
        tracing::info!(
            iteration = state.iteration(),
            passed,
            failed,
            overall_passed = report.overall_passed,
            "evaluation done"
        );
        self.emit(
            events,
            WorkflowEvent::EvaluationDone {
                iteration: state.iteration(),
                passed,
                failed,
                overall_passed: report.overall_passed,
            },
        );
        state.apply_evaluation(report.results, report.overall_passed, report.summary);

        match route_after_evaluation(state) {
            EvaluationRoute::Fix => WorkflowPhase::Fixing,
            EvaluationRoute::Succeed => {
                let summary = if state.summary().is_empty() {
                    "All subtasks passed evaluation".to_string()
                } else {
                    state.summary().to_string()
                };
                state.finish(Outcome::Success, summary);
                WorkflowPhase::Done
            }
            EvaluationRoute::Fail => {
                let summary = format!(
                    "Reached max iterations ({}) with outstanding issues. {}",
                    state.max_iterations(),
                    state.summary()
                );
                state.finish(Outcome::Failure, summary.trim_end().to_string());
                WorkflowPhase::Done
            }
        }
    }

    fn fix(&self, state: &mut SessionState, events: &mut EventLog) -> WorkflowPhase {
        let plan = synthesize_fix_tasks(
            state.evaluation_results(),
            state.subtasks(),
            state.artifacts(),
            state.iteration(),
        );
        for task_id in &plan.dropped_task_ids {
            self.emit(
                events,
                WorkflowEvent::ResultDropped {
                    task_id: task_id.clone(),
                },
            );
        }
        for path in &plan.discarded_paths {
            self.emit(events, WorkflowEvent::BucketDiscarded { path: path.clone() });
        }

        if plan.is_empty() {
            tracing::warn!(iteration = state.iteration(), "no fixable issues, giving up");
            let summary = format!(
                "Evaluation reported issues but none could be fixed. {}",
                state.summary()
            );
            state.finish(Outcome::Failure, summary.trim_end().to_string());
            return WorkflowPhase::Done;
        }

        let fix_tasks = plan.subtasks.len();
        state.start_fix_round(plan.subtasks);
        tracing::info!(iteration = state.iteration(), fix_tasks, "fix round started");
        self.emit(
            events,
            WorkflowEvent::FixRoundStarted {
                iteration: state.iteration(),
                fix_tasks,
            },
        );
        WorkflowPhase::Generating
    }
}
