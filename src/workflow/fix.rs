//! 修复任务生成：把一轮失败的评估结果转换成按文件分桶的修改子任务
//!
//! 1. 失败结果按 task_id 解析到本轮子任务，解析不到的直接丢弃（只记日志）
//! 2. 子任务的每个目标文件一个桶，issues / suggestions 依次追加，不去重
//! 3. 桶对应的文件从未成功生成时丢弃整个桶，避免对不存在的文件无限重试
//! 4. 每个存活的桶生成一个 Modify 子任务，id 为 `fix-<iteration>-<序号>`，保持首次出现顺序
//!
//! 纯函数，不修改任何状态；相同输入得到相同输出。

use std::collections::{BTreeMap, HashMap};

use crate::workflow::types::{Artifact, EvaluationResult, Subtask};

/// 单个文件的问题汇总
#[derive(Debug, Default)]
struct Bucket {
    path: String,
    issues: Vec<String>,
    suggestions: Vec<String>,
}

/// 修复任务生成结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixPlan {
    /// 新一轮的 Modify 子任务
    pub subtasks: Vec<Subtask>,
    /// task_id 无法解析而被丢弃的评估结果
    pub dropped_task_ids: Vec<String>,
    /// 目标文件不存在而被丢弃的桶
    pub discarded_paths: Vec<String>,
}

impl FixPlan {
    pub fn is_empty(&self) -> bool {
        self.subtasks.is_empty()
    }
}

pub fn synthesize_fix_tasks(
    results: &[EvaluationResult],
    subtasks: &[Subtask],
    artifacts: &BTreeMap<String, Artifact>,
    iteration: u32,
) -> FixPlan {
    let mut plan = FixPlan::default();
    let mut buckets: Vec<Bucket> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for result in results.iter().filter(|r| !r.passed) {
        let Some(subtask) = subtasks.iter().find(|t| t.id == result.task_id) else {
            tracing::warn!(task_id = %result.task_id, "evaluation result references unknown subtask, dropped");
            plan.dropped_task_ids.push(result.task_id.clone());
            continue;
        };

        for path in &subtask.target_paths {
            let slot = *index.entry(path.clone()).or_insert_with(|| {
                buckets.push(Bucket {
                    path: path.clone(),
                    ..Bucket::default()
                });
                buckets.len() - 1
            });
            let bucket = &mut buckets[slot];
            bucket.issues.extend(result.issues.iter().cloned());
            bucket.suggestions.extend(result.suggestions.iter().cloned());
        }
    }

    for bucket in buckets {
        if !artifacts.contains_key(&bucket.path) {
            tracing::warn!(path = %bucket.path, "fix target was never generated, bucket discarded");
            plan.discarded_paths.push(bucket.path);
            continue;
        }
        let id = format!("fix-{}-{}", iteration, plan.subtasks.len());
        plan.subtasks.push(Subtask::modify(
            id,
            bucket.path,
            bucket.issues,
            bucket.suggestions,
        ));
    }

    tracing::debug!(
        iteration,
        fix_tasks = plan.subtasks.len(),
        dropped = plan.dropped_task_ids.len(),
        discarded = plan.discarded_paths.len(),
        "fix tasks synthesized"
    );
    plan
}
