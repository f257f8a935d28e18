//! 生成上下文摘要
//!
//! 按文件类型提取摘要（HTML 引用、CSS 选择器、JS 导入/函数/导出，其它取前 10 行），
//! 生成本轮子任务进度列表，以及评估用的按行截断预览。

use std::collections::BTreeMap;

use crate::workflow::types::{Artifact, Subtask};

const DEFAULT_PREVIEW_LINES: usize = 10;

fn html_summary(lines: &[&str]) -> String {
    let refs: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| {
            let lower = l.to_lowercase();
            (lower.contains("<link") && lower.contains("href="))
                || (lower.contains("<script") && lower.contains("src="))
        })
        .take(5)
        .collect();

    let mut summary = format!("HTML file ({} lines)", lines.len());
    if !refs.is_empty() {
        summary.push_str("\nReferences:\n  ");
        summary.push_str(&refs.join("\n  "));
    }
    summary
}

fn css_summary(lines: &[&str]) -> String {
    let selectors: Vec<&str> = lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty() && (l.contains('{') || l.ends_with(',')))
        .filter_map(|l| {
            let selector = l.split('{').next().unwrap_or("").trim().trim_end_matches(',');
            (!selector.is_empty() && !selector.starts_with("/*")).then_some(selector)
        })
        .take(10)
        .collect();

    let mut summary = format!("CSS file ({} lines)", lines.len());
    if !selectors.is_empty() {
        summary.push_str("\nSelectors:\n  ");
        summary.push_str(&selectors.join("\n  "));
    }
    summary
}

fn js_summary(lines: &[&str]) -> String {
    let mut imports = Vec::new();
    let mut functions = Vec::new();
    let mut exports = Vec::new();

    for line in lines.iter().map(|l| l.trim()) {
        if line.starts_with("function ") || line.contains(" function ") {
            if let Some(after) = line.split("function").nth(1) {
                let name = after.split('(').next().unwrap_or("").trim();
                functions.push(format!("function {}()", name));
            }
        } else if line.starts_with("const ") && line.contains("=>") {
            let name = line["const ".len()..].split('=').next().unwrap_or("").trim();
            functions.push(format!("const {}", name));
        } else if line.contains("import ") {
            imports.push(line.to_string());
        } else if line.contains("export ") {
            exports.push(line.to_string());
        }
    }

    let mut summary = format!("JavaScript file ({} lines)", lines.len());
    let mut section = |title: &str, items: &[String], limit: usize| {
        if !items.is_empty() {
            let shown: Vec<&str> = items.iter().take(limit).map(String::as_str).collect();
            summary.push_str(&format!("\n{}:\n  {}", title, shown.join("\n  ")));
        }
    };
    section("Imports", &imports, 3);
    section("Functions", &functions, 5);
    section("Exports", &exports, 3);
    summary
}

/// 单个文件的摘要
pub fn file_summary(content: &str, kind: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    match kind {
        "html" | "htm" => html_summary(&lines),
        "css" => css_summary(&lines),
        "js" | "mjs" | "javascript" => js_summary(&lines),
        _ => {
            let mut out = lines
                .iter()
                .take(DEFAULT_PREVIEW_LINES)
                .copied()
                .collect::<Vec<_>>()
                .join("\n");
            if lines.len() > DEFAULT_PREVIEW_LINES {
                out.push_str(&format!("\n... ({} lines total)", lines.len()));
            }
            out
        }
    }
}

/// 已有工件摘要列表；exclude 用于修改模式下排除目标文件
pub fn format_existing_files(artifacts: &BTreeMap<String, Artifact>, exclude: Option<&str>) -> String {
    let sections: Vec<String> = artifacts
        .values()
        .filter(|a| Some(a.path.as_str()) != exclude)
        .map(|a| format!("- {}\n{}", a.path, file_summary(&a.content, &a.kind)))
        .collect();

    if sections.is_empty() {
        "None".to_string()
    } else {
        sections.join("\n\n")
    }
}

/// 本轮子任务进度：[✓] 已完成、[→] 当前、[ ] 待处理
pub fn format_subtasks_status(subtasks: &[Subtask], cursor: usize) -> String {
    let mut lines = Vec::with_capacity(subtasks.len() * 2);
    for (i, task) in subtasks.iter().enumerate() {
        let (mark, text) = match i.cmp(&cursor) {
            std::cmp::Ordering::Less => ("[✓]", "done"),
            std::cmp::Ordering::Equal => ("[→]", "in progress, your current task"),
            std::cmp::Ordering::Greater => ("[ ]", "pending"),
        };
        lines.push(format!("{}. {} {} ({})", i + 1, mark, task.title, text));
        if !task.target_paths.is_empty() {
            lines.push(format!("   Files: {}", task.target_paths.join(", ")));
        }
    }
    lines.join("\n")
}

/// 按行截断的内容预览，超出部分以省略行数提示
pub fn preview(content: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = content.lines().collect();
    if lines.len() <= max_lines {
        return content.to_string();
    }
    format!(
        "{}\n... (omitted {} lines)",
        lines[..max_lines].join("\n"),
        lines.len() - max_lines
    )
}
