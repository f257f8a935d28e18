//! code-agent 命令行入口
//!
//! 用法：code-agent [--config <file>] [requirement...]；未给出需求时从 stdin 读取。
//! 成功退出码 0，失败 1。

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use code_agent::{
    config::load_config,
    observability,
    workflow::{EngineBuilder, WorkflowEvent},
};
use tokio::sync::mpsc;

struct CliArgs {
    config: Option<PathBuf>,
    requirement: Option<String>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut config = None;
    let mut words = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args.next().context("--config requires a file path")?;
                config = Some(PathBuf::from(path));
            }
            "--help" | "-h" => {
                println!("Usage: code-agent [--config <file>] [requirement...]");
                std::process::exit(0);
            }
            _ => words.push(arg),
        }
    }
    let requirement = Some(words.join(" ")).filter(|s| !s.trim().is_empty());
    Ok(CliArgs {
        config,
        requirement,
    })
}

fn print_event(event: &WorkflowEvent) {
    match event {
        WorkflowEvent::PhaseEntered { phase, iteration } => {
            println!("==> {} (iteration {})", phase, iteration)
        }
        WorkflowEvent::PlanReady { subtasks } => println!("    plan ready: {} subtasks", subtasks),
        WorkflowEvent::SubtaskFinished {
            task_id,
            status,
            written,
            failed,
        } => {
            println!("    [{}] {} wrote {:?}", status, task_id, written);
            if !failed.is_empty() {
                println!("        failed: {:?}", failed);
            }
        }
        WorkflowEvent::EvaluationDone {
            passed, failed, ..
        } => println!("    evaluation: {} passed, {} failed", passed, failed),
        WorkflowEvent::FixRoundStarted { fix_tasks, .. } => {
            println!("    fix round: {} files to modify", fix_tasks)
        }
        _ => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    let config = load_config(args.config.clone())
        .context("Failed to load config")?
        .validate()
        .context("Invalid config")?;
    observability::init(&config.logging.level);

    let requirement = match args.requirement {
        Some(r) => r,
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("Failed to read requirement from stdin")?;
            input.trim().to_string()
        }
    };
    if requirement.is_empty() {
        bail!("No requirement provided");
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let engine = EngineBuilder::from_config(&config)
        .context("Failed to set up workflow")?
        .with_event_sender(tx)
        .build()
        .context("Failed to build workflow engine")?;

    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(&event);
        }
    });

    let report = engine.run(&requirement).await;
    drop(engine);
    let _ = printer.await;

    println!();
    if report.is_success() {
        println!("Code generation completed successfully (iteration {})", report.iteration());
        println!("Summary: {}", report.summary());
        let files = report.artifact_paths();
        if files.is_empty() {
            println!("No files were generated.");
        } else {
            println!("Generated {} files:", files.len());
            for file in files {
                println!("  {}", file);
            }
            println!("Files saved to: {}", config.workspace_root().display());
        }
    } else {
        println!("Code generation failed");
        println!("Error: {}", report.summary());
        for issue in report.outstanding_issues() {
            println!("\nTask {} ({})", issue.task_id, issue.paths.join(", "));
            for text in &issue.issues {
                println!("  - {}", text);
            }
        }
    }

    let usage = report.token_usage;
    tracing::info!(
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        "token usage"
    );

    std::process::exit(if report.is_success() { 0 } else { 1 });
}
