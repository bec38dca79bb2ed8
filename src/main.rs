//! Atlas - 旅行规划智能体命令行
//!
//! 入口：初始化日志、加载配置、构建 TravelAgent，并在 stdin 上运行多轮对话。
//! 输入 /agents 列出 Agent，/agent <key> 切换，/models 列出模型，/model <name> 切换，/reset 清空历史，/quit 退出；
//! Ctrl+C 取消进行中的回合。

use std::path::PathBuf;

use anyhow::Context;
use atlas::agents::agent_catalog;
use atlas::config::load_config;
use atlas::memory::Message;
use atlas::{observability, EngineError, TravelAgent, TurnRequest};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).context("Failed to load config")?;
    let agent = TravelAgent::from_config(&cfg)
        .await
        .context("Failed to create travel agent")?;

    let mut current_agent = cfg.engine.default_agent.clone();
    let mut current_model = agent.default_model().to_string();
    let mut history: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!(
        "Atlas travel assistant ({current_agent}, {current_model}). Type /agents for the catalog, /quit to exit."
    );
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input {
            "/quit" | "/exit" => break,
            "/reset" => {
                history.clear();
                println!("History cleared.");
                continue;
            }
            "/agents" => {
                for info in agent_catalog() {
                    println!("  {:<26} {}", info.key, info.description);
                }
                continue;
            }
            "/models" => {
                for name in agent.model_names() {
                    let marker = if name == current_model { "*" } else { " " };
                    println!(" {marker} {name}");
                }
                continue;
            }
            _ => {}
        }
        if let Some(name) = input.strip_prefix("/model ") {
            current_model = name.trim().to_string();
            println!("Using model {current_model}.");
            continue;
        }
        if let Some(key) = input.strip_prefix("/agent ") {
            current_agent = key.trim().to_string();
            history.clear();
            println!("Switched to {current_agent}.");
            continue;
        }

        let req = TurnRequest::new(input)
            .with_agent(current_agent.clone())
            .with_history(history.clone())
            .with_model(current_model.clone());
        let cancel = CancellationToken::new();
        let turn = agent.invoke(req, &cancel);
        tokio::pin!(turn);
        let result = tokio::select! {
            r = &mut turn => r,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                turn.await
            }
        };
        match result {
            Ok(resp) => {
                println!("{}", resp.final_message.content);
                history = resp.messages;
            }
            Err(EngineError::Cancelled) => println!("(cancelled)"),
            Err(e) if e.is_transient() => {
                tracing::warn!(error = %e, "turn failed, retryable");
                println!("Temporary failure: {e}. Please try again.");
            }
            Err(e) => {
                tracing::error!(error = %e, "turn failed");
                println!("Error: {e}");
            }
        }
    }
    Ok(())
}
