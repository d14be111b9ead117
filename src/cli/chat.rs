//! CLI `chat` command: interactive agent session on stdin/stdout.

use anyhow::Result;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use memvault::agent::llm::AnthropicClient;
use memvault::agent::{Agent, AgentSettings};
use memvault::config::MemvaultConfig;
use memvault::db;
use memvault::memory::service::MemoryService;

pub async fn chat(config: &MemvaultConfig, user_id: &str) -> Result<()> {
    let workspace = db::user_workspace_path(&config.resolved_workspace_dir(), user_id)?;
    let client = AnthropicClient::from_config(&config.agent)?;
    let mut agent = Agent::new(
        Arc::new(client),
        MemoryService::new(config.resolved_data_dir()),
        user_id,
        workspace,
        AgentSettings::from(&config.agent),
    );

    println!("Chatting as {user_id}. Type /reset to clear history, /quit to exit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/reset" => {
                agent.reset();
                println!("History cleared.");
                continue;
            }
            message => match agent.respond(message).await {
                Ok(reply) => println!("{reply}\n"),
                Err(e) => eprintln!("error: {e:#}"),
            },
        }
    }
    Ok(())
}
