//! `ragent chat`: one question from the terminal.

use std::io::Write;

use anyhow::Context;
use ragent_agent::AgentStreamEvent;
use ragent_config::AppConfig;
use ragent_core::turn::ConversationTurn;

pub async fn run(
    config: AppConfig,
    message: String,
    conversation_id: Option<String>,
    stream: bool,
) -> anyhow::Result<()> {
    if message.trim().is_empty() {
        anyhow::bail!("message must not be empty");
    }

    let state = ragent_gateway::build_state(config)
        .await
        .context("Failed to initialise services")?;
    let turn = ConversationTurn::new(message, conversation_id);

    let outcome = if stream {
        stream_turn(&state.agent, turn).await
    } else {
        match state.agent.chat(turn).await {
            Ok(result) => {
                println!("{}", result.response);
                print_footer(result.conversation_id.as_str(), &result.sources);
                Ok(())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Chat failed")),
        }
    };

    state.store().close().await;
    outcome
}

async fn stream_turn(agent: &ragent_agent::RagAgent, turn: ConversationTurn) -> anyhow::Result<()> {
    let mut events = agent.chat_stream(turn.streaming(true));
    let mut stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            AgentStreamEvent::Chunk { content, .. } => {
                print!("{content}");
                stdout.flush()?;
            }
            AgentStreamEvent::ToolResult {
                tool_name, success, ..
            } => {
                let status = if success { "ok" } else { "failed" };
                eprintln!("\n  [tool] {tool_name}: {status}");
            }
            AgentStreamEvent::Done {
                conversation_id,
                sources,
            } => {
                println!();
                print_footer(conversation_id.as_str(), &sources);
                return Ok(());
            }
            AgentStreamEvent::Error { message } => {
                println!();
                anyhow::bail!("Chat failed: {message}");
            }
        }
    }

    anyhow::bail!("stream ended without a result")
}

fn print_footer(conversation_id: &str, sources: &[Option<String>]) {
    eprintln!();
    eprintln!("  Conversation: {conversation_id}");
    if !sources.is_empty() {
        let names: Vec<&str> = sources
            .iter()
            .map(|s| s.as_deref().unwrap_or("(no source)"))
            .collect();
        eprintln!("  Sources:      {}", names.join(", "));
    }
}
