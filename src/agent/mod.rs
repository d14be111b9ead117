//! Chat agent: memory-primed prompt, LLM call, bounded tool loop.
//!
//! One [`Agent`] is one session for one user. History accumulates across
//! [`Agent::respond`] calls until [`Agent::reset`].

pub mod llm;
pub mod tools;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AgentConfig;
use crate::memory::search::RecallQuery;
use crate::memory::service::MemoryService;
use crate::memory::types::{Memory, MemoryType, NewMemory, MAX_CONTENT_CHARS};
use llm::{CompletionRequest, ContentBlock, LlmClient, Message, Role, ToolDefinition};
use tools::ToolContext;

const BASE_PROMPT: &str = "You are a helpful assistant with long-term memory and a private \
workspace. Use memory_recall to look up what you know about the user and memory_store to \
remember durable facts or preferences. File tools operate only inside the workspace.";

/// Loop and prompt knobs, usually taken from `[agent]` config.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub max_tokens: u32,
    pub max_tool_iterations: usize,
    pub recall_limit: usize,
    pub remember_turns: bool,
}

impl From<&AgentConfig> for AgentSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            max_tool_iterations: config.max_tool_iterations,
            recall_limit: config.recall_limit,
            remember_turns: config.remember_turns,
        }
    }
}

pub struct Agent {
    llm: Arc<dyn LlmClient>,
    tools: ToolContext,
    tool_defs: Vec<ToolDefinition>,
    settings: AgentSettings,
    history: Vec<Message>,
}

impl Agent {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        memory: MemoryService,
        user_id: impl Into<String>,
        workspace: impl Into<PathBuf>,
        settings: AgentSettings,
    ) -> Self {
        Self {
            llm,
            tools: ToolContext {
                memory,
                user_id: user_id.into(),
                workspace: workspace.into(),
            },
            tool_defs: tools::tool_definitions(),
            settings,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Handle one user turn and return the assistant's final text.
    pub async fn respond(&mut self, user_message: &str) -> Result<String> {
        let recalled = self.recall_context(user_message).await;
        let system = build_system_prompt(&recalled);
        self.push_user(vec![ContentBlock::Text {
            text: user_message.to_string(),
        }]);

        let mut rounds = 0;
        let reply = loop {
            let request = CompletionRequest {
                model: self.settings.model.clone(),
                max_tokens: self.settings.max_tokens,
                system: Some(system.clone()),
                messages: self.history.clone(),
                tools: self.tool_defs.clone(),
            };
            let response = self.llm.complete(&request).await?;

            let content: Vec<ContentBlock> = response
                .content
                .iter()
                .filter(|b| !matches!(b, ContentBlock::Unsupported))
                .cloned()
                .collect();
            if !content.is_empty() {
                self.history.push(Message {
                    role: Role::Assistant,
                    content,
                });
            }

            let calls = response.tool_calls();
            if calls.is_empty() {
                break response.text();
            }

            if rounds >= self.settings.max_tool_iterations {
                tracing::warn!(rounds, "tool iteration limit reached");
                // Every tool_use needs a matching result before the next user turn.
                let results = calls
                    .into_iter()
                    .map(|call| ContentBlock::ToolResult {
                        tool_use_id: call.id,
                        content: "Tool iteration limit reached; call not executed.".into(),
                        is_error: true,
                    })
                    .collect();
                self.push_user(results);
                break response.text();
            }

            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                tracing::debug!(tool = %call.name, "executing tool");
                let ctx = self.tools.clone();
                let name = call.name.clone();
                let output = tokio::task::spawn_blocking(move || ctx.execute(&name, call.input))
                    .await
                    .context("tool task failed")?;
                results.push(ContentBlock::ToolResult {
                    tool_use_id: call.id,
                    content: output.content,
                    is_error: output.is_error,
                });
            }
            self.push_user(results);
            rounds += 1;
        };

        if self.settings.remember_turns && !reply.trim().is_empty() {
            self.remember_turn(user_message, &reply).await;
        }
        Ok(reply)
    }

    /// Append user-role content, merging into a trailing user message.
    fn push_user(&mut self, blocks: Vec<ContentBlock>) {
        match self.history.last_mut() {
            Some(last) if last.role == Role::User => last.content.extend(blocks),
            _ => self.history.push(Message {
                role: Role::User,
                content: blocks,
            }),
        }
    }

    async fn recall_context(&self, user_message: &str) -> Vec<Memory> {
        if self.settings.recall_limit == 0 || user_message.trim().is_empty() {
            return Vec::new();
        }
        let memory = self.tools.memory.clone();
        let user_id = self.tools.user_id.clone();
        let query = RecallQuery::new(user_message.trim())
            .with_limit(self.settings.recall_limit.min(crate::memory::types::MAX_RECALL_LIMIT));

        match tokio::task::spawn_blocking(move || memory.recall(&user_id, &query)).await {
            Ok(Ok(response)) => response.results,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "memory recall for prompt failed");
                Vec::new()
            }
            Err(e) => {
                tracing::warn!(error = %e, "memory recall task failed");
                Vec::new()
            }
        }
    }

    async fn remember_turn(&self, user_message: &str, reply: &str) {
        let content: String = format!("User: {user_message}\nAssistant: {reply}")
            .chars()
            .take(MAX_CONTENT_CHARS)
            .collect();
        let memory = self.tools.memory.clone();
        let user_id = self.tools.user_id.clone();
        let new_memory = NewMemory::new(content).with_type(MemoryType::Episodic);

        match tokio::task::spawn_blocking(move || memory.store(&user_id, &new_memory)).await {
            Ok(Ok(result)) => tracing::debug!(id = %result.id, "turn stored"),
            Ok(Err(e)) => tracing::warn!(error = %e, "failed to store turn"),
            Err(e) => tracing::warn!(error = %e, "store task failed"),
        }
    }
}

/// System prompt with recalled memories appended.
pub fn build_system_prompt(memories: &[Memory]) -> String {
    if memories.is_empty() {
        return BASE_PROMPT.to_string();
    }
    let mut prompt = format!("{BASE_PROMPT}\n\nRelevant memories:\n");
    for m in memories {
        prompt.push_str(&format!("- [{}] {}\n", m.memory_type, m.content));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use llm::CompletionResponse;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned responses and records every request.
    #[derive(Default)]
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Vec<ContentBlock>>>,
        requests: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Vec<ContentBlock>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
            self.requests.lock().unwrap().push(request.clone());
            let content = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| vec![text("(script exhausted)")]);
            Ok(CompletionResponse {
                content,
                stop_reason: None,
            })
        }
    }

    fn text(s: &str) -> ContentBlock {
        ContentBlock::Text { text: s.into() }
    }

    fn tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    fn settings(remember_turns: bool) -> AgentSettings {
        AgentSettings {
            model: "test-model".into(),
            max_tokens: 256,
            max_tool_iterations: 2,
            recall_limit: 5,
            remember_turns,
        }
    }

    fn agent(tmp: &TempDir, llm: Arc<ScriptedLlm>, remember: bool) -> Agent {
        Agent::new(
            llm,
            MemoryService::new(tmp.path().join("data")),
            "alice",
            tmp.path().join("ws"),
            settings(remember),
        )
    }

    #[tokio::test]
    async fn plain_reply_is_remembered_as_episode() {
        let tmp = TempDir::new().unwrap();
        let llm = ScriptedLlm::new(vec![vec![text("Hello Alice!")]]);
        let mut agent = agent(&tmp, llm.clone(), true);

        let reply = agent.respond("hi there").await.unwrap();
        assert_eq!(reply, "Hello Alice!");
        assert_eq!(agent.history().len(), 2);

        let stats = MemoryService::new(tmp.path().join("data"))
            .stats("alice")
            .unwrap();
        assert_eq!(stats.total_memories, 1);
        assert_eq!(stats.by_type["episodic"], 1);

        let request = &llm.requests.lock().unwrap()[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.tools.len(), 5);
    }

    #[tokio::test]
    async fn tool_calls_run_and_feed_back() {
        let tmp = TempDir::new().unwrap();
        let llm = ScriptedLlm::new(vec![
            vec![
                text("Saving that."),
                tool_use(
                    "tu_1",
                    "memory_store",
                    json!({"content": "User prefers Python", "type": "relational"}),
                ),
            ],
            vec![text("Noted.")],
        ]);
        let mut agent = agent(&tmp, llm.clone(), false);

        let reply = agent.respond("I like Python").await.unwrap();
        assert_eq!(reply, "Noted.");

        // user, assistant(tool_use), user(tool_result), assistant(text)
        let history = agent.history();
        assert_eq!(history.len(), 4);
        match &history[2].content[0] {
            ContentBlock::ToolResult {
                tool_use_id,
                is_error,
                content,
            } => {
                assert_eq!(tool_use_id, "tu_1");
                assert!(!is_error, "{content}");
            }
            other => panic!("expected tool result, got {other:?}"),
        }

        let service = MemoryService::new(tmp.path().join("data"));
        let found = service
            .recall("alice", &RecallQuery::new("Python"))
            .unwrap();
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].memory_type, MemoryType::Relational);
        assert_eq!(llm.requests.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn tool_errors_do_not_abort() {
        let tmp = TempDir::new().unwrap();
        let llm = ScriptedLlm::new(vec![
            vec![tool_use("tu_1", "read_file", json!({"path": "../../etc/passwd"}))],
            vec![text("I can't read that.")],
        ]);
        let mut agent = agent(&tmp, llm, false);

        let reply = agent.respond("read /etc/passwd").await.unwrap();
        assert_eq!(reply, "I can't read that.");
        assert!(matches!(
            agent.history()[2].content[0],
            ContentBlock::ToolResult { is_error: true, .. }
        ));
    }

    #[tokio::test]
    async fn tool_loop_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let looping: Vec<Vec<ContentBlock>> = (0..3)
            .map(|i| vec![tool_use(&format!("tu_{i}"), "list_files", json!({}))])
            .collect();
        let llm = ScriptedLlm::new(looping);
        let mut agent = agent(&tmp, llm.clone(), false);

        agent.respond("loop forever").await.unwrap();
        // Initial call plus max_tool_iterations follow-ups.
        assert_eq!(llm.requests.lock().unwrap().len(), 3);

        let last = agent.history().last().unwrap();
        assert_eq!(last.role, Role::User);
        assert!(matches!(
            last.content[0],
            ContentBlock::ToolResult { is_error: true, .. }
        ));

        // The next turn's text merges into the pending tool results.
        agent.respond("stop").await.unwrap();
        let last_user = agent
            .history()
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .unwrap();
        assert!(matches!(last_user.content.last(), Some(ContentBlock::Text { .. })));
    }

    #[tokio::test]
    async fn recalled_memories_prime_the_prompt() {
        let tmp = TempDir::new().unwrap();
        MemoryService::new(tmp.path().join("data"))
            .store("alice", &NewMemory::new("Alice's cat is named Miso"))
            .unwrap();

        let llm = ScriptedLlm::new(vec![vec![text("Miso!")]]);
        let mut agent = agent(&tmp, llm.clone(), false);
        agent.respond("cat").await.unwrap();

        let requests = llm.requests.lock().unwrap();
        let system = requests[0].system.as_deref().unwrap();
        assert!(system.contains("Relevant memories"));
        assert!(system.contains("Alice's cat is named Miso"));
    }

    #[test]
    fn prompt_without_memories_is_base() {
        assert_eq!(build_system_prompt(&[]), BASE_PROMPT);
    }
}
