//! The reason-act-observe orchestration loop.
//!
//! One `run` call owns one conversation: it seeds a transcript with the
//! system prompt and the wrapped user query, then alternates between
//! asking the completion provider for the next thought and dispatching
//! the tool it names, folding each observation back into the transcript
//! as a user turn, until the model produces a final answer or the
//! iteration budget runs out.

mod parser;
mod prompt;

pub use parser::{search_query_fallback, ParsedAction, ReactParser};
pub use prompt::build_system_prompt;

use std::sync::Arc;
use std::time::Instant;

use serde_json::{Map, Value};

use crate::llm::{ChatMessage, CompletionClient};
use crate::tools::ToolRegistry;

/// The token the model emits as an action name when it is done reasoning.
const FINAL_ANSWER_TOKEN: &str = "最终答案";
/// The marker (token plus full-width colon) preceding the answer text.
const FINAL_ANSWER_MARKER: &str = "最终答案：";

/// Options for a single run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum reason-act cycles before returning best-effort output.
    pub max_iterations: usize,
    /// Log the intermediate thoughts and observations.
    pub verbose: bool,
    /// Optional hard deadline for the whole run. Checked at every
    /// iteration boundary and imposed on each completion and tool call.
    pub deadline: Option<Instant>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            verbose: false,
            deadline: None,
        }
    }
}

/// A reason-act-observe agent over an injected completion client and
/// tool registry.
///
/// The agent holds no conversation state; concurrent runs on one shared
/// instance do not interfere.
pub struct ReactAgent {
    llm: Arc<dyn CompletionClient>,
    tools: Arc<ToolRegistry>,
    model: String,
    parser: ReactParser,
}

impl ReactAgent {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        tools: Arc<ToolRegistry>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm,
            tools,
            model: model.into(),
            parser: ReactParser::new(),
        }
    }

    /// Run one query with default options.
    pub async fn run(&self, query: &str) -> anyhow::Result<String> {
        self.run_with_options(query, RunOptions::default()).await
    }

    /// Run one query to completion.
    ///
    /// Returns the extracted final answer or, when the iteration budget
    /// is exhausted, the last raw model output (still passed through
    /// final-answer extraction in case the marker is buried in it).
    /// Completion failure and a blown deadline are the only fatal paths;
    /// every tool failure is folded into the transcript instead.
    pub async fn run_with_options(
        &self,
        query: &str,
        options: RunOptions,
    ) -> anyhow::Result<String> {
        let mut messages = vec![
            ChatMessage::system(build_system_prompt(&self.tools)),
            ChatMessage::user(format!("问题：{}", query)),
        ];

        tracing::debug!(
            "Starting run with model {} ({} iterations max)",
            self.model,
            options.max_iterations
        );

        let mut response = String::new();
        for iteration in 0..options.max_iterations {
            if let Some(deadline) = options.deadline {
                if Instant::now() >= deadline {
                    anyhow::bail!("run deadline exceeded");
                }
            }

            tracing::debug!("Iteration {} thinking", iteration + 1);
            response = self.generate(&messages, options.deadline).await?;
            if options.verbose {
                tracing::info!("Model response:\n{}", response);
            }
            messages.push(ChatMessage::assistant(response.clone()));

            let parsed = self.parser.parse(&response, options.verbose);
            let action = parsed.action_name().to_string();

            // A final answer wins even when a stray action was parsed
            // alongside it.
            if action.is_empty()
                || action == FINAL_ANSWER_TOKEN
                || response.contains(FINAL_ANSWER_MARKER)
            {
                tracing::debug!("Iteration {} produced a final answer", iteration + 1);
                return Ok(extract_final_answer(&response));
            }

            let arguments = parsed.arguments();
            if options.verbose {
                tracing::info!("Executing {} with {:?}", action, arguments);
            }
            let observation = self
                .execute_action(&action, arguments, options.deadline)
                .await;
            if options.verbose {
                tracing::info!("Observation:\n{}", observation);
            }
            messages.push(ChatMessage::user(observation));
        }

        tracing::debug!("Iteration budget exhausted, returning best-effort answer");
        Ok(extract_final_answer(&response))
    }

    /// Ask the completion provider for the next assistant turn.
    async fn generate(
        &self,
        messages: &[ChatMessage],
        deadline: Option<Instant>,
    ) -> anyhow::Result<String> {
        match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, self.llm.generate(&self.model, messages))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("completion call exceeded the run deadline")),
                }
            }
            None => self.llm.generate(&self.model, messages).await,
        }
    }

    /// Dispatch one action and shape the result as an observation turn.
    ///
    /// This is the only boundary where tool failures surface, and they
    /// are converted to text here so the model can read the error and
    /// try something else.
    async fn execute_action(
        &self,
        action: &str,
        arguments: Map<String, Value>,
        deadline: Option<Instant>,
    ) -> String {
        if !self.tools.has_tool(action) {
            return format!("观察：未知行动 '{}'，请尝试从已知工具列表中选择。", action);
        }

        let invocation = self.tools.invoke(action, Value::Object(arguments));
        let result = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match tokio::time::timeout(remaining, invocation).await {
                    Ok(result) => result,
                    Err(_) => Err(anyhow::anyhow!("tool call exceeded the run deadline")),
                }
            }
            None => invocation.await,
        };

        match result {
            Ok(output) => format!("观察：{}", output),
            Err(e) => format!("观察：执行工具 {} 时出错: {}", action, e),
        }
    }
}

/// Extract the text after the last final-answer marker, trimmed. Text
/// without the marker is returned unmodified.
fn extract_final_answer(text: &str) -> String {
    match text.rsplit_once(FINAL_ANSWER_MARKER) {
        Some((_, tail)) => tail.trim().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::tools::{ParameterSpec, Tool};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Completion client that replays a fixed script and records every
    /// transcript it was shown.
    struct ScriptedClient {
        responses: Vec<String>,
        calls: AtomicUsize,
        transcripts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(responses: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                responses: responses.iter().map(|r| r.to_string()).collect(),
                calls: AtomicUsize::new(0),
                transcripts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn transcript(&self, call: usize) -> Vec<ChatMessage> {
            self.transcripts.lock().unwrap()[call].clone()
        }
    }

    #[async_trait]
    impl CompletionClient for ScriptedClient {
        async fn generate(
            &self,
            _model: &str,
            messages: &[ChatMessage],
        ) -> anyhow::Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            self.transcripts.lock().unwrap().push(messages.to_vec());
            Ok(self
                .responses
                .get(call)
                .or_else(|| self.responses.last())
                .cloned()
                .unwrap_or_default())
        }
    }

    /// Tool that echoes its argument mapping back.
    struct EchoTool {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo_args"
        }
        fn human_name(&self) -> &str {
            "回显"
        }
        fn description(&self) -> &str {
            "Echoes the argument mapping back."
        }
        fn parameters(&self) -> Vec<ParameterSpec> {
            Vec::new()
        }
        async fn execute(&self, args: Value) -> anyhow::Result<String> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(args.to_string())
        }
    }

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "broken_tool"
        }
        fn human_name(&self) -> &str {
            "坏工具"
        }
        fn description(&self) -> &str {
            "Always fails."
        }
        fn parameters(&self) -> Vec<ParameterSpec> {
            Vec::new()
        }
        async fn execute(&self, _args: Value) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("connection reset by peer"))
        }
    }

    fn test_agent(llm: Arc<ScriptedClient>) -> (ReactAgent, Arc<AtomicUsize>) {
        let invocations = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::empty();
        registry.register(Arc::new(EchoTool {
            invocations: Arc::clone(&invocations),
        }));
        registry.register(Arc::new(FailingTool));
        let agent = ReactAgent::new(llm, Arc::new(registry), "test-model");
        (agent, invocations)
    }

    #[tokio::test]
    async fn final_answer_short_circuits_the_loop() {
        let llm = ScriptedClient::new(&["思考：不需要工具。\n最终答案：天安门在北京市东城区。"]);
        let (agent, invocations) = test_agent(Arc::clone(&llm));

        let answer = agent.run("天安门在哪里？").await.unwrap();

        assert_eq!(answer, "天安门在北京市东城区。");
        assert_eq!(llm.calls(), 1);
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transcript_is_seeded_with_system_prompt_and_wrapped_query() {
        let llm = ScriptedClient::new(&["最终答案：好。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        agent.run("推荐一日游").await.unwrap();

        let transcript = llm.transcript(0);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::System);
        assert!(transcript[0].content.contains("智能旅行助手"));
        assert_eq!(transcript[1].role, Role::User);
        assert_eq!(transcript[1].content, "问题：推荐一日游");
    }

    #[tokio::test]
    async fn final_answer_wins_over_a_spurious_action() {
        let llm = ScriptedClient::new(&["行动：echo_args\n行动输入：{}\n最终答案：已经完成。"]);
        let (agent, invocations) = test_agent(Arc::clone(&llm));

        let answer = agent.run("随便").await.unwrap();

        assert_eq!(answer, "已经完成。");
        assert_eq!(invocations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn response_without_action_is_returned_as_is() {
        let llm = ScriptedClient::new(&["东城区和西城区都值得一去。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        let answer = agent.run("推荐城区").await.unwrap();

        assert_eq!(answer, "东城区和西城区都值得一去。");
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn tool_result_is_fed_back_as_an_observation_turn() {
        let llm = ScriptedClient::new(&[
            "行动：echo_args\n行动输入：{\"location\": \"116.4,39.9\"}",
            "最终答案：附近有三家川菜馆。",
        ]);
        let (agent, invocations) = test_agent(Arc::clone(&llm));

        let answer = agent.run("附近吃什么").await.unwrap();

        assert_eq!(answer, "附近有三家川菜馆。");
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        // the second completion call sees assistant turn then observation
        let transcript = llm.transcript(1);
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[2].role, Role::Assistant);
        let observation = &transcript[3];
        assert_eq!(observation.role, Role::User);
        assert!(observation.content.starts_with("观察："));
        assert!(observation.content.contains("116.4,39.9"));
    }

    #[tokio::test]
    async fn unknown_action_becomes_an_observation_and_the_loop_continues() {
        let llm = ScriptedClient::new(&["行动：teleport\n行动输入：{}", "最终答案：好的。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        let answer = agent.run("...").await.unwrap();

        assert_eq!(answer, "好的。");
        assert_eq!(llm.calls(), 2);
        let observation = llm.transcript(1).last().cloned().unwrap();
        assert!(observation.content.contains("未知行动 'teleport'"));
        assert!(observation.content.contains("请尝试从已知工具列表中选择"));
    }

    #[tokio::test]
    async fn tool_failure_is_isolated_into_an_observation() {
        let llm = ScriptedClient::new(&["行动：broken_tool\n行动输入：{}", "最终答案：换一种方式。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        let answer = agent.run("...").await.unwrap();

        assert_eq!(answer, "换一种方式。");
        let observation = llm.transcript(1).last().cloned().unwrap();
        assert!(observation.content.starts_with("观察：执行工具 broken_tool 时出错"));
        assert!(observation.content.contains("connection reset by peer"));
    }

    #[tokio::test]
    async fn iteration_budget_bounds_completion_calls() {
        let llm = ScriptedClient::new(&["行动：echo_args\n行动输入：{}"]);
        let (agent, invocations) = test_agent(Arc::clone(&llm));

        let options = RunOptions {
            max_iterations: 2,
            ..RunOptions::default()
        };
        let answer = agent.run_with_options("...", options).await.unwrap();

        // exhaustion returns the last raw response; no marker to extract
        assert_eq!(answer, "行动：echo_args\n行动输入：{}");
        assert_eq!(llm.calls(), 2);
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_argument_mapping_dispatches_cleanly() {
        let llm = ScriptedClient::new(&["行动：echo_args\n行动输入：{}", "最终答案：完成。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        agent.run("...").await.unwrap();

        let observation = llm.transcript(1).last().cloned().unwrap();
        assert_eq!(observation.content, "观察：{}");
    }

    #[tokio::test]
    async fn expired_deadline_fails_before_any_completion_call() {
        let llm = ScriptedClient::new(&["最终答案：不会到这里。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        let options = RunOptions {
            deadline: Some(Instant::now() - Duration::from_secs(1)),
            ..RunOptions::default()
        };
        let result = agent.run_with_options("...", options).await;

        assert!(result.is_err());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn generous_deadline_does_not_disturb_a_normal_run() {
        let llm = ScriptedClient::new(&["行动：echo_args\n行动输入：{}", "最终答案：按时完成。"]);
        let (agent, _) = test_agent(Arc::clone(&llm));

        let options = RunOptions {
            deadline: Some(Instant::now() + Duration::from_secs(60)),
            ..RunOptions::default()
        };
        let answer = agent.run_with_options("...", options).await.unwrap();

        assert_eq!(answer, "按时完成。");
    }

    #[test]
    fn final_answer_extraction_takes_the_last_marker() {
        let text = "最终答案：草稿\n再核对一下。\n最终答案： 正式答案 ";
        assert_eq!(extract_final_answer(text), "正式答案");
    }

    #[test]
    fn text_without_marker_is_returned_unmodified() {
        assert_eq!(extract_final_answer("  原样返回  "), "  原样返回  ");
    }
}
