//! Planning: one backend call, then tool routing.
//!
//! The backend is asked for a plan with [`SYSTEM_INSTRUCTION`] prepended. If
//! the reply asks for the calculator the expression is evaluated on the spot
//! and the plan becomes a [`Plan::ToolCall`]; otherwise the reply is returned
//! verbatim for human review.

use recall_core::calculator::{evaluate, extract_expression};
use recall_core::{ChatMessage, CompletionRequest, Error, LlmProvider, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// Prepended to every planning prompt
pub const SYSTEM_INSTRUCTION: &str = "System instruction: You are an assistant that can plan and call tools. \
When a user requests a calculation, respond using EXACTLY the format: \
\"CALCULATE: <expression>\" with no extra commentary, or return just the expression (e.g. \"1+4\"). \
Only use the calculator for arithmetic; otherwise provide a concise plan. \
Do not add extra text when requesting the calculator.";

static TOOL_CALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:CALCULATE|CALC|calculator)\s*[:\-]?\s*([0-9+\-*/().\s]+)")
        .expect("static regex")
});

/// Outcome of a planning round
#[derive(Debug)]
pub enum Plan {
    /// The backend asked for the calculator; it already ran
    ToolCall {
        expression: String,
        evaluation: Result<String>,
    },
    /// Free-form plan text for the human to review
    Text(String),
}

impl Plan {
    /// Route raw plan text to the calculator or keep it as text
    pub fn route(plan_text: String) -> Self {
        match detect_tool_call(&plan_text) {
            Some(expression) => Self::calculate(expression),
            None => Plan::Text(plan_text),
        }
    }

    fn calculate(expression: String) -> Self {
        let evaluation = evaluate(&expression);
        debug!(%expression, ok = evaluation.is_ok(), "calculator invoked");
        Plan::ToolCall { expression, evaluation }
    }

    /// Calculator output (value or error message), if a tool ran
    pub fn exec_result(&self) -> Option<String> {
        match self {
            Plan::ToolCall { evaluation: Ok(value), .. } => Some(value.clone()),
            Plan::ToolCall { evaluation: Err(e), .. } => Some(e.message().to_string()),
            Plan::Text(_) => None,
        }
    }

    pub fn is_tool_call(&self) -> bool {
        matches!(self, Plan::ToolCall { .. })
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::ToolCall { expression, evaluation: Ok(_) } => {
                write!(f, "Calculator executed: {}", expression)
            }
            Plan::ToolCall { evaluation: Err(_), .. } => write!(f, "Calculator error"),
            Plan::Text(text) => f.write_str(text),
        }
    }
}

/// The user's own line in a planning prompt: the last line, minus any
/// `User:` label the agent put in front of it
fn latest_request(prompt: &str) -> &str {
    let last = prompt.lines().last().unwrap_or_default();
    last.strip_prefix("User:").map_or(last, str::trim)
}

/// Expression the plan text asks the calculator for, if any.
///
/// An explicit `CALCULATE:`-style request anywhere in the text wins, even
/// when it captures nothing but whitespace (then there is no tool call).
/// Otherwise the whole text is tried as a bare expression.
pub fn detect_tool_call(text: &str) -> Option<String> {
    if text.is_empty() {
        return None;
    }
    if let Some(caps) = TOOL_CALL_RE.captures(text) {
        let expression = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
        return (!expression.is_empty()).then(|| expression.to_string());
    }
    extract_expression(text)
}

async fn request_plan<P: LlmProvider>(provider: &P, prompt: &str) -> String {
    let full_prompt = format!("{}\n\nUser prompt:\n{}", SYSTEM_INSTRUCTION, prompt);
    let request = CompletionRequest::new(vec![ChatMessage::user(full_prompt)]);
    debug!(provider = provider.name(), model = provider.default_model(), "requesting plan");

    match provider.complete(request).await {
        Ok(response) => {
            debug!(
                finish_reason = ?response.finish_reason,
                total_tokens = response.usage.total_tokens,
                "plan received"
            );
            response.content
        }
        Err(e) => {
            let err = Error::from(e).with_operation("planner::plan");
            warn!(error = %err, backend = err.kind().is_backend(), "planning call failed");
            format!("({} API error: {})", provider.name(), err.message())
        }
    }
}

/// Talks to the backend, or simulates it when there is none
pub struct Planner<P> {
    provider: Option<P>,
}

impl<P: LlmProvider> Planner<P> {
    pub fn new(provider: Option<P>) -> Self {
        Self { provider }
    }

    pub fn is_simulated(&self) -> bool {
        self.provider.is_none()
    }

    pub fn provider(&self) -> Option<&P> {
        self.provider.as_ref()
    }

    /// Backend name for user-facing messages
    pub fn provider_name(&self) -> &str {
        self.provider.as_ref().map_or("simulated", |p| p.name())
    }

    /// Ask for a plan and route it. Never fails; errors come back as text.
    ///
    /// Simulation routes on the user's latest request instead of the fixed
    /// template, whose own "calculator.\n2)" would otherwise match. A request
    /// with no calculation gets the template back as text.
    pub async fn plan(&self, prompt: &str) -> Plan {
        let Some(provider) = &self.provider else {
            return match detect_tool_call(latest_request(prompt)) {
                Some(expression) => Plan::calculate(expression),
                None => Plan::Text(format!(
                    "SIMULATED PLAN for prompt: {}\n1) If expression provided then calculator.\n2) Otherwise answer normally.",
                    prompt
                )),
            };
        };
        Plan::route(request_plan(provider, prompt).await)
    }

    /// Carry out a confirmed plan with a fresh backend call.
    ///
    /// Simulation echoes the first line of the plan.
    pub async fn execute(&self, plan_text: &str) -> Result<String> {
        let Some(provider) = &self.provider else {
            let first_line = plan_text.lines().next().unwrap_or_default();
            return Ok(format!("(simulated) {}", first_line));
        };

        debug!(provider = provider.name(), "executing plan");
        provider
            .prompt(&format!("Execute the plan:\n{}", plan_text))
            .await
            .map_err(|e| Error::from(e).with_operation("planner::execute"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use recall_core::{ErrorKind, ProviderError};

    #[test]
    fn test_detect_tool_call() {
        assert_eq!(detect_tool_call("CALCULATE: 2+2"), Some("2+2".into()));
        assert_eq!(detect_tool_call("Sure. calc - (3 * 4) / 2"), Some("(3 * 4) / 2".into()));
        assert_eq!(detect_tool_call("1+4"), Some("1+4".into()));
        assert_eq!(detect_tool_call("Look up the weather"), None);
        assert_eq!(detect_tool_call(""), None);
    }

    #[test]
    fn test_detect_tool_call_whitespace_group_is_no_tool() {
        // Matches the request pattern but captures only whitespace
        assert_eq!(detect_tool_call("use the calculator \nthen report"), None);
    }

    #[test]
    fn test_route_tool_call() {
        let plan = Plan::route("CALCULATE: 7/2".into());
        assert!(plan.is_tool_call());
        assert_eq!(plan.to_string(), "Calculator executed: 7/2");
        assert_eq!(plan.exec_result().as_deref(), Some("3.5"));
    }

    #[test]
    fn test_route_tool_error() {
        let plan = Plan::route("CALCULATE: 1/0".into());
        assert_eq!(plan.to_string(), "Calculator error");
        let message = plan.exec_result().unwrap();
        assert!(message.starts_with("evaluation error:"));
        match plan {
            Plan::ToolCall { evaluation: Err(e), .. } => assert_eq!(e.kind(), ErrorKind::EvaluationFailed),
            other => panic!("unexpected plan {:?}", other),
        }
    }

    #[test]
    fn test_route_text() {
        let plan = Plan::route("1) Search docs\n2) Summarize".into());
        assert!(!plan.is_tool_call());
        assert_eq!(plan.to_string(), "1) Search docs\n2) Summarize");
        assert!(plan.exec_result().is_none());
    }

    #[tokio::test]
    async fn test_simulated_plan_and_execute() {
        let planner: Planner<ScriptedProvider> = Planner::new(None);
        assert!(planner.is_simulated());

        let plan = planner.plan("hello").await;
        let text = plan.to_string();
        assert_eq!(
            text,
            "SIMULATED PLAN for prompt: hello\n1) If expression provided then calculator.\n2) Otherwise answer normally."
        );
        assert_eq!(
            planner.execute(&text).await.unwrap(),
            "(simulated) SIMULATED PLAN for prompt: hello"
        );
    }

    #[tokio::test]
    async fn test_simulated_plan_routes_calculation() {
        let planner: Planner<ScriptedProvider> = Planner::new(None);

        let plan = planner.plan("Context:\nuser: calc 2+2\n\nUser: calc 2+2").await;
        assert!(plan.is_tool_call());
        assert_eq!(plan.to_string(), "Calculator executed: 2+2");
        assert_eq!(plan.exec_result().as_deref(), Some("4"));

        let plan = planner.plan("User: (1+2)*3").await;
        assert_eq!(plan.exec_result().as_deref(), Some("9"));
    }

    #[tokio::test]
    async fn test_simulated_plan_ignores_older_calculations() {
        let planner: Planner<ScriptedProvider> = Planner::new(None);

        // Only the latest request counts, not earlier turns in the context
        let plan = planner.plan("Context:\nuser: calc 2+2\n\nUser: hello").await;
        assert!(!plan.is_tool_call());
        assert!(plan.to_string().starts_with("SIMULATED PLAN for prompt: Context:"));
    }

    #[test]
    fn test_latest_request() {
        assert_eq!(latest_request("Context:\nuser: a\n\nUser: calc 1+1"), "calc 1+1");
        assert_eq!(latest_request("2+2"), "2+2");
        assert_eq!(latest_request(""), "");
    }

    #[tokio::test]
    async fn test_plan_sends_system_instruction() {
        let provider = ScriptedProvider::new(vec![Ok("CALCULATE: 2+2".into())]);
        let planner = Planner::new(Some(provider));

        let plan = planner.plan("what is 2+2").await;
        assert_eq!(plan.exec_result().as_deref(), Some("4"));

        let prompts = planner.provider().unwrap().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].starts_with(SYSTEM_INSTRUCTION));
        assert!(prompts[0].ends_with("\n\nUser prompt:\nwhat is 2+2"));
    }

    #[tokio::test]
    async fn test_plan_backend_error_becomes_text() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::Network("connection refused".into()))]);
        let planner = Planner::new(Some(provider));

        let plan = planner.plan("anything").await;
        assert_eq!(
            plan.to_string(),
            "(scripted API error: Network error: connection refused)"
        );
    }

    #[tokio::test]
    async fn test_execute_uses_plain_prompt() {
        let provider = ScriptedProvider::new(vec![Ok("done".into())]);
        let planner = Planner::new(Some(provider));

        assert_eq!(planner.execute("1) do it").await.unwrap(), "done");
        let prompts = planner.provider().unwrap().prompts();
        assert_eq!(prompts, vec!["Execute the plan:\n1) do it".to_string()]);
    }

    #[tokio::test]
    async fn test_execute_failure() {
        let provider = ScriptedProvider::new(vec![Err(ProviderError::RateLimited { retry_after: None })]);
        let planner = Planner::new(Some(provider));
        let err = planner.execute("plan").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert_eq!(err.message(), "Rate limited");
    }
}
