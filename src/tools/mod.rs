//! Function tools the LLM can call during a session

mod external;
mod frontend;
mod persona;
mod profile;
mod validate;

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::agent::SharedUserData;
use crate::monitor::SessionMonitor;
use crate::persona::PersonaManager;
use crate::session::{AgentSession, RpcPeer};
use crate::{Error, Result};

pub use external::{DEFAULT_MAX_RESULTS, SearchArgs, WeatherArgs, get_weather, search_knowledge_base};
pub use frontend::{UPDATE_UI_METHOD, update_frontend_ui};
pub use persona::{change_mode, change_persona};
pub use profile::{clear_user_data, get_user_summary, update_user_profile};
pub use validate::{validate_numeric_param, validate_string_param};

/// Everything a tool may touch during one session
#[derive(Clone)]
pub struct ToolContext {
    pub userdata: SharedUserData,
    pub session: Arc<dyn AgentSession>,
    pub personas: Arc<PersonaManager>,
    pub monitor: Arc<SessionMonitor>,
    /// Outgoing RPC to the frontend; absent in console mode
    pub peer: Option<Arc<dyn RpcPeer>>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("personas", &self.personas)
            .field("has_peer", &self.peer.is_some())
            .finish_non_exhaustive()
    }
}

/// OpenAI-style function definition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

fn definition(name: &str, description: &str, parameters: serde_json::Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function".to_owned(),
        function: FunctionDefinition {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        },
    }
}

/// Definitions for every tool [`ToolExecutor`] understands
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    let no_params = json!({"type": "object", "properties": {}});
    vec![
        definition(
            "change_persona",
            "Switch the assistant personality when the user explicitly asks for a different kind of assistant.",
            json!({
                "type": "object",
                "properties": {
                    "persona_id": {"type": "string", "description": "Id of the persona to switch to"}
                },
                "required": ["persona_id"]
            }),
        ),
        definition(
            "change_mode",
            "Change how the assistant communicates: text only, voice only or both.",
            json!({
                "type": "object",
                "properties": {
                    "mode": {"type": "string", "enum": ["text", "voice", "hybrid"]}
                },
                "required": ["mode"]
            }),
        ),
        definition(
            "get_user_summary",
            "Summarise what is known about the user.",
            no_params.clone(),
        ),
        definition(
            "update_user_profile",
            "Correct or set one field of the user's profile.",
            json!({
                "type": "object",
                "properties": {
                    "field": {"type": "string", "enum": ["name", "age", "country", "interests"]},
                    "value": {"type": "string", "description": "New value; interests are comma separated"}
                },
                "required": ["field", "value"]
            }),
        ),
        definition(
            "clear_user_data",
            "Forget the user's personal information.",
            no_params,
        ),
        definition(
            "update_frontend_ui",
            "Update the frontend interface state.",
            json!({
                "type": "object",
                "properties": {
                    "ui_state": {"type": "string", "description": "UI state such as listening, thinking or speaking"},
                    "data": {"type": "object", "description": "Extra data for the frontend"}
                },
                "required": ["ui_state"]
            }),
        ),
        definition(
            "get_weather",
            "Current weather and short forecast for a location.",
            json!({
                "type": "object",
                "properties": {
                    "location": {"type": "string"},
                    "units": {"type": "string", "enum": ["metric", "imperial", "kelvin"]}
                },
                "required": ["location"]
            }),
        ),
        definition(
            "search_knowledge_base",
            "Search the knowledge base for relevant documents.",
            json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string"},
                    "max_results": {"type": "integer", "minimum": 1, "maximum": 20}
                },
                "required": ["query"]
            }),
        ),
    ]
}

#[derive(Deserialize)]
struct PersonaArgs {
    persona_id: String,
}

#[derive(Deserialize)]
struct ModeArgs {
    mode: String,
}

#[derive(Deserialize)]
struct ProfileArgs {
    field: String,
    value: String,
}

#[derive(Deserialize)]
struct UiArgs {
    ui_state: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &str) -> Result<T> {
    let arguments = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(arguments)
        .map_err(|e| Error::Tool(format!("{tool}: invalid arguments: {e}")))
}

/// Dispatches tool calls by name and records them in the monitor
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    ctx: ToolContext,
}

impl ToolExecutor {
    #[must_use]
    pub const fn new(ctx: ToolContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub const fn context(&self) -> &ToolContext {
        &self.ctx
    }

    /// Run tool `name` with JSON `arguments`
    ///
    /// # Errors
    ///
    /// Returns an error for unknown tools, malformed arguments, or whatever
    /// the tool itself rejects
    pub async fn execute(&self, name: &str, arguments: &str) -> Result<String> {
        let started = Instant::now();
        let result = self.dispatch(name, arguments).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(_) => {
                self.ctx.monitor.record_request();
                tracing::debug!(tool = name, ?elapsed, "tool completed");
            }
            Err(e) => {
                self.ctx.monitor.record_rejection();
                tracing::warn!(tool = name, ?elapsed, error = %e, "tool failed");
            }
        }
        result
    }

    /// Like [`ToolExecutor::execute`], rendering failures as text for the LLM
    pub async fn call(&self, name: &str, arguments: &str) -> String {
        self.execute(name, arguments)
            .await
            .unwrap_or_else(|e| format!("Error: {e}"))
    }

    async fn dispatch(&self, name: &str, arguments: &str) -> Result<String> {
        let ctx = &self.ctx;
        match name {
            "change_persona" => {
                let args: PersonaArgs = parse_args(name, arguments)?;
                change_persona(ctx, &args.persona_id).await
            }
            "change_mode" => {
                let args: ModeArgs = parse_args(name, arguments)?;
                change_mode(ctx, &args.mode).await
            }
            "get_user_summary" => Ok(get_user_summary(ctx).await),
            "update_user_profile" => {
                let args: ProfileArgs = parse_args(name, arguments)?;
                update_user_profile(ctx, &args.field, &args.value).await
            }
            "clear_user_data" => Ok(clear_user_data(ctx).await),
            "update_frontend_ui" => {
                let args: UiArgs = parse_args(name, arguments)?;
                update_frontend_ui(ctx, &args.ui_state, args.data).await
            }
            "get_weather" => {
                let args: WeatherArgs = parse_args(name, arguments)?;
                Ok(get_weather(&args)?.to_string())
            }
            "search_knowledge_base" => {
                let args: SearchArgs = parse_args(name, arguments)?;
                Ok(search_knowledge_base(&args)?.to_string())
            }
            _ => Err(Error::Tool(format!("unknown tool: {name}"))),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{context, persona_dir};
    use super::*;

    #[test]
    fn definitions_cover_every_tool() {
        let names: Vec<_> = tool_definitions()
            .into_iter()
            .map(|d| d.function.name)
            .collect();
        assert_eq!(names.len(), 8);
        for tool in crate::agent::AGENT_TOOLS {
            assert!(names.iter().any(|n| n == tool), "missing {tool}");
        }
        let json = serde_json::to_value(&tool_definitions()[0]).unwrap();
        assert_eq!(json["type"], "function");
    }

    #[tokio::test]
    async fn executes_and_records_usage() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());
        let executor = ToolExecutor::new(ctx);

        let out = executor
            .execute("update_user_profile", r#"{"field": "name", "value": "ana"}"#)
            .await
            .unwrap();
        assert!(out.contains("Ana"));
        assert_eq!(executor.call("get_user_summary", "").await, "Ana");

        let health = executor.context().monitor.health();
        assert_eq!(health.total_requests, 2);
        assert_eq!(health.rejected_requests, 0);
    }

    #[tokio::test]
    async fn failures_are_rejections() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());
        let executor = ToolExecutor::new(ctx);

        assert!(matches!(
            executor.execute("launch_rockets", "{}").await,
            Err(Error::Tool(_))
        ));
        let text = executor.call("change_mode", r#"{"mode": 3}"#).await;
        assert!(text.starts_with("Error: tool error: change_mode: invalid arguments"));

        let health = executor.context().monitor.health();
        assert_eq!(health.total_requests, 2);
        assert_eq!(health.rejected_requests, 2);
    }

    #[tokio::test]
    async fn external_tools_return_json() {
        let dir = persona_dir();
        let (ctx, _) = context(dir.path());
        let executor = ToolExecutor::new(ctx);

        let out = executor
            .execute("search_knowledge_base", r#"{"query": "agentes", "max_results": 2}"#)
            .await
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["total_results"], 2);

        let out = executor
            .execute("get_weather", r#"{"location": "Lima"}"#)
            .await
            .unwrap();
        assert!(out.contains("°C"));
    }
}
