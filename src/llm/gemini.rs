//! Google Gemini client speaking the native function-calling protocol.

use crate::error::{AgentError, Result};
use crate::service::ToolRegistry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ReasoningEngine;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Tool rounds before the engine is forced to produce a text answer.
const MAX_TOOL_ROUNDS: usize = 8;

pub struct GeminiEngine {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiEngine {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        contents: &[Content],
        declarations: Option<&[FunctionDeclaration]>,
    ) -> Result<Vec<Part>> {
        let body = GenerateRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text(system_prompt)],
            },
            contents: contents.to_vec(),
            tools: declarations.map(|decls| {
                vec![ToolsBlock {
                    function_declarations: decls.to_vec(),
                }]
            }),
        };

        let url = format!("{}/{}:generateContent", API_BASE, self.model);
        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::Engine(format!(
                "Gemini API error {status}: {body}"
            )));
        }

        let reply: GenerateResponse = response.json().await?;
        let parts = reply
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content)
            .map(|content| content.parts)
            .unwrap_or_default();
        if parts.is_empty() {
            return Err(AgentError::Engine("Gemini returned no candidates".to_string()));
        }
        Ok(parts)
    }
}

#[async_trait]
impl ReasoningEngine for GeminiEngine {
    async fn answer(
        &self,
        system_prompt: &str,
        question: &str,
        registry: &ToolRegistry,
    ) -> Result<String> {
        let declarations = declare_tools(registry);
        let mut contents = vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part::text(question)],
        }];

        for round in 0..MAX_TOOL_ROUNDS {
            let parts = self
                .generate(system_prompt, &contents, Some(&declarations))
                .await?;
            let calls: Vec<FunctionCall> = parts
                .iter()
                .filter_map(|part| part.function_call.clone())
                .collect();

            if calls.is_empty() {
                if let Some(text) = collect_text(&parts) {
                    return Ok(text);
                }
                return Err(AgentError::Engine(
                    "Gemini reply had neither text nor a function call".to_string(),
                ));
            }

            contents.push(Content {
                role: Some("model".to_string()),
                parts,
            });
            let mut observations = Vec::with_capacity(calls.len());
            for call in calls {
                let input = call
                    .args
                    .get("input")
                    .and_then(|value| value.as_str())
                    .unwrap_or("")
                    .to_string();
                info!("Tool round {}: {} ({:?})", round + 1, call.name, input);
                let output = match registry.get(&call.name) {
                    Some(tool) => tool.invoke(&input),
                    None => format!("Ferramenta desconhecida: {}", call.name),
                };
                debug!("Tool {} returned {} bytes", call.name, output.len());
                observations.push(Part::function_response(&call.name, &output));
            }
            contents.push(Content {
                role: Some("user".to_string()),
                parts: observations,
            });
        }

        // round cap reached: one last call without tools forces a text reply
        let parts = self.generate(system_prompt, &contents, None).await?;
        collect_text(&parts).ok_or_else(|| {
            AgentError::Engine("Gemini produced no final answer after tool rounds".to_string())
        })
    }
}

/// Advertises the registry in Gemini's declaration format. Tools that take
/// an argument expose a single string parameter named `input`.
fn declare_tools(registry: &ToolRegistry) -> Vec<FunctionDeclaration> {
    registry
        .iter()
        .map(|tool| FunctionDeclaration {
            name: tool.name.to_string(),
            description: tool.description.to_string(),
            parameters: tool.takes_argument.then(|| {
                serde_json::json!({
                    "type": "object",
                    "properties": {
                        "input": {
                            "type": "string",
                            "description": "Argumento textual da ferramenta."
                        }
                    },
                    "required": ["input"]
                })
            }),
        })
        .collect()
}

fn collect_text(parts: &[Part]) -> Option<String> {
    let text: String = parts
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<Vec<_>>()
        .join("");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ToolsBlock>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ToolsBlock {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Clone, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<FunctionResponse>,
}

impl Part {
    fn text(content: &str) -> Self {
        Self {
            text: Some(content.to_string()),
            function_call: None,
            function_response: None,
        }
    }

    fn function_response(name: &str, output: &str) -> Self {
        Self {
            text: None,
            function_call: None,
            function_response: Some(FunctionResponse {
                name: name.to_string(),
                response: serde_json::json!({ "content": output }),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}
