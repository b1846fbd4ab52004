pub mod gemini;

pub use gemini::GeminiEngine;

use crate::error::Result;
use crate::service::ToolRegistry;
use async_trait::async_trait;

/// Seam for the external reasoning engine.
///
/// The engine receives the tool catalog and decides, iteratively, which
/// tools to call and with what argument; the implementation owns that loop
/// and returns only the final natural-language answer.
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn answer(
        &self,
        system_prompt: &str,
        question: &str,
        registry: &ToolRegistry,
    ) -> Result<String>;
}
