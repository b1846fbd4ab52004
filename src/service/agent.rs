//! Orchestration loop: tables in, natural-language answer out.

use crate::data::{find_data_files, load_tables};
use crate::llm::ReasoningEngine;
use crate::models::columns;
use crate::models::table::format_brl;
use crate::service::registry::{summarize_headers, summarize_items, ToolRegistry};
use crate::models::DataTable;
use bigdecimal::{BigDecimal, Zero};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

const NFE_AGENT_PROMPT: &str = "Responda sempre e exclusivamente em português brasileiro.\n\n\
Você é um agente especialista em Notas Fiscais Eletrônicas (NF-e) com amplo conhecimento técnico, \
fiscal e normativo. Seu objetivo é analisar e validar dados fiscais contidos em dois datasets \
fornecidos: o dataset \"Cabecalhos\", que contém informações principais de cada nota fiscal, \
incluindo a Chave de Acesso (chave primária e identificador único da nota), Número da Nota, Data \
de Emissão, Valor Total da Nota e demais campos fiscais; e o dataset \"Itens\", que contém os \
itens individuais de cada nota fiscal, com informações de Chave de Acesso, Descrição do Produto, \
Quantidade, Valor Unitário e Valor Total do Item.\n\n\
Sua principal tarefa é realizar a validação de consistência entre os dois datasets: para cada \
Chave de Acesso, verifique se a soma do Valor Total do Item de todos os itens associados \
corresponde ao Valor Total da Nota no dataset Cabecalhos, e apresente um relatório das \
divergências encontradas.\n\n\
Você também deve responder perguntas analíticas e descritivas sobre os dados e identificar \
anomalias fiscais, como notas com valor total negativo, números de nota duplicados, itens com \
valor unitário zerado ou quantidade negativa. Utilize as ferramentas disponíveis para consultar \
os dados antes de responder; nunca invente valores. Utilize a Chave de Acesso como chave primária \
em todos os cruzamentos. Em caso de ausência de dados ou limitações nos arquivos fornecidos, \
informe a limitação de forma transparente e prossiga com a análise possível.";

/// Drives one question end to end. Infallible by contract: every failure
/// mode degrades to a user-facing message, never an error.
pub struct AgentService {
    engine: Option<Arc<dyn ReasoningEngine>>,
}

impl AgentService {
    /// `None` means the credential was absent at startup; questions are
    /// refused with a configuration message before any data work.
    pub fn new(engine: Option<Arc<dyn ReasoningEngine>>) -> Self {
        Self { engine }
    }

    pub async fn answer(&self, question: &str, data_dir: &Path) -> String {
        info!("Processing question: {}", question);

        let Some(engine) = self.engine.as_ref() else {
            return "GOOGLE_API_KEY não configurada. Defina a credencial no ambiente para \
                    habilitar o agente."
                .to_string();
        };

        let files = match find_data_files(data_dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("Could not scan {}: {}", data_dir.display(), e);
                return "Nenhum arquivo encontrado para análise.".to_string();
            }
        };
        if files.is_empty() {
            return "Nenhum arquivo encontrado para análise.".to_string();
        }

        let tables = match load_tables(&files) {
            Ok(tables) => tables,
            Err(e) => {
                error!("Failed to resolve datasets: {}", e);
                return "Não foi possível carregar todos os arquivos necessários.".to_string();
            }
        };
        let headers = Arc::new(tables.headers);
        let items = Arc::new(tables.items);

        let registry = ToolRegistry::for_session(headers.clone(), items.clone());
        info!("Tool registry ready: {} tools", registry.len());

        let context = build_context(&headers, &items, question);
        match engine.answer(NFE_AGENT_PROMPT, &context, &registry).await {
            Ok(answer) => {
                info!("Agent finished successfully");
                answer
            }
            Err(e) => {
                error!("Agent execution failed: {}", e);
                format!("Desculpe, ocorreu um erro ao processar sua pergunta: {e}")
            }
        }
    }
}

/// Prepends a compact data overview so the engine starts with the shape of
/// the session before picking tools.
fn build_context(headers: &DataTable, items: &DataTable, question: &str) -> String {
    let mut context = String::from("Dados disponíveis:\n\n");
    context.push_str(&summarize_headers(headers));
    context.push('\n');
    if let Some(value_col) = headers.column_index(columns::NOTE_VALUE) {
        if !headers.is_empty() {
            let values = headers.decimal_column(value_col);
            let total = values.iter().fold(BigDecimal::zero(), |acc, value| acc + value);
            let mean = total / BigDecimal::from(values.len() as i64);
            context.push_str(&format!("Média por nota: {}\n", format_brl(&mean)));
        }
    }
    context.push_str(&summarize_items(items));
    context.push_str(&format!("\n\nPergunta: {question}"));
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;

    /// Scripted engine: records the context it received and answers with a
    /// fixed reply after invoking one tool, like a one-round real session.
    struct ScriptedEngine {
        tool: &'static str,
        seen_question: Mutex<Option<String>>,
    }

    #[async_trait]
    impl ReasoningEngine for ScriptedEngine {
        async fn answer(
            &self,
            _system_prompt: &str,
            question: &str,
            registry: &ToolRegistry,
        ) -> Result<String> {
            *self.seen_question.lock().unwrap() = Some(question.to_string());
            let observation = registry
                .get(self.tool)
                .map(|tool| tool.invoke(""))
                .unwrap_or_default();
            Ok(format!("Com base nos dados: {observation}"))
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl ReasoningEngine for FailingEngine {
        async fn answer(&self, _: &str, _: &str, _: &ToolRegistry) -> Result<String> {
            Err(crate::error::AgentError::Engine("timeout".to_string()))
        }
    }

    fn write_datasets(dir: &Path) {
        fs::write(
            dir.join("202401_NFs_Cabecalho.csv"),
            "CHAVE DE ACESSO,VALOR NOTA FISCAL\nA,100.00\n",
        )
        .unwrap();
        fs::write(
            dir.join("202401_NFs_Itens.csv"),
            "CHAVE DE ACESSO,DESCRIÇÃO DO PRODUTO/SERVIÇO,VALOR TOTAL\nA,caneta,60.00\nA,lápis,40.00\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn answers_flow_through_the_bound_registry() {
        let dir = tempfile::tempdir().unwrap();
        write_datasets(dir.path());
        let engine = Arc::new(ScriptedEngine {
            tool: "validar_consistencia",
            seen_question: Mutex::new(None),
        });
        let service = AgentService::new(Some(engine.clone()));

        let answer = service.answer("As notas batem?", dir.path()).await;
        assert_eq!(
            answer,
            "Com base nos dados: Nenhuma divergência encontrada entre o valor total das notas e a soma dos itens."
        );

        let context = engine.seen_question.lock().unwrap().clone().unwrap();
        assert!(context.contains("Total de notas: 1"));
        assert!(context.contains("Média por nota: R$ 100.00"));
        assert!(context.contains("Pergunta: As notas batem?"));
    }

    #[tokio::test]
    async fn missing_credential_blocks_before_any_data_work() {
        let service = AgentService::new(None);
        let answer = service
            .answer("qualquer pergunta", Path::new("/nonexistent"))
            .await;
        assert!(answer.starts_with("GOOGLE_API_KEY não configurada"));
    }

    #[tokio::test]
    async fn empty_directory_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let service = AgentService::new(Some(Arc::new(FailingEngine)));
        let answer = service.answer("pergunta", dir.path()).await;
        assert_eq!(answer, "Nenhum arquivo encontrado para análise.");
    }

    #[tokio::test]
    async fn missing_dataset_reports_load_failure() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("202401_NFs_Cabecalho.csv"), "CHAVE DE ACESSO\nA\n").unwrap();
        let service = AgentService::new(Some(Arc::new(FailingEngine)));
        let answer = service.answer("pergunta", dir.path()).await;
        assert_eq!(answer, "Não foi possível carregar todos os arquivos necessários.");
    }

    #[tokio::test]
    async fn engine_errors_degrade_to_an_apology() {
        let dir = tempfile::tempdir().unwrap();
        write_datasets(dir.path());
        let service = AgentService::new(Some(Arc::new(FailingEngine)));
        let answer = service.answer("pergunta", dir.path()).await;
        assert_eq!(
            answer,
            "Desculpe, ocorreu um erro ao processar sua pergunta: reasoning engine error: timeout"
        );
    }
}
