//! Capability registry consumed by the reasoning loop.
//!
//! Each analytic function is wrapped as a named, described tool whose
//! closure already captures the session tables, so the engine only ever
//! supplies the scalar argument. The registry itself is independent of any
//! particular reasoning-engine binding.

use crate::models::columns;
use crate::models::table::{format_brl, DataTable};
use crate::service::consistency::validate_nfe_consistency;
use crate::service::{header_analysis, item_analysis};
use bigdecimal::{BigDecimal, Zero};
use indexmap::IndexSet;
use std::sync::Arc;

type ToolHandler = Box<dyn Fn(&str) -> String + Send + Sync>;

/// One capability: stable name, description for the engine, and the bound
/// callable. `takes_argument` tells the engine whether to pass an input
/// string.
pub struct Tool {
    pub name: &'static str,
    pub description: &'static str,
    pub takes_argument: bool,
    handler: ToolHandler,
}

impl Tool {
    fn new(
        name: &'static str,
        description: &'static str,
        takes_argument: bool,
        handler: impl Fn(&str) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name,
            description,
            takes_argument,
            handler: Box::new(handler),
        }
    }

    pub fn invoke(&self, input: &str) -> String {
        (self.handler)(input)
    }
}

/// The session's tool catalog, iterated in registration order.
pub struct ToolRegistry {
    tools: Vec<Tool>,
}

impl ToolRegistry {
    /// Builds the full catalog bound to one session's tables.
    pub fn for_session(headers: Arc<DataTable>, items: Arc<DataTable>) -> Self {
        let mut tools = Vec::new();

        let h = headers.clone();
        tools.push(Tool::new(
            "analisar_cabecalhos",
            "Analisa os dados do cabeçalho das notas fiscais, fornecendo um resumo geral.",
            false,
            move |_| summarize_headers(&h),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "analisar_itens",
            "Analisa os dados dos itens das notas fiscais, fornecendo um resumo geral.",
            false,
            move |_| summarize_items(&i),
        ));

        let h = headers.clone();
        let i = items.clone();
        tools.push(Tool::new(
            "validar_consistencia",
            "Valida a consistência entre os valores do cabeçalho e dos itens. Retorna um relatório detalhado de divergências (Chave de Acesso, Valor Total da Nota, Soma dos Itens, Diferença) ou confirma a consistência.",
            false,
            move |_| validate_nfe_consistency(&h, &i),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "listar_top_produtos_caros",
            "Lista os 10 produtos/serviços mais caros encontrados nos dados dos itens, com base no valor unitário. Ideal para perguntas sobre os itens de maior valor.",
            false,
            move |_| item_analysis::list_top_expensive_items(&i, 10),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "listar_descricoes_ncm",
            "Lista todas as descrições únicas de produtos/serviços e seus respectivos códigos NCM/SH encontrados nos dados dos itens. Útil para entender a variedade de produtos e suas classificações fiscais.",
            false,
            move |_| item_analysis::list_product_ncm_pairs(&i),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "analisar_top_emitentes_por_valor",
            "Analisa e lista as 5 Razões Sociais Emitentes com o maior valor total de notas fiscais emitidas.",
            false,
            move |_| header_analysis::analyze_top_emitters_by_value(&h, 5),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "contar_notas_por_uf_emitente",
            "Conta o número de notas fiscais registradas por cada UF Emitente.",
            false,
            move |_| header_analysis::count_notes_by_uf_emitter(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "valor_medio_por_municipio_emitente",
            "Calcula e lista o valor médio das notas fiscais por cada Município Emitente.",
            false,
            move |_| header_analysis::avg_note_value_by_municipio_emitter(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "listar_notas_por_cnpj_emitente",
            "Lista as notas fiscais emitidas por um CPF/CNPJ Emitente específico. O input deve ser o CNPJ como string.",
            true,
            move |cnpj| header_analysis::list_notes_by_cnpj_emitter(&h, cnpj),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "analisar_top_destinatarios_por_valor",
            "Analisa e lista os 5 Nomes de Destinatários que receberam o maior valor total de notas fiscais.",
            false,
            move |_| header_analysis::analyze_top_recipients_by_value(&h, 5),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "contar_notas_por_uf_destinatario",
            "Conta o número de notas fiscais recebidas por cada UF Destinatário.",
            false,
            move |_| header_analysis::count_notes_by_uf_recipient(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "contar_notas_por_municipio_destinatario",
            "Conta o número de notas fiscais recebidas por cada Município Destinatário.",
            false,
            move |_| header_analysis::count_notes_by_municipio_recipient(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "valor_total_por_mes",
            "Calcula o valor total das notas fiscais por mês de emissão.",
            false,
            move |_| header_analysis::total_value_by_month(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "contar_notas_por_data_especifica",
            "Conta o número de notas fiscais emitidas em uma data específica. O input deve ser a data no formato 'YYYY-MM-DD'.",
            true,
            move |date| header_analysis::count_notes_by_specific_date(&h, date),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "dia_semana_maior_emissao",
            "Identifica o dia da semana com o maior número de emissões de notas fiscais.",
            false,
            move |_| header_analysis::day_of_week_highest_emission(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "contar_notas_por_natureza_operacao",
            "Conta o número de notas fiscais para cada tipo de Natureza da Operação.",
            false,
            move |_| header_analysis::count_notes_by_natureza_operacao(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "valor_total_por_natureza_operacao",
            "Calcula o valor total das notas fiscais para uma Natureza da Operação específica. O input deve ser parte do nome da natureza da operação como string.",
            true,
            move |nature| header_analysis::total_value_by_natureza_operacao(&h, nature),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "encontrar_notas_valor_negativo",
            "Identifica e lista notas fiscais no cabeçalho com VALOR NOTA FISCAL negativo.",
            false,
            move |_| header_analysis::find_negative_value_notes(&h),
        ));

        let h = headers.clone();
        tools.push(Tool::new(
            "encontrar_numeros_nota_duplicados",
            "Identifica e lista notas fiscais com NÚMERO duplicado.",
            false,
            move |_| header_analysis::find_duplicate_note_numbers(&h),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "top_produtos_por_quantidade_total",
            "Identifica e lista os 10 produtos/serviços com a maior QUANTIDADE total acumulada.",
            false,
            move |_| item_analysis::top_products_by_total_quantity(&i, 10),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "valor_total_por_codigo_ncm",
            "Calcula o valor total de todos os itens para um CÓDIGO NCM/SH específico. O input deve ser o código NCM como string.",
            true,
            move |ncm| item_analysis::total_value_by_ncm_code(&i, ncm),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "quantidade_media_por_item",
            "Calcula a QUANTIDADE média por item em todas as notas.",
            false,
            move |_| item_analysis::avg_item_quantity(&i),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "encontrar_itens_valor_unitario_zerado",
            "Identifica e lista itens com VALOR UNITÁRIO zerado.",
            false,
            move |_| item_analysis::find_zero_unit_value_items(&i),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "valor_total_medio_de_item",
            "Calcula o VALOR TOTAL médio de um item.",
            false,
            move |_| item_analysis::avg_item_total_value(&i),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "encontrar_itens_quantidade_negativa",
            "Identifica e lista itens com QUANTIDADE negativa.",
            false,
            move |_| item_analysis::find_negative_quantity_items(&i),
        ));

        let i = items.clone();
        tools.push(Tool::new(
            "encontrar_inconsistencias_valor_item",
            "Identifica e lista itens onde o VALOR TOTAL não é igual a (QUANTIDADE * VALOR UNITÁRIO).",
            false,
            move |_| item_analysis::find_inconsistent_item_values(&i),
        ));

        Self { tools }
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tool> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// One-line overview of the header dataset.
pub fn summarize_headers(headers: &DataTable) -> String {
    if headers.is_empty() {
        return "Dados de cabeçalho não disponíveis.".to_string();
    }
    match headers.column_index(columns::NOTE_VALUE) {
        Some(value_col) => {
            let total = headers
                .decimal_column(value_col)
                .iter()
                .fold(BigDecimal::zero(), |acc, value| acc + value);
            format!(
                "Análise do cabeçalho: Total de notas: {}, Valor total: {}",
                headers.len(),
                format_brl(&total)
            )
        }
        None => format!("Análise do cabeçalho: Total de notas: {}", headers.len()),
    }
}

/// One-line overview of the item dataset.
pub fn summarize_items(items: &DataTable) -> String {
    if items.is_empty() {
        return "Dados de itens não disponíveis.".to_string();
    }
    match items.column_index(columns::ITEM_DESCRIPTION) {
        Some(desc_col) => {
            let unique: IndexSet<&str> = (0..items.len()).map(|row| items.text(row, desc_col)).collect();
            format!(
                "Análise dos itens: Total de itens: {}, Serviços únicos: {}",
                items.len(),
                unique.len()
            )
        }
        None => format!("Análise dos itens: Total de itens: {}", items.len()),
    }
}
