//! Cross-dataset validation: declared note totals vs. the sum of their items.

use crate::models::columns;
use crate::models::table::{format_brl, value_tolerance, DataTable};
use bigdecimal::{BigDecimal, Zero};
use indexmap::{IndexMap, IndexSet};

/// Validates that each note's declared total matches the sum of its items.
///
/// Items are aggregated per access key; headers without items count as zero.
/// A key diverges when the absolute difference exceeds the tolerance, and
/// appears exactly once in the report with its signed difference
/// (declared − computed). With no divergence a single confirmation sentence
/// is returned.
pub fn validate_nfe_consistency(headers: &DataTable, items: &DataTable) -> String {
    if headers.is_empty() || items.is_empty() {
        return "Dados de cabeçalho ou itens não disponíveis para validação de consistência."
            .to_string();
    }

    let (Some(header_key_col), Some(value_col), Some(item_key_col), Some(total_col)) = (
        headers.column_index(columns::ACCESS_KEY),
        headers.column_index(columns::NOTE_VALUE),
        items.column_index(columns::ACCESS_KEY),
        items.column_index(columns::ITEM_TOTAL),
    ) else {
        // the same key column may be absent from both tables; report it once
        let mut missing: IndexSet<String> = IndexSet::new();
        missing.extend(headers.missing_columns(&[columns::ACCESS_KEY, columns::NOTE_VALUE]));
        missing.extend(items.missing_columns(&[columns::ACCESS_KEY, columns::ITEM_TOTAL]));
        let names: Vec<String> = missing.into_iter().collect();
        return format!("Colunas necessárias ausentes: {}", names.join(", "));
    };

    // 1. aggregate item totals per access key
    let item_totals = items.decimal_column(total_col);
    let mut computed: IndexMap<String, BigDecimal> = IndexMap::new();
    for (row, total) in item_totals.iter().enumerate() {
        *computed
            .entry(items.text(row, item_key_col).to_string())
            .or_insert_with(BigDecimal::zero) += total;
    }

    // 2. left-join headers against the aggregate and compare
    let declared = headers.decimal_column(value_col);
    let tolerance = value_tolerance();
    let mut report = String::new();
    for row in 0..headers.len() {
        let key = headers.text(row, header_key_col);
        let item_sum = computed.get(key).cloned().unwrap_or_else(BigDecimal::zero);
        let difference = &declared[row] - &item_sum;
        if difference.abs() > tolerance {
            report.push_str(&format!(
                "- Chave de Acesso: {}\n  Valor Total da Nota: {}\n  Soma dos Itens: {}\n  Diferença: {}\n\n",
                key,
                format_brl(&declared[row]),
                format_brl(&item_sum),
                format_brl(&difference)
            ));
        }
    }

    if report.is_empty() {
        return "Nenhuma divergência encontrada entre o valor total das notas e a soma dos itens."
            .to_string();
    }
    format!("Divergências encontradas entre o Valor Total da Nota e a Soma dos Itens:\n\n{report}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(rows: &[(&str, &str)]) -> DataTable {
        let mut table = DataTable::new(vec![
            columns::ACCESS_KEY.to_string(),
            columns::NOTE_VALUE.to_string(),
        ]);
        for (key, value) in rows {
            table.push_row(vec![key.to_string(), value.to_string()]);
        }
        table
    }

    fn items(rows: &[(&str, &str)]) -> DataTable {
        let mut table = DataTable::new(vec![
            columns::ACCESS_KEY.to_string(),
            columns::ITEM_TOTAL.to_string(),
        ]);
        for (key, total) in rows {
            table.push_row(vec![key.to_string(), total.to_string()]);
        }
        table
    }

    #[test]
    fn matching_sums_confirm_consistency() {
        let report = validate_nfe_consistency(
            &headers(&[("A", "100.00")]),
            &items(&[("A", "60.00"), ("A", "40.00")]),
        );
        assert_eq!(
            report,
            "Nenhuma divergência encontrada entre o valor total das notas e a soma dos itens."
        );
    }

    #[test]
    fn divergence_reports_declared_computed_and_signed_difference() {
        let report =
            validate_nfe_consistency(&headers(&[("A", "100.00")]), &items(&[("A", "50.00")]));
        assert!(report.contains("- Chave de Acesso: A"));
        assert!(report.contains("Valor Total da Nota: R$ 100.00"));
        assert!(report.contains("Soma dos Itens: R$ 50.00"));
        assert!(report.contains("Diferença: R$ 50.00"));
    }

    #[test]
    fn negative_difference_keeps_its_sign() {
        let report =
            validate_nfe_consistency(&headers(&[("A", "10.00")]), &items(&[("A", "25.00")]));
        assert!(report.contains("Diferença: R$ -15.00"));
    }

    #[test]
    fn header_without_items_computes_as_zero() {
        let report = validate_nfe_consistency(
            &headers(&[("A", "100.00"), ("B", "30.00")]),
            &items(&[("A", "100.00")]),
        );
        assert!(report.contains("- Chave de Acesso: B"));
        assert!(report.contains("Soma dos Itens: R$ 0.00"));
        assert!(!report.contains("- Chave de Acesso: A"));
    }

    #[test]
    fn each_divergent_key_appears_exactly_once() {
        let report = validate_nfe_consistency(
            &headers(&[("A", "1.00"), ("B", "2.00")]),
            &items(&[("A", "5.00"), ("B", "9.00"), ("A", "1.00")]),
        );
        assert_eq!(report.matches("- Chave de Acesso: A").count(), 1);
        assert_eq!(report.matches("- Chave de Acesso: B").count(), 1);
    }

    #[test]
    fn tolerance_swallows_noise_but_not_real_divergence() {
        let report = validate_nfe_consistency(
            &headers(&[("A", "100.01"), ("B", "100.02")]),
            &items(&[("A", "100.00"), ("B", "100.00")]),
        );
        assert!(!report.contains("Chave de Acesso: A"));
        assert!(report.contains("Chave de Acesso: B"));
    }

    #[test]
    fn empty_inputs_short_circuit() {
        let empty_headers = DataTable::new(vec![columns::ACCESS_KEY.to_string()]);
        let report = validate_nfe_consistency(&empty_headers, &items(&[("A", "1.00")]));
        assert_eq!(
            report,
            "Dados de cabeçalho ou itens não disponíveis para validação de consistência."
        );
    }

    #[test]
    fn missing_columns_are_reported_across_both_tables() {
        let mut bare_headers = DataTable::new(vec![columns::ACCESS_KEY.to_string()]);
        bare_headers.push_row(vec!["A".to_string()]);
        let report = validate_nfe_consistency(&bare_headers, &items(&[("A", "1.00")]));
        assert_eq!(
            report,
            format!("Colunas necessárias ausentes: {}", columns::NOTE_VALUE)
        );
    }
}
