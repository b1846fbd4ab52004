//! Analytic tools over the item (Itens) dataset.
//!
//! Same contract as the header tools: empty table and missing columns
//! degrade to report strings, coercion is local, nothing escapes as an
//! error. Unit-value ranking uses strict coercion because a zero unit value
//! is an anomaly in its own right, not a parse fallback.

use crate::models::columns;
use crate::models::table::{format_brl, two_places, value_tolerance, DataTable};
use bigdecimal::{BigDecimal, Zero};
use indexmap::{IndexMap, IndexSet};

const UNAVAILABLE: &str = "Dados de itens não disponíveis.";

fn missing_message(missing: &[String]) -> String {
    format!("Colunas necessárias ausentes: {}", missing.join(", "))
}

fn single_missing(name: &str) -> String {
    format!("Coluna '{name}' ausente.")
}

/// Top N products by unit value, one entry per distinct description.
pub fn list_top_expensive_items(items: &DataTable, top_n: usize) -> String {
    if items.is_empty() {
        return "Dados de itens não disponíveis para listar produtos caros.".to_string();
    }
    let (Some(desc_col), Some(unit_col)) = (
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ITEM_UNIT_VALUE),
    ) else {
        return missing_message(
            &items.missing_columns(&[columns::ITEM_DESCRIPTION, columns::ITEM_UNIT_VALUE]),
        );
    };

    // Rows whose unit value does not parse are excluded entirely rather
    // than zero-coerced.
    let mut priced: Vec<(usize, BigDecimal)> = items
        .decimal_column_strict(unit_col)
        .into_iter()
        .enumerate()
        .filter_map(|(row, value)| value.map(|v| (row, v)))
        .collect();
    if priced.is_empty() {
        return "Não há itens com valor unitário válido para análise.".to_string();
    }
    priced.sort_by(|a, b| b.1.cmp(&a.1));

    let mut seen: IndexSet<String> = IndexSet::new();
    let mut top: Vec<(usize, BigDecimal)> = Vec::new();
    for (row, value) in priced {
        if seen.insert(items.text(row, desc_col).to_string()) {
            top.push((row, value));
            if top.len() == top_n {
                break;
            }
        }
    }

    let mut report = format!("Top {top_n} produtos/serviços mais caros (por valor unitário):\n\n");
    for (row, value) in &top {
        report.push_str(&format!(
            "- {}: {}\n",
            items.text(*row, desc_col),
            format_brl(value)
        ));
    }
    report
}

/// Unique (description, NCM/SH) pairs in first-seen order.
pub fn list_product_ncm_pairs(items: &DataTable) -> String {
    if items.is_empty() {
        return "Dados de itens não disponíveis para listar descrições e NCMs.".to_string();
    }
    let (Some(desc_col), Some(ncm_col)) = (
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ITEM_NCM_TYPE),
    ) else {
        return missing_message(
            &items.missing_columns(&[columns::ITEM_DESCRIPTION, columns::ITEM_NCM_TYPE]),
        );
    };

    let mut pairs: IndexSet<(String, String)> = IndexSet::new();
    for row in 0..items.len() {
        pairs.insert((
            items.text(row, desc_col).to_string(),
            items.text(row, ncm_col).to_string(),
        ));
    }
    if pairs.is_empty() {
        return "Nenhum par de descrição de produto/NCM encontrado.".to_string();
    }

    let mut report = String::from("Lista de Descrições de Produtos/Serviços e seus NCM/SH:\n\n");
    for (description, ncm) in &pairs {
        report.push_str(&format!("- Descrição: {description}\n  NCM/SH: {ncm}\n\n"));
    }
    report
}

/// Top N products by accumulated quantity.
pub fn top_products_by_total_quantity(items: &DataTable, top_n: usize) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(desc_col), Some(qty_col)) = (
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ITEM_QUANTITY),
    ) else {
        return missing_message(
            &items.missing_columns(&[columns::ITEM_DESCRIPTION, columns::ITEM_QUANTITY]),
        );
    };

    let quantities = items.decimal_column(qty_col);
    let mut totals: IndexMap<String, BigDecimal> = IndexMap::new();
    for (row, quantity) in quantities.iter().enumerate() {
        *totals
            .entry(items.text(row, desc_col).to_string())
            .or_insert_with(BigDecimal::zero) += quantity;
    }
    let mut ranked: Vec<(String, BigDecimal)> = totals.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);
    if ranked.is_empty() {
        return "Nenhum produto encontrado por quantidade.".to_string();
    }

    let mut report = format!("Top {top_n} Produtos/Serviços por Quantidade Total Acumulada:\n\n");
    for (description, quantity) in &ranked {
        report.push_str(&format!("- {}: {}\n", description, two_places(quantity)));
    }
    report
}

/// Accumulated item value for one exact NCM/SH code.
pub fn total_value_by_ncm_code(items: &DataTable, ncm_code: &str) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(ncm_col), Some(total_col)) = (
        items.column_index(columns::ITEM_NCM_CODE),
        items.column_index(columns::ITEM_TOTAL),
    ) else {
        return missing_message(
            &items.missing_columns(&[columns::ITEM_NCM_CODE, columns::ITEM_TOTAL]),
        );
    };

    let target = ncm_code.trim();
    let values = items.decimal_column(total_col);
    let mut total = BigDecimal::zero();
    let mut matched = false;
    for row in 0..items.len() {
        if items.text(row, ncm_col).trim() == target {
            total += &values[row];
            matched = true;
        }
    }
    if !matched {
        return format!("Nenhum item encontrado para o CÓDIGO NCM/SH '{ncm_code}'.");
    }
    format!(
        "O valor total de todos os itens para o CÓDIGO NCM/SH '{ncm_code}' é {}.",
        format_brl(&total)
    )
}

/// Mean quantity across all item rows.
pub fn avg_item_quantity(items: &DataTable) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(qty_col) = items.column_index(columns::ITEM_QUANTITY) else {
        return single_missing(columns::ITEM_QUANTITY);
    };

    let quantities = items.decimal_column(qty_col);
    let total = quantities
        .iter()
        .fold(BigDecimal::zero(), |acc, quantity| acc + quantity);
    let mean = total / BigDecimal::from(quantities.len() as i64);
    format!(
        "A quantidade média por item em todas as notas é {}.",
        two_places(&mean)
    )
}

/// Items declared with a zero unit value.
pub fn find_zero_unit_value_items(items: &DataTable) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(desc_col), Some(unit_col), Some(key_col)) = (
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ITEM_UNIT_VALUE),
        items.column_index(columns::ACCESS_KEY),
    ) else {
        return missing_message(&items.missing_columns(&[
            columns::ITEM_DESCRIPTION,
            columns::ITEM_UNIT_VALUE,
            columns::ACCESS_KEY,
        ]));
    };

    let units = items.decimal_column(unit_col);
    let mut report = String::new();
    for (row, unit) in units.iter().enumerate() {
        if unit.is_zero() {
            report.push_str(&format!(
                "- Descrição: {}, Chave de Acesso: {}\n",
                items.text(row, desc_col),
                items.text(row, key_col)
            ));
        }
    }
    if report.is_empty() {
        return "Nenhum item encontrado com valor unitário zerado.".to_string();
    }
    format!("Itens com VALOR UNITÁRIO zerado:\n\n{report}")
}

/// Mean declared line total.
pub fn avg_item_total_value(items: &DataTable) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(total_col) = items.column_index(columns::ITEM_TOTAL) else {
        return single_missing(columns::ITEM_TOTAL);
    };

    let values = items.decimal_column(total_col);
    let total = values.iter().fold(BigDecimal::zero(), |acc, value| acc + value);
    let mean = total / BigDecimal::from(values.len() as i64);
    format!("O valor total médio de um item é {}.", format_brl(&mean))
}

/// Items with a negative quantity.
pub fn find_negative_quantity_items(items: &DataTable) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(desc_col), Some(qty_col), Some(key_col)) = (
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ITEM_QUANTITY),
        items.column_index(columns::ACCESS_KEY),
    ) else {
        return missing_message(&items.missing_columns(&[
            columns::ITEM_DESCRIPTION,
            columns::ITEM_QUANTITY,
            columns::ACCESS_KEY,
        ]));
    };

    let quantities = items.decimal_column(qty_col);
    let mut report = String::new();
    for (row, quantity) in quantities.iter().enumerate() {
        if *quantity < BigDecimal::zero() {
            report.push_str(&format!(
                "- Descrição: {}, Quantidade: {}, Chave de Acesso: {}\n",
                items.text(row, desc_col),
                quantity,
                items.text(row, key_col)
            ));
        }
    }
    if report.is_empty() {
        return "Nenhum item encontrado com quantidade negativa.".to_string();
    }
    format!("Itens com QUANTIDADE negativa:\n\n{report}")
}

/// Items whose declared total diverges from quantity × unit value beyond
/// the tolerance (strict inequality — a difference of exactly 0.01 passes).
pub fn find_inconsistent_item_values(items: &DataTable) -> String {
    if items.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(qty_col), Some(unit_col), Some(total_col), Some(desc_col), Some(key_col)) = (
        items.column_index(columns::ITEM_QUANTITY),
        items.column_index(columns::ITEM_UNIT_VALUE),
        items.column_index(columns::ITEM_TOTAL),
        items.column_index(columns::ITEM_DESCRIPTION),
        items.column_index(columns::ACCESS_KEY),
    ) else {
        return missing_message(&items.missing_columns(&[
            columns::ITEM_QUANTITY,
            columns::ITEM_UNIT_VALUE,
            columns::ITEM_TOTAL,
            columns::ITEM_DESCRIPTION,
            columns::ACCESS_KEY,
        ]));
    };

    let quantities = items.decimal_column(qty_col);
    let units = items.decimal_column(unit_col);
    let totals = items.decimal_column(total_col);
    let tolerance = value_tolerance();

    let mut report = String::new();
    for row in 0..items.len() {
        let expected = &quantities[row] * &units[row];
        let difference = &totals[row] - &expected;
        if difference.abs() > tolerance {
            report.push_str(&format!(
                "- Descrição: {}\n  Chave de Acesso: {}\n  Quantidade: {}\n  Valor Unitário: {}\n  Valor Total (informado): {}\n  Valor Total (calculado): {}\n  Diferença: {}\n\n",
                items.text(row, desc_col),
                items.text(row, key_col),
                quantities[row],
                format_brl(&units[row]),
                format_brl(&totals[row]),
                format_brl(&expected),
                format_brl(&difference)
            ));
        }
    }
    if report.is_empty() {
        return "Nenhum item encontrado com inconsistência entre Valor Total e (Quantidade * Valor Unitário)."
            .to_string();
    }
    format!("Itens com VALOR TOTAL inconsistente com (QUANTIDADE * VALOR UNITÁRIO):\n\n{report}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item_table(rows: &[(&str, &str, &str, &str, &str)]) -> DataTable {
        // (key, description, quantity, unit value, total)
        let mut table = DataTable::new(vec![
            columns::ACCESS_KEY.to_string(),
            columns::ITEM_DESCRIPTION.to_string(),
            columns::ITEM_QUANTITY.to_string(),
            columns::ITEM_UNIT_VALUE.to_string(),
            columns::ITEM_TOTAL.to_string(),
        ]);
        for (key, description, quantity, unit, total) in rows {
            table.push_row(vec![
                key.to_string(),
                description.to_string(),
                quantity.to_string(),
                unit.to_string(),
                total.to_string(),
            ]);
        }
        table
    }

    #[test]
    fn empty_table_reports_unavailable_everywhere() {
        let empty = DataTable::new(vec![columns::ITEM_QUANTITY.to_string()]);
        assert_eq!(top_products_by_total_quantity(&empty, 5), UNAVAILABLE);
        assert_eq!(avg_item_quantity(&empty), UNAVAILABLE);
        assert_eq!(find_inconsistent_item_values(&empty), UNAVAILABLE);
        assert!(list_top_expensive_items(&empty, 5).starts_with("Dados de itens não disponíveis"));
    }

    #[test]
    fn missing_columns_are_named_precisely() {
        let mut table = DataTable::new(vec![columns::ITEM_DESCRIPTION.to_string()]);
        table.push_row(vec!["caneta".to_string()]);
        assert_eq!(
            find_inconsistent_item_values(&table),
            format!(
                "Colunas necessárias ausentes: {}, {}, {}, {}",
                columns::ITEM_QUANTITY,
                columns::ITEM_UNIT_VALUE,
                columns::ITEM_TOTAL,
                columns::ACCESS_KEY
            )
        );
    }

    #[test]
    fn inconsistency_flags_only_the_divergent_row() {
        let table = item_table(&[
            ("K1", "X", "2", "10", "20"),
            ("K2", "Y", "1", "5", "999"),
        ]);
        let report = find_inconsistent_item_values(&table);
        assert!(report.contains("- Descrição: Y"));
        assert!(report.contains("Valor Total (calculado): R$ 5.00"));
        assert!(report.contains("Diferença: R$ 994.00"));
        assert!(!report.contains("Descrição: X"));
    }

    #[test]
    fn deviation_of_exactly_one_cent_is_not_flagged() {
        let table = item_table(&[
            ("K1", "X", "1", "10.00", "10.01"),
            ("K2", "Y", "1", "10.00", "10.02"),
        ]);
        let report = find_inconsistent_item_values(&table);
        assert!(!report.contains("Descrição: X"));
        assert!(report.contains("Descrição: Y"));
    }

    #[test]
    fn top_expensive_items_dedup_and_skip_unparseable() {
        let table = item_table(&[
            ("K1", "caro", "1", "500.00", "500.00"),
            ("K2", "caro", "1", "450.00", "450.00"),
            ("K3", "médio", "1", "100.00", "100.00"),
            ("K4", "quebrado", "1", "n/a", "0.00"),
            ("K5", "barato", "1", "1.00", "1.00"),
        ]);
        let report = list_top_expensive_items(&table, 2);
        let lines: Vec<&str> = report.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(lines, vec!["- caro: R$ 500.00", "- médio: R$ 100.00"]);
        assert!(!report.contains("quebrado"));
    }

    #[test]
    fn quantity_ranking_accumulates_per_description() {
        let table = item_table(&[
            ("K1", "parafuso", "10", "1", "10"),
            ("K2", "parafuso", "15", "1", "15"),
            ("K3", "porca", "8", "1", "8"),
        ]);
        let report = top_products_by_total_quantity(&table, 1);
        let lines: Vec<&str> = report.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(lines, vec!["- parafuso: 25.00"]);
    }

    #[test]
    fn zero_unit_value_includes_coerced_rows() {
        let table = item_table(&[
            ("K1", "brinde", "1", "0", "0"),
            ("K2", "normal", "1", "9.90", "9.90"),
        ]);
        let report = find_zero_unit_value_items(&table);
        assert!(report.contains("- Descrição: brinde, Chave de Acesso: K1"));
        assert!(!report.contains("normal"));
    }

    #[test]
    fn negative_quantities_are_listed() {
        let table = item_table(&[
            ("K1", "estorno", "-2", "10", "-20"),
            ("K2", "normal", "3", "10", "30"),
        ]);
        let report = find_negative_quantity_items(&table);
        assert!(report.contains("- Descrição: estorno, Quantidade: -2, Chave de Acesso: K1"));
        assert!(!report.contains("normal"));
    }

    #[test]
    fn averages_zero_coerce_malformed_cells() {
        let table = item_table(&[
            ("K1", "a", "2", "1", "4.00"),
            ("K2", "b", "junk", "1", "8.00"),
        ]);
        assert_eq!(
            avg_item_quantity(&table),
            "A quantidade média por item em todas as notas é 1.00."
        );
        assert_eq!(
            avg_item_total_value(&table),
            "O valor total médio de um item é R$ 6.00."
        );
    }

    #[test]
    fn ncm_total_matches_code_exactly() {
        let mut table = DataTable::new(vec![
            columns::ITEM_NCM_CODE.to_string(),
            columns::ITEM_TOTAL.to_string(),
        ]);
        table.push_row(vec!["8471.30".to_string(), "10.00".to_string()]);
        table.push_row(vec!["8471.30".to_string(), "5.50".to_string()]);
        table.push_row(vec!["8471.41".to_string(), "99.00".to_string()]);

        let report = total_value_by_ncm_code(&table, "8471.30");
        assert!(report.contains("R$ 15.50"));
        assert!(total_value_by_ncm_code(&table, "0000.00")
            .starts_with("Nenhum item encontrado"));
    }

    #[test]
    fn ncm_pairs_are_unique_in_first_seen_order() {
        let mut table = DataTable::new(vec![
            columns::ITEM_DESCRIPTION.to_string(),
            columns::ITEM_NCM_TYPE.to_string(),
        ]);
        table.push_row(vec!["caneta".to_string(), "9608.10".to_string()]);
        table.push_row(vec!["caneta".to_string(), "9608.10".to_string()]);
        table.push_row(vec!["lápis".to_string(), "9609.10".to_string()]);

        let report = list_product_ncm_pairs(&table);
        assert_eq!(report.matches("- Descrição: caneta").count(), 1);
        assert!(report.contains("- Descrição: lápis\n  NCM/SH: 9609.10"));
    }
}
