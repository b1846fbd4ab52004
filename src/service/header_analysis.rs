//! Analytic tools over the header (Cabecalho) dataset.
//!
//! Every function follows the same contract: empty table and missing columns
//! degrade to explanatory report strings, numeric columns are coerced into
//! local copies, and nothing here returns an error or panics past its
//! boundary.

use crate::models::columns;
use crate::models::table::{format_brl, DataTable};
use bigdecimal::{BigDecimal, Zero};
use chrono::{Datelike, NaiveDate, NaiveDateTime, Weekday};
use indexmap::IndexMap;
use std::collections::BTreeMap;

const UNAVAILABLE: &str = "Dados de cabeçalho não disponíveis.";

fn missing_message(missing: &[String]) -> String {
    format!("Colunas necessárias ausentes: {}", missing.join(", "))
}

fn single_missing(name: &str) -> String {
    format!("Coluna '{name}' ausente.")
}

/// Sums one decimal column grouped by the text of another, first-seen order.
fn group_sum(table: &DataTable, key_col: usize, value_col: usize) -> IndexMap<String, BigDecimal> {
    let values = table.decimal_column(value_col);
    let mut totals: IndexMap<String, BigDecimal> = IndexMap::new();
    for (row, value) in values.iter().enumerate() {
        let key = table.text(row, key_col).to_string();
        *totals.entry(key).or_insert_with(BigDecimal::zero) += value;
    }
    totals
}

/// Frequency count of one text column, most frequent first.
fn value_counts(table: &DataTable, col: usize) -> Vec<(String, usize)> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for row in 0..table.len() {
        *counts.entry(table.text(row, col).to_string()).or_insert(0) += 1;
    }
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Multi-format date parser for the emission column; `None` drops the row
/// from date-based queries only.
fn parse_emission(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M:%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime);
        }
    }
    for format in ["%Y-%m-%d", "%d/%m/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

fn weekday_name_pt(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Segunda-feira",
        Weekday::Tue => "Terça-feira",
        Weekday::Wed => "Quarta-feira",
        Weekday::Thu => "Quinta-feira",
        Weekday::Fri => "Sexta-feira",
        Weekday::Sat => "Sábado",
        Weekday::Sun => "Domingo",
    }
}

/// Top N issuer names by accumulated invoice value.
pub fn analyze_top_emitters_by_value(headers: &DataTable, top_n: usize) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(name_col), Some(value_col)) = (
        headers.column_index(columns::ISSUER_NAME),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(&headers.missing_columns(&[columns::ISSUER_NAME, columns::NOTE_VALUE]));
    };

    let mut ranked: Vec<(String, BigDecimal)> =
        group_sum(headers, name_col, value_col).into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);
    if ranked.is_empty() {
        return "Nenhum emitente encontrado.".to_string();
    }

    let mut report = format!("Top {top_n} Razões Sociais Emitentes por Valor Total de Notas Fiscais:\n\n");
    for (name, total) in &ranked {
        report.push_str(&format!("- {}: {}\n", name, format_brl(total)));
    }
    report
}

/// Invoice count per issuer state.
pub fn count_notes_by_uf_emitter(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(state_col) = headers.column_index(columns::ISSUER_STATE) else {
        return single_missing(columns::ISSUER_STATE);
    };

    let counts = value_counts(headers, state_col);
    if counts.is_empty() {
        return "Nenhuma UF de emitente encontrada.".to_string();
    }
    let mut report = String::from("Contagem de Notas Fiscais por UF Emitente:\n\n");
    for (state, count) in &counts {
        report.push_str(&format!("- {state}: {count} notas\n"));
    }
    report
}

/// Mean invoice value per issuer municipality, municipality order.
pub fn avg_note_value_by_municipio_emitter(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(city_col), Some(value_col)) = (
        headers.column_index(columns::ISSUER_CITY),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(&headers.missing_columns(&[columns::ISSUER_CITY, columns::NOTE_VALUE]));
    };

    let values = headers.decimal_column(value_col);
    let mut totals: BTreeMap<String, (BigDecimal, i64)> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let entry = totals
            .entry(headers.text(row, city_col).to_string())
            .or_insert_with(|| (BigDecimal::zero(), 0));
        entry.0 += value;
        entry.1 += 1;
    }
    if totals.is_empty() {
        return "Nenhum município emitente encontrado.".to_string();
    }

    let mut report = String::from("Valor Médio das Notas Fiscais por Município Emitente:\n\n");
    for (city, (total, count)) in &totals {
        let mean = total / BigDecimal::from(*count);
        report.push_str(&format!("- {}: {}\n", city, format_brl(&mean)));
    }
    report
}

/// Invoices issued by one exact issuer tax id.
pub fn list_notes_by_cnpj_emitter(headers: &DataTable, cnpj: &str) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(tax_col), Some(key_col), Some(value_col)) = (
        headers.column_index(columns::ISSUER_TAX_ID),
        headers.column_index(columns::ACCESS_KEY),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(&headers.missing_columns(&[
            columns::ISSUER_TAX_ID,
            columns::ACCESS_KEY,
            columns::NOTE_VALUE,
        ]));
    };

    let target = cnpj.trim();
    let values = headers.decimal_column(value_col);
    let mut report = String::new();
    for row in 0..headers.len() {
        if headers.text(row, tax_col).trim() == target {
            report.push_str(&format!(
                "- Chave de Acesso: {}, Valor: {}\n",
                headers.text(row, key_col),
                format_brl(&values[row])
            ));
        }
    }
    if report.is_empty() {
        return format!("Nenhuma nota fiscal encontrada para o CNPJ Emitente '{cnpj}'.");
    }
    format!("Notas Fiscais emitidas por '{cnpj}':\n\n{report}")
}

/// Top N recipient names by accumulated invoice value.
pub fn analyze_top_recipients_by_value(headers: &DataTable, top_n: usize) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(name_col), Some(value_col)) = (
        headers.column_index(columns::RECIPIENT_NAME),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(
            &headers.missing_columns(&[columns::RECIPIENT_NAME, columns::NOTE_VALUE]),
        );
    };

    let mut ranked: Vec<(String, BigDecimal)> =
        group_sum(headers, name_col, value_col).into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(top_n);
    if ranked.is_empty() {
        return "Nenhum destinatário encontrado.".to_string();
    }

    let mut report = format!(
        "Top {top_n} Nomes de Destinatários por Valor Total de Notas Fiscais Recebidas:\n\n"
    );
    for (name, total) in &ranked {
        report.push_str(&format!("- {}: {}\n", name, format_brl(total)));
    }
    report
}

/// Invoice count per recipient state.
pub fn count_notes_by_uf_recipient(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(state_col) = headers.column_index(columns::RECIPIENT_STATE) else {
        return single_missing(columns::RECIPIENT_STATE);
    };

    let counts = value_counts(headers, state_col);
    if counts.is_empty() {
        return "Nenhuma UF de destinatário encontrada.".to_string();
    }
    let mut report = String::from("Contagem de Notas Fiscais por UF Destinatário:\n\n");
    for (state, count) in &counts {
        report.push_str(&format!("- {state}: {count} notas\n"));
    }
    report
}

/// Invoice count per recipient municipality.
pub fn count_notes_by_municipio_recipient(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(city_col) = headers.column_index(columns::RECIPIENT_CITY) else {
        return single_missing(columns::RECIPIENT_CITY);
    };

    let counts = value_counts(headers, city_col);
    if counts.is_empty() {
        return "Nenhum município destinatário encontrado.".to_string();
    }
    let mut report = String::from("Contagem de Notas Fiscais por Município Destinatário:\n\n");
    for (city, count) in &counts {
        report.push_str(&format!("- {city}: {count} notas\n"));
    }
    report
}

/// Total invoice value bucketed by emission year-month, chronological.
pub fn total_value_by_month(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(date_col), Some(value_col)) = (
        headers.column_index(columns::ISSUE_DATE),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(&headers.missing_columns(&[columns::ISSUE_DATE, columns::NOTE_VALUE]));
    };

    let values = headers.decimal_column(value_col);
    let mut monthly: BTreeMap<String, BigDecimal> = BTreeMap::new();
    for row in 0..headers.len() {
        let Some(datetime) = parse_emission(headers.text(row, date_col)) else {
            continue;
        };
        let bucket = datetime.format("%Y-%m").to_string();
        *monthly.entry(bucket).or_insert_with(BigDecimal::zero) += &values[row];
    }
    if monthly.is_empty() {
        return "Não há dados de emissão válidos para análise temporal.".to_string();
    }

    let mut report = String::from("Valor Total das Notas Fiscais por Mês:\n\n");
    for (month, total) in &monthly {
        report.push_str(&format!("- {}: {}\n", month, format_brl(total)));
    }
    report
}

/// Invoices emitted on one specific date (date component only).
pub fn count_notes_by_specific_date(headers: &DataTable, date_str: &str) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(date_col) = headers.column_index(columns::ISSUE_DATE) else {
        return single_missing(columns::ISSUE_DATE);
    };

    let Ok(target) = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d") else {
        return format!("Formato de data inválido: {date_str}. Use 'YYYY-MM-DD'.");
    };

    let count = (0..headers.len())
        .filter_map(|row| parse_emission(headers.text(row, date_col)))
        .filter(|datetime| datetime.date() == target)
        .count();
    format!("Foram emitidas {count} notas fiscais no dia {date_str}.")
}

/// Weekday with the most emissions.
pub fn day_of_week_highest_emission(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(date_col) = headers.column_index(columns::ISSUE_DATE) else {
        return single_missing(columns::ISSUE_DATE);
    };

    let mut counts: IndexMap<&'static str, usize> = IndexMap::new();
    for row in 0..headers.len() {
        if let Some(datetime) = parse_emission(headers.text(row, date_col)) {
            *counts.entry(weekday_name_pt(datetime.weekday())).or_insert(0) += 1;
        }
    }
    let Some((day, count)) = counts.iter().max_by_key(|(_, count)| *count) else {
        return "Não há dados de emissão válidos para análise.".to_string();
    };
    format!("O dia da semana com o maior número de emissões de notas é {day} com {count} notas.")
}

/// Invoice count per operation nature.
pub fn count_notes_by_natureza_operacao(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let Some(nature_col) = headers.column_index(columns::OPERATION_NATURE) else {
        return single_missing(columns::OPERATION_NATURE);
    };

    let counts = value_counts(headers, nature_col);
    if counts.is_empty() {
        return "Nenhuma natureza da operação encontrada.".to_string();
    }
    let mut report = String::from("Contagem de Notas Fiscais por Natureza da Operação:\n\n");
    for (nature, count) in &counts {
        report.push_str(&format!("- {nature}: {count} notas\n"));
    }
    report
}

/// Total invoice value for natures matching a case-insensitive substring.
pub fn total_value_by_natureza_operacao(headers: &DataTable, natureza: &str) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(nature_col), Some(value_col)) = (
        headers.column_index(columns::OPERATION_NATURE),
        headers.column_index(columns::NOTE_VALUE),
    ) else {
        return missing_message(
            &headers.missing_columns(&[columns::OPERATION_NATURE, columns::NOTE_VALUE]),
        );
    };

    let needle = natureza.trim().to_lowercase();
    let values = headers.decimal_column(value_col);
    let mut total = BigDecimal::zero();
    let mut matched = false;
    for row in 0..headers.len() {
        if headers.text(row, nature_col).to_lowercase().contains(&needle) {
            total += &values[row];
            matched = true;
        }
    }
    if !matched {
        return format!("Nenhuma nota fiscal encontrada para a natureza da operação '{natureza}'.");
    }
    format!(
        "O valor total das notas fiscais para a natureza da operação '{natureza}' é {}.",
        format_brl(&total)
    )
}

/// Invoices with a negative declared total.
pub fn find_negative_value_notes(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(value_col), Some(key_col)) = (
        headers.column_index(columns::NOTE_VALUE),
        headers.column_index(columns::ACCESS_KEY),
    ) else {
        return missing_message(&headers.missing_columns(&[columns::NOTE_VALUE, columns::ACCESS_KEY]));
    };

    let values = headers.decimal_column(value_col);
    let mut report = String::new();
    for (row, value) in values.iter().enumerate() {
        if *value < BigDecimal::zero() {
            report.push_str(&format!(
                "- Chave de Acesso: {}, Valor: {}\n",
                headers.text(row, key_col),
                format_brl(value)
            ));
        }
    }
    if report.is_empty() {
        return "Nenhuma nota fiscal encontrada com valor total negativo.".to_string();
    }
    format!("Notas Fiscais com VALOR NOTA FISCAL negativo:\n\n{report}")
}

/// Invoice numbers shared by more than one note, with all their access keys.
pub fn find_duplicate_note_numbers(headers: &DataTable) -> String {
    if headers.is_empty() {
        return UNAVAILABLE.to_string();
    }
    let (Some(number_col), Some(key_col)) = (
        headers.column_index(columns::NOTE_NUMBER),
        headers.column_index(columns::ACCESS_KEY),
    ) else {
        return missing_message(&headers.missing_columns(&[columns::NOTE_NUMBER, columns::ACCESS_KEY]));
    };

    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in 0..headers.len() {
        groups
            .entry(headers.text(row, number_col).to_string())
            .or_default()
            .push(headers.text(row, key_col).to_string());
    }

    let mut report = String::new();
    for (number, keys) in &groups {
        if keys.len() > 1 {
            report.push_str(&format!(
                "- Número: {}, Chaves de Acesso: {}\n",
                number,
                keys.join(", ")
            ));
        }
    }
    if report.is_empty() {
        return "Nenhum número de nota fiscal duplicado encontrado.".to_string();
    }
    format!("Notas Fiscais com NÚMERO duplicado:\n\n{report}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_table(rows: &[(&str, &str, &str, &str)]) -> DataTable {
        // (key, number, issuer name, value)
        let mut table = DataTable::new(vec![
            columns::ACCESS_KEY.to_string(),
            columns::NOTE_NUMBER.to_string(),
            columns::ISSUER_NAME.to_string(),
            columns::NOTE_VALUE.to_string(),
        ]);
        for (key, number, name, value) in rows {
            table.push_row(vec![
                key.to_string(),
                number.to_string(),
                name.to_string(),
                value.to_string(),
            ]);
        }
        table
    }

    fn dated_table(rows: &[(&str, &str)]) -> DataTable {
        // (emission date, value)
        let mut table = DataTable::new(vec![
            columns::ISSUE_DATE.to_string(),
            columns::NOTE_VALUE.to_string(),
        ]);
        for (date, value) in rows {
            table.push_row(vec![date.to_string(), value.to_string()]);
        }
        table
    }

    #[test]
    fn empty_table_reports_unavailable_everywhere() {
        let empty = DataTable::new(vec![columns::NOTE_VALUE.to_string()]);
        assert_eq!(analyze_top_emitters_by_value(&empty, 5), UNAVAILABLE);
        assert_eq!(count_notes_by_uf_emitter(&empty), UNAVAILABLE);
        assert_eq!(total_value_by_month(&empty), UNAVAILABLE);
        assert_eq!(find_duplicate_note_numbers(&empty), UNAVAILABLE);
    }

    #[test]
    fn missing_columns_are_named_precisely() {
        let mut table = DataTable::new(vec![columns::ISSUER_NAME.to_string()]);
        table.push_row(vec!["ACME".to_string()]);
        assert_eq!(
            analyze_top_emitters_by_value(&table, 5),
            format!("Colunas necessárias ausentes: {}", columns::NOTE_VALUE)
        );
        assert_eq!(
            count_notes_by_uf_emitter(&table),
            format!("Coluna '{}' ausente.", columns::ISSUER_STATE)
        );
    }

    #[test]
    fn top_emitters_rank_descending_and_truncate() {
        let table = header_table(&[
            ("A", "1", "Alfa", "100.00"),
            ("B", "2", "Beta", "300.00"),
            ("C", "3", "Alfa", "50.00"),
            ("D", "4", "Gama", "200.00"),
        ]);
        let report = analyze_top_emitters_by_value(&table, 2);
        let lines: Vec<&str> = report.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(lines, vec!["- Beta: R$ 300.00", "- Gama: R$ 200.00"]);
    }

    #[test]
    fn malformed_value_counts_as_zero_in_sums() {
        let table = header_table(&[("A", "1", "Alfa", "oops"), ("B", "2", "Alfa", "10.00")]);
        let report = analyze_top_emitters_by_value(&table, 5);
        assert!(report.contains("- Alfa: R$ 10.00"));
    }

    #[test]
    fn duplicate_numbers_group_every_access_key() {
        let table = header_table(&[
            ("K1", "77", "Alfa", "1.00"),
            ("K2", "78", "Beta", "1.00"),
            ("K3", "77", "Gama", "1.00"),
        ]);
        let report = find_duplicate_note_numbers(&table);
        assert!(report.contains("- Número: 77, Chaves de Acesso: K1, K3"));
        assert!(!report.contains("78"));
    }

    #[test]
    fn no_duplicates_yields_the_empty_result_message() {
        let table = header_table(&[("K1", "1", "Alfa", "1.00"), ("K2", "2", "Beta", "1.00")]);
        assert_eq!(
            find_duplicate_note_numbers(&table),
            "Nenhum número de nota fiscal duplicado encontrado."
        );
    }

    #[test]
    fn negative_notes_are_listed_with_key_and_value() {
        let table = header_table(&[("K1", "1", "Alfa", "-12.50"), ("K2", "2", "Beta", "3.00")]);
        let report = find_negative_value_notes(&table);
        assert!(report.contains("- Chave de Acesso: K1, Valor: R$ -12.50"));
        assert!(!report.contains("K2"));
    }

    #[test]
    fn monthly_totals_are_chronological_and_skip_bad_dates() {
        let table = dated_table(&[
            ("2024-02-10", "5.00"),
            ("2024-01-05 08:30:00", "10.00"),
            ("not a date", "99.00"),
            ("2024-01-20", "2.50"),
        ]);
        let report = total_value_by_month(&table);
        let lines: Vec<&str> = report.lines().filter(|l| l.starts_with('-')).collect();
        assert_eq!(lines, vec!["- 2024-01: R$ 12.50", "- 2024-02: R$ 5.00"]);
    }

    #[test]
    fn specific_date_count_ignores_the_time_component() {
        let table = dated_table(&[
            ("2024-01-05 08:30:00", "1.00"),
            ("2024-01-05", "1.00"),
            ("2024-01-06", "1.00"),
        ]);
        assert_eq!(
            count_notes_by_specific_date(&table, "2024-01-05"),
            "Foram emitidas 2 notas fiscais no dia 2024-01-05."
        );
        assert!(count_notes_by_specific_date(&table, "05/01/2024")
            .starts_with("Formato de data inválido"));
    }

    #[test]
    fn weekday_with_most_emissions_uses_portuguese_names() {
        // 2024-01-01 was a Monday
        let table = dated_table(&[
            ("2024-01-01", "1.00"),
            ("2024-01-08", "1.00"),
            ("2024-01-02", "1.00"),
        ]);
        assert_eq!(
            day_of_week_highest_emission(&table),
            "O dia da semana com o maior número de emissões de notas é Segunda-feira com 2 notas."
        );
    }

    #[test]
    fn nature_filter_is_a_case_insensitive_substring_match() {
        let mut table = DataTable::new(vec![
            columns::OPERATION_NATURE.to_string(),
            columns::NOTE_VALUE.to_string(),
        ]);
        table.push_row(vec!["VENDA DE MERCADORIA".to_string(), "10.00".to_string()]);
        table.push_row(vec!["Devolução de venda".to_string(), "4.00".to_string()]);
        table.push_row(vec!["TRANSFERÊNCIA".to_string(), "99.00".to_string()]);

        let report = total_value_by_natureza_operacao(&table, "venda");
        assert!(report.contains("R$ 14.00"));
        assert!(total_value_by_natureza_operacao(&table, "importação")
            .starts_with("Nenhuma nota fiscal encontrada"));
    }

    #[test]
    fn cnpj_listing_matches_exactly() {
        let mut table = DataTable::new(vec![
            columns::ACCESS_KEY.to_string(),
            columns::ISSUER_TAX_ID.to_string(),
            columns::NOTE_VALUE.to_string(),
        ]);
        table.push_row(vec!["K1".to_string(), "123".to_string(), "10.00".to_string()]);
        table.push_row(vec!["K2".to_string(), "1234".to_string(), "20.00".to_string()]);

        let report = list_notes_by_cnpj_emitter(&table, "123");
        assert!(report.contains("- Chave de Acesso: K1, Valor: R$ 10.00"));
        assert!(!report.contains("K2"));
    }
}
