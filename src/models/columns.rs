//! Exact column names of the two NF-e datasets (accent-sensitive).

// Header dataset (Cabecalho)
pub const ACCESS_KEY: &str = "CHAVE DE ACESSO";
pub const NOTE_NUMBER: &str = "NÚMERO";
pub const NOTE_VALUE: &str = "VALOR NOTA FISCAL";
pub const ISSUE_DATE: &str = "DATA EMISSÃO";
pub const ISSUER_NAME: &str = "RAZÃO SOCIAL EMITENTE";
pub const ISSUER_TAX_ID: &str = "CPF/CNPJ Emitente";
pub const ISSUER_STATE: &str = "UF EMITENTE";
pub const ISSUER_CITY: &str = "MUNICÍPIO EMITENTE";
pub const RECIPIENT_NAME: &str = "NOME DESTINATÁRIO";
pub const RECIPIENT_STATE: &str = "UF DESTINATÁRIO";
pub const RECIPIENT_CITY: &str = "MUNICÍPIO DESTINATÁRIO";
pub const OPERATION_NATURE: &str = "NATUREZA DA OPERAÇÃO";

// Item dataset (Itens) — the source data carries two NCM spellings
pub const ITEM_DESCRIPTION: &str = "DESCRIÇÃO DO PRODUTO/SERVIÇO";
pub const ITEM_NCM_TYPE: &str = "NCM/SH (TIPO DE PRODUTO)";
pub const ITEM_NCM_CODE: &str = "CÓDIGO NCM/SH";
pub const ITEM_QUANTITY: &str = "QUANTIDADE";
pub const ITEM_UNIT_VALUE: &str = "VALOR UNITÁRIO";
pub const ITEM_TOTAL: &str = "VALOR TOTAL";
