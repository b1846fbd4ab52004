use crate::data::{extract_zip, find_data_files, save_upload};
use crate::error::Result;
use crate::service::AgentService;
use axum::{
    extract::{Json, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing::info;

/// One upload session. The `TempDir` guard owns the extracted files:
/// replacing or clearing the session deletes them.
pub struct Session {
    pub dir: PathBuf,
    _guard: TempDir,
}

/// Shared state: the agent plus at most one active session.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<AgentService>,
    pub session: Arc<Mutex<Option<Session>>>,
}

impl AppState {
    pub fn new(agent: Arc<AgentService>) -> Self {
        Self {
            agent,
            session: Arc::new(Mutex::new(None)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub success: bool,
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct ClearResponse {
    pub success: bool,
    pub message: String,
}

/// Health check
pub async fn health_check() -> &'static str {
    "OK"
}

/// Receives a ZIP of the two datasets and opens a fresh session.
pub async fn upload_archive(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let mut archive_bytes: Option<Vec<u8>> = None;
    loop {
        match multipart.next_field().await {
            Ok(Some(field)) => {
                if field.name() != Some("file") && field.file_name().is_none() {
                    continue;
                }
                match field.bytes().await {
                    Ok(bytes) => {
                        archive_bytes = Some(bytes.to_vec());
                        break;
                    }
                    Err(e) => {
                        return upload_error(
                            StatusCode::BAD_REQUEST,
                            format!("Falha ao ler o upload: {e}"),
                        )
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                return upload_error(
                    StatusCode::BAD_REQUEST,
                    format!("Requisição multipart inválida: {e}"),
                )
            }
        }
    }
    let Some(bytes) = archive_bytes else {
        return upload_error(
            StatusCode::BAD_REQUEST,
            "Nenhum arquivo 'file' presente no upload.".to_string(),
        );
    };

    let session = match build_session(&bytes) {
        Ok(session) => session,
        Err(e) => {
            return upload_error(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Erro ao extrair o arquivo: {e}"),
            )
        }
    };

    let files: Vec<String> = find_data_files(&session.dir)
        .unwrap_or_default()
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .map(str::to_string)
        .collect();
    info!("Session opened with {} data files", files.len());

    // replacing the previous session drops its temp directory
    *state.session.lock().await = Some(session);

    let response = UploadResponse {
        success: true,
        message: "Arquivo carregado!".to_string(),
        files,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Answers one free-text question against the active session.
pub async fn ask(State(state): State<AppState>, Json(req): Json<AskRequest>) -> Response {
    let data_dir = state.session.lock().await.as_ref().map(|s| s.dir.clone());
    let Some(data_dir) = data_dir else {
        let response = AskResponse {
            success: false,
            answer: "Faça upload de um arquivo ZIP antes de enviar perguntas.".to_string(),
        };
        return (StatusCode::OK, Json(response)).into_response();
    };

    // analysis and engine failures already degrade to text inside the agent
    let answer = state.agent.answer(&req.question, &data_dir).await;
    let response = AskResponse {
        success: true,
        answer,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Discards the active session and its extracted files.
pub async fn clear_session(State(state): State<AppState>) -> Response {
    let cleared = state.session.lock().await.take().is_some();
    let message = if cleared {
        "Histórico e arquivos limpos!"
    } else {
        "Nenhuma sessão ativa."
    };
    let response = ClearResponse {
        success: true,
        message: message.to_string(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

fn build_session(bytes: &[u8]) -> Result<Session> {
    let (guard, zip_path) = save_upload(bytes)?;
    let dir = extract_zip(&zip_path)?;
    Ok(Session { dir, _guard: guard })
}

fn upload_error(status: StatusCode, message: String) -> Response {
    let response = UploadResponse {
        success: false,
        message,
        files: Vec::new(),
    };
    (status, Json(response)).into_response()
}
