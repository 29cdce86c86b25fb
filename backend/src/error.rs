//! Error handling for the Inventory & Procurement service
//!
//! Provides consistent error responses in English and Indonesian

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::models::ProductionError;
use shared::workflow::WorkflowError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authorization errors
    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Forbidden: {message}")]
    Forbidden {
        message: String,
        message_id: String,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_id: String,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_id: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Field-level validation error with both messages
    pub fn validation(field: &str, message: impl Into<String>, message_id: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_id: message_id.into(),
        }
    }

    /// Field-level error from a shared validation message
    pub fn invalid(field: &str, message: &'static str) -> Self {
        AppError::validation(field, message, indonesian_validation_message(message))
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self, AppError::Forbidden { .. } | AppError::InsufficientPermissions)
    }
}

fn indonesian_validation_message(message: &str) -> String {
    let translated = match message {
        "Quantity must be greater than zero" => "Jumlah harus lebih dari nol",
        "Unit price cannot be negative" => "Harga satuan tidak boleh negatif",
        "Approved quantity cannot exceed requested quantity" => {
            "Jumlah disetujui tidak boleh melebihi jumlah diminta"
        }
        "Received quantity exceeds the approved amount" => {
            "Jumlah diterima melebihi jumlah yang disetujui"
        }
        "Produced quantity cannot be negative" => "Jumlah produksi tidak boleh negatif",
        "Lead time must be at least one day" => "Waktu tunggu minimal satu hari",
        "Lead time cannot exceed one year" => "Waktu tunggu tidak boleh lebih dari satu tahun",
        "A request needs at least one line" => "Pengadaan harus memiliki minimal satu baris",
        "A request cannot mix raw materials and products" => {
            "Pengadaan tidak boleh mencampur bahan baku dan produk"
        }
        "Reason cannot be empty" => "Alasan tidak boleh kosong",
        "Reason must be at most 500 characters" => "Alasan maksimal 500 karakter",
        other => return format!("Data tidak valid: {}", other),
    };
    translated.to_string()
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        match &err {
            WorkflowError::Unauthorized { role, action, status } => AppError::Forbidden {
                message: err.to_string(),
                message_id: format!(
                    "Peran {} tidak boleh {} saat status {}",
                    role.display_name_id(),
                    action,
                    status
                ),
            },
            WorkflowError::SupplierAllocationIncomplete { missing } => AppError::Validation {
                field: "lines".to_string(),
                message: err.to_string(),
                message_id: format!(
                    "{} baris bahan baku belum memiliki pemasok dan harga satuan",
                    missing
                ),
            },
            WorkflowError::InvalidTransition { .. }
            | WorkflowError::Immutable(_)
            | WorkflowError::NotDeletable(_)
            | WorkflowError::HasDependents { .. } => AppError::InvalidStateTransition(err.to_string()),
        }
    }
}

impl From<ProductionError> for AppError {
    fn from(err: ProductionError) -> Self {
        match err {
            ProductionError::NegativeQuantity => AppError::validation(
                "produced_quantity",
                err.to_string(),
                "Jumlah produksi tidak boleh negatif",
            ),
            other => AppError::InvalidStateTransition(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "INSUFFICIENT_PERMISSIONS".to_string(),
                    message_en: "You do not have permission to perform this action".to_string(),
                    message_id: "Anda tidak memiliki izin untuk melakukan tindakan ini".to_string(),
                    field: None,
                },
            ),
            AppError::Forbidden { message, message_id } => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    code: "FORBIDDEN".to_string(),
                    message_en: message.clone(),
                    message_id: message_id.clone(),
                    field: None,
                },
            ),
            AppError::Validation { field, message, message_id } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_id: message_id.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_id: format!("Data tidak valid: {}", msg),
                    field: None,
                },
            ),
            AppError::Conflict { resource, message, message_id } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_id: message_id.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_id: format!("{} tidak ditemukan", resource),
                    field: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_id: format!("Status tidak dapat diubah: {}", msg),
                    field: None,
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_id: format!("Kesalahan konfigurasi: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_id: "Terjadi kesalahan pada basis data".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_id: "Terjadi kesalahan internal pada server".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_id: "Terjadi kesalahan internal pada server".to_string(),
                    field: None,
                },
            ),
        };

        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
