use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// 预订引擎的类型化错误分类
/// 只有 TransientConflict 适合调用方整体重试，其余对本次尝试都是终态
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    #[error("Numbers out of range: {0:?}")]
    OutOfRange(Vec<i64>),

    #[error("Tickets not available: {0:?}")]
    AlreadyTaken(Vec<i64>),

    #[error("No ticket numbers selected")]
    EmptySelection,

    #[error("Only {available} ticket(s) available, requested {requested}")]
    InsufficientAvailability { available: i64, requested: i64 },

    #[error("Raffle not found or is not active")]
    RaffleInactive,

    #[error("Invalid order transition: {0}")]
    InvalidTransition(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Reservation conflict, retry later")]
    TransientConflict,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),
}

impl AppError {
    /// 预订错误若存在则取出，供会话层按分类渲染用户提示
    pub fn as_reservation(&self) -> Option<&ReservationError> {
        match self {
            AppError::Reservation(e) => Some(e),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status_code, error_code, message) = match self {
            AppError::Reservation(res) => {
                let (status, code) = match res {
                    ReservationError::OutOfRange(_) => {
                        (actix_web::http::StatusCode::BAD_REQUEST, "OUT_OF_RANGE")
                    }
                    ReservationError::AlreadyTaken(_) => {
                        (actix_web::http::StatusCode::CONFLICT, "ALREADY_TAKEN")
                    }
                    ReservationError::EmptySelection => {
                        (actix_web::http::StatusCode::BAD_REQUEST, "EMPTY_SELECTION")
                    }
                    ReservationError::InsufficientAvailability { .. } => (
                        actix_web::http::StatusCode::CONFLICT,
                        "INSUFFICIENT_AVAILABILITY",
                    ),
                    ReservationError::RaffleInactive => {
                        (actix_web::http::StatusCode::BAD_REQUEST, "RAFFLE_INACTIVE")
                    }
                    ReservationError::InvalidTransition(_) => {
                        (actix_web::http::StatusCode::CONFLICT, "INVALID_TRANSITION")
                    }
                    ReservationError::NotFound(_) => {
                        (actix_web::http::StatusCode::NOT_FOUND, "NOT_FOUND")
                    }
                    ReservationError::TransientConflict => (
                        actix_web::http::StatusCode::SERVICE_UNAVAILABLE,
                        "TRANSIENT_CONFLICT",
                    ),
                    ReservationError::InvalidQuantity(_) => {
                        (actix_web::http::StatusCode::BAD_REQUEST, "INVALID_QUANTITY")
                    }
                };
                log::warn!("Reservation error: {res}");
                (status, code, res.to_string())
            }
            AppError::ValidationError(msg) => {
                log::warn!("Validation error: {msg}");
                (
                    actix_web::http::StatusCode::BAD_REQUEST,
                    "VALIDATION_ERROR",
                    msg.clone(),
                )
            }
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "NOT_FOUND",
                msg.clone(),
            ),
            AppError::DatabaseError(err) => {
                log::error!("Database error: {err}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error".to_string(),
                )
            }
            _ => {
                log::error!("Internal error: {self}");
                (
                    actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        HttpResponse::build(status_code).json(json!({
            "success": false,
            "error": {
                "code": error_code,
                "message": message
            }
        }))
    }
}
