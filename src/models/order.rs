use crate::entities::{order_entity, OrderStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: i64,
    pub raffle_id: i64,
    pub contact_id: i64,
    pub qty: i64,
    pub total_amount_cents: i64,
    pub status: OrderStatus,
    pub payment_proof_media_id: Option<String>,
    pub cancel_reason: Option<String>,
    pub ticket_numbers: Vec<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl OrderResponse {
    pub fn from_model_with_numbers(m: order_entity::Model, ticket_numbers: Vec<i64>) -> Self {
        Self {
            id: m.id,
            raffle_id: m.raffle_id,
            contact_id: m.contact_id,
            qty: m.qty,
            total_amount_cents: m.total_amount_cents,
            status: m.status,
            payment_proof_media_id: m.payment_proof_media_id,
            cancel_reason: m.cancel_reason,
            ticket_numbers,
            paid_at: m.paid_at,
            expires_at: m.expires_at,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<OrderStatus>,
    pub raffle_id: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmPaymentRequest {
    #[serde(default)]
    pub payment_proof_media_id: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: Option<String>,
}
