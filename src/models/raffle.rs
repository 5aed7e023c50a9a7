use crate::entities::raffle_entity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RaffleResponse {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub ticket_price_cents: i64,
    pub currency: String,
    pub is_active: bool,
    pub min_number: i64,
    pub max_number: i64,
    pub total_tickets: i64,
    pub available_count: i64,
    pub reserved_count: i64,
    pub sold_count: i64,
    pub draw_date: Option<DateTime<Utc>>,
    pub winner_number: Option<i64>,
}

impl RaffleResponse {
    pub fn from_model_with_counts(
        m: raffle_entity::Model,
        available: i64,
        reserved: i64,
        sold: i64,
    ) -> Self {
        let total = m.total_tickets();
        Self {
            id: m.id,
            title: m.title,
            description: m.description,
            ticket_price_cents: m.ticket_price_cents,
            currency: m.currency,
            is_active: m.is_active,
            min_number: m.min_number,
            max_number: m.max_number,
            total_tickets: total,
            available_count: available,
            reserved_count: reserved,
            sold_count: sold,
            draw_date: m.draw_date,
            winner_number: m.winner_number,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RaffleListQuery {
    /// 默认只列活动中的
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRaffleRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub ticket_price_cents: i64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub min_number: Option<i64>,
    pub max_number: i64,
    #[serde(default)]
    pub draw_date: Option<DateTime<Utc>>,
}

/// 只读可用性查询结果（仅反映已提交状态）
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityResponse {
    pub raffle_id: i64,
    pub total_tickets: i64,
    pub available_count: i64,
    pub reserved_count: i64,
    pub sold_count: i64,
    pub available_numbers: Vec<i64>,
}
