use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 抽奖活动实体
/// 概念说明:
/// - ticket_price_cents: 单个号码价格（美分等最小货币单位）
/// - [min_number, max_number]: 号码闭区间，号码只生成一次且不再变动
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "raffles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub title: String,
    pub description: String,
    /// 单价（最小货币单位）
    pub ticket_price_cents: i64,
    /// ISO-4217 货币代码
    pub currency: String,
    pub is_active: bool,
    pub min_number: i64,
    pub max_number: i64,
    pub draw_date: Option<DateTime<Utc>>,
    pub winner_number: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// 号码总数 (闭区间)
    pub fn total_tickets(&self) -> i64 {
        self.max_number - self.min_number + 1
    }

    /// 号码是否落在活动范围内
    pub fn contains_number(&self, number: i64) -> bool {
        number >= self.min_number && number <= self.max_number
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
