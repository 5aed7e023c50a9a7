use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// 订单-号码关联实体
/// (order_id, ticket_id) 唯一；一张票同一时刻至多出现在一个未释放的订单里
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "order_tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub order_id: i64,
    pub ticket_id: i64,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
