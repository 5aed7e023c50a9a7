use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(20))")]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    #[sea_orm(string_value = "text")]
    Text,
    #[sea_orm(string_value = "number_selection")]
    NumberSelection,
    #[sea_orm(string_value = "image")]
    Image,
    #[sea_orm(string_value = "document")]
    Document,
    #[sea_orm(string_value = "other")]
    Other,
}

impl MessageKind {
    /// 是否携带可作为支付凭证的媒体
    pub fn is_media(&self) -> bool {
        matches!(self, MessageKind::Image | MessageKind::Document)
    }
}

/// 入站消息实体
/// wa_message_id 全局唯一；processed + outcome 共同构成幂等回放的依据
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "inbound_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub wa_message_id: String,
    pub contact_id: i64,
    pub kind: MessageKind,
    pub text: Option<String>,
    pub media_id: Option<String>,
    pub raw_payload: Option<Json>,
    /// 首次处理的结果快照，重复投递时原样返回
    pub outcome: Option<Json>,
    pub processed: bool,
    pub received_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
