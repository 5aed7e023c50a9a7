use sea_orm::entity::prelude::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;

/// 选号方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    Pick,
    Random,
}

/// 会话上下文
/// 固定字段的可选并集而不是开放的字符串映射，非法组合无从表示。
/// 每次状态转移将整个快照替换写回 contacts.context，不做合并。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ConversationContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raffle_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<SelectionMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qty: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft_order_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_numbers: Option<Vec<i64>>,
}

impl ConversationContext {
    /// 从存储的 JSON 快照还原；无法解析的历史数据退化为空上下文
    pub fn from_json(value: &Json) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or_else(|_| json!({}))
    }
}
