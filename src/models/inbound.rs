use crate::entities::MessageKind;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 已解码的入站事件
/// 上游保证签名/来源校验已完成；wa_message_id 由消息服务商分配且全局唯一
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InboundEventRequest {
    pub wa_message_id: String,
    pub wa_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub kind: MessageKind,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub media_id: Option<String>,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
}
