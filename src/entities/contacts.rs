use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 会话状态机的七个状态
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(30))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContactState {
    #[sea_orm(string_value = "MENU")]
    Menu,
    #[sea_orm(string_value = "CHOOSE_MODE")]
    ChooseMode,
    #[sea_orm(string_value = "ASK_QTY")]
    AskQty,
    #[sea_orm(string_value = "ASK_PICK_NUMBERS")]
    AskPickNumbers,
    #[sea_orm(string_value = "CONFIRM_RESERVATION")]
    ConfirmReservation,
    #[sea_orm(string_value = "WAIT_PROOF")]
    WaitProof,
    #[sea_orm(string_value = "DONE")]
    Done,
}

impl std::fmt::Display for ContactState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContactState::Menu => "MENU",
            ContactState::ChooseMode => "CHOOSE_MODE",
            ContactState::AskQty => "ASK_QTY",
            ContactState::AskPickNumbers => "ASK_PICK_NUMBERS",
            ContactState::ConfirmReservation => "CONFIRM_RESERVATION",
            ContactState::WaitProof => "WAIT_PROOF",
            ContactState::Done => "DONE",
        };
        write!(f, "{s}")
    }
}

/// 联系人实体
/// context 列保存 ConversationContext 的 JSON 快照，每次状态转移整体替换
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "contacts")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub wa_id: String,
    pub name: Option<String>,
    pub state: ContactState,
    pub context: Json,
    pub last_interaction_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
