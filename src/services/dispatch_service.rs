use crate::entities::{contact_entity, inbound_message_entity, ContactState};
use crate::error::{AppError, AppResult, ReservationError};
use crate::models::{DispatchOutcome, InboundEventRequest, Prompt};
use crate::services::FlowService;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, QueryFilter, Set, SqlErr, TransactionTrait,
};
use serde_json::json;

/// 分发器（幂等闸）：按 wa_message_id 去重后才把事件交给会话状态机。
///
/// {去重检查, 联系人获取/创建, 状态机转移, 结果落盘, 标记已处理}
/// 是同一个事务：中途崩溃则整体回滚，重投递时照常重新处理，
/// 不会出现"状态机跑了但未标记已处理"的静默丢失。
#[derive(Clone)]
pub struct DispatchService {
    pool: DatabaseConnection,
    flow_service: FlowService,
}

impl DispatchService {
    /// 与在途的同 id 投递竞争时的等待重试次数
    const MAX_RACE_RETRIES: u32 = 3;

    pub fn new(pool: DatabaseConnection, flow_service: FlowService) -> Self {
        Self { pool, flow_service }
    }

    pub async fn dispatch(&self, event: &InboundEventRequest) -> AppResult<DispatchOutcome> {
        let mut attempts = 0;
        loop {
            attempts += 1;

            let txn = self.pool.begin().await?;

            // 去重：同 id 已处理过则原样回放首次结果，不再触发任何副作用
            if let Some(existing) = inbound_message_entity::Entity::find()
                .filter(
                    inbound_message_entity::Column::WaMessageId.eq(event.wa_message_id.clone()),
                )
                .one(&txn)
                .await?
            {
                txn.rollback().await?;
                if existing.processed {
                    log::info!("Duplicate message ignored: {}", event.wa_message_id);
                    let prompt = Self::replay_outcome(&existing)?;
                    return Ok(DispatchOutcome {
                        duplicate: true,
                        prompt,
                    });
                }
                // 未处理的同 id 行只可能来自在途的并发投递；等它提交后回放
                if attempts <= Self::MAX_RACE_RETRIES {
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    continue;
                }
                return Err(ReservationError::TransientConflict.into());
            }

            let contact = self.get_or_create_contact(&txn, event).await?;

            // 入站消息落库；唯一索引兜底并发重复投递
            let inbound = inbound_message_entity::ActiveModel {
                wa_message_id: Set(event.wa_message_id.clone()),
                contact_id: Set(contact.id),
                kind: Set(event.kind),
                text: Set(event.text.clone()),
                media_id: Set(event.media_id.clone()),
                raw_payload: Set(event.payload.clone()),
                processed: Set(false),
                received_at: Set(Some(Utc::now())),
                ..Default::default()
            }
            .insert(&txn)
            .await;

            let inbound = match inbound {
                Ok(m) => m,
                Err(e) if Self::is_unique_violation(&e) => {
                    // 输给了并发的同 id 投递；重读赢家的结果
                    txn.rollback().await?;
                    if attempts <= Self::MAX_RACE_RETRIES {
                        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                        continue;
                    }
                    return Err(ReservationError::TransientConflict.into());
                }
                Err(e) => return Err(e.into()),
            };

            // 会话状态机转移（引擎调用在其内部以保存点隔离）
            let prompt = self
                .flow_service
                .handle_event_tx(&txn, &contact, event)
                .await?;

            // 结果 + 已处理标记与转移同一事务提交
            let mut am = inbound.into_active_model();
            am.processed = Set(true);
            am.outcome = Set(Some(serde_json::to_value(&prompt)?));
            am.update(&txn).await?;

            txn.commit().await?;

            return Ok(DispatchOutcome {
                duplicate: false,
                prompt,
            });
        }
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    async fn get_or_create_contact(
        &self,
        txn: &DatabaseTransaction,
        event: &InboundEventRequest,
    ) -> AppResult<contact_entity::Model> {
        if let Some(contact) = contact_entity::Entity::find()
            .filter(contact_entity::Column::WaId.eq(event.wa_id.clone()))
            .one(txn)
            .await?
        {
            return Ok(contact);
        }

        let now = Utc::now();
        let contact = contact_entity::ActiveModel {
            wa_id: Set(event.wa_id.clone()),
            name: Set(event.name.clone()),
            state: Set(ContactState::Menu),
            context: Set(json!({})),
            last_interaction_at: Set(Some(now)),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(txn)
        .await?;

        log::info!("New contact created: {}", contact.wa_id);
        Ok(contact)
    }

    fn replay_outcome(existing: &inbound_message_entity::Model) -> AppResult<Prompt> {
        match existing.outcome.as_ref() {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            // processed 置位而 outcome 缺失在单事务写入下不应出现
            None => Err(AppError::InternalError(format!(
                "Processed message {} has no recorded outcome",
                existing.wa_message_id
            ))),
        }
    }

    fn is_unique_violation(err: &DbErr) -> bool {
        matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
    }
}
