use crate::entities::{raffle_entity, ticket_entity, TicketStatus};
use crate::error::{AppError, AppResult};
use crate::models::{AvailabilityResponse, CreateRaffleRequest, RaffleResponse};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

/// 活动读写与号码生成。号码票的状态变更不在此处，归预订引擎独占。
#[derive(Clone)]
pub struct RaffleService {
    pool: DatabaseConnection,
}

impl RaffleService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    /// 创建活动并一次性生成号码票（号码之后不再补发或重编）
    pub async fn create_raffle(&self, req: CreateRaffleRequest) -> AppResult<RaffleResponse> {
        let min_number = req.min_number.unwrap_or(1);
        if min_number < 1 {
            return Err(AppError::ValidationError(
                "min_number must be at least 1".to_string(),
            ));
        }
        if req.max_number < min_number {
            return Err(AppError::ValidationError(
                "max_number must be greater than or equal to min_number".to_string(),
            ));
        }
        if req.ticket_price_cents <= 0 {
            return Err(AppError::ValidationError(
                "ticket_price_cents must be positive".to_string(),
            ));
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let raffle = raffle_entity::ActiveModel {
            title: Set(req.title),
            description: Set(req.description.unwrap_or_default()),
            ticket_price_cents: Set(req.ticket_price_cents),
            currency: Set(req.currency.unwrap_or_else(|| "USD".to_string())),
            is_active: Set(true),
            min_number: Set(min_number),
            max_number: Set(req.max_number),
            draw_date: Set(req.draw_date),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let generated = self.generate_tickets_tx(&txn, &raffle).await?;
        txn.commit().await?;

        log::info!(
            "Created raffle {} \"{}\" with {} ticket(s)",
            raffle.id,
            raffle.title,
            generated
        );

        let total = raffle.total_tickets();
        Ok(RaffleResponse::from_model_with_counts(raffle, total, 0, 0))
    }

    /// 活动列表（含各状态号码数）
    pub async fn list_raffles(&self, active_only: bool) -> AppResult<Vec<RaffleResponse>> {
        let txn = self.pool.begin().await?;

        let mut query = raffle_entity::Entity::find();
        if active_only {
            query = query.filter(raffle_entity::Column::IsActive.eq(true));
        }
        let raffles = query
            .order_by_desc(raffle_entity::Column::CreatedAt)
            .all(&txn)
            .await?;

        let mut items = Vec::with_capacity(raffles.len());
        for raffle in raffles {
            let (available, reserved, sold) = self.counts_tx(&txn, raffle.id).await?;
            items.push(RaffleResponse::from_model_with_counts(
                raffle, available, reserved, sold,
            ));
        }

        txn.commit().await?;
        Ok(items)
    }

    /// 只读可用性查询：仅反映已提交状态（事务内一致性快照）
    pub async fn availability(&self, raffle_id: i64) -> AppResult<AvailabilityResponse> {
        let txn = self.pool.begin().await?;

        let raffle = raffle_entity::Entity::find_by_id(raffle_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Raffle {raffle_id}")))?;

        let (available, reserved, sold) = self.counts_tx(&txn, raffle.id).await?;

        let available_numbers: Vec<i64> = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::RaffleId.eq(raffle.id))
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Available))
            .order_by_asc(ticket_entity::Column::Number)
            .all(&txn)
            .await?
            .into_iter()
            .map(|t| t.number)
            .collect();

        txn.commit().await?;

        Ok(AvailabilityResponse {
            raffle_id: raffle.id,
            total_tickets: raffle.total_tickets(),
            available_count: available,
            reserved_count: reserved,
            sold_count: sold,
            available_numbers,
        })
    }

    // -----------------------------
    // 会话状态机使用的事务内读取
    // -----------------------------

    /// 菜单展示的活动列表（最新的前 10 个）
    pub(crate) async fn list_active_tx(
        &self,
        txn: &DatabaseTransaction,
    ) -> AppResult<Vec<raffle_entity::Model>> {
        let raffles = raffle_entity::Entity::find()
            .filter(raffle_entity::Column::IsActive.eq(true))
            .order_by_desc(raffle_entity::Column::CreatedAt)
            .limit(10)
            .all(txn)
            .await?;
        Ok(raffles)
    }

    pub(crate) async fn get_active_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
    ) -> AppResult<Option<raffle_entity::Model>> {
        let raffle = raffle_entity::Entity::find_by_id(raffle_id)
            .filter(raffle_entity::Column::IsActive.eq(true))
            .one(txn)
            .await?;
        Ok(raffle)
    }

    pub(crate) async fn counts_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
    ) -> AppResult<(i64, i64, i64)> {
        let available = self.count_status_tx(txn, raffle_id, TicketStatus::Available).await?;
        let reserved = self.count_status_tx(txn, raffle_id, TicketStatus::Reserved).await?;
        let sold = self.count_status_tx(txn, raffle_id, TicketStatus::Sold).await?;
        Ok((available, reserved, sold))
    }

    async fn count_status_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
        status: TicketStatus,
    ) -> AppResult<i64> {
        let count = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::RaffleId.eq(raffle_id))
            .filter(ticket_entity::Column::Status.eq(status))
            .count(txn)
            .await?;
        Ok(count as i64)
    }

    /// 批量生成号码票
    async fn generate_tickets_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle: &raffle_entity::Model,
    ) -> AppResult<i64> {
        let now = Utc::now();
        let models: Vec<ticket_entity::ActiveModel> = (raffle.min_number..=raffle.max_number)
            .map(|number| ticket_entity::ActiveModel {
                raffle_id: Set(raffle.id),
                number: Set(number),
                status: Set(TicketStatus::Available),
                created_at: Set(Some(now)),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .collect();

        let total = models.len() as i64;
        // 分批插入，避免超出 SQLite 绑定参数上限
        for chunk in models.chunks(200) {
            ticket_entity::Entity::insert_many(chunk.to_vec())
                .exec(txn)
                .await?;
        }
        Ok(total)
    }
}
