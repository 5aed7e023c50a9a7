use crate::config::ReservationConfig;
use crate::entities::{
    order_entity, order_ticket_entity, raffle_entity, ticket_entity, OrderStatus, TicketStatus,
};
use crate::error::{AppError, AppResult, ReservationError};
use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::{BTreeSet, HashSet};

/// 预订引擎：独占 Ticket/Order/OrderTicket 的状态变更。
///
/// 并发约束:
/// - 票的占用/释放/售出全部走条件更新 (update ... where status = X)，
///   以 rows_affected 判断是否有人先到，先提交者胜出
/// - 每个公开操作要么整体成功要么无副作用（事务或保存点回滚）
/// - 存储层写冲突 (SQLite busy/locked) 在操作边界有限次整体重试，
///   超限后以 TransientConflict 上浮，由调用方决定是否稍后重试
#[derive(Clone)]
pub struct ReservationService {
    pool: DatabaseConnection,
    config: ReservationConfig,
}

impl ReservationService {
    pub fn new(pool: DatabaseConnection, config: ReservationConfig) -> Self {
        Self { pool, config }
    }

    pub fn ttl_minutes(&self) -> i64 {
        self.config.ttl_minutes
    }

    pub fn min_tickets_per_order(&self) -> i64 {
        self.config.min_tickets_per_order
    }

    pub fn max_tickets_per_order(&self) -> i64 {
        self.config.max_tickets_per_order
    }

    /// 预订指定号码，成功返回 DRAFT 订单（号码已全部转入 RESERVED）
    pub async fn reserve_specific(
        &self,
        raffle_id: i64,
        contact_id: i64,
        numbers: &BTreeSet<i64>,
    ) -> AppResult<order_entity::Model> {
        let mut attempts = 0;
        loop {
            let txn = self.pool.begin().await?;
            match self
                .reserve_specific_tx(&txn, raffle_id, contact_id, numbers)
                .await
            {
                Ok(order) => {
                    txn.commit().await?;
                    log::info!(
                        "Reserved {} specific ticket(s) for contact {} in raffle {} (order {})",
                        order.qty,
                        contact_id,
                        raffle_id,
                        order.id
                    );
                    return Ok(order);
                }
                Err(e) => {
                    txn.rollback().await?;
                    if Self::is_store_conflict(&e) && attempts < self.config.max_conflict_retries {
                        attempts += 1;
                        continue;
                    }
                    return Err(Self::map_store_conflict(e));
                }
            }
        }
    }

    /// 预订随机号码
    pub async fn reserve_random(
        &self,
        raffle_id: i64,
        contact_id: i64,
        qty: i64,
    ) -> AppResult<order_entity::Model> {
        let mut attempts = 0;
        loop {
            let txn = self.pool.begin().await?;
            match self
                .reserve_random_tx(&txn, raffle_id, contact_id, qty)
                .await
            {
                Ok(order) => {
                    txn.commit().await?;
                    log::info!(
                        "Reserved {} random ticket(s) for contact {} in raffle {} (order {})",
                        qty,
                        contact_id,
                        raffle_id,
                        order.id
                    );
                    return Ok(order);
                }
                Err(e) => {
                    txn.rollback().await?;
                    if Self::is_store_conflict(&e) && attempts < self.config.max_conflict_retries {
                        attempts += 1;
                        continue;
                    }
                    return Err(Self::map_store_conflict(e));
                }
            }
        }
    }

    /// 用户确认预订：DRAFT -> PENDING_PAYMENT
    pub async fn mark_pending_payment(&self, order_id: i64) -> AppResult<order_entity::Model> {
        let txn = self.pool.begin().await?;
        match self.mark_pending_payment_tx(&txn, order_id).await {
            Ok(order) => {
                txn.commit().await?;
                Ok(order)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(Self::map_store_conflict(e))
            }
        }
    }

    /// 登记支付凭证（订单保持 PENDING_PAYMENT，等待运营审核）
    pub async fn attach_payment_proof(
        &self,
        order_id: i64,
        media_id: &str,
    ) -> AppResult<order_entity::Model> {
        let txn = self.pool.begin().await?;
        match self.attach_payment_proof_tx(&txn, order_id, media_id).await {
            Ok(order) => {
                txn.commit().await?;
                Ok(order)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(Self::map_store_conflict(e))
            }
        }
    }

    /// 运营确认收款：PENDING_PAYMENT -> PAID，关联号码 RESERVED -> SOLD
    pub async fn confirm_paid(
        &self,
        order_id: i64,
        proof_reference: Option<String>,
    ) -> AppResult<order_entity::Model> {
        let txn = self.pool.begin().await?;
        match self.confirm_paid_tx(&txn, order_id, proof_reference).await {
            Ok(order) => {
                txn.commit().await?;
                log::info!("Order {order_id} confirmed as paid");
                Ok(order)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(Self::map_store_conflict(e))
            }
        }
    }

    /// 取消订单并释放号码。对已取消/已过期订单重复调用视为成功的无操作。
    pub async fn cancel_order(
        &self,
        order_id: i64,
        reason: Option<String>,
    ) -> AppResult<order_entity::Model> {
        let txn = self.pool.begin().await?;
        match self.cancel_order_tx(&txn, order_id, reason).await {
            Ok(order) => {
                txn.commit().await?;
                log::info!("Order {order_id} cancelled");
                Ok(order)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(Self::map_store_conflict(e))
            }
        }
    }

    /// 过期扫描：释放超过保留期的号码，并把被清空的订单翻为 EXPIRED。
    /// 返回释放的号码数。可重入，可与预订并发执行（条件更新保证每张票
    /// 至多被释放一次）。
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let mut attempts = 0;
        loop {
            let txn = self.pool.begin().await?;
            match self.sweep_expired_tx(&txn, now).await {
                Ok(released) => {
                    txn.commit().await?;
                    if released > 0 {
                        log::info!("Expiry sweep released {released} ticket(s)");
                    }
                    return Ok(released);
                }
                Err(e) => {
                    txn.rollback().await?;
                    if Self::is_store_conflict(&e) && attempts < self.config.max_conflict_retries {
                        attempts += 1;
                        continue;
                    }
                    return Err(Self::map_store_conflict(e));
                }
            }
        }
    }

    // -----------------------------
    // 事务内实现（供会话状态机以保存点方式复用）
    // -----------------------------

    pub async fn reserve_specific_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
        contact_id: i64,
        numbers: &BTreeSet<i64>,
    ) -> AppResult<order_entity::Model> {
        if numbers.is_empty() {
            return Err(ReservationError::EmptySelection.into());
        }
        let qty = numbers.len() as i64;
        self.validate_qty(qty)?;

        let raffle = self.active_raffle_tx(txn, raffle_id).await?;

        let out_of_range: Vec<i64> = numbers
            .iter()
            .copied()
            .filter(|n| !raffle.contains_number(*n))
            .collect();
        if !out_of_range.is_empty() {
            return Err(ReservationError::OutOfRange(out_of_range).into());
        }

        let now = Utc::now();
        // 先释放该活动中已过期的预订（订单状态留给扫描任务翻转）
        self.release_expired_tickets_tx(txn, raffle.id, now).await?;

        let expires_at = now + Duration::minutes(self.config.ttl_minutes);
        let order = self
            .insert_draft_order_tx(txn, &raffle, contact_id, qty, expires_at, now)
            .await?;

        let number_list: Vec<i64> = numbers.iter().copied().collect();

        // 条件更新：仅当仍为 AVAILABLE 才占用；行数不足说明有人先到，
        // 整个事务（或保存点）回滚，不产生部分预订
        let updated = ticket_entity::Entity::update_many()
            .set(ticket_entity::ActiveModel {
                status: Set(TicketStatus::Reserved),
                order_id: Set(Some(order.id)),
                reserved_until: Set(Some(expires_at)),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket_entity::Column::RaffleId.eq(raffle.id))
            .filter(ticket_entity::Column::Number.is_in(number_list.clone()))
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Available))
            .exec(txn)
            .await?;

        if updated.rows_affected != qty as u64 {
            let taken = self
                .unavailable_numbers_tx(txn, raffle.id, order.id, &number_list)
                .await?;
            return Err(ReservationError::AlreadyTaken(taken).into());
        }

        self.link_order_tickets_tx(txn, order.id, now).await?;
        Ok(order)
    }

    pub async fn reserve_random_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
        contact_id: i64,
        qty: i64,
    ) -> AppResult<order_entity::Model> {
        self.validate_qty(qty)?;

        let raffle = self.active_raffle_tx(txn, raffle_id).await?;

        let now = Utc::now();
        self.release_expired_tickets_tx(txn, raffle.id, now).await?;

        let expires_at = now + Duration::minutes(self.config.ttl_minutes);
        let order = self
            .insert_draft_order_tx(txn, &raffle, contact_id, qty, expires_at, now)
            .await?;

        // 应用层随机采样 + 条件更新复核，竞争失败则重采样。
        // 底层存储没有带锁跳过读，随机挑选必须在占用前后各验证一次。
        let mut attempts = 0;
        loop {
            attempts += 1;

            let available = ticket_entity::Entity::find()
                .filter(ticket_entity::Column::RaffleId.eq(raffle.id))
                .filter(ticket_entity::Column::Status.eq(TicketStatus::Available))
                .all(txn)
                .await?;

            if (available.len() as i64) < qty {
                return Err(ReservationError::InsufficientAvailability {
                    available: available.len() as i64,
                    requested: qty,
                }
                .into());
            }

            let picked: Vec<i64> = {
                let mut rng = rand::thread_rng();
                available
                    .choose_multiple(&mut rng, qty as usize)
                    .map(|t| t.number)
                    .collect()
            };

            let updated = ticket_entity::Entity::update_many()
                .set(ticket_entity::ActiveModel {
                    status: Set(TicketStatus::Reserved),
                    order_id: Set(Some(order.id)),
                    reserved_until: Set(Some(expires_at)),
                    updated_at: Set(Some(now)),
                    ..Default::default()
                })
                .filter(ticket_entity::Column::RaffleId.eq(raffle.id))
                .filter(ticket_entity::Column::Number.is_in(picked.clone()))
                .filter(ticket_entity::Column::Status.eq(TicketStatus::Available))
                .exec(txn)
                .await?;

            if updated.rows_affected == qty as u64 {
                self.link_order_tickets_tx(txn, order.id, now).await?;
                return Ok(order);
            }

            // 竞争失败：撤销本轮已占用的部分，重新采样
            self.unreserve_order_tickets_tx(txn, order.id, now).await?;

            if attempts >= self.config.max_random_attempts {
                return Err(ReservationError::TransientConflict.into());
            }
        }
    }

    pub async fn mark_pending_payment_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
    ) -> AppResult<order_entity::Model> {
        let order = self.order_by_id_tx(txn, order_id).await?;
        match order.status {
            OrderStatus::PendingPayment => Ok(order),
            OrderStatus::Draft => {
                let mut am = order.into_active_model();
                am.status = Set(OrderStatus::PendingPayment);
                am.updated_at = Set(Some(Utc::now()));
                Ok(am.update(txn).await?)
            }
            status => Err(ReservationError::InvalidTransition(format!(
                "Cannot confirm reservation for order with status: {status}"
            ))
            .into()),
        }
    }

    pub async fn attach_payment_proof_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        media_id: &str,
    ) -> AppResult<order_entity::Model> {
        let order = self.order_by_id_tx(txn, order_id).await?;
        if order.status != OrderStatus::PendingPayment {
            return Err(ReservationError::InvalidTransition(format!(
                "Cannot attach payment proof to order with status: {}",
                order.status
            ))
            .into());
        }
        let mut am = order.into_active_model();
        am.payment_proof_media_id = Set(Some(media_id.to_string()));
        am.updated_at = Set(Some(Utc::now()));
        Ok(am.update(txn).await?)
    }

    pub async fn confirm_paid_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        proof_reference: Option<String>,
    ) -> AppResult<order_entity::Model> {
        let order = self.order_by_id_tx(txn, order_id).await?;
        if order.status != OrderStatus::PendingPayment {
            return Err(ReservationError::InvalidTransition(format!(
                "Cannot confirm order with status: {}",
                order.status
            ))
            .into());
        }

        let now = Utc::now();
        // 只有仍被本订单持有的 RESERVED 号码可以翻为 SOLD；
        // 行数不足说明保留期已被扫描释放（先提交者胜出），本次确认失败
        let updated = ticket_entity::Entity::update_many()
            .set(ticket_entity::ActiveModel {
                status: Set(TicketStatus::Sold),
                reserved_until: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket_entity::Column::OrderId.eq(order.id))
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
            .exec(txn)
            .await?;

        if updated.rows_affected != order.qty as u64 {
            return Err(ReservationError::InvalidTransition(format!(
                "Reservation for order {} is no longer held ({} of {} tickets)",
                order.id, updated.rows_affected, order.qty
            ))
            .into());
        }

        let mut am = order.into_active_model();
        am.status = Set(OrderStatus::Paid);
        am.paid_at = Set(Some(now));
        if let Some(proof) = proof_reference {
            am.payment_proof_media_id = Set(Some(proof));
        }
        am.updated_at = Set(Some(now));
        Ok(am.update(txn).await?)
    }

    pub async fn cancel_order_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        reason: Option<String>,
    ) -> AppResult<order_entity::Model> {
        let order = self.order_by_id_tx(txn, order_id).await?;

        // 幂等：已释放的终态直接返回成功
        if order.status.is_released() {
            return Ok(order);
        }
        if order.status == OrderStatus::Paid {
            return Err(ReservationError::InvalidTransition(
                "Cannot cancel a paid order".to_string(),
            )
            .into());
        }

        let now = Utc::now();
        self.unreserve_order_tickets_tx(txn, order.id, now).await?;

        let mut am = order.into_active_model();
        am.status = Set(OrderStatus::Cancelled);
        am.cancel_reason = Set(reason);
        am.updated_at = Set(Some(now));
        Ok(am.update(txn).await?)
    }

    pub async fn sweep_expired_tx(
        &self,
        txn: &DatabaseTransaction,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        // 受影响订单先行收集，释放后逐个检查是否已被清空
        let expiring = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
            .filter(ticket_entity::Column::ReservedUntil.lte(now))
            .all(txn)
            .await?;

        let order_ids: HashSet<i64> = expiring.iter().filter_map(|t| t.order_id).collect();

        let released = ticket_entity::Entity::update_many()
            .set(ticket_entity::ActiveModel {
                status: Set(TicketStatus::Available),
                order_id: Set(None),
                reserved_until: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
            .filter(ticket_entity::Column::ReservedUntil.lte(now))
            .exec(txn)
            .await?
            .rows_affected;

        for order_id in order_ids {
            let Some(order) = order_entity::Entity::find_by_id(order_id).one(txn).await? else {
                continue;
            };
            if !order.status.holds_reservation() {
                continue;
            }
            let remaining = ticket_entity::Entity::find()
                .filter(ticket_entity::Column::OrderId.eq(order_id))
                .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
                .count(txn)
                .await?;
            if remaining == 0 {
                let mut am = order.into_active_model();
                am.status = Set(OrderStatus::Expired);
                am.updated_at = Set(Some(now));
                am.update(txn).await?;
            }
        }

        Ok(released)
    }

    /// 订单关联的号码（经由 order_tickets，释放后仍可追溯）
    pub async fn ticket_numbers_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
    ) -> AppResult<Vec<i64>> {
        let links = order_ticket_entity::Entity::find()
            .filter(order_ticket_entity::Column::OrderId.eq(order_id))
            .all(txn)
            .await?;
        let ids: Vec<i64> = links.iter().map(|l| l.ticket_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tickets = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::Id.is_in(ids))
            .order_by_asc(ticket_entity::Column::Number)
            .all(txn)
            .await?;
        Ok(tickets.into_iter().map(|t| t.number).collect())
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    fn validate_qty(&self, qty: i64) -> Result<(), ReservationError> {
        if qty < self.config.min_tickets_per_order {
            return Err(ReservationError::InvalidQuantity(format!(
                "Minimum {} ticket(s) required",
                self.config.min_tickets_per_order
            )));
        }
        if qty > self.config.max_tickets_per_order {
            return Err(ReservationError::InvalidQuantity(format!(
                "Maximum {} tickets allowed",
                self.config.max_tickets_per_order
            )));
        }
        Ok(())
    }

    async fn active_raffle_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
    ) -> AppResult<raffle_entity::Model> {
        raffle_entity::Entity::find_by_id(raffle_id)
            .filter(raffle_entity::Column::IsActive.eq(true))
            .one(txn)
            .await?
            .ok_or_else(|| ReservationError::RaffleInactive.into())
    }

    async fn order_by_id_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
    ) -> AppResult<order_entity::Model> {
        order_entity::Entity::find_by_id(order_id)
            .one(txn)
            .await?
            .ok_or_else(|| ReservationError::NotFound(format!("Order {order_id}")).into())
    }

    async fn insert_draft_order_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle: &raffle_entity::Model,
        contact_id: i64,
        qty: i64,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<order_entity::Model> {
        // 总价按当前单价固定；之后活动改价不回溯
        let order = order_entity::ActiveModel {
            raffle_id: Set(raffle.id),
            contact_id: Set(contact_id),
            qty: Set(qty),
            total_amount_cents: Set(raffle.ticket_price_cents * qty),
            status: Set(OrderStatus::Draft),
            expires_at: Set(Some(expires_at)),
            created_at: Set(Some(now)),
            updated_at: Set(Some(now)),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        Ok(order)
    }

    async fn link_order_tickets_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let tickets = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::OrderId.eq(order_id))
            .order_by_asc(ticket_entity::Column::Number)
            .all(txn)
            .await?;
        for ticket in &tickets {
            order_ticket_entity::ActiveModel {
                order_id: Set(order_id),
                ticket_id: Set(ticket.id),
                created_at: Set(Some(now)),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }
        Ok(())
    }

    /// 释放订单当前持有的 RESERVED 号码
    async fn unreserve_order_tickets_tx(
        &self,
        txn: &DatabaseTransaction,
        order_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let released = ticket_entity::Entity::update_many()
            .set(ticket_entity::ActiveModel {
                status: Set(TicketStatus::Available),
                order_id: Set(None),
                reserved_until: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket_entity::Column::OrderId.eq(order_id))
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
            .exec(txn)
            .await?
            .rows_affected;
        Ok(released)
    }

    /// 预订前释放该活动中已过期的号码（订单状态统一由扫描任务翻转）
    async fn release_expired_tickets_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let released = ticket_entity::Entity::update_many()
            .set(ticket_entity::ActiveModel {
                status: Set(TicketStatus::Available),
                order_id: Set(None),
                reserved_until: Set(None),
                updated_at: Set(Some(now)),
                ..Default::default()
            })
            .filter(ticket_entity::Column::RaffleId.eq(raffle_id))
            .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
            .filter(ticket_entity::Column::ReservedUntil.lte(now))
            .exec(txn)
            .await?
            .rows_affected;
        Ok(released)
    }

    /// 失败路径下查出冲突号码供错误信息使用（所在事务随后回滚）。
    /// 条件更新可能已占到一部分号码，这部分属于本订单，不算被他人持有。
    async fn unavailable_numbers_tx(
        &self,
        txn: &DatabaseTransaction,
        raffle_id: i64,
        own_order_id: i64,
        numbers: &[i64],
    ) -> AppResult<Vec<i64>> {
        let rows = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::RaffleId.eq(raffle_id))
            .filter(ticket_entity::Column::Number.is_in(numbers.to_vec()))
            .all(txn)
            .await?;

        let found: HashSet<i64> = rows.iter().map(|t| t.number).collect();
        let mut taken: Vec<i64> = rows
            .iter()
            .filter(|t| {
                t.status != TicketStatus::Available && t.order_id != Some(own_order_id)
            })
            .map(|t| t.number)
            .collect();
        for n in numbers {
            if !found.contains(n) {
                taken.push(*n);
            }
        }
        taken.sort_unstable();
        taken.dedup();
        Ok(taken)
    }

    /// SQLite busy/locked 一类的存储层写冲突（驱动层信息只能文本判别）
    fn is_store_conflict(err: &AppError) -> bool {
        match err {
            AppError::DatabaseError(db) => Self::is_conflict_db_err(db),
            _ => false,
        }
    }

    fn is_conflict_db_err(err: &DbErr) -> bool {
        let msg = err.to_string();
        msg.contains("database is locked")
            || msg.contains("database table is locked")
            || msg.contains("busy")
    }

    fn map_store_conflict(err: AppError) -> AppError {
        if Self::is_store_conflict(&err) {
            ReservationError::TransientConflict.into()
        } else {
            err
        }
    }
}
