use crate::entities::{
    contact_entity, order_entity, raffle_entity, ContactState, OrderStatus,
};
use crate::error::{AppError, AppResult, ReservationError};
use crate::models::{ConversationContext, InboundEventRequest, Prompt, SelectionMode};
use crate::services::messages_es as msg;
use crate::services::{RaffleService, ReservationService};
use crate::utils::{
    is_confirm_keyword, is_skip_keyword, parse_global_command, parse_mode_keyword, parse_numbers,
    parse_positive_int, parse_random_shortcut, GlobalCommand,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, DatabaseTransaction, EntityTrait, IntoActiveModel, Set, TransactionTrait,
};
use std::collections::BTreeSet;

/// 会话状态机：把 (当前状态, 上下文, 入站事件) 映射为
/// (新状态, 新上下文, 引擎调用, 一条出站提示)。
///
/// 规则:
/// - 两级分发：全局命令 (menu/cancelar/ayuda) 优先，未命中才进状态内分发
/// - 非法输入重发当前状态提示并附校验说明，不触发引擎调用、不前进状态
/// - 引擎调用包在保存点里：失败即回滚，联系人状态/上下文保持调用前的值
#[derive(Clone)]
pub struct FlowService {
    reservation_service: ReservationService,
    raffle_service: RaffleService,
}

impl FlowService {
    pub fn new(reservation_service: ReservationService, raffle_service: RaffleService) -> Self {
        Self {
            reservation_service,
            raffle_service,
        }
    }

    /// 处理一条入站事件（由分发器在去重后的同一事务内调用）
    pub async fn handle_event_tx(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        event: &InboundEventRequest,
    ) -> AppResult<Prompt> {
        let text = event.text.as_deref().unwrap_or("").trim().to_string();
        let ctx = ConversationContext::from_json(&contact.context);

        // 全局命令优先于状态内分发
        if let Some(cmd) = parse_global_command(&text) {
            return match cmd {
                GlobalCommand::Menu => self.global_menu(txn, contact, &ctx).await,
                GlobalCommand::Cancel => self.global_cancel(txn, contact, &ctx).await,
                GlobalCommand::Help => self.current_prompt(txn, contact, &ctx).await,
            };
        }

        match contact.state {
            ContactState::Menu => self.handle_menu(txn, contact, &text).await,
            ContactState::ChooseMode => self.handle_choose_mode(txn, contact, &ctx, &text).await,
            ContactState::AskQty => self.handle_ask_qty(txn, contact, &ctx, &text).await,
            ContactState::AskPickNumbers => {
                self.handle_ask_pick_numbers(txn, contact, &ctx, &text).await
            }
            ContactState::ConfirmReservation => {
                self.handle_confirm_reservation(txn, contact, &ctx, &text).await
            }
            ContactState::WaitProof => {
                self.handle_wait_proof(txn, contact, &ctx, event, &text).await
            }
            ContactState::Done => Ok(Prompt::text(msg::MSG_WRITE_MENU)),
        }
    }

    // -----------------------------
    // 状态内处理
    // -----------------------------

    async fn handle_menu(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        text: &str,
    ) -> AppResult<Prompt> {
        let raffles = self.raffle_service.list_active_tx(txn).await?;
        if raffles.is_empty() {
            return Ok(Prompt::text(msg::MSG_NO_ACTIVE_RAFFLES));
        }

        match parse_positive_int(text) {
            Some(k) if (k as usize) <= raffles.len() => {
                let raffle = &raffles[k as usize - 1];
                let (available, _, sold) = self.raffle_service.counts_tx(txn, raffle.id).await?;

                let new_ctx = ConversationContext {
                    raffle_id: Some(raffle.id),
                    ..Default::default()
                };
                self.update_contact(txn, contact, ContactState::ChooseMode, &new_ctx)
                    .await?;

                Ok(Prompt::with_choices(
                    msg::raffle_details_text(raffle, available, sold),
                    vec![("pick", "Elegir números"), ("random", "Aleatorio")],
                ))
            }
            _ => {
                let menu = self.menu_prompt_tx(txn, &raffles).await?;
                Ok(Prompt::text(format!(
                    "{}\n\n{}",
                    msg::MSG_INVALID_SELECTION,
                    menu.text
                )))
            }
        }
    }

    async fn handle_choose_mode(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        text: &str,
    ) -> AppResult<Prompt> {
        let Some(raffle_id) = ctx.raffle_id else {
            return self.session_expired(txn, contact).await;
        };
        let Some(raffle) = self.raffle_service.get_active_tx(txn, raffle_id).await? else {
            return self.raffle_gone(txn, contact).await;
        };

        match parse_mode_keyword(text) {
            Some(SelectionMode::Pick) => {
                let new_ctx = ConversationContext {
                    raffle_id: Some(raffle_id),
                    mode: Some(SelectionMode::Pick),
                    ..Default::default()
                };
                self.update_contact(txn, contact, ContactState::AskPickNumbers, &new_ctx)
                    .await?;
                Ok(Prompt::text(msg::ask_numbers_text(&raffle)))
            }
            Some(SelectionMode::Random) => {
                let new_ctx = ConversationContext {
                    raffle_id: Some(raffle_id),
                    mode: Some(SelectionMode::Random),
                    ..Default::default()
                };
                self.update_contact(txn, contact, ContactState::AskQty, &new_ctx)
                    .await?;
                Ok(Prompt::text(msg::MSG_ASK_QTY))
            }
            None => Ok(Prompt::text(format!(
                "❌ Opción inválida.\n\n{}",
                msg::MSG_CHOOSE_MODE
            ))),
        }
    }

    async fn handle_ask_qty(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        text: &str,
    ) -> AppResult<Prompt> {
        let Some(raffle_id) = ctx.raffle_id else {
            return self.session_expired(txn, contact).await;
        };

        let min = self.reservation_service.min_tickets_per_order();
        let max = self.reservation_service.max_tickets_per_order();
        let Some(qty) = parse_positive_int(text) else {
            return Ok(Prompt::text(format!(
                "❌ {}\n\n{}",
                msg::qty_out_of_bounds_text(min, max),
                msg::MSG_ASK_QTY
            )));
        };
        if qty < min || qty > max {
            return Ok(Prompt::text(format!(
                "❌ {}",
                msg::qty_out_of_bounds_text(min, max)
            )));
        }

        let sp = txn.begin().await?;
        match self
            .reservation_service
            .reserve_random_tx(&sp, raffle_id, contact.id, qty)
            .await
        {
            Ok(order) => {
                sp.commit().await?;
                self.after_reservation(txn, contact, ctx, order, None).await
            }
            Err(e) => {
                sp.rollback().await?;
                self.reservation_failed(txn, contact, e).await
            }
        }
    }

    async fn handle_ask_pick_numbers(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        text: &str,
    ) -> AppResult<Prompt> {
        let Some(raffle_id) = ctx.raffle_id else {
            return self.session_expired(txn, contact).await;
        };

        let min = self.reservation_service.min_tickets_per_order();
        let max = self.reservation_service.max_tickets_per_order();

        // 快捷方式：'aleatorio N' 直接随机预订
        if let Some(qty) = parse_random_shortcut(text) {
            if qty < min || qty > max {
                return Ok(Prompt::text(format!(
                    "❌ {}",
                    msg::qty_out_of_bounds_text(min, max)
                )));
            }
            let sp = txn.begin().await?;
            return match self
                .reservation_service
                .reserve_random_tx(&sp, raffle_id, contact.id, qty)
                .await
            {
                Ok(order) => {
                    sp.commit().await?;
                    self.after_reservation(txn, contact, ctx, order, None).await
                }
                Err(e) => {
                    sp.rollback().await?;
                    self.reservation_failed(txn, contact, e).await
                }
            };
        }

        let Some(numbers) = parse_numbers(text) else {
            return Ok(Prompt::text(format!(
                "❌ {}",
                msg::MSG_INVALID_NUMBER_FORMAT
            )));
        };
        let qty = numbers.len() as i64;
        if qty < min || qty > max {
            return Ok(Prompt::text(format!(
                "❌ {}",
                msg::qty_out_of_bounds_text(min, max)
            )));
        }

        let sp = txn.begin().await?;
        match self
            .reservation_service
            .reserve_specific_tx(&sp, raffle_id, contact.id, &numbers)
            .await
        {
            Ok(order) => {
                sp.commit().await?;
                self.after_reservation(txn, contact, ctx, order, Some(numbers))
                    .await
            }
            Err(e) => {
                sp.rollback().await?;
                self.reservation_failed(txn, contact, e).await
            }
        }
    }

    async fn handle_confirm_reservation(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        text: &str,
    ) -> AppResult<Prompt> {
        let Some(order_id) = ctx.draft_order_id else {
            return self.session_expired(txn, contact).await;
        };

        if !is_confirm_keyword(text) {
            // 'cancelar' 已被全局命令层拦截；其余输入重发确认提示
            return Ok(Prompt::text(msg::MSG_CONFIRM_OR_CANCEL));
        }

        let sp = txn.begin().await?;
        match self
            .reservation_service
            .mark_pending_payment_tx(&sp, order_id)
            .await
        {
            Ok(order) => {
                sp.commit().await?;
                let raffle = raffle_entity::Entity::find_by_id(order.raffle_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::InternalError(format!(
                            "Raffle {} missing for order {}",
                            order.raffle_id, order.id
                        ))
                    })?;
                self.update_contact(txn, contact, ContactState::WaitProof, ctx)
                    .await?;
                Ok(Prompt::text(msg::payment_instructions_text(
                    &raffle.currency,
                    order.total_amount_cents,
                    order.id,
                )))
            }
            Err(e) => {
                sp.rollback().await?;
                // 订单已过期/取消：预订已不存在，回到主菜单
                if let Some(res) = e.as_reservation() {
                    let text = msg::reservation_error_text(res);
                    self.reset_to_menu(txn, contact).await?;
                    return Ok(Prompt::text(text));
                }
                Err(e)
            }
        }
    }

    async fn handle_wait_proof(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        event: &InboundEventRequest,
        text: &str,
    ) -> AppResult<Prompt> {
        let Some(order_id) = ctx.draft_order_id else {
            return self.session_expired(txn, contact).await;
        };

        if event.kind.is_media() {
            if let Some(media_id) = event.media_id.as_deref() {
                let sp = txn.begin().await?;
                return match self
                    .reservation_service
                    .attach_payment_proof_tx(&sp, order_id, media_id)
                    .await
                {
                    Ok(_) => {
                        sp.commit().await?;
                        self.update_contact(
                            txn,
                            contact,
                            ContactState::Done,
                            &ConversationContext::default(),
                        )
                        .await?;
                        Ok(Prompt::text(msg::MSG_PAYMENT_PROOF_RECEIVED))
                    }
                    Err(e) => {
                        sp.rollback().await?;
                        if let Some(res) = e.as_reservation() {
                            let text = msg::reservation_error_text(res);
                            self.reset_to_menu(txn, contact).await?;
                            return Ok(Prompt::text(text));
                        }
                        Err(e)
                    }
                };
            }
        }

        if is_skip_keyword(text) {
            self.update_contact(
                txn,
                contact,
                ContactState::Done,
                &ConversationContext::default(),
            )
            .await?;
            return Ok(Prompt::text(msg::MSG_PAYMENT_SKIPPED));
        }

        Ok(Prompt::text(msg::MSG_PAYMENT_PROOF_REQUEST))
    }

    // -----------------------------
    // 全局命令
    // -----------------------------

    /// MENU：重置会话；未经确认仍持有号码的 DRAFT 订单顺带释放
    async fn global_menu(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
    ) -> AppResult<Prompt> {
        if let Some(order_id) = ctx.draft_order_id {
            if let Some(order) = order_entity::Entity::find_by_id(order_id).one(txn).await? {
                if order.status == OrderStatus::Draft {
                    let sp = txn.begin().await?;
                    match self
                        .reservation_service
                        .cancel_order_tx(&sp, order_id, Some("menu reset".to_string()))
                        .await
                    {
                        Ok(_) => sp.commit().await?,
                        Err(e) => {
                            sp.rollback().await?;
                            log::warn!("Failed to release draft order {order_id} on menu reset: {e}");
                        }
                    }
                }
            }
        }

        self.reset_to_menu(txn, contact).await?;

        let raffles = self.raffle_service.list_active_tx(txn).await?;
        if raffles.is_empty() {
            return Ok(Prompt::text(msg::MSG_NO_ACTIVE_RAFFLES));
        }
        self.menu_prompt_tx(txn, &raffles).await
    }

    /// CANCEL：取消上下文引用的订单并回到主菜单
    async fn global_cancel(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
    ) -> AppResult<Prompt> {
        let mut note: Option<String> = None;

        if let Some(order_id) = ctx.draft_order_id {
            let sp = txn.begin().await?;
            match self
                .reservation_service
                .cancel_order_tx(&sp, order_id, Some("cancelled by user".to_string()))
                .await
            {
                Ok(_) => {
                    sp.commit().await?;
                    note = Some(msg::MSG_ORDER_CANCELLED.to_string());
                }
                Err(e) => {
                    sp.rollback().await?;
                    match e.as_reservation() {
                        Some(ReservationError::InvalidTransition(_)) => {
                            note = Some(msg::MSG_ORDER_ALREADY_PAID.to_string());
                        }
                        Some(res) => {
                            note = Some(msg::reservation_error_text(res));
                        }
                        None => return Err(e),
                    }
                }
            }
        }

        self.reset_to_menu(txn, contact).await?;

        let raffles = self.raffle_service.list_active_tx(txn).await?;
        let menu_text = if raffles.is_empty() {
            msg::MSG_NO_ACTIVE_RAFFLES.to_string()
        } else {
            self.menu_prompt_tx(txn, &raffles).await?.text
        };

        Ok(Prompt::text(match note {
            Some(n) => format!("{n}\n\n{menu_text}"),
            None => menu_text,
        }))
    }

    /// HELP：重发当前状态的提示，不做任何状态/上下文变更
    async fn current_prompt(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
    ) -> AppResult<Prompt> {
        match contact.state {
            ContactState::Menu => {
                let raffles = self.raffle_service.list_active_tx(txn).await?;
                if raffles.is_empty() {
                    Ok(Prompt::text(msg::MSG_NO_ACTIVE_RAFFLES))
                } else {
                    self.menu_prompt_tx(txn, &raffles).await
                }
            }
            ContactState::ChooseMode => match ctx.raffle_id {
                Some(raffle_id) => {
                    match self.raffle_service.get_active_tx(txn, raffle_id).await? {
                        Some(raffle) => {
                            let (available, _, sold) =
                                self.raffle_service.counts_tx(txn, raffle.id).await?;
                            Ok(Prompt::text(msg::raffle_details_text(
                                &raffle, available, sold,
                            )))
                        }
                        None => Ok(Prompt::text(msg::MSG_RAFFLE_NOT_AVAILABLE)),
                    }
                }
                None => Ok(Prompt::text(msg::MSG_SESSION_EXPIRED)),
            },
            ContactState::AskQty => Ok(Prompt::text(msg::MSG_ASK_QTY)),
            ContactState::AskPickNumbers => match ctx.raffle_id {
                Some(raffle_id) => {
                    match self.raffle_service.get_active_tx(txn, raffle_id).await? {
                        Some(raffle) => Ok(Prompt::text(msg::ask_numbers_text(&raffle))),
                        None => Ok(Prompt::text(msg::MSG_RAFFLE_NOT_AVAILABLE)),
                    }
                }
                None => Ok(Prompt::text(msg::MSG_SESSION_EXPIRED)),
            },
            ContactState::ConfirmReservation => Ok(Prompt::text(msg::MSG_CONFIRM_OR_CANCEL)),
            ContactState::WaitProof => Ok(Prompt::text(msg::MSG_PAYMENT_PROOF_REQUEST)),
            ContactState::Done => Ok(Prompt::text(msg::MSG_WRITE_MENU)),
        }
    }

    // -----------------------------
    // 内部辅助方法
    // -----------------------------

    /// 预订成功后的公共收尾：写上下文、进入确认态、渲染订单摘要
    async fn after_reservation(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        ctx: &ConversationContext,
        order: order_entity::Model,
        picked: Option<BTreeSet<i64>>,
    ) -> AppResult<Prompt> {
        let numbers = self
            .reservation_service
            .ticket_numbers_tx(txn, order.id)
            .await?;
        let raffle = raffle_entity::Entity::find_by_id(order.raffle_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Raffle {} missing for order {}",
                    order.raffle_id, order.id
                ))
            })?;

        let new_ctx = ConversationContext {
            raffle_id: Some(order.raffle_id),
            mode: ctx.mode,
            qty: picked.is_none().then_some(order.qty),
            draft_order_id: Some(order.id),
            picked_numbers: picked.map(|set| set.into_iter().collect()),
        };
        self.update_contact(txn, contact, ContactState::ConfirmReservation, &new_ctx)
            .await?;

        Ok(Prompt::with_choices(
            msg::order_created_text(
                &raffle.title,
                &numbers,
                order.qty,
                &raffle.currency,
                order.total_amount_cents,
                self.reservation_service.ttl_minutes(),
            ),
            vec![("confirm", "Confirmar"), ("cancel", "Cancelar")],
        ))
    }

    /// 引擎失败的公共出口：转移视为未发生，仅渲染错误文案；
    /// 活动失效/订单不存在类错误把会话拉回主菜单
    async fn reservation_failed(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        e: AppError,
    ) -> AppResult<Prompt> {
        if let Some(res) = e.as_reservation() {
            let text = msg::reservation_error_text(res);
            if matches!(
                res,
                ReservationError::RaffleInactive | ReservationError::NotFound(_)
            ) {
                self.reset_to_menu(txn, contact).await?;
            }
            return Ok(Prompt::text(text));
        }
        Err(e)
    }

    async fn menu_prompt_tx(
        &self,
        txn: &DatabaseTransaction,
        raffles: &[raffle_entity::Model],
    ) -> AppResult<Prompt> {
        let mut entries = Vec::with_capacity(raffles.len());
        for raffle in raffles {
            let (available, _, _) = self.raffle_service.counts_tx(txn, raffle.id).await?;
            entries.push((raffle.clone(), available));
        }
        Ok(Prompt::text(msg::menu_text(&entries)))
    }

    async fn session_expired(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
    ) -> AppResult<Prompt> {
        self.reset_to_menu(txn, contact).await?;
        Ok(Prompt::text(msg::MSG_SESSION_EXPIRED))
    }

    async fn raffle_gone(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
    ) -> AppResult<Prompt> {
        self.reset_to_menu(txn, contact).await?;
        Ok(Prompt::text(msg::MSG_RAFFLE_NOT_AVAILABLE))
    }

    async fn reset_to_menu(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
    ) -> AppResult<()> {
        self.update_contact(
            txn,
            contact,
            ContactState::Menu,
            &ConversationContext::default(),
        )
        .await
    }

    /// 联系人状态/上下文写回：上下文整体替换，不合并
    async fn update_contact(
        &self,
        txn: &DatabaseTransaction,
        contact: &contact_entity::Model,
        state: ContactState,
        ctx: &ConversationContext,
    ) -> AppResult<()> {
        let now = Utc::now();
        let mut am = contact.clone().into_active_model();
        am.state = Set(state);
        am.context = Set(ctx.to_json());
        am.last_interaction_at = Set(Some(now));
        am.updated_at = Set(Some(now));
        am.update(txn).await?;
        Ok(())
    }
}
