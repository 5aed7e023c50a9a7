mod common;

use chrono::{Duration, Utc};
use common::*;
use rifabot_backend::entities::{order_entity, OrderStatus, TicketStatus};
use rifabot_backend::error::{AppError, ReservationError};
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set};
use std::collections::BTreeSet;

fn nums(values: &[i64]) -> BTreeSet<i64> {
    values.iter().copied().collect()
}

fn reservation_err(err: AppError) -> ReservationError {
    match err {
        AppError::Reservation(res) => res,
        other => panic!("expected reservation error, got: {other}"),
    }
}

#[tokio::test]
async fn test_reserve_specific_creates_draft_order() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa A", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[3, 7]))
        .await
        .unwrap();

    assert_eq!(order.status, OrderStatus::Draft);
    assert_eq!(order.qty, 2);
    assert_eq!(order.total_amount_cents, 1000);
    assert!(order.expires_at.is_some());

    let ticket = ticket_by_number(&app, raffle_id, 3).await;
    assert_eq!(ticket.status, TicketStatus::Reserved);
    assert_eq!(ticket.order_id, Some(order.id));
    assert!(ticket.reserved_until.is_some());

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.available_count, 8);
    assert_eq!(availability.reserved_count, 2);
    assert_eq!(availability.sold_count, 0);
    assert!(!availability.available_numbers.contains(&3));
    assert!(!availability.available_numbers.contains(&7));
}

#[tokio::test]
async fn test_overlapping_reservation_fails_entirely() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa B", 500, 1, 10).await;
    let c1 = create_contact(&app, "wa-1").await;
    let c2 = create_contact(&app, "wa-2").await;

    app.reservation_service
        .reserve_specific(raffle_id, c1.id, &nums(&[3, 7]))
        .await
        .unwrap();

    // 与已占号码部分重叠：整体失败，9 号也不会被占
    let err = app
        .reservation_service
        .reserve_specific(raffle_id, c2.id, &nums(&[7, 9]))
        .await
        .unwrap_err();
    match reservation_err(err) {
        ReservationError::AlreadyTaken(taken) => assert_eq!(taken, vec![7]),
        other => panic!("expected AlreadyTaken, got: {other}"),
    }

    let ticket9 = ticket_by_number(&app, raffle_id, 9).await;
    assert_eq!(ticket9.status, TicketStatus::Available);
    assert_eq!(ticket9.order_id, None);
}

#[tokio::test]
async fn test_contended_reservation_has_single_winner() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa C", 500, 1, 20).await;

    let mut handles = Vec::new();
    for i in 0..5 {
        let svc = app.reservation_service.clone();
        let contact = create_contact(&app, &format!("wa-{i}")).await;
        handles.push(tokio::spawn(async move {
            svc.reserve_specific(raffle_id, contact.id, &nums(&[5, 6])).await
        }));
    }

    let mut winners = 0;
    let mut taken_losses = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => match reservation_err(err) {
                ReservationError::AlreadyTaken(_) => taken_losses += 1,
                other => panic!("unexpected error: {other}"),
            },
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(taken_losses, 4);

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.reserved_count, 2);
}

#[tokio::test]
async fn test_reserve_specific_validations() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa D", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let err = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &BTreeSet::new())
        .await
        .unwrap_err();
    assert_eq!(reservation_err(err), ReservationError::EmptySelection);

    let err = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[2, 11]))
        .await
        .unwrap_err();
    assert_eq!(reservation_err(err), ReservationError::OutOfRange(vec![11]));

    // 校验失败不得留下半成品
    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.available_count, 10);
    let orders = order_entity::Entity::find().all(&app.pool).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn test_reserve_on_inactive_raffle_rejected() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa E", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let raffle = rifabot_backend::entities::raffle_entity::Entity::find_by_id(raffle_id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    let mut am = raffle.into_active_model();
    am.is_active = Set(false);
    am.update(&app.pool).await.unwrap();

    let err = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[1]))
        .await
        .unwrap_err();
    assert_eq!(reservation_err(err), ReservationError::RaffleInactive);
}

#[tokio::test]
async fn test_reserve_random_quantity_atomicity() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa F", 300, 1, 5).await;
    let c1 = create_contact(&app, "wa-1").await;
    let c2 = create_contact(&app, "wa-2").await;

    let order = app
        .reservation_service
        .reserve_random(raffle_id, c1.id, 3)
        .await
        .unwrap();
    assert_eq!(order.qty, 3);
    assert_eq!(order.total_amount_cents, 900);

    // 只剩 2 张：要 3 张必须整体失败，一张都不预订
    let err = app
        .reservation_service
        .reserve_random(raffle_id, c2.id, 3)
        .await
        .unwrap_err();
    assert_eq!(
        reservation_err(err),
        ReservationError::InsufficientAvailability {
            available: 2,
            requested: 3
        }
    );

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.available_count, 2);
    assert_eq!(availability.reserved_count, 3);
}

#[tokio::test]
async fn test_lifecycle_round_trip() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa G", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[3, 7]))
        .await
        .unwrap();

    let order = app
        .reservation_service
        .mark_pending_payment(order.id)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);

    let order = app
        .reservation_service
        .confirm_paid(order.id, Some("proof-media-1".to_string()))
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Paid);
    assert!(order.paid_at.is_some());
    assert_eq!(order.payment_proof_media_id.as_deref(), Some("proof-media-1"));

    for n in [3, 7] {
        let ticket = ticket_by_number(&app, raffle_id, n).await;
        assert_eq!(ticket.status, TicketStatus::Sold);
        assert_eq!(ticket.order_id, Some(order.id));
        assert_eq!(ticket.reserved_until, None);
    }

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.sold_count, order.qty);
    assert_eq!(order.total_amount_cents, order.qty * 500);

    // PAID 订单不受过期扫描影响
    let released = app
        .reservation_service
        .sweep_expired(Utc::now() + Duration::minutes(31))
        .await
        .unwrap();
    assert_eq!(released, 0);
    let refreshed = order_entity::Entity::find_by_id(order.id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(refreshed.status, OrderStatus::Paid);
}

#[tokio::test]
async fn test_confirm_requires_pending_payment() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa H", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[1]))
        .await
        .unwrap();

    // DRAFT 不可直接确认收款
    let err = app
        .reservation_service
        .confirm_paid(order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        reservation_err(err),
        ReservationError::InvalidTransition(_)
    ));

    // 未知订单
    let err = app
        .reservation_service
        .confirm_paid(99999, None)
        .await
        .unwrap_err();
    assert!(matches!(reservation_err(err), ReservationError::NotFound(_)));
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa I", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[2, 4]))
        .await
        .unwrap();

    let cancelled = app
        .reservation_service
        .cancel_order(order.id, Some("user request".to_string()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.available_count, 10);

    // 第二次取消：无操作成功，不重复释放
    let again = app
        .reservation_service
        .cancel_order(order.id, Some("retry".to_string()))
        .await
        .unwrap();
    assert_eq!(again.status, OrderStatus::Cancelled);
    assert_eq!(again.cancel_reason.as_deref(), Some("user request"));

    let availability = app.raffle_service.availability(raffle_id).await.unwrap();
    assert_eq!(availability.available_count, 10);
}

#[tokio::test]
async fn test_cancel_paid_order_rejected() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa J", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[5]))
        .await
        .unwrap();
    app.reservation_service
        .mark_pending_payment(order.id)
        .await
        .unwrap();
    app.reservation_service
        .confirm_paid(order.id, None)
        .await
        .unwrap();

    let err = app
        .reservation_service
        .cancel_order(order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        reservation_err(err),
        ReservationError::InvalidTransition(_)
    ));
}

#[tokio::test]
async fn test_expiry_sweep_releases_and_expires_order() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa K", 500, 1, 10).await;
    let c1 = create_contact(&app, "wa-1").await;
    let c2 = create_contact(&app, "wa-2").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, c1.id, &nums(&[4]))
        .await
        .unwrap();

    // TTL 30 分钟：31 分钟后的扫描应释放号码并把订单翻为 EXPIRED
    let released = app
        .reservation_service
        .sweep_expired(Utc::now() + Duration::minutes(31))
        .await
        .unwrap();
    assert_eq!(released, 1);

    let ticket = ticket_by_number(&app, raffle_id, 4).await;
    assert_eq!(ticket.status, TicketStatus::Available);
    assert_eq!(ticket.order_id, None);
    assert_eq!(ticket.reserved_until, None);

    let expired = order_entity::Entity::find_by_id(order.id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(expired.status, OrderStatus::Expired);

    // 释放后的号码可被他人重新预订，且旧订单无法再触达它
    let order2 = app
        .reservation_service
        .reserve_specific(raffle_id, c2.id, &nums(&[4]))
        .await
        .unwrap();
    let ticket = ticket_by_number(&app, raffle_id, 4).await;
    assert_eq!(ticket.order_id, Some(order2.id));

    // 重复扫描：无票可放，旧订单保持 EXPIRED
    let released = app
        .reservation_service
        .sweep_expired(Utc::now())
        .await
        .unwrap();
    assert_eq!(released, 0);
}

#[tokio::test]
async fn test_confirm_loses_race_against_sweep() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa L", 500, 1, 10).await;
    let contact = create_contact(&app, "wa-1").await;

    let order = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &nums(&[8]))
        .await
        .unwrap();
    app.reservation_service
        .mark_pending_payment(order.id)
        .await
        .unwrap();

    // 扫描先提交：确认方观察到前置条件不再成立，类型化失败而不是改坏状态
    app.reservation_service
        .sweep_expired(Utc::now() + Duration::minutes(31))
        .await
        .unwrap();

    let err = app
        .reservation_service
        .confirm_paid(order.id, None)
        .await
        .unwrap_err();
    assert!(matches!(
        reservation_err(err),
        ReservationError::InvalidTransition(_)
    ));

    let ticket = ticket_by_number(&app, raffle_id, 8).await;
    assert_eq!(ticket.status, TicketStatus::Available);
}

#[tokio::test]
async fn test_reserve_releases_stale_holds_inline() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa M", 500, 1, 10).await;
    let c1 = create_contact(&app, "wa-1").await;
    let c2 = create_contact(&app, "wa-2").await;

    app.reservation_service
        .reserve_specific(raffle_id, c1.id, &nums(&[5]))
        .await
        .unwrap();

    // 保留期过后即便扫描尚未运行，新的预订也能拿到该号码
    backdate_reservations(&app, raffle_id).await;

    let order2 = app
        .reservation_service
        .reserve_specific(raffle_id, c2.id, &nums(&[5]))
        .await
        .unwrap();
    let ticket = ticket_by_number(&app, raffle_id, 5).await;
    assert_eq!(ticket.status, TicketStatus::Reserved);
    assert_eq!(ticket.order_id, Some(order2.id));
}

#[tokio::test]
async fn test_quantity_bounds_enforced() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa N", 500, 1, 100).await;
    let contact = create_contact(&app, "wa-1").await;

    // 默认单笔上限 50
    let too_many: BTreeSet<i64> = (1..=51).collect();
    let err = app
        .reservation_service
        .reserve_specific(raffle_id, contact.id, &too_many)
        .await
        .unwrap_err();
    assert!(matches!(
        reservation_err(err),
        ReservationError::InvalidQuantity(_)
    ));

    let err = app
        .reservation_service
        .reserve_random(raffle_id, contact.id, 51)
        .await
        .unwrap_err();
    assert!(matches!(
        reservation_err(err),
        ReservationError::InvalidQuantity(_)
    ));
}
