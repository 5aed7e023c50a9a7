mod common;

use common::*;
use rifabot_backend::entities::{order_entity, ContactState, OrderStatus, TicketStatus};
use rifabot_backend::models::ConversationContext;
use sea_orm::EntityTrait;

async fn order_by_id(app: &TestApp, order_id: i64) -> order_entity::Model {
    order_entity::Entity::find_by_id(order_id)
        .one(&app.pool)
        .await
        .unwrap()
        .unwrap()
}

fn context_of(contact: &rifabot_backend::entities::contact_entity::Model) -> ConversationContext {
    ConversationContext::from_json(&contact.context)
}

#[tokio::test]
async fn test_full_conversation_walk() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa Navideña", 500, 1, 10).await;
    let wa = "wa-100";

    // 菜单
    let out = send_text(&app, "m1", wa, "menu").await;
    assert!(!out.duplicate);
    assert!(out.prompt.text.contains("Rifa Navideña"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Menu);

    // 选择活动
    let out = send_text(&app, "m2", wa, "1").await;
    assert!(out.prompt.text.contains("¿Cómo te gustaría seleccionar"));
    let contact = contact_by_wa(&app, wa).await;
    assert_eq!(contact.state, ContactState::ChooseMode);
    assert_eq!(context_of(&contact).raffle_id, Some(raffle_id));

    // 选号方式
    let out = send_text(&app, "m3", wa, "elegir").await;
    assert!(out.prompt.text.contains("Escribe los números"));
    assert_eq!(
        contact_by_wa(&app, wa).await.state,
        ContactState::AskPickNumbers
    );

    // 指定号码
    let out = send_text(&app, "m4", wa, "3,7").await;
    assert!(out.prompt.text.contains("Pedido Creado"));
    assert!(out.prompt.text.contains("3, 7"));
    assert!(out.prompt.text.contains("USD 10.00"));
    let contact = contact_by_wa(&app, wa).await;
    assert_eq!(contact.state, ContactState::ConfirmReservation);
    let ctx = context_of(&contact);
    let order_id = ctx.draft_order_id.expect("draft order recorded");
    assert_eq!(ctx.picked_numbers, Some(vec![3, 7]));
    assert_eq!(order_by_id(&app, order_id).await.status, OrderStatus::Draft);

    // 确认
    let out = send_text(&app, "m5", wa, "confirmar").await;
    assert!(out.prompt.text.contains("Instrucciones de Pago"));
    assert!(out.prompt.text.contains(&format!("Pedido #{order_id}")));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::WaitProof);
    assert_eq!(
        order_by_id(&app, order_id).await.status,
        OrderStatus::PendingPayment
    );

    // 支付凭证
    let out = send_image(&app, "m6", wa, "MEDIA-1").await;
    assert!(out.prompt.text.contains("Comprobante de pago recibido"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Done);
    let order = order_by_id(&app, order_id).await;
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.payment_proof_media_id.as_deref(), Some("MEDIA-1"));

    // 运营确认后号码售出
    app.reservation_service
        .confirm_paid(order_id, None)
        .await
        .unwrap();
    let ticket = ticket_by_number(&app, raffle_id, 3).await;
    assert_eq!(ticket.status, TicketStatus::Sold);

    // DONE 状态下只有 menu 能回主菜单
    let out = send_text(&app, "m7", wa, "gracias").await;
    assert!(out.prompt.text.contains("menu"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Done);

    let out = send_text(&app, "m8", wa, "menu").await;
    assert!(out.prompt.text.contains("Rifas Activas"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Menu);
}

#[tokio::test]
async fn test_random_flow_sets_qty_context() {
    let app = setup().await;
    create_raffle(&app, "Rifa Z", 200, 1, 10).await;
    let wa = "wa-200";

    send_text(&app, "r1", wa, "menu").await;
    send_text(&app, "r2", wa, "1").await;
    let out = send_text(&app, "r3", wa, "aleatorio").await;
    assert!(out.prompt.text.contains("¿Cuántos números"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::AskQty);

    let out = send_text(&app, "r4", wa, "3").await;
    assert!(out.prompt.text.contains("Pedido Creado"));
    let contact = contact_by_wa(&app, wa).await;
    assert_eq!(contact.state, ContactState::ConfirmReservation);
    let ctx = context_of(&contact);
    assert_eq!(ctx.qty, Some(3));
    assert!(ctx.picked_numbers.is_none());

    let order = order_by_id(&app, ctx.draft_order_id.unwrap()).await;
    assert_eq!(order.qty, 3);
    assert_eq!(order.total_amount_cents, 600);
}

#[tokio::test]
async fn test_duplicate_delivery_replays_without_side_effects() {
    let app = setup().await;
    create_raffle(&app, "Rifa Dup", 500, 1, 10).await;
    let wa = "wa-300";

    send_text(&app, "d1", wa, "menu").await;
    let first = send_text(&app, "d2", wa, "1").await;
    assert!(!first.duplicate);
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::ChooseMode);

    // 同 id 重投递（即便载荷不同）：返回首次结果，状态机不再前进
    let replay = send_text(&app, "d2", wa, "elegir").await;
    assert!(replay.duplicate);
    assert_eq!(replay.prompt, first.prompt);
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::ChooseMode);
}

#[tokio::test]
async fn test_malformed_input_does_not_advance() {
    let app = setup().await;
    create_raffle(&app, "Rifa Mal", 500, 1, 10).await;
    let wa = "wa-400";

    send_text(&app, "x1", wa, "menu").await;
    send_text(&app, "x2", wa, "1").await;
    send_text(&app, "x3", wa, "elegir").await;

    let out = send_text(&app, "x4", wa, "tres y cuatro").await;
    assert!(out.prompt.text.contains("Formato inválido"));
    assert_eq!(
        contact_by_wa(&app, wa).await.state,
        ContactState::AskPickNumbers
    );
    // 非法输入不触发任何引擎调用
    assert!(order_entity::Entity::find()
        .all(&app.pool)
        .await
        .unwrap()
        .is_empty());

    // 数量越界同样原地重试
    send_text(&app, "x5", wa, "menu").await;
    send_text(&app, "x6", wa, "1").await;
    send_text(&app, "x7", wa, "aleatorio").await;
    let out = send_text(&app, "x8", wa, "51").await;
    assert!(out.prompt.text.contains("Cantidad inválida"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::AskQty);
    assert!(order_entity::Entity::find()
        .all(&app.pool)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_already_taken_keeps_state_and_reports() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa Choque", 500, 1, 10).await;

    // A 先占 3 号
    let a = "wa-500";
    send_text(&app, "a1", a, "menu").await;
    send_text(&app, "a2", a, "1").await;
    send_text(&app, "a3", a, "elegir").await;
    send_text(&app, "a4", a, "3").await;

    // B 尝试同一号码：被拒，停留在选号状态
    let b = "wa-501";
    send_text(&app, "b1", b, "menu").await;
    send_text(&app, "b2", b, "1").await;
    send_text(&app, "b3", b, "elegir").await;
    let out = send_text(&app, "b4", b, "3").await;
    assert!(out.prompt.text.contains("no disponibles"));
    assert_eq!(
        contact_by_wa(&app, b).await.state,
        ContactState::AskPickNumbers
    );

    let ticket = ticket_by_number(&app, raffle_id, 3).await;
    assert_eq!(ticket.status, TicketStatus::Reserved);
}

#[tokio::test]
async fn test_global_cancel_releases_draft() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa Cancel", 500, 1, 10).await;
    let wa = "wa-600";

    send_text(&app, "c1", wa, "menu").await;
    send_text(&app, "c2", wa, "1").await;
    send_text(&app, "c3", wa, "elegir").await;
    send_text(&app, "c4", wa, "2,4").await;

    let contact = contact_by_wa(&app, wa).await;
    let order_id = context_of(&contact).draft_order_id.unwrap();

    let out = send_text(&app, "c5", wa, "cancelar").await;
    assert!(out.prompt.text.contains("Pedido cancelado"));
    let contact = contact_by_wa(&app, wa).await;
    assert_eq!(contact.state, ContactState::Menu);
    assert_eq!(context_of(&contact), ConversationContext::default());

    assert_eq!(
        order_by_id(&app, order_id).await.status,
        OrderStatus::Cancelled
    );
    for n in [2, 4] {
        let ticket = ticket_by_number(&app, raffle_id, n).await;
        assert_eq!(ticket.status, TicketStatus::Available);
    }
}

#[tokio::test]
async fn test_global_menu_releases_unconfirmed_draft() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa Reset", 500, 1, 10).await;
    let wa = "wa-700";

    send_text(&app, "g1", wa, "menu").await;
    send_text(&app, "g2", wa, "1").await;
    send_text(&app, "g3", wa, "elegir").await;
    send_text(&app, "g4", wa, "6").await;

    let order_id = context_of(&contact_by_wa(&app, wa).await)
        .draft_order_id
        .unwrap();

    // 未确认的 DRAFT 订单在回菜单时释放
    send_text(&app, "g5", wa, "menu").await;
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Menu);
    assert_eq!(
        order_by_id(&app, order_id).await.status,
        OrderStatus::Cancelled
    );
    assert_eq!(
        ticket_by_number(&app, raffle_id, 6).await.status,
        TicketStatus::Available
    );
}

#[tokio::test]
async fn test_menu_keeps_pending_payment_order() {
    let app = setup().await;
    let raffle_id = create_raffle(&app, "Rifa Pend", 500, 1, 10).await;
    let wa = "wa-800";

    send_text(&app, "p1", wa, "menu").await;
    send_text(&app, "p2", wa, "1").await;
    send_text(&app, "p3", wa, "elegir").await;
    send_text(&app, "p4", wa, "9").await;
    let order_id = context_of(&contact_by_wa(&app, wa).await)
        .draft_order_id
        .unwrap();
    send_text(&app, "p5", wa, "confirmar").await;

    // 已确认（PENDING_PAYMENT）的订单回菜单时保留，等待凭证/运营处理
    send_text(&app, "p6", wa, "menu").await;
    assert_eq!(
        order_by_id(&app, order_id).await.status,
        OrderStatus::PendingPayment
    );
    assert_eq!(
        ticket_by_number(&app, raffle_id, 9).await.status,
        TicketStatus::Reserved
    );
}

#[tokio::test]
async fn test_help_reemits_prompt_without_mutation() {
    let app = setup().await;
    create_raffle(&app, "Rifa Ayuda", 500, 1, 10).await;
    let wa = "wa-900";

    send_text(&app, "h1", wa, "menu").await;
    send_text(&app, "h2", wa, "1").await;
    send_text(&app, "h3", wa, "aleatorio").await;
    let before = contact_by_wa(&app, wa).await;

    let out = send_text(&app, "h4", wa, "ayuda").await;
    assert!(out.prompt.text.contains("¿Cuántos números"));

    let after = contact_by_wa(&app, wa).await;
    assert_eq!(after.state, before.state);
    assert_eq!(after.context, before.context);
}

#[tokio::test]
async fn test_wait_proof_skip_and_reprompt() {
    let app = setup().await;
    create_raffle(&app, "Rifa Skip", 500, 1, 10).await;
    let wa = "wa-1000";

    send_text(&app, "s1", wa, "menu").await;
    send_text(&app, "s2", wa, "1").await;
    send_text(&app, "s3", wa, "elegir").await;
    send_text(&app, "s4", wa, "1").await;
    send_text(&app, "s5", wa, "confirmar").await;

    // 文本不是凭证：重发上传提示，状态不变
    let out = send_text(&app, "s6", wa, "ya pagué").await;
    assert!(out.prompt.text.contains("comprobante de pago"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::WaitProof);

    let out = send_text(&app, "s7", wa, "saltar").await;
    assert!(out.prompt.text.contains("sin comprobante"));
    assert_eq!(contact_by_wa(&app, wa).await.state, ContactState::Done);
}

#[tokio::test]
async fn test_pick_shortcut_random_inline() {
    let app = setup().await;
    create_raffle(&app, "Rifa Atajo", 500, 1, 10).await;
    let wa = "wa-1100";

    send_text(&app, "q1", wa, "menu").await;
    send_text(&app, "q2", wa, "1").await;
    send_text(&app, "q3", wa, "elegir").await;

    // 'aleatorio N' 在选号状态下直接随机预订
    let out = send_text(&app, "q4", wa, "aleatorio 4").await;
    assert!(out.prompt.text.contains("Pedido Creado"));
    let contact = contact_by_wa(&app, wa).await;
    assert_eq!(contact.state, ContactState::ConfirmReservation);
    let order = order_by_id(&app, context_of(&contact).draft_order_id.unwrap()).await;
    assert_eq!(order.qty, 4);
}
