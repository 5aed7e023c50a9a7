#![allow(dead_code)]

use chrono::{Duration, Utc};
use migration::MigratorTrait;
use rifabot_backend::config::ReservationConfig;
use rifabot_backend::entities::{contact_entity, ticket_entity, ContactState, MessageKind, TicketStatus};
use rifabot_backend::models::{CreateRaffleRequest, DispatchOutcome, InboundEventRequest};
use rifabot_backend::services::{
    DispatchService, FlowService, OrderService, RaffleService, ReservationService,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, Database, DatabaseConnection, EntityTrait,
    QueryFilter, Set,
};
use serde_json::json;

pub struct TestApp {
    pub pool: DatabaseConnection,
    pub raffle_service: RaffleService,
    pub order_service: OrderService,
    pub reservation_service: ReservationService,
    pub dispatch_service: DispatchService,
}

/// 单连接内存库：所有查询命中同一个 SQLite 实例
pub async fn setup() -> TestApp {
    let mut opts = ConnectOptions::new("sqlite::memory:".to_string());
    opts.min_connections(1).max_connections(1).sqlx_logging(false);

    let pool = Database::connect(opts)
        .await
        .expect("connect in-memory sqlite");
    migration::Migrator::up(&pool, None)
        .await
        .expect("run migrations");

    let config = ReservationConfig::default();
    let raffle_service = RaffleService::new(pool.clone());
    let order_service = OrderService::new(pool.clone());
    let reservation_service = ReservationService::new(pool.clone(), config);
    let flow_service = FlowService::new(reservation_service.clone(), raffle_service.clone());
    let dispatch_service = DispatchService::new(pool.clone(), flow_service);

    TestApp {
        pool,
        raffle_service,
        order_service,
        reservation_service,
        dispatch_service,
    }
}

pub async fn create_raffle(app: &TestApp, title: &str, price_cents: i64, min: i64, max: i64) -> i64 {
    app.raffle_service
        .create_raffle(CreateRaffleRequest {
            title: title.to_string(),
            description: None,
            ticket_price_cents: price_cents,
            currency: None,
            min_number: Some(min),
            max_number: max,
            draw_date: None,
        })
        .await
        .expect("create raffle")
        .id
}

pub async fn create_contact(app: &TestApp, wa_id: &str) -> contact_entity::Model {
    let now = Utc::now();
    contact_entity::ActiveModel {
        wa_id: Set(wa_id.to_string()),
        name: Set(None),
        state: Set(ContactState::Menu),
        context: Set(json!({})),
        last_interaction_at: Set(Some(now)),
        created_at: Set(Some(now)),
        updated_at: Set(Some(now)),
        ..Default::default()
    }
    .insert(&app.pool)
    .await
    .expect("create contact")
}

pub async fn contact_by_wa(app: &TestApp, wa_id: &str) -> contact_entity::Model {
    contact_entity::Entity::find()
        .filter(contact_entity::Column::WaId.eq(wa_id))
        .one(&app.pool)
        .await
        .expect("query contact")
        .expect("contact exists")
}

pub async fn ticket_by_number(
    app: &TestApp,
    raffle_id: i64,
    number: i64,
) -> ticket_entity::Model {
    ticket_entity::Entity::find()
        .filter(ticket_entity::Column::RaffleId.eq(raffle_id))
        .filter(ticket_entity::Column::Number.eq(number))
        .one(&app.pool)
        .await
        .expect("query ticket")
        .expect("ticket exists")
}

/// 把某活动当前所有 RESERVED 票的保留期改到过去（模拟超时）
pub async fn backdate_reservations(app: &TestApp, raffle_id: i64) {
    ticket_entity::Entity::update_many()
        .set(ticket_entity::ActiveModel {
            reserved_until: Set(Some(Utc::now() - Duration::hours(1))),
            ..Default::default()
        })
        .filter(ticket_entity::Column::RaffleId.eq(raffle_id))
        .filter(ticket_entity::Column::Status.eq(TicketStatus::Reserved))
        .exec(&app.pool)
        .await
        .expect("backdate reservations");
}

pub fn text_event(id: &str, wa_id: &str, text: &str) -> InboundEventRequest {
    InboundEventRequest {
        wa_message_id: id.to_string(),
        wa_id: wa_id.to_string(),
        name: None,
        kind: MessageKind::Text,
        text: Some(text.to_string()),
        media_id: None,
        payload: None,
    }
}

pub fn image_event(id: &str, wa_id: &str, media_id: &str) -> InboundEventRequest {
    InboundEventRequest {
        wa_message_id: id.to_string(),
        wa_id: wa_id.to_string(),
        name: None,
        kind: MessageKind::Image,
        text: None,
        media_id: Some(media_id.to_string()),
        payload: None,
    }
}

pub async fn send_text(app: &TestApp, id: &str, wa_id: &str, text: &str) -> DispatchOutcome {
    app.dispatch_service
        .dispatch(&text_event(id, wa_id, text))
        .await
        .expect("dispatch text event")
}

pub async fn send_image(app: &TestApp, id: &str, wa_id: &str, media_id: &str) -> DispatchOutcome {
    app.dispatch_service
        .dispatch(&image_event(id, wa_id, media_id))
        .await
        .expect("dispatch image event")
}
