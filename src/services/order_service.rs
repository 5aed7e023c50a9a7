use crate::entities::{order_entity, order_ticket_entity, ticket_entity};
use crate::error::{AppError, AppResult};
use crate::models::{OrderQuery, OrderResponse, PaginatedResponse, PaginationParams};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect,
};

/// 运营侧订单查询（只读；订单状态变更归预订引擎）
#[derive(Clone)]
pub struct OrderService {
    pool: DatabaseConnection,
}

impl OrderService {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    pub async fn get_orders(
        &self,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut find = order_entity::Entity::find();
        if let Some(status) = query.status {
            find = find.filter(order_entity::Column::Status.eq(status));
        }
        if let Some(raffle_id) = query.raffle_id {
            find = find.filter(order_entity::Column::RaffleId.eq(raffle_id));
        }

        let total = find.clone().count(&self.pool).await?;

        let orders = find
            .order_by_desc(order_entity::Column::CreatedAt)
            .limit(params.per_page())
            .offset(params.offset())
            .all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(orders.len());
        for order in orders {
            let numbers = self.ticket_numbers(order.id).await?;
            items.push(OrderResponse::from_model_with_numbers(order, numbers));
        }

        Ok(PaginatedResponse::new(items, &params, total))
    }

    pub async fn get_order(&self, order_id: i64) -> AppResult<OrderResponse> {
        let order = order_entity::Entity::find_by_id(order_id)
            .one(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Order {order_id}")))?;
        let numbers = self.ticket_numbers(order.id).await?;
        Ok(OrderResponse::from_model_with_numbers(order, numbers))
    }

    /// 订单关联号码（经由 order_tickets 关联，票释放后仍可追溯）
    async fn ticket_numbers(&self, order_id: i64) -> AppResult<Vec<i64>> {
        let links = order_ticket_entity::Entity::find()
            .filter(order_ticket_entity::Column::OrderId.eq(order_id))
            .all(&self.pool)
            .await?;
        let ids: Vec<i64> = links.iter().map(|l| l.ticket_id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let tickets = ticket_entity::Entity::find()
            .filter(ticket_entity::Column::Id.is_in(ids))
            .order_by_asc(ticket_entity::Column::Number)
            .all(&self.pool)
            .await?;
        Ok(tickets.into_iter().map(|t| t.number).collect())
    }
}
