use crate::models::{ApiResponse, CancelOrderRequest, ConfirmPaymentRequest, OrderQuery};
use crate::services::{OrderService, ReservationService};
use actix_web::{web, HttpResponse, ResponseError, Result};
use log::info;

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    params(
        ("page" = Option<u64>, Query, description = "页码"),
        ("per_page" = Option<u64>, Query, description = "每页数量"),
        ("status" = Option<String>, Query, description = "订单状态过滤"),
        ("raffle_id" = Option<i64>, Query, description = "活动过滤")
    ),
    responses(
        (status = 200, description = "获取订单列表成功")
    )
)]
pub async fn get_orders(
    order_service: web::Data<OrderService>,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    match order_service.get_orders(&query).await {
        Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(
        ("id" = i64, Path, description = "订单ID")
    ),
    responses(
        (status = 200, description = "获取订单成功"),
        (status = 404, description = "订单不存在")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match order_service.get_order(path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(ApiResponse::success(order))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 运营确认收款：与会话流程共用同一引擎操作，状态校验一致
#[utoipa::path(
    post,
    path = "/orders/{id}/confirm-payment",
    tag = "order",
    params(
        ("id" = i64, Path, description = "订单ID")
    ),
    request_body = ConfirmPaymentRequest,
    responses(
        (status = 200, description = "确认收款成功"),
        (status = 404, description = "订单不存在"),
        (status = 409, description = "订单状态不允许确认")
    )
)]
pub async fn confirm_payment(
    reservation_service: web::Data<ReservationService>,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    body: web::Json<ConfirmPaymentRequest>,
) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    let proof = body.into_inner().payment_proof_media_id;

    match reservation_service.confirm_paid(order_id, proof).await {
        Ok(order) => {
            info!("Order {} confirmed by operator", order.id);
            match order_service.get_order(order.id).await {
                Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
                Err(e) => Ok(e.error_response()),
            }
        }
        Err(e) => Ok(e.error_response()),
    }
}

/// 运营取消订单并释放号码（幂等）
#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    tag = "order",
    params(
        ("id" = i64, Path, description = "订单ID")
    ),
    request_body = CancelOrderRequest,
    responses(
        (status = 200, description = "取消成功（重复取消同样返回成功）"),
        (status = 404, description = "订单不存在"),
        (status = 409, description = "已支付订单不可取消")
    )
)]
pub async fn cancel_order(
    reservation_service: web::Data<ReservationService>,
    order_service: web::Data<OrderService>,
    path: web::Path<i64>,
    body: web::Json<CancelOrderRequest>,
) -> Result<HttpResponse> {
    let order_id = path.into_inner();
    let reason = body.into_inner().reason;

    match reservation_service.cancel_order(order_id, reason).await {
        Ok(order) => {
            info!("Order {} cancelled by operator", order.id);
            match order_service.get_order(order.id).await {
                Ok(response) => Ok(HttpResponse::Ok().json(ApiResponse::success(response))),
                Err(e) => Ok(e.error_response()),
            }
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(get_orders))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/confirm-payment", web::post().to(confirm_payment))
            .route("/{id}/cancel", web::post().to(cancel_order)),
    );
}
