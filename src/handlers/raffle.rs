use crate::models::{ApiResponse, CreateRaffleRequest, RaffleListQuery};
use crate::services::RaffleService;
use actix_web::{web, HttpResponse, ResponseError, Result};

#[utoipa::path(
    get,
    path = "/raffles",
    tag = "raffle",
    params(
        ("active" = Option<bool>, Query, description = "只看活动中的（默认 true）")
    ),
    responses(
        (status = 200, description = "获取活动列表成功")
    )
)]
pub async fn get_raffles(
    raffle_service: web::Data<RaffleService>,
    query: web::Query<RaffleListQuery>,
) -> Result<HttpResponse> {
    let active_only = query.active.unwrap_or(true);
    match raffle_service.list_raffles(active_only).await {
        Ok(raffles) => Ok(HttpResponse::Ok().json(ApiResponse::success(raffles))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/raffles",
    tag = "raffle",
    request_body = CreateRaffleRequest,
    responses(
        (status = 200, description = "创建活动并生成号码成功"),
        (status = 400, description = "参数校验失败")
    )
)]
pub async fn create_raffle(
    raffle_service: web::Data<RaffleService>,
    body: web::Json<CreateRaffleRequest>,
) -> Result<HttpResponse> {
    match raffle_service.create_raffle(body.into_inner()).await {
        Ok(raffle) => Ok(HttpResponse::Ok().json(ApiResponse::success(raffle))),
        Err(e) => Ok(e.error_response()),
    }
}

/// 只读可用性查询：仅反映已提交状态
#[utoipa::path(
    get,
    path = "/raffles/{id}/availability",
    tag = "raffle",
    params(
        ("id" = i64, Path, description = "活动ID")
    ),
    responses(
        (status = 200, description = "获取可用性成功"),
        (status = 404, description = "活动不存在")
    )
)]
pub async fn get_availability(
    raffle_service: web::Data<RaffleService>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match raffle_service.availability(path.into_inner()).await {
        Ok(availability) => Ok(HttpResponse::Ok().json(ApiResponse::success(availability))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn raffle_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/raffles")
            .route("", web::get().to(get_raffles))
            .route("", web::post().to(create_raffle))
            .route("/{id}/availability", web::get().to(get_availability)),
    );
}
