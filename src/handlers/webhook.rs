use crate::models::{ApiResponse, InboundEventRequest};
use crate::services::DispatchService;
use actix_web::{web, HttpResponse, Result};
use log::{error, info};

/// WhatsApp webhook处理器
///
/// 接收网关已解码的入站事件（签名校验与报文拆解在上游完成），
/// 经幂等分发器处理后返回出站提示描述，由外部投递方负责发送
#[utoipa::path(
    post,
    path = "/webhook/whatsapp",
    tag = "webhook",
    request_body = InboundEventRequest,
    responses(
        (status = 200, description = "事件已处理（或为重复投递的回放）")
    )
)]
pub async fn whatsapp_webhook(
    dispatch_service: web::Data<DispatchService>,
    body: web::Json<InboundEventRequest>,
) -> Result<HttpResponse> {
    let event = body.into_inner();

    info!(
        "Received inbound event {} from {} ({:?})",
        event.wa_message_id, event.wa_id, event.kind
    );

    match dispatch_service.dispatch(&event).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(ApiResponse::success(outcome))),
        Err(e) => {
            error!(
                "Failed to process inbound event {}: {e}",
                event.wa_message_id
            );
            // 返回200状态码避免服务商重试风暴；幂等闸保证重投递安全
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "received": true,
                "error": format!("Processing failed: {e}")
            })))
        }
    }
}

/// 配置webhook路由
pub fn webhook_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/webhook").route("/whatsapp", web::post().to(whatsapp_webhook)));
}
