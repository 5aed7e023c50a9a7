use actix_web::web;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{ContactState, MessageKind, OrderStatus, TicketStatus};
use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::webhook::whatsapp_webhook,
        handlers::raffle::get_raffles,
        handlers::raffle::create_raffle,
        handlers::raffle::get_availability,
        handlers::order::get_orders,
        handlers::order::get_order,
        handlers::order::confirm_payment,
        handlers::order::cancel_order,
    ),
    components(
        schemas(
            InboundEventRequest,
            MessageKind,
            DispatchOutcome,
            Prompt,
            PromptChoice,
            ConversationContext,
            SelectionMode,
            ContactState,
            TicketStatus,
            OrderStatus,
            RaffleResponse,
            RaffleListQuery,
            CreateRaffleRequest,
            AvailabilityResponse,
            OrderResponse,
            OrderQuery,
            ConfirmPaymentRequest,
            CancelOrderRequest,
            PaginationParams,
            PaginationInfo,
            ApiError,
        )
    ),
    tags(
        (name = "webhook", description = "Inbound event intake"),
        (name = "raffle", description = "Raffle management API"),
        (name = "order", description = "Operator order API"),
    ),
    info(
        title = "Rifabot Backend API",
        version = "1.0.0",
        description = "Raffle ticket reservation backend REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}
