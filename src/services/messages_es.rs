//! Mensajes en español para el bot de WhatsApp.
//! 所有用户可见文案集中于此，业务代码只负责拼装参数。

use crate::entities::raffle_entity;
use crate::error::ReservationError;

pub const MSG_WELCOME: &str =
    "¡Bienvenido! Escribe 'menu' para ver las rifas activas y participar.";

pub const MSG_NO_ACTIVE_RAFFLES: &str =
    "No hay rifas activas en este momento. ¡Vuelve pronto!";

pub const MSG_INVALID_SELECTION: &str =
    "Selección inválida. Por favor ingresa un número de rifa o escribe 'menu'.";

pub const MSG_CHOOSE_MODE: &str = "¿Cómo te gustaría seleccionar tus números?\n\n\
1. Escribe 'elegir' para escoger números específicos\n\
2. Escribe 'aleatorio' para números al azar";

pub const MSG_ASK_QTY: &str =
    "¿Cuántos números deseas comprar? Responde con una cantidad (ej: '5').";

pub const MSG_INVALID_NUMBER_FORMAT: &str =
    "Formato inválido. Por favor ingresa números separados por comas o espacios (ej: '5,12,99')";

pub const MSG_ORDER_CANCELLED: &str = "Pedido cancelado. Tus números han sido liberados.";

pub const MSG_CONFIRM_OR_CANCEL: &str =
    "Por favor escribe 'confirmar' para continuar o 'cancelar' para cancelar el pedido.";

pub const MSG_PAYMENT_PROOF_RECEIVED: &str = "✅ ¡Comprobante de pago recibido!\n\n\
Tu pedido está en revisión. Serás notificado una vez confirmado.\n\n\
Escribe 'menu' para volver al menú principal.";

pub const MSG_PAYMENT_PROOF_REQUEST: &str =
    "Por favor envía una foto o captura de pantalla de tu comprobante de pago.\n\n\
Escribe 'saltar' si deseas enviar sin comprobante.";

pub const MSG_PAYMENT_SKIPPED: &str =
    "Pedido guardado sin comprobante de pago. El administrador se pondrá en contacto contigo.\n\n\
Escribe 'menu' para volver al menú principal.";

pub const MSG_SESSION_EXPIRED: &str = "Sesión expirada. Escribe 'menu' para comenzar de nuevo.";

pub const MSG_RAFFLE_NOT_AVAILABLE: &str =
    "Rifa ya no disponible. Escribe 'menu' para ver rifas activas.";

pub const MSG_WRITE_MENU: &str = "Escribe 'menu' para volver al menú principal.";

pub const MSG_TRY_DIFFERENT_NUMBERS: &str =
    "\nPor favor intenta con números diferentes o escribe 'menu'.";

pub const MSG_TRY_DIFFERENT_QUANTITY: &str =
    "\nPor favor intenta con una cantidad diferente o escribe 'menu'.";

pub const MSG_TRY_AGAIN_LATER: &str =
    "El sistema está ocupado. Por favor intenta de nuevo en unos segundos.";

pub const MSG_ORDER_ALREADY_PAID: &str =
    "Este pedido ya fue pagado y no puede cancelarse.";

/// 金额格式化：最小货币单位 -> "5.00"
pub fn format_amount(cents: i64) -> String {
    format!("{}.{:02}", cents / 100, (cents % 100).abs())
}

/// 主菜单（活动列表）
pub fn menu_text(raffles: &[(raffle_entity::Model, i64)]) -> String {
    let mut lines = vec!["*Rifas Activas:*\n".to_string()];
    for (idx, (raffle, available)) in raffles.iter().enumerate() {
        lines.push(format!(
            "{}. *{}*\n   Precio: {} {}\n   Disponibles: {}/{}\n",
            idx + 1,
            raffle.title,
            raffle.currency,
            format_amount(raffle.ticket_price_cents),
            available,
            raffle.total_tickets()
        ));
    }
    lines.push(format!(
        "\nResponde con el número de rifa (1-{}) para participar.",
        raffles.len()
    ));
    lines.join("\n")
}

/// 活动详情 + 选号方式引导
pub fn raffle_details_text(raffle: &raffle_entity::Model, available: i64, sold: i64) -> String {
    format!(
        "*{}*\n\n{}\n\n💰 Precio: {} {} por número\n🎫 Números: {} - {}\n✅ Disponibles: {}/{}\n🔥 Vendidos: {}/{}\n\n{}",
        raffle.title,
        raffle.description,
        raffle.currency,
        format_amount(raffle.ticket_price_cents),
        raffle.min_number,
        raffle.max_number,
        available,
        raffle.total_tickets(),
        sold,
        raffle.total_tickets(),
        MSG_CHOOSE_MODE
    )
}

/// 选号引导（支持 'aleatorio N' 快捷方式）
pub fn ask_numbers_text(raffle: &raffle_entity::Model) -> String {
    format!(
        "Escribe los números que deseas ({} - {}), separados por comas o espacios (ej: '5,12,99').\n\n\
También puedes escribir 'aleatorio N' para N números al azar.",
        raffle.min_number, raffle.max_number
    )
}

/// 预订成功，等待确认
pub fn order_created_text(
    raffle_title: &str,
    numbers: &[i64],
    qty: i64,
    currency: &str,
    total_cents: i64,
    timeout_minutes: i64,
) -> String {
    let numbers_str = numbers
        .iter()
        .map(|n| n.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "✅ *¡Pedido Creado!*\n\nRifa: {}\nNúmeros: {}\nCantidad: {}\nTotal: {} {}\n\n\
⏰ Reservado por {} minutos\n\n¿Confirmas este pedido?\n\
1. Escribe 'confirmar' para continuar\n2. Escribe 'cancelar' para cancelar",
        raffle_title,
        numbers_str,
        qty,
        currency,
        format_amount(total_cents),
        timeout_minutes
    )
}

/// 支付指引
pub fn payment_instructions_text(currency: &str, total_cents: i64, order_id: i64) -> String {
    format!(
        "💳 *Instrucciones de Pago*\n\nMonto: {} {}\n\n\
Por favor realiza el pago y envía una captura de pantalla o foto del comprobante de pago.\n\n\
¡Una vez verificado, tus números serán confirmados!\n\nPedido #{}",
        currency,
        format_amount(total_cents),
        order_id
    )
}

/// 数量越界（本地校验，不触发引擎调用）
pub fn qty_out_of_bounds_text(min: i64, max: i64) -> String {
    format!(
        "Cantidad inválida. Ingresa un número entre {min} y {max}."
    )
}

/// 引擎错误的用户文案
pub fn reservation_error_text(err: &ReservationError) -> String {
    match err {
        ReservationError::OutOfRange(numbers) => {
            let list = numbers
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("❌ Números fuera de rango: {list}{MSG_TRY_DIFFERENT_NUMBERS}")
        }
        ReservationError::AlreadyTaken(numbers) => {
            let list = numbers
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            format!("❌ Números no disponibles: {list}{MSG_TRY_DIFFERENT_NUMBERS}")
        }
        ReservationError::EmptySelection => {
            format!("❌ No seleccionaste ningún número.{MSG_TRY_DIFFERENT_NUMBERS}")
        }
        ReservationError::InsufficientAvailability {
            available,
            requested,
        } => format!(
            "❌ Solo quedan {available} número(s) disponibles, pediste {requested}.{MSG_TRY_DIFFERENT_QUANTITY}"
        ),
        ReservationError::RaffleInactive => MSG_RAFFLE_NOT_AVAILABLE.to_string(),
        ReservationError::InvalidTransition(_) => MSG_SESSION_EXPIRED.to_string(),
        ReservationError::NotFound(_) => MSG_SESSION_EXPIRED.to_string(),
        ReservationError::TransientConflict => MSG_TRY_AGAIN_LATER.to_string(),
        ReservationError::InvalidQuantity(msg) => format!("❌ {msg}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(500), "5.00");
        assert_eq!(format_amount(1), "0.01");
        assert_eq!(format_amount(12345), "123.45");
    }
}
