pub mod contacts;
pub mod inbound_messages;
pub mod order_tickets;
pub mod orders;
pub mod raffles;
pub mod tickets;

pub use contacts as contact_entity;
pub use inbound_messages as inbound_message_entity;
pub use order_tickets as order_ticket_entity;
pub use orders as order_entity;
pub use raffles as raffle_entity;
pub use tickets as ticket_entity;

pub use contacts::ContactState;
pub use inbound_messages::MessageKind;
pub use orders::OrderStatus;
pub use tickets::TicketStatus;
