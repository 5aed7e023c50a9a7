pub mod dispatch_service;
pub mod flow_service;
pub mod messages_es;
pub mod order_service;
pub mod raffle_service;
pub mod reservation_service;

pub use dispatch_service::*;
pub use flow_service::*;
pub use order_service::*;
pub use raffle_service::*;
pub use reservation_service::*;
