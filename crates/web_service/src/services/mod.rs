pub mod dispatcher;
pub mod outbound;
pub mod update_router;

pub use dispatcher::TelegramDispatcher;
pub use update_router::UpdateRouter;
