mod coordinator;
mod dispatcher;
pub mod messages;
mod registry;
pub mod room;
mod scoring;

pub use coordinator::GameCoordinator;
pub use room::GameRoom;
