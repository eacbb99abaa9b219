pub mod coordinator;
pub mod dispatch;
pub mod queue;
pub mod response;
pub mod supervisor;
