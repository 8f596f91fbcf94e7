pub mod models;

pub use models::{
    ChatRole, ChatTurn, Classification, FeedbackOutcome, Priority, RequestKind, SupportLine,
    TargetSystem, Theme, TicketStatus,
};
