pub mod classifier;
pub mod config;
pub mod feedback;
pub mod llm;
pub mod routing;
pub mod shared;
pub mod tickets;
