pub mod core;
pub mod llm;
pub mod main_module;
pub mod tickets;
