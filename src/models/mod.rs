pub mod command;
pub mod event;
pub mod journey;
pub mod optimization;
pub mod stop;
