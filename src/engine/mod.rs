pub mod commands;
pub mod deviation;
pub mod grouping;
pub mod journeys;
pub mod optimizer;
pub mod reoptimize;
pub mod state_machine;
pub mod time_window;
pub mod tour;
