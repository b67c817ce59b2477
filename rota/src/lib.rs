// Recurring task scheduling: calendar-triggered schedules, interval-triggered
// cycles, and dependency-ordered startup of the subsystems hosting them.

pub mod boot;
pub mod clock;
pub mod config;
pub mod engine;
pub mod errors;
pub mod history;
pub mod models;
pub mod registry;
pub mod telemetry;
