//! `TaskBoard`: Kanban board with optimistic drag-and-drop status changes.

pub mod app;
pub mod board;
pub mod config;
pub mod drag;
pub mod gateway;
pub mod notice;
pub mod optimistic;
pub mod store;
pub mod sync;
pub mod ui;
