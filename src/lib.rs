pub mod api;
pub mod auth_form;
pub mod calendar;
pub mod config;
pub mod draw;
pub mod error;
pub mod http;
pub mod notify;
pub mod session;
pub mod task;
pub mod task_board;
pub mod ui;
