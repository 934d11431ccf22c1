//! Button controller for a headless Pi-hole display running PADD in tmux.
//!
//! GPIO edges become [`model::ButtonEvent`]s, the [`dispatcher`] feeds them to the
//! [`coordinator::FlowCoordinator`], and confirmed actions run as external commands
//! while their output streams into the tmux control window.

pub mod app;
pub mod backlight;
pub mod config;
pub mod coordinator;
pub mod dispatcher;
pub mod doctor;
pub mod executor;
pub mod flow;
pub mod hold;
pub mod input;
mod lock;
pub mod model;
pub mod presentation;
pub mod telemetry;
pub mod timer;

pub(crate) use lock::lock_or_recover;
