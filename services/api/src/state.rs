//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like the database pool, the conversation engine, and
//! the telephony gateway.

use crate::config::Config;
use crate::telephony::TelephonyGateway;
use std::sync::Arc;
use switchboard_core::{events::BroadcastHub, lifecycle::CallLifecycle};

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub lifecycle: Arc<CallLifecycle>,
    pub events: BroadcastHub,
    pub gateway: Arc<dyn TelephonyGateway>,
    pub config: Arc<Config>,
}
