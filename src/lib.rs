#![doc(test(attr(deny(warnings))))]

//! Fieldwork Core offers accounting-period lifecycle, working-paper, and
//! signoff primitives that power audit fieldwork workflows.

pub mod core;
pub mod domain;
pub mod errors;
pub mod storage;
pub mod utils;

use std::sync::Once;

static INIT_TRACING: Once = Once::new();

/// Initializes global tracing and emits a startup info log.
pub fn init() {
    INIT_TRACING.call_once(|| {
        utils::init_tracing();
        tracing::info!("Fieldwork Core tracing initialized.");
    });
}
