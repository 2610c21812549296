// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operator interrupt.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use signal_hook::consts::SIGINT;
use signal_hook::flag;
use tracing::debug;

use scanhelper_core::error::Result;

/// Exit status used when a second interrupt ends the program at once.
pub const INTERRUPTED_EXIT: i32 = 130;

/// Shared "stop soon" flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token set by the first SIGINT.  A second SIGINT while the flag is
    /// still set terminates the process.
    pub fn install_sigint() -> Result<Self> {
        let token = Self::new();
        flag::register_conditional_shutdown(SIGINT, INTERRUPTED_EXIT, Arc::clone(&token.0))?;
        flag::register(SIGINT, Arc::clone(&token.0))?;
        debug!("interrupt handler installed");
        Ok(token)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
