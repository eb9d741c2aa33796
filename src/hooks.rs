// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Pre/post call hooks (§4.10): two optional callbacks invoked before
// serialization begins and after the reply (or send, for oneway) completes.
// The default watchdog implementation arms a timer in `pre` and disarms it
// in `post`, invoking a user callback on expiry — useful as a deadman's
// switch asserting the peer hasn't frozen.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::thread::Semaphore;

/// A pair of callbacks a `ClientManager`/`Server` runs around each call.
pub struct PrePostHooks {
    pre: Box<dyn FnMut() + Send>,
    post: Box<dyn FnMut() + Send>,
}

impl PrePostHooks {
    pub fn new(pre: impl FnMut() + Send + 'static, post: impl FnMut() + Send + 'static) -> Self {
        Self { pre: Box::new(pre), post: Box::new(post) }
    }

    pub fn pre(&mut self) {
        (self.pre)();
    }

    pub fn post(&mut self) {
        (self.post)();
    }

    /// The default watchdog: `pre` releases a background timer thread which
    /// invokes `on_expiry` if `post` doesn't run within `timeout`.
    pub fn watchdog(timeout: Duration, on_expiry: impl Fn() + Send + Sync + 'static) -> Self {
        let state = Arc::new(WatchdogState {
            armed: AtomicBool::new(false),
            wake: Semaphore::new(0),
        });
        let worker_state = state.clone();
        let on_expiry = Arc::new(on_expiry);
        let worker_expiry = on_expiry.clone();
        let _handle: JoinHandle<()> = std::thread::spawn(move || loop {
            // Block until armed, then race the timeout against being
            // disarmed by `post`.
            if worker_state.wake.get(None).is_err() {
                return;
            }
            if !worker_state.armed.load(Ordering::Acquire) {
                continue;
            }
            match worker_state.wake.get(Some(timeout)) {
                Ok(()) => { /* disarmed in time by `post` */ }
                Err(_) => {
                    if worker_state.armed.load(Ordering::Acquire) {
                        (worker_expiry)();
                    }
                }
            }
        });

        let pre_state = state.clone();
        let post_state = state;
        Self::new(
            move || {
                pre_state.armed.store(true, Ordering::Release);
                pre_state.wake.put();
            },
            move || {
                post_state.armed.store(false, Ordering::Release);
                post_state.wake.put();
            },
        )
    }
}

struct WatchdogState {
    armed: AtomicBool,
    wake: Semaphore,
}
