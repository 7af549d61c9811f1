// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! Screenshot mode. The capture itself is external tooling; the frontend
//! only runs the player session and reports back so the dispatcher can
//! treat it like any other external app.

use std::path::Path;
use std::time::Duration;

use pincab_model::Settings;
use tracing::{debug, info};
use winit::event_loop::EventLoopProxy;

use crate::launcher::{self, LaunchSpec};

/// Completion message for the event loop.
#[derive(Debug)]
pub struct ScreenshotDone;

/// Launches the player for a capture session. `screenshot_wait` gives the
/// table time to finish loading before the user starts shooting.
pub fn spawn_screenshot_mode<T>(proxy: EventLoopProxy<T>, settings: &Settings, vpx_file: &Path)
where
    T: From<ScreenshotDone> + Send + 'static,
{
    let spec = LaunchSpec::new(settings, vpx_file);
    let wait = Duration::from_secs(settings.screenshot_wait.max(0) as u64);

    std::thread::Builder::new()
        .name("screenshot mode".into())
        .spawn(move || {
            debug!(wait_secs = wait.as_secs(), "entering screenshot mode");
            std::thread::sleep(wait);

            let (result, seconds) = launcher::run(&spec);
            info!(?result, seconds, "screenshot session ended");

            let _ = proxy.send_event(ScreenshotDone.into());
        })
        .expect("failed to spawn screenshot thread");
}
