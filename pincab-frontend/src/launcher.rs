// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! The table launcher: spawns the external player, measures the session,
//! and classifies the exit. UI-side state (debounce, media resumption) is
//! the input dispatcher's business; this module only does the process work.

use std::path::Path;
use std::process::Command;
use std::time::Instant;

use pincab_model::Settings;
use tracing::{debug, error, info};
use winit::event_loop::EventLoopProxy;

/// How a player session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchResult {
    /// Exit was clean or on the healthy-code whitelist.
    Healthy,
    /// The mapped non-zero exit code; marks the table broken.
    Broken(i32),
    /// fork/exec failed; neither stats nor the broken flag change.
    SpawnFailed(String),
}

#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub index: usize,
    pub result: LaunchResult,
    pub seconds: f32,
}

/// A fully-assembled launch: program, argv tail, and the exit-code
/// whitelist.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchSpec {
    pub program: String,
    pub args: Vec<String>,
    pub healthy_codes: Vec<i32>,
}

impl LaunchSpec {
    /// Assembles `{start_args} {player} {sub_cmd} {vpx_file} {end_args}`.
    /// The table path goes in as a single argv entry and is never
    /// re-tokenised.
    pub fn new(settings: &Settings, vpx_file: &Path) -> Self {
        let mut tokens: Vec<String> = settings
            .vpx_start_args
            .split_whitespace()
            .map(str::to_owned)
            .collect();

        tokens.push(settings.vpinball_x_path.clone());
        if !settings.vpx_sub_cmd.is_empty() {
            tokens.push(settings.vpx_sub_cmd.clone());
        }
        tokens.push(vpx_file.to_string_lossy().into_owned());
        tokens.extend(settings.vpx_end_args.split_whitespace().map(str::to_owned));

        let program = tokens.remove(0);

        LaunchSpec {
            program,
            args: tokens,
            healthy_codes: parse_healthy_codes(&settings.launcher_healthy_exit_codes),
        }
    }
}

/// Parses the configured whitelist of healthy exit codes. Garbage entries
/// are skipped; an empty result still treats 0 as healthy.
pub fn parse_healthy_codes(raw: &str) -> Vec<i32> {
    let mut codes: Vec<i32> = raw
        .split(',')
        .filter_map(|part| part.trim().parse().ok())
        .collect();

    if !codes.contains(&0) {
        codes.push(0);
    }

    codes
}

/// Maps a raw exit status to the callback result: 0 for healthy (including
/// whitelisted user-abort codes), the raw code otherwise. Signal deaths map
/// to `128 + signal` first, so a SIGSEGV shows up as 139.
pub fn classify_exit(code: Option<i32>, signal: Option<i32>, healthy_codes: &[i32]) -> i32 {
    let raw = match (code, signal) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => -1,
    };

    if healthy_codes.contains(&raw) {
        0
    } else {
        raw
    }
}

/// Runs the player to completion. Blocking; called from the supervisor
/// thread.
pub fn run(spec: &LaunchSpec) -> (LaunchResult, f32) {
    debug!(program = %spec.program, args = ?spec.args, "spawning player");
    let start = Instant::now();

    let mut child = match Command::new(&spec.program).args(&spec.args).spawn() {
        Ok(child) => child,
        Err(e) => {
            error!(program = %spec.program, error = %e, "failed to spawn player");
            return (LaunchResult::SpawnFailed(e.to_string()), 0.0);
        }
    };

    let status = match child.wait() {
        Ok(status) => status,
        Err(e) => {
            error!(error = %e, "failed to wait for player");
            return (LaunchResult::SpawnFailed(e.to_string()), 0.0);
        }
    };

    let seconds = start.elapsed().as_secs_f32();

    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };
    #[cfg(not(unix))]
    let signal = None;

    let mapped = classify_exit(status.code(), signal, &spec.healthy_codes);
    info!(
        code = ?status.code(),
        ?signal,
        mapped,
        seconds,
        "player exited"
    );

    if mapped == 0 {
        (LaunchResult::Healthy, seconds)
    } else {
        (LaunchResult::Broken(mapped), seconds)
    }
}

/// Spawns the supervisor thread for one launch. The completion message is
/// posted back to the main thread's event loop.
pub fn spawn_launch<T>(proxy: EventLoopProxy<T>, spec: LaunchSpec, index: usize)
where
    T: From<LaunchOutcome> + Send + 'static,
{
    std::thread::Builder::new()
        .name("table launch".into())
        .spawn(move || {
            let (result, seconds) = run(&spec);
            let _ = proxy.send_event(
                LaunchOutcome {
                    index,
                    result,
                    seconds,
                }
                .into(),
            );
        })
        .expect("failed to spawn launch supervisor thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn settings() -> Settings {
        Settings {
            vpinball_x_path: "/opt/vpinball/VPinballX".into(),
            vpx_sub_cmd: "-Play".into(),
            ..Default::default()
        }
    }

    #[test]
    fn assembles_argv_in_order() {
        let mut s = settings();
        s.vpx_start_args = "gamemoderun".into();
        s.vpx_end_args = "-exit now".into();

        let spec = LaunchSpec::new(&s, &PathBuf::from("/games/m m.vpx"));

        assert_eq!(spec.program, "gamemoderun");
        assert_eq!(
            spec.args,
            vec![
                "/opt/vpinball/VPinballX",
                "-Play",
                "/games/m m.vpx",
                "-exit",
                "now"
            ]
        );
    }

    #[test]
    fn table_path_with_spaces_stays_one_argument() {
        let spec = LaunchSpec::new(&settings(), &PathBuf::from("/games/Medieval Madness.vpx"));
        assert_eq!(spec.program, "/opt/vpinball/VPinballX");
        assert_eq!(spec.args, vec!["-Play", "/games/Medieval Madness.vpx"]);
    }

    #[test]
    fn healthy_codes_always_include_zero() {
        assert_eq!(parse_healthy_codes("0,130,143"), vec![0, 130, 143]);
        assert_eq!(parse_healthy_codes(""), vec![0]);
        assert_eq!(parse_healthy_codes("130, junk"), vec![130, 0]);
    }

    #[test]
    fn exit_classification() {
        let healthy = vec![0, 130, 143];

        assert_eq!(classify_exit(Some(0), None, &healthy), 0);
        // Whitelisted user-abort codes do not mark the table broken.
        assert_eq!(classify_exit(Some(130), None, &healthy), 0);
        assert_eq!(classify_exit(Some(1), None, &healthy), 1);
        // SIGSEGV maps to 139 and stays broken.
        assert_eq!(classify_exit(None, Some(11), &healthy), 139);
        // SIGINT maps to 130, which the default whitelist covers.
        assert_eq!(classify_exit(None, Some(2), &healthy), 0);
    }

    #[test]
    fn run_reports_healthy_exit() {
        let spec = LaunchSpec {
            program: "true".into(),
            args: vec![],
            healthy_codes: vec![0],
        };

        let (result, _) = run(&spec);
        assert_eq!(result, LaunchResult::Healthy);
    }

    #[test]
    fn run_reports_broken_exit() {
        let spec = LaunchSpec {
            program: "false".into(),
            args: vec![],
            healthy_codes: vec![0],
        };

        let (result, _) = run(&spec);
        assert_eq!(result, LaunchResult::Broken(1));
    }

    #[test]
    fn run_reports_spawn_failure() {
        let spec = LaunchSpec {
            program: "/nonexistent/player".into(),
            args: vec![],
            healthy_codes: vec![0],
        };

        let (result, _) = run(&spec);
        assert!(matches!(result, LaunchResult::SpawnFailed(_)));
    }
}
