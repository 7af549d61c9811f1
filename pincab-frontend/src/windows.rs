// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use anyhow::Context as _;
use pincab_model::{Role, Settings};
use tracing::{debug, error, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event_loop::EventLoopWindowTarget;
use winit::window::{Window, WindowBuilder, WindowId};

use crate::gfx::{GfxContext, WindowGfx};

/// One cabinet window and its presentable surface.
pub struct CabWindow {
    pub window: Arc<Window>,
    pub gfx: WindowGfx,
}

impl CabWindow {
    pub fn size(&self) -> (u32, u32) {
        self.gfx.size()
    }
}

/// C4: the up-to-four window/renderer pairs, reconciled against settings.
pub struct WindowSet {
    windows: [Option<CabWindow>; 4],
    /// Bumped whenever a renderer is created or destroyed; cache entries are
    /// tagged with it.
    pub generation: u64,
}

fn scaled(value: i32, settings: &Settings) -> u32 {
    let value = value.max(1);
    if settings.enable_dpi_scaling {
        (value as f32 * settings.dpi_scale) as u32
    } else {
        value as u32
    }
}

fn window_title(role: Role) -> &'static str {
    match role {
        Role::Playfield => "Playfield",
        Role::Backglass => "Backglass",
        Role::Dmd => "DMD",
        Role::Topper => "Topper",
    }
}

impl WindowSet {
    /// Builds the set around the already-created playfield window (the one
    /// the graphics context was initialised against).
    pub fn new(playfield: Arc<Window>, playfield_gfx: WindowGfx) -> Self {
        WindowSet {
            windows: [
                Some(CabWindow {
                    window: playfield,
                    gfx: playfield_gfx,
                }),
                None,
                None,
                None,
            ],
            generation: 0,
        }
    }

    pub fn get(&self, role: Role) -> Option<&CabWindow> {
        self.windows[index(role)].as_ref()
    }

    pub fn get_mut(&mut self, role: Role) -> Option<&mut CabWindow> {
        self.windows[index(role)].as_mut()
    }

    pub fn role_of(&self, id: WindowId) -> Option<Role> {
        Role::ALL
            .into_iter()
            .find(|role| self.get(*role).is_some_and(|w| w.window.id() == id))
    }

    /// The current on-screen geometry of a window, unscaled back to the
    /// settings domain.
    pub fn current_geometry(&self, role: Role, settings: &Settings) -> Option<(i32, i32, i32, i32)> {
        let cab = self.get(role)?;
        let pos = cab.window.outer_position().ok()?;
        let size = cab.window.inner_size();

        let (width, height) = if settings.enable_dpi_scaling {
            (
                (size.width as f32 / settings.dpi_scale) as i32,
                (size.height as f32 / settings.dpi_scale) as i32,
            )
        } else {
            (size.width as i32, size.height as i32)
        };

        Some((pos.x, pos.y, width, height))
    }

    /// Reconciles windows against settings: creates, moves, resizes or
    /// destroys as needed. Returns true when any renderer was created or
    /// destroyed, in which case the caches must be invalidated.
    pub fn update<T>(
        &mut self,
        gfx: &GfxContext,
        target: &EventLoopWindowTarget<T>,
        settings: &Settings,
    ) -> anyhow::Result<bool> {
        let mut changed = false;

        for role in Role::ALL {
            let show = settings.show_role(role);
            let (x, y, w, h) = settings.window_rect(role);
            let width = scaled(w, settings);
            let height = scaled(h, settings);
            let slot = index(role);

            if !show {
                if self.windows[slot].take().is_some() {
                    debug!(role = role.name(), "destroying window");
                    changed = true;
                }
                continue;
            }

            if self.windows[slot].is_none() {
                debug!(role = role.name(), width, height, x, y, "creating window");
                self.windows[slot] = Some(create_window(gfx, target, role, width, height, x, y)?);
                changed = true;
                continue;
            }

            let needs_recreate = {
                let cab = self.windows[slot].as_mut().unwrap();
                let current = cab.window.inner_size();
                let position = cab.window.outer_position().unwrap_or_default();
                let position_matches = x < 0 || y < 0 || (position.x == x && position.y == y);

                if current.width == width && current.height == height && position_matches {
                    false
                } else {
                    let _ = cab
                        .window
                        .request_inner_size(PhysicalSize::new(width, height));
                    if x >= 0 && y >= 0 {
                        cab.window.set_outer_position(PhysicalPosition::new(x, y));
                    }

                    // Tiling window managers may refuse; fall back to a full
                    // recreate when the OS reports a mismatch.
                    let actual = cab.window.inner_size();
                    if actual.width == width && actual.height == height {
                        cab.gfx.resize(gfx, width, height);
                        false
                    } else {
                        warn!(
                            role = role.name(),
                            requested_w = width,
                            requested_h = height,
                            actual_w = actual.width,
                            actual_h = actual.height,
                            "window geometry refused, recreating"
                        );
                        true
                    }
                }
            };

            if needs_recreate {
                self.windows[slot] = None;
                self.windows[slot] = Some(create_window(gfx, target, role, width, height, x, y)?);
                changed = true;
            }
        }

        if changed {
            self.generation += 1;
        }

        Ok(changed)
    }

    pub fn handle_resized(&mut self, gfx: &GfxContext, id: WindowId, width: u32, height: u32) {
        if let Some(role) = self.role_of(id) {
            if let Some(cab) = self.get_mut(role) {
                cab.gfx.resize(gfx, width, height);
            }
        }
    }

    pub fn request_redraw_all(&self) {
        for role in Role::ALL {
            if let Some(cab) = self.get(role) {
                cab.window.request_redraw();
            }
        }
    }
}

fn create_window<T>(
    gfx: &GfxContext,
    target: &EventLoopWindowTarget<T>,
    role: Role,
    width: u32,
    height: u32,
    x: i32,
    y: i32,
) -> anyhow::Result<CabWindow> {
    let mut builder = WindowBuilder::new()
        .with_title(window_title(role))
        .with_inner_size(PhysicalSize::new(width, height))
        .with_decorations(false);

    if x >= 0 && y >= 0 {
        builder = builder.with_position(PhysicalPosition::new(x, y));
    }

    let window = Arc::new(
        builder
            .build(target)
            .with_context(|| format!("creating {} window", role.name()))?,
    );

    let window_gfx = gfx.create_window_gfx(window.clone()).map_err(|e| {
        error!(role = role.name(), "failed to create renderer: {:#}", e);
        e
    })?;

    Ok(CabWindow {
        window,
        gfx: window_gfx,
    })
}

fn index(role: Role) -> usize {
    match role {
        Role::Playfield => 0,
        Role::Backglass => 1,
        Role::Dmd => 2,
        Role::Topper => 3,
    }
}
