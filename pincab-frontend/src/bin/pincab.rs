// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::{debug, error, info, warn};
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, MouseButton, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoopBuilder, EventLoopProxy, EventLoopWindowTarget};
use winit::keyboard::PhysicalKey;
use winit::window::WindowBuilder;

use pincab_frontend::assets::AssetManager;
use pincab_frontend::gfx::{GfxContext, Texture};
use pincab_frontend::input::{Command, InputDispatcher};
use pincab_frontend::launcher::{self, LaunchOutcome, LaunchResult, LaunchSpec};
use pincab_frontend::scanner::{self, ScanComplete};
use pincab_frontend::screenshot::{self, ScreenshotDone};
use pincab_frontend::sound::{SoundManager, UiSound};
use pincab_frontend::windows::WindowSet;
use pincab_frontend::{gamepad, keys, overlay, render, title};
use pincab_model::input::InputEvent;
use pincab_model::tables::TableIndex;
use pincab_model::{Role, SettingsStore, TableRecord};

const FRAME_TIME: Duration = Duration::from_nanos(1_000_000_000 / 60);

#[derive(Debug, Parser)]
#[command(name = "pincab")]
#[command(about = "A multi-window virtual pinball cabinet frontend", long_about = None)]
struct Cli {
    /// Print the version.
    #[arg(short, long)]
    version: bool,
    /// The data directory holding settings.json and tables.json. Defaults
    /// to ~/.local/share/pincab.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,
}

enum AppEvent {
    Input(InputEvent),
    TablesLoaded(Vec<TableRecord>),
    LaunchFinished(LaunchOutcome),
    ScreenshotFinished,
}

impl From<InputEvent> for AppEvent {
    fn from(ev: InputEvent) -> Self {
        AppEvent::Input(ev)
    }
}

impl From<ScanComplete> for AppEvent {
    fn from(ev: ScanComplete) -> Self {
        AppEvent::TablesLoaded(ev.0)
    }
}

impl From<LaunchOutcome> for AppEvent {
    fn from(ev: LaunchOutcome) -> Self {
        AppEvent::LaunchFinished(ev)
    }
}

impl From<ScreenshotDone> for AppEvent {
    fn from(_: ScreenshotDone) -> Self {
        AppEvent::ScreenshotFinished
    }
}

struct App {
    store: SettingsStore,
    table_index: TableIndex,

    gfx: GfxContext,
    window_set: WindowSet,
    assets: AssetManager,
    sound: SoundManager,
    dispatcher: InputDispatcher,

    proxy: EventLoopProxy<AppEvent>,
    loading: Arc<AtomicBool>,

    tables: Vec<TableRecord>,
    current_index: usize,

    metadata_visible: bool,
    metadata_texture: Option<(usize, Texture)>,

    started_at: Instant,
    next_frame: Instant,
    should_quit: bool,
}

impl App {
    fn handle(
        &mut self,
        event: Event<AppEvent>,
        elwt: &EventLoopWindowTarget<AppEvent>,
    ) -> Result<()> {
        match event {
            Event::UserEvent(AppEvent::Input(input)) => {
                let command = self.dispatcher.handle_event(
                    &input,
                    &self.store.keybinds,
                    &self.tables,
                    self.current_index,
                    Instant::now(),
                );

                if let Some(command) = command {
                    self.apply_command(command, elwt)?;
                }
            }
            Event::UserEvent(AppEvent::TablesLoaded(tables)) => {
                info!(count = tables.len(), "tables loaded");
                self.tables = tables;
                self.dispatcher.tables_loaded();

                if self.current_index >= self.tables.len() {
                    self.current_index = 0;
                }

                if let Err(e) = self.table_index.save(&self.tables) {
                    warn!("failed to persist table index: {:#}", e);
                }

                self.assets.invalidate();
                self.load_current_table();
            }
            Event::UserEvent(AppEvent::LaunchFinished(outcome)) => {
                self.handle_launch_finished(outcome);
            }
            Event::UserEvent(AppEvent::ScreenshotFinished) => {
                self.dispatcher.external_app_returned(Instant::now());
                self.resume_media();
            }
            Event::WindowEvent { window_id, event } => match event {
                WindowEvent::CloseRequested => {
                    self.should_quit = true;
                }
                WindowEvent::Resized(size) => {
                    self.window_set
                        .handle_resized(&self.gfx, window_id, size.width, size.height);
                }
                WindowEvent::KeyboardInput {
                    event:
                        KeyEvent {
                            physical_key: PhysicalKey::Code(code),
                            state: ElementState::Pressed,
                            repeat: false,
                            ..
                        },
                    ..
                } => {
                    if let Some(key) = keys::winit_key_to_key(code) {
                        let command = self.dispatcher.handle_event(
                            &InputEvent::KeyDown(key),
                            &self.store.keybinds,
                            &self.tables,
                            self.current_index,
                            Instant::now(),
                        );

                        if let Some(command) = command {
                            self.apply_command(command, elwt)?;
                        }
                    }
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => {
                    let command = self
                        .dispatcher
                        .handle_click(u64::from(window_id), Instant::now());
                    if let Some(command) = command {
                        self.apply_command(command, elwt)?;
                    }
                }
                WindowEvent::RedrawRequested => {
                    if let Some(role) = self.window_set.role_of(window_id) {
                        self.render_role(role);
                    }
                }
                _ => (),
            },
            Event::AboutToWait => {
                let now = Instant::now();
                if now >= self.next_frame {
                    self.window_set.request_redraw_all();
                    self.next_frame = now + FRAME_TIME;
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(self.next_frame));
            }
            _ => (),
        }

        Ok(())
    }

    fn apply_command(
        &mut self,
        command: Command,
        elwt: &EventLoopWindowTarget<AppEvent>,
    ) -> Result<()> {
        debug!(?command, "applying command");

        match command {
            Command::LoadTable { index, sound } => {
                self.current_index = index;
                self.load_current_table();
                self.sound.play_ui(sound);
                self.metadata_texture = None;
            }
            Command::Launch { index } => {
                let Some(table) = self.tables.get(index) else {
                    return Ok(());
                };

                // Quiesce frontend media before handing the displays over.
                self.sound.stop_music();
                self.assets.stop_all_players();

                if table.launch_audio.is_empty() {
                    self.sound.play_ui(UiSound::LaunchTable);
                } else {
                    let launch_audio = table.launch_audio.clone();
                    self.sound.play_custom_launch(&launch_audio);
                }

                let spec = LaunchSpec::new(&self.store.settings, &table.vpx_file);
                launcher::spawn_launch(self.proxy.clone(), spec, index);
            }
            Command::Screenshot { index } => {
                let Some(table) = self.tables.get(index) else {
                    return Ok(());
                };

                self.sound.play_ui(UiSound::LaunchScreenshot);
                self.sound.stop_music();
                self.assets.stop_all_players();

                screenshot::spawn_screenshot_mode(
                    self.proxy.clone(),
                    &self.store.settings,
                    &table.vpx_file,
                );
            }
            Command::ModalToggled => {
                self.sound.play_ui(UiSound::PanelToggle);
            }
            Command::ToggleMetadataPanel => {
                self.metadata_visible = !self.metadata_visible;
                self.sound.play_ui(UiSound::PanelToggle);
            }
            Command::CommitWindowLayout => {
                self.commit_window_layout(elwt)?;
            }
            Command::Quit => {
                self.should_quit = true;
            }
        }

        Ok(())
    }

    fn load_current_table(&mut self) {
        self.assets.load_table(
            &self.gfx,
            &self.window_set,
            &self.store.settings,
            &self.tables,
            self.current_index,
            &mut self.sound,
        );
    }

    fn handle_launch_finished(&mut self, outcome: LaunchOutcome) {
        match &outcome.result {
            LaunchResult::Healthy => {
                if let Some(table) = self.tables.get_mut(outcome.index) {
                    table.record_launch(true, outcome.seconds);
                }
            }
            LaunchResult::Broken(code) => {
                error!(code = *code, "player exit marks table broken");
                if let Some(table) = self.tables.get_mut(outcome.index) {
                    table.record_launch(false, outcome.seconds);
                }
            }
            LaunchResult::SpawnFailed(reason) => {
                // Neither stats nor the broken flag change.
                error!(reason = %reason, "failed to launch player");
            }
        }

        if let Err(e) = self.table_index.save(&self.tables) {
            error!("failed to persist table stats: {:#}", e);
        }

        // Media resumption and the debounce stamp happen before the next
        // input poll; the user cannot re-launch mid-transition.
        self.dispatcher.external_app_returned(Instant::now());
        self.resume_media();
        self.metadata_texture = None;
    }

    fn resume_media(&mut self) {
        let music = self
            .tables
            .get(self.current_index)
            .map(|t| t.music.clone())
            .unwrap_or_default();
        self.sound.play_table_music(&music);
        self.assets.resume_all_players();
    }

    /// Persists the windows' current geometry (the user dragged them into
    /// place and double-clicked).
    fn commit_window_layout(&mut self, elwt: &EventLoopWindowTarget<AppEvent>) -> Result<()> {
        for role in Role::ALL {
            let Some((x, y, w, h)) = self
                .window_set
                .current_geometry(role, &self.store.settings)
            else {
                continue;
            };

            let settings = &mut self.store.settings;
            match role {
                Role::Playfield => {
                    settings.playfield_x = x;
                    settings.playfield_y = y;
                    settings.playfield_window_width = w;
                    settings.playfield_window_height = h;
                }
                Role::Backglass => {
                    settings.backglass_x = x;
                    settings.backglass_y = y;
                    settings.backglass_window_width = w;
                    settings.backglass_window_height = h;
                }
                Role::Dmd => {
                    settings.dmd_x = x;
                    settings.dmd_y = y;
                    settings.dmd_window_width = w;
                    settings.dmd_window_height = h;
                }
                Role::Topper => {
                    settings.topper_x = x;
                    settings.topper_y = y;
                    settings.topper_window_width = w;
                    settings.topper_window_height = h;
                }
            }
        }

        let mut effects = self.store.save().context("persisting window layout")?;
        // The geometry commit always re-checks assets; with only positions
        // changed the asset manager's fast path makes it free.
        effects.insert(pincab_model::ReloadType::Assets);
        info!(?effects, "committed window layout");
        self.sound.play_ui(UiSound::ScreenshotTake);

        self.apply_reload_effects(effects, elwt)
    }

    /// Dispatches reload effects in the fixed order the schema defines.
    fn apply_reload_effects(
        &mut self,
        effects: pincab_model::ReloadSet,
        elwt: &EventLoopWindowTarget<AppEvent>,
    ) -> Result<()> {
        use pincab_model::ReloadType;

        for effect in effects.in_order() {
            debug!(?effect, "applying reload effect");

            match effect {
                ReloadType::None => {}
                ReloadType::Font => {
                    self.assets
                        .set_font(title::load_font(&self.store.settings.font_path));
                    self.assets.reload_title_textures(
                        &self.gfx,
                        &self.store.settings,
                        self.tables.get(self.current_index),
                    );
                }
                ReloadType::Title => {
                    self.assets.reload_title_textures(
                        &self.gfx,
                        &self.store.settings,
                        self.tables.get(self.current_index),
                    );
                }
                ReloadType::Windows => {
                    let changed =
                        self.window_set
                            .update(&self.gfx, elwt, &self.store.settings)?;
                    if changed {
                        self.assets.handle_windows_recreated();
                        self.load_current_table();
                    }
                }
                ReloadType::Assets => {
                    // The fast path applies when the relevant subset is
                    // unchanged (e.g. only window positions moved).
                    self.load_current_table();
                }
                ReloadType::Tables => {
                    self.dispatcher.tables_loading();
                    scanner::spawn_scan(
                        self.proxy.clone(),
                        self.store.settings.clone(),
                        self.store.data_dir().to_owned(),
                        self.loading.clone(),
                    );
                }
                ReloadType::Audio => {
                    self.sound.update_settings(&self.store.settings);
                    self.assets.apply_audio_settings(&self.store.settings);
                }
                ReloadType::Overlay => {
                    self.metadata_texture = None;
                }
            }
        }

        Ok(())
    }

    fn render_role(&mut self, role: Role) {
        let Some(cab) = self.window_set.get(role) else {
            return;
        };

        let mut shapes = Vec::new();
        if role == Role::Playfield {
            if let Some(table) = self.tables.get(self.current_index) {
                let (width, height) = cab.size();
                shapes = overlay::build(
                    &self.store.settings,
                    table,
                    self.current_index,
                    self.tables.len(),
                    width as f32,
                    height as f32,
                    self.started_at.elapsed().as_secs_f32(),
                    self.metadata_visible && self.store.settings.show_metadata,
                );

                if self.metadata_visible && self.store.settings.show_metadata {
                    self.ensure_metadata_texture();
                }
            }
        }

        let metadata_texture = if role == Role::Playfield
            && self.metadata_visible
            && self.store.settings.show_metadata
        {
            self.metadata_texture.as_ref().map(|(_, t)| t)
        } else {
            None
        };

        // Re-borrow after the mutable work above.
        let cab = self.window_set.get(role).unwrap();
        let slot = self.assets.slot_mut(role);

        match render::render_window(
            &self.gfx,
            cab,
            slot,
            &self.store.settings,
            role,
            &shapes,
            metadata_texture,
        ) {
            Ok(()) => {}
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                debug!(role = role.name(), "surface lost, will reconfigure on resize");
            }
            Err(e) => warn!(role = role.name(), error = %e, "render error"),
        }
    }

    fn ensure_metadata_texture(&mut self) {
        if self
            .metadata_texture
            .as_ref()
            .is_some_and(|(index, _)| *index == self.current_index)
        {
            return;
        }

        let Some(table) = self.tables.get(self.current_index) else {
            return;
        };

        let lines = overlay::metadata_lines(table).join("\n");
        let settings = &self.store.settings;

        let Some(cab) = self.window_set.get(Role::Playfield) else {
            return;
        };
        let (width, height) = cab.size();
        let panel_w = (width as f32 * settings.metadata_panel_width) as u32;
        let panel_h = (height as f32 * settings.metadata_panel_height) as u32;

        let font = title::load_font(&settings.font_path);
        self.metadata_texture = title::render_panel(
            &self.gfx,
            font.as_ref(),
            &lines,
            settings.effective_font_size(),
            settings.font_color,
            pincab_model::Color::rgba(0, 0, 0, 0),
            panel_w.max(1),
            panel_h.max(1),
        )
        .map(|texture| (self.current_index, texture));
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();

    if args.version {
        println!("pincab {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    init_logging()?;

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };

    debug!(data_dir = %data_dir.display(), "starting up");

    let store = SettingsStore::load(&data_dir).context("failed to load settings")?;
    if let Err(e) = store.validate() {
        // The configuration editor is external tooling; without a valid
        // config there is nothing to run.
        error!("configuration invalid: {}", e);
        error!(
            "edit {} and restart",
            data_dir.join("settings.json").display()
        );
        bail!("configuration invalid");
    }

    let sound = SoundManager::new(&store.settings).context("failed to open audio device")?;

    let event_loop = EventLoopBuilder::<AppEvent>::with_user_event()
        .build()
        .context("failed to create event loop")?;
    let proxy = event_loop.create_proxy();

    // The playfield window is created first; the graphics context is built
    // against it and shared by the other windows.
    let settings = &store.settings;
    let (x, y, w, h) = settings.window_rect(Role::Playfield);
    let mut builder = WindowBuilder::new()
        .with_title("Playfield")
        .with_inner_size(PhysicalSize::new(
            scaled_dim(w, settings),
            scaled_dim(h, settings),
        ))
        .with_decorations(false);
    if x >= 0 && y >= 0 {
        builder = builder.with_position(PhysicalPosition::new(x, y));
    }
    let playfield = Arc::new(
        builder
            .build(&event_loop)
            .context("failed to create playfield window")?,
    );

    let (gfx, playfield_gfx) = GfxContext::new(playfield.clone())?;
    let mut window_set = WindowSet::new(playfield, playfield_gfx);
    window_set.update(&gfx, &event_loop, &store.settings)?;

    let font = title::load_font(&store.settings.font_path);
    let assets = AssetManager::new(font);

    if let Err(e) = gamepad::spawn_gamepad_monitor(proxy.clone()) {
        // Joysticks are optional; keyboard-only cabinets are fine.
        warn!("gamepad support unavailable: {:#}", e);
    }

    let loading = Arc::new(AtomicBool::new(false));
    scanner::spawn_scan(
        proxy.clone(),
        store.settings.clone(),
        data_dir.clone(),
        loading.clone(),
    );

    let now = Instant::now();
    let mut app = App {
        table_index: TableIndex::new(&data_dir),
        store,

        gfx,
        window_set,
        assets,
        sound,
        dispatcher: InputDispatcher::new(),

        proxy,
        loading,

        tables: Vec::new(),
        current_index: 0,

        metadata_visible: false,
        metadata_texture: None,

        started_at: now,
        next_frame: now,
        should_quit: false,
    };

    info!("entering main loop");

    event_loop.run(move |event, elwt| {
        if let Err(e) = app.handle(event, elwt) {
            error!("fatal: {:#}", e);
            app.should_quit = true;
        }

        if app.should_quit && !elwt.exiting() {
            info!("shutting down");
            app.assets.cleanup_video_players();
            if let Err(e) = app.table_index.save(&app.tables) {
                warn!("failed to persist table index: {:#}", e);
            }
            elwt.exit();
        }
    })?;

    Ok(())
}

fn scaled_dim(value: i32, settings: &pincab_model::Settings) -> u32 {
    let value = value.max(1) as f32;
    if settings.enable_dpi_scaling {
        (value * settings.dpi_scale) as u32
    } else {
        value as u32
    }
}

fn default_data_dir() -> Result<PathBuf> {
    let home = std::env::var_os("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".local/share/pincab"))
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive("pincab=info".parse()?)
                .from_env_lossy(),
        )
        .init();

    Ok(())
}
