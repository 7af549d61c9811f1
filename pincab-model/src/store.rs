// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::keybinds::KeybindStore;
use crate::reload::ReloadSet;
use crate::schema::{field, Section, SCHEMA};
use crate::settings::Settings;

const SETTINGS_FILE: &str = "settings.json";
const KEYBINDS_SECTION: &str = "Keybinds";

/// Reasons the configuration cannot support a frontend startup.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("tables path {0:?} is not a directory")]
    TablesPathMissing(PathBuf),
    #[error("no .vpx files found under {0:?}")]
    NoTablesFound(PathBuf),
    #[error("player executable {0:?} does not exist")]
    PlayerMissing(PathBuf),
    #[error("player path {0:?} is not an executable file")]
    PlayerNotExecutable(PathBuf),
}

/// Owns the persisted settings document: the typed record, the keybind
/// table, and whatever unknown keys earlier (or later) versions left behind.
pub struct SettingsStore {
    path: PathBuf,
    data_dir: PathBuf,
    pub settings: Settings,
    pub keybinds: KeybindStore,
    baseline: Settings,
    unknown: BTreeMap<String, BTreeMap<String, String>>,
}

impl SettingsStore {
    /// Reads `settings.json` from the data directory, creating it with
    /// defaults on first run. Unparsable known fields keep their defaults;
    /// unknown fields are preserved for the next save.
    pub fn load(data_dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let data_dir = data_dir.as_ref().to_owned();
        let path = data_dir.join(SETTINGS_FILE);

        let mut this = SettingsStore {
            path,
            data_dir,
            settings: Settings::default(),
            keybinds: KeybindStore::default(),
            baseline: Settings::default(),
            unknown: BTreeMap::new(),
        };

        if !this.path.exists() {
            info!(path = %this.path.display(), "no settings document, writing defaults");
            this.settings.sanitize();
            this.baseline = this.settings.clone();
            this.write_document()?;
            return Ok(this);
        }

        let content = std::fs::read_to_string(&this.path)
            .with_context(|| format!("reading {}", this.path.display()))?;
        let doc: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", this.path.display()))?;

        let Value::Object(sections) = doc else {
            anyhow::bail!("{} is not a JSON object", this.path.display());
        };

        for (section, body) in sections {
            let Value::Object(entries) = body else {
                warn!(section = %section, "settings section is not an object, skipping");
                continue;
            };

            if section == KEYBINDS_SECTION {
                let persisted: BTreeMap<String, String> = entries
                    .into_iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_owned())))
                    .collect();
                this.keybinds.load(&persisted);
                continue;
            }

            for (key, value) in entries {
                let raw = match value {
                    Value::String(s) => s,
                    other => other.to_string(),
                };

                match field(&key) {
                    Some(spec) => {
                        if let Err(e) = (spec.set)(&mut this.settings, &raw) {
                            error!("{}, keeping default", e);
                        }
                    }
                    None => {
                        warn!(section = %section, key = %key, "unknown settings key, preserving");
                        this.unknown.entry(section.clone()).or_default().insert(key, raw);
                    }
                }
            }
        }

        this.settings.sanitize();
        this.baseline = this.settings.clone();

        Ok(this)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Persists the current state and returns the union of reload effects
    /// over all fields that differ from the last persisted state.
    pub fn save(&mut self) -> anyhow::Result<ReloadSet> {
        self.settings.sanitize();

        let mut effects = ReloadSet::default();
        for spec in SCHEMA.iter() {
            if (spec.get)(&self.baseline) != (spec.get)(&self.settings) {
                debug!(key = spec.key, effect = ?spec.reload, "settings field changed");
                effects.insert(spec.reload);
            }
        }

        self.write_document()?;
        self.baseline = self.settings.clone();

        Ok(effects)
    }

    fn write_document(&self) -> anyhow::Result<()> {
        let mut doc = Map::new();

        for section in Section::ORDER {
            let mut body = Map::new();
            for spec in SCHEMA.iter().filter(|f| f.section == section) {
                body.insert(
                    spec.key.to_owned(),
                    Value::String((spec.get)(&self.settings).to_persist_string()),
                );
            }

            if let Some(extra) = self.unknown.get(section.label()) {
                for (key, raw) in extra {
                    body.insert(key.clone(), Value::String(raw.clone()));
                }
            }

            doc.insert(section.label().to_owned(), Value::Object(body));
        }

        let keybinds: Map<String, Value> = self
            .keybinds
            .save()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        doc.insert(KEYBINDS_SECTION.to_owned(), Value::Object(keybinds));

        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating {}", self.data_dir.display()))?;

        let content = serde_json::to_string_pretty(&Value::Object(doc))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;

        Ok(())
    }

    /// Whether the configuration can support a frontend startup: the tables
    /// directory holds at least one `.vpx` (recursively), and the player
    /// path is an executable file.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let tables = PathBuf::from(&self.settings.vpx_tables_path);
        if !tables.is_dir() {
            return Err(SettingsError::TablesPathMissing(tables));
        }

        let has_vpx = walkdir::WalkDir::new(&tables)
            .into_iter()
            .filter_map(|e| e.ok())
            .any(|e| {
                e.file_type().is_file()
                    && e.path()
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("vpx"))
            });
        if !has_vpx {
            return Err(SettingsError::NoTablesFound(tables));
        }

        let player = PathBuf::from(&self.settings.vpinball_x_path);
        if !player.is_file() {
            return Err(SettingsError::PlayerMissing(player));
        }

        if !is_executable(&player) {
            return Err(SettingsError::PlayerNotExecutable(player));
        }

        Ok(())
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keybinds::{Action, Binding};
    use crate::reload::ReloadType;
    use pretty_assertions::assert_eq;

    #[test_log::test]
    fn first_load_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path()).unwrap();

        assert!(dir.path().join("settings.json").exists());
        assert_eq!(store.settings, Settings::default());
    }

    #[test_log::test]
    fn save_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path()).unwrap();

        store.settings.playfield_x = 17;
        store.settings.font_color = crate::settings::Color::rgba(1, 2, 3, 4);
        store.settings.metadata_panel_alpha = 0.35;
        store.settings.show_dmd = false;
        store
            .keybinds
            .set(Action::LaunchTable, Binding::Button { joystick: 0, button: 1 });
        store.save().unwrap();

        let restored = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(restored.settings, store.settings);
        assert_eq!(restored.keybinds, store.keybinds);
    }

    #[test_log::test]
    fn save_computes_union_of_reload_effects() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path()).unwrap();

        store.settings.show_dmd = false;
        store.settings.master_vol = 20.0;
        let effects = store.save().unwrap();

        assert!(effects.contains(ReloadType::Windows));
        assert!(effects.contains(ReloadType::Audio));
        assert!(!effects.contains(ReloadType::Font));

        // A second save with no changes is a no-op diff.
        assert!(store.save().unwrap().is_empty());
    }

    #[test_log::test]
    fn unknown_keys_survive_a_load_save_cycle() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SettingsStore::load(dir.path()).unwrap();
            store.save().unwrap();
        }

        // Inject a key no schema entry covers.
        let path = dir.path().join("settings.json");
        let mut doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc["Internal"]["FutureKnob"] = Value::String("7".to_owned());
        std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

        let mut store = SettingsStore::load(dir.path()).unwrap();
        store.save().unwrap();

        let doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["Internal"]["FutureKnob"], Value::String("7".to_owned()));
    }

    #[test_log::test]
    fn unparsable_field_keeps_default() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut store = SettingsStore::load(dir.path()).unwrap();
            store.save().unwrap();
        }

        let path = dir.path().join("settings.json");
        let mut doc: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        doc["WindowSettings"]["PlayfieldWidth"] = Value::String("wide".to_owned());
        std::fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

        let store = SettingsStore::load(dir.path()).unwrap();
        assert_eq!(store.settings.playfield_window_width, 1080);
    }

    #[test_log::test]
    fn validate_requires_tables_and_player() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SettingsStore::load(dir.path()).unwrap();

        assert!(matches!(
            store.validate(),
            Err(SettingsError::TablesPathMissing(_))
        ));

        let tables = dir.path().join("tables");
        std::fs::create_dir_all(tables.join("sub")).unwrap();
        store.settings.vpx_tables_path = tables.to_string_lossy().into_owned();

        assert!(matches!(
            store.validate(),
            Err(SettingsError::NoTablesFound(_))
        ));

        std::fs::write(tables.join("sub/game.vpx"), b"").unwrap();
        assert!(matches!(
            store.validate(),
            Err(SettingsError::PlayerMissing(_))
        ));

        let player = dir.path().join("vpinballx");
        std::fs::write(&player, b"#!/bin/sh\n").unwrap();
        store.settings.vpinball_x_path = player.to_string_lossy().into_owned();

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            assert!(matches!(
                store.validate(),
                Err(SettingsError::PlayerNotExecutable(_))
            ));

            let mut perms = std::fs::metadata(&player).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&player, perms).unwrap();
        }

        store.validate().unwrap();
    }
}
