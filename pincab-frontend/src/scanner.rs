// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

//! Table discovery: walks the tables directory for `.vpx` files, resolves
//! each table's media from the per-table layout settings, and merges in the
//! persisted stats. Runs on a background thread during startup and rescans.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pincab_model::tables::{merge_stats, TableIndex};
use pincab_model::{Settings, TableRecord};
use tracing::{info, warn};
use winit::event_loop::EventLoopProxy;

/// Completion message: the freshly scanned table list.
#[derive(Debug)]
pub struct ScanComplete(pub Vec<TableRecord>);

/// Resolves a per-table relative media path, or empty when the file isn't
/// there.
fn resolve(table_dir: &Path, relative: &str) -> String {
    if relative.is_empty() {
        return String::new();
    }

    let path = table_dir.join(relative);
    if path.is_file() {
        path.to_string_lossy().into_owned()
    } else {
        String::new()
    }
}

/// Falls back to the shared default media under the data directory.
fn resolve_with_default(table_dir: &Path, relative: &str, data_dir: &Path, default: &str) -> String {
    let custom = resolve(table_dir, relative);
    if !custom.is_empty() {
        return custom;
    }

    resolve(data_dir, default)
}

fn record_for(vpx: &Path, settings: &Settings, data_dir: &Path) -> TableRecord {
    let dir = vpx.parent().unwrap_or(Path::new("")).to_path_buf();
    let title = vpx
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    TableRecord {
        vpx_file: vpx.to_path_buf(),
        title,
        music: resolve(&dir, &settings.table_music),
        launch_audio: resolve(&dir, &settings.custom_launch_sound),
        wheel_image: resolve_with_default(
            &dir,
            &settings.custom_wheel_image,
            data_dir,
            &settings.default_wheel_image,
        ),
        playfield_image: resolve_with_default(
            &dir,
            &settings.custom_playfield_image,
            data_dir,
            &settings.default_playfield_image,
        ),
        playfield_video: resolve_with_default(
            &dir,
            &settings.custom_playfield_video,
            data_dir,
            &settings.default_playfield_video,
        ),
        backglass_image: resolve_with_default(
            &dir,
            &settings.custom_backglass_image,
            data_dir,
            &settings.default_backglass_image,
        ),
        backglass_video: resolve_with_default(
            &dir,
            &settings.custom_backglass_video,
            data_dir,
            &settings.default_backglass_video,
        ),
        dmd_image: resolve_with_default(
            &dir,
            &settings.custom_dmd_image,
            data_dir,
            &settings.default_dmd_image,
        ),
        dmd_video: resolve_with_default(
            &dir,
            &settings.custom_dmd_video,
            data_dir,
            &settings.default_dmd_video,
        ),
        topper_image: resolve_with_default(
            &dir,
            &settings.custom_topper_image,
            data_dir,
            &settings.default_topper_image,
        ),
        topper_video: resolve_with_default(
            &dir,
            &settings.custom_topper_video,
            data_dir,
            &settings.default_topper_video,
        ),
        ..Default::default()
    }
}

/// Scans synchronously. Returns the table list sorted by title, with
/// persisted stats merged in.
pub fn scan(settings: &Settings, data_dir: &Path) -> Vec<TableRecord> {
    let root = PathBuf::from(&settings.vpx_tables_path);
    let start = Instant::now();

    let mut tables: Vec<TableRecord> = walkdir::WalkDir::new(&root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "error walking tables directory");
                None
            }
        })
        .filter(|e| {
            e.file_type().is_file()
                && e.path()
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("vpx"))
        })
        .map(|e| record_for(e.path(), settings, data_dir))
        .collect();

    tables.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));

    match TableIndex::new(data_dir).load() {
        Ok(persisted) => merge_stats(&mut tables, &persisted),
        Err(e) => warn!("failed to load persisted table stats: {:#}", e),
    }

    info!(
        count = tables.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "scanned tables"
    );

    tables
}

/// Spawns the scanner thread. `loading` is set for the scan's duration; the
/// result arrives as a user event. A newer scan's result simply supersedes
/// an older one on the main thread.
pub fn spawn_scan<T>(
    proxy: EventLoopProxy<T>,
    settings: Settings,
    data_dir: PathBuf,
    loading: Arc<AtomicBool>,
) where
    T: From<ScanComplete> + Send + 'static,
{
    loading.store(true, Ordering::SeqCst);

    std::thread::Builder::new()
        .name("table scanner".into())
        .spawn(move || {
            let tables = scan(&settings, &data_dir);
            loading.store(false, Ordering::SeqCst);
            let _ = proxy.send_event(ScanComplete(tables).into());
        })
        .expect("failed to spawn scanner thread");
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    #[test]
    fn scans_recursively_and_sorts_by_title() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        write(&tables.join("Zen/Zen Table.vpx"));
        write(&tables.join("mm/Medieval Madness.vpx"));
        write(&tables.join("aladdin.vpx"));

        let settings = Settings {
            vpx_tables_path: tables.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let found = scan(&settings, dir.path());
        let titles: Vec<_> = found.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["aladdin", "Medieval Madness", "Zen Table"]);
    }

    #[test]
    fn resolves_table_media_when_present() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        write(&tables.join("mm/Medieval Madness.vpx"));
        write(&tables.join("mm/images/wheel.png"));
        write(&tables.join("mm/video/table.mp4"));

        let settings = Settings {
            vpx_tables_path: tables.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let found = scan(&settings, dir.path());
        assert_eq!(found.len(), 1);
        assert!(found[0].wheel_image.ends_with("mm/images/wheel.png"));
        assert!(found[0].playfield_video.ends_with("mm/video/table.mp4"));
        // Nothing on disk for the backglass and no default media installed.
        assert_eq!(found[0].backglass_image, "");
    }

    #[test]
    fn falls_back_to_default_media() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        write(&tables.join("mm/Medieval Madness.vpx"));
        write(&dir.path().join("img/default_backglass.png"));

        let settings = Settings {
            vpx_tables_path: tables.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let found = scan(&settings, dir.path());
        assert!(found[0]
            .backglass_image
            .ends_with("img/default_backglass.png"));
    }

    #[test]
    fn merges_persisted_stats() {
        let dir = tempfile::tempdir().unwrap();
        let tables = dir.path().join("tables");
        let vpx = tables.join("mm/Medieval Madness.vpx");
        write(&vpx);

        let index = TableIndex::new(dir.path());
        index
            .save(&[TableRecord {
                vpx_file: vpx.clone(),
                title: "Medieval Madness".into(),
                play_count: 12,
                ..Default::default()
            }])
            .unwrap();

        let settings = Settings {
            vpx_tables_path: tables.to_string_lossy().into_owned(),
            ..Default::default()
        };

        let found = scan(&settings, dir.path());
        assert_eq!(found[0].play_count, 12);
    }
}
