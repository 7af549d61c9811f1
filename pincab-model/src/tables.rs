// Copyright 2024 Colin Marc <hi@colinmarc.com>
//
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// One navigable table. Media fields are absolute paths, empty when the
/// scanner found nothing for that slot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TableRecord {
    pub vpx_file: PathBuf,
    pub title: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub year: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub music: String,
    #[serde(default)]
    pub launch_audio: String,
    #[serde(default)]
    pub wheel_image: String,
    #[serde(default)]
    pub playfield_image: String,
    #[serde(default)]
    pub playfield_video: String,
    #[serde(default)]
    pub backglass_image: String,
    #[serde(default)]
    pub backglass_video: String,
    #[serde(default)]
    pub dmd_image: String,
    #[serde(default)]
    pub dmd_video: String,
    #[serde(default)]
    pub topper_image: String,
    #[serde(default)]
    pub topper_video: String,

    #[serde(default)]
    pub is_broken: bool,
    #[serde(default)]
    pub play_count: u64,
    #[serde(default)]
    pub play_time_last: f32,
    #[serde(default)]
    pub play_time_total: f32,
}

impl TableRecord {
    /// Applies the outcome of a launch. Healthy exits clear the broken flag
    /// and accrue stats; broken exits only set the flag.
    pub fn record_launch(&mut self, healthy: bool, seconds: f32) {
        if healthy {
            self.is_broken = false;
            self.play_count += 1;
            self.play_time_last = seconds;
            self.play_time_total += seconds;
        } else {
            self.is_broken = true;
        }
    }
}

const INDEX_FILE: &str = "tables.json";

/// The persisted table index: the sink the launch callback writes stats and
/// broken flags through.
pub struct TableIndex {
    path: PathBuf,
}

impl TableIndex {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        TableIndex {
            path: data_dir.as_ref().join(INDEX_FILE),
        }
    }

    pub fn load(&self) -> anyhow::Result<Vec<TableRecord>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no table index yet");
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        let tables: Vec<TableRecord> = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", self.path.display()))?;

        Ok(tables)
    }

    pub fn save(&self, tables: &[TableRecord]) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(tables)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("renaming into {}", self.path.display()))?;

        debug!(count = tables.len(), path = %self.path.display(), "saved table index");
        Ok(())
    }
}

/// Carries stats and broken flags from a previously persisted index over to
/// a freshly scanned table list, matching by vpx path.
pub fn merge_stats(scanned: &mut [TableRecord], persisted: &[TableRecord]) {
    let by_path: HashMap<&Path, &TableRecord> = persisted
        .iter()
        .map(|t| (t.vpx_file.as_path(), t))
        .collect();

    for table in scanned.iter_mut() {
        if let Some(prev) = by_path.get(table.vpx_file.as_path()) {
            table.is_broken = prev.is_broken;
            table.play_count = prev.play_count;
            table.play_time_last = prev.play_time_last;
            table.play_time_total = prev.play_time_total;
        } else {
            warn!(table = %table.vpx_file.display(), "no persisted stats for table");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table(path: &str) -> TableRecord {
        TableRecord {
            vpx_file: PathBuf::from(path),
            title: path.to_owned(),
            ..Default::default()
        }
    }

    #[test]
    fn record_launch_healthy_accrues_stats() {
        let mut t = TableRecord {
            play_count: 4,
            play_time_total: 800.0,
            is_broken: true,
            ..table("/games/mm.vpx")
        };

        t.record_launch(true, 120.0);

        assert_eq!(t.play_count, 5);
        assert_eq!(t.play_time_last, 120.0);
        assert_eq!(t.play_time_total, 920.0);
        assert!(!t.is_broken);
    }

    #[test]
    fn record_launch_broken_leaves_stats() {
        let mut t = TableRecord {
            play_count: 4,
            play_time_total: 800.0,
            ..table("/games/mm.vpx")
        };

        t.record_launch(false, 60.0);

        assert_eq!(t.play_count, 4);
        assert_eq!(t.play_time_total, 800.0);
        assert!(t.is_broken);
    }

    #[test]
    fn index_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let index = TableIndex::new(dir.path());

        assert_eq!(index.load().unwrap(), vec![]);

        let tables = vec![table("/games/a.vpx"), table("/games/b.vpx")];
        index.save(&tables).unwrap();
        assert_eq!(index.load().unwrap(), tables);
    }

    #[test]
    fn merge_stats_matches_by_path() {
        let persisted = vec![TableRecord {
            play_count: 9,
            is_broken: true,
            ..table("/games/a.vpx")
        }];

        let mut scanned = vec![table("/games/a.vpx"), table("/games/b.vpx")];
        merge_stats(&mut scanned, &persisted);

        assert_eq!(scanned[0].play_count, 9);
        assert!(scanned[0].is_broken);
        assert_eq!(scanned[1].play_count, 0);
    }
}
