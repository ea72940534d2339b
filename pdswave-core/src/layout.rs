//! Detector-side grid layout for summary plots.
//!
//! Each side is drawn as a row of pads; every pad is a `rows x columns`
//! grid of panels. The panel at `(row, column)` of a pad with base channel
//! `b` shows channel `b + rows * (columns - 1 - column) + row`, i.e. the
//! rightmost column holds the first `rows` channels of the pad.

use crate::channel_map::ChannelLocation;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// One detector side: a named canvas with its pads, left to right.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SideLayout {
    /// Name used in output file names, e.g. `side_1`.
    pub name: String,
    /// Base channel of each pad.
    pub pads: Vec<usize>,
}

/// A panel position and the channel it shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PanelCell {
    /// Pad index within the side, left to right.
    pub pad: usize,
    /// Row within the pad, top to bottom.
    pub row: usize,
    /// Column within the pad, left to right.
    pub column: usize,
    /// Offline channel shown.
    pub channel: usize,
}

/// Grid layout shared by all sides.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Panel columns per pad.
    pub columns: usize,
    /// Panel rows per pad.
    pub rows: usize,
    /// Sides, one canvas pair (charge, persistence) each.
    pub sides: Vec<SideLayout>,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            columns: 4,
            rows: 10,
            sides: vec![
                SideLayout {
                    name: "side_1".to_string(),
                    pads: vec![120, 80],
                },
                SideLayout {
                    name: "side_2".to_string(),
                    pads: vec![40, 0],
                },
            ],
        }
    }
}

impl LayoutConfig {
    /// Channels per pad.
    ///
    /// Saturates on overflow; [`LayoutConfig::validate`] rejects such grids.
    #[must_use]
    pub fn pad_size(&self) -> usize {
        self.rows.saturating_mul(self.columns)
    }

    /// Channel shown at `(row, column)` of a pad starting at `base`.
    #[must_use]
    pub fn channel_at(&self, base: usize, row: usize, column: usize) -> usize {
        base + self.rows * (self.columns - 1 - column) + row
    }

    /// All panels of `side`, pad by pad, row-major within a pad.
    pub fn cells<'a>(&'a self, side: &'a SideLayout) -> impl Iterator<Item = PanelCell> + 'a {
        side.pads.iter().enumerate().flat_map(move |(pad, &base)| {
            (0..self.rows).flat_map(move |row| {
                (0..self.columns).map(move |column| PanelCell {
                    pad,
                    row,
                    column,
                    channel: self.channel_at(base, row, column),
                })
            })
        })
    }

    /// Checks that every panel shows a channel below `channel_count`.
    ///
    /// # Errors
    /// Returns [`Error::ConfigError`] for an empty grid or a channel out of range.
    pub fn validate(&self, channel_count: usize) -> Result<()> {
        if self.rows == 0 || self.columns == 0 {
            return Err(Error::ConfigError(
                "layout grid needs at least one row and one column".to_string(),
            ));
        }
        for side in &self.sides {
            if side.name.is_empty() {
                return Err(Error::ConfigError("layout side without a name".to_string()));
            }
            if side.pads.is_empty() {
                return Err(Error::ConfigError(format!("side {} has no pads", side.name)));
            }
            for &base in &side.pads {
                let last = self
                    .rows
                    .checked_mul(self.columns)
                    .and_then(|size| base.checked_add(size - 1))
                    .ok_or_else(|| {
                        Error::ConfigError(format!(
                            "side {} pad at channel {base} overflows the channel range",
                            side.name
                        ))
                    })?;
                if last >= channel_count {
                    return Err(Error::ConfigError(format!(
                        "side {} pad at channel {base} reaches channel {last}, \
                         beyond {channel_count} channels",
                        side.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Panel title for a channel: blank when the channel is not in the map.
#[must_use]
pub fn panel_title(location: Option<&ChannelLocation>, entries: Option<u64>) -> String {
    let Some(loc) = location else {
        return String::new();
    };
    let mut title = format!(
        "EP {} - Link {} - Ch {}",
        loc.slot, loc.link, loc.device_channel
    );
    if let Some(n) = entries {
        title.push_str(&format!(" - Entries: {n}"));
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_default_layout_covers_all_channels_once() {
        let layout = LayoutConfig::default();
        layout.validate(160).unwrap();
        let mut seen = HashSet::new();
        for side in &layout.sides {
            for cell in layout.cells(side) {
                assert!(seen.insert(cell.channel), "channel {} twice", cell.channel);
            }
        }
        assert_eq!(seen.len(), 160);
    }

    #[test]
    fn test_channel_arithmetic() {
        let layout = LayoutConfig::default();
        // Rightmost column, top row is the pad base.
        assert_eq!(layout.channel_at(80, 0, 3), 80);
        assert_eq!(layout.channel_at(80, 9, 3), 89);
        // Leftmost column holds the last ten channels.
        assert_eq!(layout.channel_at(80, 0, 0), 110);
        assert_eq!(layout.channel_at(0, 4, 1), 24);
    }

    #[test]
    fn test_cells_order() {
        let layout = LayoutConfig::default();
        let side = &layout.sides[0];
        let cells: Vec<PanelCell> = layout.cells(side).collect();
        assert_eq!(cells.len(), 80);
        assert_eq!(
            cells[0],
            PanelCell {
                pad: 0,
                row: 0,
                column: 0,
                channel: 150
            }
        );
        assert_eq!(cells[40].pad, 1);
        assert_eq!(cells[40].channel, 110);
    }

    #[test]
    fn test_validate_rejects_out_of_range_pad() {
        let layout = LayoutConfig::default();
        assert!(layout.validate(150).is_err());

        let empty = LayoutConfig {
            rows: 0,
            ..LayoutConfig::default()
        };
        assert!(empty.validate(160).is_err());
    }

    #[test]
    fn test_validate_rejects_overflowing_grid() {
        let huge_base = LayoutConfig {
            sides: vec![SideLayout {
                name: "s".to_string(),
                pads: vec![usize::MAX],
            }],
            ..LayoutConfig::default()
        };
        assert!(matches!(huge_base.validate(160), Err(Error::ConfigError(_))));

        let huge_grid = LayoutConfig {
            rows: usize::MAX,
            columns: 2,
            ..LayoutConfig::default()
        };
        assert!(matches!(huge_grid.validate(160), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_panel_title() {
        let loc = ChannelLocation {
            slot: 104,
            link: 0,
            device_channel: 17,
        };
        assert_eq!(panel_title(Some(&loc), None), "EP 104 - Link 0 - Ch 17");
        assert_eq!(
            panel_title(Some(&loc), Some(321)),
            "EP 104 - Link 0 - Ch 17 - Entries: 321"
        );
        assert_eq!(panel_title(None, Some(5)), "");
    }
}
