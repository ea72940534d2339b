//! Offline channel to hardware location lookup.
//!
//! The map text is whitespace separated integers, four per mapping:
//! `slot link device_channel offline_channel`. Tokens are consumed four at
//! a time, so one line may carry several mappings. A line stops at its
//! first token that is not an unsigned integer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Hardware location of an offline channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelLocation {
    /// DAPHNE endpoint (slot).
    pub slot: u32,
    /// Optical link.
    pub link: u32,
    /// Channel on the DAPHNE board.
    pub device_channel: u32,
}

/// Lookup table keyed by offline channel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelMap {
    entries: BTreeMap<u32, ChannelLocation>,
}

/// Result of parsing channel map text.
#[derive(Clone, Debug, Default)]
pub struct ParsedChannelMap {
    /// Parsed mappings.
    pub map: ChannelMap,
    /// 1-based numbers of lines that were fully or partly unreadable.
    pub rejected_lines: Vec<usize>,
}

impl ChannelMap {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a mapping, replacing any previous one for `offline_channel`.
    pub fn insert(&mut self, offline_channel: u32, location: ChannelLocation) {
        self.entries.insert(offline_channel, location);
    }

    /// Looks up an offline channel.
    #[must_use]
    pub fn get(&self, offline_channel: u32) -> Option<&ChannelLocation> {
        self.entries.get(&offline_channel)
    }

    /// Number of mapped channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is mapped.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate mappings in offline channel order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ChannelLocation)> {
        self.entries.iter().map(|(&ch, loc)| (ch, loc))
    }

    /// Parses channel map text; later rows win on duplicate channels.
    ///
    /// Blank lines and lines starting with `#` are skipped. Unreadable rows
    /// are reported in [`ParsedChannelMap::rejected_lines`], never fatal.
    #[must_use]
    pub fn parse(text: &str) -> ParsedChannelMap {
        let mut parsed = ParsedChannelMap::default();

        for (line_no, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let mut row = [0u32; 4];
            let mut filled = 0;
            let mut clean = true;
            for token in trimmed.split_whitespace() {
                let Ok(value) = token.parse::<u32>() else {
                    clean = false;
                    break;
                };
                row[filled] = value;
                filled += 1;
                if filled == row.len() {
                    let [slot, link, device_channel, offline] = row;
                    parsed.map.insert(
                        offline,
                        ChannelLocation {
                            slot,
                            link,
                            device_channel,
                        },
                    );
                    filled = 0;
                }
            }

            if !clean || filled != 0 {
                log::warn!("channel map line {} is not readable: {trimmed:?}", line_no + 1);
                parsed.rejected_lines.push(line_no + 1);
            }
        }

        parsed
    }
}

impl FromIterator<(u32, ChannelLocation)> for ChannelMap {
    fn from_iter<I: IntoIterator<Item = (u32, ChannelLocation)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
