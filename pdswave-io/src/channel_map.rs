//! Channel map file loading.

use pdswave_core::channel_map::ChannelMap;
use std::fs;
use std::path::Path;

/// Load the channel map at `path`.
///
/// A missing or unreadable file is not fatal: it is logged and an empty
/// map is returned, so plots get blank titles.
pub fn load_channel_map<P: AsRef<Path>>(path: P) -> ChannelMap {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => {
            let parsed = ChannelMap::parse(&text);
            if !parsed.rejected_lines.is_empty() {
                log::warn!(
                    "{}: {} unreadable line(s) ignored",
                    path.display(),
                    parsed.rejected_lines.len()
                );
            }
            log::info!(
                "Loaded {} channel mappings from {}",
                parsed.map.len(),
                path.display()
            );
            parsed.map
        }
        Err(e) => {
            log::warn!(
                "Cannot read channel map {}: {e}; plot titles will be blank",
                path.display()
            );
            ChannelMap::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "104 0 0 0").unwrap();
        writeln!(file, "104 0 2 1").unwrap();
        writeln!(file, "bad row").unwrap();
        writeln!(file, "109 1 7 1").unwrap();

        let map = load_channel_map(file.path());
        assert_eq!(map.len(), 2);
        assert_eq!(map.get(1).unwrap().slot, 109);
    }

    #[test]
    fn test_missing_file_gives_empty_map() {
        let map = load_channel_map("/nonexistent/APAchannelmap.txt");
        assert!(map.is_empty());
    }
}
