//! Content size accounting
//!
//! Compressed size breakdown of module content, used by the instant size
//! checks and the build summary.

use crate::content::ResolvedEntry;

/// Size breakdown of a set of entries, in compressed bytes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentSizeBreakdown {
    pub dex: u64,
    pub resources: u64,
    pub native_libs: u64,
    pub assets: u64,
    pub other: u64,
    pub total: u64,
}

impl ContentSizeBreakdown {
    /// Calculate the breakdown for module entries
    pub fn calculate<'a>(entries: impl IntoIterator<Item = &'a ResolvedEntry>) -> Self {
        let mut breakdown = Self::default();

        for entry in entries {
            let size = entry.size;

            if entry.path.ends_with(".dex") {
                breakdown.dex += size;
            } else if entry.path.starts_with("res/") || entry.path == "resources.pb" {
                breakdown.resources += size;
            } else if entry.path.starts_with("lib/") {
                breakdown.native_libs += size;
            } else if entry.path.starts_with("assets/") {
                breakdown.assets += size;
            } else {
                breakdown.other += size;
            }

            breakdown.total += size;
        }

        breakdown
    }

    /// One-line summary such as `2.00 MB (dex 1.00 MB, res 512.00 KB, ...)`
    pub fn summary(&self) -> String {
        format!(
            "{} (dex {}, res {}, lib {}, assets {}, other {})",
            format_size(self.total),
            format_size(self.dex),
            format_size(self.resources),
            format_size(self.native_libs),
            format_size(self.assets),
            format_size(self.other),
        )
    }
}

/// Get size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::EntryTargeting;

    fn entry(path: &str, size: u64) -> ResolvedEntry {
        ResolvedEntry {
            path: path.to_string(),
            size,
            targeting: EntryTargeting::default(),
        }
    }

    #[test]
    fn test_breakdown() {
        let entries = vec![
            entry("dex/classes.dex", 4096),
            entry("res/drawable/icon.png", 1024),
            entry("lib/x86/libgame.so", 2048),
            entry("assets/intro.mp4", 512),
            entry("manifest/AndroidManifest.xml", 16),
        ];

        let breakdown = ContentSizeBreakdown::calculate(&entries);
        assert_eq!(breakdown.dex, 4096);
        assert_eq!(breakdown.native_libs, 2048);
        assert_eq!(breakdown.other, 16);
        assert_eq!(breakdown.total, 7696);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 bytes");
        assert_eq!(format_size(2048), "2.00 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
