//! Utility functions

use flate2::Crc;

/// Calculate the CRC32 checksum of a chunk
pub fn calculate_checksum(data: &[u8]) -> u32 {
    let mut crc = Crc::new();
    crc.update(data);
    crc.sum()
}

/// Format byte size in human-readable form
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    let mut size = bytes as f64;
    let mut unit_idx = 0;

    while size >= 1024.0 && unit_idx < UNITS.len() - 1 {
        size /= 1024.0;
        unit_idx += 1;
    }

    if unit_idx == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", size, UNITS[unit_idx])
    }
}

/// Relative path of an array's layout header
pub fn layout_path(name: &str) -> String {
    format!("arrays/{}.json", name)
}

/// Relative path of one chunk of an array
pub fn chunk_path(name: &str, index: usize) -> String {
    format!("arrays/{}/{:08}.chunk", name, index)
}

/// Array names must be usable as a single path component
pub fn is_valid_array_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum() {
        let data = b"Hello, world!";
        let checksum = calculate_checksum(data);
        assert_eq!(checksum, calculate_checksum(data));
        assert_ne!(checksum, calculate_checksum(b"Hello, world?"));
        // standard CRC32 check value
        assert_eq!(calculate_checksum(b"123456789"), 0xCBF43926);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
        assert_eq!(format_bytes(1073741824), "1.00 GB");
    }

    #[test]
    fn test_paths() {
        assert_eq!(layout_path("unwrapPhase"), "arrays/unwrapPhase.json");
        assert_eq!(chunk_path("unwrapPhase", 0), "arrays/unwrapPhase/00000000.chunk");
        assert_eq!(chunk_path("coherence", 42), "arrays/coherence/00000042.chunk");
    }

    #[test]
    fn test_array_names() {
        assert!(is_valid_array_name("dropIfgram"));
        assert!(!is_valid_array_name("../attrs"));
        assert!(!is_valid_array_name(""));
    }
}
