//! Serial port discovery for arm connections.

use std::path::Path;

/// Node name prefixes that look like USB serial adapters. Covers Linux
/// (`ttyUSB`, `ttyACM`) and macOS (`tty.usbmodem`, `tty.usbserial`).
const PORT_PREFIXES: &[&str] = &["ttyUSB", "ttyACM", "tty.usbmodem", "tty.usbserial"];

/// List candidate serial ports on the host, sorted by path.
pub fn list_ports() -> Vec<String> {
    list_ports_in("/dev")
}

pub fn list_ports_in(root: impl AsRef<Path>) -> Vec<String> {
    let mut ports = Vec::new();
    let pattern = root.as_ref().join("tty*");
    if let Ok(paths) = glob::glob(&pattern.to_string_lossy()) {
        for path in paths.flatten() {
            let name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name,
                None => continue,
            };
            if PORT_PREFIXES.iter().any(|p| name.starts_with(p)) {
                ports.push(path.display().to_string());
            }
        }
    }
    ports.sort();
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_only_usb_serial_nodes() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["ttyUSB1", "ttyUSB0", "ttyACM0", "tty0", "ttyS0", "video0"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let ports = list_ports_in(dir.path());
        let names: Vec<&str> = ports
            .iter()
            .map(|p| p.rsplit('/').next().unwrap())
            .collect();
        assert_eq!(names, vec!["ttyACM0", "ttyUSB0", "ttyUSB1"]);
    }

    #[test]
    fn empty_directory_yields_no_ports() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_ports_in(dir.path()).is_empty());
    }
}
