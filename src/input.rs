//! Touch device discovery (evdev 0.13).

use evdev::{AbsoluteAxisCode, Device, EventType};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub name: String,
}

impl DeviceInfo {
    pub fn describe(&self) -> String {
        format!("{} ({})", self.name, self.path.display())
    }
}

/// Multitouch capable: slots plus both MT position axes.
pub fn is_touch_device(dev: &Device) -> bool {
    if !dev.supported_events().contains(EventType::ABSOLUTE) {
        return false;
    }
    dev.supported_absolute_axes().is_some_and(|a| {
        a.contains(AbsoluteAxisCode::ABS_MT_SLOT)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_X)
            && a.contains(AbsoluteAxisCode::ABS_MT_POSITION_Y)
    })
}

fn is_event_node(p: &Path) -> bool {
    p.file_name()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.starts_with("event"))
}

pub fn discover_touch_devices() -> Vec<DeviceInfo> {
    let Ok(rd) = std::fs::read_dir("/dev/input") else {
        return Vec::new();
    };
    let mut out: Vec<DeviceInfo> = rd
        .flatten()
        .map(|e| e.path())
        .filter(|p| is_event_node(p))
        .filter_map(|p| {
            let dev = Device::open(&p).ok()?;
            is_touch_device(&dev).then(|| DeviceInfo {
                name: dev.name().unwrap_or("unknown").to_string(),
                path: p,
            })
        })
        .collect();
    out.sort_by(|a, b| a.path.cmp(&b.path));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_event_nodes_are_opened() {
        assert!(is_event_node(Path::new("/dev/input/event3")));
        assert!(!is_event_node(Path::new("/dev/input/mice")));
        assert!(!is_event_node(Path::new("/dev/input/by-id")));
    }

    #[test]
    fn describe_includes_path() {
        let d = DeviceInfo {
            path: PathBuf::from("/dev/input/event5"),
            name: "Touchpad".into(),
        };
        assert_eq!(d.describe(), "Touchpad (/dev/input/event5)");
    }
}
