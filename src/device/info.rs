use std::fs;
use std::path::{Path, PathBuf};

/// A video4linux device node found on the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Device node path
    path: PathBuf,
}

impl DeviceInfo {
    /// Returns a device node observer by path
    ///
    /// Nothing is opened, the node is only described.
    ///
    /// # Example
    ///
    /// ```
    /// use v4l2_mmap::device::DeviceInfo;
    /// let node = DeviceInfo::new("/dev/video0");
    /// assert_eq!(node.index(), Some(0));
    /// ```
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DeviceInfo {
            path: PathBuf::from(path.as_ref()),
        }
    }

    /// Returns the absolute path of the device node
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the index of the device node, i.e. the trailing number of its name
    pub fn index(&self) -> Option<usize> {
        let name = self.path.file_name()?.to_str()?;
        let digits = name.len() - name.trim_end_matches(|c: char| c.is_ascii_digit()).len();
        if digits == 0 {
            return None;
        }
        name[name.len() - digits..].parse().ok()
    }

    /// Returns name of the device by parsing its sysfs entry
    pub fn name(&self) -> Option<String> {
        let index = self.index()?;
        let path = format!("/sys/class/video4linux/video{}/name", index);
        fs::read_to_string(path)
            .ok()
            .map(|name| name.trim().to_string())
    }
}

/// Returns the video device nodes currently known to the system, sorted by index
///
/// # Example
///
/// ```
/// for dev in v4l2_mmap::device::list() {
///     println!("{}: {:?}", dev.path().display(), dev.name());
/// }
/// ```
pub fn list() -> Vec<DeviceInfo> {
    let mut nodes: Vec<DeviceInfo> = match fs::read_dir("/dev") {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with("video"))
            .map(|entry| DeviceInfo::new(entry.path()))
            .collect(),
        Err(_) => Vec::new(),
    };

    nodes.sort_by_key(|node| (node.index().unwrap_or(usize::MAX), node.path.clone()));
    nodes
}
