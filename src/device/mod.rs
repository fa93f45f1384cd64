//! Device descriptor and filesystem layout service
//!
//! The device's control directory tree lives on a FAT volume, so path
//! lookups must be case-insensitive while reusing the casing actually on
//! disk. All path helpers go through [`Device::resolve_path`], which
//! scans one directory level at a time and case-folds each component.

mod formats;

pub use formats::{ArtworkFormat, DeviceModel, PixelFormat, ThumbKind};

use crate::error::{Error, Result};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

/// Seconds between the Unix epoch and the device epoch (1904-01-01 UTC).
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// One attached (or simulated) device: mountpoint, generation and the
/// byte-order convention of its databases.
#[derive(Debug)]
pub struct Device {
    mountpoint: PathBuf,
    model: DeviceModel,
    reversed: bool,
    timezone_shift: i64,
    musicdirs: Cell<Option<u32>>,
}

impl Device {
    pub fn new(mountpoint: impl Into<PathBuf>, model: DeviceModel) -> Self {
        let device = Device {
            mountpoint: mountpoint.into(),
            model,
            reversed: model == DeviceModel::Mobile1,
            timezone_shift: 0,
            musicdirs: Cell::new(None),
        };
        device.with_timezone_from_preferences()
    }

    pub fn mountpoint(&self) -> &Path {
        &self.mountpoint
    }

    pub fn model(&self) -> DeviceModel {
        self.model
    }

    /// Byte-order convention of the databases on this device.
    pub fn reversed(&self) -> bool {
        self.reversed
    }

    /// Record the byte order observed while parsing, so that a
    /// subsequent write uses the same orientation.
    pub fn set_reversed(&mut self, reversed: bool) {
        self.reversed = reversed;
    }

    pub fn supports_sparse_artwork(&self) -> bool {
        self.model.supports_sparse_artwork()
    }

    pub fn artwork_formats(&self) -> &'static [ArtworkFormat] {
        self.model.artwork_formats()
    }

    // --- path service -----------------------------------------------------

    /// Case-insensitive path resolution: each component is matched
    /// against the parent directory case-folded, and the on-disk casing
    /// is kept on success. Returns `None` when any component is missing.
    pub fn resolve_path(root: &Path, components: &[&str]) -> Option<PathBuf> {
        let mut good = root.to_path_buf();
        for component in components {
            if component.is_empty() {
                continue;
            }
            let direct = good.join(component);
            if direct.exists() {
                good = direct;
                continue;
            }
            let folded = component.to_lowercase();
            let entries = fs::read_dir(&good).ok()?;
            let mut matched = None;
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().to_lowercase() == folded {
                    matched = Some(good.join(name));
                    break;
                }
            }
            good = matched?;
        }
        good.exists().then_some(good)
    }

    /// `iPod_Control` (or however the volume spells it).
    pub fn control_dir(&self) -> Result<PathBuf> {
        Self::resolve_path(&self.mountpoint, &["iPod_Control"])
            .ok_or_else(|| Error::NotFound(self.mountpoint.join("iPod_Control")))
    }

    pub fn itunes_dir(&self) -> Result<PathBuf> {
        let control = self.control_dir()?;
        Self::resolve_path(&control, &["iTunes"]).ok_or_else(|| Error::NotFound(control.join("iTunes")))
    }

    pub fn music_dir(&self) -> Result<PathBuf> {
        let control = self.control_dir()?;
        Self::resolve_path(&control, &["Music"]).ok_or_else(|| Error::NotFound(control.join("Music")))
    }

    /// `iPod_Control/Artwork`, created on demand.
    pub fn artwork_dir(&self) -> Result<PathBuf> {
        let control = self.control_dir()?;
        if let Some(dir) = Self::resolve_path(&control, &["Artwork"]) {
            return Ok(dir);
        }
        let dir = control.join("Artwork");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `Photos`, created on demand.
    pub fn photos_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = Self::resolve_path(&self.mountpoint, &["Photos"]) {
            return Ok(dir);
        }
        let dir = self.mountpoint.join("Photos");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// `Photos/Thumbs`, created on demand.
    pub fn photos_thumb_dir(&self) -> Result<PathBuf> {
        let photos = self.photos_dir()?;
        if let Some(dir) = Self::resolve_path(&photos, &["Thumbs"]) {
            return Ok(dir);
        }
        let dir = photos.join("Thumbs");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    pub fn itunesdb_path(&self) -> Result<PathBuf> {
        Ok(self.itunes_dir()?.join("iTunesDB"))
    }

    pub fn itunessd_path(&self) -> Result<PathBuf> {
        Ok(self.itunes_dir()?.join("iTunesSD"))
    }

    pub fn artworkdb_path(&self) -> Result<PathBuf> {
        Ok(self.artwork_dir()?.join("ArtworkDB"))
    }

    pub fn photodb_path(&self) -> Result<PathBuf> {
        Ok(self.photos_dir()?.join("Photo Database"))
    }

    /// Number of `Music/F00`… subdirectories, counted once and cached.
    pub fn musicdirs_number(&self) -> u32 {
        if let Some(n) = self.musicdirs.get() {
            return n;
        }
        let mut count = 0;
        if let Ok(music) = self.music_dir() {
            loop {
                let name = format!("F{count:02}");
                match Self::resolve_path(&music, &[&name]) {
                    Some(_) => count += 1,
                    None => break,
                }
            }
        }
        self.musicdirs.set(Some(count));
        count
    }

    /// Convert a colon-separated on-device path (`:F00:song.mp3`) to a
    /// host path below the mountpoint, fixing up casing.
    pub fn filename_on_device(&self, ipod_path: &str) -> Option<PathBuf> {
        let components: Vec<&str> = ipod_path.split(':').filter(|c| !c.is_empty()).collect();
        Self::resolve_path(&self.mountpoint, &components)
    }

    // --- timestamps -------------------------------------------------------

    /// Device timestamp (seconds since 1904) to Unix seconds.
    pub fn mac_to_host(&self, mactime: u32) -> i64 {
        if mactime == 0 {
            0
        } else {
            mactime as i64 - MAC_EPOCH_OFFSET - self.timezone_shift
        }
    }

    /// Unix seconds to device timestamp.
    pub fn host_to_mac(&self, timet: i64) -> u32 {
        if timet == 0 {
            0
        } else {
            (timet + MAC_EPOCH_OFFSET + self.timezone_shift) as u32
        }
    }

    /// Timezone shift in seconds applied on top of the epoch offset.
    pub fn timezone_shift(&self) -> i64 {
        self.timezone_shift
    }

    /// Read the per-device timezone shift from `Device/Preferences`.
    ///
    /// The preferences file layout changed across generations; the file
    /// size discriminates which offset and encoding apply. Unknown sizes
    /// leave the shift at zero.
    fn with_timezone_from_preferences(mut self) -> Self {
        let prefs = match Self::resolve_path(&self.mountpoint, &["Device", "Preferences"]) {
            Some(p) => p,
            None => return self,
        };
        let data = match fs::read(&prefs) {
            Ok(d) => d,
            Err(_) => return self,
        };
        let (offset, fourth_gen) = match data.len() {
            2892 => (0xb10, true),
            2924 => (0xb22, false),
            // nano 3g / classic / nano 4g encode a city index; treat as UTC
            2952 | 2960 => return self,
            _ => return self,
        };
        if data.len() < offset + 2 {
            return self;
        }
        let raw = i16::from_le_bytes([data[offset], data[offset + 1]]);
        self.timezone_shift = if fourth_gen {
            // Half-hour steps relative to GMT with a DST bit.
            let gmt_offset: i16 = 0x19;
            if !(0i16..=(24 << 1)).contains(&raw) {
                return self;
            }
            let raw = raw - gmt_offset;
            let mut shift = (raw as i64 >> 1) * 3600;
            if raw & 1 != 0 {
                shift += 3600;
            }
            shift
        } else {
            // Minutes east of Tokyo; re-centre on UTC.
            raw as i64 * 60 - 8 * 3600
        };
        log::debug!(
            "device timezone shift: {} seconds ({:?})",
            self.timezone_shift,
            prefs
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mac_epoch_roundtrip() {
        let device = Device::new("/nonexistent", DeviceModel::Video);
        let unix = 1_160_000_000i64;
        let mac = device.host_to_mac(unix);
        assert_eq!(device.mac_to_host(mac), unix);
        assert_eq!(device.host_to_mac(0), 0);
        assert_eq!(device.mac_to_host(0), 0);
    }

    #[test]
    fn test_resolve_path_case_insensitive() {
        let tmp = tempfile::TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("iPod_Control/Music/F00")).unwrap();

        let found = Device::resolve_path(tmp.path(), &["ipod_control", "MUSIC", "f00"]).unwrap();
        assert_eq!(found, tmp.path().join("iPod_Control/Music/F00"));

        assert!(Device::resolve_path(tmp.path(), &["ipod_control", "Artwork"]).is_none());
    }

    #[test]
    fn test_musicdirs_number() {
        let tmp = tempfile::TempDir::new().unwrap();
        for i in 0..5 {
            fs::create_dir_all(tmp.path().join(format!("iPod_Control/Music/F{i:02}"))).unwrap();
        }
        let device = Device::new(tmp.path(), DeviceModel::Nano);
        assert_eq!(device.musicdirs_number(), 5);
        // cached
        assert_eq!(device.musicdirs_number(), 5);
    }

    #[test]
    fn test_mobile_databases_are_reversed() {
        assert!(Device::new("/x", DeviceModel::Mobile1).reversed());
        assert!(!Device::new("/x", DeviceModel::Nano).reversed());
    }
}
