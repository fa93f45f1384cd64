//! Artwork records and thumbnail shapes

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Decoded RGBA pixels held in memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA, `width * height * 4` bytes.
    pub data: Vec<u8>,
}

/// One packed slot of an `.ithmb` file, for one artwork format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceThumb {
    /// Correlation id of the artwork format this slot was packed for.
    pub correlation_id: u32,
    /// On-device filename pattern, e.g. `:F1016_0.ithmb` or
    /// `:Thumbs:F1009_0.ithmb`.
    pub filename: String,
    /// Byte offset of the slot within the file.
    pub offset: u32,
    /// Bytes of pixel data (excluding per-slot padding).
    pub size: u32,
    /// Image extent including padding.
    pub width: u16,
    pub height: u16,
    pub horizontal_padding: i16,
    pub vertical_padding: i16,
}

/// The source of an artwork image.
///
/// All non-[`Device`](Thumbnail::Device) shapes are converted to the
/// on-device shape when the database is written; afterwards the owning
/// track's has-artwork flag is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Thumbnail {
    /// Path to an image file decoded at write time.
    File { path: PathBuf, rotation: u16 },
    /// Encoded image bytes (JPEG/PNG) decoded at write time.
    Memory { data: Vec<u8>, rotation: u16 },
    /// Already-decoded pixels.
    Pixels { pixels: PixelBuffer, rotation: u16 },
    /// Slots already packed into `.ithmb` files, one per format.
    Device { items: Vec<DeviceThumb> },
}

impl Thumbnail {
    pub fn rotation(&self) -> u16 {
        match self {
            Thumbnail::File { rotation, .. }
            | Thumbnail::Memory { rotation, .. }
            | Thumbnail::Pixels { rotation, .. } => *rotation,
            Thumbnail::Device { .. } => 0,
        }
    }

    pub fn is_on_device(&self) -> bool {
        matches!(self, Thumbnail::Device { .. })
    }

    /// The packed slots, if this thumbnail is in the on-device shape.
    pub fn device_items(&self) -> &[DeviceThumb] {
        match self {
            Thumbnail::Device { items } => items,
            _ => &[],
        }
    }

    pub fn device_items_mut(&mut self) -> &mut [DeviceThumb] {
        match self {
            Thumbnail::Device { items } => items,
            _ => &mut [],
        }
    }
}

/// Cover art of one track, or one photo of the photo database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artwork {
    /// 32-bit artwork id, assigned at write time (>= 0x64).
    pub id: u32,
    /// Persistent id of the owning track, or 0 when this record was
    /// deduplicated onto another track's slot.
    pub dbid: u64,
    pub thumbnail: Option<Thumbnail>,
    /// Size of the source image file in bytes.
    pub source_size: u32,
    /// Unix seconds; converted to the device epoch at the codec boundary.
    pub creation_date: i64,
    /// Unix seconds (photos only).
    pub digitized_date: i64,
    /// Photos only.
    pub rating: u32,
    pub unk028: u32,
    pub unk036: u32,
}

impl Artwork {
    pub fn new() -> Self {
        Artwork::default()
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Artwork {
            thumbnail: Some(Thumbnail::File {
                path: path.into(),
                rotation: 0,
            }),
            ..Artwork::default()
        }
    }

    pub fn from_memory(data: Vec<u8>) -> Self {
        Artwork {
            thumbnail: Some(Thumbnail::Memory { data, rotation: 0 }),
            ..Artwork::default()
        }
    }

    pub fn from_pixels(pixels: PixelBuffer) -> Self {
        Artwork {
            thumbnail: Some(Thumbnail::Pixels { pixels, rotation: 0 }),
            ..Artwork::default()
        }
    }

    /// The packed slot for a given format, if already on the device.
    pub fn device_item(&self, correlation_id: u32) -> Option<&DeviceThumb> {
        self.thumbnail
            .as_ref()?
            .device_items()
            .iter()
            .find(|item| item.correlation_id == correlation_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_shapes() {
        let thumb = Thumbnail::Memory {
            data: vec![1, 2, 3],
            rotation: 90,
        };
        assert_eq!(thumb.rotation(), 90);
        assert!(!thumb.is_on_device());
        assert!(thumb.device_items().is_empty());

        let on_device = Thumbnail::Device {
            items: vec![DeviceThumb {
                correlation_id: 1016,
                filename: ":F1016_0.ithmb".into(),
                offset: 0,
                size: 39200,
                width: 140,
                height: 140,
                horizontal_padding: 0,
                vertical_padding: 0,
            }],
        };
        assert_eq!(on_device.rotation(), 0);
        assert_eq!(on_device.device_items().len(), 1);
    }

    #[test]
    fn test_device_item_lookup() {
        let mut artwork = Artwork::from_memory(vec![0xff]);
        assert!(artwork.device_item(1016).is_none());

        artwork.thumbnail = Some(Thumbnail::Device {
            items: vec![DeviceThumb {
                correlation_id: 1017,
                filename: ":F1017_0.ithmb".into(),
                offset: 6272,
                size: 6272,
                width: 56,
                height: 56,
                horizontal_padding: 0,
                vertical_padding: 0,
            }],
        });
        assert!(artwork.device_item(1017).is_some());
        assert!(artwork.device_item(1016).is_none());
    }
}
