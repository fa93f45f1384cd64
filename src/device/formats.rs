//! Artwork-format descriptors per device generation

use serde::{Deserialize, Serialize};

/// What a thumbnail slot is used for on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThumbKind {
    CoverSmall,
    CoverMedium,
    CoverSMedium,
    CoverLarge,
    CoverXLarge,
    CoverXSmall,
    PhotoSmall,
    PhotoLarge,
    PhotoFullScreen,
    PhotoTvScreen,
}

impl ThumbKind {
    /// Photo thumbnails live under `Photos/Thumbs` and are centred in
    /// their canvas; cover thumbnails live under `Artwork` and the device
    /// renders offsets from the image-name record instead.
    pub fn is_photo(self) -> bool {
        matches!(
            self,
            ThumbKind::PhotoSmall
                | ThumbKind::PhotoLarge
                | ThumbKind::PhotoFullScreen
                | ThumbKind::PhotoTvScreen
        )
    }
}

/// Pixel packing used inside an `.ithmb` slot.
///
/// The byte-order variant is part of the format itself and is not
/// affected by the database's reversed-endian flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb565Le,
    Rgb565Be,
    Rgb555Le,
    Rgb555Be,
    /// RGB-555 stored in the recursive quad-tree raster order used by
    /// the mobile-phone firmware.
    RecRgb555Le,
    RecRgb555Be,
    Rgb888,
    UyvyLe,
    UyvyBe,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgb888 => 3,
            _ => 2,
        }
    }
}

/// One slot format supported by a device, as exposed by its capability
/// tables. The correlation id appears in `.ithmb` filenames and in the
/// image-name records of the artwork databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkFormat {
    pub kind: ThumbKind,
    pub width: u16,
    pub height: u16,
    pub correlation_id: u32,
    pub pixel_format: PixelFormat,
    /// Per-slot file padding in bytes; 0 means slots are exactly
    /// `width * height * bytes_per_pixel` long.
    pub padding: u32,
}

impl ArtworkFormat {
    /// Bytes of pixel data in one slot, excluding padding.
    pub fn pixel_bytes(&self) -> u32 {
        self.width as u32 * self.height as u32 * self.pixel_format.bytes_per_pixel()
    }

    /// Total slot size in the file, including the declared padding.
    pub fn slot_size(&self) -> u32 {
        self.pixel_bytes().max(self.padding)
    }
}

const fn fmt(
    kind: ThumbKind,
    width: u16,
    height: u16,
    correlation_id: u32,
    pixel_format: PixelFormat,
) -> ArtworkFormat {
    ArtworkFormat {
        kind,
        width,
        height,
        correlation_id,
        pixel_format,
        padding: 0,
    }
}

static COLOR_FORMATS: &[ArtworkFormat] = &[
    fmt(ThumbKind::CoverSmall, 56, 56, 1017, PixelFormat::Rgb565Le),
    fmt(ThumbKind::CoverLarge, 140, 140, 1016, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoSmall, 42, 30, 1009, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoLarge, 130, 88, 1015, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoFullScreen, 220, 176, 1013, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoTvScreen, 720, 480, 1019, PixelFormat::UyvyBe),
];

static NANO_FORMATS: &[ArtworkFormat] = &[
    fmt(ThumbKind::CoverSmall, 42, 42, 1031, PixelFormat::Rgb565Le),
    fmt(ThumbKind::CoverLarge, 100, 100, 1027, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoLarge, 42, 37, 1032, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoFullScreen, 176, 132, 1023, PixelFormat::Rgb565Le),
];

static VIDEO_FORMATS: &[ArtworkFormat] = &[
    fmt(ThumbKind::CoverSmall, 100, 100, 1028, PixelFormat::Rgb565Le),
    fmt(ThumbKind::CoverLarge, 200, 200, 1029, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoSmall, 50, 41, 1036, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoLarge, 130, 88, 1015, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoFullScreen, 320, 240, 1024, PixelFormat::Rgb565Le),
    fmt(ThumbKind::PhotoTvScreen, 720, 480, 1019, PixelFormat::UyvyBe),
];

static MOBILE_FORMATS: &[ArtworkFormat] = &[
    fmt(ThumbKind::CoverSmall, 50, 50, 2002, PixelFormat::RecRgb555Le),
    fmt(ThumbKind::CoverLarge, 150, 150, 2003, PixelFormat::RecRgb555Le),
];

/// Device generations with distinct artwork capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceModel {
    /// iPod Photo / Color.
    Color,
    /// First/second generation Nano.
    Nano,
    /// Fifth generation (Video).
    Video,
    /// Mobile-phone firmware (byte-order reversed databases).
    Mobile1,
}

impl DeviceModel {
    /// All artwork formats the device understands, covers and photos.
    pub fn artwork_formats(self) -> &'static [ArtworkFormat] {
        match self {
            DeviceModel::Color => COLOR_FORMATS,
            DeviceModel::Nano => NANO_FORMATS,
            DeviceModel::Video => VIDEO_FORMATS,
            DeviceModel::Mobile1 => MOBILE_FORMATS,
        }
    }

    pub fn cover_formats(self) -> impl Iterator<Item = &'static ArtworkFormat> {
        self.artwork_formats().iter().filter(|f| !f.kind.is_photo())
    }

    pub fn photo_formats(self) -> impl Iterator<Item = &'static ArtworkFormat> {
        self.artwork_formats().iter().filter(|f| f.kind.is_photo())
    }

    /// Whether several tracks may share one artwork id (and one slot).
    pub fn supports_sparse_artwork(self) -> bool {
        match self {
            DeviceModel::Nano | DeviceModel::Video => true,
            DeviceModel::Color | DeviceModel::Mobile1 => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_sizes() {
        let f = fmt(ThumbKind::CoverSmall, 56, 56, 1017, PixelFormat::Rgb565Le);
        assert_eq!(f.pixel_bytes(), 56 * 56 * 2);
        assert_eq!(f.slot_size(), 56 * 56 * 2);

        let tv = fmt(ThumbKind::PhotoTvScreen, 720, 480, 1019, PixelFormat::UyvyBe);
        assert_eq!(tv.pixel_bytes(), 720 * 480 * 2);
    }

    #[test]
    fn test_correlation_ids_unique_per_model() {
        for model in [
            DeviceModel::Color,
            DeviceModel::Nano,
            DeviceModel::Video,
            DeviceModel::Mobile1,
        ] {
            let ids: Vec<u32> = model
                .artwork_formats()
                .iter()
                .map(|f| f.correlation_id)
                .collect();
            let mut dedup = ids.clone();
            dedup.sort_unstable();
            dedup.dedup();
            assert_eq!(ids.len(), dedup.len(), "{model:?}");
        }
    }
}
