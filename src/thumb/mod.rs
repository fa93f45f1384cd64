//! Thumbnail engine: packing artwork into `.ithmb` slot files
//!
//! Every artwork format of the device gets its own slot writer. Slots
//! within one file are all the same size (pixel bytes plus the format's
//! declared padding), which is what makes in-place compaction possible
//! when thumbnails are deleted later.

pub mod compact;
pub mod pack;

use crate::device::{ArtworkFormat, Device};
use crate::error::{Error, Result};
use crate::model::artwork::{Artwork, DeviceThumb, PixelBuffer, Thumbnail};
use image::RgbaImage;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Cap on one `.ithmb` file; the interface gets sluggish beyond this, so
/// the file index rolls over instead.
pub const ITHMB_MAX_SIZE: u64 = 256 * 1000 * 1000;

/// Whether the slots belong to the photo database (`Photos/Thumbs`) or
/// the music database's cover art (`iPod_Control/Artwork`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Music,
    Photo,
}

/// Resolve an on-device thumbnail filename (`:F1016_0.ithmb` or
/// `:Thumbs:F1009_0.ithmb`) to a host path.
pub fn resolve_ithmb_path(device: &Device, filename: &str) -> Result<PathBuf> {
    let components: Vec<&str> = filename.split(':').filter(|c| !c.is_empty()).collect();
    match components.as_slice() {
        [name] => Ok(device.artwork_dir()?.join(name)),
        ["Thumbs", name] => Ok(device.photos_thumb_dir()?.join(name)),
        _ => Err(Error::model(format!("unexpected ithmb filename '{filename}'"))),
    }
}

/// Slot writer for one artwork format.
pub struct IthmbWriter<'a> {
    format: &'a ArtworkFormat,
    dir: PathBuf,
    db_kind: DbKind,
    file: Option<File>,
    cur_offset: u64,
    file_index: u32,
}

impl<'a> IthmbWriter<'a> {
    pub fn new(device: &Device, format: &'a ArtworkFormat, db_kind: DbKind) -> Result<Self> {
        let dir = match db_kind {
            DbKind::Music => device.artwork_dir()?,
            DbKind::Photo => device.photos_thumb_dir()?,
        };
        Ok(IthmbWriter {
            format,
            dir,
            db_kind,
            file: None,
            cur_offset: 0,
            file_index: 0,
        })
    }

    pub fn format(&self) -> &ArtworkFormat {
        self.format
    }

    fn host_filename(&self) -> PathBuf {
        self.dir.join(format!(
            "F{}_{}.ithmb",
            self.format.correlation_id, self.file_index
        ))
    }

    fn device_filename(&self) -> String {
        match self.db_kind {
            DbKind::Music => format!(":F{}_{}.ithmb", self.format.correlation_id, self.file_index),
            DbKind::Photo => format!(
                ":Thumbs:F{}_{}.ithmb",
                self.format.correlation_id, self.file_index
            ),
        }
    }

    /// Open the current file, rolling the index while the cap is hit.
    fn ensure_file(&mut self) -> Result<()> {
        while self.file.is_none() || self.cur_offset >= ITHMB_MAX_SIZE {
            if self.file.take().is_some() {
                self.file_index += 1;
            }
            let path = self.host_filename();
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            self.cur_offset = file.seek(SeekFrom::End(0))?;
            self.file = Some(file);
        }
        Ok(())
    }

    /// Decode, pack and append one thumbnail; returns the slot record.
    ///
    /// A source that fails to decode is replaced by the built-in
    /// placeholder bitmap with rotation cleared.
    pub fn write_thumbnail(&mut self, source: &Thumbnail) -> Result<DeviceThumb> {
        let mut rotation = source.rotation() % 360 / 90 * 90;

        // Decode at the (rotation-swapped) target size.
        let (target_w, target_h) = if rotation == 90 || rotation == 270 {
            (self.format.height as u32, self.format.width as u32)
        } else {
            (self.format.width as u32, self.format.height as u32)
        };

        let decoded = decode_source(source, target_w, target_h);
        let mut img = match decoded {
            Some(img) => img,
            None => {
                log::warn!(
                    "could not decode thumbnail source, substituting placeholder (format {})",
                    self.format.correlation_id
                );
                rotation = 0;
                placeholder(self.format.width as u32, self.format.height as u32)
            }
        };

        img = match rotation {
            90 => image::imageops::rotate90(&img),
            180 => image::imageops::rotate180(&img),
            270 => image::imageops::rotate270(&img),
            _ => img,
        };

        // Photos are centred in the canvas; cover art keeps zero padding
        // because the firmware renders offsets from the image-name
        // record itself.
        let (hpad, vpad) = match self.db_kind {
            DbKind::Photo => (
                (self.format.width as u32 - img.width()) / 2,
                (self.format.height as u32 - img.height()) / 2,
            ),
            DbKind::Music => (0, 0),
        };

        self.ensure_file()?;
        let packed = pack::pack(&img, self.format, hpad, vpad);
        let size = packed.len() as u32;

        let file = self.file.as_mut().expect("file opened by ensure_file");
        let offset = self.cur_offset;
        if let Err(err) = file.write_all(&packed) {
            // Abandon the partial slot; the record stays unpacked and is
            // retried on the next write.
            self.file = None;
            self.cur_offset = 0;
            return Err(err.into());
        }
        self.cur_offset += size as u64;

        if self.format.padding > size {
            let pad = vec![0u8; (self.format.padding - size) as usize];
            file.write_all(&pad)?;
            self.cur_offset += pad.len() as u64;
        }

        Ok(DeviceThumb {
            correlation_id: self.format.correlation_id,
            filename: self.device_filename(),
            offset: offset as u32,
            size,
            width: (hpad + img.width()) as u16,
            height: (vpad + img.height()) as u16,
            horizontal_padding: hpad as i16,
            vertical_padding: vpad as i16,
        })
    }
}

impl Drop for IthmbWriter<'_> {
    fn drop(&mut self) {
        if self.file.take().is_some() && self.cur_offset == 0 {
            let _ = std::fs::remove_file(self.host_filename());
        }
    }
}

/// Decode any non-device thumbnail shape, scaled to fit the target box
/// with its aspect ratio kept.
fn decode_source(source: &Thumbnail, target_w: u32, target_h: u32) -> Option<RgbaImage> {
    let dynamic = match source {
        Thumbnail::File { path, .. } => image::open(path).ok()?,
        Thumbnail::Memory { data, .. } => image::load_from_memory(data).ok()?,
        Thumbnail::Pixels { pixels, .. } => {
            let buf = RgbaImage::from_raw(pixels.width, pixels.height, pixels.data.clone())?;
            image::DynamicImage::ImageRgba8(buf)
        }
        Thumbnail::Device { .. } => return None,
    };
    let resized = if dynamic.width() > target_w || dynamic.height() > target_h {
        dynamic.resize(target_w, target_h, image::imageops::FilterType::Lanczos3)
    } else {
        dynamic
    };
    Some(resized.to_rgba8())
}

/// Placeholder shown for undecodable artwork: a grey canvas with a
/// question mark blocked out of an 8x8 bitmap.
fn placeholder(width: u32, height: u32) -> RgbaImage {
    const GLYPH: [u8; 8] = [
        0b0011_1100,
        0b0110_0110,
        0b0000_0110,
        0b0000_1100,
        0b0001_1000,
        0b0001_1000,
        0b0000_0000,
        0b0001_1000,
    ];
    let mut img = RgbaImage::from_pixel(width, height, image::Rgba([64, 64, 64, 255]));
    let cell = (width.min(height) / 12).max(1);
    let origin_x = (width.saturating_sub(cell * 8)) / 2;
    let origin_y = (height.saturating_sub(cell * 8)) / 2;
    for (row, bits) in GLYPH.iter().enumerate() {
        for col in 0..8 {
            if bits & (0x80 >> col) == 0 {
                continue;
            }
            for dy in 0..cell {
                for dx in 0..cell {
                    let x = origin_x + col as u32 * cell + dx;
                    let y = origin_y + row as u32 * cell + dy;
                    if x < width && y < height {
                        img.put_pixel(x, y, image::Rgba([220, 220, 220, 255]));
                    }
                }
            }
        }
    }
    img
}

/// Convert every artwork with a non-device thumbnail into packed slots,
/// one per supported format. Artwork already on the device is left
/// untouched.
pub fn write_thumbnails<'a>(
    device: &Device,
    db_kind: DbKind,
    formats: &[&'a ArtworkFormat],
    artworks: impl Iterator<Item = &'a mut Artwork>,
) -> Result<()> {
    let mut writers = Vec::with_capacity(formats.len());
    for format in formats {
        writers.push(IthmbWriter::new(device, format, db_kind)?);
    }

    for artwork in artworks {
        let source = match &artwork.thumbnail {
            Some(thumb) if !thumb.is_on_device() => thumb.clone(),
            _ => continue,
        };
        let mut items = Vec::with_capacity(writers.len());
        for writer in &mut writers {
            items.push(writer.write_thumbnail(&source)?);
        }
        artwork.thumbnail = Some(Thumbnail::Device { items });
    }
    Ok(())
}

/// Build an in-memory pixel source from encoded bytes; used by callers
/// that want to hand over decoded pixels.
pub fn pixel_buffer_from_encoded(data: &[u8]) -> Result<PixelBuffer> {
    let img = image::load_from_memory(data)
        .map_err(|err| Error::model(format!("could not decode image: {err}")))?
        .to_rgba8();
    Ok(PixelBuffer {
        width: img.width(),
        height: img.height(),
        data: img.into_raw(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceModel, PixelFormat, ThumbKind};
    use tempfile::TempDir;

    fn test_format() -> ArtworkFormat {
        ArtworkFormat {
            kind: ThumbKind::CoverSmall,
            width: 8,
            height: 8,
            correlation_id: 7001,
            pixel_format: PixelFormat::Rgb565Le,
            padding: 0,
        }
    }

    fn device_on(tmp: &TempDir) -> Device {
        std::fs::create_dir_all(tmp.path().join("iPod_Control")).unwrap();
        Device::new(tmp.path(), DeviceModel::Video)
    }

    #[test]
    fn test_pixels_source_packs_one_slot() {
        let tmp = TempDir::new().unwrap();
        let device = device_on(&tmp);
        let format = test_format();
        let mut writer = IthmbWriter::new(&device, &format, DbKind::Music).unwrap();

        let source = Thumbnail::Pixels {
            pixels: PixelBuffer {
                width: 8,
                height: 8,
                data: vec![0xff; 8 * 8 * 4],
            },
            rotation: 0,
        };
        let item = writer.write_thumbnail(&source).unwrap();
        assert_eq!(item.offset, 0);
        assert_eq!(item.size, 8 * 8 * 2);
        assert_eq!(item.filename, ":F7001_0.ithmb");

        let second = writer.write_thumbnail(&source).unwrap();
        assert_eq!(second.offset, 8 * 8 * 2);

        drop(writer);
        let file = tmp.path().join("iPod_Control/Artwork/F7001_0.ithmb");
        assert_eq!(std::fs::metadata(file).unwrap().len(), 2 * 8 * 8 * 2);
    }

    #[test]
    fn test_undecodable_source_uses_placeholder() {
        let tmp = TempDir::new().unwrap();
        let device = device_on(&tmp);
        let format = test_format();
        let mut writer = IthmbWriter::new(&device, &format, DbKind::Music).unwrap();

        let source = Thumbnail::Memory {
            data: vec![0xde, 0xad, 0xbe, 0xef],
            rotation: 90,
        };
        let item = writer.write_thumbnail(&source).unwrap();
        assert_eq!(item.size, 8 * 8 * 2);
    }

    #[test]
    fn test_photo_thumbs_are_centred() {
        let tmp = TempDir::new().unwrap();
        let device = device_on(&tmp);
        let format = ArtworkFormat {
            kind: ThumbKind::PhotoSmall,
            ..test_format()
        };
        let mut writer = IthmbWriter::new(&device, &format, DbKind::Photo).unwrap();

        let source = Thumbnail::Pixels {
            pixels: PixelBuffer {
                width: 4,
                height: 8,
                data: vec![0xff; 4 * 8 * 4],
            },
            rotation: 0,
        };
        let item = writer.write_thumbnail(&source).unwrap();
        assert_eq!(item.horizontal_padding, 2);
        assert_eq!(item.vertical_padding, 0);
        assert!(item.filename.starts_with(":Thumbs:"));
    }

    #[test]
    fn test_per_slot_padding() {
        let tmp = TempDir::new().unwrap();
        let device = device_on(&tmp);
        let format = ArtworkFormat {
            padding: 200,
            ..test_format()
        };
        let mut writer = IthmbWriter::new(&device, &format, DbKind::Music).unwrap();
        let source = Thumbnail::Pixels {
            pixels: PixelBuffer {
                width: 8,
                height: 8,
                data: vec![0u8; 8 * 8 * 4],
            },
            rotation: 0,
        };
        writer.write_thumbnail(&source).unwrap();
        writer.write_thumbnail(&source).unwrap();
        drop(writer);
        let file = tmp.path().join("iPod_Control/Artwork/F7001_0.ithmb");
        assert_eq!(std::fs::metadata(file).unwrap().len(), 400);
    }
}
