//! ArtworkDB / Photo Database parse pass

use super::mhod_type;
use crate::device::Device;
use crate::error::{Error, Result};
use crate::hunk::{self, Reader};
use crate::model::album::PhotoAlbum;
use crate::model::artwork::{Artwork, DeviceThumb, Thumbnail};
use crate::model::database::{MusicDb, PhotoDb};
use std::collections::HashMap;

/// Parse the `Photo Database` of `device`.
pub fn parse_photo_db(device: Device) -> Result<PhotoDb> {
    let path = device.photodb_path()?;
    if !path.exists() {
        return Err(Error::NotFound(path));
    }
    log::info!("parsing {:?}", path);
    let data = std::fs::read(&path)?;
    parse_photo_bytes(device, &data)
}

/// Parse an in-memory photo database image.
pub fn parse_photo_bytes(mut device: Device, data: &[u8]) -> Result<PhotoDb> {
    let (images, albums, reversed) = parse_mhfd(data, device.reversed())?;
    device.set_reversed(reversed);

    let mut photos = Vec::with_capacity(images.len());
    let mut index_by_id = HashMap::new();
    for (artwork, _song_id) in images {
        index_by_id.insert(artwork.id, photos.len());
        photos.push(artwork);
    }

    let albums = albums
        .into_iter()
        .map(|(mut album, member_ids)| {
            album.members = member_ids
                .iter()
                .filter_map(|id| index_by_id.get(id).copied())
                .collect();
            album
        })
        .collect();

    let mut db = PhotoDb {
        device,
        photos,
        albums,
    };
    if db.albums.is_empty() || !db.albums[0].is_library() {
        return Err(Error::corrupt("photo database has no Photo Library album"));
    }
    for photo in &mut db.photos {
        let creation = photo.creation_date as u32;
        photo.creation_date = db.device.mac_to_host(creation);
        let digitized = photo.digitized_date as u32;
        photo.digitized_date = db.device.mac_to_host(digitized);
    }
    log::info!(
        "parsed {} photos, {} albums",
        db.photos.len(),
        db.albums.len()
    );
    Ok(db)
}

/// Attach the `ArtworkDB` contents to the parsed music database. A
/// missing file just means no artwork; structural errors are returned.
pub fn load_artwork_db(db: &mut MusicDb) -> Result<()> {
    let path = match db.device.control_dir() {
        Ok(control) => match Device::resolve_path(&control, &["Artwork", "ArtworkDB"]) {
            Some(path) => path,
            None => return Ok(()),
        },
        Err(_) => return Ok(()),
    };
    log::debug!("parsing {:?}", path);
    let data = std::fs::read(&path)?;
    let (images, _albums, _reversed) = parse_mhfd(&data, db.device.reversed())?;

    let mut by_dbid: HashMap<u64, Artwork> = HashMap::new();
    for (mut artwork, song_id) in images {
        let creation = artwork.creation_date as u32;
        artwork.creation_date = db.device.mac_to_host(creation);
        let digitized = artwork.digitized_date as u32;
        artwork.digitized_date = db.device.mac_to_host(digitized);
        artwork.dbid = song_id;
        by_dbid.insert(song_id, artwork);
    }
    let mut attached = 0;
    for track in &mut db.tracks {
        if let Some(artwork) = by_dbid.remove(&track.dbid) {
            track.artwork = Some(artwork);
            attached += 1;
        }
    }
    log::debug!("attached artwork to {attached} tracks");
    Ok(())
}

type ParsedImage = (Artwork, u64);
type ParsedAlbum = (PhotoAlbum, Vec<u32>);

/// Parse an artwork-database container into its image and album lists,
/// reporting the probed byte order. Timestamps are left in device epoch
/// for the caller to convert.
fn parse_mhfd(
    data: &[u8],
    expect_reversed: bool,
) -> Result<(Vec<ParsedImage>, Vec<ParsedAlbum>, bool)> {
    let mut reader = Reader::new(data, expect_reversed);
    if !reader.has_tag(0, hunk::MHFD)? {
        reader = reader.swapped();
        if !reader.has_tag(0, hunk::MHFD)? {
            return Err(Error::corrupt("not an artwork database (missing mhfd header)"));
        }
    }
    let header_len = reader.read_u32(4)? as usize;
    let total_len = reader.read_u32(8)? as usize;
    let num_children = reader.read_u32(20)?;

    let mut images = Vec::new();
    let mut albums = Vec::new();

    let mut seek = header_len;
    for _ in 0..num_children {
        if seek >= total_len {
            break;
        }
        reader.expect_tag(seek, hunk::MHSD)?;
        let mhsd_len = reader.read_u32(seek + 4)? as usize;
        let mhsd_total = reader.read_u32(seek + 8)? as usize;
        if mhsd_total == 0 {
            return Err(Error::corrupt(format!("hunk length 0 at offset {seek}")));
        }
        let index = reader.read_u16(seek + 12)?;
        let body = seek + mhsd_len;
        match index {
            1 => images = parse_mhli(reader, body)?,
            2 => albums = parse_mhla(reader, body)?,
            3 => {} // file list carries only format metadata
            other => log::warn!("unknown artwork section index {other}, skipping"),
        }
        seek += mhsd_total;
    }
    Ok((images, albums, reader.reversed()))
}

fn parse_mhli(reader: Reader<'_>, seek: usize) -> Result<Vec<ParsedImage>> {
    reader.expect_tag(seek, hunk::MHLI)?;
    let header_len = reader.read_u32(seek + 4)? as usize;
    let count = reader.read_u32(seek + 8)?;

    let mut images = Vec::with_capacity(count as usize);
    let mut at = seek + header_len;
    for _ in 0..count {
        let (image, next) = parse_mhii(reader, at)?;
        images.push(image);
        at = next;
    }
    Ok(images)
}

fn parse_mhii(reader: Reader<'_>, seek: usize) -> Result<(ParsedImage, usize)> {
    reader.expect_tag(seek, hunk::MHII)?;
    let header_len = reader.read_u32(seek + 4)? as usize;
    let total_len = reader.read_u32(seek + 8)? as usize;
    reader.check(seek, total_len)?;
    let num_children = reader.read_u32(seek + 12)?;

    let mut artwork = Artwork {
        id: reader.read_u32(seek + 16)?,
        dbid: 0,
        thumbnail: None,
        source_size: reader.read_u32(seek + 48)?,
        // Device epoch here; converted by the caller.
        creation_date: reader.read_u32(seek + 40)? as i64,
        digitized_date: reader.read_u32(seek + 44)? as i64,
        rating: reader.read_u32(seek + 32)?,
        unk028: reader.read_u32(seek + 28)?,
        unk036: reader.read_u32(seek + 36)?,
    };
    let song_id = reader.read_u64(seek + 20)?;

    let mut items = Vec::new();
    let mut at = seek + header_len;
    for _ in 0..num_children {
        reader.expect_tag(at, hunk::MHOD)?;
        let mhod_len = reader.read_u32(at + 4)? as usize;
        let mhod_total = reader.read_u32(at + 8)? as usize;
        if mhod_total == 0 {
            return Err(Error::corrupt(format!("hunk length 0 at offset {at}")));
        }
        let kind = reader.read_u16(at + 12)?;
        if kind == mhod_type::THUMBNAIL {
            items.push(parse_mhni(reader, at + mhod_len)?);
        } else {
            log::warn!("unknown artwork mhod type {kind} at {at}, skipping");
        }
        at += mhod_total;
    }
    if !items.is_empty() {
        artwork.thumbnail = Some(Thumbnail::Device { items });
    }
    Ok(((artwork, song_id), seek + total_len))
}

fn parse_mhni(reader: Reader<'_>, seek: usize) -> Result<DeviceThumb> {
    reader.expect_tag(seek, hunk::MHNI)?;
    let header_len = reader.read_u32(seek + 4)? as usize;
    let num_children = reader.read_u32(seek + 12)?;

    let mut item = DeviceThumb {
        correlation_id: reader.read_u32(seek + 16)?,
        filename: String::new(),
        offset: reader.read_u32(seek + 20)?,
        size: reader.read_u32(seek + 24)?,
        vertical_padding: reader.read_u16(seek + 28)? as i16,
        horizontal_padding: reader.read_u16(seek + 30)? as i16,
        height: reader.read_u16(seek + 32)?,
        width: reader.read_u16(seek + 34)?,
    };

    let mut at = seek + header_len;
    for _ in 0..num_children {
        let (kind, total, value) = parse_string_mhod(reader, at)?;
        if kind == mhod_type::FILE_NAME {
            item.filename = value;
        }
        at += total;
    }
    Ok(item)
}

/// String mhods of the artwork databases: encoding 2 is UTF-16 in file
/// order, anything else UTF-8.
fn parse_string_mhod(reader: Reader<'_>, seek: usize) -> Result<(u16, usize, String)> {
    reader.expect_tag(seek, hunk::MHOD)?;
    let total_len = reader.read_u32(seek + 8)? as usize;
    reader.check(seek, total_len)?;
    let kind = reader.read_u16(seek + 12)?;
    let encoding = reader.read_u32(seek + 16)?;
    let len = reader.read_u32(seek + 20)? as usize;
    let value = if encoding == 2 {
        reader.read_utf16(seek + 24, len)?
    } else {
        reader.read_utf8(seek + 24, len)?
    };
    Ok((kind, total_len, value))
}

fn parse_mhla(reader: Reader<'_>, seek: usize) -> Result<Vec<ParsedAlbum>> {
    reader.expect_tag(seek, hunk::MHLA)?;
    let header_len = reader.read_u32(seek + 4)? as usize;
    let count = reader.read_u32(seek + 8)?;

    let mut albums = Vec::with_capacity(count as usize);
    let mut at = seek + header_len;
    for _ in 0..count {
        let (album, next) = parse_mhba(reader, at)?;
        albums.push(album);
        at = next;
    }
    Ok(albums)
}

fn parse_mhba(reader: Reader<'_>, seek: usize) -> Result<(ParsedAlbum, usize)> {
    reader.expect_tag(seek, hunk::MHBA)?;
    let header_len = reader.read_u32(seek + 4)? as usize;
    let total_len = reader.read_u32(seek + 8)? as usize;
    reader.check(seek, total_len)?;
    let num_mhods = reader.read_u32(seek + 12)?;
    let num_mhias = reader.read_u32(seek + 16)?;

    let mut album = PhotoAlbum::new("");
    album.album_id = reader.read_u32(seek + 20)?;
    album.unk024 = reader.read_u32(seek + 24)?;
    album.unk028 = reader.read_u16(seek + 28)?;
    album.album_type = reader.read_u8(seek + 30)?;
    album.playmusic = reader.read_u8(seek + 31)?;
    album.repeat = reader.read_u8(seek + 32)?;
    album.random = reader.read_u8(seek + 33)?;
    album.show_titles = reader.read_u8(seek + 34)?;
    album.transition_direction = reader.read_u8(seek + 35)?;
    album.slide_duration = reader.read_u32(seek + 36)?;
    album.transition_duration = reader.read_u32(seek + 40)?;
    album.unk044 = reader.read_u32(seek + 44)?;
    album.unk048 = reader.read_u32(seek + 48)?;
    album.song_id = reader.read_u64(seek + 52)?;
    album.prev_album_id = reader.read_u32(seek + 60)?;

    let mut at = seek + header_len;
    for _ in 0..num_mhods {
        let (kind, total, value) = parse_string_mhod(reader, at)?;
        if kind == mhod_type::ALBUM_NAME {
            album.name = value;
        }
        at += total;
    }

    let mut member_ids = Vec::with_capacity(num_mhias as usize);
    for _ in 0..num_mhias {
        reader.expect_tag(at, hunk::MHIA)?;
        let mhia_total = reader.read_u32(at + 8)? as usize;
        if mhia_total == 0 {
            return Err(Error::corrupt(format!("hunk length 0 at offset {at}")));
        }
        member_ids.push(reader.read_u32(at + 16)?);
        at += mhia_total;
    }

    Ok(((album, member_ids), seek + total_len))
}
