//! ArtworkDB / Photo Database write pass

use super::{mhod_type, FIRST_ARTWORK_ID, FIRST_PHOTO_ID};
use crate::device::{ArtworkFormat, Device};
use crate::error::Result;
use crate::hunk::{self, Writer};
use crate::model::album::PhotoAlbum;
use crate::model::artwork::{Artwork, DeviceThumb, Thumbnail};
use crate::model::database::{MusicDb, PhotoDb};
use crate::thumb::{self, DbKind};
use sha1::{Digest, Sha1};
use std::collections::HashMap;

/// Write the music database's cover-art side: renumber artwork ids,
/// compact and repack the `.ithmb` files, then emit `ArtworkDB`.
///
/// Mutates the tracks: artwork ids, dedup links, the has-artwork flag
/// and the on-device thumbnail shape.
pub fn write_artwork_db(db: &mut MusicDb) -> Result<()> {
    let formats: Vec<&ArtworkFormat> = db.device.model().cover_formats().collect();
    if formats.is_empty() {
        return Ok(());
    }

    let max_id = prepare_artwork_ids(db);

    // Fill the source-size field before sources are consumed.
    for artwork in db.tracks.iter_mut().filter_map(|t| t.artwork.as_mut()) {
        if artwork.source_size == 0 {
            if let Some(Thumbnail::File { path, .. }) = &artwork.thumbnail {
                if let Ok(metadata) = std::fs::metadata(path) {
                    artwork.source_size = metadata.len() as u32;
                }
            }
        }
    }

    // Compact the slot files against the surviving on-device items.
    {
        let items: Vec<&mut DeviceThumb> = db
            .tracks
            .iter_mut()
            .filter_map(|t| t.artwork.as_mut())
            .filter_map(|a| a.thumbnail.as_mut())
            .flat_map(|t| t.device_items_mut().iter_mut())
            .collect();
        thumb::compact::rearrange_files(&db.device, &formats, items)?;
    }

    // Pack new thumbnails: canonical records only; deduplicated records
    // share the canonical record's slots afterwards.
    thumb::write_thumbnails(
        &db.device,
        DbKind::Music,
        &formats,
        db.tracks
            .iter_mut()
            .filter_map(|t| t.artwork.as_mut())
            .filter(|a| a.dbid != 0),
    )?;

    let mut items_by_id: HashMap<u32, Vec<DeviceThumb>> = HashMap::new();
    for artwork in db.tracks.iter().filter_map(|t| t.artwork.as_ref()) {
        if artwork.dbid != 0 {
            if let Some(Thumbnail::Device { items }) = &artwork.thumbnail {
                items_by_id.insert(artwork.id, items.clone());
            }
        }
    }
    for artwork in db.tracks.iter_mut().filter_map(|t| t.artwork.as_mut()) {
        let packed = artwork
            .thumbnail
            .as_ref()
            .map(|t| t.is_on_device())
            .unwrap_or(false);
        if artwork.dbid == 0 && !packed {
            if let Some(items) = items_by_id.get(&artwork.id) {
                artwork.thumbnail = Some(Thumbnail::Device {
                    items: items.clone(),
                });
            }
        }
    }

    // Reflect the artwork state in the track records.
    for track in &mut db.tracks {
        if track.mhii_link != 0 {
            track.has_artwork = 0x01;
            track.artwork_count = 1;
            if let Some(artwork) = &track.artwork {
                track.artwork_size = artwork.source_size;
            }
        }
    }

    let bytes = serialize_music(db, max_id)?;
    let path = db.device.artworkdb_path()?;
    log::info!("writing {:?} ({} bytes)", path, bytes.len());
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Write the photo database: assign photo and album ids, repack and
/// compact thumbnails, then emit `Photo Database`.
pub fn write_photo_db(db: &mut PhotoDb) -> Result<()> {
    let formats: Vec<&ArtworkFormat> = db.device.model().photo_formats().collect();

    // Photo ids are sequential from 0x40.
    let mut id = FIRST_PHOTO_ID;
    for photo in &mut db.photos {
        photo.id = id;
        id += 1;
    }

    // Album ids continue above the photo range; each album also records
    // its predecessor's id.
    let mut prev_id = FIRST_ARTWORK_ID;
    let mut album_id = FIRST_ARTWORK_ID + db.photos.len() as u32;
    for (index, album) in db.albums.iter_mut().enumerate() {
        album.album_id = album_id;
        album.prev_album_id = prev_id;
        album_id += 1;
        prev_id += 1;
        if index > 0 {
            prev_id += album.members.len() as u32;
        }
    }

    if !formats.is_empty() {
        let items: Vec<&mut DeviceThumb> = db
            .photos
            .iter_mut()
            .filter_map(|a| a.thumbnail.as_mut())
            .flat_map(|t| t.device_items_mut().iter_mut())
            .collect();
        thumb::compact::rearrange_files(&db.device, &formats, items)?;

        thumb::write_thumbnails(&db.device, DbKind::Photo, &formats, db.photos.iter_mut())?;
    }

    let next_id = album_id.max(id);
    let bytes = serialize_photo(db, next_id)?;
    let path = db.device.photodb_path()?;
    log::info!("writing {:?} ({} bytes)", path, bytes.len());
    std::fs::write(path, bytes)?;
    Ok(())
}

// --- id assignment ---------------------------------------------------------

/// Renumber artwork ids: existing ids are remapped first-seen in track
/// order; on sparse-artwork devices identical new artwork within one
/// album is detected by checksum and shares one id. Returns the highest
/// id in use (0 when none).
fn prepare_artwork_ids(db: &mut MusicDb) -> u32 {
    let mut max_id = renumber_artwork_ids(db);
    if db.device.supports_sparse_artwork() {
        max_id = mark_new_doubles(db, max_id);
        max_id = renumber_artwork_ids(db);
    }
    max_id
}

fn renumber_artwork_ids(db: &mut MusicDb) -> u32 {
    let mut cur_id = FIRST_ARTWORK_ID;
    if db.device.supports_sparse_artwork() {
        let mut remap: HashMap<u32, u32> = HashMap::new();
        for track in &mut db.tracks {
            let has_thumbs = track.has_thumbnails();
            let dbid = track.dbid;
            track.mhii_link = 0;
            if let Some(artwork) = track.artwork.as_mut() {
                if has_thumbs && artwork.id != 0 {
                    match remap.get(&artwork.id) {
                        Some(&new_id) => {
                            artwork.id = new_id;
                            artwork.dbid = 0;
                        }
                        None => {
                            remap.insert(artwork.id, cur_id);
                            artwork.id = cur_id;
                            artwork.dbid = dbid;
                            cur_id += 1;
                        }
                    }
                    track.mhii_link = artwork.id;
                }
            }
        }
    } else {
        // No sparse-artwork support: renumber everything consecutively,
        // no sharing.
        for track in &mut db.tracks {
            let has_thumbs = track.has_thumbnails();
            let dbid = track.dbid;
            track.mhii_link = 0;
            if let Some(artwork) = track.artwork.as_mut() {
                if has_thumbs {
                    artwork.id = cur_id;
                    artwork.dbid = dbid;
                    track.mhii_link = artwork.id;
                    cur_id += 1;
                }
            }
        }
    }
    if cur_id == FIRST_ARTWORK_ID {
        0
    } else {
        cur_id - 1
    }
}

/// Assign ids to new artwork, giving identical images within one album
/// the same id. The checksum is SHA-1 over the album name and the
/// thumbnail source bytes (file contents, encoded bytes or raw pixels).
fn mark_new_doubles(db: &mut MusicDb, max_id: u32) -> u32 {
    let mut max_id = max_id.max(FIRST_ARTWORK_ID - 1);
    let mut seen: HashMap<[u8; 20], u32> = HashMap::new();

    for track in &mut db.tracks {
        let has_thumbs = track.has_thumbnails();
        let dbid = track.dbid;
        let album = track.album.clone().unwrap_or_default();
        if let Some(artwork) = track.artwork.as_mut() {
            if !has_thumbs || artwork.id != 0 {
                continue;
            }
            let digest = match checksum(&album, artwork.thumbnail.as_ref()) {
                Some(digest) => digest,
                None => continue,
            };
            match seen.get(&digest) {
                Some(&id) => {
                    artwork.id = id;
                    artwork.dbid = 0;
                }
                None => {
                    max_id += 1;
                    artwork.id = max_id;
                    artwork.dbid = dbid;
                    seen.insert(digest, max_id);
                }
            }
            track.mhii_link = artwork.id;
        }
    }
    max_id
}

fn checksum(album: &str, thumbnail: Option<&Thumbnail>) -> Option<[u8; 20]> {
    let mut hasher = Sha1::new();
    hasher.update(album.as_bytes());
    match thumbnail? {
        Thumbnail::Memory { data, .. } => {
            hasher.update(b"m");
            hasher.update(data);
        }
        Thumbnail::Pixels { pixels, .. } => {
            hasher.update(b"p");
            hasher.update(&pixels.data);
        }
        Thumbnail::File { path, .. } => {
            hasher.update(b"f");
            match std::fs::read(path) {
                Ok(contents) => hasher.update(&contents),
                Err(_) => hasher.update(path.to_string_lossy().as_bytes()),
            }
        }
        Thumbnail::Device { .. } => return None,
    }
    Some(hasher.finalize().into())
}

// --- serialisation ---------------------------------------------------------

fn serialize_music(db: &MusicDb, max_id: u32) -> Result<Vec<u8>> {
    let mut w = Writer::new(db.device.reversed());
    let mhfd = start_mhfd(&mut w, max_id);

    // Section 1: image list.
    let mhsd = start_mhsd(&mut w, 1);
    let mhli = w.reserve_padded(hunk::MHLI);
    let mut count = 0u32;
    for track in &db.tracks {
        let artwork = match &track.artwork {
            Some(a) => a,
            None => continue,
        };
        // Deduplicated records (dbid 0) share the canonical mhii.
        if artwork.dbid == 0 || !matches!(&artwork.thumbnail, Some(t) if t.is_on_device()) {
            continue;
        }
        write_mhii(&mut w, &db.device, artwork, track.dbid);
        count += 1;
    }
    w.patch_u32(mhli + 8, count);
    w.fix_total(mhsd);

    // Section 2: album list, unused by the music database.
    let mhsd = start_mhsd(&mut w, 2);
    let mhla = w.reserve_padded(hunk::MHLA);
    w.patch_u32(mhla + 8, 0);
    w.fix_total(mhsd);

    // Section 3: file list.
    write_file_list(&mut w, db.device.model().cover_formats());

    finish_mhfd(&mut w, mhfd);
    Ok(w.into_bytes())
}

fn serialize_photo(db: &PhotoDb, next_id: u32) -> Result<Vec<u8>> {
    let mut w = Writer::new(db.device.reversed());
    let mhfd = start_mhfd(&mut w, next_id);

    let mhsd = start_mhsd(&mut w, 1);
    let mhli = w.reserve_padded(hunk::MHLI);
    for photo in &db.photos {
        write_mhii(&mut w, &db.device, photo, photo.id as u64 + 2);
    }
    w.patch_u32(mhli + 8, db.photos.len() as u32);
    w.fix_total(mhsd);

    let mhsd = start_mhsd(&mut w, 2);
    let mhla = w.reserve_padded(hunk::MHLA);
    for album in &db.albums {
        write_mhba(&mut w, db, album);
    }
    w.patch_u32(mhla + 8, db.albums.len() as u32);
    w.fix_total(mhsd);

    write_file_list(&mut w, db.device.model().photo_formats());

    finish_mhfd(&mut w, mhfd);
    Ok(w.into_bytes())
}

fn start_mhfd(w: &mut Writer, next_id: u32) -> usize {
    let start = w.reserve_padded(hunk::MHFD);
    w.patch_u32(start + 16, 2); // format version
    w.patch_u32(start + 28, next_id);
    w.patch_u8(start + 48, 2);
    start
}

fn finish_mhfd(w: &mut Writer, start: usize) {
    w.patch_u32(start + 20, 3); // the three sections
    w.fix_total(start);
}

fn start_mhsd(w: &mut Writer, index: u16) -> usize {
    let start = w.reserve_padded(hunk::MHSD);
    w.patch_u16(start + 12, index);
    start
}

fn write_file_list<'a>(w: &mut Writer, formats: impl Iterator<Item = &'a ArtworkFormat>) {
    let mhsd = start_mhsd(w, 3);
    let mhlf = w.reserve_padded(hunk::MHLF);
    let mut count = 0u32;
    for format in formats {
        let mhif = w.reserve_padded(hunk::MHIF);
        w.fix_total(mhif);
        w.patch_u32(mhif + 16, format.correlation_id);
        w.patch_u32(mhif + 20, format.pixel_bytes());
        count += 1;
    }
    w.patch_u32(mhlf + 8, count);
    w.fix_total(mhsd);
}

fn write_mhii(w: &mut Writer, device: &Device, artwork: &Artwork, song_id: u64) {
    let start = w.reserve_padded(hunk::MHII);
    w.patch_u32(start + 16, artwork.id);
    w.patch_u64(start + 20, song_id);
    w.patch_u32(start + 28, artwork.unk028);
    w.patch_u32(start + 32, artwork.rating);
    w.patch_u32(start + 36, artwork.unk036);
    w.patch_u32(start + 40, device.host_to_mac(artwork.creation_date));
    w.patch_u32(start + 44, device.host_to_mac(artwork.digitized_date));
    w.patch_u32(start + 48, artwork.source_size);

    let mut children = 0u32;
    for item in artwork
        .thumbnail
        .as_ref()
        .map(|t| t.device_items())
        .unwrap_or(&[])
    {
        write_thumbnail_mhod(w, item);
        children += 1;
    }
    w.patch_u32(start + 12, children);
    w.fix_total(start);
}

/// Container mhod (type 2) wrapping one image-name record.
fn write_thumbnail_mhod(w: &mut Writer, item: &DeviceThumb) {
    let start = w.pos();
    w.put_tag(hunk::MHOD);
    w.put_u32(16);
    w.put_u32(0); // patched
    w.put_u16(mhod_type::THUMBNAIL);
    w.put_u8(0);
    w.put_u8(0);

    let mhni = w.reserve_padded(hunk::MHNI);
    w.patch_u32(mhni + 12, 1);
    w.patch_u32(mhni + 16, item.correlation_id);
    w.patch_u32(mhni + 20, item.offset);
    w.patch_u32(mhni + 24, item.size);
    w.patch_u16(mhni + 28, item.vertical_padding as u16);
    w.patch_u16(mhni + 30, item.horizontal_padding as u16);
    w.patch_u16(mhni + 32, item.height);
    w.patch_u16(mhni + 34, item.width);
    write_string_mhod(w, mhod_type::FILE_NAME, &item.filename);
    w.fix_total(mhni);

    w.fix_total(start);
}

fn write_mhba(w: &mut Writer, db: &PhotoDb, album: &PhotoAlbum) {
    let start = w.reserve_padded(hunk::MHBA);
    w.patch_u32(start + 12, 1); // one name mhod
    w.patch_u32(start + 16, album.members.len() as u32);
    w.patch_u32(start + 20, album.album_id);
    w.patch_u32(start + 24, album.unk024);
    w.patch_u16(start + 28, album.unk028);
    w.patch_u8(start + 30, album.album_type);
    w.patch_u8(start + 31, album.playmusic);
    w.patch_u8(start + 32, album.repeat);
    w.patch_u8(start + 33, album.random);
    w.patch_u8(start + 34, album.show_titles);
    w.patch_u8(start + 35, album.transition_direction);
    w.patch_u32(start + 36, album.slide_duration);
    w.patch_u32(start + 40, album.transition_duration);
    w.patch_u32(start + 44, album.unk044);
    w.patch_u32(start + 48, album.unk048);
    w.patch_u64(start + 52, album.song_id);
    w.patch_u32(start + 60, album.prev_album_id);

    write_string_mhod(w, mhod_type::ALBUM_NAME, &album.name);

    for &member in &album.members {
        if let Some(photo) = db.photos.get(member) {
            write_mhia(w, photo.id);
        }
    }
    w.fix_total(start);
}

fn write_mhia(w: &mut Writer, image_id: u32) {
    w.put_tag(hunk::MHIA);
    w.put_u32(40);
    w.put_u32(40);
    w.put_u32(0);
    w.put_u32(image_id);
    w.put_zeros(40 - 20);
}

/// String mhod of the artwork databases: 4-byte-aligned payload with a
/// padding-length byte in the header. Album names travel as UTF-8; file
/// names as UTF-16 on normal databases and UTF-8 on reversed ones, the
/// length field always giving the written byte count.
fn write_string_mhod(w: &mut Writer, mhod_type: u16, s: &str) {
    let utf16 = mhod_type == super::mhod_type::FILE_NAME && !w.reversed();
    let payload_len: usize = if utf16 {
        s.encode_utf16().count() * 2
    } else {
        s.len()
    };
    let mut padding = 4 - ((24 + payload_len) % 4);
    if padding == 4 {
        padding = 0;
    }

    w.put_tag(hunk::MHOD);
    w.put_u32(16);
    w.put_u32((24 + payload_len + padding) as u32);
    w.put_u16(mhod_type);
    w.put_u8(0);
    w.put_u8(padding as u8);
    w.put_u32(if utf16 { 2 } else { 1 });
    w.put_u32(payload_len as u32);
    if utf16 {
        w.put_utf16(s);
    } else {
        w.put_bytes(s.as_bytes());
    }
    w.put_zeros(padding);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceModel;
    use crate::model::track::Track;

    fn track_with_art(album: &str, data: Vec<u8>) -> Track {
        let mut track = Track::new();
        track.album = Some(album.into());
        track.artwork = Some(Artwork::from_memory(data));
        track
    }

    #[test]
    fn test_dedup_same_album_same_bytes() {
        let mut db = MusicDb::create("/tmp/ipod", DeviceModel::Video);
        for _ in 0..2 {
            db.add_track(track_with_art("X", vec![1, 2, 3]));
        }
        db.add_track(track_with_art("X", vec![9, 9, 9]));

        let max_id = prepare_artwork_ids(&mut db);
        let ids: Vec<u32> = db
            .tracks
            .iter()
            .map(|t| t.artwork.as_ref().unwrap().id)
            .collect();
        assert_eq!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
        assert!(ids.iter().all(|&id| id >= FIRST_ARTWORK_ID));
        assert_eq!(max_id, ids[2].max(ids[0]));

        // The duplicate lost its persistent link.
        assert_eq!(db.tracks[1].artwork.as_ref().unwrap().dbid, 0);
        assert_ne!(db.tracks[0].artwork.as_ref().unwrap().dbid, 0);
    }

    #[test]
    fn test_different_albums_do_not_share() {
        let mut db = MusicDb::create("/tmp/ipod", DeviceModel::Video);
        db.add_track(track_with_art("X", vec![1, 2, 3]));
        db.add_track(track_with_art("Y", vec![1, 2, 3]));
        prepare_artwork_ids(&mut db);
        let a = db.tracks[0].artwork.as_ref().unwrap().id;
        let b = db.tracks[1].artwork.as_ref().unwrap().id;
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_sparse_never_shares() {
        let mut db = MusicDb::create("/tmp/ipod", DeviceModel::Color);
        for _ in 0..2 {
            db.add_track(track_with_art("X", vec![1, 2, 3]));
        }
        prepare_artwork_ids(&mut db);
        let a = db.tracks[0].artwork.as_ref().unwrap().id;
        let b = db.tracks[1].artwork.as_ref().unwrap().id;
        assert_ne!(a, b);
        assert!(a >= FIRST_ARTWORK_ID && b >= FIRST_ARTWORK_ID);
    }

    #[test]
    fn test_photo_album_id_chain() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut db = PhotoDb::create(tmp.path(), DeviceModel::Color);
        for _ in 0..3 {
            db.add_photo(Artwork::from_memory(vec![0])).unwrap();
        }
        let mut trip = PhotoAlbum::new("Trip");
        trip.members = vec![0, 2];
        db.add_album(trip);

        db.write().unwrap();

        assert_eq!(db.photos[0].id, 0x40);
        assert_eq!(db.photos[2].id, 0x42);
        // Albums: 0x64 + photo count, then sequential.
        assert_eq!(db.albums[0].album_id, 0x67);
        assert_eq!(db.albums[1].album_id, 0x68);
        assert_eq!(db.albums[0].prev_album_id, 0x64);
        assert_eq!(db.albums[1].prev_album_id, 0x65);
    }
}
