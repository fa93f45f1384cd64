//! Play-count and on-the-go sidecar files
//!
//! The firmware records listening activity in transient files next to
//! the database: `Play Counts` (or `iTunesStats` on the Shuffle) holds
//! per-track deltas in canonical track order, and `OTGPlaylistInfo_N`
//! holds playlists built on the device. Both are merged at parse time;
//! after a successful write the play-counts file is renamed to `.bak`
//! and the on-the-go files are removed.

use crate::device::Device;
use crate::error::{Error, Result};
use crate::hunk::{self, Reader};
use crate::model::database::MusicDb;
use crate::model::playlist::Playlist;
use std::fs;
use std::path::Path;

/// One entry of the play-counts file, in canonical track order.
#[derive(Debug, Clone, Default)]
pub struct PlaycountDelta {
    pub playcount: u32,
    pub time_played: u32,
    pub bookmark_time: u32,
    /// `None` when the file's entry length predates the rating field or
    /// carries the unset sentinel.
    pub rating: Option<u32>,
    pub skipcount: u32,
    pub last_skipped: u32,
}

/// Rating value meaning "not set" inside the file.
const NO_PLAYCOUNT: u32 = 0xffff_ffff;

/// Load the play-count deltas next to the given `iTunesDB` path.
///
/// Missing files are not an error; an empty list is returned. Zero-length
/// files (a common leftover of filesystem checks) are skipped as well.
pub fn read(itunesdb_path: &Path) -> Result<Vec<PlaycountDelta>> {
    let dir = match itunesdb_path.parent() {
        Some(dir) => dir,
        None => return Ok(Vec::new()),
    };

    if let Some(path) = Device::resolve_path(dir, &["Play Counts"]) {
        let data = fs::read(&path)?;
        if data.len() >= 0x60 {
            log::debug!("merging play counts from {:?}", path);
            return read_play_counts(&data);
        }
    } else if let Some(path) = Device::resolve_path(dir, &["iTunesStats"]) {
        let data = fs::read(&path)?;
        if data.len() >= 0x06 {
            log::debug!("merging iTunesStats from {:?}", path);
            return read_itunes_stats(&data);
        }
    }
    Ok(Vec::new())
}

fn read_play_counts(data: &[u8]) -> Result<Vec<PlaycountDelta>> {
    let mut reader = Reader::new(data, false);
    if !reader.has_tag(0, hunk::MHDP)? {
        reader = reader.swapped();
        if !reader.has_tag(0, hunk::MHDP)? {
            return Err(Error::corrupt("not a Play Counts file (missing mhdp header)"));
        }
    }

    let header_len = reader.read_u32(4)? as usize;
    if header_len < 0x60 {
        return Err(Error::corrupt(format!(
            "Play Counts header length smaller than expected ({header_len} < 96)"
        )));
    }
    let entry_len = reader.read_u32(8)? as usize;
    if entry_len < 0x0c {
        return Err(Error::corrupt(format!(
            "Play Counts entry length smaller than expected ({entry_len} < 12)"
        )));
    }
    let entry_num = reader.read_u32(12)? as usize;

    let mut deltas = Vec::with_capacity(entry_num);
    for i in 0..entry_num {
        let seek = header_len + i * entry_len;
        reader.check(seek, entry_len)?;

        let mut delta = PlaycountDelta {
            playcount: reader.read_u32(seek)?,
            time_played: reader.read_u32(seek + 4)?,
            bookmark_time: reader.read_u32(seek + 8)?,
            rating: None,
            skipcount: 0,
            last_skipped: 0,
        };
        // The rating field appeared with entry length 0x10, the skip
        // fields with 0x1c.
        if entry_len >= 0x10 {
            let rating = reader.read_u32(seek + 12)?;
            delta.rating = (rating != NO_PLAYCOUNT).then_some(rating);
        }
        if entry_len >= 0x1c {
            delta.skipcount = reader.read_u32(seek + 20)?;
            delta.last_skipped = reader.read_u32(seek + 24)?;
        }
        deltas.push(delta);
    }
    Ok(deltas)
}

/// The Shuffle's stats file: no tag, a 24-bit entry count, then
/// variable-length entries of 24-bit fields.
fn read_itunes_stats(data: &[u8]) -> Result<Vec<PlaycountDelta>> {
    let reader = Reader::new(data, false);
    let entry_num = reader.read_u32(0)? as usize;

    let mut deltas = Vec::with_capacity(entry_num);
    let mut seek = 6;
    for _ in 0..entry_num {
        let entry_len = reader.read_u24(seek)? as usize;
        if entry_len < 18 {
            return Err(Error::corrupt(format!(
                "iTunesStats entry length smaller than expected ({entry_len} < 18)"
            )));
        }
        deltas.push(PlaycountDelta {
            bookmark_time: reader.read_u24(seek + 3)?,
            playcount: reader.read_u24(seek + 12)?,
            skipcount: reader.read_u24(seek + 15)?,
            rating: None,
            time_played: 0,
            last_skipped: 0,
        });
        seek += entry_len;
    }
    Ok(deltas)
}

/// Merge the on-the-go playlist files into the database as named
/// playlists. Must run after all tracks are parsed, as entries index the
/// canonical track order.
pub fn read_otg_playlists(db: &mut MusicDb) -> Result<()> {
    let dir = match db.device.itunes_dir() {
        Ok(dir) => dir,
        Err(_) => return Ok(()),
    };
    if Device::resolve_path(&dir, &["OTGPlaylistInfo"]).is_none() {
        return Ok(());
    }

    for i in 1.. {
        let name = format!("OTGPlaylistInfo_{i}");
        let path = match Device::resolve_path(&dir, &[&name]) {
            Some(path) => path,
            None => break,
        };
        let data = fs::read(&path)?;
        merge_otg_file(db, &data, &format!("OTG Playlist {i}"))?;
    }
    Ok(())
}

fn merge_otg_file(db: &mut MusicDb, data: &[u8], name: &str) -> Result<()> {
    let mut reader = Reader::new(data, false);
    if !reader.has_tag(0, hunk::MHPO)? {
        reader = reader.swapped();
        if !reader.has_tag(0, hunk::MHPO)? {
            return Err(Error::corrupt("not an OTG playlist file (missing mhpo header)"));
        }
    }
    let header_len = reader.read_u32(4)? as usize;
    if header_len < 0x14 {
        return Err(Error::corrupt(format!(
            "OTG header length smaller than expected ({header_len} < 20)"
        )));
    }
    let entry_len = reader.read_u32(8)? as usize;
    if entry_len < 4 {
        return Err(Error::corrupt(format!(
            "OTG entry length smaller than expected ({entry_len} < 4)"
        )));
    }
    let entry_num = reader.read_u32(12)? as usize;
    if entry_num == 0 {
        return Ok(());
    }

    let mut playlist = Playlist::new(name);
    for i in 0..entry_num {
        let ordinal = reader.read_u32(header_len + entry_len * i)? as usize;
        match db.tracks.get(ordinal) {
            Some(track) => playlist.add_member(track.dbid),
            None => {
                return Err(Error::corrupt(format!(
                    "OTG playlist references non-existent track {ordinal}"
                )))
            }
        }
    }
    log::info!("merged OTG playlist '{}' ({} tracks)", name, playlist.len());
    db.add_playlist(playlist);
    Ok(())
}

/// Post-write cleanup: rename `Play Counts` to `Play Counts.bak` and
/// remove the on-the-go files.
pub fn rename_sidecars(device: &Device) -> Result<()> {
    let dir = device.itunes_dir()?;

    if let Some(old) = Device::resolve_path(&dir, &["Play Counts"]) {
        let new = dir.join("Play Counts.bak");
        fs::rename(&old, &new).map_err(|source| Error::Rename {
            from: old,
            to: new,
            source,
        })?;
    }

    if let Some(otg) = Device::resolve_path(&dir, &["OTGPlaylistInfo"]) {
        let _ = fs::remove_file(otg);
    }
    for i in 1.. {
        let name = format!("OTGPlaylistInfo_{i}");
        match Device::resolve_path(&dir, &[&name]) {
            Some(path) => {
                let _ = fs::remove_file(path);
            }
            None => break,
        }
    }
    Ok(())
}
