//! Music database write pass: domain model → hunk stream

use crate::error::{Error, Result};
use crate::hunk::{self, Writer};
use crate::itunesdb::parser::mhod_id;
use crate::itunesdb::playcounts;
use crate::itunesdb::sort::{SortIndexBuilder, SORT_KINDS};
use crate::model::database::{MusicDb, DB_VERSION};
use crate::model::playlist::Playlist;
use crate::model::track::Track;
use crate::spl::FieldType;
use std::collections::HashMap;

/// First track id handed out by the writer.
const FIRST_IPOD_ID: u32 = 0x34;

/// Write the database to the device: artwork first (non-fatal), then the
/// `iTunesDB`, then the sidecar cleanup.
pub fn write(db: &mut MusicDb) -> Result<()> {
    // Artwork failures must never abort the main database write.
    if db.device.artwork_formats().iter().any(|f| !f.kind.is_photo()) {
        if let Err(err) = crate::artworkdb::writer::write_artwork_db(db) {
            log::warn!("ArtworkDB write failed (continuing): {err}");
        }
    }

    let bytes = to_bytes(db)?;

    let control = db.device.mountpoint().join("iPod_Control");
    if db.device.control_dir().is_err() {
        std::fs::create_dir_all(control.join("iTunes"))?;
    } else if db.device.itunes_dir().is_err() {
        std::fs::create_dir_all(db.device.control_dir()?.join("iTunes"))?;
    }
    let path = db.device.itunesdb_path()?;
    log::info!("writing {:?} ({} bytes)", path, bytes.len());
    std::fs::write(&path, bytes)?;

    playcounts::rename_sidecars(&db.device)
}

/// Serialise the database to bytes, reassigning ids and reordering
/// tracks as a side effect.
pub fn to_bytes(db: &mut MusicDb) -> Result<Vec<u8>> {
    prepare(db)?;

    let ctx = WriteContext::new(db);
    let mut w = Writer::new(db.device.reversed());

    let mhbd_seek = mk_mhbd(&mut w, db);
    let mut next_group_id = FIRST_IPOD_ID + db.tracks.len() as u32;
    write_mhsd_tracks(&mut w, db);
    write_mhsd_playlists(&mut w, db, &ctx, 3, &mut next_group_id)?;
    write_mhsd_playlists(&mut w, db, &ctx, 2, &mut next_group_id)?;
    w.fix_total(mhbd_seek);

    Ok(w.into_bytes())
}

/// Pre-write pass: master playlist ordering, id reassignment and rule
/// normalisation.
fn prepare(db: &mut MusicDb) -> Result<()> {
    let mpl_members = db.mpl()?.members.clone();

    // Arrange the tracks in master-playlist order so that on-the-go
    // ordinals recorded by the device resolve correctly. Tracks absent
    // from the MPL (e.g. podcasts) keep their relative order behind.
    let mut rank: HashMap<u64, usize> = HashMap::new();
    for (index, &dbid) in mpl_members.iter().enumerate() {
        rank.entry(dbid).or_insert(index);
    }
    db.tracks
        .sort_by_key(|t| rank.get(&t.dbid).copied().unwrap_or(usize::MAX));

    // Fresh transient ids; readers treat on-disk ids as transient too.
    for (index, track) in db.tracks.iter_mut().enumerate() {
        track.id = FIRST_IPOD_ID + index as u32;
        track.playcount2 = track.playcount;
    }

    // Normalise smart-rule payloads so written bytes are reproducible.
    for playlist in &mut db.playlists {
        if let Some(smart) = &mut playlist.smart {
            for rule in &mut smart.rules.rules {
                rule.validate();
            }
        }
    }

    db.version = DB_VERSION;
    Ok(())
}

/// Lookup tables shared by the playlist writers.
struct WriteContext {
    id_by_dbid: HashMap<u64, u32>,
    index_by_dbid: HashMap<u64, usize>,
}

impl WriteContext {
    fn new(db: &MusicDb) -> Self {
        let mut id_by_dbid = HashMap::new();
        let mut index_by_dbid = HashMap::new();
        for (index, track) in db.tracks.iter().enumerate() {
            id_by_dbid.insert(track.dbid, track.id);
            index_by_dbid.insert(track.dbid, index);
        }
        WriteContext {
            id_by_dbid,
            index_by_dbid,
        }
    }
}

fn mk_mhbd(w: &mut Writer, db: &MusicDb) -> usize {
    let seek = w.pos();
    w.put_tag(hunk::MHBD);
    w.put_u32(104); // header size
    w.put_u32(0); // total size, patched at the end
    w.put_u32(1);
    w.put_u32(db.version);
    w.put_u32(3); // children: the three mhsd sections
    w.put_u64(db.dbid);
    w.put_u32(2);
    w.put_zero_u32(17);
    seek
}

fn mk_mhsd(w: &mut Writer, index: u32) -> usize {
    let seek = w.pos();
    w.put_tag(hunk::MHSD);
    w.put_u32(96);
    w.put_u32(0); // patched
    w.put_u32(index);
    w.put_zero_u32(20);
    seek
}

fn write_mhsd_tracks(w: &mut Writer, db: &MusicDb) {
    let mhsd_seek = mk_mhsd(w, 1);

    w.put_tag(hunk::MHLT);
    w.put_u32(92);
    w.put_u32(db.tracks.len() as u32);
    w.put_zero_u32(20);

    for track in &db.tracks {
        write_mhit(w, track);
    }
    w.fix_total(mhsd_seek);
}

fn write_mhit(w: &mut Writer, track: &Track) {
    let mhit_seek = w.pos();
    w.put_tag(hunk::MHIT);
    w.put_u32(0x148); // header size
    w.put_u32(0); // total size, patched below
    w.put_u32(0); // mhod count, patched below
    w.put_u32(track.id);
    w.put_u32(track.visible);
    w.put_u32(track.filetype_marker);
    w.put_u8(track.type1);
    w.put_u8(track.type2);
    w.put_u8(track.compilation);
    w.put_u8(track.rating);
    w.put_u32(track.time_modified);
    w.put_u32(track.size);
    w.put_u32(track.tracklen);
    w.put_u32(track.track_nr);
    w.put_u32(track.tracks);
    w.put_u32(track.year);
    w.put_u32(track.bitrate);
    w.put_u32(((track.samplerate as u32) << 16) | track.samplerate_low as u32);
    w.put_u32(track.volume as u32);
    w.put_u32(track.starttime);
    w.put_u32(track.stoptime);
    w.put_u32(track.soundcheck);
    w.put_u32(track.playcount);
    w.put_u32(track.playcount2);
    w.put_u32(track.time_played);
    w.put_u32(track.cd_nr);
    w.put_u32(track.cds);
    w.put_u32(track.drm_userid);
    w.put_u32(track.time_added);
    w.put_u32(track.bookmark_time);
    w.put_u64(track.dbid);
    w.put_u8(if track.checked != 0 { 1 } else { 0 });
    w.put_u8(track.app_rating);
    w.put_u16(track.bpm);
    w.put_u16(track.artwork_count);
    w.put_u16(track.unk126);
    w.put_u32(track.artwork_size);
    w.put_u32(track.unk132);
    w.put_f32(track.samplerate2);
    w.put_u32(track.time_released);
    w.put_u16(track.unk144);
    w.put_u16(track.unk146);
    w.put_u32(track.unk148);
    w.put_u32(track.unk152);
    w.put_u32(track.skipcount);
    w.put_u32(track.last_skipped);
    w.put_u8(track.has_artwork);
    w.put_u8(track.skip_when_shuffling);
    w.put_u8(track.remember_playback_position);
    w.put_u8(track.flag4);
    w.put_u64(track.dbid2);
    w.put_u8(track.lyrics_flag);
    w.put_u8(track.movie_flag);
    w.put_u8(track.mark_unplayed);
    w.put_u8(track.unk179);
    w.put_u32(track.unk180);
    w.put_u32(track.pregap);
    w.put_u64(track.samplecount);
    w.put_u32(track.unk196);
    w.put_u32(track.postgap);
    w.put_u32(track.unk204);
    w.put_u32(track.mediatype);
    w.put_u32(track.season_nr);
    w.put_u32(track.episode_nr);
    w.put_u32(track.unk220);
    w.put_u32(track.unk224);
    w.put_u32(track.unk228);
    w.put_u32(track.unk232);
    w.put_u32(track.unk236);
    w.put_u32(track.unk240);
    w.put_u32(track.unk244);
    w.put_u32(track.gapless_data);
    w.put_u32(track.unk252);
    w.put_u16(track.gapless_track_flag);
    w.put_u16(track.gapless_album_flag);
    w.put_zero_u32(17);

    let mut mhod_num = 0u32;
    let strings: [(u32, &Option<String>); 19] = [
        (mhod_id::TITLE, &track.title),
        (mhod_id::PATH, &track.ipod_path),
        (mhod_id::ALBUM, &track.album),
        (mhod_id::ARTIST, &track.artist),
        (mhod_id::GENRE, &track.genre),
        (mhod_id::FILETYPE, &track.filetype),
        (mhod_id::COMMENT, &track.comment),
        (mhod_id::CATEGORY, &track.category),
        (mhod_id::COMPOSER, &track.composer),
        (mhod_id::GROUPING, &track.grouping),
        (mhod_id::DESCRIPTION, &track.description),
        (mhod_id::SUBTITLE, &track.subtitle),
        (mhod_id::TVSHOW, &track.tv_show),
        (mhod_id::TVEPISODE, &track.tv_episode),
        (mhod_id::TVNETWORK, &track.tv_network),
        (mhod_id::ALBUMARTIST, &track.album_artist),
        (mhod_id::KEYWORDS, &track.keywords),
        (mhod_id::PODCASTURL, &track.podcast_url),
        (mhod_id::PODCASTRSS, &track.podcast_rss),
    ];
    for (mhod_type, value) in strings {
        if let Some(s) = value {
            if !s.is_empty() {
                mk_mhod_string(w, mhod_type, s);
                mhod_num += 1;
            }
        }
    }
    if let Some(chapter_data) = &track.chapter_data {
        if !chapter_data.is_empty() {
            mk_mhod_blob(w, mhod_id::CHAPTERDATA, chapter_data);
            mhod_num += 1;
        }
    }

    w.fix_total(mhit_seek);
    w.patch_u32(mhit_seek + 12, mhod_num);
}

/// String mhod. Normal databases carry UTF-16; byte-order-reversed ones
/// carry UTF-8. Podcast URL/RSS strings are raw bytes without an
/// encoding word.
fn mk_mhod_string(w: &mut Writer, mhod_type: u32, s: &str) {
    if mhod_type == mhod_id::PODCASTURL || mhod_type == mhod_id::PODCASTRSS {
        let bytes = s.as_bytes();
        w.put_tag(hunk::MHOD);
        w.put_u32(24);
        w.put_u32(24 + bytes.len() as u32);
        w.put_u32(mhod_type);
        w.put_zero_u32(2);
        w.put_bytes(bytes);
        return;
    }

    if !w.reversed() {
        let len16: u32 = s.encode_utf16().count() as u32;
        w.put_tag(hunk::MHOD);
        w.put_u32(24);
        w.put_u32(2 * len16 + 40);
        w.put_u32(mhod_type);
        w.put_zero_u32(2);
        w.put_u32(1); // string type UTF-16
        w.put_u32(2 * len16);
        w.put_zero_u32(2);
        w.put_utf16(s);
    } else {
        let len = s.len() as u32;
        w.put_tag(hunk::MHOD);
        w.put_u32(24);
        w.put_u32(len + 40);
        w.put_u32(mhod_type);
        w.put_zero_u32(2);
        w.put_u32(2); // string type UTF-8
        w.put_u32(len);
        w.put_u8(1);
        w.put_u8(0);
        w.put_u8(0);
        w.put_u8(0);
        w.put_u32(0);
        w.put_bytes(s.as_bytes());
    }
}

fn mk_mhod_blob(w: &mut Writer, mhod_type: u32, data: &[u8]) {
    w.put_tag(hunk::MHOD);
    w.put_u32(24);
    w.put_u32(24 + data.len() as u32);
    w.put_u32(mhod_type);
    w.put_zero_u32(2);
    w.put_bytes(data);
}

/// The ordinal mhod attached to every playlist entry.
fn mk_mhod_ordinal(w: &mut Writer, position: u32) {
    w.put_tag(hunk::MHOD);
    w.put_u32(24);
    w.put_u32(44);
    w.put_u32(mhod_id::PLAYLIST);
    w.put_zero_u32(2);
    w.put_u32(position);
    w.put_zero_u32(4);
}

/// Opaque playlist-UI mhod (type 100). Every playlist carries one; the
/// firmware refuses to show playlist contents without it, so the known
/// 0x288-byte blob is reproduced verbatim.
fn mk_mhod_playlist_ui(w: &mut Writer) {
    w.put_tag(hunk::MHOD);
    w.put_u32(0x18);
    w.put_u32(0x288);
    w.put_u32(mhod_id::PLAYLIST);
    w.put_zero_u32(6);
    w.put_u32(0x010084);
    w.put_u32(0x05);
    w.put_u32(0x09);
    w.put_u32(0x03);
    w.put_u32(0x120001);
    w.put_zero_u32(3);
    w.put_u32(0xc80002);
    w.put_zero_u32(3);
    w.put_u32(0x3c000d);
    w.put_zero_u32(3);
    w.put_u32(0x7d0004);
    w.put_zero_u32(3);
    w.put_u32(0x7d0003);
    w.put_zero_u32(3);
    w.put_u32(0x640008);
    w.put_zero_u32(3);
    w.put_u32(0x640017);
    w.put_u32(0x01);
    w.put_zero_u32(2);
    w.put_u32(0x500014);
    w.put_u32(0x01);
    w.put_zero_u32(2);
    w.put_u32(0x7d0015);
    w.put_u32(0x01);
    w.put_zero_u32(114);
}

fn mk_mhod_splpref(w: &mut Writer, pref: &crate::spl::SplPref) {
    w.put_tag(hunk::MHOD);
    w.put_u32(24);
    w.put_u32(96);
    w.put_u32(mhod_id::SPLPREF);
    w.put_zero_u32(2);
    w.put_u8(pref.liveupdate as u8);
    w.put_u8(pref.checkrules as u8);
    w.put_u8(pref.checklimits as u8);
    w.put_u8(pref.limittype as u8);
    w.put_u8((pref.limitsort & 0xff) as u8);
    w.put_u8(0);
    w.put_u8(0);
    w.put_u8(0);
    w.put_u32(pref.limitvalue);
    w.put_u8(pref.matchcheckedonly as u8);
    // Bit 31 of the limit sort travels in its own byte on disk.
    w.put_u8(if pref.limitsort & 0x8000_0000 != 0 { 1 } else { 0 });
    w.put_u8(0);
    w.put_u8(0);
    w.put_zero_u32(14);
}

/// Smart rules: the `SLst` body uses the opposite byte order of the rest
/// of the file.
fn mk_mhod_splrules(w: &mut Writer, rules: &crate::spl::SplRules) {
    let mhod_seek = w.pos();
    w.put_tag(hunk::MHOD);
    w.put_u32(24);
    w.put_u32(0); // patched
    w.put_u32(mhod_id::SPLRULES);
    w.put_zero_u32(2);

    w.put_tag(hunk::SLST);
    w.put_u32_swapped(rules.unk004);
    w.put_u32_swapped(rules.rules.len() as u32);
    w.put_u32_swapped(rules.match_operator);
    w.put_zero_u32(30);

    for rule in &rules.rules {
        w.put_u32_swapped(rule.field);
        w.put_u32_swapped(rule.action);
        w.put_zero_u32(11);
        if rule.field_type() == FieldType::String {
            let s = rule.string.as_deref().unwrap_or("");
            let byte_len = s.encode_utf16().count() as u32 * 2;
            w.put_u32_swapped(byte_len);
            w.put_utf16_swapped(s);
        } else {
            w.put_u32_swapped(0x44);
            w.put_u64_swapped(rule.fromvalue);
            w.put_u64_swapped(rule.fromdate as u64);
            w.put_u64_swapped(rule.fromunits);
            w.put_u64_swapped(rule.tovalue);
            w.put_u64_swapped(rule.todate as u64);
            w.put_u64_swapped(rule.tounits);
            w.put_u32_swapped(rule.unk052);
            w.put_u32_swapped(rule.unk056);
            w.put_u32_swapped(rule.unk060);
            w.put_u32_swapped(rule.unk064);
            w.put_u32_swapped(rule.unk068);
        }
    }
    w.fix_total(mhod_seek);
}

/// Library sort-index mhod (type 52) for the master playlist.
fn mk_mhod_sort_index(w: &mut Writer, sort_type: u32, indices: &[u32]) {
    w.put_tag(hunk::MHOD);
    w.put_u32(24);
    w.put_u32(4 * indices.len() as u32 + 72);
    w.put_u32(mhod_id::LIBPLAYLISTINDEX);
    w.put_zero_u32(2);
    w.put_u32(sort_type);
    w.put_u32(indices.len() as u32);
    w.put_zero_u32(10);
    for &index in indices {
        w.put_u32(index);
    }
}

fn mk_mhip(
    w: &mut Writer,
    podcast_group_flag: u32,
    podcast_group_id: u32,
    track_id: u32,
    timestamp: u32,
    podcast_group_ref: u32,
) -> usize {
    let seek = w.pos();
    w.put_tag(hunk::MHIP);
    w.put_u32(76);
    w.put_u32(0); // patched: child mhod included in the total
    w.put_u32(1); // child count
    w.put_u32(podcast_group_flag);
    w.put_u32(podcast_group_id);
    w.put_u32(track_id);
    w.put_u32(timestamp);
    w.put_u32(podcast_group_ref);
    w.put_zero_u32(10);
    seek
}

fn write_mhsd_playlists(
    w: &mut Writer,
    db: &MusicDb,
    ctx: &WriteContext,
    mhsd_type: u32,
    next_group_id: &mut u32,
) -> Result<()> {
    let mhsd_seek = mk_mhsd(w, mhsd_type);

    w.put_tag(hunk::MHLP);
    w.put_u32(92);
    w.put_u32(db.playlists.len() as u32);
    w.put_zero_u32(20);

    for playlist in &db.playlists {
        write_playlist(w, db, ctx, playlist, mhsd_type, next_group_id)?;
    }
    w.fix_total(mhsd_seek);
    Ok(())
}

fn write_playlist(
    w: &mut Writer,
    db: &MusicDb,
    ctx: &WriteContext,
    playlist: &Playlist,
    mhsd_type: u32,
    next_group_id: &mut u32,
) -> Result<()> {
    let mhyp_seek = w.pos();

    let mut mhod_num = 2u32; // title + playlist-UI blob
    if playlist.is_smart() {
        mhod_num += 2;
    } else if playlist.is_mpl() && !playlist.is_empty() {
        mhod_num += 5; // the five sort indices
    }

    w.put_tag(hunk::MHYP);
    w.put_u32(108);
    w.put_u32(0); // patched
    w.put_u32(mhod_num);
    w.put_u32(0); // mhip count, patched below
    w.put_u8(playlist.pl_type);
    w.put_u8(playlist.flag1);
    w.put_u8(playlist.flag2);
    w.put_u8(playlist.flag3);
    w.put_u32(playlist.timestamp);
    w.put_u64(playlist.id);
    w.put_u32(0);
    w.put_u16(1); // string mhod count
    w.put_u16(playlist.podcastflag);
    w.put_u32(playlist.sortorder);
    w.put_zero_u32(15);

    mk_mhod_string(w, mhod_id::TITLE, &playlist.name);
    mk_mhod_playlist_ui(w);

    if playlist.is_mpl() && !playlist.is_empty() && !playlist.is_smart() {
        // Sort the master playlist's members five ways; collation keys
        // are built once and reused across the sorts.
        let builder = SortIndexBuilder::new();
        let member_tracks = playlist
            .members
            .iter()
            .filter_map(|dbid| ctx.index_by_dbid.get(dbid).map(|&i| &db.tracks[i]));
        let collated = builder.collate(member_tracks);
        for kind in SORT_KINDS {
            let indices = builder.sorted_indices(&collated, kind);
            mk_mhod_sort_index(w, kind as u32, &indices);
        }
    } else if let Some(smart) = &playlist.smart {
        mk_mhod_splpref(w, &smart.pref);
        mk_mhod_splrules(w, &smart.rules);
    }

    let mhip_num = if playlist.is_podcasts() && mhsd_type == 3 {
        write_podcast_mhips(w, db, ctx, playlist, next_group_id)?
    } else {
        write_playlist_mhips(w, ctx, playlist)?
    };
    w.patch_u32(mhyp_seek + 16, mhip_num);
    w.fix_total(mhyp_seek);
    Ok(())
}

fn write_playlist_mhips(w: &mut Writer, ctx: &WriteContext, playlist: &Playlist) -> Result<u32> {
    let mut written = 0u32;
    for (position, dbid) in playlist.members.iter().enumerate() {
        let track_id = match ctx.id_by_dbid.get(dbid) {
            Some(&id) => id,
            None => {
                return Err(Error::model(format!(
                    "playlist '{}' references unknown track {dbid:#x}",
                    playlist.name
                )))
            }
        };
        let mhip_seek = mk_mhip(w, 0, 0, track_id, 0, 0);
        mk_mhod_ordinal(w, position as u32);
        w.fix_total(mhip_seek);
        written += 1;
    }
    Ok(written)
}

/// The podcast section groups members under one header entry per album
/// string, each member pointing back at its group's id.
fn write_podcast_mhips(
    w: &mut Writer,
    db: &MusicDb,
    ctx: &WriteContext,
    playlist: &Playlist,
    next_group_id: &mut u32,
) -> Result<u32> {
    let mut groups: Vec<(String, Vec<&Track>)> = Vec::new();
    let mut group_index: HashMap<String, usize> = HashMap::new();
    for dbid in &playlist.members {
        let track = match ctx.index_by_dbid.get(dbid) {
            Some(&i) => &db.tracks[i],
            None => {
                return Err(Error::model(format!(
                    "podcasts playlist references unknown track {dbid:#x}"
                )))
            }
        };
        let album = track.album.clone().unwrap_or_default();
        let at = *group_index.entry(album.clone()).or_insert_with(|| {
            groups.push((album, Vec::new()));
            groups.len() - 1
        });
        groups[at].1.push(track);
    }

    let mut written = 0u32;
    for (album, members) in &groups {
        let group_id = *next_group_id;
        *next_group_id += 1;

        let header_seek = mk_mhip(w, 0x100, group_id, 0, 0, 0);
        mk_mhod_string(w, mhod_id::TITLE, album);
        w.fix_total(header_seek);
        written += 1;

        for track in members {
            let entry_id = *next_group_id;
            *next_group_id += 1;
            let mhip_seek = mk_mhip(w, 0, entry_id, track.id, 0, group_id);
            mk_mhod_ordinal(w, entry_id);
            w.fix_total(mhip_seek);
            written += 1;
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceModel;

    fn sample_db() -> MusicDb {
        let mut db = MusicDb::create("/tmp/ipod", DeviceModel::Video);
        for i in 0..3 {
            let mut track = Track::new();
            track.title = Some(format!("Song {i}"));
            let dbid = db.add_track(track);
            db.mpl_mut().unwrap().add_member(dbid);
        }
        db
    }

    #[test]
    fn test_track_ids_start_at_0x34() {
        let mut db = sample_db();
        to_bytes(&mut db).unwrap();
        let ids: Vec<u32> = db.tracks.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0x34, 0x35, 0x36]);
    }

    #[test]
    fn test_tracks_follow_mpl_order() {
        let mut db = sample_db();
        let reversed: Vec<u64> = db.mpl().unwrap().members.iter().rev().copied().collect();
        db.mpl_mut().unwrap().members = reversed.clone();
        to_bytes(&mut db).unwrap();
        let order: Vec<u64> = db.tracks.iter().map(|t| t.dbid).collect();
        assert_eq!(order, reversed);
    }

    #[test]
    fn test_file_starts_with_mhbd() {
        let mut db = sample_db();
        let bytes = to_bytes(&mut db).unwrap();
        assert_eq!(&bytes[0..4], b"mhbd");
        // Total length covers the whole stream.
        let total = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        assert_eq!(total as usize, bytes.len());
    }

    #[test]
    fn test_missing_mpl_is_rejected() {
        let mut db = sample_db();
        db.playlists[0].pl_type = crate::model::playlist::PL_TYPE_NORM;
        assert!(matches!(
            to_bytes(&mut db),
            Err(Error::InMemoryCorrupt(_))
        ));
    }
}
