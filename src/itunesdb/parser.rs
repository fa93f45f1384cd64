//! Music database parse pass: hunk stream → domain model

use crate::device::Device;
use crate::error::{Error, Result};
use crate::hunk::{self, Reader};
use crate::itunesdb::playcounts::{self, PlaycountDelta};
use crate::model::database::MusicDb;
use crate::model::playlist::{Playlist, PL_FLAG_NORM};
use crate::model::track::Track;
use crate::spl::{self, SplPref, SplRule, SplRules};
use std::collections::HashMap;

/// Parse the `iTunesDB` of `device`, merging the play-counts and
/// on-the-go sidecars found next to it.
pub fn parse(device: Device) -> Result<MusicDb> {
    let path = device.itunesdb_path()?;
    if !path.exists() {
        return Err(Error::NotFound(path));
    }
    log::info!("parsing {:?}", path);
    let data = std::fs::read(&path)?;
    let deltas = playcounts::read(&path)?;

    let mut db = parse_bytes(device, &data, deltas)?;
    playcounts::read_otg_playlists(&mut db)?;
    // Artwork problems never make the track database unreadable.
    if let Err(err) = crate::artworkdb::parser::load_artwork_db(&mut db) {
        log::warn!("could not load ArtworkDB: {err}");
    }
    Ok(db)
}

/// Parse an in-memory database image.
pub fn parse_bytes(
    mut device: Device,
    data: &[u8],
    deltas: Vec<PlaycountDelta>,
) -> Result<MusicDb> {
    let mut reader = Reader::new(data, false);
    if !reader.has_tag(0, hunk::MHBD)? {
        reader = reader.swapped();
        if !reader.has_tag(0, hunk::MHBD)? {
            return Err(Error::corrupt("not an iTunesDB (missing mhbd header)"));
        }
    }
    device.set_reversed(reader.reversed());

    let mhbd_len = reader.read_u32(4)?;
    if mhbd_len < 32 {
        return Err(Error::corrupt(format!(
            "mhbd header length smaller than expected ({mhbd_len} < 32)"
        )));
    }

    let mut db = MusicDb {
        device,
        version: reader.read_u32(16)?,
        dbid: reader.read_u64(24)?,
        tracks: Vec::new(),
        playlists: Vec::new(),
    };

    let mhsd_1 = find_mhsd(reader, 1)?;
    let mhsd_2 = find_mhsd(reader, 2)?;
    let mhsd_3 = find_mhsd(reader, 3)?;

    let mut parser = Parser {
        reader,
        id_map: HashMap::new(),
        deltas: deltas.into_iter(),
    };

    match mhsd_1 {
        Some(seek) => parser.parse_tracks(&mut db, seek)?,
        None => {
            return Err(Error::corrupt(
                "could not find tracklist (no mhsd type 1 section)",
            ))
        }
    }

    // The podcast-grouped section supersedes the plain playlist section
    // when both are present.
    match mhsd_3.or(mhsd_2) {
        Some(seek) => parser.parse_playlists(&mut db, seek)?,
        None => {
            return Err(Error::corrupt(
                "could not find playlists (no mhsd type 2 or 3 section)",
            ))
        }
    }

    ensure_mpl_first(&mut db)?;
    log::info!(
        "parsed {} tracks, {} playlists (version {:#x})",
        db.tracks.len(),
        db.playlists.len(),
        db.version
    );
    Ok(db)
}

/// Locate the `mhsd` section with the given index below the root.
fn find_mhsd(reader: Reader<'_>, index: u32) -> Result<Option<usize>> {
    let mut len = reader.read_u32(4)? as usize;
    let mhsd_num = reader.read_u32(20)?;

    let mut seek = 0usize;
    for _ in 0..mhsd_num {
        seek += len;
        reader.expect_tag(seek, hunk::MHSD)?;
        len = reader.read_u32(seek + 8)? as usize;
        if len == 0 {
            return Err(Error::corrupt(format!("hunk length 0 at offset {seek}")));
        }
        if reader.read_u32(seek + 12)? == index {
            return Ok(Some(seek));
        }
    }
    Ok(None)
}

/// Find the next hunk tagged `tag` inside the hunk at `outer`, starting
/// at `from`, skipping unknown hunks by their declared length.
fn find_next_in(reader: Reader<'_>, tag: hunk::Tag, outer: usize, from: usize) -> Result<Option<usize>> {
    let outer_len = reader.read_u32(outer + 8)? as usize;
    let mut offset = from - outer;
    loop {
        let len = reader.read_u32(outer + offset + 4)? as usize;
        if len == 0 {
            return Err(Error::corrupt(format!(
                "hunk length 0 at offset {}",
                outer + offset
            )));
        }
        offset += len;
        if offset >= outer_len.saturating_sub(4) {
            return Ok(None);
        }
        if reader.has_tag(outer + offset, tag)? {
            return Ok(Some(outer + offset));
        }
    }
}

/// Value carried by one `mhod` child.
enum MhodValue {
    String(String),
    Ordinal(u32),
    ChapterData(Vec<u8>),
    SplPref(SplPref),
    SplRules(SplRules),
    Skip,
}

struct Parser<'a> {
    reader: Reader<'a>,
    /// Transient on-disk track id → persistent id.
    id_map: HashMap<u32, u64>,
    deltas: std::vec::IntoIter<PlaycountDelta>,
}

impl<'a> Parser<'a> {
    fn parse_tracks(&mut self, db: &mut MusicDb, mhsd_seek: usize) -> Result<()> {
        let mhlt_seek = find_next_in(self.reader, hunk::MHLT, mhsd_seek, mhsd_seek)?
            .ok_or_else(|| Error::corrupt("no mhlt found in track section"))?;
        let nr_tracks = self.reader.read_u32(mhlt_seek + 8)?;

        let mut seek = find_next_in(self.reader, hunk::MHIT, mhsd_seek, mhlt_seek)?;
        for _ in 0..nr_tracks {
            match seek {
                Some(at) => seek = self.parse_mhit(db, at)?,
                None => {
                    log::warn!("number of tracks (mhit hunks) inconsistent, continuing");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Parse one track record; returns the offset of the next hunk.
    fn parse_mhit(&mut self, db: &mut MusicDb, seek: usize) -> Result<Option<usize>> {
        let r = self.reader;
        if !r.has_tag(seek, hunk::MHIT)? {
            return Ok(None);
        }
        let header_len = r.read_u32(seek + 4)? as usize;
        if header_len < 0x9c {
            return Err(Error::corrupt(format!(
                "mhit header length smaller than expected ({header_len} < 0x9c) at {seek}"
            )));
        }
        r.check(seek, header_len)?;
        let mhod_num = r.read_u32(seek + 12)?;

        let mut track = Track::new();
        track.id = r.read_u32(seek + 16)?;
        track.visible = r.read_u32(seek + 20)?;
        track.filetype_marker = r.read_u32(seek + 24)?;
        track.type1 = r.read_u8(seek + 28)?;
        track.type2 = r.read_u8(seek + 29)?;
        track.compilation = r.read_u8(seek + 30)?;
        track.rating = r.read_u8(seek + 31)?;
        track.time_modified = r.read_u32(seek + 32)?;
        track.size = r.read_u32(seek + 36)?;
        track.tracklen = r.read_u32(seek + 40)?;
        track.track_nr = r.read_u32(seek + 44)?;
        track.tracks = r.read_u32(seek + 48)?;
        track.year = r.read_u32(seek + 52)?;
        track.bitrate = r.read_u32(seek + 56)?;
        let samplerate_word = r.read_u32(seek + 60)?;
        track.samplerate = (samplerate_word >> 16) as u16;
        track.samplerate_low = (samplerate_word & 0xffff) as u16;
        track.volume = r.read_u32(seek + 64)? as i32;
        track.starttime = r.read_u32(seek + 68)?;
        track.stoptime = r.read_u32(seek + 72)?;
        track.soundcheck = r.read_u32(seek + 76)?;
        track.playcount = r.read_u32(seek + 80)?;
        track.playcount2 = r.read_u32(seek + 84)?;
        track.time_played = r.read_u32(seek + 88)?;
        track.cd_nr = r.read_u32(seek + 92)?;
        track.cds = r.read_u32(seek + 96)?;
        track.drm_userid = r.read_u32(seek + 100)?;
        track.time_added = r.read_u32(seek + 104)?;
        track.bookmark_time = r.read_u32(seek + 108)?;
        track.dbid = r.read_u64(seek + 112)?;
        track.checked = r.read_u8(seek + 120)?;
        track.app_rating = r.read_u8(seek + 121)?;
        track.bpm = r.read_u16(seek + 122)?;
        track.artwork_count = r.read_u16(seek + 124)?;
        track.unk126 = r.read_u16(seek + 126)?;
        track.artwork_size = r.read_u32(seek + 128)?;
        track.unk132 = r.read_u32(seek + 132)?;
        track.samplerate2 = r.read_f32(seek + 136)?;
        track.time_released = r.read_u32(seek + 140)?;
        track.unk144 = r.read_u16(seek + 144)?;
        track.unk146 = r.read_u16(seek + 146)?;
        track.unk148 = r.read_u32(seek + 148)?;
        track.unk152 = r.read_u32(seek + 152)?;

        if header_len >= 0xf4 {
            track.skipcount = r.read_u32(seek + 156)?;
            track.last_skipped = r.read_u32(seek + 160)?;
            track.has_artwork = r.read_u8(seek + 164)?;
            track.skip_when_shuffling = r.read_u8(seek + 165)?;
            track.remember_playback_position = r.read_u8(seek + 166)?;
            track.flag4 = r.read_u8(seek + 167)?;
            track.dbid2 = r.read_u64(seek + 168)?;
            track.lyrics_flag = r.read_u8(seek + 176)?;
            track.movie_flag = r.read_u8(seek + 177)?;
            track.mark_unplayed = r.read_u8(seek + 178)?;
            track.unk179 = r.read_u8(seek + 179)?;
            track.unk180 = r.read_u32(seek + 180)?;
            track.pregap = r.read_u32(seek + 184)?;
            track.samplecount = r.read_u64(seek + 188)?;
            track.unk196 = r.read_u32(seek + 196)?;
            track.postgap = r.read_u32(seek + 200)?;
            track.unk204 = r.read_u32(seek + 204)?;
            track.mediatype = r.read_u32(seek + 208)?;
            track.season_nr = r.read_u32(seek + 212)?;
            track.episode_nr = r.read_u32(seek + 216)?;
            track.unk220 = r.read_u32(seek + 220)?;
            track.unk224 = r.read_u32(seek + 224)?;
            track.unk228 = r.read_u32(seek + 228)?;
            track.unk232 = r.read_u32(seek + 232)?;
            track.unk236 = r.read_u32(seek + 236)?;
            track.unk240 = r.read_u32(seek + 240)?;
        }
        if header_len >= 0x148 {
            track.unk244 = r.read_u32(seek + 244)?;
            track.gapless_data = r.read_u32(seek + 248)?;
            track.unk252 = r.read_u32(seek + 252)?;
            track.gapless_track_flag = r.read_u16(seek + 256)?;
            track.gapless_album_flag = r.read_u16(seek + 258)?;
        }

        track.transferred = true;

        let mut mhod_seek = seek + header_len;
        for _ in 0..mhod_num {
            let (mhod_type, mhod_len, value) = match self.parse_mhod(mhod_seek)? {
                Some(parsed) => parsed,
                None => {
                    log::warn!("number of mhods in mhit at {seek} inconsistent");
                    break;
                }
            };
            match value {
                MhodValue::String(s) => assign_track_string(&mut track, mhod_type, s),
                MhodValue::ChapterData(data) => track.chapter_data = Some(data),
                MhodValue::Ordinal(_)
                | MhodValue::SplPref(_)
                | MhodValue::SplRules(_)
                | MhodValue::Skip => {}
            }
            mhod_seek += mhod_len;
        }

        self.merge_playcount(&mut track);

        self.id_map.insert(track.id, track.dbid);
        db.tracks.push(track);
        Ok(Some(mhod_seek))
    }

    fn merge_playcount(&mut self, track: &mut Track) {
        let delta = match self.deltas.next() {
            Some(delta) => delta,
            None => return,
        };
        if let Some(rating) = delta.rating {
            if track.rating as u32 != rating {
                track.app_rating = track.rating;
                track.rating = rating as u8;
            }
        }
        if delta.time_played != 0 {
            track.time_played = delta.time_played;
        }
        if delta.bookmark_time != 0 {
            track.bookmark_time = delta.bookmark_time;
        }
        track.playcount += delta.playcount;
        if delta.playcount != 0 {
            track.mark_unplayed = 0x01;
        }
        track.recent_playcount = delta.playcount;
        track.skipcount += delta.skipcount;
        track.recent_skipcount = delta.skipcount;
        if delta.last_skipped != 0 {
            track.last_skipped = delta.last_skipped;
        }
    }

    fn parse_playlists(&mut self, db: &mut MusicDb, mhsd_seek: usize) -> Result<()> {
        let mhlp_seek = find_next_in(self.reader, hunk::MHLP, mhsd_seek, mhsd_seek)?
            .ok_or_else(|| Error::corrupt("no mhlp found in playlist section"))?;
        let nr_playlists = self.reader.read_u32(mhlp_seek + 8)?;

        let mut seek = find_next_in(self.reader, hunk::MHYP, mhsd_seek, mhlp_seek)?;
        for _ in 0..nr_playlists {
            match seek {
                Some(at) => seek = self.parse_mhyp(db, at)?,
                None => {
                    log::warn!("number of playlists (mhyp hunks) inconsistent, continuing");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Parse one playlist; returns the offset of the next hunk.
    fn parse_mhyp(&mut self, db: &mut MusicDb, seek: usize) -> Result<Option<usize>> {
        let r = self.reader;
        if !r.has_tag(seek, hunk::MHYP)? {
            return Ok(None);
        }
        let header_len = r.read_u32(seek + 4)? as usize;
        if header_len < 48 {
            return Err(Error::corrupt(format!(
                "mhyp header length smaller than expected ({header_len} < 48) at {seek}"
            )));
        }
        r.check(seek, header_len)?;

        let next_seek = seek + r.read_u32(seek + 8)? as usize;
        let mhod_num = r.read_u32(seek + 12)?;
        let mhip_num = r.read_u32(seek + 16)?;

        let mut playlist = Playlist::new("");
        // Some producers add 256 to the type byte's word; the byte itself
        // is what matters.
        playlist.pl_type = r.read_u8(seek + 20)?;
        playlist.flag1 = r.read_u8(seek + 21)?;
        playlist.flag2 = r.read_u8(seek + 22)?;
        playlist.flag3 = r.read_u8(seek + 23)?;
        playlist.timestamp = r.read_u32(seek + 24)?;
        playlist.id = r.read_u64(seek + 28)?;
        playlist.podcastflag = r.read_u16(seek + 42)?;
        playlist.sortorder = r.read_u32(seek + 44)?;

        let mut pref: Option<SplPref> = None;
        let mut rules: Option<SplRules> = None;

        let mut mhod_seek = seek + header_len;
        for _ in 0..mhod_num {
            let (mhod_type, mhod_len, value) = match self.parse_mhod(mhod_seek)? {
                Some(parsed) => parsed,
                None => {
                    log::warn!("number of mhods in mhyp at {seek} inconsistent");
                    break;
                }
            };
            match value {
                MhodValue::String(s) if mhod_type == mhod_id::TITLE => playlist.name = s,
                MhodValue::SplPref(p) => pref = Some(p),
                MhodValue::SplRules(r) => rules = Some(r),
                _ => {}
            }
            mhod_seek += mhod_len;
        }

        if pref.is_some() || rules.is_some() {
            playlist.smart = Some(crate::model::playlist::SmartPlaylist {
                pref: pref.unwrap_or_default(),
                rules: rules.unwrap_or_default(),
            });
        }

        if playlist.name.is_empty() {
            playlist.name = if playlist.is_mpl() {
                "Master-PL".to_string()
            } else if playlist.is_podcasts() {
                "Podcasts".to_string()
            } else {
                "Playlist".to_string()
            };
        }

        // Member list: reconstruct playback order from the ordinal mhods.
        let mut ordinals: Vec<u32> = Vec::new();
        let mut mhip_seek = mhod_seek;
        for _ in 0..mhip_num {
            match self.parse_mhip(&mut playlist, &mut ordinals, mhip_seek)? {
                Some(next) => mhip_seek = next,
                None => {
                    return Err(Error::corrupt(format!(
                        "number of mhip sections inconsistent in mhyp at {seek}"
                    )))
                }
            }
        }

        db.playlists.push(playlist);
        Ok(Some(next_seek))
    }

    /// Parse one playlist entry; returns the offset of the next hunk.
    fn parse_mhip(
        &mut self,
        playlist: &mut Playlist,
        ordinals: &mut Vec<u32>,
        seek: usize,
    ) -> Result<Option<usize>> {
        let r = self.reader;
        if !r.has_tag(seek, hunk::MHIP)? {
            return Ok(None);
        }
        let header_len = r.read_u32(seek + 4)? as usize;
        if header_len < 36 {
            return Err(Error::corrupt(format!(
                "mhip header length smaller than expected ({header_len} < 36) at {seek}"
            )));
        }
        r.check(seek, header_len)?;
        let total_len = r.read_u32(seek + 8)? as usize;
        let mhod_num = r.read_u32(seek + 12)?;
        let track_id = r.read_u32(seek + 24)?;

        let mut position: Option<usize> = None;
        let mut mhod_seek = seek + header_len;
        for _ in 0..mhod_num {
            let (mhod_type, mhod_len, value) = match self.parse_mhod(mhod_seek)? {
                Some(parsed) => parsed,
                None => {
                    log::warn!("number of mhods in mhip at {seek} inconsistent");
                    break;
                }
            };
            if let (mhod_id::PLAYLIST, MhodValue::Ordinal(ordinal), None) =
                (mhod_type, &value, position)
            {
                // Ordinals need not be contiguous; the physical order is
                // ascending ordinal order.
                let at = ordinals.partition_point(|&o| o <= *ordinal);
                ordinals.insert(at, *ordinal);
                position = Some(at);
            }
            mhod_seek += mhod_len;
        }

        match self.id_map.get(&track_id) {
            Some(&dbid) => {
                let at = position.unwrap_or(playlist.len());
                playlist.insert_member(at, dbid);
            }
            None => {
                // Podcast group headers carry a zero track id; anything
                // else is worth a warning.
                if playlist.podcastflag == PL_FLAG_NORM && track_id != 0 {
                    log::warn!("track id {track_id} not found, skipping playlist entry");
                }
                if position.is_some() {
                    ordinals.remove(position.unwrap());
                }
            }
        }

        // Early producers set total_len == header_len, leaving the child
        // mhods out of the count; walk past them by their own lengths.
        if total_len == header_len && mhod_num > 0 {
            Ok(Some(mhod_seek))
        } else {
            Ok(Some(seek + total_len))
        }
    }

    /// Parse one `mhod`; returns its type, total length and value, or
    /// `None` when no mhod starts at `seek`.
    fn parse_mhod(&mut self, seek: usize) -> Result<Option<(u32, usize, MhodValue)>> {
        let r = self.reader;
        if !r.has_tag(seek, hunk::MHOD)? {
            return Ok(None);
        }
        let header_len = r.read_u32(seek + 4)? as usize;
        let total_len = r.read_u32(seek + 8)? as usize;
        let mhod_type = r.read_u32(seek + 12)?;
        r.check(seek, total_len)?;

        let body = seek + header_len;
        let value = match mhod_type {
            mhod_id::TITLE
            | mhod_id::PATH
            | mhod_id::ALBUM
            | mhod_id::ARTIST
            | mhod_id::GENRE
            | mhod_id::FILETYPE
            | mhod_id::COMMENT
            | mhod_id::CATEGORY
            | mhod_id::COMPOSER
            | mhod_id::GROUPING
            | mhod_id::DESCRIPTION
            | mhod_id::SUBTITLE
            | mhod_id::TVSHOW
            | mhod_id::TVEPISODE
            | mhod_id::TVNETWORK
            | mhod_id::ALBUMARTIST
            | mhod_id::KEYWORDS => {
                // Encoding word: 0/1 = UTF-16 in file order, 2 = UTF-8.
                let string_type = r.read_u32(body)?;
                let len = r.read_u32(body + 4)? as usize;
                let s = if string_type == 2 {
                    r.read_utf8(body + 16, len)?
                } else {
                    r.read_utf16(body + 16, len)?
                };
                MhodValue::String(s)
            }
            mhod_id::PODCASTURL | mhod_id::PODCASTRSS => {
                // Raw unterminated byte string, no encoding word.
                let len = total_len - header_len;
                MhodValue::String(r.read_utf8(body, len)?)
            }
            mhod_id::CHAPTERDATA => {
                MhodValue::ChapterData(r.bytes(body, total_len - header_len)?.to_vec())
            }
            mhod_id::PLAYLIST => MhodValue::Ordinal(r.read_u32(seek + 24)?),
            mhod_id::SPLPREF => MhodValue::SplPref(self.parse_splpref(body)?),
            mhod_id::SPLRULES => match self.parse_splrules(body) {
                Ok(rules) => MhodValue::SplRules(rules),
                // Keep the playlist with whatever rules loaded cleanly.
                Err(err) => {
                    log::warn!("corrupt smart playlist rules at {body}: {err}");
                    MhodValue::Skip
                }
            },
            mhod_id::LIBPLAYLISTINDEX => MhodValue::Skip,
            other => {
                log::warn!("unknown mhod type {other} at offset {seek}, skipping");
                MhodValue::Skip
            }
        };
        Ok(Some((mhod_type, total_len, value)))
    }

    fn parse_splpref(&self, body: usize) -> Result<SplPref> {
        let r = self.reader;
        r.check(body, 14)?;
        let mut pref = SplPref {
            liveupdate: r.read_u8(body)? != 0,
            checkrules: r.read_u8(body + 1)? != 0,
            checklimits: r.read_u8(body + 2)? != 0,
            limittype: r.read_u8(body + 3)? as u32,
            limitsort: r.read_u8(body + 4)? as u32,
            limitvalue: r.read_u32(body + 8)?,
            matchcheckedonly: r.read_u8(body + 12)? != 0,
        };
        // The "opposite" direction lives in a separate byte on disk.
        if r.read_u8(body + 13)? != 0 {
            pref.limitsort |= 0x8000_0000;
        }
        Ok(pref)
    }

    /// `SLst` bodies use the opposite byte order of the rest of the
    /// database.
    fn parse_splrules(&self, body: usize) -> Result<SplRules> {
        let r = self.reader;
        if !r.has_tag(body, hunk::SLST)? {
            return Err(Error::corrupt(format!("no SLst at offset {body}")));
        }
        let s = r.swapped();
        r.check(body, 136)?;
        let mut rules = SplRules {
            unk004: s.read_u32(body + 4)?,
            match_operator: s.read_u32(body + 12)?,
            rules: Vec::new(),
        };
        let numrules = s.read_u32(body + 8)?;

        let mut seek = body + 136;
        for _ in 0..numrules {
            r.check(seek, 56)?;
            let mut rule = SplRule {
                field: s.read_u32(seek)?,
                action: s.read_u32(seek + 4)?,
                ..Default::default()
            };
            if !spl::action_known(rule.action) {
                log::warn!(
                    "unknown smart rule action {:#x} at {seek}, keeping verbatim",
                    rule.action
                );
            }
            seek += 52;
            let payload_len = s.read_u32(seek)? as usize;

            if rule.field_type() == spl::FieldType::String {
                let units = s.read_utf16(seek + 4, payload_len)?;
                rule.string = Some(units);
            } else {
                if payload_len != 0x44 {
                    log::warn!("smart rule payload length {payload_len} not as expected (0x44)");
                }
                r.check(seek, 72)?;
                rule.fromvalue = s.read_u64(seek + 4)?;
                rule.fromdate = s.read_u64(seek + 12)? as i64;
                rule.fromunits = s.read_u64(seek + 20)?;
                rule.tovalue = s.read_u64(seek + 28)?;
                rule.todate = s.read_u64(seek + 36)? as i64;
                rule.tounits = s.read_u64(seek + 44)?;
                rule.unk052 = s.read_u32(seek + 52)?;
                rule.unk056 = s.read_u32(seek + 56)?;
                rule.unk060 = s.read_u32(seek + 60)?;
                rule.unk064 = s.read_u32(seek + 64)?;
                rule.unk068 = s.read_u32(seek + 68)?;
            }
            rules.rules.push(rule);
            seek += payload_len + 4;
        }
        Ok(rules)
    }
}

/// mhod type discriminators.
pub mod mhod_id {
    pub const TITLE: u32 = 1;
    pub const PATH: u32 = 2;
    pub const ALBUM: u32 = 3;
    pub const ARTIST: u32 = 4;
    pub const GENRE: u32 = 5;
    pub const FILETYPE: u32 = 6;
    pub const COMMENT: u32 = 8;
    pub const CATEGORY: u32 = 9;
    pub const COMPOSER: u32 = 12;
    pub const GROUPING: u32 = 13;
    pub const DESCRIPTION: u32 = 14;
    pub const PODCASTURL: u32 = 15;
    pub const PODCASTRSS: u32 = 16;
    pub const CHAPTERDATA: u32 = 17;
    pub const SUBTITLE: u32 = 18;
    pub const TVSHOW: u32 = 19;
    pub const TVEPISODE: u32 = 20;
    pub const TVNETWORK: u32 = 21;
    pub const ALBUMARTIST: u32 = 22;
    pub const KEYWORDS: u32 = 24;
    pub const SPLPREF: u32 = 50;
    pub const SPLRULES: u32 = 51;
    pub const LIBPLAYLISTINDEX: u32 = 52;
    pub const PLAYLIST: u32 = 100;
}

fn assign_track_string(track: &mut Track, mhod_type: u32, s: String) {
    let slot = match mhod_type {
        mhod_id::TITLE => &mut track.title,
        mhod_id::PATH => &mut track.ipod_path,
        mhod_id::ALBUM => &mut track.album,
        mhod_id::ARTIST => &mut track.artist,
        mhod_id::GENRE => &mut track.genre,
        mhod_id::FILETYPE => &mut track.filetype,
        mhod_id::COMMENT => &mut track.comment,
        mhod_id::CATEGORY => &mut track.category,
        mhod_id::COMPOSER => &mut track.composer,
        mhod_id::GROUPING => &mut track.grouping,
        mhod_id::DESCRIPTION => &mut track.description,
        mhod_id::PODCASTURL => &mut track.podcast_url,
        mhod_id::PODCASTRSS => &mut track.podcast_rss,
        mhod_id::SUBTITLE => &mut track.subtitle,
        mhod_id::TVSHOW => &mut track.tv_show,
        mhod_id::TVEPISODE => &mut track.tv_episode,
        mhod_id::TVNETWORK => &mut track.tv_network,
        mhod_id::ALBUMARTIST => &mut track.album_artist,
        mhod_id::KEYWORDS => &mut track.keywords,
        _ => return,
    };
    *slot = Some(s);
}

/// The model keeps the master playlist at index 0; fix up databases that
/// have it elsewhere and reject ones without it.
fn ensure_mpl_first(db: &mut MusicDb) -> Result<()> {
    match db.playlists.iter().position(|pl| pl.is_mpl()) {
        Some(0) => Ok(()),
        Some(at) => {
            log::warn!("master playlist found at index {at}, moving to front");
            let mpl = db.playlists.remove(at);
            db.playlists.insert(0, mpl);
            Ok(())
        }
        None => Err(Error::corrupt("no master playlist in database")),
    }
}
