//! Track records

use crate::model::artwork::Artwork;
use serde::{Deserialize, Serialize};

/// Media-type bitmask values stored in the track record.
pub mod media_type {
    pub const AUDIO_VIDEO: u32 = 0x0000;
    pub const AUDIO: u32 = 0x0001;
    pub const MOVIE: u32 = 0x0002;
    pub const PODCAST: u32 = 0x0004;
    pub const VIDEO_PODCAST: u32 = 0x0006;
    pub const AUDIOBOOK: u32 = 0x0008;
    pub const MUSIC_VIDEO: u32 = 0x0020;
    pub const TV_SHOW: u32 = 0x0040;
}

/// One track of the music database.
///
/// Numeric fields mirror the on-disk record; timestamps are device-epoch
/// seconds (see [`crate::device::Device::mac_to_host`]). The `unk*`
/// fields have no known meaning but must survive a parse/write cycle, so
/// they are carried verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    /// Intra-database id, reassigned on every write (transient).
    pub id: u32,
    /// 64-bit persistent id, unique within the database.
    pub dbid: u64,

    pub title: Option<String>,
    /// On-device path, colon-separated (`:iPod_Control:Music:F00:…`).
    pub ipod_path: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    /// Filetype description, e.g. "MPEG audio file".
    pub filetype: Option<String>,
    pub comment: Option<String>,
    pub category: Option<String>,
    pub composer: Option<String>,
    pub grouping: Option<String>,
    pub description: Option<String>,
    pub podcast_url: Option<String>,
    pub podcast_rss: Option<String>,
    pub subtitle: Option<String>,
    pub tv_show: Option<String>,
    pub tv_episode: Option<String>,
    pub tv_network: Option<String>,
    pub album_artist: Option<String>,
    pub keywords: Option<String>,

    /// Raw chapter-data blob, carried opaquely.
    pub chapter_data: Option<Vec<u8>>,

    pub visible: u32,
    pub filetype_marker: u32,
    pub type1: u8,
    pub type2: u8,
    pub compilation: u8,
    /// 0–100 in steps of 20 (stars × 20).
    pub rating: u8,
    pub time_modified: u32,
    pub size: u32,
    /// Duration in milliseconds.
    pub tracklen: u32,
    pub track_nr: u32,
    pub tracks: u32,
    pub year: u32,
    pub bitrate: u32,
    pub samplerate: u16,
    pub samplerate_low: u16,
    pub volume: i32,
    pub starttime: u32,
    pub stoptime: u32,
    pub soundcheck: u32,
    pub playcount: u32,
    pub playcount2: u32,
    pub time_played: u32,
    pub cd_nr: u32,
    pub cds: u32,
    pub drm_userid: u32,
    pub time_added: u32,
    pub bookmark_time: u32,
    /// 0 = checked in the UI, 1 = unchecked.
    pub checked: u8,
    pub app_rating: u8,
    pub bpm: u16,
    pub artwork_count: u16,
    pub artwork_size: u32,
    pub samplerate2: f32,
    pub time_released: u32,
    pub skipcount: u32,
    pub last_skipped: u32,
    pub has_artwork: u8,
    pub skip_when_shuffling: u8,
    pub remember_playback_position: u8,
    pub flag4: u8,
    pub dbid2: u64,
    pub lyrics_flag: u8,
    pub movie_flag: u8,
    pub mark_unplayed: u8,
    pub pregap: u32,
    pub samplecount: u64,
    pub postgap: u32,
    pub mediatype: u32,
    pub season_nr: u32,
    pub episode_nr: u32,
    pub gapless_data: u32,
    pub gapless_track_flag: u16,
    pub gapless_album_flag: u16,

    /// Set once the file exists on the device.
    pub transferred: bool,
    /// Playcount delta merged from the sidecar at parse time (transient).
    pub recent_playcount: u32,
    pub recent_skipcount: u32,

    /// Artwork id this track references in the ArtworkDB (write-time).
    pub mhii_link: u32,
    /// Cover artwork attached to this track.
    pub artwork: Option<Artwork>,

    // Round-trip fields with unknown semantics, emitted verbatim.
    pub unk126: u16,
    pub unk132: u32,
    pub unk144: u16,
    pub unk146: u16,
    pub unk148: u32,
    pub unk152: u32,
    pub unk179: u8,
    pub unk180: u32,
    pub unk196: u32,
    pub unk204: u32,
    pub unk220: u32,
    pub unk224: u32,
    pub unk228: u32,
    pub unk232: u32,
    pub unk236: u32,
    pub unk240: u32,
    pub unk244: u32,
    pub unk252: u32,
}

impl Track {
    pub fn new() -> Self {
        Track {
            visible: 1,
            ..Default::default()
        }
    }

    /// Whether any thumbnail shape is attached.
    pub fn has_thumbnails(&self) -> bool {
        self.artwork
            .as_ref()
            .map(|a| a.thumbnail.is_some())
            .unwrap_or(false)
    }

    /// Rating expressed in stars (0–5).
    pub fn stars(&self) -> u8 {
        self.rating / 20
    }
}
