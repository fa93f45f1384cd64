//! Smart-playlist rules: typing, validation and evaluation
//!
//! Rules carry a field selector, an action selector and six 64-bit value
//! slots whose interpretation depends on the (field-type, action-type)
//! pairing. Unknown actions are preserved verbatim so foreign databases
//! round-trip; evaluation treats them as non-matching.

use crate::model::database::MusicDb;
use crate::model::track::Track;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Sentinel stored in the value slots of date-typed rules.
pub const SPLDATE_IDENTIFIER: u64 = 0x2dae_2dae_2dae_2dae;

/// Maximum rule-string length iTunes writes to the database.
pub const SPL_MAX_STRING_LENGTH: usize = 255;

/// Match operator of a rule set.
pub const SPLMATCH_AND: u32 = 0;
pub const SPLMATCH_OR: u32 = 1;

/// Field selectors.
pub mod field {
    pub const SONG_NAME: u32 = 0x02;
    pub const ALBUM: u32 = 0x03;
    pub const ARTIST: u32 = 0x04;
    pub const BITRATE: u32 = 0x05;
    pub const SAMPLE_RATE: u32 = 0x06;
    pub const YEAR: u32 = 0x07;
    pub const GENRE: u32 = 0x08;
    pub const KIND: u32 = 0x09;
    pub const DATE_MODIFIED: u32 = 0x0a;
    pub const TRACKNUMBER: u32 = 0x0b;
    pub const SIZE: u32 = 0x0c;
    pub const TIME: u32 = 0x0d;
    pub const COMMENT: u32 = 0x0e;
    pub const DATE_ADDED: u32 = 0x10;
    pub const COMPOSER: u32 = 0x12;
    pub const PLAYCOUNT: u32 = 0x16;
    pub const LAST_PLAYED: u32 = 0x17;
    pub const DISC_NUMBER: u32 = 0x18;
    pub const RATING: u32 = 0x19;
    pub const COMPILATION: u32 = 0x1f;
    pub const BPM: u32 = 0x23;
    pub const GROUPING: u32 = 0x27;
    pub const PLAYLIST: u32 = 0x28;
}

/// Action selectors. The `0x02…`/`0x03…` variants are the negations.
pub mod action {
    pub const IS_INT: u32 = 0x0000_0001;
    pub const IS_GREATER_THAN: u32 = 0x0000_0010;
    pub const IS_LESS_THAN: u32 = 0x0000_0040;
    pub const IS_IN_THE_RANGE: u32 = 0x0000_0100;
    pub const IS_IN_THE_LAST: u32 = 0x0000_0200;
    pub const IS_STRING: u32 = 0x0100_0001;
    pub const CONTAINS: u32 = 0x0100_0002;
    pub const STARTS_WITH: u32 = 0x0100_0004;
    pub const ENDS_WITH: u32 = 0x0100_0008;
    pub const IS_NOT_INT: u32 = 0x0200_0001;
    pub const IS_NOT_GREATER_THAN: u32 = 0x0200_0010;
    pub const IS_NOT_LESS_THAN: u32 = 0x0200_0040;
    pub const IS_NOT_IN_THE_RANGE: u32 = 0x0200_0100;
    pub const IS_NOT_IN_THE_LAST: u32 = 0x0200_0200;
    pub const IS_NOT: u32 = 0x0300_0001;
    pub const DOES_NOT_CONTAIN: u32 = 0x0300_0002;
    pub const DOES_NOT_START_WITH: u32 = 0x0300_0004;
    pub const DOES_NOT_END_WITH: u32 = 0x0300_0008;
}

/// Units for the in-the-last actions, in seconds.
pub mod last_unit {
    pub const DAYS: u64 = 86_400;
    pub const WEEKS: u64 = 604_800;
    pub const MONTHS: u64 = 2_628_000;
}

/// Limit types of the smart-playlist preferences.
pub mod limit_type {
    pub const MINUTES: u32 = 0x01;
    pub const MB: u32 = 0x02;
    pub const SONGS: u32 = 0x03;
    pub const HOURS: u32 = 0x04;
    pub const GB: u32 = 0x05;
}

/// Limit sort orders. Bit 31 encodes the "opposite" direction; on disk
/// it is carried in a separate flag byte and merged back on load.
pub mod limit_sort {
    pub const RANDOM: u32 = 0x02;
    pub const SONG_NAME: u32 = 0x03;
    pub const ALBUM: u32 = 0x04;
    pub const ARTIST: u32 = 0x05;
    pub const GENRE: u32 = 0x07;
    pub const MOST_RECENTLY_ADDED: u32 = 0x10;
    pub const LEAST_RECENTLY_ADDED: u32 = 0x8000_0010;
    pub const MOST_OFTEN_PLAYED: u32 = 0x14;
    pub const LEAST_OFTEN_PLAYED: u32 = 0x8000_0014;
    pub const MOST_RECENTLY_PLAYED: u32 = 0x15;
    pub const LEAST_RECENTLY_PLAYED: u32 = 0x8000_0015;
    pub const HIGHEST_RATING: u32 = 0x17;
    pub const LOWEST_RATING: u32 = 0x8000_0017;
}

/// Smart-playlist preference record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplPref {
    /// Metadata only; the engine never watches for changes itself.
    pub liveupdate: bool,
    pub checkrules: bool,
    pub checklimits: bool,
    pub limittype: u32,
    /// Includes bit 31 for the "opposite" direction.
    pub limitsort: u32,
    pub limitvalue: u32,
    pub matchcheckedonly: bool,
}

/// One smart rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplRule {
    pub field: u32,
    pub action: u32,
    /// Comparison string for string-typed rules (UTF-8 in memory).
    pub string: Option<String>,
    pub fromvalue: u64,
    pub fromdate: i64,
    pub fromunits: u64,
    pub tovalue: u64,
    pub todate: i64,
    pub tounits: u64,
    // Stored verbatim for round-trip; the playlist field rules use them.
    pub unk052: u32,
    pub unk056: u32,
    pub unk060: u32,
    pub unk064: u32,
    pub unk068: u32,
}

/// An ordered rule list with its match operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplRules {
    /// Header word with varying observed values, stored verbatim.
    pub unk004: u32,
    pub match_operator: u32,
    pub rules: Vec<SplRule>,
}

/// What kind of value a field carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Boolean,
    Date,
    Playlist,
    Unknown,
}

/// How the payload of a rule is to be interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionType {
    String,
    Int,
    Date,
    RangeInt,
    RangeDate,
    InTheLast,
    Playlist,
    None,
    Invalid,
    Unknown,
}

/// Whether the action selector is one the engine understands.
pub fn action_known(action: u32) -> bool {
    matches!(
        action,
        action::IS_INT
            | action::IS_GREATER_THAN
            | action::IS_NOT_GREATER_THAN
            | action::IS_LESS_THAN
            | action::IS_NOT_LESS_THAN
            | action::IS_IN_THE_RANGE
            | action::IS_NOT_IN_THE_RANGE
            | action::IS_IN_THE_LAST
            | action::IS_NOT_IN_THE_LAST
            | action::IS_STRING
            | action::IS_NOT
            | action::CONTAINS
            | action::DOES_NOT_CONTAIN
            | action::STARTS_WITH
            | action::DOES_NOT_START_WITH
            | action::ENDS_WITH
            | action::DOES_NOT_END_WITH
    )
}

impl SplRule {
    /// Default rule: artist contains "".
    pub fn new() -> Self {
        SplRule {
            field: field::ARTIST,
            action: action::CONTAINS,
            fromunits: 1,
            tounits: 1,
            ..Default::default()
        }
    }

    pub fn field_type(&self) -> FieldType {
        match self.field {
            field::SONG_NAME
            | field::ALBUM
            | field::ARTIST
            | field::GENRE
            | field::KIND
            | field::COMMENT
            | field::COMPOSER
            | field::GROUPING => FieldType::String,
            field::BITRATE
            | field::SAMPLE_RATE
            | field::YEAR
            | field::TRACKNUMBER
            | field::SIZE
            | field::PLAYCOUNT
            | field::DISC_NUMBER
            | field::BPM
            | field::RATING
            | field::TIME => FieldType::Int,
            field::COMPILATION => FieldType::Boolean,
            field::DATE_MODIFIED | field::DATE_ADDED | field::LAST_PLAYED => FieldType::Date,
            field::PLAYLIST => FieldType::Playlist,
            _ => FieldType::Unknown,
        }
    }

    pub fn action_type(&self) -> ActionType {
        let known = action_known(self.action);
        match self.field_type() {
            FieldType::String => match self.action {
                action::IS_STRING
                | action::IS_NOT
                | action::CONTAINS
                | action::DOES_NOT_CONTAIN
                | action::STARTS_WITH
                | action::DOES_NOT_START_WITH
                | action::ENDS_WITH
                | action::DOES_NOT_END_WITH => ActionType::String,
                _ if known => ActionType::Invalid,
                _ => ActionType::Unknown,
            },
            FieldType::Int => match self.action {
                action::IS_INT
                | action::IS_NOT_INT
                | action::IS_GREATER_THAN
                | action::IS_NOT_GREATER_THAN
                | action::IS_LESS_THAN
                | action::IS_NOT_LESS_THAN => ActionType::Int,
                action::IS_IN_THE_RANGE | action::IS_NOT_IN_THE_RANGE => ActionType::RangeInt,
                _ if known => ActionType::Invalid,
                _ => ActionType::Unknown,
            },
            FieldType::Boolean => ActionType::None,
            FieldType::Date => match self.action {
                action::IS_INT
                | action::IS_NOT_INT
                | action::IS_GREATER_THAN
                | action::IS_NOT_GREATER_THAN
                | action::IS_LESS_THAN
                | action::IS_NOT_LESS_THAN => ActionType::Date,
                action::IS_IN_THE_LAST | action::IS_NOT_IN_THE_LAST => ActionType::InTheLast,
                action::IS_IN_THE_RANGE | action::IS_NOT_IN_THE_RANGE => ActionType::RangeDate,
                _ if known => ActionType::Invalid,
                _ => ActionType::Unknown,
            },
            FieldType::Playlist => match self.action {
                action::IS_INT | action::IS_NOT_INT => ActionType::Playlist,
                _ if known => ActionType::Invalid,
                _ => ActionType::Unknown,
            },
            FieldType::Unknown => ActionType::Unknown,
        }
    }

    /// Normalise the value slots the rule's type does not use, so that
    /// written payloads are reproducible. Run by the writer before each
    /// rule is emitted.
    pub fn validate(&mut self) {
        match self.action_type() {
            ActionType::Int | ActionType::Playlist | ActionType::Date => {
                self.fromdate = 0;
                self.fromunits = 1;
                self.tovalue = self.fromvalue;
                self.todate = 0;
                self.tounits = 1;
            }
            ActionType::RangeInt | ActionType::RangeDate => {
                self.fromdate = 0;
                self.fromunits = 1;
                self.todate = 0;
                self.tounits = 1;
            }
            ActionType::InTheLast => {
                self.fromvalue = SPLDATE_IDENTIFIER;
                self.tovalue = SPLDATE_IDENTIFIER;
                self.tounits = 1;
            }
            ActionType::None | ActionType::String => {
                self.fromvalue = 0;
                self.fromdate = 0;
                self.fromunits = 0;
                self.tovalue = 0;
                self.todate = 0;
                self.tounits = 0;
            }
            ActionType::Invalid | ActionType::Unknown => {}
        }
    }

    /// Evaluate this rule against one track.
    pub fn eval(&self, db: &MusicDb, track: &Track) -> bool {
        let ft = self.field_type();
        if self.action_type() == ActionType::Invalid {
            return false;
        }

        match ft {
            FieldType::String => {
                let value = match self.field {
                    field::SONG_NAME => track.title.as_deref(),
                    field::ALBUM => track.album.as_deref(),
                    field::ARTIST => track.artist.as_deref(),
                    field::GENRE => track.genre.as_deref(),
                    field::KIND => track.filetype.as_deref(),
                    field::COMMENT => track.comment.as_deref(),
                    field::COMPOSER => track.composer.as_deref(),
                    field::GROUPING => track.grouping.as_deref(),
                    _ => None,
                };
                let (value, pattern) = match (value, self.string.as_deref()) {
                    (Some(v), Some(p)) => (v, p),
                    _ => return false,
                };
                match self.action {
                    action::IS_STRING => value == pattern,
                    action::IS_NOT => value != pattern,
                    action::CONTAINS => value.contains(pattern),
                    action::DOES_NOT_CONTAIN => !value.contains(pattern),
                    action::STARTS_WITH => value.starts_with(pattern),
                    action::DOES_NOT_START_WITH => !value.starts_with(pattern),
                    action::ENDS_WITH => value.ends_with(pattern),
                    action::DOES_NOT_END_WITH => !value.ends_with(pattern),
                    _ => false,
                }
            }
            FieldType::Int => {
                let value: u64 = match self.field {
                    field::BITRATE => track.bitrate as u64,
                    field::SAMPLE_RATE => track.samplerate as u64,
                    field::YEAR => track.year as u64,
                    field::TRACKNUMBER => track.track_nr as u64,
                    field::SIZE => track.size as u64,
                    field::PLAYCOUNT => track.playcount as u64,
                    field::DISC_NUMBER => track.cd_nr as u64,
                    field::BPM => track.bpm as u64,
                    field::RATING => track.rating as u64,
                    field::TIME => (track.tracklen / 1000) as u64,
                    _ => return false,
                };
                self.eval_ordered(value)
            }
            FieldType::Boolean => {
                let set = track.compilation != 0;
                match self.action {
                    action::IS_INT => set,
                    action::IS_NOT_INT => !set,
                    _ => false,
                }
            }
            FieldType::Date => {
                let value: u64 = match self.field {
                    field::DATE_MODIFIED => track.time_modified as u64,
                    field::DATE_ADDED => track.time_added as u64,
                    field::LAST_PLAYED => track.time_played as u64,
                    _ => return false,
                };
                match self.action {
                    action::IS_IN_THE_LAST | action::IS_NOT_IN_THE_LAST => {
                        // The window boundary is now − (offset × units);
                        // fromdate is negative for windows in the past.
                        let now = chrono::Utc::now().timestamp();
                        let edge = now + self.fromdate.saturating_mul(self.fromunits as i64);
                        let edge_mac = db.device.host_to_mac(edge) as u64;
                        if self.action == action::IS_IN_THE_LAST {
                            value > edge_mac
                        } else {
                            value <= edge_mac
                        }
                    }
                    _ => self.eval_ordered(value),
                }
            }
            FieldType::Playlist => {
                let playlist = match db.playlist_by_id(self.fromvalue) {
                    Some(pl) => pl,
                    None => return false,
                };
                let contained = playlist.contains(track.dbid);
                match self.action {
                    action::IS_INT => contained,
                    action::IS_NOT_INT => !contained,
                    _ => false,
                }
            }
            FieldType::Unknown => false,
        }
    }

    fn eval_ordered(&self, value: u64) -> bool {
        match self.action {
            action::IS_INT => value == self.fromvalue,
            action::IS_NOT_INT => value != self.fromvalue,
            action::IS_GREATER_THAN => value > self.fromvalue,
            action::IS_NOT_GREATER_THAN => value <= self.fromvalue,
            action::IS_LESS_THAN => value < self.fromvalue,
            action::IS_NOT_LESS_THAN => value >= self.fromvalue,
            action::IS_IN_THE_RANGE => {
                (value >= self.fromvalue.min(self.tovalue))
                    && (value <= self.fromvalue.max(self.tovalue))
            }
            action::IS_NOT_IN_THE_RANGE => {
                (value < self.fromvalue.min(self.tovalue))
                    || (value > self.fromvalue.max(self.tovalue))
            }
            _ => false,
        }
    }
}

/// Rebuild the member list of the smart playlist at `playlist_index`.
///
/// Runs the boolean pass over every live track under the rule set's
/// match operator, then applies the limit. Does nothing for ordinary
/// playlists. Live updating is up to the caller; this is the explicit
/// update entry point.
pub fn update(db: &mut MusicDb, playlist_index: usize) {
    let spl = match db.playlists.get(playlist_index).and_then(|pl| pl.smart.clone()) {
        Some(spl) => spl,
        None => return,
    };

    let mut selected: Vec<usize> = Vec::new();
    for (index, track) in db.tracks.iter().enumerate() {
        if spl.pref.matchcheckedonly && track.checked != 0 {
            continue;
        }
        let matched = if spl.pref.checkrules {
            let mut matched = spl.rules.match_operator == SPLMATCH_AND || spl.rules.rules.is_empty();
            for rule in &spl.rules.rules {
                let truth = rule.eval(db, track);
                match spl.rules.match_operator {
                    SPLMATCH_AND if !truth => {
                        matched = false;
                        break;
                    }
                    SPLMATCH_OR if truth => {
                        matched = true;
                        break;
                    }
                    _ => {}
                }
            }
            matched
        } else {
            true
        };
        if matched {
            selected.push(index);
        }
    }

    if spl.pref.checklimits {
        sort_for_limit(db, &mut selected, spl.pref.limitsort);

        let mut members = Vec::new();
        let mut running_total = 0f64;
        for &index in &selected {
            if running_total >= spl.pref.limitvalue as f64 {
                break;
            }
            let track = &db.tracks[index];
            let cost = match spl.pref.limittype {
                limit_type::MINUTES => track.tracklen as f64 / 60_000.0,
                limit_type::HOURS => track.tracklen as f64 / 3_600_000.0,
                limit_type::MB => track.size as f64 / (1024.0 * 1024.0),
                limit_type::GB => track.size as f64 / (1024.0 * 1024.0 * 1024.0),
                limit_type::SONGS => 1.0,
                other => {
                    log::warn!("unknown smart playlist limit type {other}");
                    1.0
                }
            };
            if running_total + cost <= spl.pref.limitvalue as f64 {
                running_total += cost;
                members.push(db.tracks[index].dbid);
            }
        }
        db.playlists[playlist_index].members = members;
    } else {
        db.playlists[playlist_index].members =
            selected.iter().map(|&i| db.tracks[i].dbid).collect();
    }

    log::debug!(
        "smart playlist '{}' now has {} members",
        db.playlists[playlist_index].name,
        db.playlists[playlist_index].len()
    );
}

/// Update every smart playlist in the database.
pub fn update_all(db: &mut MusicDb) {
    for index in 0..db.playlists.len() {
        update(db, index);
    }
}

/// Update the smart playlists that have the live-updating flag set.
pub fn update_live(db: &mut MusicDb) {
    for index in 0..db.playlists.len() {
        let live = db.playlists[index]
            .smart
            .as_ref()
            .map(|s| s.pref.liveupdate)
            .unwrap_or(false);
        if live {
            update(db, index);
        }
    }
}

fn sort_for_limit(db: &MusicDb, selected: &mut Vec<usize>, limitsort: u32) {
    let tracks = &db.tracks;
    let by_str = |key: fn(&Track) -> Option<&str>| {
        move |&a: &usize, &b: &usize| key(&tracks[a]).unwrap_or("").cmp(key(&tracks[b]).unwrap_or(""))
    };
    match limitsort {
        limit_sort::RANDOM => selected.shuffle(&mut rand::thread_rng()),
        limit_sort::SONG_NAME => selected.sort_by(by_str(|t| t.title.as_deref())),
        limit_sort::ALBUM => selected.sort_by(by_str(|t| t.album.as_deref())),
        limit_sort::ARTIST => selected.sort_by(by_str(|t| t.artist.as_deref())),
        limit_sort::GENRE => selected.sort_by(by_str(|t| t.genre.as_deref())),
        limit_sort::MOST_RECENTLY_ADDED => {
            selected.sort_by_key(|&i| std::cmp::Reverse(tracks[i].time_added))
        }
        limit_sort::LEAST_RECENTLY_ADDED => selected.sort_by_key(|&i| tracks[i].time_added),
        limit_sort::MOST_OFTEN_PLAYED => {
            selected.sort_by_key(|&i| std::cmp::Reverse(tracks[i].playcount))
        }
        limit_sort::LEAST_OFTEN_PLAYED => selected.sort_by_key(|&i| tracks[i].playcount),
        limit_sort::MOST_RECENTLY_PLAYED => {
            selected.sort_by_key(|&i| std::cmp::Reverse(tracks[i].time_played))
        }
        limit_sort::LEAST_RECENTLY_PLAYED => selected.sort_by_key(|&i| tracks[i].time_played),
        limit_sort::HIGHEST_RATING => {
            selected.sort_by_key(|&i| std::cmp::Reverse(tracks[i].rating))
        }
        limit_sort::LOWEST_RATING => selected.sort_by_key(|&i| tracks[i].rating),
        other => log::warn!("unknown smart playlist limit sort {other:#x}"),
    }
}

/// Convenience: a single-rule playlist definition used by callers and
/// tests.
pub fn contains_rule(field: u32, pattern: impl Into<String>) -> SplRule {
    SplRule {
        field,
        action: action::CONTAINS,
        string: Some(pattern.into()),
        ..SplRule::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceModel;
    use crate::model::playlist::Playlist;

    fn db_with_tracks() -> MusicDb {
        let mut db = MusicDb::create("/tmp/ipod", DeviceModel::Video);
        for (title, artist, playcount, rating) in [
            ("One", "Alpha", 5u32, 100u8),
            ("Two", "Alpha", 2, 40),
            ("Three", "Beta", 9, 60),
        ] {
            let mut track = Track::new();
            track.title = Some(title.into());
            track.artist = Some(artist.into());
            track.playcount = playcount;
            track.rating = rating;
            track.tracklen = 180_000;
            let dbid = db.add_track(track);
            db.mpl_mut().unwrap().add_member(dbid);
        }
        db
    }

    #[test]
    fn test_field_types() {
        let mut rule = SplRule::new();
        assert_eq!(rule.field_type(), FieldType::String);
        rule.field = field::PLAYCOUNT;
        assert_eq!(rule.field_type(), FieldType::Int);
        rule.field = field::DATE_ADDED;
        assert_eq!(rule.field_type(), FieldType::Date);
        rule.field = field::COMPILATION;
        assert_eq!(rule.field_type(), FieldType::Boolean);
        rule.field = field::PLAYLIST;
        assert_eq!(rule.field_type(), FieldType::Playlist);
    }

    #[test]
    fn test_validate_normalises_unused_slots() {
        let mut rule = SplRule {
            field: field::RATING,
            action: action::IS_GREATER_THAN,
            fromvalue: 60,
            fromdate: -3,
            fromunits: 999,
            tovalue: 7,
            todate: 5,
            tounits: 9,
            ..Default::default()
        };
        rule.validate();
        assert_eq!(rule.fromdate, 0);
        assert_eq!(rule.fromunits, 1);
        assert_eq!(rule.tovalue, 60);
        assert_eq!(rule.tounits, 1);

        let mut last = SplRule {
            field: field::LAST_PLAYED,
            action: action::IS_IN_THE_LAST,
            fromdate: -1,
            fromunits: last_unit::WEEKS,
            ..Default::default()
        };
        last.validate();
        assert_eq!(last.fromvalue, SPLDATE_IDENTIFIER);
        assert_eq!(last.tovalue, SPLDATE_IDENTIFIER);
    }

    #[test]
    fn test_string_actions() {
        let db = db_with_tracks();
        let track = &db.tracks[0];

        let mut rule = contains_rule(field::ARTIST, "Alph");
        assert!(rule.eval(&db, track));
        rule.action = action::STARTS_WITH;
        assert!(rule.eval(&db, track));
        rule.action = action::ENDS_WITH;
        assert!(!rule.eval(&db, track));
        rule.action = action::DOES_NOT_CONTAIN;
        assert!(!rule.eval(&db, track));
    }

    #[test]
    fn test_int_range() {
        let db = db_with_tracks();
        let rule = SplRule {
            field: field::PLAYCOUNT,
            action: action::IS_IN_THE_RANGE,
            fromvalue: 3,
            tovalue: 10,
            ..SplRule::new()
        };
        let matches: Vec<bool> = db.tracks.iter().map(|t| rule.eval(&db, t)).collect();
        assert_eq!(matches, vec![true, false, true]);
    }

    #[test]
    fn test_playlist_rule() {
        let mut db = db_with_tracks();
        let first = db.tracks[0].dbid;
        let mut pl = Playlist::new("Picked");
        pl.add_member(first);
        let pl_id = db.add_playlist(pl);

        let rule = SplRule {
            field: field::PLAYLIST,
            action: action::IS_INT,
            fromvalue: pl_id,
            ..SplRule::new()
        };
        assert!(rule.eval(&db, &db.tracks[0]));
        assert!(!rule.eval(&db, &db.tracks[1]));
    }

    #[test]
    fn test_update_with_and_operator_and_limit() {
        let mut db = db_with_tracks();
        let pref = SplPref {
            checkrules: true,
            checklimits: true,
            limittype: limit_type::SONGS,
            limitsort: limit_sort::MOST_OFTEN_PLAYED,
            limitvalue: 1,
            ..Default::default()
        };
        let rules = SplRules {
            match_operator: SPLMATCH_AND,
            rules: vec![contains_rule(field::ARTIST, "a")],
            ..Default::default()
        };
        let index = db.playlists.len();
        db.add_playlist(Playlist::new_smart("Often", pref, rules));

        update(&mut db, index);
        let spl = &db.playlists[index];
        assert_eq!(spl.len(), 1);
        // Highest playcount among matching tracks ("Three", playcount 9).
        let member = db.track_by_dbid(spl.members[0]).unwrap();
        assert_eq!(member.title.as_deref(), Some("Three"));
    }

    #[test]
    fn test_update_without_rules_selects_everything() {
        let mut db = db_with_tracks();
        let index = db.playlists.len();
        db.add_playlist(Playlist::new_smart(
            "All",
            SplPref {
                checkrules: true,
                ..Default::default()
            },
            SplRules::default(),
        ));
        update(&mut db, index);
        assert_eq!(db.playlists[index].len(), db.tracks.len());
    }
}
