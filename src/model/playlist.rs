//! Playlists and their member references

use crate::spl::{SplPref, SplRules};
use serde::{Deserialize, Serialize};

/// Playlist type byte: 1 for the master playlist, 0 otherwise.
pub const PL_TYPE_NORM: u8 = 0;
pub const PL_TYPE_MPL: u8 = 1;

/// Podcast flag values of the playlist record.
pub const PL_FLAG_NORM: u16 = 0;
pub const PL_FLAG_PODCASTS: u16 = 1;

/// On-device sort order of a playlist.
pub mod sort_order {
    pub const MANUAL: u32 = 1;
    pub const TITLE: u32 = 3;
    pub const ALBUM: u32 = 4;
    pub const ARTIST: u32 = 5;
    pub const BITRATE: u32 = 6;
    pub const GENRE: u32 = 7;
    pub const FILETYPE: u32 = 8;
    pub const TIME_MODIFIED: u32 = 9;
    pub const TRACK_NR: u32 = 10;
    pub const SIZE: u32 = 11;
    pub const TIME: u32 = 12;
    pub const YEAR: u32 = 13;
    pub const SAMPLERATE: u32 = 14;
    pub const COMMENT: u32 = 15;
    pub const TIME_ADDED: u32 = 16;
    pub const EQUALIZER: u32 = 17;
    pub const COMPOSER: u32 = 18;
    pub const PLAYCOUNT: u32 = 20;
    pub const TIME_PLAYED: u32 = 21;
    pub const CD_NR: u32 = 22;
    pub const RATING: u32 = 23;
    pub const RELEASE_DATE: u32 = 24;
    pub const BPM: u32 = 25;
    pub const GROUPING: u32 = 26;
    pub const CATEGORY: u32 = 27;
    pub const DESCRIPTION: u32 = 28;
}

/// Smart-playlist payload: preferences plus the ordered rule list.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartPlaylist {
    pub pref: SplPref,
    pub rules: SplRules,
}

/// One playlist of the music database.
///
/// Members are non-owning references to tracks by their persistent id;
/// duplicates are allowed and order is significant. The first playlist of
/// a database must always be the master playlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    /// Type byte: [`PL_TYPE_MPL`] or [`PL_TYPE_NORM`].
    pub pl_type: u8,
    pub flag1: u8,
    pub flag2: u8,
    pub flag3: u8,
    /// Creation timestamp, device epoch.
    pub timestamp: u32,
    /// 64-bit persistent id, unique within the database.
    pub id: u64,
    pub podcastflag: u16,
    pub sortorder: u32,
    /// Ordered member references (track persistent ids).
    pub members: Vec<u64>,
    /// Present iff this is a smart playlist.
    pub smart: Option<SmartPlaylist>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Playlist {
            name: name.into(),
            pl_type: PL_TYPE_NORM,
            flag1: 0,
            flag2: 0,
            flag3: 0,
            timestamp: 0,
            id: 0,
            podcastflag: PL_FLAG_NORM,
            sortorder: sort_order::MANUAL,
            members: Vec::new(),
            smart: None,
        }
    }

    pub fn new_master(name: impl Into<String>) -> Self {
        Playlist {
            pl_type: PL_TYPE_MPL,
            ..Playlist::new(name)
        }
    }

    pub fn new_smart(name: impl Into<String>, pref: SplPref, rules: SplRules) -> Self {
        Playlist {
            smart: Some(SmartPlaylist { pref, rules }),
            ..Playlist::new(name)
        }
    }

    pub fn is_mpl(&self) -> bool {
        self.pl_type == PL_TYPE_MPL
    }

    pub fn is_podcasts(&self) -> bool {
        self.podcastflag == PL_FLAG_PODCASTS
    }

    pub fn is_smart(&self) -> bool {
        self.smart.is_some()
    }

    /// Append a member reference.
    pub fn add_member(&mut self, dbid: u64) {
        self.members.push(dbid);
    }

    /// Insert a member at `pos`, clamped to the end.
    pub fn insert_member(&mut self, pos: usize, dbid: u64) {
        let pos = pos.min(self.members.len());
        self.members.insert(pos, dbid);
    }

    /// Drop every reference to `dbid`.
    pub fn remove_member(&mut self, dbid: u64) {
        self.members.retain(|&m| m != dbid);
    }

    pub fn contains(&self, dbid: u64) -> bool {
        self.members.contains(&dbid)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_ops() {
        let mut pl = Playlist::new("Mix");
        pl.add_member(10);
        pl.add_member(20);
        pl.add_member(10);
        assert_eq!(pl.len(), 3);
        assert!(pl.contains(10));

        pl.insert_member(1, 30);
        assert_eq!(pl.members, vec![10, 30, 20, 10]);

        pl.remove_member(10);
        assert_eq!(pl.members, vec![30, 20]);
    }

    #[test]
    fn test_master_flag() {
        assert!(Playlist::new_master("iPod").is_mpl());
        assert!(!Playlist::new("Mix").is_mpl());
    }
}
