//! Photo albums

use serde::{Deserialize, Serialize};

/// Album type byte: 1 for the Photo Library, 2 for user albums.
pub const ALBUM_TYPE_LIBRARY: u8 = 1;
pub const ALBUM_TYPE_NORMAL: u8 = 2;

/// One album of the photo database.
///
/// Members are indices into the database's photo list; duplicates are
/// allowed and order is significant. The first album is always the Photo
/// Library and contains every photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoAlbum {
    pub name: String,
    pub album_type: u8,
    /// Ordered member references (indices into `PhotoDb::photos`).
    pub members: Vec<usize>,

    // Slideshow preferences.
    pub playmusic: u8,
    pub repeat: u8,
    pub random: u8,
    pub show_titles: u8,
    pub transition_direction: u8,
    pub slide_duration: u32,
    pub transition_duration: u32,
    /// Persistent id of the backing audio track, if any.
    pub song_id: u64,

    /// Assigned at write time: 0x64 + photo count + album index.
    pub album_id: u32,
    pub prev_album_id: u32,

    pub unk024: u32,
    pub unk028: u16,
    pub unk044: u32,
    pub unk048: u32,
}

impl PhotoAlbum {
    pub fn new(name: impl Into<String>) -> Self {
        PhotoAlbum {
            name: name.into(),
            album_type: ALBUM_TYPE_NORMAL,
            members: Vec::new(),
            playmusic: 0,
            repeat: 0,
            random: 0,
            show_titles: 0,
            transition_direction: 0,
            slide_duration: 3,
            transition_duration: 0,
            song_id: 0,
            album_id: 0,
            prev_album_id: 0,
            unk024: 0,
            unk028: 0,
            unk044: 0,
            unk048: 0,
        }
    }

    pub fn is_library(&self) -> bool {
        self.album_type == ALBUM_TYPE_LIBRARY
    }
}
