//! Reader, editor and writer for the binary databases of click-wheel
//! portable players: the music database (`iTunesDB`), the artwork and
//! photo databases, their play-count / on-the-go sidecars, and the
//! packed-thumbnail `.ithmb` blob files.
//!
//! The on-disk format is a hierarchy of tagged, length-prefixed records
//! ("hunks") that exists in little- and big-endian variants; the codec
//! probes the orientation once per file and everything else flows
//! through it. Parsing produces an owned domain model
//! ([`model::MusicDb`] / [`model::PhotoDb`]); writing reassigns the
//! transient ids, cross-links artwork, packs thumbnails into slot files
//! and emits byte-exact structures the device firmware accepts.
//!
//! ```no_run
//! use ipod_db::{DeviceModel, MusicDb, Track};
//!
//! let mut db = MusicDb::create("/media/ipod", DeviceModel::Video);
//! let mut track = Track::new();
//! track.title = Some("Hello".into());
//! track.ipod_path = Some(":iPod_Control:Music:F00:song.mp3".into());
//! let dbid = db.add_track(track);
//! db.mpl_mut()?.add_member(dbid);
//! db.write()?;
//! # Ok::<(), ipod_db::Error>(())
//! ```

pub mod artworkdb;
pub mod device;
pub mod error;
pub mod hunk;
pub mod itunesdb;
pub mod model;
pub mod spl;
pub mod thumb;

pub use device::{ArtworkFormat, Device, DeviceModel, PixelFormat, ThumbKind};
pub use error::{Error, Result};
pub use model::{Artwork, MusicDb, PhotoAlbum, PhotoDb, Playlist, Thumbnail, Track};
pub use spl::{SplPref, SplRule, SplRules};
