//! Domain model: tracks, playlists, artwork, photo albums and the
//! database roots that own them

pub mod album;
pub mod artwork;
pub mod database;
pub mod playlist;
pub mod track;

pub use album::PhotoAlbum;
pub use artwork::{Artwork, DeviceThumb, PixelBuffer, Thumbnail};
pub use database::{MusicDb, PhotoDb, DB_VERSION};
pub use playlist::{Playlist, SmartPlaylist};
pub use track::Track;
