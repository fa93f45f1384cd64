//! Database roots
//!
//! The database root owns every track, playlist, photo and album below
//! it; playlist members are non-owning references resolved against the
//! root's track vector.

use crate::device::{Device, DeviceModel};
use crate::error::{Error, Result};
use crate::model::album::{PhotoAlbum, ALBUM_TYPE_LIBRARY};
use crate::model::artwork::Artwork;
use crate::model::playlist::Playlist;
use crate::model::track::Track;
use std::path::Path;

/// Format version written by this library (iTunes 7 layout).
pub const DB_VERSION: u32 = 0x13;

/// A music database (`iTunesDB`) and the device it belongs to.
#[derive(Debug)]
pub struct MusicDb {
    pub device: Device,
    /// Format version; retained from disk on parse, 0x13 on write.
    pub version: u32,
    /// 64-bit database identity.
    pub dbid: u64,
    pub tracks: Vec<Track>,
    pub playlists: Vec<Playlist>,
}

impl MusicDb {
    /// Create an empty database with a master playlist at index 0.
    pub fn create(mountpoint: impl AsRef<Path>, model: DeviceModel) -> Self {
        let mut db = MusicDb {
            device: Device::new(mountpoint.as_ref(), model),
            version: DB_VERSION,
            dbid: rand::random(),
            tracks: Vec::new(),
            playlists: Vec::new(),
        };
        let mut mpl = Playlist::new_master("iPod");
        mpl.id = db.allocate_playlist_id();
        db.playlists.push(mpl);
        db
    }

    /// Parse the `iTunesDB` found through the device's path service and
    /// merge the play-counts and on-the-go sidecars.
    pub fn open(device: Device) -> Result<Self> {
        crate::itunesdb::parser::parse(device)
    }

    /// Serialise the database back to the device. Artwork is written
    /// first (non-fatal on failure), then the `iTunesDB` itself; on
    /// success the play-counts sidecar is renamed and the on-the-go
    /// files removed.
    pub fn write(&mut self) -> Result<()> {
        crate::itunesdb::writer::write(self)
    }

    /// The master playlist. The model keeps it at index 0.
    pub fn mpl(&self) -> Result<&Playlist> {
        match self.playlists.first() {
            Some(pl) if pl.is_mpl() => Ok(pl),
            _ => Err(Error::model("master playlist must be at index 0")),
        }
    }

    pub fn mpl_mut(&mut self) -> Result<&mut Playlist> {
        match self.playlists.first_mut() {
            Some(pl) if pl.is_mpl() => Ok(pl),
            _ => Err(Error::model("master playlist must be at index 0")),
        }
    }

    pub fn podcasts_playlist(&self) -> Option<&Playlist> {
        self.playlists.iter().find(|pl| pl.is_podcasts())
    }

    pub fn playlist_by_id(&self, id: u64) -> Option<&Playlist> {
        self.playlists.iter().find(|pl| pl.id == id)
    }

    pub fn playlist_by_name(&self, name: &str) -> Option<&Playlist> {
        self.playlists.iter().find(|pl| pl.name == name)
    }

    pub fn track_by_dbid(&self, dbid: u64) -> Option<&Track> {
        self.tracks.iter().find(|t| t.dbid == dbid)
    }

    pub fn track_by_dbid_mut(&mut self, dbid: u64) -> Option<&mut Track> {
        self.tracks.iter_mut().find(|t| t.dbid == dbid)
    }

    /// A fresh persistent id, never zero and unique among the tracks.
    pub fn allocate_track_dbid(&self) -> u64 {
        loop {
            let id: u64 = rand::random();
            if id != 0 && self.track_by_dbid(id).is_none() {
                return id;
            }
        }
    }

    fn allocate_playlist_id(&self) -> u64 {
        loop {
            let id: u64 = rand::random();
            if id != 0 && self.playlist_by_id(id).is_none() {
                return id;
            }
        }
    }

    /// Add a track, allocating its persistent id on first add (a
    /// colliding preset id is reallocated). Returns the persistent id.
    /// The caller decides which playlists reference it.
    pub fn add_track(&mut self, mut track: Track) -> u64 {
        if track.dbid == 0 || self.track_by_dbid(track.dbid).is_some() {
            track.dbid = self.allocate_track_dbid();
        }
        let dbid = track.dbid;
        self.tracks.push(track);
        dbid
    }

    /// Add a playlist, allocating its persistent id on first add.
    pub fn add_playlist(&mut self, mut playlist: Playlist) -> u64 {
        if playlist.id == 0 || self.playlist_by_id(playlist.id).is_some() {
            playlist.id = self.allocate_playlist_id();
        }
        let id = playlist.id;
        self.playlists.push(playlist);
        id
    }

    /// Remove a track from the database and from every playlist that
    /// references it.
    pub fn remove_track(&mut self, dbid: u64) {
        for pl in &mut self.playlists {
            pl.remove_member(dbid);
        }
        self.tracks.retain(|t| t.dbid != dbid);
    }

    /// Remove a reference from one playlist; removal from the master
    /// playlist removes the track itself.
    pub fn remove_track_from_playlist(&mut self, playlist_index: usize, dbid: u64) {
        if playlist_index == 0 {
            self.remove_track(dbid);
        } else if let Some(pl) = self.playlists.get_mut(playlist_index) {
            pl.remove_member(dbid);
        }
    }

    /// Update every smart playlist against the current track list.
    pub fn update_smart_playlists(&mut self) {
        crate::spl::update_all(self);
    }
}

/// A photo database (`Photo Database`) and the device it belongs to.
#[derive(Debug)]
pub struct PhotoDb {
    pub device: Device,
    pub photos: Vec<Artwork>,
    pub albums: Vec<PhotoAlbum>,
}

impl PhotoDb {
    /// Create an empty photo database with its Photo Library album.
    pub fn create(mountpoint: impl AsRef<Path>, model: DeviceModel) -> Self {
        let mut library = PhotoAlbum::new("Photo Library");
        library.album_type = ALBUM_TYPE_LIBRARY;
        PhotoDb {
            device: Device::new(mountpoint.as_ref(), model),
            photos: Vec::new(),
            albums: vec![library],
        }
    }

    pub fn open(device: Device) -> Result<Self> {
        crate::artworkdb::parser::parse_photo_db(device)
    }

    pub fn write(&mut self) -> Result<()> {
        crate::artworkdb::writer::write_photo_db(self)
    }

    pub fn library_album_mut(&mut self) -> Result<&mut PhotoAlbum> {
        match self.albums.first_mut() {
            Some(album) if album.is_library() => Ok(album),
            _ => Err(Error::model("photo library album must be at index 0")),
        }
    }

    pub fn album_by_name(&self, name: &str) -> Option<&PhotoAlbum> {
        self.albums.iter().find(|a| a.name == name)
    }

    /// Add a photo and register it in the Photo Library. Returns its
    /// index into `photos`.
    pub fn add_photo(&mut self, mut photo: Artwork) -> Result<usize> {
        if photo.creation_date == 0 {
            photo.creation_date = chrono::Utc::now().timestamp();
        }
        let index = self.photos.len();
        self.photos.push(photo);
        self.library_album_mut()?.members.push(index);
        Ok(index)
    }

    pub fn add_photo_from_file(&mut self, path: impl AsRef<Path>) -> Result<usize> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path).map_err(|_| Error::NotFound(path.to_path_buf()))?;
        let mut photo = Artwork::from_file(path);
        photo.source_size = metadata.len() as u32;
        self.add_photo(photo)
    }

    pub fn add_album(&mut self, album: PhotoAlbum) -> usize {
        self.albums.push(album);
        self.albums.len() - 1
    }

    /// Remove a photo and every album reference to it, shifting the
    /// remaining member indices down.
    pub fn remove_photo(&mut self, index: usize) {
        if index >= self.photos.len() {
            return;
        }
        self.photos.remove(index);
        for album in &mut self.albums {
            album.members.retain(|&m| m != index);
            for member in &mut album.members {
                if *member > index {
                    *member -= 1;
                }
            }
        }
    }
}
