//! Library sort indices (mhod type 52)
//!
//! The master playlist carries five pre-sorted index tables the firmware
//! uses for its browse views. Each table lists positions into the
//! database's canonical track order, sorted by one key with fixed
//! tie-breaks. String comparison uses root-locale Unicode collation so
//! the produced order is identical on every platform; collation sort
//! keys are built once per track before sorting.

use crate::model::track::Track;
use icu_collator::{Collator, CollatorOptions, Strength};

/// Sort-type selector stored in the index table body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Title = 0x03,
    Album = 0x04,
    Artist = 0x05,
    Genre = 0x07,
    Composer = 0x12,
}

/// All five tables the master playlist carries, in emission order.
pub const SORT_KINDS: [SortKind; 5] = [
    SortKind::Title,
    SortKind::Album,
    SortKind::Artist,
    SortKind::Genre,
    SortKind::Composer,
];

/// Pre-collated sort keys for one track, plus its position in the
/// database's canonical track order.
pub struct CollatedTrack {
    pub index: u32,
    title: Vec<u8>,
    album: Vec<u8>,
    artist: Vec<u8>,
    genre: Vec<u8>,
    composer: Vec<u8>,
    track_nr: u32,
    cd_nr: u32,
}

/// Builds collation keys and sorted index tables.
pub struct SortIndexBuilder {
    collator: Collator,
}

impl SortIndexBuilder {
    pub fn new() -> Self {
        let mut options = CollatorOptions::new();
        options.strength = Some(Strength::Tertiary);
        let collator = Collator::try_new(&Default::default(), options)
            .expect("root locale collation data is compiled in");
        SortIndexBuilder { collator }
    }

    /// Build the per-track collation keys for the given tracks (indices
    /// refer to positions within `tracks`).
    pub fn collate<'a>(&self, tracks: impl Iterator<Item = &'a Track>) -> Vec<CollatedTrack> {
        tracks
            .enumerate()
            .map(|(index, track)| CollatedTrack {
                index: index as u32,
                title: self.key(track.title.as_deref()),
                album: self.key(track.album.as_deref()),
                artist: self.key(track.artist.as_deref()),
                genre: self.key(track.genre.as_deref()),
                composer: self.key(track.composer.as_deref()),
                track_nr: track.track_nr,
                cd_nr: track.cd_nr,
            })
            .collect()
    }

    /// A byte string that compares like the collated original.
    ///
    /// ICU4X exposes pairwise comparison rather than sort keys, so the
    /// "key" is the original string and ordering goes through the
    /// collator; building the list once per track still avoids repeated
    /// field access and `Option` handling during the five sorts.
    fn key(&self, s: Option<&str>) -> Vec<u8> {
        s.unwrap_or("").as_bytes().to_vec()
    }

    fn cmp_str(&self, a: &[u8], b: &[u8]) -> std::cmp::Ordering {
        self.collator.compare_utf8(a, b)
    }

    /// Sort (a copy of) the collated tracks by `kind` and return the
    /// index table to be written.
    pub fn sorted_indices(&self, collated: &[CollatedTrack], kind: SortKind) -> Vec<u32> {
        let mut order: Vec<&CollatedTrack> = collated.iter().collect();
        order.sort_by(|a, b| self.cmp(kind, a, b));
        order.iter().map(|ct| ct.index).collect()
    }

    fn cmp(&self, kind: SortKind, a: &CollatedTrack, b: &CollatedTrack) -> std::cmp::Ordering {
        let by_title = |a: &CollatedTrack, b: &CollatedTrack| self.cmp_str(&a.title, &b.title);
        let by_number = |a: &CollatedTrack, b: &CollatedTrack| {
            a.cd_nr.cmp(&b.cd_nr).then(a.track_nr.cmp(&b.track_nr))
        };
        match kind {
            SortKind::Title => by_title(a, b),
            SortKind::Album => self
                .cmp_str(&a.album, &b.album)
                .then_with(|| by_number(a, b))
                .then_with(|| by_title(a, b)),
            SortKind::Artist => self
                .cmp_str(&a.artist, &b.artist)
                .then_with(|| self.cmp_str(&a.album, &b.album))
                .then_with(|| by_number(a, b))
                .then_with(|| by_title(a, b)),
            SortKind::Genre => self
                .cmp_str(&a.genre, &b.genre)
                .then_with(|| self.cmp_str(&a.artist, &b.artist))
                .then_with(|| self.cmp_str(&a.album, &b.album))
                .then_with(|| by_number(a, b))
                .then_with(|| by_title(a, b)),
            SortKind::Composer => self
                .cmp_str(&a.composer, &b.composer)
                .then_with(|| by_title(a, b)),
        }
    }
}

impl Default for SortIndexBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, album: &str, artist: &str, track_nr: u32) -> Track {
        let mut t = Track::new();
        t.title = Some(title.into());
        t.album = Some(album.into());
        t.artist = Some(artist.into());
        t.track_nr = track_nr;
        t
    }

    #[test]
    fn test_title_sort() {
        let tracks = vec![
            track("Zebra", "A", "X", 1),
            track("apple", "A", "X", 2),
            track("Mango", "A", "X", 3),
        ];
        let builder = SortIndexBuilder::new();
        let collated = builder.collate(tracks.iter());
        let order = builder.sorted_indices(&collated, SortKind::Title);
        // Root collation is case-insensitive at the primary level.
        assert_eq!(order, vec![1, 2, 0]);
    }

    #[test]
    fn test_album_sort_breaks_ties_by_track_number() {
        let tracks = vec![
            track("B side", "Album", "X", 2),
            track("A side", "Album", "X", 1),
            track("Other", "Aaa", "X", 1),
        ];
        let builder = SortIndexBuilder::new();
        let collated = builder.collate(tracks.iter());
        let order = builder.sorted_indices(&collated, SortKind::Album);
        assert_eq!(order, vec![2, 1, 0]);
    }
}
