use ipod_db::device::Device;
use ipod_db::itunesdb::{parser, writer};
use ipod_db::model::playlist::PL_FLAG_PODCASTS;
use ipod_db::spl::{self, SplPref, SplRules};
use ipod_db::{DeviceModel, MusicDb, Playlist, Track};
use std::fs;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Create a minimal on-disk device layout.
fn create_mountpoint() -> TempDir {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(tmp.path().join("iPod_Control/iTunes")).unwrap();
    fs::create_dir_all(tmp.path().join("iPod_Control/Music/F00")).unwrap();
    tmp
}

fn track(title: &str, artist: &str, album: &str) -> Track {
    let mut t = Track::new();
    t.title = Some(title.to_string());
    t.artist = Some(artist.to_string());
    t.album = Some(album.to_string());
    t.tracklen = 180_000;
    t.bitrate = 192;
    t.samplerate = 44100;
    t
}

/// Find the first occurrence of a byte pattern.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

#[test]
fn test_write_produces_expected_structures() {
    init_logging();
    let tmp = create_mountpoint();

    let mut db = MusicDb::create(tmp.path(), DeviceModel::Video);
    db.dbid = 0x1122334455667788;
    let mut t = track("Hello", "A", "B");
    t.ipod_path = Some(":F00:gtkpod000001.mp3".to_string());
    let dbid = db.add_track(t);
    db.mpl_mut().unwrap().add_member(dbid);
    db.write().expect("write failed");

    let bytes = fs::read(tmp.path().join("iPod_Control/iTunes/iTunesDB")).unwrap();
    assert_eq!(&bytes[0..4], b"mhbd");

    // One mhit with a UTF-16-LE title mhod saying "Hello".
    let title_utf16: Vec<u8> = "Hello".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
    assert!(find(&bytes, b"mhit").is_some());
    assert!(find(&bytes, &title_utf16).is_some());

    // One mhip under the MPL referencing track id 0x34.
    let mhip_at = find(&bytes, b"mhip").expect("no mhip written");
    let track_id = u32::from_le_bytes(bytes[mhip_at + 24..mhip_at + 28].try_into().unwrap());
    assert_eq!(track_id, 0x34);
}

#[test]
fn test_parse_back_what_was_written() -> anyhow::Result<()> {
    init_logging();
    let tmp = create_mountpoint();

    let mut db = MusicDb::create(tmp.path(), DeviceModel::Video);
    db.dbid = 0x1122334455667788;
    let mut t = track("Hello", "A", "B");
    t.ipod_path = Some(":F00:gtkpod000001.mp3".to_string());
    let dbid = db.add_track(t);
    db.mpl_mut()?.add_member(dbid);
    db.write()?;

    let reread = MusicDb::open(Device::new(tmp.path(), DeviceModel::Video))?;
    assert_eq!(reread.dbid, 0x1122334455667788);
    assert_eq!(reread.tracks.len(), 1);
    assert_eq!(reread.tracks[0].title.as_deref(), Some("Hello"));
    assert_eq!(reread.tracks[0].ipod_path.as_deref(), Some(":F00:gtkpod000001.mp3"));
    assert_eq!(reread.tracks[0].dbid, dbid);
    assert!(reread.playlists[0].is_mpl());
    assert_eq!(reread.playlists[0].members, vec![dbid]);
    Ok(())
}

fn build_rich_db() -> MusicDb {
    let mut db = MusicDb::create("/tmp/nonexistent-ipod", DeviceModel::Video);

    let titles = [
        ("Alpha", "Artist One", "Album A"),
        ("Beta", "Artist One", "Album A"),
        ("Gamma", "Artist Two", "Album B"),
        ("Delta", "Artist Three", "Album C"),
    ];
    let mut dbids = Vec::new();
    for (i, (title, artist, album)) in titles.iter().enumerate() {
        let mut t = track(title, artist, album);
        t.track_nr = i as u32 + 1;
        t.year = 2000 + i as u32;
        t.playcount = 10 - i as u32;
        t.rating = 20 * (i as u8 + 1);
        t.comment = Some(format!("comment {i}"));
        t.composer = Some("Composer".to_string());
        t.unk144 = 0x0c + i as u16;
        t.unk252 = 7;
        t.mediatype = 1;
        let dbid = db.add_track(t);
        dbids.push(dbid);
        db.mpl_mut().unwrap().add_member(dbid);
    }

    // A plain playlist with a duplicate member.
    let mut mix = Playlist::new("Mix");
    mix.add_member(dbids[2]);
    mix.add_member(dbids[0]);
    mix.add_member(dbids[2]);
    db.add_playlist(mix);

    // A podcasts playlist exercising the grouped section.
    let mut podcasts = Playlist::new("Podcasts");
    podcasts.podcastflag = PL_FLAG_PODCASTS;
    podcasts.add_member(dbids[1]);
    podcasts.add_member(dbids[3]);
    db.add_playlist(podcasts);

    // A smart playlist with one string and one int rule.
    let rules = SplRules {
        match_operator: spl::SPLMATCH_AND,
        rules: vec![
            spl::contains_rule(spl::field::ARTIST, "Artist"),
            ipod_db::SplRule {
                field: spl::field::RATING,
                action: spl::action::IS_GREATER_THAN,
                fromvalue: 40,
                ..ipod_db::SplRule::new()
            },
        ],
        ..Default::default()
    };
    let pref = SplPref {
        liveupdate: true,
        checkrules: true,
        checklimits: true,
        limittype: spl::limit_type::SONGS,
        limitsort: spl::limit_sort::LEAST_RECENTLY_PLAYED,
        limitvalue: 25,
        ..Default::default()
    };
    db.add_playlist(Playlist::new_smart("Good ones", pref, rules));

    db
}

fn assert_dbs_equal(a: &MusicDb, b: &MusicDb) {
    assert_eq!(a.dbid, b.dbid);
    assert_eq!(a.tracks.len(), b.tracks.len());
    for (x, y) in a.tracks.iter().zip(&b.tracks) {
        assert_eq!(x.dbid, y.dbid);
        assert_eq!(x.title, y.title);
        assert_eq!(x.artist, y.artist);
        assert_eq!(x.album, y.album);
        assert_eq!(x.comment, y.comment);
        assert_eq!(x.composer, y.composer);
        assert_eq!(x.track_nr, y.track_nr);
        assert_eq!(x.year, y.year);
        assert_eq!(x.playcount, y.playcount);
        assert_eq!(x.rating, y.rating);
        assert_eq!(x.tracklen, y.tracklen);
        assert_eq!(x.samplerate, y.samplerate);
        assert_eq!(x.mediatype, y.mediatype);
        assert_eq!(x.unk144, y.unk144);
        assert_eq!(x.unk252, y.unk252);
    }
    assert_eq!(a.playlists.len(), b.playlists.len());
    for (x, y) in a.playlists.iter().zip(&b.playlists) {
        assert_eq!(x.name, y.name);
        assert_eq!(x.id, y.id);
        assert_eq!(x.pl_type, y.pl_type);
        assert_eq!(x.podcastflag, y.podcastflag);
        assert_eq!(x.members, y.members, "membership of '{}'", x.name);
        assert_eq!(x.is_smart(), y.is_smart());
        if let (Some(sx), Some(sy)) = (&x.smart, &y.smart) {
            assert_eq!(sx.pref.limitsort, sy.pref.limitsort);
            assert_eq!(sx.pref.limitvalue, sy.pref.limitvalue);
            assert_eq!(sx.rules.match_operator, sy.rules.match_operator);
            assert_eq!(sx.rules.rules.len(), sy.rules.rules.len());
            for (rx, ry) in sx.rules.rules.iter().zip(&sy.rules.rules) {
                assert_eq!(rx.field, ry.field);
                assert_eq!(rx.action, ry.action);
                assert_eq!(rx.string, ry.string);
                assert_eq!(rx.fromvalue, ry.fromvalue);
                assert_eq!(rx.tovalue, ry.tovalue);
            }
        }
    }
}

#[test]
fn test_roundtrip_preserves_model() {
    init_logging();
    let mut db = build_rich_db();
    let bytes = writer::to_bytes(&mut db).unwrap();

    let device = Device::new("/tmp/nonexistent-ipod", DeviceModel::Video);
    let mut reread = parser::parse_bytes(device, &bytes, Vec::new()).unwrap();

    assert_dbs_equal(&db, &reread);

    // Second cycle is byte-stable apart from nothing at all: the model
    // carries everything the writer needs.
    let bytes2 = writer::to_bytes(&mut reread).unwrap();
    assert_eq!(bytes, bytes2);
}

#[test]
fn test_endian_invariance() {
    init_logging();
    let mut db = build_rich_db();

    let le_bytes = writer::to_bytes(&mut db).unwrap();
    db.device.set_reversed(true);
    let be_bytes = writer::to_bytes(&mut db).unwrap();
    assert_ne!(le_bytes, be_bytes);
    // The reversed file leads with the byte-swapped root tag.
    assert_eq!(&be_bytes[0..4], b"dbhm");

    let le = parser::parse_bytes(
        Device::new("/tmp/nonexistent-ipod", DeviceModel::Video),
        &le_bytes,
        Vec::new(),
    )
    .unwrap();
    let be = parser::parse_bytes(
        Device::new("/tmp/nonexistent-ipod", DeviceModel::Video),
        &be_bytes,
        Vec::new(),
    )
    .unwrap();

    assert!(!le.device.reversed());
    assert!(be.device.reversed());
    assert_dbs_equal(&le, &be);
}

#[test]
fn test_persistent_ids_unique_after_write() {
    init_logging();
    let mut db = build_rich_db();
    writer::to_bytes(&mut db).unwrap();

    let mut track_ids: Vec<u64> = db.tracks.iter().map(|t| t.dbid).collect();
    track_ids.sort_unstable();
    track_ids.dedup();
    assert_eq!(track_ids.len(), db.tracks.len());

    let mut playlist_ids: Vec<u64> = db.playlists.iter().map(|p| p.id).collect();
    playlist_ids.sort_unstable();
    playlist_ids.dedup();
    assert_eq!(playlist_ids.len(), db.playlists.len());
}

#[test]
fn test_corrupt_zero_length_hunk_is_fatal() {
    init_logging();
    let mut db = build_rich_db();
    let mut bytes = writer::to_bytes(&mut db).unwrap();

    // Zero out the first mhsd's total length.
    let mhbd_len = u32::from_le_bytes(bytes[4..8].try_into().unwrap()) as usize;
    bytes[mhbd_len + 8..mhbd_len + 12].fill(0);

    let device = Device::new("/tmp/nonexistent-ipod", DeviceModel::Video);
    let result = parser::parse_bytes(device, &bytes, Vec::new());
    assert!(result.is_err());
}

#[test]
fn test_truncated_file_reports_out_of_range() {
    init_logging();
    let mut db = build_rich_db();
    let bytes = writer::to_bytes(&mut db).unwrap();

    let device = Device::new("/tmp/nonexistent-ipod", DeviceModel::Video);
    let result = parser::parse_bytes(device, &bytes[..bytes.len() / 2], Vec::new());
    assert!(matches!(
        result,
        Err(ipod_db::Error::SeekOutOfRange { .. }) | Err(ipod_db::Error::Corrupt(_))
    ));
}
