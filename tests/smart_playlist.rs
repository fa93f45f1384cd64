use ipod_db::spl::{self, SplPref, SplRules};
use ipod_db::{DeviceModel, MusicDb, Playlist, Track};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 200 tracks, 50 of them by the Beatles with varied playcounts.
fn build_library() -> MusicDb {
    let mut db = MusicDb::create("/tmp/nonexistent-ipod", DeviceModel::Video);
    for i in 0..200u32 {
        let mut track = Track::new();
        track.title = Some(format!("Track {i}"));
        track.artist = Some(if i % 4 == 0 {
            "The Beatles".to_string()
        } else {
            format!("Artist {}", i % 7)
        });
        track.playcount = (i * 13) % 101;
        track.tracklen = 200_000;
        let dbid = db.add_track(track);
        db.mpl_mut().unwrap().add_member(dbid);
    }
    db
}

#[test]
fn test_limit_larger_than_matches_keeps_all() {
    init_logging();
    let mut db = build_library();

    let rules = SplRules {
        match_operator: spl::SPLMATCH_AND,
        rules: vec![spl::contains_rule(spl::field::ARTIST, "Beatles")],
        ..Default::default()
    };
    let pref = SplPref {
        checkrules: true,
        checklimits: true,
        limittype: spl::limit_type::SONGS,
        limitsort: spl::limit_sort::MOST_OFTEN_PLAYED,
        limitvalue: 100,
        ..Default::default()
    };
    let index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Beatles by plays", pref, rules));

    spl::update(&mut db, index);

    let members = db.playlists[index].members.clone();
    assert_eq!(members.len(), 50);

    // Every member matches, sorted by playcount descending.
    let playcounts: Vec<u32> = members
        .iter()
        .map(|&dbid| db.track_by_dbid(dbid).unwrap().playcount)
        .collect();
    assert!(playcounts.windows(2).all(|w| w[0] >= w[1]));
    for &dbid in &members {
        let track = db.track_by_dbid(dbid).unwrap();
        assert_eq!(track.artist.as_deref(), Some("The Beatles"));
    }

    // No non-member matches the rule set.
    let matching: usize = db
        .tracks
        .iter()
        .filter(|t| t.artist.as_deref() == Some("The Beatles"))
        .count();
    assert_eq!(matching, 50);
}

#[test]
fn test_limit_truncates() {
    init_logging();
    let mut db = build_library();

    let pref = SplPref {
        checkrules: false,
        checklimits: true,
        limittype: spl::limit_type::SONGS,
        limitsort: spl::limit_sort::SONG_NAME,
        limitvalue: 10,
        ..Default::default()
    };
    let index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Ten", pref, SplRules::default()));

    spl::update(&mut db, index);
    assert_eq!(db.playlists[index].len(), 10);
}

#[test]
fn test_minutes_limit() {
    init_logging();
    let mut db = build_library();

    // Each track is 200 seconds, so 10 minutes fit exactly 3 tracks.
    let pref = SplPref {
        checkrules: false,
        checklimits: true,
        limittype: spl::limit_type::MINUTES,
        limitsort: spl::limit_sort::SONG_NAME,
        limitvalue: 10,
        ..Default::default()
    };
    let index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Short mix", pref, SplRules::default()));

    spl::update(&mut db, index);
    assert_eq!(db.playlists[index].len(), 3);
}

#[test]
fn test_members_are_subset_of_tracks() {
    init_logging();
    let mut db = build_library();

    let rules = SplRules {
        match_operator: spl::SPLMATCH_OR,
        rules: vec![
            spl::contains_rule(spl::field::ARTIST, "Artist 1"),
            spl::contains_rule(spl::field::ARTIST, "Beatles"),
        ],
        ..Default::default()
    };
    let pref = SplPref {
        checkrules: true,
        ..Default::default()
    };
    let index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Or", pref, rules));

    spl::update(&mut db, index);
    assert!(!db.playlists[index].is_empty());
    for &dbid in &db.playlists[index].members {
        assert!(db.track_by_dbid(dbid).is_some());
    }
}

#[test]
fn test_matchcheckedonly_rejects_unchecked() {
    init_logging();
    let mut db = build_library();
    for track in db.tracks.iter_mut().take(100) {
        track.checked = 1;
    }

    let pref = SplPref {
        checkrules: false,
        matchcheckedonly: true,
        ..Default::default()
    };
    let index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Checked", pref, SplRules::default()));

    spl::update(&mut db, index);
    assert_eq!(db.playlists[index].len(), 100);
}

#[test]
fn test_update_live_only_touches_live_playlists() {
    init_logging();
    let mut db = build_library();

    let live = SplPref {
        checkrules: false,
        liveupdate: true,
        ..Default::default()
    };
    let frozen = SplPref {
        checkrules: false,
        liveupdate: false,
        ..Default::default()
    };
    let live_index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Live", live, SplRules::default()));
    let frozen_index = db.playlists.len();
    db.add_playlist(Playlist::new_smart("Frozen", frozen, SplRules::default()));

    spl::update_live(&mut db);
    assert_eq!(db.playlists[live_index].len(), db.tracks.len());
    assert!(db.playlists[frozen_index].is_empty());
}
