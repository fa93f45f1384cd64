use ipod_db::device::Device;
use ipod_db::model::PhotoAlbum;
use ipod_db::{Artwork, DeviceModel, PhotoDb};
use std::fs;
use tempfile::TempDir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_mountpoint() -> TempDir {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    fs::create_dir_all(tmp.path().join("iPod_Control")).unwrap();
    tmp
}

/// A tiny valid PNG (2x2, opaque) for photo sources.
fn tiny_png() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 200, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[test]
fn test_photo_db_roundtrip() {
    init_logging();
    let tmp = create_mountpoint();

    let mut db = PhotoDb::create(tmp.path(), DeviceModel::Nano);
    for _ in 0..3 {
        db.add_photo(Artwork::from_memory(tiny_png())).unwrap();
    }
    let mut trip = PhotoAlbum::new("Trip");
    trip.members = vec![0, 2];
    db.add_album(trip);

    db.write().expect("photo db write failed");
    assert!(tmp.path().join("Photos/Photo Database").exists());

    let reread = PhotoDb::open(Device::new(tmp.path(), DeviceModel::Nano)).expect("parse failed");
    assert_eq!(reread.photos.len(), 3);
    assert_eq!(reread.albums.len(), 2);
    assert_eq!(reread.albums[0].name, "Photo Library");
    assert!(reread.albums[0].is_library());
    assert_eq!(reread.albums[0].members, vec![0, 1, 2]);
    assert_eq!(reread.albums[1].name, "Trip");
    assert_eq!(reread.albums[1].members, vec![0, 2]);

    // Every photo has one packed slot per photo format of the device.
    let format_count = DeviceModel::Nano
        .artwork_formats()
        .iter()
        .filter(|f| f.kind.is_photo())
        .count();
    for photo in &reread.photos {
        let items = photo.thumbnail.as_ref().unwrap().device_items();
        assert_eq!(items.len(), format_count);
        for item in items {
            assert!(item.filename.starts_with(":Thumbs:F"));
            assert!(item.size > 0);
        }
    }
}

#[test]
fn test_thumb_files_have_slot_sizes() {
    init_logging();
    let tmp = create_mountpoint();

    let mut db = PhotoDb::create(tmp.path(), DeviceModel::Nano);
    for _ in 0..2 {
        db.add_photo(Artwork::from_memory(tiny_png())).unwrap();
    }
    db.write().expect("photo db write failed");

    for format in DeviceModel::Nano.artwork_formats().iter().filter(|f| f.kind.is_photo()) {
        let file = tmp
            .path()
            .join("Photos/Thumbs")
            .join(format!("F{}_0.ithmb", format.correlation_id));
        let len = fs::metadata(&file).expect("missing ithmb file").len();
        assert_eq!(len, 2 * format.slot_size() as u64, "{file:?}");
    }
}

#[test]
fn test_photo_removal_then_rewrite_compacts() {
    init_logging();
    let tmp = create_mountpoint();

    let mut db = PhotoDb::create(tmp.path(), DeviceModel::Nano);
    for _ in 0..4 {
        db.add_photo(Artwork::from_memory(tiny_png())).unwrap();
    }
    db.write().expect("first write failed");

    // Capture one surviving photo's slot bytes before compaction.
    let format = DeviceModel::Nano
        .artwork_formats()
        .iter()
        .find(|f| f.kind.is_photo())
        .unwrap();
    let file = tmp
        .path()
        .join("Photos/Thumbs")
        .join(format!("F{}_0.ithmb", format.correlation_id));
    let before = fs::read(&file).unwrap();
    let survivor_item = db.photos[3].device_item(format.correlation_id).unwrap().clone();
    let slot = survivor_item.offset as usize..(survivor_item.offset + survivor_item.size) as usize;
    let survivor_bytes = before[slot].to_vec();

    db.remove_photo(1);
    db.remove_photo(1); // originally index 2
    db.write().expect("second write failed");

    let after = fs::read(&file).unwrap();
    assert_eq!(after.len(), 2 * format.slot_size() as usize);

    // The survivor's slot still holds exactly its original bytes.
    let item = db.photos[1].device_item(format.correlation_id).unwrap();
    let moved = &after[item.offset as usize..(item.offset + item.size) as usize];
    assert_eq!(moved, &survivor_bytes[..]);
}

#[test]
fn test_missing_photo_db_is_not_found() {
    init_logging();
    let tmp = create_mountpoint();
    let result = PhotoDb::open(Device::new(tmp.path(), DeviceModel::Nano));
    assert!(matches!(result, Err(ipod_db::Error::NotFound(_))));
}
