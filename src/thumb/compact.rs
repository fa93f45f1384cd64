//! In-place compaction of `.ithmb` slot files
//!
//! Deleting artwork leaves holes in the slot files. Rather than
//! rewriting the files (the device rarely has room for a second copy),
//! holes are filled by moving the highest-offset slots down and the file
//! is truncated afterwards.

use crate::device::{ArtworkFormat, Device};
use crate::error::{Error, Result};
use crate::model::artwork::DeviceThumb;
use std::collections::{BTreeSet, HashMap};
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

/// Compact every `.ithmb` file referenced by `items`, and delete files
/// of the supported `formats` that no item references at all.
///
/// `items` must contain every still-referenced on-device thumbnail of
/// the database being written; their offsets are rewritten as slots
/// move.
pub fn rearrange_files(
    device: &Device,
    formats: &[&ArtworkFormat],
    items: Vec<&mut DeviceThumb>,
) -> Result<()> {
    let mut by_file: HashMap<PathBuf, Vec<&mut DeviceThumb>> = HashMap::new();
    for item in items {
        if item.size == 0 {
            continue;
        }
        let path = super::resolve_ithmb_path(device, &item.filename)?;
        by_file.entry(path).or_default().push(item);
    }

    // Files for supported formats that nothing references any more.
    for format in formats {
        for dir in ithmb_dirs(device) {
            for entry in walkdir::WalkDir::new(&dir)
                .max_depth(1)
                .into_iter()
                .flatten()
            {
                let name = entry.file_name().to_string_lossy().into_owned();
                let prefix = format!("F{}_", format.correlation_id);
                if name.starts_with(&prefix)
                    && name.ends_with(".ithmb")
                    && !by_file.contains_key(entry.path())
                {
                    log::info!("removing unreferenced {:?}", entry.path());
                    let _ = std::fs::remove_file(entry.path());
                }
            }
        }
    }

    for (path, mut slots) in by_file {
        rearrange_one(&path, &mut slots)?;
    }
    Ok(())
}

fn ithmb_dirs(device: &Device) -> Vec<PathBuf> {
    // Resolve without creating: a sweep must not conjure directories.
    let mut dirs = Vec::new();
    if let Ok(control) = device.control_dir() {
        if let Some(dir) = Device::resolve_path(&control, &["Artwork"]) {
            dirs.push(dir);
        }
    }
    if let Some(dir) = Device::resolve_path(device.mountpoint(), &["Photos", "Thumbs"]) {
        dirs.push(dir);
    }
    dirs
}

/// Compact one file. All slots must share the same size and the file
/// length must be a whole multiple of it.
fn rearrange_one(path: &PathBuf, items: &mut [&mut DeviceThumb]) -> Result<()> {
    let size = items[0].size as u64;
    if items.iter().any(|item| item.size as u64 != size) || size == 0 {
        return Err(Error::model(format!(
            "mixed thumbnail sizes inside {path:?}"
        )));
    }

    let file_len = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(_) => return Err(Error::NotFound(path.clone())),
    };
    if file_len % size != 0 {
        return Err(Error::model(format!(
            "{path:?} length {file_len} is not a multiple of the slot size {size}"
        )));
    }

    // Several records may share one slot (sparse artwork); work on the
    // distinct set of used offsets.
    let mut used: BTreeSet<u64> = items.iter().map(|item| item.offset as u64).collect();
    let slot_count = used.len() as u64;
    let new_len = slot_count * size;

    if new_len == file_len {
        return Ok(());
    }
    log::debug!(
        "compacting {:?}: {} -> {} slots",
        path,
        file_len / size,
        slot_count
    );

    if slot_count == 0 {
        let _ = std::fs::remove_file(path);
        return Ok(());
    }

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut buf = vec![0u8; size as usize];
    let mut moves: Vec<(u64, u64)> = Vec::new();

    let mut slot = 0u64;
    while slot < new_len {
        if !used.contains(&slot) {
            // Fill the hole from the current highest slot.
            let highest = *used.iter().next_back().expect("used set is non-empty");
            moves.push((highest, slot));
            used.remove(&highest);
            used.insert(slot);
        }
        slot += size;
    }

    for &(from, to) in &moves {
        file.seek(SeekFrom::Start(from))?;
        file.read_exact(&mut buf)?;
        file.seek(SeekFrom::Start(to))?;
        file.write_all(&buf)?;
        for item in items.iter_mut() {
            if item.offset as u64 == from {
                item.offset = to as u32;
            }
        }
    }

    file.set_len(new_len)?;
    Ok(())
}
