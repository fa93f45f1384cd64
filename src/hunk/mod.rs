//! Endian-aware codec for the tagged, length-prefixed hunk stream
//!
//! Every record ("hunk") in the database files is framed the same way: a
//! four-character tag, a 32-bit header length and a 32-bit total length,
//! followed by header fields and then child hunks or payload. Scalar
//! integers are little-endian by convention; databases produced by
//! byte-order-reversed firmware store every integer and tag reversed, and
//! a single flag, probed once from the root tag, selects the orientation
//! for all reads and writes.

mod reader;
mod writer;

pub use reader::Reader;
pub use writer::Writer;

/// Four-character hunk tag.
pub type Tag = &'static [u8; 4];

pub const MHBD: Tag = b"mhbd";
pub const MHSD: Tag = b"mhsd";
pub const MHLT: Tag = b"mhlt";
pub const MHIT: Tag = b"mhit";
pub const MHOD: Tag = b"mhod";
pub const MHLP: Tag = b"mhlp";
pub const MHYP: Tag = b"mhyp";
pub const MHIP: Tag = b"mhip";
pub const SLST: Tag = b"SLst";
pub const MHDP: Tag = b"mhdp";
pub const MHPO: Tag = b"mhpo";

pub const MHFD: Tag = b"mhfd";
pub const MHLI: Tag = b"mhli";
pub const MHII: Tag = b"mhii";
pub const MHNI: Tag = b"mhni";
pub const MHLA: Tag = b"mhla";
pub const MHBA: Tag = b"mhba";
pub const MHIA: Tag = b"mhia";
pub const MHLF: Tag = b"mhlf";
pub const MHIF: Tag = b"mhif";

/// Padded header length for the photo-database hunk types.
///
/// These headers are zero-filled up to the padded size even though the
/// meaningful fields end earlier.
pub fn padded_header_len(tag: Tag) -> Option<u32> {
    match tag {
        t if t == MHNI => Some(0x4c),
        t if t == MHII => Some(0x98),
        t if t == MHSD => Some(0x60),
        t if t == MHFD => Some(0x84),
        t if t == MHLI || t == MHLA || t == MHLF => Some(0x5c),
        t if t == MHIF => Some(0x7c),
        t if t == MHBA => Some(0x94),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_lengths() {
        assert_eq!(padded_header_len(MHNI), Some(0x4c));
        assert_eq!(padded_header_len(MHBA), Some(0x94));
        assert_eq!(padded_header_len(MHIT), None);
    }

    #[test]
    fn test_roundtrip_le() {
        let mut w = Writer::new(false);
        w.put_tag(MHBD);
        w.put_u32(0x1234_5678);
        w.put_u64(0x1122_3344_5566_7788);
        w.put_u16(0xabcd);
        w.put_f32(44100.0);

        let buf = w.into_bytes();
        let r = Reader::new(&buf, false);
        assert!(r.has_tag(0, MHBD).unwrap());
        assert_eq!(r.read_u32(4).unwrap(), 0x1234_5678);
        assert_eq!(r.read_u64(8).unwrap(), 0x1122_3344_5566_7788);
        assert_eq!(r.read_u16(16).unwrap(), 0xabcd);
        assert_eq!(r.read_f32(18).unwrap(), 44100.0);
    }

    #[test]
    fn test_roundtrip_reversed() {
        let mut w = Writer::new(true);
        w.put_tag(MHBD);
        w.put_u32(0x1234_5678);

        let buf = w.into_bytes();
        // On disk the tag appears byte-reversed and the integer big-endian.
        assert_eq!(&buf[0..4], b"dbhm");
        assert_eq!(&buf[4..8], &[0x12, 0x34, 0x56, 0x78]);

        let r = Reader::new(&buf, true);
        assert!(r.has_tag(0, MHBD).unwrap());
        assert_eq!(r.read_u32(4).unwrap(), 0x1234_5678);
    }

    #[test]
    fn test_swapped_writes_oppose_the_flag() {
        let mut w = Writer::new(false);
        w.put_u32_swapped(1);
        let buf = w.into_bytes();
        assert_eq!(&buf[..], &[0, 0, 0, 1]);

        let r = Reader::new(&buf, false);
        assert_eq!(r.read_u32_swapped(0).unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_read() {
        let r = Reader::new(&[0u8; 4], false);
        assert!(r.read_u32(1).is_err());
        assert!(r.read_u32(0).is_ok());
    }
}
