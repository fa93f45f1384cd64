//! `iTunesDB` parser and writer passes, plus the sidecar files that
//! travel with it

pub mod parser;
pub mod playcounts;
pub mod sort;
pub mod writer;
