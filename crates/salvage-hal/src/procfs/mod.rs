//! Parsers for procfs text files.

pub mod mountinfo;
