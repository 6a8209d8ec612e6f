//! Utility modules for xmlast.
//!
//! Contains `QName` handling and the offset to line/column table used for
//! error locations.

pub mod lines;
pub mod qname;
