//! LDIF record model and encoder
//!
//! - [`ContentRecord`]: one entry as dn line, attribute lines and separator
//! - [`LdifCodec`]: renders finished records with folding and base64
//! - [`FormatParams`]: line width, value encoding, line separator

pub mod codec;
pub mod record;

pub use codec::{
    DEFAULT_LINE_WIDTH, FormatParams, LdifCodec, LineSeparator, ValueEncoding, fold, unfold,
};
pub use record::{AttrValLine, ContentRecord, DnLine, SepLine};
