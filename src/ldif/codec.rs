//! LDIF record encoding
//!
//! Renders finished [`ContentRecord`]s into LDIF text (RFC 2849). The codec is
//! a pure renderer: attribute lines are written in the order the record holds
//! them.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::directory::Value;
use crate::error::CodecError;

use super::record::ContentRecord;

/// Default maximum line length, as recommended by RFC 2849.
pub const DEFAULT_LINE_WIDTH: usize = 76;

/// How attribute values are written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueEncoding {
    /// Plain text where safe, base64 otherwise
    #[default]
    Plain,
    /// Base64 for every attribute value
    ForceEncoded,
}

/// Line terminator of the output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineSeparator {
    #[default]
    Lf,
    CrLf,
}

/// Formatting options for LDIF output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatParams {
    /// Maximum line length before folding; 0 disables folding
    pub line_width: usize,
    pub value_encoding: ValueEncoding,
    pub line_separator: LineSeparator,
    /// Write `name: value` rather than `name:value`
    pub space_after_colon: bool,
}

/// Encoder turning content records into LDIF text.
#[derive(Debug, Clone, Default)]
pub struct LdifCodec {
    params: FormatParams,
}

impl Default for FormatParams {
    fn default() -> Self {
        Self {
            line_width: DEFAULT_LINE_WIDTH,
            value_encoding: ValueEncoding::Plain,
            line_separator: LineSeparator::Lf,
            space_after_colon: true,
        }
    }
}

impl LineSeparator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineSeparator::Lf => "\n",
            LineSeparator::CrLf => "\r\n",
        }
    }
}

impl LdifCodec {
    pub fn new(params: FormatParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &FormatParams {
        &self.params
    }

    /// Encode one finished record: the dn line, the attribute lines and a
    /// blank separator line, each folded to the configured width.
    pub fn encode(&self, record: &ContentRecord) -> Result<String, CodecError> {
        if !record.is_finished() {
            return Err(CodecError::RecordNotFinished);
        }

        let sep = self.params.line_separator.as_str();
        let mut out = String::new();

        let dn = record.dn_line().dn();
        let dn_text = if is_safe_string(dn) {
            format!("dn:{}{dn}", self.space())
        } else {
            format!("dn::{}{}", self.space(), STANDARD.encode(dn))
        };
        self.push_line(&mut out, &dn_text);

        for line in record.attr_vals() {
            self.push_line(&mut out, &attr_val_text(line.name(), line.value(), &self.params));
        }

        out.push_str(sep);
        Ok(out)
    }

    /// The `version: 1` header, followed by a blank line.
    pub fn version_header(&self) -> String {
        let sep = self.params.line_separator.as_str();
        format!("version:{}1{sep}{sep}", self.space())
    }

    fn space(&self) -> &'static str {
        if self.params.space_after_colon { " " } else { "" }
    }

    fn push_line(&self, out: &mut String, line: &str) {
        let sep = self.params.line_separator.as_str();
        out.push_str(&fold(line, self.params.line_width, sep));
        out.push_str(sep);
    }
}

/// Render one attribute line without folding.
pub fn attr_val_text(name: &str, value: &Value, params: &FormatParams) -> String {
    let space = if params.space_after_colon { " " } else { "" };
    match value {
        Value::Text(text)
            if params.value_encoding == ValueEncoding::Plain && is_safe_string(text) =>
        {
            format!("{name}:{space}{text}")
        }
        other => format!("{name}::{space}{}", STANDARD.encode(other.as_bytes())),
    }
}

/// Whether a text value may be written as-is.
///
/// Values starting with a space, `:` or `<`, ending with a space, or
/// containing anything outside printable ASCII need base64.
pub fn is_safe_string(value: &str) -> bool {
    let bytes = value.as_bytes();
    match bytes.first() {
        None => return true,
        Some(b' ' | b':' | b'<') => return false,
        Some(_) => {}
    }
    if bytes.last() == Some(&b' ') {
        return false;
    }
    bytes.iter().all(|b| (0x20..=0x7e).contains(b))
}

/// Fold a logical line so that no physical line exceeds `width` characters.
///
/// Continuation lines start with a single space, which counts towards the
/// width. A width below 2 disables folding.
pub fn fold(line: &str, width: usize, separator: &str) -> String {
    if width < 2 || line.chars().count() <= width {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / width * 3);
    let mut column = 0;
    for c in line.chars() {
        if column == width {
            out.push_str(separator);
            out.push(' ');
            column = 1;
        }
        out.push(c);
        column += 1;
    }
    out
}

/// Undo [`fold`]: join every continuation line onto its predecessor.
pub fn unfold(text: &str) -> String {
    text.replace("\r\n ", "").replace("\n ", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ldif::{AttrValLine, DnLine, SepLine};

    fn finished(dn: &str, lines: Vec<AttrValLine>) -> ContentRecord {
        let mut record = ContentRecord::new(DnLine::new(dn));
        for line in lines {
            record.add_attr_val(line).unwrap();
        }
        record.finish(SepLine).unwrap();
        record
    }

    #[test]
    fn test_encode_basic_record() {
        let record = finished(
            "cn=John,dc=example",
            vec![
                AttrValLine::text("objectClass", "person"),
                AttrValLine::text("cn", "John"),
            ],
        );
        let text = LdifCodec::default().encode(&record).unwrap();
        assert_eq!(text, "dn: cn=John,dc=example\nobjectClass: person\ncn: John\n\n");
    }

    #[test]
    fn test_unfinished_record_is_rejected() {
        let record = ContentRecord::new(DnLine::new("cn=a"));
        assert_eq!(
            LdifCodec::default().encode(&record),
            Err(CodecError::RecordNotFinished)
        );
    }

    #[test]
    fn test_binary_always_encoded() {
        let record = finished("cn=a", vec![AttrValLine::binary("userCertificate", b"hello")]);
        let text = LdifCodec::default().encode(&record).unwrap();
        assert!(text.contains("userCertificate:: aGVsbG8=\n"));
    }

    #[test]
    fn test_unsafe_text_encoded() {
        for (value, expected) in [
            (" lead", "d:: IGxlYWQ="),
            (":colon", "d:: OmNvbG9u"),
            ("<url", "d:: PHVybA=="),
            ("trail ", "d:: dHJhaWwg"),
            ("a\0b", "d:: YQBi"),
            ("line\nbreak", "d:: bGluZQpicmVhaw=="),
            ("Müller", "d:: TcO8bGxlcg=="),
            ("plain text", "d: plain text"),
            ("", "d: "),
        ] {
            assert_eq!(
                attr_val_text("d", &Value::Text(value.to_string()), &FormatParams::default()),
                expected,
                "value {value:?}"
            );
        }
    }

    #[test]
    fn test_force_encoded_and_no_space() {
        let params = FormatParams {
            value_encoding: ValueEncoding::ForceEncoded,
            space_after_colon: false,
            ..FormatParams::default()
        };
        let record = finished("cn=a", vec![AttrValLine::text("cn", "a")]);
        let text = LdifCodec::new(params).encode(&record).unwrap();
        assert_eq!(text, "dn:cn=a\ncn::YQ==\n\n");
    }

    #[test]
    fn test_dn_requiring_encoding() {
        let record = finished("cn=Jürgen,dc=example", vec![]);
        let text = LdifCodec::default().encode(&record).unwrap();
        assert_eq!(text, "dn:: Y249SsO8cmdlbixkYz1leGFtcGxl\n\n");
    }

    #[test]
    fn test_fold_widths() {
        let line = "description: ".to_string() + &"x".repeat(200);
        let folded = fold(&line, 76, "\n");
        let physical: Vec<&str> = folded.split('\n').collect();
        assert_eq!(physical[0].len(), 76);
        assert!(physical.iter().all(|l| l.len() <= 76));
        assert!(physical[1..].iter().all(|l| l.starts_with(' ')));
        assert_eq!(unfold(&folded), line);
    }

    #[test]
    fn test_fold_round_trip_many_widths() {
        let line: String = (0..500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for width in [2, 3, 10, 76, 499, 500, 501] {
            for sep in ["\n", "\r\n"] {
                assert_eq!(unfold(&fold(&line, width, sep)), line, "width {width}");
            }
        }
    }

    #[test]
    fn test_fold_disabled() {
        let line = "x".repeat(300);
        assert_eq!(fold(&line, 0, "\n"), line);
    }

    #[test]
    fn test_encoded_record_folds_with_crlf() {
        let params = FormatParams {
            line_width: 20,
            line_separator: LineSeparator::CrLf,
            ..FormatParams::default()
        };
        let record = finished("cn=a", vec![AttrValLine::text("description", &"y".repeat(30))]);
        let text = LdifCodec::new(params).encode(&record).unwrap();
        assert_eq!(
            text,
            "dn: cn=a\r\ndescription: yyyyyyy\r\n yyyyyyyyyyyyyyyyyyy\r\n yyyy\r\n\r\n"
        );
    }

    #[test]
    fn test_version_header() {
        assert_eq!(LdifCodec::default().version_header(), "version: 1\n\n");
    }
}
