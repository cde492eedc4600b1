//! GPS tracker wire protocol.
//!
//! The tracker streams a line-oriented text log over the notify
//! characteristic: `<index> <date> <time> <lat>,<lon>` per record, framed by
//! control lines (`print`/`date` open a block, `-----end-----`/`-&` close
//! it). Commands are written to the write characteristic as plain ASCII
//! with no terminator or checksum.

use crate::domain::models::TelemetryRecord;
use crate::error::{DecodeError, ParseError};
use uuid::Uuid;

/// Service UUID advertised by the tracker (16-bit short form).
pub const SERVICE_UUID: &str = "fff0";

/// Characteristic commands are written to.
pub const WRITE_CHAR_UUID: &str = "fff2";

/// Characteristic the telemetry log is notified on.
pub const NOTIFY_CHAR_UUID: &str = "fff1";

/// Command requesting the stored telemetry block.
pub const TELEMETRY_REQUEST: &str = "#100;";

/// Tokens that open a telemetry block and reset the record buffer.
const START_TOKENS: &[&str] = &["print", "date"];

/// Tokens that close a telemetry block.
const END_TOKENS: &[&str] = &["-----end-----", "-&"];

/// Classification of one decoded protocol line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// Start marker: a new telemetry block follows.
    Start,
    /// End marker: block finished, no data carried.
    End,
    /// Anything else: candidate telemetry record.
    Data,
}

/// Classify a decoded line by its whitespace-delimited token set.
///
/// A control token anywhere among the tokens marks the whole line as
/// control; start takes precedence over end.
pub fn classify(line: &str) -> LineKind {
    let mut has_end = false;
    for token in line.split_whitespace() {
        if START_TOKENS.contains(&token) {
            return LineKind::Start;
        }
        if END_TOKENS.contains(&token) {
            has_end = true;
        }
    }
    if has_end {
        LineKind::End
    } else {
        LineKind::Data
    }
}

/// Decode a raw notification payload into text.
///
/// The transport delivers either the byte sequence itself or, on some
/// platforms, its rendering as a bracketed numeric list (`"[72,101,...]"`).
/// Both shapes are accepted; anything else is a [`DecodeError`], which the
/// caller drops with a diagnostic. Never panics.
pub fn decode_payload(raw: &[u8]) -> Result<String, DecodeError> {
    let text = std::str::from_utf8(raw).map_err(|_| DecodeError::NotText)?;

    let trimmed = text.trim();
    if let Some(list) = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
    {
        let mut bytes = Vec::new();
        for item in list.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            let value: u8 = item
                .parse()
                .map_err(|_| DecodeError::BadByteList(item.to_string()))?;
            bytes.push(value);
        }
        return String::from_utf8(bytes).map_err(|_| DecodeError::NotText);
    }

    Ok(text.to_string())
}

/// Parse a data line into a [`TelemetryRecord`].
///
/// Pure function: splits on whitespace discarding empty tokens, requires at
/// least 4 fields, and splits the 4th on `,` into at least latitude and
/// longitude. The sub-fields are taken exactly as split. Control lines are
/// expected to have been filtered out by [`classify`] already.
pub fn parse_record(line: &str) -> Result<TelemetryRecord, ParseError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(ParseError::TooFewFields { got: fields.len() });
    }

    let position = fields[3].trim();
    let mut parts = position.split(',');
    let (lat, lon) = match (parts.next(), parts.next()) {
        (Some(lat), Some(lon)) => (lat, lon),
        _ => {
            return Err(ParseError::MalformedPosition {
                field: position.to_string(),
            })
        }
    };

    Ok(TelemetryRecord {
        seq: fields[0].to_string(),
        date: fields[1].to_string(),
        time: fields[2].to_string(),
        lat: lat.to_string(),
        lon: lon.to_string(),
    })
}

/// Encode an outbound command to its wire payload: the literal UTF-8 text,
/// no framing.
pub fn encode_command(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Parse a configured UUID string, expanding 16-bit short forms (`"fff0"`)
/// onto the Bluetooth base UUID.
pub fn parse_uuid(uuid_str: &str) -> Result<Uuid, uuid::Error> {
    if uuid_str.len() == 4 {
        let expanded = format!("0000{}-0000-1000-8000-00805f9b34fb", uuid_str);
        return Uuid::parse_str(&expanded);
    }
    Uuid::parse_str(uuid_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_control_lines() {
        assert_eq!(classify("print start"), LineKind::Start);
        assert_eq!(classify("date 2024-01-01"), LineKind::Start);
        assert_eq!(classify("-----end-----"), LineKind::End);
        assert_eq!(classify("log -& done"), LineKind::End);
        assert_eq!(classify("10 2024-01-01 12:00:00 21.0285,105.8542"), LineKind::Data);
        // Control token anywhere among the tokens marks the line.
        assert_eq!(classify("3 print 4"), LineKind::Start);
    }

    #[test]
    fn control_tokens_must_match_whole_tokens() {
        assert_eq!(classify("dated 2024"), LineKind::Data);
        assert_eq!(classify("printer"), LineKind::Data);
    }

    #[test]
    fn parses_telemetry_line() {
        let record = parse_record("10 2024-01-01 12:00:00 21.0285,105.8542").unwrap();
        assert_eq!(record.seq, "10");
        assert_eq!(record.date, "2024-01-01");
        assert_eq!(record.time, "12:00:00");
        assert_eq!(record.lat, "21.0285");
        assert_eq!(record.lon, "105.8542");
    }

    #[test]
    fn keeps_split_subfields_exactly() {
        // A trailing comma still yields two sub-fields, the second empty.
        let record = parse_record("1 d t 21.0,").unwrap();
        assert_eq!(record.lat, "21.0");
        assert_eq!(record.lon, "");
    }

    #[test]
    fn rejects_short_lines() {
        match parse_record("1 2024-01-01") {
            Err(ParseError::TooFewFields { got }) => assert_eq!(got, 2),
            other => panic!("expected TooFewFields, got {:?}", other),
        }
    }

    #[test]
    fn rejects_position_without_separator() {
        assert!(matches!(
            parse_record("1 d t 21.0285"),
            Err(ParseError::MalformedPosition { .. })
        ));
    }

    #[test]
    fn collapses_repeated_whitespace() {
        let record = parse_record("  7   2024-02-02  08:30:00   10.5,-3.25  ").unwrap();
        assert_eq!(record.seq, "7");
        assert_eq!(record.lon, "-3.25");
    }

    #[test]
    fn decodes_plain_text_payload() {
        assert_eq!(decode_payload(b"print start").unwrap(), "print start");
    }

    #[test]
    fn decodes_bracketed_byte_list() {
        // "[112,114,105,110,116]" is how the platform renders b"print".
        assert_eq!(decode_payload(b"[112,114,105,110,116]").unwrap(), "print");
    }

    #[test]
    fn rejects_bad_byte_list_values() {
        assert!(matches!(
            decode_payload(b"[300,1]"),
            Err(DecodeError::BadByteList(_))
        ));
    }

    #[test]
    fn rejects_non_utf8_payload() {
        assert!(matches!(
            decode_payload(&[0xff, 0xfe, 0x80]),
            Err(DecodeError::NotText)
        ));
    }

    #[test]
    fn expands_short_uuids() {
        let uuid = parse_uuid(SERVICE_UUID).unwrap();
        assert_eq!(uuid.to_string(), "0000fff0-0000-1000-8000-00805f9b34fb");
        let full = parse_uuid("0000fff1-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(parse_uuid(NOTIFY_CHAR_UUID).unwrap(), full);
    }

    #[test]
    fn encodes_command_as_literal_ascii() {
        assert_eq!(encode_command(TELEMETRY_REQUEST), b"#100;");
    }
}
