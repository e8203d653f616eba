//! Decoded views of template text.
//!
//! Each variant is a best-effort decoding of the raw input. Decoders never
//! fail: anything they do not recognize is copied through unchanged.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref DATA_URI_BASE64: Regex =
        Regex::new(r"(?i)data\s*:[^,;\s]*;\s*base64\s*,\s*([A-Za-z0-9+/]+={0,2})").unwrap();
}

/// Encoding a violation was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    /// ASCII lowercase fold
    CaseFolded,
    /// HTML character references (`&lt;`, `&#60;`, `&#x3c;`)
    HtmlEntity,
    /// Percent-encoding, decoded once
    Percent,
    /// Percent-encoding, decoded twice
    DoublePercent,
    /// JavaScript escapes (`\x3c`, `\u003c`, `\u{3c}`)
    Escape,
    /// Base64 `data:` URI payloads
    Base64,
}

impl Encoding {
    /// Order variants are tried in.
    pub const ALL: [Encoding; 6] = [
        Encoding::CaseFolded,
        Encoding::HtmlEntity,
        Encoding::Percent,
        Encoding::DoublePercent,
        Encoding::Escape,
        Encoding::Base64,
    ];

    /// Short name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::CaseFolded => "case_folded",
            Encoding::HtmlEntity => "html_entity",
            Encoding::Percent => "percent",
            Encoding::DoublePercent => "double_percent",
            Encoding::Escape => "escape",
            Encoding::Base64 => "base64",
        }
    }

    /// Decode `text` under this encoding. `None` when nothing applies.
    pub fn decode(&self, text: &str) -> Option<String> {
        match self {
            Encoding::CaseFolded => Some(text.to_ascii_lowercase()),
            Encoding::HtmlEntity => Some(decode_html_entities(text)),
            Encoding::Percent => Some(percent_decode(text)),
            Encoding::DoublePercent => Some(percent_decode(&percent_decode(text))),
            Encoding::Escape => Some(decode_js_escapes(text)),
            Encoding::Base64 => decode_data_uris(text),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Distinct decoded variants of `text`, excluding any identical to the raw
/// input or to an earlier variant.
pub fn variants(text: &str) -> Vec<(Encoding, String)> {
    let mut out: Vec<(Encoding, String)> = Vec::new();
    for encoding in Encoding::ALL {
        let Some(decoded) = encoding.decode(text) else {
            continue;
        };
        if decoded == text || out.iter().any(|(_, v)| *v == decoded) {
            continue;
        }
        out.push((encoding, decoded));
    }
    out
}

/// Decode `%XX` sequences. Invalid sequences are kept verbatim; the decoded
/// bytes are interpreted as UTF-8 lossily.
pub fn percent_decode(text: &str) -> String {
    if !text.contains('%') {
        return text.to_string();
    }
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Decode named and numeric HTML character references. Numeric references
/// are accepted without the trailing `;`, as browsers do.
pub fn decode_html_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match parse_entity(tail) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

/// Parse one entity at the start of `s` (which begins with `&`).
fn parse_entity(s: &str) -> Option<(char, usize)> {
    let body = &s[1..];
    if let Some(num) = body.strip_prefix('#') {
        let (radix, digits_start) = match num.as_bytes().first() {
            Some(b'x' | b'X') => (16, 1),
            _ => (10, 0),
        };
        let digits: String = num[digits_start..]
            .chars()
            .take_while(|c| c.is_digit(radix))
            .take(8)
            .collect();
        if digits.is_empty() {
            return None;
        }
        let ch = u32::from_str_radix(&digits, radix)
            .ok()
            .and_then(char::from_u32)?;
        let mut consumed = 2 + digits_start + digits.len();
        if s[consumed..].starts_with(';') {
            consumed += 1;
        }
        return Some((ch, consumed));
    }

    let name_len = body
        .bytes()
        .take_while(u8::is_ascii_alphanumeric)
        .take(10)
        .count();
    if name_len == 0 || !body[name_len..].starts_with(';') {
        return None;
    }
    let ch = match &body[..name_len] {
        "lt" | "LT" => '<',
        "gt" | "GT" => '>',
        "amp" | "AMP" => '&',
        "quot" | "QUOT" => '"',
        "apos" => '\'',
        "sol" => '/',
        "bsol" => '\\',
        "colon" => ':',
        "semi" => ';',
        "equals" => '=',
        "lpar" => '(',
        "rpar" => ')',
        "lcub" | "lbrace" => '{',
        "rcub" | "rbrace" => '}',
        "period" => '.',
        "grave" => '`',
        "Tab" => '\t',
        "NewLine" => '\n',
        "nbsp" => ' ',
        _ => return None,
    };
    Some((ch, 1 + name_len + 1))
}

/// Decode `\xHH`, `\uHHHH` and `\u{H..}` escapes.
pub fn decode_js_escapes(text: &str) -> String {
    if !text.contains('\\') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match parse_escape(tail) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            },
            None => {
                out.push('\\');
                rest = &tail[1..];
            },
        }
    }
    out.push_str(rest);
    out
}

fn parse_escape(s: &str) -> Option<(char, usize)> {
    let body = s.get(1..)?;
    let fixed_hex = |digits: &str| -> Option<char> {
        if digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            u32::from_str_radix(digits, 16).ok().and_then(char::from_u32)
        } else {
            None
        }
    };

    if let Some(hex) = body.strip_prefix('x') {
        let ch = fixed_hex(hex.get(..2)?)?;
        return Some((ch, 4));
    }
    if let Some(hex) = body.strip_prefix("u{") {
        let end = hex.find('}')?;
        if end == 0 || end > 6 {
            return None;
        }
        let ch = fixed_hex(&hex[..end])?;
        return Some((ch, 3 + end + 1));
    }
    if let Some(hex) = body.strip_prefix('u') {
        let ch = fixed_hex(hex.get(..4)?)?;
        return Some((ch, 6));
    }
    None
}

/// Decoded payloads of every base64 `data:` URI, newline-joined.
pub fn decode_data_uris(text: &str) -> Option<String> {
    let decoded: Vec<String> = DATA_URI_BASE64
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| STANDARD.decode(m.as_str()).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .collect();
    if decoded.is_empty() {
        None
    } else {
        Some(decoded.join("\n"))
    }
}
