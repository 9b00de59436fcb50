use crate::core::currency::CurrencyCode;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Nested wire structure for bulk rate transfer: ISO-8601 date string →
/// `"<FROM>_TO_<TO>"` pair key → rate.
pub type RateSheet = BTreeMap<String, BTreeMap<String, f64>>;

/// Separator between the two currency codes in a pair key.
pub const PAIR_SEPARATOR: &str = "_TO_";

/// Build the wire key for a directional currency pair.
pub fn pair_key(from: &CurrencyCode, to: &CurrencyCode) -> String {
    format!("{from}{PAIR_SEPARATOR}{to}")
}

/// Split a wire pair key back into its two halves, if well-formed.
pub fn split_pair_key(key: &str) -> Option<(&str, &str)> {
    key.split_once(PAIR_SEPARATOR)
}

/// Raised when a format tag does not name a supported wire format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported rate format: {tag:?} (expected json, yaml or binary)")]
pub struct UnsupportedFormat {
    pub tag: String,
}

/// Supported wire formats for rate sheets.
///
/// `Binary` is the native machine format. It is compact and exact but not
/// meant for untrusted input: a hostile payload can declare absurd lengths
/// and exhaust memory during deserialization. Imports of this format log a
/// warning at call time; prefer `Json` or `Yaml` for data that crosses a
/// trust boundary.
///
/// # Examples
///
/// ```
/// use dated_money::exchange::codec::Format;
///
/// assert_eq!("yaml".parse::<Format>().unwrap(), Format::Yaml);
/// assert!("xml".parse::<Format>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
    Binary,
}

impl Format {
    pub const ALL: [Format; 3] = [Format::Json, Format::Yaml, Format::Binary];

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Binary => "binary",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Format {
    type Err = UnsupportedFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            "binary" => Ok(Self::Binary),
            _ => Err(UnsupportedFormat { tag: s.to_string() }),
        }
    }
}

/// Failure while encoding or decoding a rate sheet.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid JSON rate payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid YAML rate payload: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid binary rate payload: {0}")]
    Binary(#[from] bincode::Error),
}

/// Serialize a rate sheet in the given format.
pub fn encode(format: Format, sheet: &RateSheet) -> Result<Vec<u8>, CodecError> {
    match format {
        Format::Json => Ok(serde_json::to_vec(sheet)?),
        Format::Yaml => Ok(serde_yaml::to_string(sheet)?.into_bytes()),
        Format::Binary => Ok(bincode::serialize(sheet)?),
    }
}

/// Deserialize a rate sheet from the given format.
pub fn decode(format: Format, payload: &[u8]) -> Result<RateSheet, CodecError> {
    match format {
        Format::Json => Ok(serde_json::from_slice(payload)?),
        Format::Yaml => Ok(serde_yaml::from_slice(payload)?),
        Format::Binary => Ok(bincode::deserialize(payload)?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sheet() -> RateSheet {
        let mut pairs = BTreeMap::new();
        pairs.insert("USD_TO_EUR".to_string(), 1.33);
        pairs.insert("EUR_TO_USD".to_string(), 0.75);
        let mut later = BTreeMap::new();
        later.insert("USD_TO_EUR".to_string(), 1.41);
        let mut sheet = RateSheet::new();
        sheet.insert("2024-01-01".to_string(), pairs);
        sheet.insert("2024-01-02".to_string(), later);
        sheet
    }

    #[test]
    fn test_round_trip_every_format() {
        let sheet = sample_sheet();
        for format in Format::ALL {
            let bytes = encode(format, &sheet).unwrap();
            let back = decode(format, &bytes).unwrap();
            assert_eq!(back, sheet, "round trip failed for {format}");
        }
    }

    #[test]
    fn test_round_trip_empty_sheet() {
        let sheet = RateSheet::new();
        for format in Format::ALL {
            let bytes = encode(format, &sheet).unwrap();
            let back = decode(format, &bytes).unwrap();
            assert!(back.is_empty(), "empty round trip failed for {format}");
        }
    }

    #[test]
    fn test_json_wire_shape() {
        let bytes = encode(Format::Json, &sample_sheet()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"2024-01-01\""));
        assert!(text.contains("\"USD_TO_EUR\":1.33"));
    }

    #[test]
    fn test_decode_garbage_fails() {
        for format in Format::ALL {
            assert!(decode(format, b"\xff\xfe{{{nonsense").is_err());
        }
    }

    #[test]
    fn test_format_tag_parsing() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("YAML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("yml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("binary".parse::<Format>().unwrap(), Format::Binary);
        let err = "csv".parse::<Format>().unwrap_err();
        assert_eq!(err.tag, "csv");
    }

    #[test]
    fn test_pair_key_round_trip() {
        let usd = CurrencyCode::parse("USD").unwrap();
        let eur = CurrencyCode::parse("EUR").unwrap();
        let key = pair_key(&usd, &eur);
        assert_eq!(key, "USD_TO_EUR");
        assert_eq!(split_pair_key(&key), Some(("USD", "EUR")));
        assert_eq!(split_pair_key("USDEUR"), None);
    }
}
