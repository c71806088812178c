use crate::error::{IngestError, NormalizeError, Result};
use dtm_matrix_store::{quantize_distance, quantize_minutes, Edge, PostalCode};

pub const FROM_COLUMN: &str = "pc4_from";
pub const TO_COLUMN: &str = "pc4_to";
pub const DURATION_COLUMN: &str = "duration_s";
pub const DISTANCE_COLUMN: &str = "distance_m";

const UTF8_BOM: char = '\u{feff}';

/// `;` when the header line contains one, `,` otherwise.
pub fn detect_delimiter(header_line: &str) -> u8 {
    if header_line.contains(';') {
        b';'
    } else {
        b','
    }
}

pub(crate) fn strip_bom(line: &str) -> &str {
    line.strip_prefix(UTF8_BOM).unwrap_or(line)
}

/// One raw pairwise measurement in canonical form, with its quantized values.
#[derive(Debug, Clone, PartialEq)]
pub struct PairRecord {
    pub from: PostalCode,
    pub to: PostalCode,
    pub duration_seconds: f64,
    pub distance_meters: f64,
    pub time_minutes: u32,
    pub distance_units: u32,
}

impl PairRecord {
    /// Quantized forward edge. The reverse is [`Edge::reversed`] of this.
    pub fn to_edge(&self) -> Edge {
        Edge::new(
            self.from.clone(),
            self.to.clone(),
            self.time_minutes,
            self.distance_units,
        )
    }
}

/// Maps header names to positions so column order in the raw file does not matter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    from: usize,
    to: usize,
    duration: usize,
    distance: usize,
}

impl Normalizer {
    pub fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &'static str| -> Result<usize> {
            headers
                .iter()
                .position(|header| strip_bom(header).trim().eq_ignore_ascii_case(name))
                .ok_or(IngestError::MissingColumn(name))
        };

        Ok(Self {
            from: find(FROM_COLUMN)?,
            to: find(TO_COLUMN)?,
            duration: find(DURATION_COLUMN)?,
            distance: find(DISTANCE_COLUMN)?,
        })
    }

    pub fn normalize(
        &self,
        record: &csv::StringRecord,
    ) -> std::result::Result<PairRecord, NormalizeError> {
        let from = PostalCode::parse(field(record, self.from, FROM_COLUMN)?)?;
        let to = PostalCode::parse(field(record, self.to, TO_COLUMN)?)?;
        let (duration_seconds, time_minutes) =
            measurement(record, self.duration, DURATION_COLUMN, quantize_minutes)?;
        let (distance_meters, distance_units) =
            measurement(record, self.distance, DISTANCE_COLUMN, quantize_distance)?;

        Ok(PairRecord {
            from,
            to,
            duration_seconds,
            distance_meters,
            time_minutes,
            distance_units,
        })
    }
}

fn field<'r>(
    record: &'r csv::StringRecord,
    index: usize,
    name: &'static str,
) -> std::result::Result<&'r str, NormalizeError> {
    match record.get(index).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(NormalizeError::MissingField(name)),
    }
}

/// Parsed value and its quantized form. Values the store cannot hold are out of range.
fn measurement(
    record: &csv::StringRecord,
    index: usize,
    name: &'static str,
    quantize: fn(f64) -> Option<u32>,
) -> std::result::Result<(f64, u32), NormalizeError> {
    let raw = field(record, index, name)?;
    let value: f64 = raw.parse().map_err(|_| NormalizeError::InvalidNumber {
        field: name,
        value: raw.to_string(),
    })?;
    if !value.is_finite() || value < 0.0 {
        return Err(NormalizeError::OutOfRange { field: name, value });
    }
    let quantized = quantize(value).ok_or(NormalizeError::OutOfRange { field: name, value })?;
    Ok((value, quantized))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    fn normalizer() -> Normalizer {
        Normalizer::from_headers(&record(&["pc4_from", "pc4_to", "duration_s", "distance_m"]))
            .unwrap()
    }

    #[test]
    fn delimiter_is_detected_from_header() {
        assert_eq!(detect_delimiter("pc4_from;pc4_to;duration_s;distance_m"), b';');
        assert_eq!(detect_delimiter("pc4_from,pc4_to,duration_s,distance_m"), b',');
    }

    #[test]
    fn columns_are_resolved_by_name() {
        let normalizer = Normalizer::from_headers(&record(&[
            "distance_m",
            "\u{feff}PC4_TO",
            "extra",
            "duration_s",
            "pc4_from",
        ]))
        .unwrap();
        let pair = normalizer
            .normalize(&record(&["12500", "3011", "x", "900", "1012"]))
            .unwrap();
        assert_eq!(pair.from.as_str(), "1012");
        assert_eq!(pair.to.as_str(), "3011");
        assert_eq!(pair.duration_seconds, 900.0);
        assert_eq!(pair.distance_meters, 12_500.0);
    }

    #[test]
    fn missing_header_column_is_fatal() {
        let err = Normalizer::from_headers(&record(&["pc4_from", "pc4_to", "duration_s"]))
            .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumn("distance_m")));
    }

    #[test]
    fn codes_are_padded_and_edge_is_quantized() {
        let pair = normalizer()
            .normalize(&record(&[" 21 ", "3011", "900", "12500"]))
            .unwrap();
        assert_eq!(pair.from.as_str(), "0021");
        let edge = pair.to_edge();
        assert_eq!((edge.time_minutes, edge.distance_units), (15, 125));
    }

    #[test]
    fn malformed_rows_are_rejected() {
        let n = normalizer();
        assert_eq!(
            n.normalize(&record(&["1012", "3011", "", "12500"])),
            Err(NormalizeError::MissingField("duration_s"))
        );
        assert_eq!(
            n.normalize(&record(&["1012", "3011", "900"])),
            Err(NormalizeError::MissingField("distance_m"))
        );
        assert_eq!(
            n.normalize(&record(&["1012", "3011", "fast", "12500"])),
            Err(NormalizeError::InvalidNumber {
                field: "duration_s",
                value: "fast".to_string()
            })
        );
        assert!(matches!(
            n.normalize(&record(&["1012", "3011", "900", "-1"])),
            Err(NormalizeError::OutOfRange { field: "distance_m", .. })
        ));
        assert!(matches!(
            n.normalize(&record(&["1012", "3011", "NaN", "1"])),
            Err(NormalizeError::OutOfRange { field: "duration_s", .. })
        ));
        assert!(matches!(
            n.normalize(&record(&["1012", "3011", "1e15", "1"])),
            Err(NormalizeError::OutOfRange { field: "duration_s", .. })
        ));
        assert!(matches!(
            n.normalize(&record(&["1012", "3011", "60", "1e15"])),
            Err(NormalizeError::OutOfRange { field: "distance_m", .. })
        ));
        assert!(matches!(
            n.normalize(&record(&["10123", "3011", "900", "1"])),
            Err(NormalizeError::InvalidPostalCode(_))
        ));
    }
}
