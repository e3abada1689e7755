use crate::core::model::{Grid, GridError};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("invalid JSON format: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("DNA sequence not provided")]
    MissingDna,

    #[error(transparent)]
    Grid(#[from] GridError),
}

/// Body of a classification request: `{"dna": ["ATGC", ...]}`.
/// A missing or `null` `dna` field deserializes to `None`.
#[derive(Debug, Deserialize)]
pub struct DnaRequest {
    #[serde(default)]
    pub dna: Option<Vec<String>>,
}

/// Parse a request body into a grid. With `strict`, letters outside
/// A/C/G/T are rejected as well.
pub fn parse_request(body: &[u8], strict: bool) -> Result<Grid, RequestError> {
    let request: DnaRequest = serde_json::from_slice(body)?;
    let rows = match request.dna {
        Some(rows) if !rows.is_empty() => rows,
        _ => return Err(RequestError::MissingDna),
    };
    let grid = Grid::from_rows(&rows)?;
    if strict {
        grid.validate_alphabet()?;
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dna_rows() {
        let body = br#"{"dna": ["ATGC", "CAGT", "TTAT", "AGAA"]}"#;
        let grid = parse_request(body, true).unwrap();
        assert_eq!(grid.size(), 4);
        assert_eq!(grid.fingerprint(), "ATGCCAGTTTATAGAA");
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(matches!(
            parse_request(b"{\"dna\": [", false),
            Err(RequestError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_request(br#"{"dna": "ATGC"}"#, false),
            Err(RequestError::InvalidJson(_))
        ));
    }

    #[test]
    fn missing_or_empty_dna_is_rejected() {
        assert!(matches!(
            parse_request(b"{}", false),
            Err(RequestError::MissingDna)
        ));
        assert!(matches!(
            parse_request(br#"{"dna": []}"#, false),
            Err(RequestError::MissingDna)
        ));
        assert!(matches!(
            parse_request(br#"{"dna": null}"#, false),
            Err(RequestError::MissingDna)
        ));
    }

    #[test]
    fn shape_errors_pass_through() {
        assert!(matches!(
            parse_request(br#"{"dna": ["ATGC", "CAG"]}"#, false),
            Err(RequestError::Grid(GridError::Shape { .. }))
        ));
    }

    #[test]
    fn strict_mode_checks_letters() {
        let body = br#"{"dna": ["ATGC", "CAGH", "TTAT", "AGAA"]}"#;
        assert!(parse_request(body, false).is_ok());
        assert!(matches!(
            parse_request(body, true),
            Err(RequestError::Grid(GridError::InvalidNucleotide { letter: 'H', .. }))
        ));
    }
}
