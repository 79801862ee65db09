//! Artifact identifier grammar
//!
//! Derived artifacts are named `{formula}_{variable}_{scenario}_{model}_{year}_{dataset}.tif`.
//! Raw sources are named by their URI and never go through this grammar.
//!
//! Parsing (`decode`) only checks the shape of a key. Checking each field against
//! its closed enumeration is a separate step (`validate`) so that the resolver
//! can expand keys it generated itself without paying for validation twice.

pub mod catalog;

use std::fmt;
use std::ops::RangeInclusive;

use crate::error::{KeyError, KeyField};
use catalog::{
    DATASETS, END_YEAR, ENSEMBLE, FILE_EXTENSION, NEXGDDP, SCENARIOS, START_YEAR, VARIABLES,
};

pub use catalog::is_source_uri;

/// Single year or inclusive `start-end` range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum YearSpan {
    Single(u16),
    Range(u16, u16),
}

impl YearSpan {
    /// Parse `2000` or `1970-2000`; each year must be four digits
    pub fn parse(value: &str) -> Option<Self> {
        fn year(part: &str) -> Option<u16> {
            if part.len() == 4 && part.bytes().all(|b| b.is_ascii_digit()) {
                part.parse().ok()
            } else {
                None
            }
        }

        match value.split_once('-') {
            Some((start, end)) => Some(YearSpan::Range(year(start)?, year(end)?)),
            None => Some(YearSpan::Single(year(value)?)),
        }
    }

    pub fn start(&self) -> u16 {
        match *self {
            YearSpan::Single(year) => year,
            YearSpan::Range(start, _) => start,
        }
    }

    pub fn end(&self) -> u16 {
        match *self {
            YearSpan::Single(year) => year,
            YearSpan::Range(_, end) => end,
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self, YearSpan::Range(..))
    }

    pub fn years(&self) -> RangeInclusive<u16> {
        self.start()..=self.end()
    }
}

impl fmt::Display for YearSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            YearSpan::Single(year) => write!(f, "{}", year),
            YearSpan::Range(start, end) => write!(f, "{}-{}", start, end),
        }
    }
}

/// Decoded fields of a derived-artifact key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fields {
    pub formula: String,
    pub variable: String,
    pub scenario: String,
    /// Concrete model name or the ensemble marker
    pub model: String,
    pub year: YearSpan,
    pub dataset: String,
}

impl Fields {
    pub fn new(
        formula: impl Into<String>,
        variable: impl Into<String>,
        scenario: impl Into<String>,
        model: impl Into<String>,
        year: YearSpan,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            formula: formula.into(),
            variable: variable.into(),
            scenario: scenario.into(),
            model: model.into(),
            year,
            dataset: dataset.into(),
        }
    }

    pub fn is_ensemble(&self) -> bool {
        self.model == ENSEMBLE
    }

    /// Same parameters under another formula name
    pub fn with_formula(&self, formula: &str) -> Self {
        Self {
            formula: formula.to_string(),
            ..self.clone()
        }
    }
}

impl fmt::Display for Fields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}_{}_{}_{}_{}_{}.{}",
            self.formula,
            self.variable,
            self.scenario,
            self.model,
            self.year,
            self.dataset,
            FILE_EXTENSION
        )
    }
}

/// Canonical key for a set of fields (always six fields plus extension)
pub fn encode(fields: &Fields) -> String {
    fields.to_string()
}

/// Split a key into its fields
///
/// Accepts the canonical six-field form and the older five-field form that
/// predates the dataset field (which then defaults to NEX-GDDP).
pub fn decode(key: &str) -> Result<Fields, KeyError> {
    let stem = match key.rsplit_once('.') {
        Some((stem, ext)) if ext == FILE_EXTENSION => stem,
        Some((_, ext)) => {
            return Err(KeyError::malformed(
                key,
                format!("extension .{} must be .{}", ext, FILE_EXTENSION),
            ))
        }
        None => {
            return Err(KeyError::malformed(
                key,
                format!("missing .{} extension", FILE_EXTENSION),
            ))
        }
    };

    let parts: Vec<&str> = stem.split('_').collect();
    let (formula, variable, scenario, model, year, dataset) = match parts.as_slice() {
        [f, v, s, m, y, d] => (*f, *v, *s, *m, *y, *d),
        [f, v, s, m, y] => (*f, *v, *s, *m, *y, NEXGDDP),
        _ => {
            return Err(KeyError::malformed(
                key,
                "must be of format {function}_{variable}_{scenario}_{model}_{year}_{dataset}.tif",
            ))
        }
    };

    if parts.iter().any(|part| part.is_empty()) {
        return Err(KeyError::malformed(key, "fields must not be empty"));
    }

    let year = YearSpan::parse(year)
        .ok_or_else(|| KeyError::malformed(key, format!("year {} is not YYYY or YYYY-YYYY", year)))?;

    Ok(Fields::new(formula, variable, scenario, model, year, dataset))
}

/// Check every field against its closed enumeration
///
/// `formulas` is the set of registered formula names. Fails on the first
/// offending field, naming the legal values for it.
pub fn validate(fields: Fields, formulas: &[&str]) -> Result<Fields, KeyError> {
    let key = fields.to_string();
    let invalid = |field: KeyField, value: &str, allowed: String| KeyError::Invalid {
        key: key.clone(),
        field,
        value: value.to_string(),
        allowed,
    };

    if !formulas.contains(&fields.formula.as_str()) {
        return Err(invalid(KeyField::Formula, &fields.formula, formulas.join(",")));
    }
    if !VARIABLES.contains(&fields.variable.as_str()) {
        return Err(invalid(KeyField::Variable, &fields.variable, VARIABLES.join(",")));
    }
    if !SCENARIOS.contains(&fields.scenario.as_str()) {
        return Err(invalid(KeyField::Scenario, &fields.scenario, SCENARIOS.join(",")));
    }
    let roster = catalog::models(&fields.dataset)
        .ok_or_else(|| invalid(KeyField::Dataset, &fields.dataset, DATASETS.join(",")))?;
    if !(fields.is_ensemble() || roster.contains(&fields.model.as_str())) {
        return Err(invalid(
            KeyField::Model,
            &fields.model,
            format!("{},{}", roster.join(","), ENSEMBLE),
        ));
    }

    let in_bounds = |year: u16| (START_YEAR..=END_YEAR).contains(&year);
    if !(in_bounds(fields.year.start()) && in_bounds(fields.year.end()))
        || fields.year.start() > fields.year.end()
    {
        return Err(invalid(
            KeyField::Year,
            &fields.year.to_string(),
            format!("years between {},{}", START_YEAR, END_YEAR),
        ));
    }

    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FORMULAS: &[&str] = &["annual", "abs-annual", "mean-abs-annual"];

    fn fields(formula: &str, model: &str, year: YearSpan) -> Fields {
        Fields::new(formula, "pr", "rcp85", model, year, "nexgddp")
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let cases = [
            fields("annual", "ACCESS1-0", YearSpan::Single(2050)),
            fields("abs-annual", "CSIRO-Mk3-6-0", YearSpan::Range(2040, 2060)),
            Fields::new("mean-abs-annual", "tasmax", "historical", "ens", YearSpan::Range(1970, 2000), "loca"),
        ];
        for case in cases {
            assert_eq!(decode(&encode(&case)).unwrap(), case);
        }
    }

    #[test]
    fn test_encode_format() {
        let key = encode(&fields("abs-annual", "ACCESS1-0", YearSpan::Range(2001, 2002)));
        assert_eq!(key, "abs-annual_pr_rcp85_ACCESS1-0_2001-2002_nexgddp.tif");
    }

    #[test]
    fn test_decode_legacy_five_field_key() {
        let decoded = decode("annual_pr_rcp85_CCSM4_2050.tif").unwrap();
        assert_eq!(decoded.dataset, "nexgddp");
        assert_eq!(
            encode(&decoded),
            "annual_pr_rcp85_CCSM4_2050_nexgddp.tif"
        );
    }

    #[test]
    fn test_decode_rejects_wrong_field_count() {
        let err = decode("annual_pr_rcp85.tif").unwrap_err();
        assert!(matches!(err, KeyError::Malformed { .. }));
    }

    #[test]
    fn test_decode_rejects_wrong_extension() {
        assert!(matches!(
            decode("annual_pr_rcp85_CCSM4_2050_nexgddp.nc"),
            Err(KeyError::Malformed { .. })
        ));
        assert!(matches!(
            decode("annual_pr_rcp85_CCSM4_2050_nexgddp"),
            Err(KeyError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_year_syntax() {
        assert!(decode("annual_pr_rcp85_CCSM4_20x0_nexgddp.tif").is_err());
        assert!(decode("annual_pr_rcp85_CCSM4_2000-_nexgddp.tif").is_err());
    }

    #[test]
    fn test_validate_accepts_known_fields() {
        let valid = validate(fields("annual", "ACCESS1-0", YearSpan::Single(2050)), FORMULAS);
        assert!(valid.is_ok());

        let ensemble = validate(fields("mean-abs-annual", "ens", YearSpan::Range(2040, 2060)), FORMULAS);
        assert!(ensemble.is_ok());
    }

    #[test]
    fn test_validate_reports_each_field() {
        let mut f = fields("nope", "ACCESS1-0", YearSpan::Single(2050));
        assert_eq!(validate(f.clone(), FORMULAS).unwrap_err().field(), Some(KeyField::Formula));

        f.formula = "annual".to_string();
        f.variable = "huss".to_string();
        assert_eq!(validate(f.clone(), FORMULAS).unwrap_err().field(), Some(KeyField::Variable));

        f.variable = "pr".to_string();
        f.scenario = "rcp26".to_string();
        assert_eq!(validate(f.clone(), FORMULAS).unwrap_err().field(), Some(KeyField::Scenario));

        f.scenario = "rcp85".to_string();
        f.dataset = "cmip6".to_string();
        assert_eq!(validate(f.clone(), FORMULAS).unwrap_err().field(), Some(KeyField::Dataset));

        f.dataset = "nexgddp".to_string();
        f.model = "HadGEM2-ES".to_string(); // LOCA-only model
        let err = validate(f.clone(), FORMULAS).unwrap_err();
        assert_eq!(err.field(), Some(KeyField::Model));
        assert!(err.to_string().contains("inmcm4,ens"));

        f.model = "ACCESS1-0".to_string();
        f.year = YearSpan::Single(1949);
        assert_eq!(validate(f.clone(), FORMULAS).unwrap_err().field(), Some(KeyField::Year));

        f.year = YearSpan::Range(2060, 2040);
        assert_eq!(validate(f, FORMULAS).unwrap_err().field(), Some(KeyField::Year));
    }

    #[test]
    fn test_source_uris_are_not_keys() {
        assert!(is_source_uri("http://example.com/a.nc"));
        assert!(is_source_uri("ftp://example.com/a.nc"));
        assert!(!is_source_uri("annual_pr_rcp85_CCSM4_2050_nexgddp.tif"));
    }

    #[test]
    fn test_year_span() {
        assert_eq!(YearSpan::parse("2000"), Some(YearSpan::Single(2000)));
        assert_eq!(YearSpan::parse("1970-2000"), Some(YearSpan::Range(1970, 2000)));
        assert_eq!(YearSpan::parse("70-2000"), None);
        assert_eq!(YearSpan::Range(1970, 1972).years().count(), 3);
    }
}
