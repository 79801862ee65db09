//! Closed enumerations behind the identifier grammar
//!
//! Datasets, scenarios, variables, model rosters and the year bounds are fixed
//! at compile time. Raw-source URIs are built from per-dataset templates.

use super::YearSpan;
use crate::error::FormulaError;

pub const NEXGDDP: &str = "nexgddp";
pub const LOCA: &str = "loca";
pub const DATASETS: &[&str] = &[NEXGDDP, LOCA];

pub const HISTORICAL: &str = "historical";
pub const SCENARIOS: &[&str] = &[HISTORICAL, "rcp85", "rcp45"];

pub const VARIABLES: &[&str] = &["pr", "tasmax", "tasmin"];

/// Reserved model marker for multi-model aggregates
pub const ENSEMBLE: &str = "ens";

/// Reserved formula name whose keys are raw-source URIs
pub const SOURCE_FORMULA: &str = "src";

pub const START_YEAR: u16 = 1950;
/// First projection year; earlier years only exist in the historical runs
pub const PROJECTION_YEAR: u16 = 2006;
pub const END_YEAR: u16 = 2100;

pub const FILE_EXTENSION: &str = "tif";

const NEXGDDP_MODELS: &[&str] = &[
    "ACCESS1-0",
    "BNU-ESM",
    "CCSM4",
    "CESM1-BGC",
    "CNRM-CM5",
    "CSIRO-Mk3-6-0",
    "CanESM2",
    "GFDL-CM3",
    "GFDL-ESM2G",
    "GFDL-ESM2M",
    "IPSL-CM5A-LR",
    "IPSL-CM5A-MR",
    "MIROC-ESM-CHEM",
    "MIROC-ESM",
    "MIROC5",
    "MPI-ESM-LR",
    "MPI-ESM-MR",
    "MRI-CGCM3",
    "NorESM1-M",
    "bcc-csm1-1",
    "inmcm4",
];

const LOCA_MODELS: &[&str] = &[
    "ACCESS1-0",
    "ACCESS1-3",
    "CCSM4",
    "CESM1-BGC",
    "CESM1-CAM5",
    "CMCC-CM",
    "CMCC-CMS",
    "CNRM-CM5",
    "CSIRO-Mk3-6-0",
    "CanESM2",
    "EC-EARTH",
    "FGOALS-g2",
    "GFDL-CM3",
    "GFDL-ESM2G",
    "GFDL-ESM2M",
    "GISS-E2-H",
    "GISS-E2-R",
    "HadGEM2-AO",
    "HadGEM2-CC",
    "HadGEM2-ES",
    "IPSL-CM5A-LR",
    "IPSL-CM5A-MR",
    "MIROC-ESM",
    "MIROC-ESM-CHEM",
    "MIROC5",
    "MPI-ESM-LR",
    "MPI-ESM-MR",
    "MRI-CGCM3",
    "NorESM1-M",
    "bcc-csm1-1",
    "bcc-csm1-1-m",
    "inmcm4",
];

const NEXGDDP_TEMPLATE: &str = "http://nasanex.s3.amazonaws.com/NEX-GDDP/BCSD/{scenario}/day/atmos/{variable}/r1i1p1/v1.0/{variable}_day_BCSD_{scenario}_r1i1p1_{model}_{year}.nc";

const LOCA_TEMPLATE: &str = "ftp://gdo-dcp.ucllnl.org/pub/dcp/archive/cmip5/loca/LOCA_2016-04-02/{model}/16th/{scenario}/{member}/{variable}/{variable}_day_{model}_{scenario}_{member}_{year}0101-{year}1231.LOCA_2016-04-02.16th.nc";

const DEFAULT_MEMBER: &str = "r1i1p1";

/// Submissions whose ensemble member differs from the default
const MEMBER_EXCEPTIONS: &[(&str, &str)] = &[
    ("CCSM4", "r6i1p1"),
    ("GISS-E2-H", "r6i1p1"),
    ("GISS-E2-R", "r6i1p1"),
];

const SOURCE_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];

/// Model roster for a dataset
pub fn models(dataset: &str) -> Option<&'static [&'static str]> {
    match dataset {
        NEXGDDP => Some(NEXGDDP_MODELS),
        LOCA => Some(LOCA_MODELS),
        _ => None,
    }
}

/// Ensemble member code used by a model's submission
pub fn ensemble_member(model: &str) -> &'static str {
    MEMBER_EXCEPTIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, member)| *member)
        .unwrap_or(DEFAULT_MEMBER)
}

/// Raw-source identifiers are URIs and bypass the grammar entirely
pub fn is_source_uri(key: &str) -> bool {
    SOURCE_SCHEMES.iter().any(|scheme| key.starts_with(scheme))
}

/// Scenario to use for a span: projections and historical runs overlap, so
/// anything wholly before the projection start is read from historical.
pub fn scenario_for<'a>(scenario: &'a str, year: YearSpan) -> &'a str {
    if year.end() < PROJECTION_YEAR {
        HISTORICAL
    } else {
        scenario
    }
}

/// Build the raw-source URI for one daily file
pub fn source_uri(
    variable: &str,
    scenario: &str,
    model: &str,
    year: YearSpan,
    dataset: &str,
) -> Result<String, FormulaError> {
    let template = match dataset {
        NEXGDDP => NEXGDDP_TEMPLATE,
        LOCA => LOCA_TEMPLATE,
        other => return Err(FormulaError::NoSourceTemplate(other.to_string())),
    };

    Ok(template
        .replace("{scenario}", scenario)
        .replace("{variable}", variable)
        .replace("{model}", model)
        .replace("{member}", ensemble_member(model))
        .replace("{year}", &year.to_string()))
}
