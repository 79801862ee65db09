//! Standard indicator catalogue
//!
//! Per-year indicators are computed from the raw daily sources. Every indicator
//! then gets a multi-year mean (`abs-`), an anomaly (`diff-`) and a ratio
//! (`ch-`) against the baseline window, and four ensemble statistics of each.

use super::{Formula, ParamTemplate, Registry};
use crate::error::FormulaError;
use crate::key::catalog::SOURCE_FORMULA;
use crate::key::YearSpan;

pub const DEFAULT_BASELINE: YearSpan = YearSpan::Range(1970, 2000);

const ENSEMBLE_STATS: &[&str] = &["mean", "q25", "q50", "q75"];

/// Per-year indicators computed straight from the daily source: (name, compute, description)
const SOURCE_INDICATORS: &[(&str, &str, &str)] = &[
    ("annual", "mean", "Annual mean"),
    ("q98", "q98", "98th percentile of daily values"),
    ("q99", "q99", "99th percentile of daily values"),
    ("gt95f", "gt95f", "Days above 95\u{b0}F"),
    ("gt90f", "gt90f", "Days above 90\u{b0}F"),
    ("gt32f", "gt32f", "Days above 32\u{b0}F"),
    ("gt50", "gt50", "Days above 50 units"),
    ("hdd65f", "hdd65f", "Heating degree days, 65\u{b0}F base"),
    ("cdd65f", "cdd65f", "Cooling degree days, 65\u{b0}F base"),
    ("hdd16c", "hdd16c", "Heating degree days, 16\u{b0}C base"),
    ("cdd16c", "cdd16c", "Cooling degree days, 16\u{b0}C base"),
];

/// Days exceeding the baseline percentile: (name, baseline percentile formula)
const EXCEEDANCE_INDICATORS: &[(&str, &str)] = &[("gt-q98", "abs-q98"), ("gt-q99", "abs-q99")];

/// Build the standard registry against a baseline window
pub fn standard(baseline: YearSpan) -> Result<Registry, FormulaError> {
    let mut registry = Registry::new();

    for (name, compute, description) in SOURCE_INDICATORS {
        registry.register(
            Formula::simple(*name, SOURCE_FORMULA, *compute).with_description(*description),
        )?;
    }

    for (name, percentile) in EXCEEDANCE_INDICATORS {
        let second = ParamTemplate::new(*percentile).with_year(baseline);
        registry.register(
            Formula::paired(*name, SOURCE_FORMULA, "gt", second)
                .with_description(format!("Days above the {} baseline {}", percentile, baseline)),
        )?;
    }

    let indicators = SOURCE_INDICATORS
        .iter()
        .map(|(name, _, _)| *name)
        .chain(EXCEEDANCE_INDICATORS.iter().map(|(name, _)| *name));

    for indicator in indicators {
        let absolute = format!("abs-{}", indicator);
        let difference = format!("diff-{}", indicator);
        let change = format!("ch-{}", indicator);

        registry.register(
            Formula::time_aggregate(&absolute, indicator, "mean")
                .with_description(format!("Multi-year mean of {}", indicator)),
        )?;
        registry.register(
            Formula::paired(
                &difference,
                &absolute,
                "sub",
                ParamTemplate::new(&absolute).with_year(baseline),
            )
            .with_description(format!("{} minus its {} baseline", absolute, baseline)),
        )?;
        registry.register(
            Formula::paired(
                &change,
                &absolute,
                "div",
                ParamTemplate::new(&absolute).with_year(baseline),
            )
            .with_description(format!("{} relative to its {} baseline", absolute, baseline)),
        )?;

        for stat in ENSEMBLE_STATS {
            for input in [&absolute, &difference, &change] {
                registry.register(
                    Formula::ensemble(input.as_str(), *stat)
                        .with_description(format!("Ensemble {} of {}", stat, input)),
                )?;
            }
        }
    }

    Ok(registry)
}
