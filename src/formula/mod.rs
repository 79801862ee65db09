//! Formula registry
//!
//! A formula maps the parameters of the artifact it produces to the keys of the
//! artifacts it is computed from. There are exactly four expansion rules; each
//! is a pure function of the key's fields.

pub mod catalogue;

use std::collections::BTreeMap;

use crate::error::{FormulaError, KeyError, ResolveError};
use crate::key::catalog::{self, ENSEMBLE, SOURCE_FORMULA};
use crate::key::{self, Fields, YearSpan};

pub use catalogue::{standard, DEFAULT_BASELINE};

/// Fixed parameter overrides for the second input of a paired formula
///
/// Unset fields are taken from the key being expanded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamTemplate {
    pub formula: String,
    pub scenario: Option<String>,
    pub model: Option<String>,
    pub year: Option<YearSpan>,
}

impl ParamTemplate {
    pub fn new(formula: impl Into<String>) -> Self {
        Self {
            formula: formula.into(),
            scenario: None,
            model: None,
            year: None,
        }
    }

    pub fn with_year(mut self, year: YearSpan) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_scenario(mut self, scenario: impl Into<String>) -> Self {
        self.scenario = Some(scenario.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    fn apply(&self, params: &Fields) -> Result<String, FormulaError> {
        let year = self.year.unwrap_or(params.year);
        let scenario = self.scenario.as_deref().unwrap_or(&params.scenario);
        key_name(
            &self.formula,
            &params.variable,
            catalog::scenario_for(scenario, year),
            self.model.as_deref().unwrap_or(&params.model),
            year,
            &params.dataset,
        )
    }
}

/// Expansion rule of a formula
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// One input at the same parameters
    Simple,
    /// The same-parameter input plus one from a fixed template (usually a baseline)
    Paired { second: ParamTemplate },
    /// One input per year of a `start-end` range
    TimeAggregate,
    /// One input per model of the dataset roster, collapsed to the ensemble marker
    Ensemble,
}

impl Rule {
    pub fn kind(&self) -> &'static str {
        match self {
            Rule::Simple => "simple",
            Rule::Paired { .. } => "paired",
            Rule::TimeAggregate => "time-aggregate",
            Rule::Ensemble => "ensemble",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formula {
    pub name: String,
    /// Formula whose artifacts this one is computed from (`src` for raw sources)
    pub requires: String,
    /// Name of the compute function applied by the worker
    pub compute: String,
    pub description: String,
    pub rule: Rule,
}

impl Formula {
    pub fn new(rule: Rule, name: impl Into<String>, requires: impl Into<String>, compute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            requires: requires.into(),
            compute: compute.into(),
            description: String::new(),
            rule,
        }
    }

    pub fn simple(name: impl Into<String>, requires: impl Into<String>, compute: impl Into<String>) -> Self {
        Self::new(Rule::Simple, name, requires, compute)
    }

    pub fn paired(
        name: impl Into<String>,
        requires: impl Into<String>,
        compute: impl Into<String>,
        second: ParamTemplate,
    ) -> Self {
        Self::new(Rule::Paired { second }, name, requires, compute)
    }

    pub fn time_aggregate(name: impl Into<String>, requires: impl Into<String>, compute: impl Into<String>) -> Self {
        Self::new(Rule::TimeAggregate, name, requires, compute)
    }

    /// Ensemble formulas are named `{compute}-{requires}` unless renamed
    pub fn ensemble(requires: impl Into<String>, compute: impl Into<String>) -> Self {
        let requires = requires.into();
        let compute = compute.into();
        let name = format!("{}-{}", compute, requires);
        Self::new(Rule::Ensemble, name, requires, compute)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Keys of the artifacts this formula reads for the given parameters
    pub fn requires(&self, params: &Fields) -> Result<Vec<String>, FormulaError> {
        let scenario = catalog::scenario_for(&params.scenario, params.year);
        let same = |formula: &str| {
            key_name(formula, &params.variable, scenario, &params.model, params.year, &params.dataset)
        };

        match &self.rule {
            Rule::Simple => Ok(vec![same(&self.requires)?]),
            Rule::Paired { second } => Ok(vec![same(&self.requires)?, second.apply(params)?]),
            Rule::TimeAggregate => {
                if !params.year.is_range() {
                    return Err(FormulaError::YearRangeRequired {
                        formula: self.name.clone(),
                        year: params.year.to_string(),
                    });
                }
                params
                    .year
                    .years()
                    .map(|year| {
                        let year = YearSpan::Single(year);
                        key_name(
                            &self.requires,
                            &params.variable,
                            catalog::scenario_for(&params.scenario, year),
                            &params.model,
                            year,
                            &params.dataset,
                        )
                    })
                    .collect()
            }
            Rule::Ensemble => {
                let roster = catalog::models(&params.dataset)
                    .ok_or_else(|| FormulaError::UnknownDataset(params.dataset.clone()))?;
                roster
                    .iter()
                    .map(|model| {
                        key_name(&self.requires, &params.variable, scenario, model, params.year, &params.dataset)
                    })
                    .collect()
            }
        }
    }

    /// Key of the artifact this formula produces for the given parameters
    pub fn yields(&self, params: &Fields) -> String {
        let model = match self.rule {
            Rule::Ensemble => ENSEMBLE,
            _ => params.model.as_str(),
        };
        Fields::new(
            &self.name,
            &params.variable,
            catalog::scenario_for(&params.scenario, params.year),
            model,
            params.year,
            &params.dataset,
        )
        .to_string()
    }

    /// Human-readable key pattern, e.g. `abs-annual_{variable}_{scenario}_{model}_{startYear}-{endYear}_{dataset}.tif`
    pub fn template(&self) -> String {
        let (model, year) = match self.rule {
            Rule::Ensemble => (ENSEMBLE, "{startYear}-{endYear}"),
            Rule::TimeAggregate => ("{model}", "{startYear}-{endYear}"),
            _ => ("{model}", "{year}"),
        };
        format!(
            "{}_{{variable}}_{{scenario}}_{}_{}_{{dataset}}.{}",
            self.name,
            model,
            year,
            catalog::FILE_EXTENSION
        )
    }
}

/// Key (or source URI) for one set of parameters
fn key_name(
    formula: &str,
    variable: &str,
    scenario: &str,
    model: &str,
    year: YearSpan,
    dataset: &str,
) -> Result<String, FormulaError> {
    if formula == SOURCE_FORMULA {
        return catalog::source_uri(variable, scenario, model, year, dataset);
    }
    Ok(Fields::new(formula, variable, scenario, model, year, dataset).to_string())
}

/// Registered formulae, keyed by name
///
/// Built once at startup and passed by reference to the resolver and the
/// worker; never mutated while a build runs.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    formulas: BTreeMap<String, Formula>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, formula: Formula) -> Result<(), FormulaError> {
        if formula.name == SOURCE_FORMULA || self.formulas.contains_key(&formula.name) {
            return Err(FormulaError::Duplicate(formula.name));
        }
        self.formulas.insert(formula.name.clone(), formula);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&Formula, FormulaError> {
        self.formulas
            .get(name)
            .ok_or_else(|| FormulaError::Unknown(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.formulas.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Requirements of a derived-artifact key
    pub fn requires(&self, key: &str) -> Result<Vec<String>, ResolveError> {
        let fields = key::decode(key)?;
        let formula = self.lookup(&fields.formula)?;
        Ok(formula.requires(&fields)?)
    }

    pub fn yields(&self, fields: &Fields) -> Result<String, FormulaError> {
        Ok(self.lookup(&fields.formula)?.yields(fields))
    }

    /// Decode and validate a user-supplied key, returning its canonical form
    pub fn validate_key(&self, key: &str) -> Result<String, KeyError> {
        let fields = key::decode(key)?;
        let fields = key::validate(fields, &self.names())?;
        Ok(key::encode(&fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::catalog::NEXGDDP;

    fn params(scenario: &str, model: &str, year: YearSpan) -> Fields {
        Fields::new("x", "pr", scenario, model, year, NEXGDDP)
    }

    #[test]
    fn test_simple_substitutes_formula() {
        let formula = Formula::simple("abs", "annual", "mean");
        let requires = formula.requires(&params("rcp85", "CCSM4", YearSpan::Single(2050))).unwrap();
        assert_eq!(requires, vec!["annual_pr_rcp85_CCSM4_2050_nexgddp.tif".to_string()]);
    }

    #[test]
    fn test_simple_forces_historical_before_projection() {
        let formula = Formula::simple("annual", "src", "mean");
        let p = params("rcp85", "ACCESS1-0", YearSpan::Single(1975));
        let requires = formula.requires(&p).unwrap();
        assert_eq!(requires.len(), 1);
        assert!(requires[0].contains("/historical/"));
        assert!(!requires[0].contains("rcp85"));
        assert_eq!(formula.yields(&p), "annual_pr_historical_ACCESS1-0_1975_nexgddp.tif");
    }

    #[test]
    fn test_paired_adds_template_input() {
        let baseline = ParamTemplate::new("abs-q99").with_year(YearSpan::Range(1970, 2000));
        let formula = Formula::paired("gt-q99", "src", "gt", baseline);
        let requires = formula.requires(&params("rcp85", "CCSM4", YearSpan::Single(2050))).unwrap();
        assert_eq!(requires.len(), 2);
        assert!(requires[0].starts_with("http://"));
        assert_eq!(requires[1], "abs-q99_pr_historical_CCSM4_1970-2000_nexgddp.tif");
    }

    #[test]
    fn test_time_aggregate_splits_scenarios_per_year() {
        let formula = Formula::time_aggregate("abs-annual", "annual", "mean");
        let requires = formula
            .requires(&params("rcp85", "CCSM4", YearSpan::Range(2004, 2007)))
            .unwrap();
        assert_eq!(
            requires,
            vec![
                "annual_pr_historical_CCSM4_2004_nexgddp.tif".to_string(),
                "annual_pr_historical_CCSM4_2005_nexgddp.tif".to_string(),
                "annual_pr_rcp85_CCSM4_2006_nexgddp.tif".to_string(),
                "annual_pr_rcp85_CCSM4_2007_nexgddp.tif".to_string(),
            ]
        );
    }

    #[test]
    fn test_time_aggregate_requires_range() {
        let formula = Formula::time_aggregate("abs-annual", "annual", "mean");
        let err = formula
            .requires(&params("rcp85", "CCSM4", YearSpan::Single(2050)))
            .unwrap_err();
        assert!(matches!(err, FormulaError::YearRangeRequired { .. }));
    }

    #[test]
    fn test_time_aggregate_yields_historical_for_old_range() {
        let formula = Formula::time_aggregate("abs-annual", "annual", "mean");
        let p = params("rcp45", "CCSM4", YearSpan::Range(1970, 2000));
        assert_eq!(formula.yields(&p), "abs-annual_pr_historical_CCSM4_1970-2000_nexgddp.tif");
        let p = params("rcp45", "CCSM4", YearSpan::Range(2000, 2010));
        assert_eq!(formula.yields(&p), "abs-annual_pr_rcp45_CCSM4_2000-2010_nexgddp.tif");
    }

    #[test]
    fn test_ensemble_one_input_per_model() {
        let formula = Formula::ensemble("abs-annual", "mean");
        assert_eq!(formula.name, "mean-abs-annual");

        let p = params("rcp85", "CCSM4", YearSpan::Range(2040, 2060));
        let requires = formula.requires(&p).unwrap();
        let roster = catalog::models(NEXGDDP).unwrap();
        assert_eq!(requires.len(), roster.len());
        for (key, model) in requires.iter().zip(roster) {
            assert_eq!(key, &format!("abs-annual_pr_rcp85_{}_2040-2060_nexgddp.tif", model));
        }

        assert_eq!(formula.yields(&p), "mean-abs-annual_pr_rcp85_ens_2040-2060_nexgddp.tif");
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = Registry::new();
        registry.register(Formula::simple("annual", "src", "mean")).unwrap();
        let err = registry
            .register(Formula::simple("annual", "src", "sum"))
            .unwrap_err();
        assert_eq!(err, FormulaError::Duplicate("annual".to_string()));
        assert!(registry.register(Formula::simple("src", "src", "mean")).is_err());
    }

    #[test]
    fn test_lookup_unknown() {
        let registry = Registry::new();
        assert_eq!(
            registry.lookup("annual").unwrap_err(),
            FormulaError::Unknown("annual".to_string())
        );
    }

    #[test]
    fn test_validate_key_canonicalizes_legacy_form() {
        let mut registry = Registry::new();
        registry.register(Formula::simple("annual", "src", "mean")).unwrap();
        assert_eq!(
            registry.validate_key("annual_pr_rcp85_CCSM4_2050.tif").unwrap(),
            "annual_pr_rcp85_CCSM4_2050_nexgddp.tif"
        );
        assert!(registry.validate_key("q99_pr_rcp85_CCSM4_2050_nexgddp.tif").is_err());
    }

    #[test]
    fn test_template() {
        assert_eq!(
            Formula::ensemble("abs-annual", "q50").template(),
            "q50-abs-annual_{variable}_{scenario}_ens_{startYear}-{endYear}_{dataset}.tif"
        );
    }
}
