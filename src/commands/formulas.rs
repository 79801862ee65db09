/// `gddp formulas` command implementation
use anyhow::{Context, Result};
use serde::Serialize;

use crate::cli::FormulasArgs;
use crate::config::parse_baseline;
use crate::formula::{self, Formula, DEFAULT_BASELINE};

#[derive(Serialize)]
struct FormulaOutput<'a> {
    name: &'a str,
    rule: &'static str,
    requires: &'a str,
    compute: &'a str,
    template: String,
    description: &'a str,
}

impl<'a> From<&'a Formula> for FormulaOutput<'a> {
    fn from(formula: &'a Formula) -> Self {
        Self {
            name: &formula.name,
            rule: formula.rule.kind(),
            requires: &formula.requires,
            compute: &formula.compute,
            template: formula.template(),
            description: &formula.description,
        }
    }
}

pub fn run(args: FormulasArgs) -> Result<()> {
    let baseline = match &args.baseline {
        Some(value) => parse_baseline(value)?,
        None => DEFAULT_BASELINE,
    };
    let registry = formula::standard(baseline).context("Failed to build the formula catalogue")?;

    let pattern = args
        .pattern
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid formula pattern")?;

    let selected: Vec<FormulaOutput> = registry
        .iter()
        .filter(|f| pattern.as_ref().map_or(true, |p| p.matches(&f.name)))
        .map(FormulaOutput::from)
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&selected)?);
        return Ok(());
    }

    let width = selected.iter().map(|f| f.name.len()).max().unwrap_or(0);
    for f in &selected {
        println!(
            "{:<width$}  {:<14}  {}({})  {}",
            f.name,
            f.rule,
            f.compute,
            f.requires,
            f.description,
            width = width
        );
    }
    Ok(())
}
