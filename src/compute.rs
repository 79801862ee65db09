//! Named compute functions
//!
//! Every function maps a band stack to a new raster on the same grid. Band
//! reductions are NaN-aware and yield one band. The paired functions (`sub`,
//! `div`, `gt`) treat the last band as the reference and compare every other
//! band against it.

use crate::error::ComputeError;
use crate::raster::Raster;

pub type ComputeFn = fn(&Raster) -> Result<Raster, ComputeError>;

pub fn celsius_to_kelvin(deg: f32) -> f32 {
    deg + 273.15
}

pub fn fahrenheit_to_kelvin(deg: f32) -> f32 {
    celsius_to_kelvin((deg - 32.0) * 5.0 / 9.0)
}

const FUNCTIONS: &[(&str, ComputeFn)] = &[
    ("mean", mean),
    ("sum", sum),
    ("sub", subtract),
    ("div", divide),
    ("gt", count_above_reference),
    ("q25", |r| Ok(percentile(r, 25.0))),
    ("q50", |r| Ok(percentile(r, 50.0))),
    ("q75", |r| Ok(percentile(r, 75.0))),
    ("q98", |r| Ok(percentile(r, 98.0))),
    ("q99", |r| Ok(percentile(r, 99.0))),
    ("gt95f", |r| Ok(count_above(r, fahrenheit_to_kelvin(95.0)))),
    ("gt90f", |r| Ok(count_above(r, fahrenheit_to_kelvin(90.0)))),
    ("gt32f", |r| Ok(count_above(r, fahrenheit_to_kelvin(32.0)))),
    ("gt50", |r| Ok(count_above(r, 50.0))),
    ("hdd65f", |r| Ok(degree_days_above(r, fahrenheit_to_kelvin(65.0)))),
    ("cdd65f", |r| Ok(degree_days_below(r, fahrenheit_to_kelvin(65.0)))),
    ("hdd16c", |r| Ok(degree_days_above(r, celsius_to_kelvin(16.0)))),
    ("cdd16c", |r| Ok(degree_days_below(r, celsius_to_kelvin(16.0)))),
];

pub fn lookup(name: &str) -> Result<ComputeFn, ComputeError> {
    FUNCTIONS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, f)| *f)
        .ok_or_else(|| ComputeError::UnknownFunction(name.to_string()))
}

pub fn names() -> impl Iterator<Item = &'static str> {
    FUNCTIONS.iter().map(|(name, _)| *name)
}

/// Collapse the band axis with `f`, one output cell per pixel
fn reduce(raster: &Raster, mut f: impl FnMut(&mut dyn Iterator<Item = f32>) -> f32) -> Raster {
    let data = (0..raster.pixels())
        .map(|pixel| f(&mut raster.column(pixel)))
        .collect();
    raster.with_bands(1, data)
}

fn mean(raster: &Raster) -> Result<Raster, ComputeError> {
    Ok(reduce(raster, |values| {
        let (total, count) = values
            .filter(|v| !v.is_nan())
            .fold((0.0f64, 0usize), |(t, c), v| (t + v as f64, c + 1));
        if count == 0 {
            f32::NAN
        } else {
            (total / count as f64) as f32
        }
    }))
}

fn sum(raster: &Raster) -> Result<Raster, ComputeError> {
    Ok(reduce(raster, |values| {
        values.filter(|v| !v.is_nan()).map(f64::from).sum::<f64>() as f32
    }))
}

/// Percentile with linear interpolation between the closest ranks
fn percentile(raster: &Raster, q: f64) -> Raster {
    let mut scratch = Vec::with_capacity(raster.bands());
    reduce(raster, |values| {
        scratch.clear();
        scratch.extend(values.filter(|v| !v.is_nan()));
        if scratch.is_empty() {
            return f32::NAN;
        }
        scratch.sort_by(f32::total_cmp);
        let rank = q / 100.0 * (scratch.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let low = scratch[lower] as f64;
        let high = scratch[upper] as f64;
        (low + (high - low) * (rank - lower as f64)) as f32
    })
}

fn count_above(raster: &Raster, threshold: f32) -> Raster {
    reduce(raster, |values| values.filter(|v| *v > threshold).count() as f32)
}

fn degree_days_above(raster: &Raster, base: f32) -> Raster {
    reduce(raster, |values| {
        values
            .filter(|v| *v > base)
            .map(|v| f64::from(v - base))
            .sum::<f64>() as f32
    })
}

fn degree_days_below(raster: &Raster, base: f32) -> Raster {
    reduce(raster, |values| {
        values
            .filter(|v| *v < base)
            .map(|v| f64::from(base - v))
            .sum::<f64>() as f32
    })
}

/// Apply `f(band, reference)` cellwise to every band but the last
fn against_reference(
    function: &str,
    raster: &Raster,
    f: impl Fn(f32, f32) -> f32,
) -> Result<Raster, ComputeError> {
    if raster.bands() < 2 {
        return Err(ComputeError::NotEnoughBands {
            function: function.to_string(),
            needed: 2,
            got: raster.bands(),
        });
    }
    let reference = raster.band(raster.bands() - 1);
    let bands = raster.bands() - 1;
    let mut data = Vec::with_capacity(bands * raster.pixels());
    for band in 0..bands {
        data.extend(
            raster
                .band(band)
                .iter()
                .zip(reference)
                .map(|(v, r)| f(*v, *r)),
        );
    }
    Ok(raster.with_bands(bands, data))
}

fn subtract(raster: &Raster) -> Result<Raster, ComputeError> {
    against_reference("sub", raster, |v, r| v - r)
}

fn divide(raster: &Raster) -> Result<Raster, ComputeError> {
    against_reference("div", raster, |v, r| v / r)
}

/// Number of bands exceeding the reference band, per cell
fn count_above_reference(raster: &Raster) -> Result<Raster, ComputeError> {
    let exceed = against_reference("gt", raster, |v, r| if v > r { 1.0 } else { 0.0 })?;
    sum(&exceed)
}
