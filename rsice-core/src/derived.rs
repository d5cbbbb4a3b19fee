//! Derived variables for Icepack history output.
//!
//! Each function adds new variables to a history [`Dataset`] computed from the raw
//! output. Inputs must share dimensions and shape exactly; there is no broadcasting.

use crate::calendar::TimeEncoding;
use crate::dataset::Dataset;
use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::{LabeledArray, UNITS_ATTR};
use crate::schema::{ATTR_CALENDAR, DIM_TIME};
use crate::transforms::cumulative;
use tracing::debug;

pub const VAR_SST_ABOVE_FREEZING: &str = "sst_above_frz";
pub const VAR_NET_SURFACE_HEAT_FLUX: &str = "snhf";
pub const VAR_POND_VOLUME: &str = "volp";
pub const VAR_POND_VOLUME_CATEGORY: &str = "volpn";
pub const VAR_POND_INFLOW: &str = "liq_in";
pub const VAR_POND_OUTFLOW: &str = "liq_out";
pub const VAR_POND_NET_FLOW: &str = "liq_diff";
pub const VAR_FRESHWATER_RESIDUAL: &str = "frshwtr_residual";

/// Densities of snow, ice and fresh water (kg/m^3)
const RHO_SNOW: f64 = 330.0;
const RHO_ICE: f64 = 917.0;
const RHO_FRESH: f64 = 1000.0;

const SNHF_TERMS: [&str; 5] = ["flw", "flwout", "fsens", "flat", "fswabs"];
const VOLP_TERMS: [&str; 4] = ["aice", "alvl", "apnd", "hpnd"];
const VOLPN_TERMS: [&str; 4] = ["aicen", "alvln", "apndn", "hpndn"];
const POND_INFLOW_TERMS: [&str; 4] = ["meltt", "melts", "frain", "ilpnd"];
const POND_OUTFLOW_TERMS: [&str; 6] = ["flpnd", "expnd", "frpnd", "rfpnd", "mipnd", "rdpnd"];

/// Mixed-layer temperature above its freezing point: `sst - Tf`.
pub fn add_sst_above_freezing(dataset: &mut Dataset) -> RSIceResult<()> {
    require(dataset, VAR_SST_ABOVE_FREEZING, &["sst", "Tf"])?;
    let sst = dataset.variable("sst")?;
    let tf = dataset.variable("Tf")?;
    let diff = sst
        .zip_with(tf, |a, b| a - b)?
        .renamed(VAR_SST_ABOVE_FREEZING);
    dataset.insert(diff);
    Ok(())
}

/// Net surface heat flux `flw + flwout + fsens + flat + fswabs`.
///
/// Negative values are a net flux from the ice to the atmosphere.
pub fn add_net_surface_heat_flux(dataset: &mut Dataset) -> RSIceResult<()> {
    require(dataset, VAR_NET_SURFACE_HEAT_FLUX, &SNHF_TERMS)?;
    let total = sum_of(dataset, &SNHF_TERMS)?
        .renamed(VAR_NET_SURFACE_HEAT_FLUX)
        .with_attr(UNITS_ATTR, "W/m^2");
    dataset.insert(total);
    Ok(())
}

/// Pond volume per unit grid-cell area, in metres.
///
/// Adds `volp = aice·alvl·apnd·hpnd` and the category-wise
/// `volpn = aicen·alvln·apndn·hpndn`. Both sets of inputs must be present.
pub fn add_pond_volume(dataset: &mut Dataset) -> RSIceResult<()> {
    let all: Vec<&str> = VOLP_TERMS.iter().chain(VOLPN_TERMS.iter()).copied().collect();
    require(dataset, "volp(n)", &all)?;

    let volp = product_of(dataset, &VOLP_TERMS)?
        .renamed(VAR_POND_VOLUME)
        .with_attr(UNITS_ATTR, "m");
    let volpn = product_of(dataset, &VOLPN_TERMS)?
        .renamed(VAR_POND_VOLUME_CATEGORY)
        .with_attr(UNITS_ATTR, "m");
    dataset.insert(volp);
    dataset.insert(volpn);
    Ok(())
}

/// Melt pond freshwater budget per history step.
///
/// - `liq_in`: top and snow melt as water equivalent, rain over the step and
///   water released by thinning pond lids (negative `ilpnd`).
/// - `liq_out`: flushing, exponential decay, freeboard, refreezing, lid growth
///   (positive `ilpnd`), melt-pond loss to ice and ridging.
/// - `liq_diff = liq_in - liq_out`
/// - `frshwtr_residual`: the running total of `liq_diff` less `volp`, zero when
///   the budget closes.
///
/// Needs `volp` (see [`add_pond_volume`]) and a `time` variable with CF units,
/// from which the step length for the `frain` rate is taken.
pub fn add_pond_budget(dataset: &mut Dataset) -> RSIceResult<()> {
    let mut needed: Vec<&str> = POND_INFLOW_TERMS
        .iter()
        .chain(POND_OUTFLOW_TERMS.iter())
        .copied()
        .collect();
    needed.extend([VAR_POND_VOLUME, DIM_TIME]);
    require(dataset, "pond budget", &needed)?;

    let dt = step_seconds(dataset.variable(DIM_TIME)?)?;
    let lid = dataset.variable("ilpnd")?;

    let inflow = dataset
        .variable("meltt")?
        .zip_with(dataset.variable("melts")?, |ice, snow| {
            ice * RHO_ICE + snow * RHO_SNOW
        })?
        .zip_with(dataset.variable("frain")?, |melt, rain| {
            (melt + rain * dt) / RHO_FRESH
        })?
        .zip_with(lid, |total, lid| total - lid.min(0.0))?
        .renamed(VAR_POND_INFLOW);
    let outflow = sum_of(dataset, &POND_OUTFLOW_TERMS)?
        .zip_with(lid, |total, lid| total + lid.max(0.0))?
        .renamed(VAR_POND_OUTFLOW);
    let net = inflow
        .zip_with(&outflow, |a, b| a - b)?
        .renamed(VAR_POND_NET_FLOW);
    let residual = cumulative(&net, DIM_TIME)?
        .zip_with(dataset.variable(VAR_POND_VOLUME)?, |total, volp| total - volp)?
        .renamed(VAR_FRESHWATER_RESIDUAL);

    debug!(dt, "Added pond budget");
    for array in [inflow, outflow, net, residual] {
        dataset.insert(array);
    }
    Ok(())
}

/// Seconds between the first two steps of a CF time variable.
fn step_seconds(time: &LabeledArray) -> RSIceResult<f64> {
    let values = time.to_vec1()?;
    if values.len() < 2 {
        return Err(RSIceError::TimeDecoding(
            "at least two time steps are needed for the step length".to_string(),
        ));
    }
    let units = time
        .units()
        .ok_or_else(|| RSIceError::TimeDecoding("time variable has no units".to_string()))?;
    let encoding = TimeEncoding::parse(units, time.attr(ATTR_CALENDAR))?;
    Ok(encoding.seconds(values[1] - values[0]))
}

/// Copy individual tracers out of a tracer array into named variables.
///
/// `mapping` pairs a position on `tracer_dim` with the name of the new variable,
/// e.g. `(0, "Tsfc")` for the surface temperature tracer of `trcr`.
pub fn extract_tracers(
    dataset: &mut Dataset,
    source: &str,
    tracer_dim: &str,
    mapping: &[(usize, &str)],
) -> RSIceResult<()> {
    let tracers = dataset.variable(source)?.clone();
    for (index, name) in mapping {
        let slice = tracers.isel(tracer_dim, *index)?.renamed(*name);
        debug!(source, index, name, "Extracted tracer");
        dataset.insert(slice);
    }
    Ok(())
}

fn require(dataset: &Dataset, derived: &str, names: &[&str]) -> RSIceResult<()> {
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|n| !dataset.contains(n))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(RSIceError::MissingInputs {
            derived: derived.to_string(),
            missing: missing.join(", "),
        })
    }
}

fn fold_with(
    dataset: &Dataset,
    names: &[&str],
    f: impl Fn(f64, f64) -> f64 + Copy,
) -> RSIceResult<LabeledArray> {
    let (first, rest) = names
        .split_first()
        .ok_or_else(|| RSIceError::Error("no input variables".to_string()))?;
    let mut acc = dataset.variable(first)?.clone();
    for name in rest {
        acc = acc.zip_with(dataset.variable(name)?, f)?;
    }
    Ok(acc)
}

fn sum_of(dataset: &Dataset, names: &[&str]) -> RSIceResult<LabeledArray> {
    fold_with(dataset, names, |a, b| a + b)
}

fn product_of(dataset: &Dataset, names: &[&str]) -> RSIceResult<LabeledArray> {
    fold_with(dataset, names, |a, b| a * b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, values: Vec<f64>) -> LabeledArray {
        let n = values.len();
        LabeledArray::from_shape_vec(name, ["time"], &[n], values).unwrap()
    }

    #[test]
    fn sst_above_freezing() {
        let mut ds = Dataset::new()
            .with_variable(var("sst", vec![-1.0, 0.5]))
            .with_variable(var("Tf", vec![-1.8, -1.8]));
        add_sst_above_freezing(&mut ds).unwrap();
        let out = ds.variable(VAR_SST_ABOVE_FREEZING).unwrap().to_vec1().unwrap();
        assert!((out[0] - 0.8).abs() < 1e-12);
        assert!((out[1] - 2.3).abs() < 1e-12);
    }

    #[test]
    fn net_surface_heat_flux_sums_terms() {
        let mut ds = Dataset::new();
        for (name, v) in SNHF_TERMS.iter().zip([250.0, -300.0, 5.0, -2.0, 20.0]) {
            ds.insert(var(name, vec![v]));
        }
        add_net_surface_heat_flux(&mut ds).unwrap();
        let snhf = ds.variable(VAR_NET_SURFACE_HEAT_FLUX).unwrap();
        assert_eq!(snhf.to_vec1().unwrap(), vec![-27.0]);
        assert_eq!(snhf.units(), Some("W/m^2"));
    }

    #[test]
    fn pond_volume_reports_missing_inputs() {
        let mut ds = Dataset::new()
            .with_variable(var("aice", vec![1.0]))
            .with_variable(var("alvl", vec![1.0]));
        match add_pond_volume(&mut ds) {
            Err(RSIceError::MissingInputs { missing, .. }) => {
                assert!(missing.contains("apnd"));
                assert!(missing.contains("hpndn"));
                assert!(!missing.contains("alvl,"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn pond_volume_products() {
        let mut ds = Dataset::new();
        for name in VOLP_TERMS {
            ds.insert(var(name, vec![0.5, 1.0]));
        }
        for name in VOLPN_TERMS {
            ds.insert(var(name, vec![2.0, 1.0]));
        }
        add_pond_volume(&mut ds).unwrap();
        assert_eq!(
            ds.variable(VAR_POND_VOLUME).unwrap().to_vec1().unwrap(),
            vec![0.0625, 1.0]
        );
        assert_eq!(
            ds.variable(VAR_POND_VOLUME_CATEGORY).unwrap().to_vec1().unwrap(),
            vec![16.0, 1.0]
        );
    }

    #[test]
    fn shape_mismatch_is_an_error() {
        let mut ds = Dataset::new()
            .with_variable(var("sst", vec![1.0, 2.0]))
            .with_variable(var("Tf", vec![1.0]));
        assert!(matches!(
            add_sst_above_freezing(&mut ds),
            Err(RSIceError::ShapeMismatch(_))
        ));
    }

    /// Two daily steps, one cell
    fn pond_history() -> Dataset {
        let mut ds = Dataset::new().with_variable(
            var("time", vec![0.0, 1.0]).with_attr(UNITS_ATTR, "days since 2015-06-01"),
        );
        for (name, values) in [
            ("meltt", vec![0.01, 0.0]),
            ("melts", vec![0.0, 0.02]),
            ("frain", vec![1.0e-5, 0.0]),
            ("ilpnd", vec![-0.001, 0.002]),
            ("flpnd", vec![0.001, 0.001]),
            ("expnd", vec![0.0, 0.0005]),
            ("frpnd", vec![0.0, 0.0]),
            ("rfpnd", vec![0.0002, 0.0]),
            ("mipnd", vec![0.0, 0.0]),
            ("rdpnd", vec![0.0, 0.0001]),
            (VAR_POND_VOLUME, vec![0.005, 0.006]),
        ] {
            ds.insert(var(name, values));
        }
        ds
    }

    #[test]
    fn pond_budget_terms() {
        let mut ds = pond_history();
        add_pond_budget(&mut ds).unwrap();
        let get = |name: &str| ds.variable(name).unwrap().to_vec1().unwrap();

        // (0.01·917 + 1e-5·86400)/1000 + 0.001 and 0.02·330/1000
        let inflow = get(VAR_POND_INFLOW);
        assert!((inflow[0] - (9.17 + 0.864) / 1000.0 - 0.001).abs() < 1e-12);
        assert!((inflow[1] - 0.0066).abs() < 1e-12);

        // Lid growth only counts as outflow when positive
        let outflow = get(VAR_POND_OUTFLOW);
        assert!((outflow[0] - 0.0012).abs() < 1e-12);
        assert!((outflow[1] - 0.0036).abs() < 1e-12);

        let net = get(VAR_POND_NET_FLOW);
        let residual = get(VAR_FRESHWATER_RESIDUAL);
        assert!((net[0] - (inflow[0] - outflow[0])).abs() < 1e-15);
        assert!((residual[0] - (net[0] - 0.005)).abs() < 1e-12);
        assert!((residual[1] - (net[0] + net[1] - 0.006)).abs() < 1e-12);
    }

    #[test]
    fn pond_budget_needs_pond_volume_and_time_units() {
        let mut ds = pond_history();
        let mut without_volp = Dataset::new();
        for name in ds.variable_names().filter(|n| *n != VAR_POND_VOLUME) {
            without_volp.insert(ds.variable(name).unwrap().clone());
        }
        match add_pond_budget(&mut without_volp) {
            Err(RSIceError::MissingInputs { missing, .. }) => assert_eq!(missing, "volp"),
            other => panic!("unexpected result: {:?}", other),
        }

        ds.insert(var("time", vec![0.0, 1.0]));
        assert!(matches!(
            add_pond_budget(&mut ds),
            Err(RSIceError::TimeDecoding(_))
        ));
    }

    #[test]
    fn tracer_extraction() {
        let trcr = LabeledArray::from_shape_vec(
            "trcr",
            ["time", "ntrcr"],
            &[2, 3],
            vec![-5.0, 0.1, 0.2, -6.0, 0.3, 0.4],
        )
        .unwrap();
        let mut ds = Dataset::new().with_variable(trcr);
        extract_tracers(&mut ds, "trcr", "ntrcr", &[(0, "Tsfc"), (2, "alvl")]).unwrap();

        assert_eq!(ds.variable("Tsfc").unwrap().to_vec1().unwrap(), vec![-5.0, -6.0]);
        assert_eq!(ds.variable("alvl").unwrap().to_vec1().unwrap(), vec![0.2, 0.4]);
        assert!(extract_tracers(&mut ds, "trcr", "ntrcr", &[(3, "bad")]).is_err());
    }
}
