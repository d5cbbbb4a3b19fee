//! Single-column moist energy balance model with sea ice (SCM-MEBM)
//!
//! A diffusive energy balance model on a grid of $x = \sin(\text{latitude})$
//! following Wagner and Eisenman (2015), extended with diffusion of moist
//! static energy. The prognostic variable is the surface enthalpy $E$: positive
//! values are the heat content of an ice-free mixed layer, negative values are
//! the latent heat deficit of sea ice.
//!
//! Each step applies forward Euler to $E$ and implicit Euler to the ghost-layer
//! temperature $T_g$, with the latent-heat diffusion term treated explicitly.
//! Only the final model year is stored.

use crate::components::humidity::saturation_specific_humidity;
use crate::utils::linear_algebra::Tridiagonal;
use ndarray::{Array1, Array2, Axis};
use rsice_core::errors::{RSIceError, RSIceResult};
use rsice_core::labeled::FloatValue;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::info;

const SECONDS_PER_DAY: FloatValue = 86400.0;
const SECONDS_PER_YEAR: FloatValue = SECONDS_PER_DAY * 365.25;
/// Specific heat of sea water (J kg^-1 K^-1)
const SEAWATER_HEAT_CAPACITY: FloatValue = 3.996e3;
/// Density of sea water (kg m^-3)
const SEAWATER_DENSITY: FloatValue = 1.026e3;

/// Physical parameters of the SCM-MEBM.
///
/// Units use years as the time unit, so heat capacities are in W yr m^-2 K^-1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MebmParameters {
    /// Mixed layer depth (m).
    /// Default: 60.0
    pub mixed_layer_depth: FloatValue,
    /// Diffusivity for heat transport (W m^-2 K^-1).
    /// Default: 0.3
    pub diffusivity: FloatValue,
    /// Outgoing longwave radiation at 0 °C (W m^-2).
    /// Default: 196.0
    pub olr_intercept: FloatValue,
    /// Outgoing longwave temperature dependence (W m^-2 K^-1).
    /// Default: 1.8
    pub olr_slope: FloatValue,
    /// Insolation at the equator (W m^-2).
    /// Default: 420.0
    pub insolation_equator: FloatValue,
    /// Seasonal amplitude of insolation (W m^-2).
    /// Default: 338.0
    pub insolation_seasonal: FloatValue,
    /// Spatial dependence of insolation (W m^-2).
    /// Default: 240.0
    pub insolation_spatial: FloatValue,
    /// Ice-free co-albedo at the equator.
    /// Default: 0.7
    pub coalbedo_equator: FloatValue,
    /// Spatial dependence of the ice-free co-albedo.
    /// Default: 0.1
    pub coalbedo_spatial: FloatValue,
    /// Co-albedo over sea ice.
    /// Default: 0.4
    pub coalbedo_ice: FloatValue,
    /// Heat flux from the ocean below (W m^-2).
    /// Default: 0.0
    pub ocean_heat_flux: FloatValue,
    /// Sea-ice thermal conductivity (W m^-1 K^-1).
    /// Default: 2.0
    pub ice_conductivity: FloatValue,
    /// Sea-ice latent heat of fusion (W yr m^-3).
    /// Default: 9.5
    pub ice_latent_heat: FloatValue,
    /// Ghost layer heat capacity (W yr m^-2 K^-1).
    /// Default: 0.098
    pub ghost_heat_capacity: FloatValue,
    /// Ghost layer coupling timescale (yr).
    /// Default: 1e-5
    pub ghost_timescale: FloatValue,
    /// Latent heat of vaporisation (J kg^-1).
    /// Default: 2.5e6
    pub vaporisation_latent_heat: FloatValue,
    /// Heat capacity of air at constant pressure (J kg^-1 K^-1).
    /// Default: 1004.6
    pub air_heat_capacity: FloatValue,
    /// Near-surface relative humidity.
    /// Default: 0.8
    pub relative_humidity: FloatValue,
    /// Surface pressure (Pa).
    /// Default: 1e5
    pub surface_pressure: FloatValue,
}

impl Default for MebmParameters {
    fn default() -> Self {
        Self {
            mixed_layer_depth: 60.0,
            diffusivity: 0.3,
            olr_intercept: 196.0,
            olr_slope: 1.8,
            insolation_equator: 420.0,
            insolation_seasonal: 338.0,
            insolation_spatial: 240.0,
            coalbedo_equator: 0.7,
            coalbedo_spatial: 0.1,
            coalbedo_ice: 0.4,
            ocean_heat_flux: 0.0,
            ice_conductivity: 2.0,
            ice_latent_heat: 9.5,
            ghost_heat_capacity: 0.098,
            ghost_timescale: 1e-5,
            vaporisation_latent_heat: 2.5e6,
            air_heat_capacity: 1004.6,
            relative_humidity: 0.8,
            surface_pressure: 1e5,
        }
    }
}

impl MebmParameters {
    /// Heat capacity of the mixed layer (W yr m^-2 K^-1).
    pub fn mixed_layer_heat_capacity(&self) -> FloatValue {
        SEAWATER_HEAT_CAPACITY * SEAWATER_DENSITY * self.mixed_layer_depth / SECONDS_PER_YEAR
    }
}

/// Spatial and temporal resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MebmGrid {
    /// Number of grid cells between the equator and the pole.
    /// Default: 50
    pub n: usize,
    /// Time steps per year.
    /// Default: 1000
    pub nt: usize,
    /// Number of years to integrate.
    /// Default: 30
    pub years: usize,
}

impl Default for MebmGrid {
    fn default() -> Self {
        Self {
            n: 50,
            nt: 1000,
            years: 30,
        }
    }
}

impl MebmGrid {
    pub fn dx(&self) -> FloatValue {
        1.0 / self.n as FloatValue
    }

    pub fn dt(&self) -> FloatValue {
        1.0 / self.nt as FloatValue
    }

    /// Cell centres.
    pub fn x(&self) -> Vec<FloatValue> {
        let dx = self.dx();
        (0..self.n).map(|i| dx / 2.0 + i as FloatValue * dx).collect()
    }

    /// Interior cell boundaries.
    pub fn xb(&self) -> Vec<FloatValue> {
        let dx = self.dx();
        (1..self.n).map(|i| i as FloatValue * dx).collect()
    }

    fn validate(&self) -> RSIceResult<()> {
        if self.n < 2 || self.nt == 0 || self.years == 0 {
            return Err(RSIceError::Config(format!(
                "MEBM grid needs n >= 2, nt >= 1 and years >= 1 (got n={}, nt={}, years={})",
                self.n, self.nt, self.years
            )));
        }
        Ok(())
    }
}

/// Run-time switches and forcing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MebmOptions {
    /// Radiative forcing (W m^-2)
    pub forcing: FloatValue,
    pub sea_ice_albedo: bool,
    pub sea_ice_thermodynamics: bool,
}

impl Default for MebmOptions {
    fn default() -> Self {
        Self {
            forcing: 0.0,
            sea_ice_albedo: true,
            sea_ice_thermodynamics: true,
        }
    }
}

/// Annual-mean summary of the final year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MebmDiagnostics {
    /// °C
    pub global_mean_temperature: FloatValue,
    /// Range of the annual-mean temperature profile (°C)
    pub equator_to_pole_difference: FloatValue,
    /// Top-of-atmosphere energy imbalance (W m^-2)
    pub toa_imbalance: FloatValue,
}

/// Final-year fields, each shaped `(n, nt)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MebmOutput {
    /// Fraction of the year, evenly spaced over [0, 1]
    pub time: Array1<FloatValue>,
    pub x: Array1<FloatValue>,
    /// W yr m^-2
    pub enthalpy: Array2<FloatValue>,
    /// °C
    pub surface_temperature: Array2<FloatValue>,
    /// m
    pub ice_thickness: Array2<FloatValue>,
    /// W m^-2
    pub absorbed_shortwave: Array2<FloatValue>,
    pub diagnostics: MebmDiagnostics,
}

impl MebmOutput {
    /// Final-year means of each profile as CSV, one row per grid cell.
    pub fn annual_mean_csv(&self) -> String {
        let mean = |a: &Array2<FloatValue>, i: usize| a.row(i).mean().unwrap_or(FloatValue::NAN);
        let mut csv =
            String::from("x,surface_temperature,enthalpy,ice_thickness,absorbed_shortwave\n");
        for (i, x) in self.x.iter().enumerate() {
            csv.push_str(&format!(
                "{},{},{},{},{}\n",
                x,
                mean(&self.surface_temperature, i),
                mean(&self.enthalpy, i),
                mean(&self.ice_thickness, i),
                mean(&self.absorbed_shortwave, i)
            ));
        }
        csv
    }
}

/// Initial surface temperature profile `7.5 + 20·(1 − 2x²)` (°C).
pub fn default_initial_temperature(x: &[FloatValue]) -> Vec<FloatValue> {
    x.iter().map(|x| 7.5 + 20.0 * (1.0 - 2.0 * x * x)).collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Mebm {
    parameters: MebmParameters,
}

impl Mebm {
    pub fn from_parameters(parameters: MebmParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &MebmParameters {
        &self.parameters
    }

    /// Diffusion operator $\partial_x (D (1 - x^2) \partial_x)$ with no-flux
    /// boundaries at the equator and pole.
    pub fn diffusion_operator(&self, grid: &MebmGrid) -> Tridiagonal {
        let n = grid.n;
        let dx = grid.dx();
        let lam: Vec<FloatValue> = grid
            .xb()
            .iter()
            .map(|xb| self.parameters.diffusivity / (dx * dx) * (1.0 - xb * xb))
            .collect();

        let mut sub = vec![0.0; n];
        let mut diag = vec![0.0; n];
        let mut sup = vec![0.0; n];
        for i in 0..n {
            if i > 0 {
                sub[i] = lam[i - 1];
                diag[i] -= lam[i - 1];
            }
            if i + 1 < n {
                sup[i] = lam[i];
                diag[i] -= lam[i];
            }
        }
        Tridiagonal { sub, diag, sup }
    }

    /// Seasonal insolation, shaped `(nt, n)`. Negative values are clipped to zero.
    pub fn insolation(&self, grid: &MebmGrid) -> Array2<FloatValue> {
        let p = &self.parameters;
        let x = grid.x();
        let dt = grid.dt();
        Array2::from_shape_fn((grid.nt, grid.n), |(i, j)| {
            let ty = dt / 2.0 + i as FloatValue * dt;
            let s = p.insolation_equator
                - p.insolation_spatial * x[j] * x[j]
                - p.insolation_seasonal * (2.0 * PI * ty).cos() * x[j];
            s.max(0.0)
        })
    }

    /// Integrate from `initial_temperature` (°C at each cell centre).
    pub fn run(
        &self,
        grid: &MebmGrid,
        initial_temperature: &[FloatValue],
        options: &MebmOptions,
    ) -> RSIceResult<MebmOutput> {
        grid.validate()?;
        let n = grid.n;
        let nt = grid.nt;
        if initial_temperature.len() != n {
            return Err(RSIceError::ShapeMismatch(format!(
                "initial temperature has {} values for a grid of {}",
                initial_temperature.len(),
                n
            )));
        }

        let p = &self.parameters;
        info!(
            years = grid.years,
            n,
            nt,
            forcing = options.forcing,
            "Running SCM-MEBM"
        );

        let dt = grid.dt();
        let x = grid.x();
        let cw = p.mixed_layer_heat_capacity();
        let cg = p.ghost_heat_capacity;
        let cg_tau = cg / p.ghost_timescale;
        let dt_tau = dt / p.ghost_timescale;
        let dc = dt_tau * cg_tau;
        let m = p.olr_slope + cg_tau;
        let k_lf = p.ice_conductivity * p.ice_latent_heat;
        let forcing = options.forcing;

        let diffop = self.diffusion_operator(grid);
        let kappa = Tridiagonal::identity(n).combine(1.0 + dt_tau, &diffop, -dt / cg);
        let insolation = self.insolation(grid);
        let open_water: Vec<FloatValue> = x
            .iter()
            .map(|x| p.coalbedo_equator - p.coalbedo_spatial * x * x)
            .collect();

        let mut enthalpy_out = Array2::<FloatValue>::zeros((n, nt));
        let mut temperature_out = Array2::<FloatValue>::zeros((n, nt));
        let mut asr_out = Array2::<FloatValue>::zeros((n, nt));

        let mut tg = initial_temperature.to_vec();
        let mut t = initial_temperature.to_vec();
        let mut e: Vec<FloatValue> = tg.iter().map(|t| cw * t).collect();

        let mut coalbedo = vec![0.0; n];
        let mut c = vec![0.0; n];
        let mut t0 = vec![0.0; n];

        for year in 0..grid.years {
            let last_year = year + 1 == grid.years;
            for i in 0..nt {
                let s = insolation.row(i);

                for j in 0..n {
                    coalbedo[j] = if options.sea_ice_albedo {
                        if e[j] > 0.0 {
                            open_water[j]
                        } else if e[j] < 0.0 {
                            p.coalbedo_ice
                        } else {
                            0.0
                        }
                    } else {
                        open_water[j]
                    };
                    c[j] = coalbedo[j] * s[j] + cg_tau * tg[j] - p.olr_intercept + forcing;
                    t0[j] = if options.sea_ice_thermodynamics {
                        c[j] / (m - k_lf / e[j])
                    } else {
                        e[j] / cw
                    };
                }

                if last_year {
                    for j in 0..n {
                        enthalpy_out[[j, i]] = e[j];
                        temperature_out[[j, i]] = t[j];
                        asr_out[[j, i]] = coalbedo[j] * s[j];
                    }
                }

                for j in 0..n {
                    t[j] = if e[j] >= 0.0 {
                        e[j] / cw
                    } else if t0[j] < 0.0 {
                        t0[j]
                    } else {
                        0.0
                    };
                    e[j] += dt * (c[j] - m * t[j] + p.ocean_heat_flux);
                }

                // Latent heat transport, explicit in time
                let moist: Vec<FloatValue> = tg
                    .iter()
                    .map(|&tg| {
                        p.vaporisation_latent_heat
                            * p.relative_humidity
                            * saturation_specific_humidity(tg, p.surface_pressure)
                            / p.air_heat_capacity
                    })
                    .collect();
                let latent = diffop.matvec(&moist);

                tg = if options.sea_ice_thermodynamics {
                    let mut shift = vec![0.0; n];
                    let mut rhs = vec![0.0; n];
                    for j in 0..n {
                        let frozen = t0[j] < 0.0 && e[j] < 0.0;
                        let mut source = if e[j] >= 0.0 { e[j] / cw } else { 0.0 };
                        if frozen {
                            let denom = m - k_lf / e[j];
                            shift[j] = dc / denom;
                            source += (p.coalbedo_ice * s[j] - p.olr_intercept + forcing) / denom;
                        }
                        rhs[j] = tg[j] + dt / cg * latent[j] + dt_tau * source;
                    }
                    kappa.minus_diagonal(&shift).solve(&rhs)?
                } else {
                    let rhs: Vec<FloatValue> = (0..n)
                        .map(|j| tg[j] + dt / cg * latent[j] + dt_tau * e[j] / cw)
                        .collect();
                    kappa.solve(&rhs)?
                };
            }
        }

        let ice_thickness = enthalpy_out.mapv(|e| if e < 0.0 { -e / p.ice_latent_heat } else { 0.0 });
        let diagnostics = self.diagnostics(&temperature_out, &asr_out)?;
        info!(
            global_mean_temperature = diagnostics.global_mean_temperature,
            equator_to_pole_difference = diagnostics.equator_to_pole_difference,
            toa_imbalance = diagnostics.toa_imbalance,
            "SCM-MEBM finished"
        );

        let time = if nt == 1 {
            Array1::zeros(1)
        } else {
            Array1::linspace(0.0, 1.0, nt)
        };

        Ok(MebmOutput {
            time,
            x: Array1::from_vec(x),
            enthalpy: enthalpy_out,
            surface_temperature: temperature_out,
            ice_thickness,
            absorbed_shortwave: asr_out,
            diagnostics,
        })
    }

    fn diagnostics(
        &self,
        temperature: &Array2<FloatValue>,
        asr: &Array2<FloatValue>,
    ) -> RSIceResult<MebmDiagnostics> {
        let empty = || RSIceError::Error("empty MEBM output".to_string());
        let mean_t = temperature.mean().ok_or_else(empty)?;
        let mean_asr = asr.mean().ok_or_else(empty)?;
        let profile = temperature.mean_axis(Axis(1)).ok_or_else(empty)?;
        let max = profile.iter().cloned().fold(FloatValue::NEG_INFINITY, FloatValue::max);
        let min = profile.iter().cloned().fold(FloatValue::INFINITY, FloatValue::min);

        Ok(MebmDiagnostics {
            global_mean_temperature: mean_t,
            equator_to_pole_difference: max - min,
            toa_imbalance: mean_asr
                - self.parameters.olr_intercept
                - self.parameters.olr_slope * mean_t,
        })
    }
}
