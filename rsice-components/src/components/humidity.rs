//! Clausius-Clapeyron saturation humidity.

use rsice_core::labeled::FloatValue;

/// Saturation vapour pressure at the reference temperature (Pa)
const ES0: FloatValue = 610.78;
/// Reference temperature (K)
const T0: FloatValue = 273.16;
/// Gas constant of water vapour (J kg^-1 K^-1)
const RV: FloatValue = 461.5;
/// Latent heat of vaporisation (J kg^-1)
const LV: FloatValue = 2.5e6;
/// Ratio of the gas constants of dry air and water vapour
const EPSILON: FloatValue = 0.622;
const CELSIUS_TO_KELVIN: FloatValue = 273.15;

/// Saturation specific humidity (kg/kg) at `temperature` (°C) and surface
/// pressure `ps` (Pa).
///
/// Uses the Clausius-Clapeyron parameters of O'Gorman and Schneider (2008):
/// $$ e_s = e_{s0} \exp\left(-\frac{L_v}{R_v}\left(\frac{1}{T} - \frac{1}{T_0}\right)\right), \quad q_s = \epsilon e_s / p_s $$
pub fn saturation_specific_humidity(temperature: FloatValue, ps: FloatValue) -> FloatValue {
    let t = temperature + CELSIUS_TO_KELVIN;
    let es = ES0 * (-(LV / RV) * (1.0 / t - 1.0 / T0)).exp();
    EPSILON * es / ps
}
