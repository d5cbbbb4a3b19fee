use crate::errors::{RSIceError, RSIceResult};
use crate::labeled::LabeledArray;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named collection of labelled arrays, the in-memory form of one NetCDF file.
///
/// Variables are addressed by name; the dataset performs no schema checks on
/// its own. Callers ask for the variable they expect and get
/// [`RSIceError::MissingVariable`] if it is not there.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDataset")]
pub struct Dataset {
    variables: BTreeMap<String, LabeledArray>,
    attrs: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct RawDataset {
    #[serde(default)]
    variables: BTreeMap<String, LabeledArray>,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

impl TryFrom<RawDataset> for Dataset {
    type Error = RSIceError;

    fn try_from(raw: RawDataset) -> RSIceResult<Self> {
        if let Some((key, variable)) = raw.variables.iter().find(|(k, v)| *k != v.name()) {
            return Err(RSIceError::ShapeMismatch(format!(
                "variable stored under '{}' is named '{}'",
                key,
                variable.name()
            )));
        }
        Ok(Self {
            variables: raw.variables,
            attrs: raw.attrs,
        })
    }
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, replacing any existing variable of the same name.
    pub fn insert(&mut self, variable: LabeledArray) {
        self.variables.insert(variable.name().to_string(), variable);
    }

    pub fn with_variable(mut self, variable: LabeledArray) -> Self {
        self.insert(variable);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn variable(&self, name: &str) -> RSIceResult<&LabeledArray> {
        self.variables
            .get(name)
            .ok_or_else(|| RSIceError::MissingVariable(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn variable_names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LabeledArray> {
        self.variables.values()
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Write the dataset as JSON so it can be reopened with the loader.
    ///
    /// JSON has no NaN or infinity, so a variable holding either is rejected
    /// rather than written as `null`.
    pub fn to_json(&self) -> RSIceResult<String> {
        if let Some(variable) = self
            .iter()
            .find(|v| v.values().iter().any(|x| !x.is_finite()))
        {
            return Err(RSIceError::Serialization(format!(
                "'{}' holds non-finite values, which JSON cannot represent",
                variable.name()
            )));
        }
        serde_json::to_string_pretty(self).map_err(|e| RSIceError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area() -> LabeledArray {
        LabeledArray::from_shape_vec("aice_monthly", ["time"], &[2], vec![1.0, 2.0]).unwrap()
    }

    #[test]
    fn variable_lookup() {
        let ds = Dataset::new()
            .with_variable(area())
            .with_attr("run_name", "b.e21");

        assert_eq!(ds.len(), 1);
        assert!(ds.contains("aice_monthly"));
        assert_eq!(ds.variable("aice_monthly").unwrap().shape(), &[2]);
        assert_eq!(ds.attr("run_name"), Some("b.e21"));
    }

    #[test]
    fn missing_variable_is_reported_by_name() {
        let ds = Dataset::new();
        match ds.variable("aice_monthly") {
            Err(RSIceError::MissingVariable(name)) => assert_eq!(name, "aice_monthly"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn insert_replaces() {
        let mut ds = Dataset::new().with_variable(area());
        ds.insert(area().map(|v| v * 2.0));
        assert_eq!(ds.len(), 1);
        assert_eq!(
            ds.variable("aice_monthly").unwrap().to_vec1().unwrap(),
            vec![2.0, 4.0]
        );
    }

    #[test]
    fn json_is_reloadable() {
        let ds = Dataset::new().with_variable(area());
        let json = ds.to_json().unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ds);
    }

    #[test]
    fn non_finite_values_are_not_written() {
        let ds = Dataset::new().with_variable(area().map(|v| if v > 1.0 { f64::NAN } else { v }));
        match ds.to_json() {
            Err(RSIceError::Serialization(reason)) => assert!(reason.contains("aice_monthly")),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn variable_key_must_match_its_name() {
        let json = Dataset::new()
            .with_variable(area())
            .to_json()
            .unwrap()
            .replacen("\"aice_monthly\": {", "\"hi\": {", 1);
        assert!(serde_json::from_str::<Dataset>(&json).is_err());
    }
}
