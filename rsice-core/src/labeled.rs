//! Labelled n-dimensional arrays.
//!
//! A [`LabeledArray`] is a flat `f64` buffer (an [`ndarray::ArrayD`]) together with
//! named dimensions, optional coordinate values per dimension and free-form string
//! attributes such as `units`. All selection is done by dimension name and is
//! bounds-checked, so a typo in an axis name surfaces as an error instead of a panic.
//!
//! # Examples
//!
//! ```rust
//! use rsice_core::labeled::LabeledArray;
//!
//! let area = LabeledArray::from_shape_vec(
//!     "aice_monthly",
//!     ["n_members", "time"],
//!     &[2, 3],
//!     vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
//! )
//! .unwrap();
//!
//! assert_eq!(area.len_of("time").unwrap(), 3);
//! assert_eq!(area.get(&[("n_members", 1), ("time", 0)]).unwrap(), 4.0);
//!
//! let first_member = area.isel("n_members", 0).unwrap();
//! assert_eq!(first_member.dims(), ["time"]);
//! ```

use crate::errors::{RSIceError, RSIceResult};
use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FloatValue = f64;

/// Attribute key holding the physical units of an array.
pub const UNITS_ATTR: &str = "units";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLabeledArray")]
pub struct LabeledArray {
    name: String,
    dims: Vec<String>,
    values: ArrayD<FloatValue>,
    coords: BTreeMap<String, Vec<FloatValue>>,
    attrs: BTreeMap<String, String>,
}

/// Serialised form, checked by [`LabeledArray::new`] and
/// [`LabeledArray::set_coord`] on the way in.
#[derive(Deserialize)]
struct RawLabeledArray {
    name: String,
    dims: Vec<String>,
    values: ArrayD<FloatValue>,
    #[serde(default)]
    coords: BTreeMap<String, Vec<FloatValue>>,
    #[serde(default)]
    attrs: BTreeMap<String, String>,
}

impl TryFrom<RawLabeledArray> for LabeledArray {
    type Error = RSIceError;

    fn try_from(raw: RawLabeledArray) -> RSIceResult<Self> {
        let mut array = LabeledArray::new(raw.name, raw.dims, raw.values)?;
        for (dim, values) in raw.coords {
            array.set_coord(&dim, values)?;
        }
        array.attrs = raw.attrs;
        Ok(array)
    }
}

impl LabeledArray {
    /// Wrap an existing array, naming each of its axes in order.
    pub fn new<I, S>(name: impl Into<String>, dims: I, values: ArrayD<FloatValue>) -> RSIceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != values.ndim() {
            return Err(RSIceError::ShapeMismatch(format!(
                "'{}' has {} axes but {} dimension names were given",
                name,
                values.ndim(),
                dims.len()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(RSIceError::ShapeMismatch(format!(
                    "'{}' names dimension '{}' twice",
                    name, dim
                )));
            }
        }
        Ok(Self {
            name,
            dims,
            values,
            coords: BTreeMap::new(),
            attrs: BTreeMap::new(),
        })
    }

    /// Build from a row-major buffer and an explicit shape.
    pub fn from_shape_vec<I, S>(
        name: impl Into<String>,
        dims: I,
        shape: &[usize],
        data: Vec<FloatValue>,
    ) -> RSIceResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(RSIceError::ShapeMismatch(format!(
                "'{}' has shape {:?} ({} values) but {} values were given",
                name,
                shape,
                expected,
                data.len()
            )));
        }
        let values = ArrayD::from_shape_vec(IxDyn(shape), data)
            .map_err(|e| RSIceError::ShapeMismatch(e.to_string()))?;
        Self::new(name, dims, values)
    }

    /// Attach coordinate values to a dimension.
    pub fn with_coord(mut self, dim: &str, values: Vec<FloatValue>) -> RSIceResult<Self> {
        self.set_coord(dim, values)?;
        Ok(self)
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn set_coord(&mut self, dim: &str, values: Vec<FloatValue>) -> RSIceResult<()> {
        let len = self.len_of(dim)?;
        if values.len() != len {
            return Err(RSIceError::ShapeMismatch(format!(
                "coordinate for '{}' has {} values but the dimension has length {}",
                dim,
                values.len(),
                len
            )));
        }
        self.coords.insert(dim.to_string(), values);
        Ok(())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn has_dim(&self, dim: &str) -> bool {
        self.dims.iter().any(|d| d == dim)
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    pub fn ndim(&self) -> usize {
        self.values.ndim()
    }

    pub fn values(&self) -> &ArrayD<FloatValue> {
        &self.values
    }

    pub fn into_values(self) -> ArrayD<FloatValue> {
        self.values
    }

    pub fn coord(&self, dim: &str) -> Option<&[FloatValue]> {
        self.coords.get(dim).map(Vec::as_slice)
    }

    pub fn coords(&self) -> &BTreeMap<String, Vec<FloatValue>> {
        &self.coords
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> &BTreeMap<String, String> {
        &self.attrs
    }

    /// Units attribute, if any.
    pub fn units(&self) -> Option<&str> {
        self.attr(UNITS_ATTR)
    }

    /// Resolve a dimension name to its axis.
    pub fn axis(&self, dim: &str) -> RSIceResult<Axis> {
        self.dims
            .iter()
            .position(|d| d == dim)
            .map(Axis)
            .ok_or_else(|| RSIceError::MissingDimension {
                dim: dim.to_string(),
                available: self.dims.join(", "),
            })
    }

    pub fn len_of(&self, dim: &str) -> RSIceResult<usize> {
        let axis = self.axis(dim)?;
        Ok(self.values.len_of(axis))
    }

    /// Read a single element, addressing every dimension by name.
    pub fn get(&self, index: &[(&str, usize)]) -> RSIceResult<FloatValue> {
        if index.len() != self.ndim() {
            return Err(RSIceError::ShapeMismatch(format!(
                "'{}' needs an index for each of [{}]",
                self.name,
                self.dims.join(", ")
            )));
        }
        let mut position = vec![0; self.ndim()];
        for (dim, i) in index {
            let axis = self.axis(dim)?;
            let len = self.values.len_of(axis);
            if *i >= len {
                return Err(RSIceError::IndexOutOfBounds {
                    dim: dim.to_string(),
                    index: *i,
                    len,
                });
            }
            position[axis.index()] = *i;
        }
        Ok(self.values[IxDyn(&position)])
    }

    /// Positional selection of one index, removing the dimension.
    pub fn isel(&self, dim: &str, index: usize) -> RSIceResult<LabeledArray> {
        let axis = self.axis(dim)?;
        let len = self.values.len_of(axis);
        if index >= len {
            return Err(RSIceError::IndexOutOfBounds {
                dim: dim.to_string(),
                index,
                len,
            });
        }
        let values = self.values.index_axis(axis, index).to_owned();
        Ok(self.without_dim(axis, values))
    }

    /// Positional selection of several indices, keeping the dimension.
    pub fn select(&self, dim: &str, indices: &[usize]) -> RSIceResult<LabeledArray> {
        let axis = self.axis(dim)?;
        let len = self.values.len_of(axis);
        if let Some(&bad) = indices.iter().find(|&&i| i >= len) {
            return Err(RSIceError::IndexOutOfBounds {
                dim: dim.to_string(),
                index: bad,
                len,
            });
        }
        let values = self.values.select(axis, indices);
        let mut coords = self.coords.clone();
        if let Some(coord) = coords.get_mut(dim) {
            *coord = indices.iter().map(|&i| coord[i]).collect();
        }
        Ok(LabeledArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            values,
            coords,
            attrs: self.attrs.clone(),
        })
    }

    /// Collapse a dimension with a reduction over each 1-D lane along it.
    pub fn reduce<F>(&self, dim: &str, f: F) -> RSIceResult<LabeledArray>
    where
        F: FnMut(ArrayView1<FloatValue>) -> FloatValue,
    {
        let axis = self.axis(dim)?;
        let values = self.values.map_axis(axis, f);
        Ok(self.without_dim(axis, values))
    }

    /// Elementwise transform keeping all metadata.
    pub fn map<F>(&self, f: F) -> LabeledArray
    where
        F: Fn(FloatValue) -> FloatValue,
    {
        LabeledArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            values: self.values.mapv(f),
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
        }
    }

    /// Combine with an array of identical dimensions and shape. No broadcasting.
    pub fn zip_with<F>(&self, other: &LabeledArray, f: F) -> RSIceResult<LabeledArray>
    where
        F: Fn(FloatValue, FloatValue) -> FloatValue,
    {
        if self.dims != other.dims || self.shape() != other.shape() {
            return Err(RSIceError::ShapeMismatch(format!(
                "'{}' [{}] {:?} and '{}' [{}] {:?} differ",
                self.name,
                self.dims.join(", "),
                self.shape(),
                other.name,
                other.dims.join(", "),
                other.shape()
            )));
        }
        let mut values = self.values.clone();
        values.zip_mut_with(&other.values, |a, &b| *a = f(*a, b));
        Ok(LabeledArray {
            name: self.name.clone(),
            dims: self.dims.clone(),
            values,
            coords: self.coords.clone(),
            attrs: self.attrs.clone(),
        })
    }

    /// Copy out a one-dimensional array.
    pub fn to_vec1(&self) -> RSIceResult<Vec<FloatValue>> {
        if self.ndim() != 1 {
            return Err(RSIceError::ShapeMismatch(format!(
                "'{}' has dimensions [{}], expected exactly one",
                self.name,
                self.dims.join(", ")
            )));
        }
        Ok(self.values.iter().copied().collect())
    }

    fn without_dim(&self, axis: Axis, values: ArrayD<FloatValue>) -> LabeledArray {
        let removed = &self.dims[axis.index()];
        let dims = self
            .dims
            .iter()
            .filter(|d| *d != removed)
            .cloned()
            .collect();
        let coords = self
            .coords
            .iter()
            .filter(|(d, _)| *d != removed)
            .map(|(d, c)| (d.clone(), c.clone()))
            .collect();
        LabeledArray {
            name: self.name.clone(),
            dims,
            values,
            coords,
            attrs: self.attrs.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member_time() -> LabeledArray {
        LabeledArray::from_shape_vec(
            "aice",
            ["member", "time"],
            &[2, 3],
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
        .unwrap()
        .with_coord("time", vec![2000.0, 2001.0, 2002.0])
        .unwrap()
        .with_attr(UNITS_ATTR, "m^2")
    }

    #[test]
    fn named_axis_lookup() {
        let arr = member_time();
        assert_eq!(arr.axis("time").unwrap(), Axis(1));
        assert_eq!(arr.len_of("member").unwrap(), 2);
        assert!(matches!(
            arr.axis("nmonth"),
            Err(RSIceError::MissingDimension { .. })
        ));
    }

    #[test]
    fn rejects_mismatched_shape() {
        let err = LabeledArray::from_shape_vec("x", ["a", "b"], &[2, 2], vec![1.0, 2.0, 3.0]);
        assert!(matches!(err, Err(RSIceError::ShapeMismatch(_))));

        let err = LabeledArray::from_shape_vec("x", ["a"], &[2, 2], vec![0.0; 4]);
        assert!(matches!(err, Err(RSIceError::ShapeMismatch(_))));

        let err = LabeledArray::from_shape_vec("x", ["a", "a"], &[2, 2], vec![0.0; 4]);
        assert!(matches!(err, Err(RSIceError::ShapeMismatch(_))));
    }

    #[test]
    fn get_is_bounds_checked() {
        let arr = member_time();
        assert_eq!(arr.get(&[("time", 2), ("member", 0)]).unwrap(), 3.0);
        assert!(matches!(
            arr.get(&[("member", 2), ("time", 0)]),
            Err(RSIceError::IndexOutOfBounds { len: 2, .. })
        ));
        assert!(arr.get(&[("member", 0)]).is_err());
    }

    #[test]
    fn isel_drops_dimension_and_coordinate() {
        let arr = member_time();
        let t1 = arr.isel("time", 1).unwrap();
        assert_eq!(t1.dims(), ["member"]);
        assert_eq!(t1.to_vec1().unwrap(), vec![2.0, 5.0]);
        assert!(t1.coord("time").is_none());
        assert_eq!(t1.units(), Some("m^2"));
    }

    #[test]
    fn select_keeps_dimension_and_subsets_coordinate() {
        let arr = member_time();
        let sel = arr.select("time", &[0, 2]).unwrap();
        assert_eq!(sel.shape(), &[2, 2]);
        assert_eq!(sel.coord("time").unwrap(), &[2000.0, 2002.0]);
        assert_eq!(sel.get(&[("member", 1), ("time", 1)]).unwrap(), 6.0);
        assert!(arr.select("time", &[3]).is_err());
    }

    #[test]
    fn reduce_removes_axis() {
        let arr = member_time();
        let total = arr.reduce("member", |lane| lane.sum()).unwrap();
        assert_eq!(total.dims(), ["time"]);
        assert_eq!(total.to_vec1().unwrap(), vec![5.0, 7.0, 9.0]);
        assert_eq!(total.coord("time").unwrap(), &[2000.0, 2001.0, 2002.0]);
    }

    #[test]
    fn zip_requires_identical_layout() {
        let arr = member_time();
        let doubled = arr.zip_with(&arr, |a, b| a + b).unwrap();
        assert_eq!(doubled.get(&[("member", 1), ("time", 2)]).unwrap(), 12.0);

        let other = arr.isel("member", 0).unwrap();
        assert!(arr.zip_with(&other, |a, b| a + b).is_err());
    }

    #[test]
    fn coordinate_length_is_checked() {
        let arr = member_time();
        assert!(arr.with_coord("time", vec![1.0]).is_err());
    }

    #[test]
    fn deserialising_checks_layout() {
        let arr = member_time();
        let json = serde_json::to_value(&arr).unwrap();
        let back: LabeledArray = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(back, arr);

        // Three dimension names for a 2-D buffer
        let mut extra_dim = json.clone();
        extra_dim["dims"] = serde_json::json!(["n_members", "time", "nmonth"]);
        assert!(serde_json::from_value::<LabeledArray>(extra_dim).is_err());

        let mut repeated = json.clone();
        repeated["dims"] = serde_json::json!(["time", "time"]);
        assert!(serde_json::from_value::<LabeledArray>(repeated).is_err());

        let mut short_coord = json;
        short_coord["coords"]["time"] = serde_json::json!([2000.0]);
        assert!(serde_json::from_value::<LabeledArray>(short_coord).is_err());
    }
}
