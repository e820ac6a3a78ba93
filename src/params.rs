//! Ordered parameter mapping used to move weights and gradients between the
//! model, the optimizer and checkpoints.
//!
//! Entries keep insertion order, which is the forward order of the layers
//! that declared them. Names take the form `<layer>.<parameter>`, for
//! example `conv1.weight` or `fc3.bias`.

use crate::error::{NetError, Result};
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Insertion-ordered map from parameter name to tensor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawParams")]
pub struct Params {
    entries: Vec<(String, ArrayD<f64>)>,
}

// Serialized form, checked for repeated names before it becomes `Params`.
#[derive(Deserialize)]
struct RawParams {
    entries: Vec<(String, ArrayD<f64>)>,
}

impl TryFrom<RawParams> for Params {
    type Error = NetError;

    fn try_from(raw: RawParams) -> Result<Self> {
        let mut params = Params::new();
        for (name, value) in raw.entries {
            if params.contains(&name) {
                return Err(NetError::ParameterMismatch(format!(
                    "duplicate parameter '{name}'"
                )));
            }
            params.entries.push((name, value));
        }
        Ok(params)
    }
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a tensor, replacing the value in place if the name already exists.
    pub fn insert(&mut self, name: impl Into<String>, value: ArrayD<f64>) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ArrayD<f64>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ArrayD<f64>> {
        self.entries
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayD<f64>)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ArrayD<f64>)> {
        self.entries.iter_mut().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of scalar values across all tensors.
    pub fn parameter_count(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).sum()
    }

    /// Check that `other` carries exactly the same names with the same
    /// shapes as `self`, in any order.
    ///
    /// `self` is the reference (the tracked parameters); `other` is the
    /// incoming mapping (gradients or replacement values).
    pub fn check_matches(&self, other: &Params, context: &str) -> Result<()> {
        if let Some(name) = other.names().find(|name| !self.contains(name)) {
            return Err(NetError::ParameterMismatch(format!(
                "{context}: unknown parameter '{name}'"
            )));
        }

        for (name, value) in self.iter() {
            match other.get(name) {
                None => {
                    return Err(NetError::ParameterMismatch(format!(
                        "{context}: missing parameter '{name}'"
                    )));
                }
                Some(incoming) if incoming.shape() != value.shape() => {
                    return Err(NetError::ParameterMismatch(format!(
                        "{context}: '{name}' has shape {:?}, expected {:?}",
                        incoming.shape(),
                        value.shape()
                    )));
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Like [`Params::check_matches`], and additionally requires the same order.
    pub fn check_aligned(&self, other: &Params, context: &str) -> Result<()> {
        self.check_matches(other, context)?;
        if !self.names().eq(other.names()) {
            return Err(NetError::ParameterMismatch(format!(
                "{context}: parameter order differs from the tracked order"
            )));
        }

        Ok(())
    }

    /// Copy of `other` with its entries rearranged into `self`'s order.
    pub fn reordered(&self, other: &Params, context: &str) -> Result<Params> {
        self.check_matches(other, context)?;
        self.names()
            .map(|name| {
                other
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
                    .ok_or_else(|| {
                        NetError::ParameterMismatch(format!("{context}: missing parameter '{name}'"))
                    })
            })
            .collect()
    }
}

impl IntoIterator for Params {
    type Item = (String, ArrayD<f64>);
    type IntoIter = std::vec::IntoIter<(String, ArrayD<f64>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl FromIterator<(String, ArrayD<f64>)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, ArrayD<f64>)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}
