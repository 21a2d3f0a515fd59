//! ID-indexed item table joining feature columns and oracle label fields
//!
//! Upstream loaders hand over one record per item as a map of column name to
//! value. The builder keeps only whitelisted feature columns as model inputs
//! and stores oracle value fields apart, so an oracle's answer can never leak
//! into the features the policy and models see.

use crate::error::{OracleGateError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Stable item identifier (ordering defines dataset iteration order)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// An oracle channel: a continuous value field thresholded into a label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OracleSpec {
    /// Channel name (e.g., "PAE", "MSA")
    pub name: String,
    /// Column holding the oracle's continuous answer
    pub value_field: String,
    /// Label is positive when `value > positive_above`
    pub positive_above: f64,
}

impl OracleSpec {
    pub fn new(name: impl Into<String>, value_field: impl Into<String>, positive_above: f64) -> Self {
        Self {
            name: name.into(),
            value_field: value_field.into(),
            positive_above,
        }
    }
}

/// Label returned by an oracle query
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OracleLabel {
    pub positive: bool,
    pub value: f64,
}

/// A single row of the table
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub id: ItemId,
    /// Feature values in whitelist order
    pub features: Vec<f64>,
    /// Oracle name → raw oracle value
    oracle_values: BTreeMap<String, f64>,
}

/// Immutable ID-indexed table of items
#[derive(Debug, Clone)]
pub struct Dataset {
    feature_names: Vec<String>,
    oracles: Vec<OracleSpec>,
    items: BTreeMap<ItemId, Item>,
}

impl Dataset {
    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Feature column names in whitelist order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Number of feature columns
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Oracle channel specifications
    pub fn oracles(&self) -> &[OracleSpec] {
        &self.oracles
    }

    /// Oracle channel names in declaration order
    pub fn oracle_names(&self) -> Vec<String> {
        self.oracles.iter().map(|o| o.name.clone()).collect()
    }

    /// Item ids in id order
    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.keys()
    }

    /// Feature vector for an item
    pub fn features(&self, id: &ItemId) -> Result<&[f64]> {
        self.items
            .get(id)
            .map(|item| item.features.as_slice())
            .ok_or_else(|| OracleGateError::UnknownItem(id.to_string()))
    }

    /// Reveal an oracle's label for an item
    pub fn label(&self, id: &ItemId, oracle: &str) -> Result<OracleLabel> {
        let spec = self
            .oracles
            .iter()
            .find(|o| o.name == oracle)
            .ok_or_else(|| OracleGateError::UnknownOracle(oracle.to_string()))?;
        let item = self
            .items
            .get(id)
            .ok_or_else(|| OracleGateError::UnknownItem(id.to_string()))?;
        let value = item
            .oracle_values
            .get(&spec.name)
            .copied()
            .ok_or_else(|| OracleGateError::MissingField {
                item: id.to_string(),
                field: spec.value_field.clone(),
            })?;

        Ok(OracleLabel {
            positive: value > spec.positive_above,
            value,
        })
    }

    /// Fraction of items an oracle labels positive
    pub fn positive_rate(&self, oracle: &str) -> Result<f64> {
        let mut positives = 0usize;
        for id in self.items.keys() {
            if self.label(id, oracle)?.positive {
                positives += 1;
            }
        }
        Ok(positives as f64 / self.items.len().max(1) as f64)
    }
}

/// Builder enforcing the feature/oracle separation
#[derive(Debug)]
pub struct DatasetBuilder {
    feature_names: Vec<String>,
    oracles: Vec<OracleSpec>,
    items: BTreeMap<ItemId, Item>,
}

impl DatasetBuilder {
    /// Create a builder for the given feature whitelist and oracle channels
    pub fn new(feature_whitelist: Vec<String>, oracles: Vec<OracleSpec>) -> Self {
        Self {
            feature_names: feature_whitelist,
            oracles,
            items: BTreeMap::new(),
        }
    }

    fn check_schema(&self) -> Result<()> {
        let oracle_fields: BTreeSet<&str> =
            self.oracles.iter().map(|o| o.value_field.as_str()).collect();
        if let Some(leak) = self
            .feature_names
            .iter()
            .find(|f| oracle_fields.contains(f.as_str()))
        {
            return Err(OracleGateError::OracleFieldAsFeature(leak.clone()));
        }

        let mut seen = BTreeSet::new();
        for oracle in &self.oracles {
            if !seen.insert(oracle.name.as_str()) {
                return Err(OracleGateError::DuplicateOracle(oracle.name.clone()));
            }
        }

        Ok(())
    }

    /// Add one record; `fields` maps column names to values
    ///
    /// Columns outside the whitelist and the oracle fields are ignored.
    pub fn add_record(
        &mut self,
        id: impl Into<ItemId>,
        fields: &BTreeMap<String, f64>,
    ) -> Result<&mut Self> {
        self.check_schema()?;
        let id = id.into();

        if self.items.contains_key(&id) {
            return Err(OracleGateError::DuplicateItem(id.to_string()));
        }

        let lookup = |field: &str| -> Result<f64> {
            let value = fields
                .get(field)
                .copied()
                .ok_or_else(|| OracleGateError::MissingField {
                    item: id.to_string(),
                    field: field.to_string(),
                })?;
            if !value.is_finite() {
                return Err(OracleGateError::NonFiniteValue {
                    item: id.to_string(),
                    field: field.to_string(),
                });
            }
            Ok(value)
        };

        let features = self
            .feature_names
            .iter()
            .map(|name| lookup(name))
            .collect::<Result<Vec<f64>>>()?;

        let mut oracle_values = BTreeMap::new();
        for oracle in &self.oracles {
            oracle_values.insert(oracle.name.clone(), lookup(&oracle.value_field)?);
        }

        self.items.insert(
            id.clone(),
            Item {
                id,
                features,
                oracle_values,
            },
        );

        Ok(self)
    }

    /// Finish building
    pub fn build(self) -> Result<Dataset> {
        self.check_schema()?;
        if self.items.is_empty() {
            return Err(OracleGateError::EmptyDataset);
        }

        Ok(Dataset {
            feature_names: self.feature_names,
            oracles: self.oracles,
            items: self.items,
        })
    }
}
