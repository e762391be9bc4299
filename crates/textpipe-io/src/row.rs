//! Row shapes accepted by the CSV encoders.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// One input row: ordered fields, or fields keyed by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Row {
    Fields(Vec<String>),
    Named(BTreeMap<String, String>),
}

impl Row {
    pub fn fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Row::Fields(fields.into_iter().map(Into::into).collect())
    }

    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Row::Named(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        match self {
            Row::Fields(v) => v.len(),
            Row::Named(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Vec<String>> for Row {
    fn from(v: Vec<String>) -> Self {
        Row::Fields(v)
    }
}

impl From<Vec<&str>> for Row {
    fn from(v: Vec<&str>) -> Self {
        Row::fields(v)
    }
}

impl<const N: usize> From<[&str; N]> for Row {
    fn from(v: [&str; N]) -> Self {
        Row::fields(v)
    }
}

impl From<BTreeMap<String, String>> for Row {
    fn from(m: BTreeMap<String, String>) -> Self {
        Row::Named(m)
    }
}

impl From<HashMap<String, String>> for Row {
    fn from(m: HashMap<String, String>) -> Self {
        Row::Named(m.into_iter().collect())
    }
}

impl From<&Row> for Row {
    fn from(r: &Row) -> Self {
        r.clone()
    }
}
