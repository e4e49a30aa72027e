//! Process and nuisance groupings
//!
//! Group keys are structured values over one-decimal bin labels and only turn
//! into strings when written out. All builders preserve the iteration order of
//! their inputs, and empty groups are never stored.

use indexmap::IndexMap;
use ndarray::Array2;
use std::collections::HashMap;
use std::fmt;
use templatefit_core::{Decimal1, Error, Result};

/// A helicity cross-section signal process, `helXsec_{hel}_y_{y}_qt_{qt}`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalId {
    pub helicity: String,
    pub y: Decimal1,
    pub qt: Decimal1,
}

impl SignalId {
    pub fn new(helicity: impl Into<String>, y: Decimal1, qt: Decimal1) -> Self {
        Self {
            helicity: helicity.into(),
            y,
            qt,
        }
    }
}

impl fmt::Display for SignalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "helXsec_{}_y_{}_qt_{}", self.helicity, self.y, self.qt)
    }
}

/// Key of a helicity group, `y_{y}_qt_{qt}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HelicityGroupKey {
    pub y: Decimal1,
    pub qt: Decimal1,
}

impl fmt::Display for HelicityGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "y_{}_qt_{}", self.y, self.qt)
    }
}

/// Key of a sum group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SumGroupKey {
    /// One helicity at one rapidity, summed over qt: `helXsec_{hel}_y_{y}`
    OverQt { helicity: String, y: Decimal1 },
    /// One helicity at one qt, summed over rapidity: `helXsec_{hel}_qt_{qt}`
    OverY { helicity: String, qt: Decimal1 },
}

impl fmt::Display for SumGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OverQt { helicity, y } => write!(f, "helXsec_{helicity}_y_{y}"),
            Self::OverY { helicity, qt } => write!(f, "helXsec_{helicity}_qt_{qt}"),
        }
    }
}

/// Key of a helicity-meta group, `y_{y}` or `qt_{qt}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaGroupKey {
    Y(Decimal1),
    Qt(Decimal1),
}

impl fmt::Display for MetaGroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Y(y) => write!(f, "y_{y}"),
            Self::Qt(qt) => write!(f, "qt_{qt}"),
        }
    }
}

/// Per (rapidity, qt) bin, the signal processes across helicities
pub fn build_helicity_groups(
    y: &[Decimal1],
    qt: &[Decimal1],
    helicities: &[String],
) -> IndexMap<HelicityGroupKey, Vec<SignalId>> {
    let mut groups = IndexMap::new();
    for &yv in y {
        for &qv in qt {
            let members: Vec<SignalId> = helicities
                .iter()
                .map(|hel| SignalId::new(hel.clone(), yv, qv))
                .collect();
            if members.is_empty() {
                continue;
            }
            groups.insert(HelicityGroupKey { y: yv, qt: qv }, members);
        }
    }
    groups
}

/// Groups of signal processes to be summed
///
/// The first pass adds, per (rapidity, helicity), the processes over qt; it
/// runs only when `signals` is non-empty. The second pass adds, per (qt,
/// helicity), the processes over rapidity, but only for pairs that some signal
/// actually carries. Writing an existing key replaces its members and keeps
/// its original position.
pub fn build_sum_groups(
    y: &[Decimal1],
    qt: &[Decimal1],
    helicities: &[String],
    signals: &[SignalId],
) -> IndexMap<SumGroupKey, Vec<SignalId>> {
    let mut groups = IndexMap::new();
    if !signals.is_empty() {
        for &yv in y {
            for hel in helicities {
                let members = qt
                    .iter()
                    .map(|&qv| SignalId::new(hel.clone(), yv, qv))
                    .collect();
                groups.insert(
                    SumGroupKey::OverQt {
                        helicity: hel.clone(),
                        y: yv,
                    },
                    members,
                );
            }
        }
    }
    for &qv in qt {
        for hel in helicities {
            if signals.iter().any(|s| &s.helicity == hel && s.qt == qv) {
                let members = y
                    .iter()
                    .map(|&yv| SignalId::new(hel.clone(), yv, qv))
                    .collect();
                groups.insert(
                    SumGroupKey::OverY {
                        helicity: hel.clone(),
                        qt: qv,
                    },
                    members,
                );
            }
        }
    }
    groups.retain(|_, members: &mut Vec<SignalId>| !members.is_empty());
    groups
}

/// Per rapidity (and per qt) value, the sum groups that belong to it
///
/// Rapidity groups collect the sum groups whose rendered key contains
/// `y_{y}`. Qt groups collect the sum groups summed over rapidity whose qt
/// field equals the value.
pub fn build_helicity_meta_groups(
    y: &[Decimal1],
    qt: &[Decimal1],
    sum_groups: &IndexMap<SumGroupKey, Vec<SignalId>>,
) -> IndexMap<MetaGroupKey, Vec<SumGroupKey>> {
    let mut groups = IndexMap::new();
    let rendered: Vec<(String, &SumGroupKey)> =
        sum_groups.keys().map(|k| (k.to_string(), k)).collect();

    for &yv in y {
        let key = MetaGroupKey::Y(yv);
        let needle = key.to_string();
        let members: Vec<SumGroupKey> = rendered
            .iter()
            .filter(|(text, _)| text.contains(&needle))
            .map(|(_, k)| (*k).clone())
            .collect();
        if !members.is_empty() {
            groups.insert(key, members);
        }
    }
    for &qv in qt {
        let members: Vec<SumGroupKey> = sum_groups
            .keys()
            .filter(|k| matches!(k, SumGroupKey::OverY { qt, .. } if *qt == qv))
            .cloned()
            .collect();
        if !members.is_empty() {
            groups.insert(MetaGroupKey::Qt(qv), members);
        }
    }
    groups
}

/// Positions of each group's nuisances in the global nuisance list
pub fn build_systematic_group_index(
    groups: &IndexMap<String, Vec<String>>,
    nuisances: &[String],
) -> Result<IndexGroups> {
    IndexGroups::resolve(groups, nuisances, Error::UnknownNuisance)
}

/// Named groups resolved to positions in a list of names
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndexGroups {
    /// Group names, in order
    pub names: Vec<String>,
    /// Member positions of each group
    pub members: Vec<Vec<usize>>,
}

/// On-disk shape of an index table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexLayout {
    /// `[ngroups, width]` table, every group of the same size
    Fixed(Array2<i32>),
    /// One variable-length row per group
    Ragged(Vec<Vec<i32>>),
}

impl IndexGroups {
    /// Resolve member names against `universe`
    ///
    /// A name appearing more than once in `universe` resolves to its first
    /// position. Unknown names are reported through `unknown`.
    pub fn resolve<K, M, F>(
        groups: &IndexMap<K, Vec<M>>,
        universe: &[String],
        unknown: F,
    ) -> Result<Self>
    where
        K: fmt::Display,
        M: fmt::Display,
        F: Fn(String) -> Error,
    {
        let mut positions: HashMap<&str, usize> = HashMap::with_capacity(universe.len());
        for (i, name) in universe.iter().enumerate() {
            positions.entry(name.as_str()).or_insert(i);
        }

        let mut out = Self::default();
        for (key, members) in groups {
            let idxs = members
                .iter()
                .map(|m| {
                    let name = m.to_string();
                    positions.get(name.as_str()).copied().ok_or_else(|| unknown(name))
                })
                .collect::<Result<Vec<_>>>()?;
            out.names.push(key.to_string());
            out.members.push(idxs);
        }
        Ok(out)
    }

    /// Number of groups
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no groups
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Fixed-width table when all groups have the same size, ragged rows otherwise
    ///
    /// With no groups the table is fixed with `empty_width` columns.
    pub fn layout(&self, empty_width: usize) -> Result<IndexLayout> {
        let widths: Vec<usize> = self.members.iter().map(Vec::len).collect();
        let uniform = widths.windows(2).all(|w| w[0] == w[1]);
        if !uniform {
            return Ok(IndexLayout::Ragged(self.ragged()?));
        }
        let width = widths.first().copied().unwrap_or(empty_width);
        let flat = self
            .members
            .iter()
            .flatten()
            .map(|&i| to_i32(i))
            .collect::<Result<Vec<_>>>()?;
        Ok(IndexLayout::Fixed(Array2::from_shape_vec(
            (self.len(), width),
            flat,
        )?))
    }

    /// One row of positions per group
    pub fn ragged(&self) -> Result<Vec<Vec<i32>>> {
        self.members
            .iter()
            .map(|row| row.iter().map(|&i| to_i32(i)).collect())
            .collect()
    }

    /// All positions concatenated, with the group number of each position
    pub fn flatten(&self) -> Result<(Vec<i32>, Vec<i32>)> {
        let mut idxs = Vec::new();
        let mut segments = Vec::new();
        for (g, row) in self.members.iter().enumerate() {
            for &i in row {
                idxs.push(to_i32(i)?);
                segments.push(to_i32(g)?);
            }
        }
        Ok((idxs, segments))
    }
}

fn to_i32(i: usize) -> Result<i32> {
    i32::try_from(i).map_err(|_| Error::InvalidInput(format!("index {i} does not fit in i32")))
}
