//! Request OID lists and GETBULK result normalization.
//!
//! A GETBULK response is a flat varbind list: the non-repeater values first,
//! then up to max-repetitions rounds of one value per repeating column, in
//! request order. [`normalize`] splits that list back into named scalars and
//! per-column rows keyed by the index suffix below the column OID.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::oid::Oid;
use crate::varbind::VarBind;

/// Ordered request OIDs, each with an optional display alias.
///
/// ```
/// use snmp_requester::{OidList, oid};
///
/// let mut oids = OidList::new();
/// oids.push(oid!(1, 3, 6, 1, 2, 1, 1, 3, 0), None);
/// oids.push(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2), Some("ifDescr"));
/// assert_eq!(oids.name(1), "ifDescr");
/// assert_eq!(oids.name(0), "1.3.6.1.2.1.1.3.0");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OidList {
    entries: Vec<(Oid, Option<String>)>,
}

impl OidList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `(dotted OID, alias)` pairs.
    pub fn parse<'a>(pairs: impl IntoIterator<Item = (&'a str, Option<&'a str>)>) -> Result<Self> {
        pairs
            .into_iter()
            .map(|(oid, alias)| -> Result<(Oid, Option<String>)> {
                Ok((Oid::parse(oid)?, alias.map(str::to_owned)))
            })
            .collect::<Result<Vec<_>>>()
            .map(|entries| Self { entries })
    }

    pub fn push(&mut self, oid: Oid, alias: Option<&str>) {
        self.entries.push((oid, alias.map(str::to_owned)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oids(&self) -> Vec<Oid> {
        self.entries.iter().map(|(oid, _)| oid.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Oid, Option<&str>)> {
        self.entries.iter().map(|(oid, alias)| (oid, alias.as_deref()))
    }

    pub fn alias(&self, i: usize) -> Option<&str> {
        self.entries.get(i).and_then(|(_, alias)| alias.as_deref())
    }

    /// Alias of entry `i`, or its dotted OID.
    pub fn name(&self, i: usize) -> String {
        match self.entries.get(i) {
            Some((_, Some(alias))) => alias.clone(),
            Some((oid, None)) => oid.to_string(),
            None => String::new(),
        }
    }

    /// Entries from `start` on.
    pub(crate) fn tail(&self, start: usize) -> OidList {
        Self {
            entries: self.entries.get(start..).unwrap_or_default().to_vec(),
        }
    }
}

impl From<&[Oid]> for OidList {
    fn from(oids: &[Oid]) -> Self {
        oids.iter().cloned().collect()
    }
}

impl From<Vec<Oid>> for OidList {
    fn from(oids: Vec<Oid>) -> Self {
        oids.into_iter().collect()
    }
}

impl FromIterator<Oid> for OidList {
    fn from_iter<I: IntoIterator<Item = Oid>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|oid| (oid, None)).collect(),
        }
    }
}

/// One repeating column of a bulk result.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Alias, or the dotted column OID.
    pub name: String,
    pub base: Oid,
    /// Rows keyed by the index suffix below `base`.
    pub rows: BTreeMap<Oid, VarBind>,
}

impl Column {
    fn new(name: String, base: Oid) -> Self {
        Self {
            name,
            base,
            rows: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Full OID of the highest row, where the next fetch continues.
    pub fn last_oid(&self) -> Option<&Oid> {
        self.rows.values().next_back().map(|vb| &vb.oid)
    }

    pub fn get(&self, index: &Oid) -> Option<&VarBind> {
        self.rows.get(index)
    }
}

/// Normalized GETBULK or table result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkTable {
    /// Non-repeater results in request order, named by alias or returned OID.
    pub scalars: Vec<(String, VarBind)>,
    pub columns: Vec<Column>,
}

impl BulkTable {
    pub fn scalar(&self, name: &str) -> Option<&VarBind> {
        self.scalars.iter().find(|(n, _)| n == name).map(|(_, vb)| vb)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Fold the rows of `column` into the same-named column, appending it if new.
    pub(crate) fn merge_column(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => existing.rows.extend(column.rows),
            None => self.columns.push(column),
        }
    }
}

/// Split a GETBULK response into scalars and columns.
///
/// `base` names the requested OIDs: its first `non_repeaters` entries are the
/// scalars and the rest the column prefixes. An exception value leaves its
/// column empty for the round, as does an OID outside the column prefix.
pub fn normalize(
    varbinds: Vec<VarBind>,
    base: &OidList,
    non_repeaters: usize,
    max_repetitions: u32,
) -> Result<BulkTable> {
    if varbinds.len() < non_repeaters {
        return Err(Error::ResponseShape(
            format!(
                "response holds {} varbinds, fewer than {} requested non-repeaters",
                varbinds.len(),
                non_repeaters
            )
            .into(),
        )
        .boxed());
    }

    let mut varbinds = varbinds.into_iter();
    let mut table = BulkTable::default();
    for (i, vb) in varbinds.by_ref().take(non_repeaters).enumerate() {
        let name = base.alias(i).map_or_else(|| vb.oid.to_string(), str::to_owned);
        table.scalars.push((name, vb));
    }

    let repeaters = base.tail(non_repeaters);
    let repeated: Vec<VarBind> = varbinds.collect();
    let limit = repeaters.len().saturating_mul(max_repetitions as usize);
    if repeated.len() > limit {
        return Err(Error::ResponseShape(
            format!(
                "{} repeated varbinds exceed {} columns x {} repetitions",
                repeated.len(),
                repeaters.len(),
                max_repetitions
            )
            .into(),
        )
        .boxed());
    }

    table.columns = repeaters
        .iter()
        .enumerate()
        .map(|(i, (oid, _))| Column::new(repeaters.name(i), oid.clone()))
        .collect();

    for (i, vb) in repeated.into_iter().enumerate() {
        let column = &mut table.columns[i % repeaters.len()];
        if vb.value.is_exception() {
            continue;
        }
        match vb.oid.suffix_after(&column.base) {
            Some(index) => {
                column.rows.insert(index, vb);
            }
            None => tracing::trace!(
                target: "snmp_requester::client",
                { snmp.oid = %vb.oid, snmp.column = %column.base },
                "varbind outside column, skipped"
            ),
        }
    }

    Ok(table)
}
