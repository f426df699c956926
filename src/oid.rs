//! Object Identifier (OID) type.
//!
//! OIDs are stored as `SmallVec<[u32; 16]>` to avoid heap allocation for common OIDs.

use crate::error::internal::DecodeErrorKind;
use crate::error::{Error, Result};
use smallvec::SmallVec;
use std::fmt;

/// Maximum number of arcs allowed in an OID (RFC 2578 Section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// Object Identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an empty OID.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an OID from arc values.
    ///
    /// ```
    /// use snmp_requester::Oid;
    ///
    /// let oid = Oid::new([1, 3, 6, 1]);
    /// assert_eq!(oid.len(), 4);
    /// ```
    pub fn new(arcs: impl IntoIterator<Item = u32>) -> Self {
        Self {
            arcs: arcs.into_iter().collect(),
        }
    }

    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation. A single leading dot is accepted (`.1.3.6.1`).
    ///
    /// ```
    /// use snmp_requester::Oid;
    ///
    /// let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
    /// assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
    /// assert!(Oid::parse("1.3.x").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self> {
        let body = s.strip_prefix('.').unwrap_or(s);
        if body.is_empty() {
            return Ok(Self::empty());
        }
        let arcs = body
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<SmallVec<[u32; 16]>, _>>()
            .map_err(|_| Error::InvalidOid(s.into()).boxed())?;
        if arcs.len() > MAX_OID_LEN {
            return Err(Error::InvalidOid(s.into()).boxed());
        }
        Ok(Self { arcs })
    }

    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Arc-wise prefix test (`1.3.6.1.2.1.10` does not start with `1.3.6.1.2.1.1`).
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// The arcs after `prefix`, when `self` lies strictly below it.
    ///
    /// ```
    /// use snmp_requester::oid;
    ///
    /// let column = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2);
    /// let cell = oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 2, 7);
    /// assert_eq!(cell.suffix_after(&column), Some(oid!(7)));
    /// assert_eq!(column.suffix_after(&column), None);
    /// ```
    pub fn suffix_after(&self, prefix: &Oid) -> Option<Oid> {
        if self.len() > prefix.len() && self.starts_with(prefix) {
            Some(Self::from_slice(&self.arcs[prefix.len()..]))
        } else {
            None
        }
    }

    /// Append one arc.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Self { arcs }
    }

    /// BER content octets (X.690 8.19): first two arcs folded as `arc1 * 40 + arc2`,
    /// every subidentifier base-128.
    pub fn to_ber(&self) -> SmallVec<[u8; 64]> {
        let mut bytes = SmallVec::new();
        let (first, rest) = match self.arcs.as_slice() {
            [] => return bytes,
            [a] => (a.saturating_mul(40), &[][..]),
            [a, b, rest @ ..] => (a.saturating_mul(40).saturating_add(*b), rest),
        };
        push_subidentifier(&mut bytes, first);
        for &arc in rest {
            push_subidentifier(&mut bytes, arc);
        }
        bytes
    }

    /// Decode BER content octets.
    pub(crate) fn from_ber(data: &[u8]) -> std::result::Result<Self, DecodeErrorKind> {
        let mut arcs = SmallVec::new();
        let mut i = 0;
        while i < data.len() {
            let mut value: u32 = 0;
            loop {
                let byte = *data.get(i).ok_or(DecodeErrorKind::TruncatedData)?;
                i += 1;
                if value > (u32::MAX >> 7) {
                    return Err(DecodeErrorKind::IntegerOverflow);
                }
                value = (value << 7) | (byte & 0x7F) as u32;
                if byte & 0x80 == 0 {
                    break;
                }
            }
            if arcs.is_empty() {
                let first = (value / 40).min(2);
                arcs.push(first);
                arcs.push(value - first * 40);
            } else {
                arcs.push(value);
            }
            if arcs.len() > MAX_OID_LEN {
                return Err(DecodeErrorKind::OidTooLong {
                    count: arcs.len(),
                    max: MAX_OID_LEN,
                });
            }
        }
        Ok(Self { arcs })
    }
}

fn push_subidentifier(bytes: &mut SmallVec<[u8; 64]>, value: u32) {
    let groups = ((32 - value.leading_zeros()).max(1)).div_ceil(7);
    for i in (0..groups).rev() {
        let mut byte = ((value >> (i * 7)) & 0x7F) as u8;
        if i > 0 {
            byte |= 0x80;
        }
        bytes.push(byte);
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arc) in self.arcs.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self)
    }
}

impl std::str::FromStr for Oid {
    type Err = Box<Error>;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

/// Build an [`Oid`] from arc literals.
///
/// ```
/// use snmp_requester::oid;
///
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let oid = Oid::parse("1.3.6.1.2.1.1.1.0").unwrap();
        assert_eq!(oid.arcs(), &[1, 3, 6, 1, 2, 1, 1, 1, 0]);
        assert_eq!(oid.to_string(), "1.3.6.1.2.1.1.1.0");
        assert_eq!(Oid::parse(".1.3.6").unwrap(), oid!(1, 3, 6));
        assert!(Oid::parse("").unwrap().is_empty());
        assert!(Oid::parse("1..3").is_err());
    }

    #[test]
    fn test_starts_with_is_arc_wise() {
        let column = oid!(1, 3, 6, 1, 2, 1, 1);
        assert!(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0).starts_with(&column));
        assert!(!oid!(1, 3, 6, 1, 2, 1, 10).starts_with(&column));
        assert_eq!(oid!(1, 3, 6, 1, 2, 1, 10).suffix_after(&column), None);
    }

    #[test]
    fn test_ber_encoding() {
        assert_eq!(oid!(1, 3, 6, 1).to_ber().as_slice(), &[0x2B, 0x06, 0x01]);
        assert_eq!(
            oid!(1, 3, 6, 1, 4, 1, 2021).to_ber().as_slice(),
            &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x8F, 0x65]
        );
        assert_eq!(oid!(2, 999).to_ber().as_slice(), &[0x88, 0x37]);
    }

    #[test]
    fn test_ber_decoding() {
        assert_eq!(Oid::from_ber(&[0x2B, 0x06, 0x01]).unwrap(), oid!(1, 3, 6, 1));
        assert_eq!(Oid::from_ber(&[0x88, 0x37]).unwrap(), oid!(2, 999));
        assert_eq!(Oid::from_ber(&[0x8F]), Err(DecodeErrorKind::TruncatedData));
        assert!(Oid::from_ber(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_ordering_is_lexicographic_by_arc() {
        assert!(oid!(1, 3, 6, 1, 2) < oid!(1, 3, 6, 1, 10));
        assert!(oid!(1, 3, 6) < oid!(1, 3, 6, 0));
    }
}
