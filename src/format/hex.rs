//! Hexadecimal rendering and dumps for diagnostics.

use std::fmt;

/// Encode bytes as lowercase hex string.
///
/// ```
/// use snmp_requester::format::hex::encode;
///
/// assert_eq!(encode(&[0x00, 0xff]), "00ff");
/// ```
pub fn encode(bytes: &[u8]) -> String {
    Bytes(bytes).to_string()
}

/// Lazy hex formatter; only formats when actually displayed.
pub struct Bytes<'a>(pub &'a [u8]);

impl fmt::Display for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Bytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Classic offset / hex / ASCII dump, 16 bytes per line.
pub struct Dump<'a>(pub &'a [u8]);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (line, chunk) in self.0.chunks(16).enumerate() {
            write!(f, "{:04x}  ", line * 16)?;
            for i in 0..16 {
                match chunk.get(i) {
                    Some(b) => write!(f, "{:02x} ", b)?,
                    None => f.write_str("   ")?,
                }
            }
            f.write_str(" ")?;
            for &b in chunk {
                let c = if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' };
                write!(f, "{}", c)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
