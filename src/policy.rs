use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::Error;
use crate::Result;

/// How the indexer treats records it can place but that are internally inconsistent
///
/// This covers mapped records without an alignment position and records whose
/// alignment reaches past the largest indexable coordinate. Decoding failures
/// and ordering violations are fatal under every stringency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationStringency {
    /// Fail on the first inconsistent record
    #[default]
    Strict,
    /// Log a warning and index the record as placed-unmapped
    Lenient,
    /// Index the record as placed-unmapped without logging
    Silent,
}
impl ValidationStringency {
    /// Applies the stringency to an inconsistency found in `record`
    ///
    /// Returns `Ok(())` when the record should be indexed as placed-unmapped, or
    /// the error itself under [`ValidationStringency::Strict`].
    ///
    /// # Arguments
    /// * `record` - 1-based number of the record in the stream
    /// * `error` - The inconsistency
    pub fn handle(self, record: u64, error: Error) -> Result<()> {
        match self {
            Self::Strict => Err(error),
            Self::Lenient => {
                warn!("Record {record}: {error}; indexing it as unmapped");
                Ok(())
            }
            Self::Silent => Ok(()),
        }
    }
}
impl FromStr for ValidationStringency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "STRICT" => Ok(Self::Strict),
            "LENIENT" => Ok(Self::Lenient),
            "SILENT" => Ok(Self::Silent),
            _ => Err(format!(
                "unknown validation stringency '{s}' (expected STRICT, LENIENT or SILENT)"
            )),
        }
    }
}
impl fmt::Display for ValidationStringency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strict => write!(f, "STRICT"),
            Self::Lenient => write!(f, "LENIENT"),
            Self::Silent => write!(f, "SILENT"),
        }
    }
}
