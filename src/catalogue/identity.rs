use crate::error::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Which extractor produced a catalogue.
///
/// OGC-derived and XMI-derived catalogues live side by side under distinct
/// placeholders and are never merged.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogueSource {
    Ogc,
    Xmi,
}

impl CatalogueSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogueSource::Ogc => "ogc",
            CatalogueSource::Xmi => "xmi",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "ogc" => Ok(CatalogueSource::Ogc),
            "xmi" => Ok(CatalogueSource::Xmi),
            other => Err(Error::malformed(
                "catalogue source",
                format!("unknown source '{other}' (expected ogc|xmi)"),
            )),
        }
    }

    /// Prefix shared by the table and diagram placeholders of this side.
    pub fn placeholder_prefix(&self) -> &'static str {
        match self {
            CatalogueSource::Ogc => "incl_featuretypes",
            CatalogueSource::Xmi => "incl_xmi_featuretypes",
        }
    }

    pub fn table_placeholder(&self) -> String {
        format!("{}_table", self.placeholder_prefix())
    }

    pub fn diagram_placeholder(&self) -> String {
        format!("{}_uml", self.placeholder_prefix())
    }

    /// Suffix appended to artefact stems so both sides can share a directory.
    pub fn artefact_suffix(&self) -> &'static str {
        match self {
            CatalogueSource::Ogc => "feature_types",
            CatalogueSource::Xmi => "xmi_feature_types",
        }
    }
}

impl fmt::Display for CatalogueSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper cardinality bound; `Unbounded` renders as `*`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum UpperBound {
    Bounded(u32),
    Unbounded,
}

impl UpperBound {
    /// Accepts the spellings used by UML tools and XSD: a number, `*`, `n`,
    /// `-1` or `unbounded`.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "*" | "n" | "-1" | "unbounded" | "unlimited" => Some(UpperBound::Unbounded),
            other => other.parse::<u32>().ok().map(UpperBound::Bounded),
        }
    }
}

impl fmt::Display for UpperBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpperBound::Bounded(n) => write!(f, "{n}"),
            UpperBound::Unbounded => f.write_str("*"),
        }
    }
}

impl Serialize for UpperBound {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            UpperBound::Bounded(n) => serializer.serialize_u32(*n),
            UpperBound::Unbounded => serializer.serialize_str("*"),
        }
    }
}

impl<'de> Deserialize<'de> for UpperBound {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        let parsed = match Raw::deserialize(deserializer)? {
            Raw::Number(-1) => Some(UpperBound::Unbounded),
            Raw::Number(n) => u32::try_from(n).ok().map(UpperBound::Bounded),
            Raw::Text(text) => UpperBound::parse(&text),
        };
        parsed.ok_or_else(|| serde::de::Error::custom("upper bound must be a count or '*'"))
    }
}

/// Cardinality pair attached to attributes and association ends.
///
/// Construction goes through [`Multiplicity::new`] so `lower <= upper` holds
/// whenever the upper bound is concrete; deserialization enforces the same.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawMultiplicity")]
pub struct Multiplicity {
    lower: u32,
    upper: UpperBound,
}

#[derive(Deserialize)]
struct RawMultiplicity {
    lower: u32,
    upper: UpperBound,
}

impl TryFrom<RawMultiplicity> for Multiplicity {
    type Error = Error;

    fn try_from(raw: RawMultiplicity) -> Result<Self> {
        Multiplicity::new(raw.lower, raw.upper)
    }
}

impl Default for Multiplicity {
    fn default() -> Self {
        Self::EXACTLY_ONE
    }
}

impl Multiplicity {
    pub const EXACTLY_ONE: Multiplicity = Multiplicity {
        lower: 1,
        upper: UpperBound::Bounded(1),
    };
    pub const OPTIONAL: Multiplicity = Multiplicity {
        lower: 0,
        upper: UpperBound::Bounded(1),
    };
    pub const MANY: Multiplicity = Multiplicity {
        lower: 0,
        upper: UpperBound::Unbounded,
    };

    pub fn new(lower: u32, upper: UpperBound) -> Result<Self> {
        if let UpperBound::Bounded(max) = upper {
            if lower > max {
                return Err(Error::InvalidMultiplicity(format!(
                    "lower bound {lower} exceeds upper bound {max}"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// Like [`Multiplicity::new`] but pulls the lower bound down to a
    /// concrete upper bound instead of failing.
    pub fn clamped(lower: u32, upper: UpperBound) -> Self {
        match upper {
            UpperBound::Bounded(max) if lower > max => Self { lower: max, upper },
            _ => Self { lower, upper },
        }
    }

    pub fn lower(&self) -> u32 {
        self.lower
    }

    pub fn upper(&self) -> UpperBound {
        self.upper
    }

    pub fn is_unbounded(&self) -> bool {
        self.upper == UpperBound::Unbounded
    }

    /// Build from separately declared textual bounds; a missing bound is 1.
    pub fn from_bounds(lower: Option<&str>, upper: Option<&str>) -> Result<Self> {
        let lower = match lower.map(str::trim).filter(|v| !v.is_empty()) {
            None => 1,
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                Error::InvalidMultiplicity(format!("lower bound '{raw}' is not a count"))
            })?,
        };
        let upper = match upper.map(str::trim).filter(|v| !v.is_empty()) {
            None => UpperBound::Bounded(1),
            Some(raw) => UpperBound::parse(raw).ok_or_else(|| {
                Error::InvalidMultiplicity(format!("upper bound '{raw}' is not a count or '*'"))
            })?,
        };
        Self::new(lower, upper)
    }

    /// Parse range notation such as `0..*`, `1..n`, `1` or `*`.
    pub fn parse_range(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(Self::EXACTLY_ONE);
        }
        match trimmed.split_once("..") {
            Some((lower, upper)) => Self::from_bounds(Some(lower), Some(upper)),
            None => match UpperBound::parse(trimmed) {
                Some(UpperBound::Unbounded) => Ok(Self::MANY),
                Some(UpperBound::Bounded(n)) => Self::new(n, UpperBound::Bounded(n)),
                None => Err(Error::InvalidMultiplicity(format!(
                    "'{trimmed}' is not a multiplicity"
                ))),
            },
        }
    }
}

impl fmt::Display for Multiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.lower, self.upper)
    }
}

/// Relationship flavour between two feature types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum AssociationKind {
    Association,
    Generalization,
    Aggregation,
    Composition,
}

impl AssociationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssociationKind::Association => "association",
            AssociationKind::Generalization => "generalization",
            AssociationKind::Aggregation => "aggregation",
            AssociationKind::Composition => "composition",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "association" => Some(AssociationKind::Association),
            "generalization" => Some(AssociationKind::Generalization),
            "aggregation" => Some(AssociationKind::Aggregation),
            "composition" => Some(AssociationKind::Composition),
            _ => None,
        }
    }
}

impl Serialize for AssociationKind {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssociationKind {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::from_str(&value).ok_or_else(|| {
            serde::de::Error::unknown_variant(
                &value,
                &["association", "generalization", "aggregation", "composition"],
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiplicity_defaults_to_exactly_one() {
        assert_eq!(Multiplicity::default().to_string(), "1..1");
        assert_eq!(
            Multiplicity::from_bounds(None, None).unwrap(),
            Multiplicity::EXACTLY_ONE
        );
    }

    #[test]
    fn unbounded_renders_as_star() {
        assert_eq!(Multiplicity::MANY.to_string(), "0..*");
        for spelling in ["*", "-1", "n", "unbounded"] {
            let m = Multiplicity::from_bounds(Some("0"), Some(spelling)).unwrap();
            assert!(m.is_unbounded(), "{spelling} should be unbounded");
        }
    }

    #[test]
    fn parse_range_variants() {
        assert_eq!(Multiplicity::parse_range("0..1").unwrap(), Multiplicity::OPTIONAL);
        assert_eq!(Multiplicity::parse_range("*").unwrap(), Multiplicity::MANY);
        assert_eq!(Multiplicity::parse_range("1..n").unwrap().to_string(), "1..*");
        assert_eq!(Multiplicity::parse_range("3").unwrap().to_string(), "3..3");
        assert!(Multiplicity::parse_range("many").is_err());
    }

    #[test]
    fn lower_above_upper_is_rejected() {
        assert!(Multiplicity::new(2, UpperBound::Bounded(1)).is_err());
        assert!(Multiplicity::new(5, UpperBound::Unbounded).is_ok());
        assert_eq!(
            Multiplicity::clamped(2, UpperBound::Bounded(1)),
            Multiplicity::EXACTLY_ONE
        );
    }

    #[test]
    fn multiplicity_serde_uses_star_for_unbounded() {
        let json = serde_json::to_string(&Multiplicity::MANY).unwrap();
        assert_eq!(json, r#"{"lower":0,"upper":"*"}"#);
        let back: Multiplicity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Multiplicity::MANY);

        let bounded: Multiplicity = serde_json::from_str(r#"{"lower":1,"upper":4}"#).unwrap();
        assert_eq!(bounded.to_string(), "1..4");

        let inverted = serde_json::from_str::<Multiplicity>(r#"{"lower":3,"upper":1}"#);
        assert!(inverted.is_err());
    }

    #[test]
    fn association_kind_rejects_unknown_values() {
        let kind: AssociationKind = serde_json::from_str("\"composition\"").unwrap();
        assert_eq!(kind, AssociationKind::Composition);
        assert!(serde_json::from_str::<AssociationKind>("\"dependency\"").is_err());
    }

    #[test]
    fn placeholder_names_per_source() {
        assert_eq!(CatalogueSource::Ogc.table_placeholder(), "incl_featuretypes_table");
        assert_eq!(CatalogueSource::Xmi.diagram_placeholder(), "incl_xmi_featuretypes_uml");
        assert!(CatalogueSource::parse("XMI").is_ok());
        assert!(CatalogueSource::parse("gml").is_err());
    }
}
