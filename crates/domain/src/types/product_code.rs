//! Hierarchical catalog product codes
//!
//! Codes are dash-separated, at most six segments, the first naming the
//! family: `HR-<system>-<type>-<gate>-<size>`, `HRC-<category>-<model>-<zone>`,
//! `MB-<type>-<material>-<size>`, `SP-...`, `SV-...`. The registry lists the
//! allowed values per segment; values outside it are kept but flagged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TradeflowError};

/// Maximum number of dash-separated segments, family included.
pub const MAX_SEGMENTS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentSpec {
    pub name: String,
    /// Empty means any well-formed value is known.
    #[serde(default)]
    pub allowed: Vec<String>,
}

impl SegmentSpec {
    fn new(name: &str, allowed: &[&str]) -> Self {
        Self { name: name.to_string(), allowed: allowed.iter().map(|v| (*v).to_string()).collect() }
    }

    fn knows(&self, value: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilySpec {
    pub family: String,
    pub description: String,
    pub segments: Vec<SegmentSpec>,
    /// Open families accept between one and `segments.len()` values.
    #[serde(default)]
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRegistry {
    pub families: Vec<FamilySpec>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        let open_segments = || -> Vec<SegmentSpec> {
            (1..MAX_SEGMENTS).map(|i| SegmentSpec::new(&format!("segment{i}"), &[])).collect()
        };
        Self {
            families: vec![
                FamilySpec {
                    family: "HR".into(),
                    description: "Hot runner system".into(),
                    segments: vec![
                        SegmentSpec::new("system", &["ST", "MT", "SE"]),
                        SegmentSpec::new("type", &["OP", "VG", "TP"]),
                        SegmentSpec::new("gate", &["PG", "SG", "EG", "VG"]),
                        SegmentSpec::new("size", &["S", "M", "L", "XL"]),
                    ],
                    open: false,
                },
                FamilySpec {
                    family: "HRC".into(),
                    description: "Hot runner controller".into(),
                    segments: vec![
                        SegmentSpec::new("category", &["TC", "SC", "VC"]),
                        SegmentSpec::new("model", &["A", "B", "C"]),
                        SegmentSpec::new("zone", &["02", "04", "08", "12", "16", "24", "32", "48"]),
                    ],
                    open: false,
                },
                FamilySpec {
                    family: "MB".into(),
                    description: "Mold base".into(),
                    segments: vec![
                        SegmentSpec::new("type", &["SA", "SB", "DA", "DB"]),
                        SegmentSpec::new("material", &["S50C", "P20", "NAK80", "SKD61"]),
                        SegmentSpec::new("size", &[]),
                    ],
                    open: false,
                },
                FamilySpec {
                    family: "SP".into(),
                    description: "Spare part".into(),
                    segments: open_segments(),
                    open: true,
                },
                FamilySpec {
                    family: "SV".into(),
                    description: "Service".into(),
                    segments: open_segments(),
                    open: true,
                },
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSegment {
    pub name: String,
    pub value: String,
    pub known: bool,
}

/// A parsed product code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCode {
    pub code: String,
    pub family: String,
    pub segments: Vec<CodeSegment>,
}

impl ProductCode {
    /// Segments whose value is not in the registry.
    pub fn flagged(&self) -> Vec<&CodeSegment> {
        self.segments.iter().filter(|s| !s.known).collect()
    }

    pub fn is_flagged(&self) -> bool {
        self.segments.iter().any(|s| !s.known)
    }
}

/// A code stored in the catalog registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredProductCode {
    pub code: String,
    pub family: String,
    /// Names of flagged segments at registration time.
    pub flagged_segments: Vec<String>,
    pub registered_by: String,
    pub registered_at: DateTime<Utc>,
}

impl CategoryRegistry {
    pub fn family(&self, family: &str) -> Option<&FamilySpec> {
        self.families.iter().find(|f| f.family == family)
    }

    pub fn parse(&self, code: &str) -> Result<ProductCode> {
        let code = code.trim();
        let parts: Vec<&str> = code.split('-').collect();
        if parts.len() > MAX_SEGMENTS {
            return Err(TradeflowError::validation(format!(
                "product code '{code}' has {} segments; at most {MAX_SEGMENTS} are allowed",
                parts.len()
            )));
        }
        let (family, values) = parts
            .split_first()
            .ok_or_else(|| TradeflowError::validation("product code is empty"))?;
        self.assemble(family, values)
    }

    pub fn build(&self, family: &str, values: &[&str]) -> Result<ProductCode> {
        if values.len() + 1 > MAX_SEGMENTS {
            return Err(TradeflowError::validation(format!(
                "at most {} segments may follow the family",
                MAX_SEGMENTS - 1
            )));
        }
        self.assemble(family, values)
    }

    fn assemble(&self, family: &str, values: &[&str]) -> Result<ProductCode> {
        let spec = self.family(family).ok_or_else(|| {
            TradeflowError::validation(format!("unknown product family '{family}'"))
        })?;
        let count_ok = if spec.open {
            !values.is_empty() && values.len() <= spec.segments.len()
        } else {
            values.len() == spec.segments.len()
        };
        if !count_ok {
            return Err(TradeflowError::validation(format!(
                "family {family} expects {} segments, got {}",
                spec.segments.len(),
                values.len()
            )));
        }

        let mut segments = Vec::with_capacity(values.len());
        for (segment, value) in spec.segments.iter().zip(values) {
            if !is_well_formed(value) {
                return Err(TradeflowError::validation(format!(
                    "segment {} has malformed value '{value}'",
                    segment.name
                )));
            }
            segments.push(CodeSegment {
                name: segment.name.clone(),
                value: (*value).to_string(),
                known: segment.knows(value),
            });
        }
        let mut code = family.to_string();
        for segment in &segments {
            code.push('-');
            code.push_str(&segment.value);
        }
        Ok(ProductCode { code, family: family.to_string(), segments })
    }
}

fn is_well_formed(value: &str) -> bool {
    !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'.')
}
