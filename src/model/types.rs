use std::fmt;
use std::str::FromStr;

/// Connection-table syntax generation, read from the marker on the counts line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum CtabVersion {
    #[default]
    V2000,
    V3000,
}

impl fmt::Display for CtabVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CtabVersion::V2000 => write!(f, "V2000"),
            CtabVersion::V3000 => write!(f, "V3000"),
        }
    }
}

/// The substructure-group type codes a V2000 `M  STY` line may declare.
///
/// A declaration carrying any other code is invalid, and every later line
/// referencing its group id is discarded along with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SgroupType {
    Generic,
    Component,
    Copolymer,
    Crosslink,
    Data,
    Formulation,
    Multiple,
    Monomer,
    Sru,
    Superatom,
    AnyPolymer,
    Graft,
    Mixture,
    Mer,
    Modification,
}

impl SgroupType {
    pub fn as_code(&self) -> &'static str {
        match self {
            SgroupType::Generic => "GEN",
            SgroupType::Component => "COM",
            SgroupType::Copolymer => "COP",
            SgroupType::Crosslink => "CRO",
            SgroupType::Data => "DAT",
            SgroupType::Formulation => "FOR",
            SgroupType::Multiple => "MUL",
            SgroupType::Monomer => "MON",
            SgroupType::Sru => "SRU",
            SgroupType::Superatom => "SUP",
            SgroupType::AnyPolymer => "ANY",
            SgroupType::Graft => "GRA",
            SgroupType::Mixture => "MIX",
            SgroupType::Mer => "MER",
            SgroupType::Modification => "MOD",
        }
    }

    /// Parent-atom (`SPA`) member lines are only meaningful for multiple groups.
    pub fn allows_parent_atoms(&self) -> bool {
        matches!(self, SgroupType::Multiple)
    }
}

impl FromStr for SgroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GEN" => Ok(SgroupType::Generic),
            "COM" => Ok(SgroupType::Component),
            "COP" => Ok(SgroupType::Copolymer),
            "CRO" => Ok(SgroupType::Crosslink),
            "DAT" => Ok(SgroupType::Data),
            "FOR" => Ok(SgroupType::Formulation),
            "MUL" => Ok(SgroupType::Multiple),
            "MON" => Ok(SgroupType::Monomer),
            "SRU" => Ok(SgroupType::Sru),
            "SUP" => Ok(SgroupType::Superatom),
            "ANY" => Ok(SgroupType::AnyPolymer),
            "GRA" => Ok(SgroupType::Graft),
            "MIX" => Ok(SgroupType::Mixture),
            "MER" => Ok(SgroupType::Mer),
            "MOD" => Ok(SgroupType::Modification),
            _ => Err(format!("Invalid sgroup type code: {}", s)),
        }
    }
}

impl fmt::Display for SgroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}
