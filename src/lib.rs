//! # MolMend
//!
//! **MolMend** is a pure-Rust repair engine for CTAB-formatted chemical table records — the Mol and SD file encodings used to exchange molecular structures. Drawing tools, legacy exporters, and copy-and-paste pipelines routinely emit records that break the fixed-width, fixed-line-count grammar; MolMend recognizes the common deviation classes and rewrites each record into a conforming, semantically equivalent one, a record at a time, without holding the whole file in memory.
//!
//! ## Features
//!
//! - **Streaming record repair** – [`CleanSdfReader`](io::CleanSdfReader) pulls one cleaned record per step from a string, file, or byte stream, so multi-gigabyte SD files never need to be memory-resident.
//! - **Header reconstruction** – Headers missing their blank title or comment line are disambiguated from the blank/non-blank pattern of the surviving lines and restored to the canonical four-line form.
//! - **Field realignment** – Counts, atom, and bond lines stripped of their leading whitespace get their fixed columns re-derived rather than rejected.
//! - **Sgroup validation** – Substructure-group lines are checked against the declared group registry; dangling references, invalid type codes, and over-long `CHG`/`STY`/`SAL`/`SDS` lists are dropped or re-chunked, and `SCD`/`SED` data blocks are merged and re-wrapped.
//! - **Record probing** – [`MolInfo`](io::MolInfo) reads the title, version, and bond-order tallies of a record without constructing a molecule graph.
//!
//! Cleaned text is meant to be handed to a downstream CTAB parser; MolMend
//! never validates chemistry and never builds an in-memory molecule.

mod model;

pub mod io;

pub use model::types::{CtabVersion, SgroupType};
