mod error;
mod line_source;
mod sdf;

pub use sdf::{clean_mol_text, clean_sdf_file, CleanSdfReader};

pub use sdf::MolInfo;

pub use line_source::PushbackLineReader;

pub use error::Error;
