mod cleaner;
mod data_block;
mod info;
mod reader;

pub use info::MolInfo;
pub use reader::{clean_mol_text, clean_sdf_file, CleanSdfReader};
