pub mod decomp;
pub mod master;
