//! Assembly of P1 element quantities into global matrices and vectors.
pub mod global;
pub mod load;
pub mod local;
