pub mod repo;
pub mod vector;
pub mod xlsx;
