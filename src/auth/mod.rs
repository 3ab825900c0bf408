mod claims;
pub(crate) mod extractors;
pub mod jwt;
mod repo;
