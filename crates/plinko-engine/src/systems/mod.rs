pub mod bucket;
pub mod growth;
pub mod scoring;
