pub mod aggregator;
pub mod cache;
pub mod composer;
pub mod indicators;
pub mod normalizer;
pub mod source_chain;
