pub mod normalizer;
pub mod filename_decoder;
pub mod snapshot_reader;
pub mod symbol_registry;
pub mod load_coordinator;
pub mod daily_aggregator;
pub mod ingest_error;
pub mod ingest_pipeline;
