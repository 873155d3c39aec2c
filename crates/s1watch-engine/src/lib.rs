//! # s1watch-engine
//!
//! The signalling pipeline around the decoders in `s1watch-wire`:
//!
//! - **model**: ingest records, WAL envelopes, emitted events
//! - **spool**: the segmented write-ahead log with consumer offsets
//! - **subscriber** / **ue_context** / **correlator**: one subscriber record
//!   per real UE, reconciled across messages that each carry only some of
//!   its identifiers, plus a live per-UE context keyed by subscriber key
//! - **ruleset** / **rules**: YAML-defined single-message and two-message
//!   sequence rules evaluated against the correlated stream
//! - **sinks**: stdout and line-delimited-JSON event outputs
//! - **ingest**: the adapter seam transports feed records through
//! - **pipeline**: the batch driver tying the above together
//!
//! ## Quick start
//!
//! ```no_run
//! use s1watch_engine::pipeline::{Pipeline, PipelineConfig};
//! use s1watch_engine::ruleset::load_ruleset_from_yaml;
//! use s1watch_engine::sinks::StdoutSink;
//!
//! let mut config = PipelineConfig::default();
//! config.spool.base_dir = "spool_data".into();
//! let mut pipeline = Pipeline::new(config)?;
//! pipeline.load_ruleset(load_ruleset_from_yaml("rules.yaml".as_ref())?);
//! pipeline.add_sink(Box::new(StdoutSink::new()));
//! let emitted = pipeline.process_batch()?;
//! println!("emitted {emitted} events");
//! # Ok::<(), s1watch_engine::EngineError>(())
//! ```

pub mod correlator;
pub mod error;
pub mod ingest;
pub mod model;
pub mod pipeline;
pub mod rules;
pub mod ruleset;
pub mod sinks;
pub mod spool;
pub mod subscriber;
pub mod ue_context;

pub use error::{EngineError, Result};
pub use model::{Event, IngestAck, SignalMessage, SpoolOffset, SpoolRecord};
