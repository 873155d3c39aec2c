//! The pipeline driver: spool records in, events out.
//!
//! Runs on one thread. Each batch walks every partition: load the consumer
//! offset, read new records, decode and normalise, correlate, evaluate
//! rules, hand events to the sinks, commit the offset. Per-record failures
//! are logged with their (partition, offset) and skipped; a partition read
//! failure abandons that partition's batch and the next partition is tried.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{error, info, warn};
use serde_json::Value;

use s1watch_wire::canonical::{CanonicalMessage, decode_to_canonical};

use crate::correlator::{Correlator, CorrelatorConfig};
use crate::error::Result;
use crate::model::{Event, SpoolRecord};
use crate::rules::RuleEngine;
use crate::ruleset::Ruleset;
use crate::sinks::Sink;
use crate::spool::{Spool, SpoolConfig};

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub spool: SpoolConfig,
    pub consumer_group: String,
    pub context_expiry: Duration,
    /// Records pulled per partition per batch.
    pub batch_size: usize,
    /// Idle poll interval in continuous mode.
    pub poll_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            spool: SpoolConfig::default(),
            consumer_group: "processor".to_string(),
            context_expiry: Duration::from_secs(300),
            batch_size: 1000,
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// The batch-pull processing pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    spool: Arc<Spool>,
    correlator: Arc<Correlator>,
    rule_engine: RuleEngine,
    sinks: Vec<Box<dyn Sink>>,
    emit_failures: u64,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let spool = Arc::new(Spool::new(config.spool.clone())?);
        Self::with_spool(config, spool)
    }

    /// Build a pipeline over an existing spool handle (shared with an
    /// in-process ingest adapter).
    pub fn with_spool(config: PipelineConfig, spool: Arc<Spool>) -> Result<Self> {
        let correlator = Arc::new(Correlator::new(CorrelatorConfig {
            context_expiry: config.context_expiry,
        }));
        let rule_engine = RuleEngine::new(Arc::clone(&correlator));
        Ok(Pipeline {
            config,
            spool,
            correlator,
            rule_engine,
            sinks: Vec::new(),
            emit_failures: 0,
        })
    }

    pub fn load_ruleset(&mut self, ruleset: Ruleset) {
        self.rule_engine.load_ruleset(ruleset);
    }

    pub fn add_sink(&mut self, sink: Box<dyn Sink>) {
        self.sinks.push(sink);
    }

    pub fn spool(&self) -> Arc<Spool> {
        Arc::clone(&self.spool)
    }

    pub fn correlator(&self) -> Arc<Correlator> {
        Arc::clone(&self.correlator)
    }

    /// Count of sink emit failures since startup.
    pub fn emit_failures(&self) -> u64 {
        self.emit_failures
    }

    /// Normalise one spool record into a canonical message.
    pub fn decode_and_normalize(&self, record: &SpoolRecord) -> CanonicalMessage {
        let mut canonical = decode_to_canonical(&record.message.raw_bytes);
        canonical.spool_partition = record.partition;
        canonical.spool_offset = record.offset;
        canonical.frame_number = frame_number_from_meta(&record.message.transport_meta);
        canonical
    }

    /// Evaluate one canonical message.
    pub fn process_message(&mut self, canonical: &CanonicalMessage) -> Vec<Event> {
        self.rule_engine.process(canonical)
    }

    /// Pull and process one batch from every partition.
    ///
    /// Returns the number of events emitted. The committed offset advances
    /// to the last successfully processed record of the batch, so a record
    /// that fails mid-batch is skipped rather than retried once a later
    /// record succeeds.
    pub fn process_batch(&mut self) -> Result<usize> {
        let mut events_emitted = 0usize;

        for partition in 0..self.config.spool.num_partitions {
            let committed = self.spool.load_offset(&self.config.consumer_group, partition);
            let start = committed.map_or(0, |offset| offset + 1);

            let high_water = match self.spool.high_water_mark(partition) {
                Ok(high) => high,
                Err(e) => {
                    error!("pipeline: high-water check failed for partition {partition}: {e}");
                    continue;
                }
            };
            if high_water.is_none_or(|high| start > high) {
                continue;
            }

            let records = match self.spool.read(partition, start, self.config.batch_size) {
                Ok(records) => records,
                Err(e) => {
                    error!("pipeline: read failed for partition {partition}: {e}");
                    continue;
                }
            };

            let mut last_processed = None;
            for record in &records {
                let canonical = self.decode_and_normalize(record);
                if canonical.decode_failed {
                    warn!(
                        "pipeline: decode failed at p={} offset={}, raw bytes kept",
                        record.partition, record.offset
                    );
                }
                let events = self.process_message(&canonical);
                events_emitted += events.len();
                for event in &events {
                    for sink in &mut self.sinks {
                        if let Err(e) = sink.emit(event) {
                            self.emit_failures += 1;
                            warn!(
                                "pipeline: sink emit failed for {} at p={} offset={}: {e}",
                                event.name, record.partition, record.offset
                            );
                        }
                    }
                }
                last_processed = Some(record.offset);
            }

            if let Some(last) = last_processed {
                self.spool
                    .commit_offset(&self.config.consumer_group, partition, last)?;
            }
        }

        self.correlator.cleanup_expired();
        self.rule_engine.cleanup_expired_sequences();

        Ok(events_emitted)
    }

    /// Run until `running` is cleared, polling between empty batches.
    pub fn run_continuous(&mut self, running: &AtomicBool) {
        info!("pipeline: running (poll {}ms)", self.config.poll_interval.as_millis());
        while running.load(Ordering::SeqCst) {
            match self.process_batch() {
                Ok(count) if count > 0 => info!("pipeline: emitted {count} event(s)"),
                Ok(_) => {}
                Err(e) => error!("pipeline: batch failed: {e}"),
            }
            std::thread::sleep(self.config.poll_interval);
        }
        self.shutdown();
    }

    /// Flush sinks and spool segments.
    pub fn shutdown(&mut self) {
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                warn!("pipeline: sink flush failed: {e}");
            }
        }
        if let Err(e) = self.spool.flush() {
            warn!("pipeline: spool flush failed: {e}");
        }
        info!("pipeline: shut down");
    }

    /// Dump the UE table.
    pub fn dump_ue_records(&self, out: &mut impl std::io::Write) -> std::io::Result<()> {
        self.correlator.dump_ue_records(out)
    }
}

/// Pull `"packet_num"` out of a transport-meta JSON string.
fn frame_number_from_meta(transport_meta: &str) -> Option<i64> {
    if transport_meta.is_empty() {
        return None;
    }
    let meta: Value = serde_json::from_str(transport_meta).ok()?;
    meta.get("packet_num")?.as_i64()
}
