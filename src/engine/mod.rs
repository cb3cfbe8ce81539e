//! # Linkage Engine
//!
//! Composes the pieces of the crash-trip linkage pipeline behind one
//! read-mostly facade.
//!
//! ## Architecture
//!
//! The engine is composed of focused modules:
//! - `CrashStore` - crash records with id lookup
//! - `CrashIndex` - R-tree over projected crash coordinates
//! - `Checkpoint` - completed-file ledger for resumable batches
//!
//! The store and index are built once at construction and never mutated
//! afterwards; every trip is matched against the same snapshot, so
//! batches can fan out across threads without coordination.

pub mod checkpoint;
pub mod crash_store;
pub mod spatial_index;

pub use checkpoint::Checkpoint;
pub use crash_store::CrashStore;
pub use spatial_index::{CrashIndex, IndexedCrash};

use log::{info, warn};

use crate::error::{LinkError, Result};
use crate::{
    classify, matching, scoring, temporal, Classification, ClassifyConfig, Crash, MatchConfig,
    ProximityMatch, ScoreConfig, ScoredMatch, TemporalConfig, TemporalMatch, Trip,
};

/// Full output of one batch run, stage by stage.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub matches: Vec<ProximityMatch>,
    pub scored: Vec<ScoredMatch>,
    pub temporal: Vec<TemporalMatch>,
    pub classifications: Vec<Classification>,
    pub trips_processed: usize,
    pub trips_skipped: usize,
}

/// Crash set, spatial index and stage configuration bundled together.
pub struct LinkageEngine {
    crashes: CrashStore,
    index: CrashIndex,
    match_config: MatchConfig,
    score_config: ScoreConfig,
    temporal_config: TemporalConfig,
    classify_config: ClassifyConfig,
}

impl LinkageEngine {
    /// Build an engine over a crash set with default stage configuration.
    ///
    /// Fails with [`LinkError::EmptyCrashSet`] when there is nothing to
    /// index; matching against an empty index would silently produce no
    /// output for every trip.
    pub fn new(crashes: Vec<Crash>, match_config: MatchConfig) -> Result<Self> {
        if crashes.is_empty() {
            return Err(LinkError::EmptyCrashSet);
        }

        let crashes = CrashStore::from_crashes(crashes);
        let index = CrashIndex::build(&crashes);
        info!(
            "indexed {} crash(es), {} with a datetime",
            crashes.len(),
            crashes.dated_count()
        );

        Ok(LinkageEngine {
            crashes,
            index,
            match_config,
            score_config: ScoreConfig::default(),
            temporal_config: TemporalConfig::default(),
            classify_config: ClassifyConfig::default(),
        })
    }

    /// Build an engine with every stage configured explicitly.
    pub fn with_configs(
        crashes: Vec<Crash>,
        match_config: MatchConfig,
        score_config: ScoreConfig,
        temporal_config: TemporalConfig,
        classify_config: ClassifyConfig,
    ) -> Result<Self> {
        let mut engine = Self::new(crashes, match_config)?;
        engine.score_config = score_config;
        engine.temporal_config = temporal_config;
        engine.classify_config = classify_config;
        Ok(engine)
    }

    // ========================================================================
    // Pipeline Stages
    // ========================================================================

    /// Match one trip against the indexed crash set.
    pub fn match_trip(&self, trip: &Trip) -> Result<Vec<ProximityMatch>> {
        matching::match_trip(trip, &self.crashes, &self.index, &self.match_config)
    }

    /// Match a batch of trips, skipping (and counting) failed trips.
    ///
    /// A trip that cannot be matched is logged and dropped; one bad
    /// record must not abort a long batch.
    pub fn match_trips(&self, trips: &[Trip]) -> (Vec<ProximityMatch>, usize) {
        let mut matches = Vec::new();
        let mut skipped = 0usize;

        for trip in trips {
            match self.match_trip(trip) {
                Ok(mut found) => matches.append(&mut found),
                Err(err) => {
                    warn!("trip '{}' skipped: {}", trip.trip_id, err);
                    skipped += 1;
                }
            }
        }
        (matches, skipped)
    }

    /// Match a batch of trips across threads.
    ///
    /// Trips are independent and the index is immutable, so this is a
    /// drop-in replacement for [`match_trips`](Self::match_trips) with
    /// identical output order.
    #[cfg(feature = "parallel")]
    pub fn match_trips_parallel(&self, trips: &[Trip]) -> (Vec<ProximityMatch>, usize) {
        use rayon::prelude::*;

        let results: Vec<Result<Vec<ProximityMatch>>> =
            trips.par_iter().map(|trip| self.match_trip(trip)).collect();

        let mut matches = Vec::new();
        let mut skipped = 0usize;
        for (trip, result) in trips.iter().zip(results) {
            match result {
                Ok(mut found) => matches.append(&mut found),
                Err(err) => {
                    warn!("trip '{}' skipped: {}", trip.trip_id, err);
                    skipped += 1;
                }
            }
        }
        (matches, skipped)
    }

    /// Score matches against crash severity.
    pub fn score(&self, matches: &[ProximityMatch]) -> Result<Vec<ScoredMatch>> {
        scoring::score_matches(matches, &self.crashes, &self.score_config)
    }

    /// Validate scored matches against crash datetimes.
    pub fn validate(&self, scored: &[ScoredMatch]) -> Vec<TemporalMatch> {
        temporal::validate_matches(scored, &self.crashes, &self.temporal_config)
    }

    /// Classify validated matches into participant tags.
    pub fn classify(&self, matches: &[TemporalMatch], trips: &[Trip]) -> Vec<Classification> {
        classify::classify_matches(matches, trips, &self.crashes, &self.classify_config)
    }

    /// Run every stage over one batch of trips.
    pub fn process_trips(&self, trips: &[Trip]) -> Result<PipelineResult> {
        let (matches, skipped) = self.match_trips(trips);
        let scored = self.score(&matches)?;
        let temporal = self.validate(&scored);
        let classifications = self.classify(&temporal, trips);

        Ok(PipelineResult {
            trips_processed: trips.len() - skipped,
            trips_skipped: skipped,
            matches,
            scored,
            temporal,
            classifications,
        })
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The indexed crash set.
    pub fn crashes(&self) -> &CrashStore {
        &self.crashes
    }

    /// The spatial index over projected crash coordinates.
    pub fn index(&self) -> &CrashIndex {
        &self.index
    }

    /// Current matching configuration.
    pub fn match_config(&self) -> &MatchConfig {
        &self.match_config
    }

    /// Replace the matching configuration. The index is unaffected.
    pub fn set_match_config(&mut self, config: MatchConfig) {
        self.match_config = config;
    }

    /// Replace the scoring configuration.
    pub fn set_score_config(&mut self, config: ScoreConfig) {
        self.score_config = config;
    }

    /// Replace the temporal-validation configuration.
    pub fn set_temporal_config(&mut self, config: TemporalConfig) {
        self.temporal_config = config;
    }

    /// Replace the classification configuration.
    pub fn set_classify_config(&mut self, config: ClassifyConfig) {
        self.classify_config = config;
    }

    /// Engine statistics.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            crash_count: self.crashes.len(),
            dated_crash_count: self.crashes.dated_count(),
            indexed_count: self.index.len(),
        }
    }
}

/// Engine statistics for monitoring.
#[derive(Debug, Clone)]
pub struct EngineStats {
    pub crash_count: usize,
    pub dated_crash_count: usize,
    pub indexed_count: usize,
}
