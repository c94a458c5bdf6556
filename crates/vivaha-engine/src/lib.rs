//! # vivaha-engine
//!
//! Deterministic marriage-timing windows from Vimshottari dashas and transits.
//!
//! The engine builds the three-level dasha tree for a birth, compresses daily
//! planetary positions into sign intervals, finds the spans where several
//! planets influence the target houses at once, and scores each candidate
//! dasha slice by that activity and by the houses its rulers signify.
//! Planetary positions and significations come from outside through the
//! [`ChartLookup`] and [`SignificatorLookup`] traits.
//!
//! ## Modules
//!
//! - [`dasha`]: birth balance and the Maha/Antar/Pratyantar period tree
//! - [`transit`]: daily samples → sign intervals with house and aspect data
//! - [`simultaneity`]: sweep-line detection of multi-planet windows
//! - [`merger`]: candidate slices × windows, double-transit detection
//! - [`scoring`]: slice scores and top-N ranking
//! - [`candidates`]: candidate rulers from the significations
//! - [`pipeline`]: the whole run for one chart
//! - [`chart`]: collaborator traits and the sign → house map
//! - [`config`]: tables and weights, loadable from TOML
//! - [`interval`]: inclusive day spans and date helpers
//! - [`planet`]: planets, signs, houses
//! - [`error`]: Error types

pub mod candidates;
pub mod chart;
pub mod config;
pub mod dasha;
pub mod error;
pub mod interval;
pub mod merger;
pub mod pipeline;
pub mod planet;
pub mod scoring;
pub mod simultaneity;
pub mod transit;

pub use candidates::select_candidate_rulers;
pub use chart::{ChartLookup, SignHouseMap, SignificatorLookup, Significators};
pub use config::PredictionConfig;
pub use dasha::{generate_dasha_tree, BirthData, DashaTree};
pub use error::VivahaError;
pub use interval::DateSpan;
pub use merger::merge_dasha_transits;
pub use pipeline::{predict, Prediction};
pub use planet::{House, Planet, Sign};
pub use scoring::{score_and_rank_slices, ScoredSlice};
pub use simultaneity::{find_simultaneity_windows, SimultaneityWindow};
pub use transit::{normalize_transits, DerivedTransit};
