//! Application layer: the analysis container.
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                Analysis (app)                │
//! │  AnalysisConfig, cached ComparisonTable      │
//! └──────────────┬───────────────────────────────┘
//!                │ owns
//!                ▼
//! ┌──────────────────────────────────────────────┐
//! │  Infrastructure (adapters)                   │
//! │  - MsgPackRepository                         │
//! │  - InMemoryRepository (testing)              │
//! └──────────────┬───────────────────────────────┘
//!                │ implements
//!                ▼
//! ┌──────────────────────────────────────────────┐
//! │  Ports: ResultRepository,                    │
//! │  ActionValueRepository, ParticipantFactory   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ## Production
//!
//! ```no_run
//! use costometer::app::Analysis;
//! use costometer::config::AnalysisPaths;
//!
//! let analysis = Analysis::load(AnalysisPaths::new(".", "methods/static", "SoftmaxRecovery"))?;
//! let table = analysis.optimization_data()?;
//! # Ok::<(), costometer::Error>(())
//! ```
//!
//! ## Testing
//!
//! ```no_run
//! use costometer::adapters::InMemoryRepository;
//! use costometer::app::Analysis;
//! use costometer::config::AnalysisPaths;
//!
//! let analysis = Analysis::builder(AnalysisPaths::new("/tmp/irl", "methods", "Exp"))
//!     .with_result_repository(InMemoryRepository::new())
//!     .build()?;
//! # Ok::<(), costometer::Error>(())
//! ```

pub mod container;

pub use container::{Analysis, AnalysisBuilder, RESULT_PREFIX};
