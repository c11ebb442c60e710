//! # testgap-rs: Test Gap Agent for Python Projects
//!
//! Finds Python functions that have no correspondingly named pytest test,
//! asks a locally hosted language model (Ollama) to write the missing tests,
//! merges them into the module's test file, re-runs pytest with a bounded
//! repair loop and renders a Markdown run report.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     API Layer (TestAgent)                    │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Core          │  Detectors   │  Oracle      │  I/O          │
//! │                │              │              │               │
//! │ • Config       │ • Scanner    │ • Prompts    │ • Test writer │
//! │ • Errors       │ • Gaps       │ • Ollama     │ • Reports     │
//! │ • Validation   │              │ • Synthesis  │               │
//! │ • Run report   │  Lang: Python│  Runner:     │               │
//! │                │              │  pytest      │               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use testgap_rs::{TestAgent, TestgapConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = TestgapConfig::default();
//!     config.project.root = "./demos/calculator".into();
//!
//!     let agent = TestAgent::new(config)?;
//!     let summary = agent.analyze_project().await?;
//!
//!     println!("Report written to {}", summary.report_file.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core configuration, errors and the run data model
pub mod core {
    //! Configuration, errors, file utilities and the validation loop.

    pub mod config;
    pub mod errors;
    pub mod file_utils;
    pub mod run_report;
    pub mod validation;
}

// Source scanning and gap detection
pub mod detectors {
    //! Project scanning and coverage gap detection.

    pub mod gaps;
    pub mod scanner;
}

// Language-specific extraction
pub mod lang {
    //! Language-specific function extraction.

    pub mod python;
}

// Test file merging and reporting
pub mod io {
    //! Test file rewriting and Markdown report generation.

    pub mod reports;
    pub mod test_writer;
}

// Language model integration
pub mod oracle;

// pytest integration
pub mod runner;

// Public API and engine interface
pub mod api {
    //! High-level agent interface.

    pub mod engine;
}

pub mod arithmetic;

// Re-export primary types for convenience
pub use api::engine::{AgentRunSummary, ProgressCallback, ScanSummary, TestAgent};
pub use core::config::TestgapConfig;
pub use core::errors::{Result, ResultExt, TestgapError};
pub use core::run_report::{RunReport, StageOutcome};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
