//! # code-gloss
//!
//! Annotate existing source code with machine-generated inline
//! documentation. code-gloss segments a source file into function-level
//! units, sends each unit to an external completion oracle together with
//! context, and safely splices the oracle's output back — accepting only
//! pure-insertion edits so the tool can never silently change what the
//! code does.
//!
//! ## Pipeline
//!
//! ```text
//! raw text ──▶ boundaries ──▶ segments ──▶ (prompt ▶ oracle ▶ merge) ──▶ annotated text
//!              boundary       segment        prompt  oracle  merge        driver
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GPT_API_KEY=...
//! gloss annotate code.py            # writes code.py.new
//! gloss annotate < code.py > out.py # stdin/stdout mode
//! gloss segments code.py            # show segmentation, no oracle calls
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`boundary`] | Function-boundary detection with literal tracking |
//! | [`segment`] | Boundary-driven source segmentation |
//! | [`prompt`] | Oracle prompt construction (growing / fixed-example) |
//! | [`oracle`] | Completion-oracle trait and HTTP client |
//! | [`merge`] | Insertion-only safety merge |
//! | [`driver`] | Sequential run driver with retry and cancellation |
//! | [`progress`] | Stderr progress reporting |

pub mod annotate_cmd;
pub mod boundary;
pub mod config;
pub mod driver;
pub mod inspect;
pub mod merge;
pub mod models;
pub mod oracle;
pub mod progress;
pub mod prompt;
pub mod segment;
