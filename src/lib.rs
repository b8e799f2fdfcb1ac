//! Slot Images Core - Conformance And Packaging For Named Image Slots
//!
//! # Ground Rules
//! 1. Slot Tables Are Data
//! 2. Conformance Is Advisory
//! 3. Output Dimensions Are Exact
//! 4. Submissions Are Caller-Owned
//! 5. Archives Are All-Or-Nothing

pub mod error;
pub mod slots;
pub mod orientation;
pub mod grayscale;
pub mod validation;
pub mod transform;
pub mod hashing;
pub mod archive;
pub mod pipeline;

pub use error::{PipelineError, Result};
pub use slots::{SlotSpec, SlotTable, SlotRegistry, RequirementRule};
pub use validation::{ConformanceOutcome, Advisory, AdvisoryKind, RawImage, check_aspect};
pub use grayscale::is_grayscale;
pub use transform::{resize_and_crop, OutputFormat};
pub use archive::{Archive, ArchiveManifest, TransformedAsset};
pub use pipeline::{SubmissionPipeline, Submission, SubmissionState, SlotState};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
