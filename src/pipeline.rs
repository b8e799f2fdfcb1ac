//! Submission Pipeline - Validate Incrementally, Process Once
//!
//! The pipeline holds only the immutable registry. All per-submission state
//! lives in a caller-owned [`Submission`] passed into every call.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::archive::{build_archive, Archive, TransformedAsset};
use crate::error::{PipelineError, Result};
use crate::slots::{RequirementRule, SlotRegistry, SlotSpec};
use crate::transform::{encode, resize_and_crop, OutputFormat};
use crate::validation::{source_extension, ConformanceOutcome, RawImage, Validator};

/// One upload as received from the collaborator.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub outcome: Option<ConformanceOutcome>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotState<'a> {
    Empty,
    Uploaded,
    Validated(&'a ConformanceOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionState {
    Collecting,
    Ready,
    Processed,
}

/// Caller-owned state of one form submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    name_prefix: String,
    uploads: HashMap<String, Upload>,
    processed: bool,
}

impl Submission {
    pub fn new(name_prefix: &str) -> Self {
        Self {
            name_prefix: sanitize_name_prefix(name_prefix),
            ..Self::default()
        }
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn set_name_prefix(&mut self, name_prefix: &str) {
        self.name_prefix = sanitize_name_prefix(name_prefix);
        self.processed = false;
    }

    pub fn upload(&self, slot_id: &str) -> Option<&Upload> {
        self.uploads.get(slot_id)
    }

    /// `Empty -> Uploaded`. Replaces any earlier upload for the slot.
    pub fn attach(&mut self, slot_id: &str, bytes: Vec<u8>, filename: &str) {
        self.uploads.insert(slot_id.to_string(), Upload {
            filename: filename.to_string(),
            bytes,
            outcome: None,
        });
        self.processed = false;
    }

    pub fn detach(&mut self, slot_id: &str) -> Option<Upload> {
        let removed = self.uploads.remove(slot_id);
        if removed.is_some() {
            self.processed = false;
        }
        removed
    }

    pub fn is_present(&self, slot_id: &str) -> bool {
        self.uploads.get(slot_id).map_or(false, |u| !u.bytes.is_empty())
    }

    pub fn slot_state(&self, slot_id: &str) -> SlotState<'_> {
        match self.uploads.get(slot_id) {
            None => SlotState::Empty,
            Some(Upload { outcome: Some(outcome), .. }) => SlotState::Validated(outcome),
            Some(_) => SlotState::Uploaded,
        }
    }
}

/// Each whitespace character becomes `_`. No other filtering is applied.
pub fn sanitize_name_prefix(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect()
}

/// The submission pipeline - single entry point for uploads and processing
pub struct SubmissionPipeline {
    registry: SlotRegistry,
    validator: Validator,
}

impl SubmissionPipeline {
    pub fn new(registry: SlotRegistry) -> Self {
        let validator = Validator::new(registry.aspect_tolerance());
        Self { registry, validator }
    }

    pub fn registry(&self) -> &SlotRegistry {
        &self.registry
    }

    pub fn spec_for(&self, slot_id: &str) -> Result<&SlotSpec> {
        self.registry.spec_for(slot_id)
    }

    /// Validate raw bytes against a slot without touching any submission.
    pub fn validate_bytes(&self, slot_id: &str, bytes: &[u8], filename: &str) -> Result<ConformanceOutcome> {
        let spec = self.registry.spec_for(slot_id)?;
        let image = RawImage::decode(slot_id, bytes, filename)?;
        let outcome = self.validator.validate(&image, spec);

        for advisory in &outcome.advisories {
            warn!(slot = slot_id, kind = ?advisory.kind, "{}", advisory.message);
        }
        Ok(outcome)
    }

    /// Store an upload and validate it.
    pub fn upload(
        &self,
        submission: &mut Submission,
        slot_id: &str,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<ConformanceOutcome> {
        self.registry.spec_for(slot_id)?;
        info!(slot = slot_id, filename, bytes = bytes.len(), "upload received");

        submission.attach(slot_id, bytes, filename);
        self.validate_slot(submission, slot_id)
    }

    /// `Uploaded -> Validated`. Re-running on a validated slot recomputes the
    /// same outcome. A payload that cannot be decoded is rejected and the
    /// slot returns to `Empty`.
    pub fn validate_slot(&self, submission: &mut Submission, slot_id: &str) -> Result<ConformanceOutcome> {
        self.registry.spec_for(slot_id)?;
        let Some(upload) = submission.uploads.get_mut(slot_id) else {
            return Err(PipelineError::invalid_image(slot_id, "no upload"));
        };

        let result = if upload.bytes.is_empty() {
            Err(PipelineError::invalid_image(slot_id, "empty upload"))
        } else {
            self.validate_bytes(slot_id, &upload.bytes, &upload.filename)
        };

        match result {
            Ok(outcome) => {
                upload.outcome = Some(outcome.clone());
                Ok(outcome)
            }
            Err(e) => {
                warn!(slot = slot_id, error = %e, "upload rejected");
                submission.detach(slot_id);
                Err(e)
            }
        }
    }

    /// Return a slot to `Empty`.
    pub fn remove(&self, submission: &mut Submission, slot_id: &str) -> Result<()> {
        self.registry.spec_for(slot_id)?;
        submission.detach(slot_id);
        Ok(())
    }

    /// Re-run validation for every uploaded slot, in registry order. One
    /// slot's failure never prevents the others from being checked.
    pub fn validate_all(&self, submission: &mut Submission) -> Vec<(String, Result<ConformanceOutcome>)> {
        let mut results = vec![];

        for spec in self.registry.specs() {
            if submission.upload(&spec.id).is_none() {
                continue;
            }
            results.push((spec.id.clone(), self.validate_slot(submission, &spec.id)));
        }

        results
    }

    /// Ids of required slots with no upload, sorted, plus unmet
    /// at-least-one-of groups.
    pub fn missing_required(&self, submission: &Submission) -> (Vec<String>, Vec<Vec<String>>) {
        let mut missing = vec![];
        let mut unmet_groups = vec![];

        for rule in self.registry.requirement_rules() {
            match rule {
                RequirementRule::AllOf(ids) => {
                    missing.extend(ids.into_iter().filter(|id| !submission.is_present(id)));
                }
                RequirementRule::AtLeastOneOf(ids) => {
                    if !ids.iter().any(|id| submission.is_present(id)) {
                        unmet_groups.push(ids);
                    }
                }
            }
        }

        missing.sort();
        missing.dedup();
        (missing, unmet_groups)
    }

    pub fn state(&self, submission: &Submission) -> SubmissionState {
        let (missing, unmet_groups) = self.missing_required(submission);
        if !missing.is_empty() || !unmet_groups.is_empty() {
            SubmissionState::Collecting
        } else if submission.processed {
            SubmissionState::Processed
        } else {
            SubmissionState::Ready
        }
    }

    /// Transform every present slot and package the results.
    ///
    /// All-or-nothing: the first slot that fails to decode, transform or
    /// encode aborts the whole archive.
    pub fn process(&self, submission: &mut Submission) -> Result<Archive> {
        if submission.name_prefix.trim_matches('_').is_empty() {
            return Err(PipelineError::EmptyNamePrefix);
        }

        let (missing, unmet_groups) = self.missing_required(submission);
        if !missing.is_empty() || !unmet_groups.is_empty() {
            return Err(PipelineError::IncompleteSubmission { missing, unmet_groups });
        }

        let mut assets = vec![];
        for spec in self.registry.specs() {
            let Some(upload) = submission.uploads.get(&spec.id) else {
                continue;
            };
            assets.push(self.transform_slot(&submission.name_prefix, spec, upload)?);
        }

        let archive = build_archive(&submission.name_prefix, self.registry.name(), &assets)?;
        info!(
            archive = %archive.filename,
            assets = assets.len(),
            bytes = archive.data.len(),
            manifest_hash = %archive.manifest.manifest_hash,
            "archive built"
        );

        submission.processed = true;
        Ok(archive)
    }

    fn transform_slot(&self, name_prefix: &str, spec: &SlotSpec, upload: &Upload) -> Result<TransformedAsset> {
        let image = RawImage::decode(&spec.id, &upload.bytes, &upload.filename)?;

        let resized = resize_and_crop(&image.pixels, spec.target_width, spec.target_height)
            .map_err(|e| match e {
                PipelineError::InvalidImage { reason, .. } => PipelineError::invalid_image(&spec.id, reason),
                other => other,
            })?;

        let format = OutputFormat::from_extension(&image.source_extension);
        let encoded_bytes = encode(&resized, format).map_err(|e| PipelineError::EncodeFailed {
            slot_id: spec.id.clone(),
            reason: e.to_string(),
        })?;

        Ok(TransformedAsset {
            slot_id: spec.id.clone(),
            target_width: spec.target_width,
            target_height: spec.target_height,
            encoded_bytes,
            output_filename: output_filename(name_prefix, spec, &upload.filename),
        })
    }
}

/// `{prefix}_{slot}_{w}x{h}.{original extension}`
pub fn output_filename(name_prefix: &str, spec: &SlotSpec, source_filename: &str) -> String {
    format!(
        "{}_{}_{}x{}.{}",
        name_prefix,
        spec.id,
        spec.target_width,
        spec.target_height,
        source_extension(source_filename)
    )
}

impl Default for SubmissionPipeline {
    fn default() -> Self {
        Self::new(SlotRegistry::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_each_whitespace() {
        assert_eq!(sanitize_name_prefix("Le Bec  Fin"), "Le_Bec__Fin");
        assert_eq!(sanitize_name_prefix("Tab\tName"), "Tab_Name");
        assert_eq!(sanitize_name_prefix("Café-Nº1"), "Café-Nº1");
    }

    #[test]
    fn test_output_filename_keeps_source_extension() {
        let spec = SlotSpec::new("Chef_1", 900, 1200);
        assert_eq!(output_filename("Cafe", &spec, "portrait.JPEG"), "Cafe_Chef_1_900x1200.jpeg");
        assert_eq!(output_filename("Cafe", &spec, "portrait.png"), "Cafe_Chef_1_900x1200.png");
    }

    #[test]
    fn test_empty_submission_is_collecting() {
        let pipeline = SubmissionPipeline::default();
        let submission = Submission::new("Cafe");
        assert_eq!(pipeline.state(&submission), SubmissionState::Collecting);
        assert_eq!(submission.slot_state("Chef_1"), SlotState::Empty);
    }

    #[test]
    fn test_upload_to_unknown_slot() {
        let pipeline = SubmissionPipeline::default();
        let mut submission = Submission::new("Cafe");
        let err = pipeline.upload(&mut submission, "Dessert_1", vec![1, 2, 3], "x.png").unwrap_err();
        assert!(matches!(err, PipelineError::UnknownSlot(_)));
        assert_eq!(submission.slot_state("Dessert_1"), SlotState::Empty);
    }

    #[test]
    fn test_undecodable_upload_is_rejected() {
        let pipeline = SubmissionPipeline::default();
        let mut submission = Submission::new("Cafe");
        let result = pipeline.upload(&mut submission, "Menu_1", b"garbage".to_vec(), "menu.jpg");
        assert!(matches!(result, Err(PipelineError::InvalidImage { .. })));
        assert_eq!(submission.slot_state("Menu_1"), SlotState::Empty);
    }

    #[test]
    fn test_attach_without_validation_is_uploaded() {
        let mut submission = Submission::new("Cafe");
        submission.attach("Menu_1", vec![0xFF], "menu.jpg");
        assert_eq!(submission.slot_state("Menu_1"), SlotState::Uploaded);
        assert!(submission.detach("Menu_1").is_some());
        assert_eq!(submission.slot_state("Menu_1"), SlotState::Empty);
    }

    #[test]
    fn test_blank_prefix_rejected_at_process() {
        let pipeline = SubmissionPipeline::default();
        let mut submission = Submission::new("   ");
        assert!(matches!(pipeline.process(&mut submission), Err(PipelineError::EmptyNamePrefix)));
    }
}
