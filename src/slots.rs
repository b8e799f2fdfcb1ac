//! Slot Registry - Named Image Positions As Data
//!
//! A slot table is the whole contract for one form variant: geometry per slot,
//! the aspect tolerance, and the declarative required policy.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{PipelineError, Result};

pub type SlotId = String;

pub const DEFAULT_ASPECT_TOLERANCE: f64 = 0.2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSpec {
    pub id: SlotId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub target_width: u32,
    pub target_height: u32,
    #[serde(default)]
    pub grayscale_required: bool,
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool { true }

fn default_tolerance() -> f64 { DEFAULT_ASPECT_TOLERANCE }

impl SlotSpec {
    pub fn new(id: &str, target_width: u32, target_height: u32) -> Self {
        Self {
            id: id.to_string(),
            label: String::new(),
            description: String::new(),
            target_width,
            target_height,
            grayscale_required: false,
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn grayscale(mut self) -> Self {
        self.grayscale_required = true;
        self
    }

    pub fn labelled(mut self, label: &str, description: &str) -> Self {
        self.label = label.to_string();
        self.description = description.to_string();
        self
    }

    /// Always derived from the target dimensions.
    pub fn target_ratio(&self) -> f64 {
        self.target_width as f64 / self.target_height as f64
    }
}

/// Declarative required-slot constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "slots")]
pub enum RequirementRule {
    AllOf(Vec<SlotId>),
    AtLeastOneOf(Vec<SlotId>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotTable {
    pub name: String,
    #[serde(default = "default_tolerance")]
    pub aspect_tolerance: f64,
    pub slots: Vec<SlotSpec>,
    #[serde(default)]
    pub rules: Vec<RequirementRule>,
}

impl SlotTable {
    /// Layout with Chef_1 required, the other chefs optional, and an
    /// at-least-one-chef group. 20% aspect tolerance.
    pub fn restaurant_v1() -> Self {
        let vertical = |id: &str| SlotSpec::new(id, 900, 1200);
        let square = |id: &str| SlotSpec::new(id, 1080, 1080);
        let banner = |id: &str| SlotSpec::new(id, 1920, 1080);

        Self {
            name: "restaurant-v1".to_string(),
            aspect_tolerance: 0.2,
            slots: vec![
                banner("Hero_Image_Desktop")
                    .labelled("Main Desktop Banner Image (Horizontal)", "Horizontal image, about 16:9."),
                SlotSpec::new("Hero_Image_Mobile", 1080, 680)
                    .labelled("Main Mobile Banner Image (Horizontal)", "Horizontal image, about 1.588:1."),
                vertical("Concept_1").labelled("First Concept Image (Vertical)", "Vertical image, about 3:4."),
                square("Concept_2").labelled("Second Concept Image (Square)", "Square image, 1:1."),
                vertical("Concept_3").labelled("Third Concept Image (Vertical)", "Vertical image, about 3:4."),
                vertical("Cuisine_1").labelled("First Cuisine Image (Vertical)", "Vertical image, about 3:4."),
                square("Cuisine_2").labelled("Second Cuisine Image (Square)", "Square image, 1:1."),
                vertical("Chef_1").grayscale()
                    .labelled("First Chef Image (Vertical + Black&White)", "Vertical image, about 3:4."),
                vertical("Chef_2").grayscale().optional()
                    .labelled("Second Chef Image (Vertical + Black&White)", "Vertical image, about 3:4."),
                vertical("Chef_3").grayscale().optional()
                    .labelled("Third Chef Image (Vertical + Black&White)", "Vertical image, about 3:4."),
                banner("Menu_1").labelled("Menu Image (Horizontal)", "Horizontal image, about 16:9."),
            ],
            rules: vec![RequirementRule::AtLeastOneOf(vec![
                "Chef_1".to_string(),
                "Chef_2".to_string(),
                "Chef_3".to_string(),
            ])],
        }
    }

    /// Layout with 4:5 verticals, every chef slot required, 30% aspect tolerance.
    ///
    /// These dimensions are provisional: the two restaurant layouts have not been
    /// reconciled by product yet, so `restaurant-v1` stays the default.
    pub fn restaurant_v2() -> Self {
        let vertical = |id: &str| SlotSpec::new(id, 1080, 1350);
        let square = |id: &str| SlotSpec::new(id, 1080, 1080);
        let banner = |id: &str| SlotSpec::new(id, 1920, 1080);

        Self {
            name: "restaurant-v2".to_string(),
            aspect_tolerance: 0.3,
            slots: vec![
                banner("Hero_Image_Desktop")
                    .labelled("Main Desktop Banner Image (Horizontal)", "Horizontal image, about 16:9."),
                vertical("Hero_Image_Mobile")
                    .labelled("Main Mobile Banner Image (Vertical)", "Vertical image, about 4:5."),
                vertical("Concept_1").labelled("First Concept Image (Vertical)", "Vertical image, about 4:5."),
                square("Concept_2").labelled("Second Concept Image (Square)", "Square image, 1:1."),
                vertical("Concept_3").labelled("Third Concept Image (Vertical)", "Vertical image, about 4:5."),
                vertical("Cuisine_1").labelled("First Cuisine Image (Vertical)", "Vertical image, about 4:5."),
                square("Cuisine_2").labelled("Second Cuisine Image (Square)", "Square image, 1:1."),
                vertical("Chef_1").grayscale()
                    .labelled("First Chef Image (Vertical + Black&White)", "Vertical image, about 4:5."),
                vertical("Chef_2").grayscale()
                    .labelled("Second Chef Image (Vertical + Black&White)", "Vertical image, about 4:5."),
                vertical("Chef_3").grayscale()
                    .labelled("Third Chef Image (Vertical + Black&White)", "Vertical image, about 4:5."),
                banner("Menu_1").labelled("Menu Image (Horizontal)", "Horizontal image, about 16:9."),
            ],
            rules: vec![],
        }
    }

    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "restaurant-v1" => Some(Self::restaurant_v1()),
            "restaurant-v2" => Some(Self::restaurant_v2()),
            _ => None,
        }
    }

    pub fn builtin_names() -> &'static [&'static str] {
        &["restaurant-v1", "restaurant-v2"]
    }
}

/// Immutable registry built from one slot table.
#[derive(Debug, Clone)]
pub struct SlotRegistry {
    table: SlotTable,
}

impl SlotRegistry {
    pub fn new(table: SlotTable) -> Result<Self> {
        check_table(&table)?;
        Ok(Self { table })
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let table: SlotTable = serde_json::from_str(&content)?;
        Self::new(table)
    }

    /// Built-in table name, or a path to a JSON table.
    pub fn resolve(name_or_path: &str) -> Result<Self> {
        match SlotTable::builtin(name_or_path) {
            Some(table) => Self::new(table),
            None => Self::load_from_file(Path::new(name_or_path)),
        }
    }

    pub fn spec_for(&self, slot_id: &str) -> Result<&SlotSpec> {
        self.table.slots.iter()
            .find(|s| s.id == slot_id)
            .ok_or_else(|| PipelineError::UnknownSlot(slot_id.to_string()))
    }

    /// Slots in table order.
    pub fn specs(&self) -> &[SlotSpec] {
        &self.table.slots
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    pub fn aspect_tolerance(&self) -> f64 {
        self.table.aspect_tolerance
    }

    /// Every constraint in force: one `AllOf` for the slots flagged required,
    /// followed by the table's explicit rules.
    pub fn requirement_rules(&self) -> Vec<RequirementRule> {
        let required: Vec<SlotId> = self.table.slots.iter()
            .filter(|s| s.required)
            .map(|s| s.id.clone())
            .collect();

        let mut rules = vec![];
        if !required.is_empty() {
            rules.push(RequirementRule::AllOf(required));
        }
        rules.extend(self.table.rules.iter().cloned());
        rules
    }
}

impl Default for SlotRegistry {
    fn default() -> Self {
        Self { table: SlotTable::restaurant_v1() }
    }
}

fn check_table(table: &SlotTable) -> Result<()> {
    let invalid = |msg: String| -> Result<()> {
        Err(PipelineError::InvalidSlotTable(format!("{}: {}", table.name, msg)))
    };

    if !(table.aspect_tolerance >= 0.0 && table.aspect_tolerance.is_finite()) {
        return invalid(format!("aspect tolerance {} must be a non-negative number", table.aspect_tolerance));
    }

    let mut seen = HashSet::new();
    for slot in &table.slots {
        if slot.target_width == 0 || slot.target_height == 0 {
            return invalid(format!("slot {} has a zero target dimension", slot.id));
        }
        if !seen.insert(slot.id.as_str()) {
            return invalid(format!("duplicate slot id {}", slot.id));
        }
    }

    for rule in &table.rules {
        let ids = match rule {
            RequirementRule::AllOf(ids) | RequirementRule::AtLeastOneOf(ids) => ids,
        };
        if ids.is_empty() {
            return invalid("requirement rule with no slots".to_string());
        }
        if let Some(unknown) = ids.iter().find(|id| !seen.contains(id.as_str())) {
            return invalid(format!("rule references unknown slot {}", unknown));
        }
    }

    Ok(())
}
