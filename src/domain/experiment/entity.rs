//! Experiment domain entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::validation::{ExperimentValidationError, IdKind, validate_id};
use crate::domain::targeting::TargetingRule;
use crate::infrastructure::hashing::BUCKET_COUNT;

// ============================================================================
// ExperimentId
// ============================================================================

/// Unique identifier for an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Create a new experiment ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_id(IdKind::Experiment, &id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ExperimentId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ExperimentId> for String {
    fn from(id: ExperimentId) -> Self {
        id.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// VariantId
// ============================================================================

/// Unique identifier for a variant within an experiment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VariantId(String);

impl VariantId {
    /// Create a new variant ID with validation
    pub fn new(id: impl Into<String>) -> Result<Self, ExperimentValidationError> {
        let id = id.into();
        validate_id(IdKind::Variant, &id)?;
        Ok(Self(id))
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for VariantId {
    type Error = ExperimentValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<VariantId> for String {
    fn from(id: VariantId) -> Self {
        id.0
    }
}

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for VariantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ExperimentStatus
// ============================================================================

/// Status of an experiment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Experiment is being configured, not yet running
    #[default]
    Draft,
    /// Experiment is actively assigning traffic
    Running,
    /// Experiment is temporarily paused
    Paused,
    /// Experiment has finished and results are final
    Concluded,
    /// Experiment is retired and hidden from normal listings
    Archived,
}

impl ExperimentStatus {
    /// Check if the experiment is currently assigning traffic
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Check if the experiment can accept configuration changes
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft)
    }

    /// Check if a transition to the target status is valid
    pub fn can_transition_to(&self, target: ExperimentStatus) -> bool {
        match (self, target) {
            (Self::Draft, Self::Running) => true,
            (Self::Running, Self::Paused) => true,
            (Self::Running, Self::Concluded) => true,
            (Self::Paused, Self::Running) => true,
            (Self::Paused, Self::Concluded) => true,
            (Self::Concluded, Self::Archived) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ExperimentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Running => write!(f, "running"),
            Self::Paused => write!(f, "paused"),
            Self::Concluded => write!(f, "concluded"),
            Self::Archived => write!(f, "archived"),
        }
    }
}

// ============================================================================
// Variant
// ============================================================================

/// A variant in an A/B test experiment
///
/// Owned exclusively by its experiment; the payload is an opaque config blob
/// handed back verbatim on assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    id: VariantId,
    name: String,
    weight: f64,
    control: bool,
    #[serde(default)]
    payload: Value,
}

impl Variant {
    /// Create a new variant with a weight in `[0, 100]`
    pub fn new(id: VariantId, name: impl Into<String>, weight: f64) -> Self {
        Self {
            id,
            name: name.into(),
            weight,
            control: false,
            payload: Value::Null,
        }
    }

    /// Mark this variant as the control
    pub fn with_control(mut self, control: bool) -> Self {
        self.control = control;
        self
    }

    /// Set the opaque payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    /// Get the variant ID
    pub fn id(&self) -> &VariantId {
        &self.id
    }

    /// Get the variant name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the traffic weight (0-100)
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Check if this is the control variant
    pub fn is_control(&self) -> bool {
        self.control
    }

    /// Get the opaque payload
    pub fn payload(&self) -> &Value {
        &self.payload
    }
}

// ============================================================================
// Metric
// ============================================================================

/// How metric samples are aggregated per converting user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    #[default]
    Count,
    Sum,
    Average,
    ConversionRate,
}

/// A metric tracked by an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metric {
    key: String,
    event_name: String,
    aggregation_type: AggregationType,
    minimum_sample_size: u64,
    confidence_level: f64,
}

impl Metric {
    /// Create a metric with a 95% confidence level and no sample-size floor
    pub fn new(key: impl Into<String>, event_name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            event_name: event_name.into(),
            aggregation_type: AggregationType::default(),
            minimum_sample_size: 0,
            confidence_level: 0.95,
        }
    }

    /// Set the aggregation type
    pub fn with_aggregation(mut self, aggregation_type: AggregationType) -> Self {
        self.aggregation_type = aggregation_type;
        self
    }

    /// Set the minimum per-variant sample size for significance calls
    pub fn with_minimum_sample_size(mut self, minimum_sample_size: u64) -> Self {
        self.minimum_sample_size = minimum_sample_size;
        self
    }

    /// Set the confidence level (0-1)
    pub fn with_confidence_level(mut self, confidence_level: f64) -> Self {
        self.confidence_level = confidence_level;
        self
    }

    /// Get the metric key
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the event name samples are sourced from
    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Get the aggregation type
    pub fn aggregation_type(&self) -> AggregationType {
        self.aggregation_type
    }

    /// Get the minimum per-variant sample size
    pub fn minimum_sample_size(&self) -> u64 {
        self.minimum_sample_size
    }

    /// Get the confidence level
    pub fn confidence_level(&self) -> f64 {
        self.confidence_level
    }
}

// ============================================================================
// MutualExclusionGroup
// ============================================================================

/// A named group of experiments of which at most one may be running
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutualExclusionGroup {
    pub id: String,
    pub name: String,
}

impl MutualExclusionGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// An A/B test experiment
///
/// The engine treats experiments as read-only config snapshots; mutation
/// belongs to the authoring layer, which is expected to hold the invariants
/// checked by [`super::validation::validate_experiment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Experiment {
    id: ExperimentId,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    status: ExperimentStatus,
    traffic_allocation: f64,
    is_exclusive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    mutual_exclusion_group_id: Option<String>,
    variants: Vec<Variant>,
    targeting_rules: Vec<TargetingRule>,
    metrics: Vec<Metric>,
    #[serde(skip_serializing_if = "Option::is_none")]
    primary_metric: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    concluded_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Experiment {
    /// Create a new experiment in Draft status with full traffic allocation
    pub fn new(id: ExperimentId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            status: ExperimentStatus::Draft,
            traffic_allocation: 100.0,
            is_exclusive: false,
            mutual_exclusion_group_id: None,
            variants: Vec::new(),
            targeting_rules: Vec::new(),
            metrics: Vec::new(),
            primary_metric: None,
            started_at: None,
            concluded_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Builder methods

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Add a variant (definition order is the stable selection order)
    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variants.push(variant);
        self
    }

    /// Add a targeting rule
    pub fn with_rule(mut self, rule: TargetingRule) -> Self {
        self.targeting_rules.push(rule);
        self
    }

    /// Add a metric
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    /// Set the primary metric by key
    pub fn with_primary_metric(mut self, key: impl Into<String>) -> Self {
        self.primary_metric = Some(key.into());
        self
    }

    /// Set the percentage of traffic eligible for assignment (0-100)
    pub fn with_traffic_allocation(mut self, traffic_allocation: f64) -> Self {
        self.traffic_allocation = traffic_allocation;
        self
    }

    /// Place the experiment in a mutual exclusion group
    pub fn with_exclusion_group(mut self, group_id: impl Into<String>) -> Self {
        self.is_exclusive = true;
        self.mutual_exclusion_group_id = Some(group_id.into());
        self
    }

    // Getters

    /// Get the experiment ID
    pub fn id(&self) -> &ExperimentId {
        &self.id
    }

    /// Get the experiment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Get the current status
    pub fn status(&self) -> ExperimentStatus {
        self.status
    }

    /// Get the percentage of traffic eligible for assignment
    pub fn traffic_allocation(&self) -> f64 {
        self.traffic_allocation
    }

    /// Check whether the experiment participates in mutual exclusion
    pub fn is_exclusive(&self) -> bool {
        self.is_exclusive
    }

    /// Get the mutual exclusion group, if any
    pub fn mutual_exclusion_group_id(&self) -> Option<&str> {
        self.mutual_exclusion_group_id.as_deref()
    }

    /// Get all variants in definition order
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    /// Get the targeting rules
    pub fn targeting_rules(&self) -> &[TargetingRule] {
        &self.targeting_rules
    }

    /// Get the metrics
    pub fn metrics(&self) -> &[Metric] {
        &self.metrics
    }

    /// Get the primary metric key
    pub fn primary_metric(&self) -> Option<&str> {
        self.primary_metric.as_deref()
    }

    /// Look up a metric by key
    pub fn metric(&self, key: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.key() == key)
    }

    /// Look up a variant by ID
    pub fn variant(&self, id: &VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id() == id)
    }

    /// Get the control variant if one exists
    pub fn control_variant(&self) -> Option<&Variant> {
        self.variants.iter().find(|v| v.is_control())
    }

    /// Get when the experiment was started
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get when the experiment was concluded
    pub fn concluded_at(&self) -> Option<DateTime<Utc>> {
        self.concluded_at
    }

    /// Get when the experiment was created
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get when the experiment was last updated
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // Mutators (authoring layer only)

    /// Replace the variant set
    ///
    /// The variant set and weights are frozen once the experiment is
    /// running; changing them would silently re-shuffle existing users.
    pub fn set_variants(
        &mut self,
        variants: Vec<Variant>,
    ) -> Result<(), ExperimentValidationError> {
        if !self.status.is_editable() {
            return Err(ExperimentValidationError::VariantsFrozen(
                self.status.to_string(),
            ));
        }
        self.variants = variants;
        self.touch();
        Ok(())
    }

    /// Replace the targeting rules
    pub fn set_targeting_rules(&mut self, rules: Vec<TargetingRule>) {
        self.targeting_rules = rules;
        self.touch();
    }

    // Status transitions

    /// Start the experiment
    pub fn start(&mut self) -> Result<(), ExperimentValidationError> {
        self.transition_to(ExperimentStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// Pause the experiment
    pub fn pause(&mut self) -> Result<(), ExperimentValidationError> {
        self.transition_to(ExperimentStatus::Paused)
    }

    /// Resume a paused experiment
    pub fn resume(&mut self) -> Result<(), ExperimentValidationError> {
        self.transition_to(ExperimentStatus::Running)
    }

    /// Conclude the experiment
    pub fn conclude(&mut self) -> Result<(), ExperimentValidationError> {
        self.transition_to(ExperimentStatus::Concluded)?;
        self.concluded_at = Some(Utc::now());
        Ok(())
    }

    /// Archive a concluded experiment
    pub fn archive(&mut self) -> Result<(), ExperimentValidationError> {
        self.transition_to(ExperimentStatus::Archived)
    }

    // Selection

    /// Select the variant whose cumulative weight range contains a bucket
    ///
    /// Ranges are built in stable variant definition order (never re-sorted
    /// by weight) and scaled so one weight point covers `BUCKET_COUNT / 100`
    /// buckets. Rounding slack from fractional weights is absorbed by the
    /// last variant.
    pub fn variant_for_bucket(&self, bucket: u32) -> Option<&Variant> {
        let scale = f64::from(BUCKET_COUNT) / 100.0;
        let mut cumulative = 0u32;

        for variant in &self.variants {
            cumulative += (variant.weight() * scale).round() as u32;
            if bucket < cumulative {
                return Some(variant);
            }
        }

        self.variants.last()
    }

    // Private helpers

    fn transition_to(
        &mut self,
        target: ExperimentStatus,
    ) -> Result<(), ExperimentValidationError> {
        if !self.status.can_transition_to(target) {
            return Err(ExperimentValidationError::InvalidStatusTransition(
                self.status.to_string(),
                target.to_string(),
            ));
        }
        self.status = target;
        self.touch();
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_variant_experiment(id: &str) -> Experiment {
        Experiment::new(ExperimentId::new(id).unwrap(), "Test Experiment")
            .with_variant(
                Variant::new(VariantId::new("control").unwrap(), "Control", 50.0)
                    .with_control(true),
            )
            .with_variant(Variant::new(
                VariantId::new("treatment").unwrap(),
                "Treatment",
                50.0,
            ))
    }

    mod id_tests {
        use super::*;

        #[test]
        fn test_valid_ids() {
            assert_eq!(
                ExperimentId::new("checkout-test-2024").unwrap().as_str(),
                "checkout-test-2024"
            );
            assert_eq!(VariantId::new("variant-a").unwrap().as_str(), "variant-a");
        }

        #[test]
        fn test_invalid_ids() {
            assert!(ExperimentId::new("").is_err());
            assert!(ExperimentId::new("-leading").is_err());
            assert!(VariantId::new("trailing-").is_err());
            assert!(VariantId::new("has space").is_err());
        }

        #[test]
        fn test_id_serde_round_trip() {
            let id = ExperimentId::new("exp-1").unwrap();
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, "\"exp-1\"");
            let parsed: ExperimentId = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, id);
        }
    }

    mod status_tests {
        use super::*;

        #[test]
        fn test_transitions() {
            assert!(ExperimentStatus::Draft.can_transition_to(ExperimentStatus::Running));
            assert!(ExperimentStatus::Running.can_transition_to(ExperimentStatus::Paused));
            assert!(ExperimentStatus::Running.can_transition_to(ExperimentStatus::Concluded));
            assert!(ExperimentStatus::Paused.can_transition_to(ExperimentStatus::Running));
            assert!(ExperimentStatus::Concluded.can_transition_to(ExperimentStatus::Archived));

            assert!(!ExperimentStatus::Draft.can_transition_to(ExperimentStatus::Paused));
            assert!(!ExperimentStatus::Draft.can_transition_to(ExperimentStatus::Archived));
            assert!(!ExperimentStatus::Archived.can_transition_to(ExperimentStatus::Running));
            assert!(!ExperimentStatus::Concluded.can_transition_to(ExperimentStatus::Running));
        }

        #[test]
        fn test_lifecycle_methods() {
            let mut exp = two_variant_experiment("exp-1");

            assert!(exp.start().is_ok());
            assert_eq!(exp.status(), ExperimentStatus::Running);
            assert!(exp.started_at().is_some());

            assert!(exp.pause().is_ok());
            assert!(exp.resume().is_ok());
            assert!(exp.conclude().is_ok());
            assert!(exp.concluded_at().is_some());
            assert!(exp.archive().is_ok());
            assert_eq!(exp.status(), ExperimentStatus::Archived);
        }

        #[test]
        fn test_invalid_transition_is_rejected() {
            let mut exp = two_variant_experiment("exp-1");
            let err = exp.pause().unwrap_err();
            assert_eq!(
                err,
                ExperimentValidationError::InvalidStatusTransition(
                    "draft".to_string(),
                    "paused".to_string()
                )
            );
        }
    }

    mod variant_frozen_tests {
        use super::*;

        #[test]
        fn test_variants_mutable_in_draft() {
            let mut exp = two_variant_experiment("exp-1");
            let variants = exp.variants().to_vec();
            assert!(exp.set_variants(variants).is_ok());
        }

        #[test]
        fn test_variants_frozen_while_running() {
            let mut exp = two_variant_experiment("exp-1");
            exp.start().unwrap();

            let variants = exp.variants().to_vec();
            assert_eq!(
                exp.set_variants(variants),
                Err(ExperimentValidationError::VariantsFrozen(
                    "running".to_string()
                ))
            );
        }
    }

    mod selection_tests {
        use super::*;

        #[test]
        fn test_variant_ranges_follow_definition_order() {
            let exp = two_variant_experiment("exp-1");

            // 50/50 split over 10,000 buckets: [0, 5000) then [5000, 10000)
            assert_eq!(exp.variant_for_bucket(0).unwrap().id().as_str(), "control");
            assert_eq!(
                exp.variant_for_bucket(4_999).unwrap().id().as_str(),
                "control"
            );
            assert_eq!(
                exp.variant_for_bucket(5_000).unwrap().id().as_str(),
                "treatment"
            );
            assert_eq!(
                exp.variant_for_bucket(9_999).unwrap().id().as_str(),
                "treatment"
            );
        }

        #[test]
        fn test_uneven_split() {
            let exp = Experiment::new(ExperimentId::new("exp-1").unwrap(), "Uneven")
                .with_variant(
                    Variant::new(VariantId::new("control").unwrap(), "Control", 90.0)
                        .with_control(true),
                )
                .with_variant(Variant::new(
                    VariantId::new("treatment").unwrap(),
                    "Treatment",
                    10.0,
                ));

            assert_eq!(
                exp.variant_for_bucket(8_999).unwrap().id().as_str(),
                "control"
            );
            assert_eq!(
                exp.variant_for_bucket(9_000).unwrap().id().as_str(),
                "treatment"
            );
        }

        #[test]
        fn test_rounding_slack_goes_to_last_variant() {
            // 33.33/33.33/33.34 rounds to 3333/3333/3334 buckets
            let exp = Experiment::new(ExperimentId::new("exp-1").unwrap(), "Thirds")
                .with_variant(
                    Variant::new(VariantId::new("a").unwrap(), "A", 33.33).with_control(true),
                )
                .with_variant(Variant::new(VariantId::new("b").unwrap(), "B", 33.33))
                .with_variant(Variant::new(VariantId::new("c").unwrap(), "C", 33.34));

            assert_eq!(exp.variant_for_bucket(3_332).unwrap().id().as_str(), "a");
            assert_eq!(exp.variant_for_bucket(3_333).unwrap().id().as_str(), "b");
            assert_eq!(exp.variant_for_bucket(6_665).unwrap().id().as_str(), "b");
            assert_eq!(exp.variant_for_bucket(6_666).unwrap().id().as_str(), "c");
            assert_eq!(exp.variant_for_bucket(9_999).unwrap().id().as_str(), "c");
        }

        #[test]
        fn test_empty_variants_select_nothing() {
            let exp = Experiment::new(ExperimentId::new("exp-1").unwrap(), "Empty");
            assert!(exp.variant_for_bucket(0).is_none());
        }
    }

    mod accessor_tests {
        use super::*;

        #[test]
        fn test_control_variant() {
            let exp = two_variant_experiment("exp-1");
            assert_eq!(exp.control_variant().unwrap().id().as_str(), "control");
        }

        #[test]
        fn test_metric_lookup() {
            let exp = two_variant_experiment("exp-1")
                .with_metric(Metric::new("conversion", "purchase_completed"))
                .with_primary_metric("conversion");

            assert!(exp.metric("conversion").is_some());
            assert!(exp.metric("missing").is_none());
            assert_eq!(exp.primary_metric(), Some("conversion"));
        }

        #[test]
        fn test_exclusion_group_builder() {
            let exp = two_variant_experiment("exp-1").with_exclusion_group("homepage");
            assert!(exp.is_exclusive());
            assert_eq!(exp.mutual_exclusion_group_id(), Some("homepage"));
        }
    }
}
