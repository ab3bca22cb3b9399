//! The constraint tree.
//!
//! A license document holds an ordered list of top-level constraint nodes.
//! Each node is either a leaf predicate (time window, date range, usage cap,
//! ...) or an `And`/`Or` group of further nodes. Nodes are stored as a
//! closed, `type`-tagged union; an unknown tag is a document error.
//!
//! # Evaluation
//!
//! Evaluation is top-down and never short-circuits: every child of a group
//! is evaluated so that usage counters and warnings are recorded for all of
//! them. A node whose scope does not match the target is skipped entirely.
//! Otherwise it raises the volume/runtime caps, emits its warning template
//! and then decides its own outcome. Failures append a description of the
//! node to the shared failure text.

mod context;
mod gate;
mod schedule;
mod usage;

pub use context::{TargetIdentity, UsageMode, ValidationContext, ValidationRequest};
pub use gate::{normalize_domain, DomainList, ExecutionMode, FunctionGate, VersionRange};
pub use schedule::{Beta, DateRange, TimeRange, TimeWindow};
pub use usage::UsageLimit;

use serde::{Deserialize, Serialize};
use tracing::trace;
use warden_types::ScopeId;

/// Marker for "no cap" in volume and runtime constraints.
pub const UNCONSTRAINED: i32 = -1;

fn unconstrained() -> i32 {
    UNCONSTRAINED
}

/// Outcome of a single leaf check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Verdict {
    Pass,
    Fail(String),
}

/// Volume and runtime caps collected across a satisfied branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintCaps {
    /// Item count cap, `-1` when unconstrained.
    pub volume: i32,
    /// Runtime cap in hours, `-1` when unconstrained.
    pub runtime: i32,
}

impl ConstraintCaps {
    #[must_use]
    pub const fn unconstrained() -> Self {
        Self {
            volume: UNCONSTRAINED,
            runtime: UNCONSTRAINED,
        }
    }

    fn absorb(&mut self, volume: i32, runtime: i32) {
        self.volume = self.volume.max(volume);
        self.runtime = self.runtime.max(runtime);
    }
}

impl Default for ConstraintCaps {
    fn default() -> Self {
        Self::unconstrained()
    }
}

/// Failure text and warnings produced while evaluating a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationLog {
    pub failure_reason: String,
    pub warnings: Vec<String>,
}

/// Children of an `And` or `Or` node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintGroup {
    #[serde(default)]
    pub items: Vec<ConstraintNode>,
}

/// The variant part of a constraint node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConstraintKind {
    And(ConstraintGroup),
    Or(ConstraintGroup),
    TimeWindow(TimeWindow),
    DateRange(DateRange),
    Beta(Beta),
    Domain(DomainList),
    FunctionGate(FunctionGate),
    Usage(UsageLimit),
    VersionRange(VersionRange),
    ExecutionMode(ExecutionMode),
}

impl ConstraintKind {
    /// Every tag accepted in a serialized document.
    pub const TAGS: &'static [&'static str] = &[
        "and",
        "or",
        "time_window",
        "date_range",
        "beta",
        "domain",
        "function_gate",
        "usage",
        "version_range",
        "execution_mode",
    ];

    /// The serialized tag of this variant.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::And(_) => "and",
            Self::Or(_) => "or",
            Self::TimeWindow(_) => "time_window",
            Self::DateRange(_) => "date_range",
            Self::Beta(_) => "beta",
            Self::Domain(_) => "domain",
            Self::FunctionGate(_) => "function_gate",
            Self::Usage(_) => "usage",
            Self::VersionRange(_) => "version_range",
            Self::ExecutionMode(_) => "execution_mode",
        }
    }

    fn properties(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::And(group) | Self::Or(group) => vec![("items", group.items.len().to_string())],
            Self::TimeWindow(c) => c.properties(),
            Self::DateRange(c) => c.properties(),
            Self::Beta(c) => c.properties(),
            Self::Domain(c) => c.properties(),
            Self::FunctionGate(c) => c.properties(),
            Self::Usage(c) => c.properties(),
            Self::VersionRange(c) => c.properties(),
            Self::ExecutionMode(c) => c.properties(),
        }
    }
}

/// One node of the constraint tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintNode {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// When set, the node applies only to the target with this scope id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<ScopeId>,
    #[serde(default = "unconstrained")]
    pub volume_constraint: i32,
    /// Hours.
    #[serde(default = "unconstrained")]
    pub runtime_constraint: i32,
    /// Message template; `<field>` placeholders are replaced by the node's
    /// own field values.
    #[serde(default)]
    pub warning: String,
    #[serde(flatten)]
    pub kind: ConstraintKind,
}

impl ConstraintNode {
    #[must_use]
    pub fn new(kind: ConstraintKind) -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            scope: None,
            volume_constraint: UNCONSTRAINED,
            runtime_constraint: UNCONSTRAINED,
            warning: String::new(),
            kind,
        }
    }

    #[must_use]
    pub fn and(items: Vec<ConstraintNode>) -> Self {
        Self::new(ConstraintKind::And(ConstraintGroup { items }))
    }

    #[must_use]
    pub fn or(items: Vec<ConstraintNode>) -> Self {
        Self::new(ConstraintKind::Or(ConstraintGroup { items }))
    }

    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    #[must_use]
    pub fn scoped(mut self, scope: ScopeId) -> Self {
        self.scope = Some(scope);
        self
    }

    #[must_use]
    pub fn with_caps(mut self, volume: i32, runtime_hours: i32) -> Self {
        self.volume_constraint = volume;
        self.runtime_constraint = runtime_hours;
        self
    }

    #[must_use]
    pub fn with_warning(mut self, template: impl Into<String>) -> Self {
        self.warning = template.into();
        self
    }

    /// Evaluates this node and its subtree against `ctx`.
    ///
    /// Returns whether the node grants access. Caps and warnings are
    /// recorded whenever the scope matches, regardless of the outcome.
    pub fn validate(
        &mut self,
        ctx: &ValidationContext<'_>,
        log: &mut ValidationLog,
        caps: &mut ConstraintCaps,
    ) -> bool {
        if let Some(scope) = self.scope
            && scope != ctx.target().scope
        {
            trace!(node = %self.name, scope = %scope, "constraint out of scope");
            return false;
        }

        caps.absorb(self.volume_constraint, self.runtime_constraint);
        if !self.warning.trim().is_empty() {
            log.warnings.push(self.render_warning());
        }

        let verdict = match &mut self.kind {
            ConstraintKind::And(group) => {
                let mut all = true;
                for child in &mut group.items {
                    all &= child.validate(ctx, log, caps);
                }
                if all {
                    Verdict::Pass
                } else {
                    Verdict::Fail("See previous descriptions".to_string())
                }
            }
            ConstraintKind::Or(group) => {
                let mark = log.failure_reason.len();
                let mut any = false;
                for child in &mut group.items {
                    any |= child.validate(ctx, log, caps);
                }
                if any {
                    // Only this group's own notes are discarded.
                    log.failure_reason.truncate(mark);
                    Verdict::Pass
                } else {
                    Verdict::Fail("See previous descriptions".to_string())
                }
            }
            ConstraintKind::TimeWindow(c) => c.check(ctx),
            ConstraintKind::DateRange(c) => c.check(ctx),
            ConstraintKind::Beta(c) => c.check(ctx),
            ConstraintKind::Domain(c) => c.check(ctx),
            ConstraintKind::FunctionGate(c) => c.check(&self.name),
            ConstraintKind::Usage(c) => c.check(ctx),
            ConstraintKind::VersionRange(c) => c.check(ctx),
            ConstraintKind::ExecutionMode(c) => c.check(ctx),
        };

        match verdict {
            Verdict::Pass => true,
            Verdict::Fail(details) => {
                trace!(node = %self.name, kind = self.kind.tag(), "constraint failed");
                log.failure_reason.push_str("\nThe constraint failed:\n ");
                log.failure_reason.push_str(&details);
                log.failure_reason.push('\n');
                log.failure_reason.push_str(&self.details());
                false
            }
        }
    }

    /// Human-readable description of the node, used in failure text.
    #[must_use]
    pub fn details(&self) -> String {
        let scope = self
            .scope
            .map_or_else(|| "any".to_string(), |s| s.to_string());
        format!(
            "Name: {}\nDescription: {}\nType: {}\nVolume constraint: {}\nRuntime constraint: {}\nScope: {}",
            self.name,
            self.description,
            self.kind.tag(),
            self.volume_constraint,
            self.runtime_constraint,
            scope
        )
    }

    /// The warning template with `<field>` placeholders substituted.
    #[must_use]
    pub fn render_warning(&self) -> String {
        let scope = self.scope.map(|s| s.to_string()).unwrap_or_default();
        let common = [
            ("name", self.name.clone()),
            ("description", self.description.clone()),
            ("type", self.kind.tag().to_string()),
            ("volume_constraint", self.volume_constraint.to_string()),
            ("runtime_constraint", self.runtime_constraint.to_string()),
            ("scope", scope),
        ];
        let mut rendered = self.warning.clone();
        for (key, value) in common.into_iter().chain(self.kind.properties()) {
            rendered = rendered.replace(&format!("<{key}>"), &value);
        }
        rendered
    }
}
