//! The tool-call gate.

use palisade_approval::{ApprovalRequest, ApprovalWorkflow};
use palisade_audit::{AuditEntry, AuditLog};
use palisade_core::{Decision, RequestId, RiskLevel, ToolCall};
use palisade_policy::GatewayPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use crate::sanitize::sanitize_parameter;

/// Outcome of validating a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the call may execute right now.
    pub allowed: bool,
    /// Risk classification of the tool's category.
    pub risk_level: RiskLevel,
    /// Whether the call was routed into the approval workflow.
    pub requires_approval: bool,
    /// Terminal (or pending) decision for this call.
    pub status: Decision,
    /// Parameters after sanitization, for the executing tool to use.
    pub sanitized_parameters: BTreeMap<String, Value>,
    /// Every violation found; empty iff the call was not rejected.
    pub violations: Vec<String>,
    /// Identifier shared with the approval workflow and audit log.
    pub request_id: RequestId,
}

/// Validates tool calls against the policy's explicit allow-list.
///
/// Owned by whatever boots the agent runtime and shared across callers;
/// `validate` never blocks on I/O and is safe to invoke from parallel
/// execution contexts.
pub struct ToolCallGate {
    policy: Arc<GatewayPolicy>,
    workflow: Arc<ApprovalWorkflow>,
    audit: Arc<AuditLog>,
}

impl ToolCallGate {
    /// Create a gate over a validated policy.
    #[must_use]
    pub fn new(
        policy: Arc<GatewayPolicy>,
        workflow: Arc<ApprovalWorkflow>,
        audit: Arc<AuditLog>,
    ) -> Self {
        Self {
            policy,
            workflow,
            audit,
        }
    }

    /// Validate a tool call. First failing check wins; sanitization
    /// violations accumulate across all parameters.
    pub fn validate(&self, call: &ToolCall) -> ValidationResult {
        let started = Instant::now();

        if self.policy.is_blocked(&call.tool_name) {
            let violation = format!("tool '{}' is blocked", call.tool_name);
            return self.finish(call, rejected(call, vec![violation]), started);
        }

        // Unknown means forbidden: an explicit allow-list, fail closed.
        let Some(tool) = self.policy.tool(&call.tool_name) else {
            let violation = format!("tool '{}' is not in the allow-list", call.tool_name);
            return self.finish(call, rejected(call, vec![violation]), started);
        };

        let Some(category) = self.policy.category(&tool.category) else {
            let violation = format!(
                "tool '{}' belongs to unknown category '{}'",
                call.tool_name, tool.category
            );
            return self.finish(call, rejected(call, vec![violation]), started);
        };

        let mut sanitized = BTreeMap::new();
        let mut violations = Vec::new();
        for (name, value) in &call.parameters {
            match tool.valid_parameters.get(name) {
                Some(schema) => {
                    let (clean, mut found) =
                        sanitize_parameter(name, value, schema, &self.policy.sanitize);
                    sanitized.insert(name.clone(), clean);
                    violations.append(&mut found);
                }
                None => {
                    violations.push(format!("unknown parameter '{name}'"));
                    sanitized.insert(name.clone(), value.clone());
                }
            }
        }
        for (name, schema) in &tool.valid_parameters {
            if schema.required && !call.parameters.contains_key(name) {
                violations.push(format!("missing required parameter '{name}'"));
            }
        }

        let result = if violations.is_empty() {
            self.decide(call, category.risk_level, category.requires_approval, sanitized)
        } else {
            ValidationResult {
                allowed: false,
                risk_level: category.risk_level,
                requires_approval: category.requires_approval,
                status: Decision::Rejected,
                sanitized_parameters: sanitized,
                violations,
                request_id: call.request_id,
            }
        };
        self.finish(call, result, started)
    }

    /// Resolve the decision for a call that passed sanitization.
    fn decide(
        &self,
        call: &ToolCall,
        risk_level: RiskLevel,
        requires_approval: bool,
        sanitized: BTreeMap<String, Value>,
    ) -> ValidationResult {
        let request = ApprovalRequest::new(
            call.request_id,
            &call.tool_name,
            call.caller_id.clone(),
            risk_level,
        )
        .with_parameters(sanitized.clone());

        let outcome = if requires_approval {
            self.workflow.submit(request).map(|_| Decision::PendingApproval)
        } else {
            self.workflow
                .record_auto_approval(&request)
                .map(|_| Decision::AutoApproved)
        };

        match outcome {
            Ok(status) => ValidationResult {
                allowed: status.is_allowed(),
                risk_level,
                requires_approval,
                status,
                sanitized_parameters: sanitized,
                violations: Vec::new(),
                request_id: call.request_id,
            },
            Err(err) => {
                // Workflow refused the request (queue full or replayed
                // request id); fail closed rather than letting the call
                // through unrecorded.
                tracing::warn!(
                    tool = %call.tool_name,
                    request_id = %call.request_id,
                    error = %err,
                    "approval workflow refused request, rejecting"
                );
                ValidationResult {
                    allowed: false,
                    risk_level,
                    requires_approval,
                    status: Decision::Rejected,
                    sanitized_parameters: sanitized,
                    violations: vec![err.to_string()],
                    request_id: call.request_id,
                }
            }
        }
    }

    /// Record the decision in the audit log and hand the result back.
    fn finish(
        &self,
        call: &ToolCall,
        result: ValidationResult,
        started: Instant,
    ) -> ValidationResult {
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let mut entry = AuditEntry::new(call.request_id, call.caller_id.clone(), result.status)
            .with_latency_ms(latency_ms);
        if !result.violations.is_empty() {
            entry = entry.with_reason(result.violations.join("; "));
        }
        self.audit.record(entry);

        if result.status == Decision::Rejected {
            tracing::warn!(
                tool = %call.tool_name,
                caller = %call.caller_id,
                violations = ?result.violations,
                "tool call rejected"
            );
        } else {
            tracing::debug!(
                tool = %call.tool_name,
                caller = %call.caller_id,
                status = %result.status,
                "tool call validated"
            );
        }
        result
    }
}

impl std::fmt::Debug for ToolCallGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCallGate")
            .field("allowed_tools", &self.policy.allowed_tools.len())
            .finish_non_exhaustive()
    }
}

/// A rejection before the tool's category could be resolved. Risk is
/// pinned to high: the gate knows nothing about the tool.
fn rejected(call: &ToolCall, violations: Vec<String>) -> ValidationResult {
    ValidationResult {
        allowed: false,
        risk_level: RiskLevel::High,
        requires_approval: false,
        status: Decision::Rejected,
        sanitized_parameters: BTreeMap::new(),
        violations,
        request_id: call.request_id,
    }
}
