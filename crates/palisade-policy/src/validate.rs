//! Eager policy document validation.
//!
//! Validates that a deserialized [`GatewayPolicy`] is internally
//! consistent before any gate consumes it: every tool's category exists,
//! every pattern compiles, and numeric limits are inside sane ranges.
//! Returns the first error found.

use regex::Regex;
use std::net::Ipv4Addr;

use crate::error::{PolicyError, PolicyResult};
use crate::types::GatewayPolicy;

/// Validate a fully-deserialized policy document.
///
/// # Errors
///
/// Returns the first [`PolicyError::Validation`] encountered.
pub fn validate(policy: &GatewayPolicy) -> PolicyResult<()> {
    validate_tools(policy)?;
    validate_network(policy)?;
    validate_approval(policy)?;
    Ok(())
}

fn validate_tools(policy: &GatewayPolicy) -> PolicyResult<()> {
    for (tool_name, tool) in &policy.allowed_tools {
        if !policy.tool_categories.contains_key(&tool.category) {
            return Err(PolicyError::Validation {
                field: format!("allowed_tools.{tool_name}.category"),
                message: format!("unknown category '{}'", tool.category),
            });
        }

        for (param_name, schema) in &tool.valid_parameters {
            if let Some(pattern) = &schema.pattern
                && let Err(e) = Regex::new(pattern)
            {
                return Err(PolicyError::Validation {
                    field: format!("allowed_tools.{tool_name}.valid_parameters.{param_name}.pattern"),
                    message: format!("invalid regex: {e}"),
                });
            }

            if let (Some(min), Some(max)) = (schema.min, schema.max)
                && min > max
            {
                return Err(PolicyError::Validation {
                    field: format!("allowed_tools.{tool_name}.valid_parameters.{param_name}"),
                    message: format!("min {min} exceeds max {max}"),
                });
            }
        }
    }
    Ok(())
}

fn validate_network(policy: &GatewayPolicy) -> PolicyResult<()> {
    let net = &policy.network;

    if net.allowed_schemes.is_empty() {
        return Err(PolicyError::Validation {
            field: "network.allowed_schemes".to_owned(),
            message: "must name at least one scheme".to_owned(),
        });
    }

    if net.max_size_bytes == 0 {
        return Err(PolicyError::Validation {
            field: "network.max_size_bytes".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    if net.max_url_length == 0 {
        return Err(PolicyError::Validation {
            field: "network.max_url_length".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    if net.max_timeout_secs == 0 {
        return Err(PolicyError::Validation {
            field: "network.max_timeout_secs".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    if !net.rate_limit.rps.is_finite() || net.rate_limit.rps <= 0.0 {
        return Err(PolicyError::Validation {
            field: "network.rate_limit.rps".to_owned(),
            message: "must be a finite positive number".to_owned(),
        });
    }

    if !net.rate_limit.burst.is_finite() || net.rate_limit.burst < 1.0 {
        return Err(PolicyError::Validation {
            field: "network.rate_limit.burst".to_owned(),
            message: "must be a finite number >= 1".to_owned(),
        });
    }

    for entry in &net.blocked_ips {
        if !blocked_ip_entry_is_valid(entry) {
            return Err(PolicyError::Validation {
                field: "network.blocked_ips".to_owned(),
                message: format!("'{entry}' is neither an IP nor an IPv4 CIDR"),
            });
        }
    }

    Ok(())
}

fn validate_approval(policy: &GatewayPolicy) -> PolicyResult<()> {
    if policy.approval.timeout_secs == 0 {
        return Err(PolicyError::Validation {
            field: "approval.timeout_secs".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    if policy.approval.max_pending == 0 {
        return Err(PolicyError::Validation {
            field: "approval.max_pending".to_owned(),
            message: "must be positive".to_owned(),
        });
    }

    Ok(())
}

fn blocked_ip_entry_is_valid(entry: &str) -> bool {
    if let Some((net, prefix)) = entry.split_once('/') {
        return net.parse::<Ipv4Addr>().is_ok()
            && prefix.parse::<u8>().is_ok_and(|p| p <= 32);
    }
    entry.parse::<std::net::IpAddr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CategoryPolicy, ParamKind, ParameterSchema, ToolPolicy};
    use palisade_core::RiskLevel;

    fn valid_policy() -> GatewayPolicy {
        GatewayPolicy::default()
            .with_category(
                "read_only",
                CategoryPolicy {
                    risk_level: RiskLevel::Low,
                    requires_approval: false,
                },
            )
            .with_tool(
                "read_file",
                ToolPolicy::in_category("read_only").with_parameter(
                    "target_file",
                    ParameterSchema::of(ParamKind::String).with_pattern("^[^.]+$"),
                ),
            )
    }

    #[test]
    fn test_valid_policy_passes() {
        assert!(validate(&valid_policy()).is_ok());
    }

    #[test]
    fn test_unknown_category_rejected() {
        let policy =
            GatewayPolicy::default().with_tool("orphan", ToolPolicy::in_category("missing"));
        let err = validate(&policy).unwrap_err();
        assert!(err.to_string().contains("unknown category"));
    }

    #[test]
    fn test_bad_regex_rejected() {
        let mut policy = valid_policy();
        let tool = policy.allowed_tools.get_mut("read_file").unwrap();
        tool.valid_parameters
            .insert("bad".to_string(), ParameterSchema::of(ParamKind::String).with_pattern("["));
        let err = validate(&policy).unwrap_err();
        assert!(err.to_string().contains("invalid regex"));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut policy = valid_policy();
        let tool = policy.allowed_tools.get_mut("read_file").unwrap();
        tool.valid_parameters.insert(
            "count".to_string(),
            ParameterSchema::of(ParamKind::Integer).with_range(10, 1),
        );
        assert!(validate(&policy).is_err());
    }

    #[test]
    fn test_zero_limits_rejected() {
        let mut policy = valid_policy();
        policy.network.max_size_bytes = 0;
        assert!(validate(&policy).is_err());

        let mut policy = valid_policy();
        policy.network.rate_limit.rps = 0.0;
        assert!(validate(&policy).is_err());

        let mut policy = valid_policy();
        policy.approval.timeout_secs = 0;
        assert!(validate(&policy).is_err());
    }

    #[test]
    fn test_blocked_ip_entries() {
        let mut policy = valid_policy();
        policy.network.blocked_ips = vec!["10.0.0.0/8".to_string(), "::1".to_string()];
        assert!(validate(&policy).is_ok());

        policy.network.blocked_ips = vec!["not-an-ip".to_string()];
        assert!(validate(&policy).is_err());

        policy.network.blocked_ips = vec!["10.0.0.0/40".to_string()];
        assert!(validate(&policy).is_err());
    }
}
