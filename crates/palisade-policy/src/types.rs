//! Policy document types.
//!
//! The shapes here mirror the document the runtime's config loader hands
//! over: an explicit tool allow-list with per-parameter schemas, category
//! risk policies, network egress rules, and workflow settings.

use palisade_core::RiskLevel;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::net::{IpAddr, Ipv4Addr};

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    /// UTF-8 string.
    String,
    /// Signed integer.
    Integer,
    /// Boolean flag.
    Boolean,
    /// JSON array.
    Array,
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Integer => write!(f, "integer"),
            Self::Boolean => write!(f, "boolean"),
            Self::Array => write!(f, "array"),
        }
    }
}

/// Validation schema for a single declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Expected type of the value.
    #[serde(rename = "type")]
    pub kind: ParamKind,
    /// Whether the parameter must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Maximum string length, in characters.
    #[serde(default)]
    pub max_length: Option<usize>,
    /// Inclusive lower bound for integers.
    #[serde(default)]
    pub min: Option<i64>,
    /// Inclusive upper bound for integers.
    #[serde(default)]
    pub max: Option<i64>,
    /// Maximum number of array items.
    #[serde(default)]
    pub max_items: Option<usize>,
    /// Full-match regex the whole string must satisfy (case-sensitive).
    #[serde(default)]
    pub pattern: Option<String>,
    /// Forbidden substrings (case-sensitive); each hit is one violation.
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl ParameterSchema {
    /// A schema accepting any value of the given type.
    #[must_use]
    pub fn of(kind: ParamKind) -> Self {
        Self {
            kind,
            required: false,
            max_length: None,
            min: None,
            max: None,
            max_items: None,
            pattern: None,
            blacklist: Vec::new(),
        }
    }

    /// Mark the parameter required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the maximum string length.
    #[must_use]
    pub fn with_max_length(mut self, max: usize) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Set the full-match pattern.
    #[must_use]
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Add a blacklisted substring.
    #[must_use]
    pub fn with_blacklist_entry(mut self, entry: impl Into<String>) -> Self {
        self.blacklist.push(entry.into());
        self
    }

    /// Set inclusive integer bounds.
    #[must_use]
    pub fn with_range(mut self, min: i64, max: i64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Set the maximum number of array items.
    #[must_use]
    pub fn with_max_items(mut self, max: usize) -> Self {
        self.max_items = Some(max);
        self
    }
}

/// Policy for a single allow-listed tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolPolicy {
    /// Category the tool belongs to (must exist in `tool_categories`).
    pub category: String,
    /// Declared parameters; anything else supplied is a violation.
    #[serde(default)]
    pub valid_parameters: BTreeMap<String, ParameterSchema>,
}

impl ToolPolicy {
    /// Create a tool policy in the given category.
    #[must_use]
    pub fn in_category(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            valid_parameters: BTreeMap::new(),
        }
    }

    /// Declare a parameter.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, schema: ParameterSchema) -> Self {
        self.valid_parameters.insert(name.into(), schema);
        self
    }
}

/// Risk policy for a tool category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryPolicy {
    /// Risk classification surfaced to callers and audit.
    pub risk_level: RiskLevel,
    /// Whether invocations park in the approval workflow.
    pub requires_approval: bool,
}

/// Token-bucket parameters for egress admission control.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitSettings {
    /// Tokens refilled per second.
    pub rps: f64,
    /// Bucket capacity (maximum burst).
    pub burst: f64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            rps: 10.0,
            burst: 20.0,
        }
    }
}

/// Network egress rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPolicy {
    /// URL schemes accepted by the guard. Default: `https` only.
    #[serde(default = "default_schemes")]
    pub allowed_schemes: Vec<String>,
    /// Domain allow-list. Supports `*` and `*.suffix` wildcards.
    /// Empty means the allow-list is not enforced; the SSRF defenses
    /// and the block-list still apply.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Domain block-list, checked after the allow-list.
    #[serde(default)]
    pub blocked_domains: Vec<String>,
    /// Blocked IPs or IPv4 CIDR ranges, in addition to the built-in
    /// SSRF defenses.
    #[serde(default)]
    pub blocked_ips: Vec<String>,
    /// Maximum response size in bytes, enforced while streaming.
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    /// Maximum HTTP redirects followed per request.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum accepted URL length.
    #[serde(default = "default_max_url_length")]
    pub max_url_length: usize,
    /// Ceiling on the caller-supplied request timeout, in seconds.
    #[serde(default = "default_max_timeout_secs")]
    pub max_timeout_secs: u64,
    /// Per-caller token-bucket settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

fn default_schemes() -> Vec<String> {
    vec!["https".to_string()]
}

fn default_max_size_bytes() -> u64 {
    10 * 1024 * 1024 // 10 MB
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_url_length() -> usize {
    2048
}

fn default_max_timeout_secs() -> u64 {
    30
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: default_schemes(),
            allowed_domains: Vec::new(),
            blocked_domains: Vec::new(),
            blocked_ips: Vec::new(),
            max_size_bytes: default_max_size_bytes(),
            max_redirects: default_max_redirects(),
            max_url_length: default_max_url_length(),
            max_timeout_secs: default_max_timeout_secs(),
            rate_limit: RateLimitSettings::default(),
        }
    }
}

impl NetworkPolicy {
    /// Check whether a host matches the domain allow-list.
    ///
    /// An empty allow-list matches nothing; the caller decides whether
    /// emptiness means "unenforced" or "deny all".
    #[must_use]
    pub fn domain_allowed(&self, host: &str) -> bool {
        self.allowed_domains
            .iter()
            .any(|pattern| domain_matches(pattern, host))
    }

    /// Check whether a host matches the domain block-list.
    #[must_use]
    pub fn domain_blocked(&self, host: &str) -> bool {
        self.blocked_domains
            .iter()
            .any(|pattern| domain_matches(pattern, host))
    }

    /// Check whether the block-list contains the match-all wildcard.
    ///
    /// A `*` entry in the block-list poisons the whole policy; the guard
    /// rejects every request rather than guessing intent.
    #[must_use]
    pub fn blocklist_matches_all(&self) -> bool {
        self.blocked_domains.iter().any(|p| p == "*")
    }

    /// Check whether an IP falls in `blocked_ips`.
    #[must_use]
    pub fn ip_blocked(&self, ip: IpAddr) -> bool {
        self.blocked_ips
            .iter()
            .any(|entry| ip_entry_matches(entry, ip))
    }
}

/// Match a single allow/block-list pattern against a host.
///
/// `*` matches everything; `*.suffix` matches `suffix` itself and any
/// subdomain of it; anything else is an exact comparison. Hostnames are
/// case-insensitive, so both sides are lowercased before comparing and
/// a pattern authored as `Api.Example.com` still matches.
#[must_use]
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();
    if let Some(suffix) = pattern.strip_prefix("*.") {
        return host == suffix || host.ends_with(&format!(".{suffix}"));
    }
    pattern == host
}

/// Match a blocked-IP entry (plain IP or IPv4 CIDR) against an address.
fn ip_entry_matches(entry: &str, ip: IpAddr) -> bool {
    if let Some((net, prefix)) = entry.split_once('/') {
        let (Ok(net), Ok(prefix)) = (net.parse::<Ipv4Addr>(), prefix.parse::<u8>()) else {
            return false;
        };
        let IpAddr::V4(ip) = ip else { return false };
        return cidr_contains_v4(net, prefix, ip);
    }
    entry.parse::<IpAddr>().is_ok_and(|blocked| blocked == ip)
}

/// Check whether an IPv4 address lies inside `net/prefix`.
pub(crate) fn cidr_contains_v4(net: Ipv4Addr, prefix: u8, ip: Ipv4Addr) -> bool {
    if prefix == 0 {
        return true;
    }
    if prefix > 32 {
        return false;
    }
    let shift = 32u32.saturating_sub(u32::from(prefix));
    let mask = u32::MAX.checked_shl(shift).unwrap_or(0);
    (u32::from(net) & mask) == (u32::from(ip) & mask)
}

/// Approval workflow settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ApprovalSettings {
    /// TTL for pending requests, in seconds; expired entries are swept
    /// to `timed_out`.
    #[serde(default = "default_approval_timeout")]
    pub timeout_secs: u64,
    /// Maximum number of simultaneously pending requests.
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

fn default_approval_timeout() -> u64 {
    3600
}

fn default_max_pending() -> usize {
    100
}

impl Default for ApprovalSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_approval_timeout(),
            max_pending: default_max_pending(),
        }
    }
}

/// Sanitizer settings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SanitizeSettings {
    /// Maximum tolerated `../` / `..\` occurrences in a string value.
    ///
    /// This is a depth limit, not a hard ban: legitimate relative paths
    /// are allowed up to the bound. Set to 0 to reject any traversal.
    #[serde(default = "default_max_depth_traversal")]
    pub max_depth_traversal: u32,
}

fn default_max_depth_traversal() -> u32 {
    10
}

impl Default for SanitizeSettings {
    fn default() -> Self {
        Self {
            max_depth_traversal: default_max_depth_traversal(),
        }
    }
}

/// The full gateway policy document.
///
/// Immutable after [`validate`](crate::validate) passes; both gates hold
/// it behind an `Arc` and never mutate it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayPolicy {
    /// Explicit tool allow-list. Unknown tools are rejected (fail closed).
    #[serde(default)]
    pub allowed_tools: BTreeMap<String, ToolPolicy>,
    /// Tools rejected before any other check.
    #[serde(default)]
    pub blocked_tools: HashSet<String>,
    /// Risk policies, keyed by category name.
    #[serde(default)]
    pub tool_categories: BTreeMap<String, CategoryPolicy>,
    /// Network egress rules.
    #[serde(default)]
    pub network: NetworkPolicy,
    /// Approval workflow settings.
    #[serde(default)]
    pub approval: ApprovalSettings,
    /// Sanitizer settings.
    #[serde(default)]
    pub sanitize: SanitizeSettings,
}

impl GatewayPolicy {
    /// A permissive policy for development embedders: both plain and
    /// secure transport schemes, wildcard domain allow-list. The SSRF
    /// defenses and the literal-IP rejection still apply; they are not
    /// policy-controlled.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            network: NetworkPolicy {
                allowed_schemes: vec!["http".to_string(), "https".to_string()],
                allowed_domains: vec!["*".to_string()],
                ..NetworkPolicy::default()
            },
            ..Self::default()
        }
    }

    /// Look up an allow-listed tool.
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&ToolPolicy> {
        self.allowed_tools.get(name)
    }

    /// Check whether a tool is explicitly blocked.
    #[must_use]
    pub fn is_blocked(&self, name: &str) -> bool {
        self.blocked_tools.contains(name)
    }

    /// Look up a category policy.
    #[must_use]
    pub fn category(&self, name: &str) -> Option<&CategoryPolicy> {
        self.tool_categories.get(name)
    }

    /// Add an allow-listed tool (builder-style, mostly for embedders and tests).
    #[must_use]
    pub fn with_tool(mut self, name: impl Into<String>, tool: ToolPolicy) -> Self {
        self.allowed_tools.insert(name.into(), tool);
        self
    }

    /// Add a category policy.
    #[must_use]
    pub fn with_category(mut self, name: impl Into<String>, category: CategoryPolicy) -> Self {
        self.tool_categories.insert(name.into(), category);
        self
    }

    /// Block a tool outright.
    #[must_use]
    pub fn with_blocked_tool(mut self, name: impl Into<String>) -> Self {
        self.blocked_tools.insert(name.into());
        self
    }
}
