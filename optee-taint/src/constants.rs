//! Fixed tables and defaults used across phases.

use crate::model::SinkRule;

/// Maximum backward-traversal depth for the call graph walk in P4,
/// unless overridden by config.
pub const DEFAULT_MAX_DEPTH: usize = 8;

/// Minimum interval between successive LLM calls, in milliseconds,
/// enforced by the global rate limiter.
pub const DEFAULT_MIN_CALL_INTERVAL_MS: u64 = 700;

/// Per-call LLM timeout floor, in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS_MIN: u64 = 60;

/// Per-call LLM timeout ceiling, in seconds.
pub const DEFAULT_LLM_TIMEOUT_SECS_MAX: u64 = 120;

/// Base delay for exponential backoff retries, in seconds.
pub const RETRY_BASE_DELAY_SECS: u64 = 2;

/// Cap on exponential backoff delay, in seconds.
pub const RETRY_MAX_DELAY_SECS: u64 = 60;

/// Maximum retry attempts for a retriable LLM error.
pub const RETRY_MAX_ATTEMPTS: u32 = 3;

/// Default LRU capacity of the chain-prefix conversation cache.
pub const DEFAULT_PREFIX_CACHE_CAPACITY: usize = 512;

/// Directory names excluded from TA source-tree discovery by default.
pub const DEFAULT_EXCLUDE_DIRS: &[&str] = &[".git", "build", "out", "optee_os", "optee_client"];

/// The four standard OP-TEE TA entry-point function names.
pub const TA_ENTRY_POINTS: &[&str] = &[
    "TA_CreateEntryPoint",
    "TA_DestroyEntryPoint",
    "TA_OpenSessionEntryPoint",
    "TA_InvokeCommandEntryPoint",
    "TA_CloseSessionEntryPoint",
];

/// Known-dangerous TEE Internal Core / GlobalPlatform API rule table,
/// matched by exact function name in P3.
///
/// Parameter indices are zero-based positions in the call's argument
/// list, per the published TEE Internal Core API reference.
pub const SINK_RULES: &[SinkRule] = &[
    // UDO: unencrypted data crossing out through a REE-visible parameter.
    SinkRule {
        function: "TEE_MemMove",
        tainted_params: &[0],
        category: "UDO",
    },
    SinkRule {
        function: "memcpy",
        tainted_params: &[0],
        category: "UDO",
    },
    SinkRule {
        function: "TEE_GetObjectValueByName",
        tainted_params: &[0, 1],
        category: "UDO",
    },
    // IVW: untrusted REE-controlled input entering without validation.
    SinkRule {
        function: "TEE_CheckMemoryAccessRights",
        tainted_params: &[1, 2],
        category: "IVW",
    },
    SinkRule {
        function: "TEE_Param",
        tainted_params: &[0],
        category: "IVW",
    },
    // DUS: shared-memory buffer reused unsafely across the trust boundary.
    SinkRule {
        function: "TEE_MemFill",
        tainted_params: &[0],
        category: "DUS",
    },
    SinkRule {
        function: "TEE_BigIntConvertFromOctetString",
        tainted_params: &[1],
        category: "DUS",
    },
];

/// Looks up the sink rule matching an exact called-function name.
#[must_use]
pub fn find_sink_rule(function_name: &str) -> Option<&'static SinkRule> {
    SINK_RULES.iter().find(|rule| rule.function == function_name)
}

/// Functions whose presence on a candidate chain is treated as a
/// cryptographic guard: per spec.md's consistency rule 4, a chain
/// whose only mitigation is a call to one of these is downgraded to
/// `no` rather than left at `suspected`.
pub const CRYPTO_GUARD_FUNCTIONS: &[&str] = &[
    "TEE_AEEncryptFinal",
    "TEE_AEDecryptFinal",
    "TEE_CipherDoFinal",
    "TEE_MACCompareFinal",
    "TEE_AsymmetricVerifyDigest",
];

/// Cryptographic-primitive APIs that produce output but are not
/// themselves a dangerous-output sink, used by P3's rule table as
/// `DANGEROUS_OUTPUT_SINKS` counterpoint: a chain whose sink set is a
/// subset of [`CRYPTO_GUARD_FUNCTIONS`] and contains none of these is
/// eligible for the crypto-only downgrade (spec.md §5 rule 4).
pub const DANGEROUS_OUTPUT_SINKS: &[&str] = &["TEE_MemMove", "memcpy", "TEE_MemFill"];

/// Function-like diagnostic macros excluded from P4's sink call-site
/// detection by default (spec.md §4.4 Step 1): a `trace_printf` call
/// surfaced through one of these wrapper macros is not itself a
/// taint sink worth chasing unless the run was configured with
/// `--include-debug-macros`.
pub const DEBUG_MACRO_NAMES: &[&str] = &["trace_printf", "DMSG", "EMSG", "IMSG", "FMSG"];

/// Infers a UDO/IVW/DUS category tag from an LLM-supplied sink reason
/// when no rule-table entry supplied one directly.
///
/// P3's prompt only ever asks the model for `(function, param_index,
/// reason)` triples, not a category, so this keyword heuristic is how
/// an LLM-identified sink gets classified for the report. Defaults to
/// `UDO`, the most common bad-partitioning category in OP-TEE TAs.
#[must_use]
pub fn infer_category_from_reason(reason: &str) -> &'static str {
    let lower = reason.to_lowercase();
    if lower.contains("shared") || lower.contains("reuse") || lower.contains("stale") {
        "DUS"
    } else if lower.contains("valid") || lower.contains("bound") || lower.contains("size") || lower.contains("input") {
        "IVW"
    } else {
        "UDO"
    }
}
