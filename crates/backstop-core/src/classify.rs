//! AI error classification.
//!
//! Maps any normalizable error to an [`AiError`]: a category, a message fit
//! for end users, a retryable flag and a ranked list of recovery actions the
//! UI can offer. Classification is a flat decision table evaluated top to
//! bottom; the first matching row wins:
//!
//! 1. statuses that decide on their own (429, 401, 403),
//! 2. substring rules on the lowercased message,
//! 3. the remaining status ranges (400, other 4xx, 5xx),
//! 4. `unknown`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::failure::{Failure, Normalize};

/// Coarse error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    RateLimit,
    Network,
    Timeout,
    ContextLength,
    ModelUnavailable,
    Quota,
    Validation,
    Parsing,
    Api,
    Unknown,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::ContextLength => "context_length",
            ErrorCategory::ModelUnavailable => "model_unavailable",
            ErrorCategory::Quota => "quota",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Parsing => "parsing",
            ErrorCategory::Api => "api",
            ErrorCategory::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A next step the user can take after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    Retry,
    WaitAndRetry,
    RetryWithSmallerContext,
    SwitchModel,
    CheckConnection,
    CheckApiKey,
    UpgradePlan,
    EditInput,
    ContactSupport,
}

impl RecoveryAction {
    /// Stable identifier, same as the serialized form.
    pub fn id(&self) -> &'static str {
        match self {
            RecoveryAction::Retry => "retry",
            RecoveryAction::WaitAndRetry => "wait_and_retry",
            RecoveryAction::RetryWithSmallerContext => "retry_with_smaller_context",
            RecoveryAction::SwitchModel => "switch_model",
            RecoveryAction::CheckConnection => "check_connection",
            RecoveryAction::CheckApiKey => "check_api_key",
            RecoveryAction::UpgradePlan => "upgrade_plan",
            RecoveryAction::EditInput => "edit_input",
            RecoveryAction::ContactSupport => "contact_support",
        }
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            RecoveryAction::Retry => "Try Again",
            RecoveryAction::WaitAndRetry => "Wait and Retry",
            RecoveryAction::RetryWithSmallerContext => "Retry with Less Context",
            RecoveryAction::SwitchModel => "Use Different Model",
            RecoveryAction::CheckConnection => "Check Connection",
            RecoveryAction::CheckApiKey => "Check API Key",
            RecoveryAction::UpgradePlan => "Upgrade Plan",
            RecoveryAction::EditInput => "Edit Input",
            RecoveryAction::ContactSupport => "Contact Support",
        }
    }

    /// One-line explanation shown under the label.
    pub fn description(&self) -> &'static str {
        match self {
            RecoveryAction::Retry => "Send the same request again.",
            RecoveryAction::WaitAndRetry => "Wait for the rate limit window to reset, then retry.",
            RecoveryAction::RetryWithSmallerContext => {
                "Trim the prompt or attached documents and retry."
            }
            RecoveryAction::SwitchModel => "Retry the request with another model.",
            RecoveryAction::CheckConnection => "Make sure you are online and the API is reachable.",
            RecoveryAction::CheckApiKey => "Verify the API key and its permissions.",
            RecoveryAction::UpgradePlan => "Add credits or move to a plan with a higher quota.",
            RecoveryAction::EditInput => "Fix the request content and submit it again.",
            RecoveryAction::ContactSupport => "Reach out to support with the error details.",
        }
    }
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified error, ready for presentation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiError {
    pub category: ErrorCategory,
    /// The original error message.
    pub message: String,
    /// Message suitable for end users.
    pub user_message: String,
    /// Suggested next steps, most relevant first.
    pub recovery_actions: Vec<RecoveryAction>,
    pub retryable: bool,
    /// How long to wait before retrying, when that is known or advisable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_wait_ms: Option<u64>,
}

impl AiError {
    /// The default suggestion.
    pub fn primary_action(&self) -> RecoveryAction {
        self.recovery_actions
            .first()
            .copied()
            .unwrap_or(RecoveryAction::ContactSupport)
    }
}

impl fmt::Display for AiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.category, self.user_message)
    }
}

impl std::error::Error for AiError {}

// ---------------------------------------------------------------------------
// Decision table
// ---------------------------------------------------------------------------

use RecoveryAction::*;

struct Outcome {
    category: ErrorCategory,
    user_message: &'static str,
    retryable: bool,
    wait_ms: Option<u64>,
    actions: &'static [RecoveryAction],
}

struct MessageRule {
    needles: &'static [&'static str],
    outcome: Outcome,
}

impl MessageRule {
    fn matches(&self, lowered: &str) -> bool {
        self.needles.iter().any(|needle| lowered.contains(needle))
    }
}

const RATE_LIMITED: Outcome = Outcome {
    category: ErrorCategory::RateLimit,
    user_message: "Too many requests. Please wait a moment before trying again.",
    retryable: true,
    wait_ms: Some(60_000),
    actions: &[WaitAndRetry, SwitchModel, UpgradePlan],
};

const AUTH_FAILED: Outcome = Outcome {
    category: ErrorCategory::Api,
    user_message: "Authentication failed. Check that your API key is valid and has access to this model.",
    retryable: false,
    wait_ms: None,
    actions: &[CheckApiKey, ContactSupport],
};

const BAD_REQUEST: Outcome = Outcome {
    category: ErrorCategory::Validation,
    user_message: "The request was rejected as invalid. Review your input and try again.",
    retryable: false,
    wait_ms: None,
    actions: &[EditInput, ContactSupport],
};

const CLIENT_ERROR: Outcome = Outcome {
    category: ErrorCategory::Api,
    user_message: "The AI service refused the request.",
    retryable: false,
    wait_ms: None,
    actions: &[EditInput, SwitchModel, ContactSupport],
};

const SERVER_ERROR: Outcome = Outcome {
    category: ErrorCategory::Api,
    user_message: "The AI service had an internal problem. Trying again usually helps.",
    retryable: true,
    wait_ms: Some(5_000),
    actions: &[Retry, SwitchModel, ContactSupport],
};

const UNKNOWN: Outcome = Outcome {
    category: ErrorCategory::Unknown,
    user_message: "Something went wrong. Please try again, and contact support if it keeps happening.",
    retryable: true,
    wait_ms: None,
    actions: &[Retry, ContactSupport],
};

const MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        needles: &["rate limit", "rate_limit", "ratelimit", "too many requests"],
        outcome: RATE_LIMITED,
    },
    MessageRule {
        needles: &[
            "network",
            "fetch failed",
            "failed to fetch",
            "econnrefused",
            "econnreset",
            "enotfound",
            "connection refused",
            "connection reset",
            "connection closed",
            "dns error",
            "socket hang up",
        ],
        outcome: Outcome {
            category: ErrorCategory::Network,
            user_message: "Could not reach the AI service. Check your connection and try again.",
            retryable: true,
            wait_ms: Some(2_000),
            actions: &[Retry, CheckConnection, ContactSupport],
        },
    },
    MessageRule {
        needles: &["timeout", "timed out", "etimedout", "deadline exceeded"],
        outcome: Outcome {
            category: ErrorCategory::Timeout,
            user_message: "The request took too long. Try again, or reduce the amount of context sent.",
            retryable: true,
            wait_ms: Some(1_000),
            actions: &[Retry, RetryWithSmallerContext, SwitchModel],
        },
    },
    MessageRule {
        needles: &[
            "context length",
            "context_length",
            "context window",
            "maximum context",
            "too many tokens",
            "token limit",
            "prompt is too long",
        ],
        outcome: Outcome {
            category: ErrorCategory::ContextLength,
            user_message: "The request is too large for this model. Shorten the input or pick a model with a larger context window.",
            retryable: false,
            wait_ms: None,
            actions: &[RetryWithSmallerContext, SwitchModel, EditInput],
        },
    },
    MessageRule {
        needles: &[
            "model not found",
            "model_not_found",
            "model unavailable",
            "model is unavailable",
            "model is currently",
            "no such model",
            "overloaded",
        ],
        outcome: Outcome {
            category: ErrorCategory::ModelUnavailable,
            user_message: "The selected model is unavailable right now. Try another model or retry shortly.",
            retryable: true,
            wait_ms: Some(30_000),
            actions: &[SwitchModel, WaitAndRetry, ContactSupport],
        },
    },
    MessageRule {
        needles: &[
            "quota",
            "billing",
            "payment required",
            "credit balance",
            "out of credits",
        ],
        outcome: Outcome {
            category: ErrorCategory::Quota,
            user_message: "Your usage quota has been reached. Add credits or upgrade your plan to continue.",
            retryable: false,
            wait_ms: None,
            actions: &[UpgradePlan, SwitchModel, ContactSupport],
        },
    },
    MessageRule {
        needles: &[
            "unauthorized",
            "authentication",
            "invalid api key",
            "invalid_api_key",
            "permission denied",
            "forbidden",
        ],
        outcome: AUTH_FAILED,
    },
    MessageRule {
        needles: &[
            "validation",
            "invalid request",
            "invalid_request",
            "invalid parameter",
            "invalid argument",
            "invalid input",
            "bad request",
            "unprocessable",
        ],
        outcome: BAD_REQUEST,
    },
    MessageRule {
        needles: &[
            "json",
            "parse",
            "unexpected token",
            "unexpected end",
            "syntax error",
            "deserializ",
        ],
        outcome: Outcome {
            category: ErrorCategory::Parsing,
            user_message: "The AI response could not be read. Trying again usually helps.",
            retryable: true,
            wait_ms: None,
            actions: &[Retry, SwitchModel, ContactSupport],
        },
    },
];

fn decisive_status(status: Option<u16>) -> Option<&'static Outcome> {
    match status? {
        429 => Some(&RATE_LIMITED),
        401 | 403 => Some(&AUTH_FAILED),
        _ => None,
    }
}

fn status_outcome(status: Option<u16>) -> Option<&'static Outcome> {
    match status? {
        400 => Some(&BAD_REQUEST),
        500..=599 => Some(&SERVER_ERROR),
        400..=499 => Some(&CLIENT_ERROR),
        _ => None,
    }
}

/// Classify any normalizable error.
pub fn classify<E: Normalize + ?Sized>(error: &E) -> AiError {
    classify_failure(&error.normalize())
}

/// Classify an already-normalized failure.
pub fn classify_failure(failure: &Failure) -> AiError {
    let lowered = failure.message.to_lowercase();

    let outcome = decisive_status(failure.status)
        .or_else(|| {
            MESSAGE_RULES
                .iter()
                .find(|rule| rule.matches(&lowered))
                .map(|rule| &rule.outcome)
        })
        .or_else(|| status_outcome(failure.status))
        .unwrap_or(&UNKNOWN);

    let suggested_wait_ms = if outcome.retryable {
        failure.retry_after_ms.or(outcome.wait_ms)
    } else {
        None
    };

    tracing::debug!(
        category = %outcome.category,
        status = ?failure.status,
        retryable = outcome.retryable,
        "classified error"
    );

    AiError {
        category: outcome.category,
        message: failure.message.clone(),
        user_message: outcome.user_message.to_string(),
        recovery_actions: outcome.actions.to_vec(),
        retryable: outcome.retryable,
        suggested_wait_ms,
    }
}
