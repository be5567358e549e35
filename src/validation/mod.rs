//! Request validation for gRPC handlers.
//!
//! Messages implement [`Validate`]; services decode requests through
//! [`ValidatingCodec`], which rejects invalid messages with
//! `InvalidArgument` carrying structured [`Violations`] in the status
//! details. The gateway turns those details into per-field HTTP errors.

mod codec;
mod proto;
mod templates;

pub use codec::{ValidatingCodec, ValidatingDecoder};
pub use proto::{
    Any, FieldPath, FieldPathElement, RpcStatus, Subscript, Violation, Violations,
    VIOLATIONS_TYPE_URL,
};
pub use templates::{MessageTemplates, TemplateArgs};

use bytes::Bytes;
use prost::Message;
use tonic::{Code, Status};

/// A message that can check its own field rules.
pub trait Validate {
    /// Every broken rule; empty when the message is valid.
    fn validate(&self) -> Vec<RuleViolation>;
}

/// One broken rule plus the values used to localize its message.
#[derive(Debug, Clone, Default)]
pub struct RuleViolation {
    pub violation: Violation,
    pub rule_value: Option<String>,
    pub field_value: Option<String>,
}

impl RuleViolation {
    /// Violation of `rule_id` with a fallback message.
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            violation: Violation {
                rule_id: Some(rule_id.into()),
                message: Some(message.into()),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Append a field name to the path.
    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.violation
            .field
            .get_or_insert_with(FieldPath::default)
            .elements
            .push(FieldPathElement {
                field_number: None,
                field_name: Some(name.into()),
                subscript: None,
            });
        self
    }

    /// Mark the last path element as a list element.
    pub fn index(self, index: u64) -> Self {
        self.subscript(Subscript::Index(index))
    }

    /// Mark the last path element as a map entry.
    pub fn key(self, key: impl Into<String>) -> Self {
        self.subscript(Subscript::StringKey(key.into()))
    }

    fn subscript(mut self, subscript: Subscript) -> Self {
        if let Some(last) = self
            .violation
            .field
            .as_mut()
            .and_then(|f| f.elements.last_mut())
        {
            last.subscript = Some(subscript);
        }
        self
    }

    /// Value of the rule (e.g. the minimum length).
    pub fn rule_value(mut self, value: impl ToString) -> Self {
        self.rule_value = Some(value.to_string());
        self
    }

    /// Offending field value.
    pub fn field_value(mut self, value: impl ToString) -> Self {
        self.field_value = Some(value.to_string());
        self
    }

    /// Replace the message with the localized template, when one exists.
    pub fn localize(self, templates: &MessageTemplates) -> Violation {
        let mut violation = self.violation;
        let field = violation
            .field
            .as_ref()
            .and_then(|f| f.elements.first())
            .and_then(|el| el.field_name.clone())
            .unwrap_or_default();

        let rendered = templates.render(
            violation.rule_id(),
            TemplateArgs {
                field: &field,
                rule_value: self.rule_value.as_deref(),
                field_value: self.field_value.as_deref(),
            },
        );
        if let Some(message) = rendered {
            violation.message = Some(message);
        }
        violation
    }
}

/// Build the `InvalidArgument` status for a failed validation.
pub fn invalid_argument(violations: Vec<RuleViolation>, templates: &MessageTemplates) -> Status {
    let violations: Vec<Violation> = violations
        .into_iter()
        .map(|v| v.localize(templates))
        .collect();

    let summary = violations
        .iter()
        .map(|v| format!("{}: {} [{}]", v.field_path(), v.message(), v.rule_id()))
        .collect::<Vec<_>>()
        .join("; ");
    let message = format!("validation error: {}", summary);

    let details = RpcStatus {
        code: Code::InvalidArgument as i32,
        message: message.clone(),
        details: vec![Any {
            type_url: VIOLATIONS_TYPE_URL.to_string(),
            value: Violations { violations }.encode_to_vec(),
        }],
    };

    Status::with_details(
        Code::InvalidArgument,
        message,
        Bytes::from(details.encode_to_vec()),
    )
}

/// Extract packed violations from a status, if any.
pub fn violations_from_status(status: &Status) -> Vec<Violation> {
    if status.details().is_empty() {
        return Vec::new();
    }
    let Ok(rpc) = RpcStatus::decode(status.details()) else {
        return Vec::new();
    };

    rpc.details
        .iter()
        .filter(|any| any.type_url == VIOLATIONS_TYPE_URL)
        .filter_map(|any| Violations::decode(any.value.as_slice()).ok())
        .flat_map(|v| v.violations)
        .collect()
}
