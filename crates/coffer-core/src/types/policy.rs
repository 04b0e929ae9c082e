//! Bucket access policies
//!
//! Canned anonymous-access templates plus typed policy documents used to
//! parse and validate them.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Placeholder substituted by the bucket name in every template
pub const BUCKET_PLACEHOLDER: &str = "my-defaultBucketName";

const READ_ONLY_TEMPLATE: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:GetBucketLocation"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName"
            ]
        },
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:ListBucket"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName"
            ],
            "Condition": {
                "StringEquals": {
                    "s3:prefix": [
                        "*"
                    ]
                }
            }
        },
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:GetObject"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName/**"
            ]
        }
    ]
}"#;

const WRITE_ONLY_TEMPLATE: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:GetBucketLocation",
                "s3:ListBucketMultipartUploads"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName"
            ]
        },
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:PutObject",
                "s3:AbortMultipartUpload",
                "s3:DeleteObject",
                "s3:ListMultipartUploadParts"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName/**"
            ]
        }
    ]
}"#;

const READ_WRITE_TEMPLATE: &str = r#"{
    "Version": "2012-10-17",
    "Statement": [
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:GetBucketLocation",
                "s3:ListBucketMultipartUploads"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName"
            ]
        },
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:ListBucket"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName"
            ],
            "Condition": {
                "StringEquals": {
                    "s3:prefix": [
                        "*"
                    ]
                }
            }
        },
        {
            "Effect": "Allow",
            "Principal": {
                "AWS": [
                    "*"
                ]
            },
            "Action": [
                "s3:ListMultipartUploadParts",
                "s3:PutObject",
                "s3:AbortMultipartUpload",
                "s3:DeleteObject",
                "s3:GetObject"
            ],
            "Resource": [
                "arn:aws:s3:::my-defaultBucketName/**"
            ]
        }
    ]
}"#;

/// Canned anonymous-access policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyType {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl PolicyType {
    pub const ALL: [PolicyType; 3] = [PolicyType::ReadOnly, PolicyType::WriteOnly, PolicyType::ReadWrite];

    pub fn description(&self) -> &'static str {
        match self {
            PolicyType::ReadOnly => "anonymous read",
            PolicyType::WriteOnly => "anonymous write",
            PolicyType::ReadWrite => "anonymous read and write",
        }
    }

    /// Raw template with the bucket placeholder
    pub fn template(&self) -> &'static str {
        match self {
            PolicyType::ReadOnly => READ_ONLY_TEMPLATE,
            PolicyType::WriteOnly => WRITE_ONLY_TEMPLATE,
            PolicyType::ReadWrite => READ_WRITE_TEMPLATE,
        }
    }

    /// Policy JSON for `bucket` (verbatim substitution)
    pub fn render(&self, bucket: &str) -> String {
        self.template().replace(BUCKET_PLACEHOLDER, bucket)
    }

    /// Rendered policy parsed into a document
    pub fn document(&self, bucket: &str) -> Result<PolicyDocument> {
        PolicyDocument::from_json(&self.render(bucket))
    }
}

impl fmt::Display for PolicyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PolicyType::ReadOnly => "read-only",
            PolicyType::WriteOnly => "write-only",
            PolicyType::ReadWrite => "read-write",
        };
        f.write_str(s)
    }
}

impl FromStr for PolicyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "read-only" | "readonly" => Ok(PolicyType::ReadOnly),
            "write-only" | "writeonly" => Ok(PolicyType::WriteOnly),
            "read-write" | "readwrite" => Ok(PolicyType::ReadWrite),
            other => Err(Error::InvalidArgument(format!("Unknown policy type: {}", other))),
        }
    }
}

/// IAM Policy Document (AWS-compatible)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub statement: Vec<Statement>,
}

fn default_version() -> String {
    "2012-10-17".to_string()
}

impl PolicyDocument {
    pub fn new() -> Self {
        Self {
            version: default_version(),
            id: None,
            statement: Vec::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::InvalidArgument(format!("Malformed policy document: {}", e)))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| Error::InvalidArgument(format!("Cannot serialize policy: {}", e)))
    }
}

impl Default for PolicyDocument {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,

    pub effect: Effect,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<Principal>,

    #[serde(default)]
    pub action: StringOrArray,

    #[serde(default)]
    pub resource: StringOrArray,

    /// operator -> condition key -> accepted values
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<HashMap<String, HashMap<String, StringOrArray>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Principal {
    Wildcard(String),
    Specific(HashMap<String, StringOrArray>),
}

/// String or array of strings (common in IAM policies)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    String(String),
    Array(Vec<String>),
}

impl StringOrArray {
    pub fn as_slice(&self) -> &[String] {
        match self {
            StringOrArray::String(s) => std::slice::from_ref(s),
            StringOrArray::Array(arr) => arr.as_slice(),
        }
    }
}

impl Default for StringOrArray {
    fn default() -> Self {
        StringOrArray::Array(vec![])
    }
}

/// Request evaluation against a policy document, used to check the canned
/// templates grant what they claim
#[cfg(test)]
mod evaluation {
    use super::*;

    impl PolicyDocument {
        pub(crate) fn add_statement(mut self, statement: Statement) -> Self {
            self.statement.push(statement);
            self
        }

        /// Evaluate policy against a request (explicit deny wins, default deny)
        pub(crate) fn evaluate(&self, request: &PolicyRequest) -> PolicyEffect {
            let mut explicit_allow = false;

            for statement in &self.statement {
                match statement.evaluate(request) {
                    StatementResult::ExplicitDeny => return PolicyEffect::Deny,
                    StatementResult::Allow => explicit_allow = true,
                    StatementResult::NoMatch => continue,
                }
            }

            if explicit_allow {
                PolicyEffect::Allow
            } else {
                PolicyEffect::Deny
            }
        }
    }

    impl Statement {
        pub(crate) fn allow() -> Self {
            Self::with_effect(Effect::Allow)
        }

        pub(crate) fn deny() -> Self {
            Self::with_effect(Effect::Deny)
        }

        fn with_effect(effect: Effect) -> Self {
            Self {
                sid: None,
                effect,
                principal: None,
                action: StringOrArray::Array(vec![]),
                resource: StringOrArray::Array(vec![]),
                condition: None,
            }
        }

        pub(crate) fn with_actions(mut self, actions: Vec<String>) -> Self {
            self.action = StringOrArray::Array(actions);
            self
        }

        pub(crate) fn with_resources(mut self, resources: Vec<String>) -> Self {
            self.resource = StringOrArray::Array(resources);
            self
        }

        fn evaluate(&self, request: &PolicyRequest) -> StatementResult {
            if !self.matches_action(&request.action) || !self.matches_resource(&request.resource) {
                return StatementResult::NoMatch;
            }

            if let Some(ref principal) = self.principal {
                if !principal.matches(&request.principal) {
                    return StatementResult::NoMatch;
                }
            }

            if let Some(ref condition) = self.condition {
                if !conditions_hold(condition, &request.context) {
                    return StatementResult::NoMatch;
                }
            }

            match self.effect {
                Effect::Allow => StatementResult::Allow,
                Effect::Deny => StatementResult::ExplicitDeny,
            }
        }

        fn matches_action(&self, action: &str) -> bool {
            self.action
                .as_slice()
                .iter()
                .any(|pattern| {
                    pattern == "*" || pattern == "s3:*" || matches_wildcard(pattern, action)
                })
        }

        fn matches_resource(&self, resource: &str) -> bool {
            let resources = self.resource.as_slice();
            if resources.is_empty() {
                return true;
            }
            resources
                .iter()
                .any(|pattern| pattern == "*" || matches_wildcard(pattern, resource))
        }
    }

    /// `StringEquals` compares literally, `StringLike` with wildcards.
    /// Unknown operators never hold.
    fn conditions_hold(
        condition: &HashMap<String, HashMap<String, StringOrArray>>,
        context: &HashMap<String, String>,
    ) -> bool {
        condition.iter().all(|(operator, entries)| {
            entries.iter().all(|(key, accepted)| {
                let Some(actual) = context.get(key) else {
                    return false;
                };
                match operator.as_str() {
                    "StringEquals" => accepted.as_slice().iter().any(|v| v == actual),
                    "StringLike" => accepted.as_slice().iter().any(|v| matches_wildcard(v, actual)),
                    _ => false,
                }
            })
        })
    }

    impl Principal {
        pub(crate) fn matches(&self, principal: &str) -> bool {
            match self {
                Principal::Wildcard(s) => s == "*",
                Principal::Specific(map) => map.values().any(|values| {
                    values
                        .as_slice()
                        .iter()
                        .any(|v| v == "*" || v == principal || matches_wildcard(v, principal))
                }),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub(crate) struct PolicyRequest {
        /// e.g. "s3:GetObject"
        pub action: String,
        pub resource: String,
        pub principal: String,
        pub context: HashMap<String, String>,
    }

    impl PolicyRequest {
        /// Anonymous request
        pub(crate) fn anonymous(action: impl Into<String>, resource: impl Into<String>) -> Self {
            Self {
                action: action.into(),
                resource: resource.into(),
                principal: "*".to_string(),
                context: HashMap::new(),
            }
        }

        pub(crate) fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
            self.context.insert(key.into(), value.into());
            self
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum StatementResult {
        Allow,
        ExplicitDeny,
        NoMatch,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum PolicyEffect {
        Allow,
        Deny,
    }

    /// Simple wildcard matching (supports * and ?)
    pub(crate) fn matches_wildcard(pattern: &str, text: &str) -> bool {
        let pattern: Vec<char> = pattern.chars().collect();
        let text: Vec<char> = text.chars().collect();
        let (mut p, mut t) = (0, 0);
        let mut backtrack: Option<(usize, usize)> = None;

        while t < text.len() {
            match pattern.get(p) {
                Some('*') => {
                    backtrack = Some((p, t));
                    p += 1;
                }
                Some(&c) if c == '?' || c == text[t] => {
                    p += 1;
                    t += 1;
                }
                _ => match backtrack {
                    Some((star_p, star_t)) => {
                        p = star_p + 1;
                        t = star_t + 1;
                        backtrack = Some((star_p, star_t + 1));
                    }
                    None => return false,
                },
            }
        }

        pattern[p..].iter().all(|&c| c == '*')
    }

    /// ARN of a bucket
    pub(crate) fn bucket_arn(bucket: &str) -> String {
        format!("arn:aws:s3:::{}", bucket)
    }

    /// ARN of an object
    pub(crate) fn object_arn(bucket: &str, key: &str) -> String {
        format!("arn:aws:s3:::{}/{}", bucket, key)
    }
}
