//! Browser-form POST policy

use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// Conditions a browser form upload must satisfy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostPolicy {
    pub bucket: String,
    pub expiration: DateTime<Utc>,
    conditions: Vec<(String, String)>,
}

impl PostPolicy {
    pub fn new(bucket: impl Into<String>, expiration: DateTime<Utc>) -> Self {
        Self {
            bucket: bucket.into(),
            expiration,
            conditions: Vec::new(),
        }
    }

    /// Require form field `field` to equal `value`
    pub fn add_equals_condition(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        if field.is_empty() {
            return Err(Error::InvalidArgument("Condition field cannot be empty".into()));
        }
        if field == "bucket" {
            return Err(Error::InvalidArgument("Bucket is implied by the policy".into()));
        }
        self.conditions.push((field.to_string(), value.into()));
        Ok(())
    }

    /// Value of an equality condition
    pub fn condition(&self, field: &str) -> Option<&str> {
        self.conditions
            .iter()
            .find(|(f, _)| f == field)
            .map(|(_, v)| v.as_str())
    }

    /// Policy JSON including the signing conditions
    pub fn to_json(&self, signing: &[(&str, &str)]) -> String {
        let mut conditions: Vec<Value> = vec![json!(["eq", "$bucket", self.bucket])];
        for (field, value) in &self.conditions {
            conditions.push(json!(["eq", format!("${}", field), value]));
        }
        for (field, value) in signing {
            conditions.push(json!(["eq", format!("${}", field), value]));
        }

        json!({
            "expiration": self.expiration.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            "conditions": conditions,
        })
        .to_string()
    }

    /// Base64 form of [`PostPolicy::to_json`], the value of the `policy` field
    pub fn encode(&self, signing: &[(&str, &str)]) -> String {
        STANDARD.encode(self.to_json(signing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_policy_json() {
        let expiration = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let mut policy = PostPolicy::new("uploads", expiration);
        policy.add_equals_condition("key", "/avatars/me.png").unwrap();

        let json: Value = serde_json::from_str(&policy.to_json(&[("x-amz-algorithm", "AWS4-HMAC-SHA256")])).unwrap();
        assert_eq!(json["expiration"], "2024-03-01T12:00:00.000Z");
        assert_eq!(json["conditions"][0], json!(["eq", "$bucket", "uploads"]));
        assert_eq!(json["conditions"][1], json!(["eq", "$key", "/avatars/me.png"]));
        assert_eq!(
            json["conditions"][2],
            json!(["eq", "$x-amz-algorithm", "AWS4-HMAC-SHA256"])
        );
        assert_eq!(policy.condition("key"), Some("/avatars/me.png"));
    }

    #[test]
    fn test_rejects_bucket_condition() {
        let mut policy = PostPolicy::new("uploads", Utc::now());
        assert!(policy.add_equals_condition("bucket", "x").is_err());
        assert!(policy.add_equals_condition("", "x").is_err());
    }
}
