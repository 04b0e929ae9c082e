//! Browser POST policy signing

use crate::signature::{self, SigningCredentials, ALGORITHM};
use chrono::{DateTime, Utc};
use coffer_core::types::PostPolicy;
use std::collections::HashMap;

pub const FIELD_ALGORITHM: &str = "x-amz-algorithm";
pub const FIELD_CREDENTIAL: &str = "x-amz-credential";
pub const FIELD_DATE: &str = "x-amz-date";
pub const FIELD_POLICY: &str = "policy";
pub const FIELD_SIGNATURE: &str = "x-amz-signature";

/// Sign `policy`, returning the form fields a browser must submit.
///
/// The returned map holds the algorithm, credential, date, base64 policy
/// and signature fields. The signature is the hex HMAC of the base64 policy
/// under the date-scoped signing key.
pub fn sign_post_policy(
    policy: &PostPolicy,
    credentials: &SigningCredentials,
    now: DateTime<Utc>,
) -> HashMap<String, String> {
    let amz_date = signature::amz_date(&now);
    let date_stamp = signature::date_stamp(&now);
    let credential = credentials.credential(&date_stamp);

    let encoded = policy.encode(&[
        (FIELD_ALGORITHM, ALGORITHM),
        (FIELD_CREDENTIAL, &credential),
        (FIELD_DATE, &amz_date),
    ]);
    let signature = credentials.sign(&date_stamp, &encoded);

    let mut fields = HashMap::new();
    fields.insert(FIELD_ALGORITHM.to_string(), ALGORITHM.to_string());
    fields.insert(FIELD_CREDENTIAL.to_string(), credential);
    fields.insert(FIELD_DATE.to_string(), amz_date);
    fields.insert(FIELD_POLICY.to_string(), encoded);
    fields.insert(FIELD_SIGNATURE.to_string(), signature);
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use coffer_crypto::hmac_sha256;

    #[test]
    fn test_post_policy_fields() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let creds = SigningCredentials::new("minioadmin", "minioadmin", "us-east-1");
        let mut policy = PostPolicy::new("uploads", now + chrono::Duration::minutes(10));
        policy.add_equals_condition("key", "/avatars/me.png").unwrap();

        let fields = sign_post_policy(&policy, &creds, now);

        assert_eq!(fields.len(), 5);
        assert_eq!(fields[FIELD_ALGORITHM], "AWS4-HMAC-SHA256");
        assert_eq!(
            fields[FIELD_CREDENTIAL],
            "minioadmin/20240301/us-east-1/s3/aws4_request"
        );
        assert_eq!(fields[FIELD_DATE], "20240301T120000Z");

        let expected = hex::encode(hmac_sha256(
            &creds.signing_key("20240301"),
            fields[FIELD_POLICY].as_bytes(),
        ));
        assert_eq!(fields[FIELD_SIGNATURE], expected);
    }
}
