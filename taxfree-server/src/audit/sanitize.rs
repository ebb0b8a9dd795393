//! Metadata redaction before it reaches the audit log

use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

/// Key fragments whose values never reach the audit log
const SENSITIVE_KEYS: &[&str] = &[
    "password",
    "token",
    "api_key",
    "secret",
    "passport_number",
    "card_number",
    "cvv",
    "pin",
    "account_number",
];

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|k| key.contains(k))
}

/// Recursively replace values of sensitive keys with `"[REDACTED]"`
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| {
                    if is_sensitive(&k) {
                        (k, Value::String(REDACTED.into()))
                    } else {
                        (k, sanitize(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redacts_nested_keys() {
        let input = json!({
            "voucher_number": "202601ABCD1234",
            "traveler": { "Passport_Number": "P1234567", "name": "Ada" },
            "payments": [{ "card_number": "4111", "amount": "10" }],
            "scan_token": "abc|def",
        });
        let out = sanitize(input);
        assert_eq!(out["voucher_number"], "202601ABCD1234");
        assert_eq!(out["traveler"]["Passport_Number"], REDACTED);
        assert_eq!(out["traveler"]["name"], "Ada");
        assert_eq!(out["payments"][0]["card_number"], REDACTED);
        assert_eq!(out["payments"][0]["amount"], "10");
        assert_eq!(out["scan_token"], REDACTED);
    }

    #[test]
    fn test_scalars_untouched() {
        assert_eq!(sanitize(json!(42)), json!(42));
        assert_eq!(sanitize(json!("pin")), json!("pin"));
    }
}
