//! Daraja STK callback payload.
//!
//! The provider posts a nested `Body.stkCallback` object. On success it
//! carries a `CallbackMetadata.Item` list of name/value pairs whose
//! order is not guaranteed; items are matched by name and absent items
//! are simply `None`.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<Value>,
}

impl StkCallback {
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }

    fn metadata_value(&self, name: &str) -> Option<&Value> {
        self.callback_metadata
            .as_ref()?
            .items
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }

    /// Metadata item as a string, whatever JSON type the provider used
    /// (receipts arrive as strings, phone numbers and dates as numbers).
    fn metadata_string(&self, name: &str) -> Option<String> {
        match self.metadata_value(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    pub fn mpesa_receipt(&self) -> Option<String> {
        self.metadata_string("MpesaReceiptNumber")
    }

    pub fn phone_number(&self) -> Option<String> {
        self.metadata_string("PhoneNumber")
    }

    pub fn transaction_date(&self) -> Option<String> {
        self.metadata_string("TransactionDate")
    }

    pub fn amount(&self) -> Option<f64> {
        self.metadata_value("Amount")?.as_f64()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn success_payload() -> CallbackEnvelope {
        serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "29115-34620561-1",
                        "CheckoutRequestID": "ws_CO_191220191020363925",
                        "ResultCode": 0,
                        "ResultDesc": "The service request is processed successfully.",
                        "CallbackMetadata": {
                            "Item": [
                                {"Name": "Amount", "Value": 79.00},
                                {"Name": "MpesaReceiptNumber", "Value": "NLJ7RT61SV"},
                                {"Name": "TransactionDate", "Value": 20191219102115},
                                {"Name": "PhoneNumber", "Value": 254712345678}
                            ]
                        }
                    }
                }
            }"#,
        )
        .expect("valid callback payload")
    }

    #[test]
    fn parses_success_callback() {
        let callback = success_payload().body.stk_callback;
        assert!(callback.is_success());
        assert_eq!(callback.checkout_request_id, "ws_CO_191220191020363925");
        assert_eq!(callback.mpesa_receipt().as_deref(), Some("NLJ7RT61SV"));
        assert_eq!(callback.phone_number().as_deref(), Some("254712345678"));
        assert_eq!(callback.transaction_date().as_deref(), Some("20191219102115"));
        assert_eq!(callback.amount(), Some(79.0));
    }

    #[test]
    fn metadata_is_matched_by_name_not_position() {
        let envelope: CallbackEnvelope = serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "m",
                        "CheckoutRequestID": "ws_x",
                        "ResultCode": 0,
                        "ResultDesc": "ok",
                        "CallbackMetadata": {
                            "Item": [
                                {"Name": "PhoneNumber", "Value": 254700000001},
                                {"Name": "MpesaReceiptNumber", "Value": "ABC123"}
                            ]
                        }
                    }
                }
            }"#,
        )
        .unwrap();
        let callback = envelope.body.stk_callback;
        assert_eq!(callback.mpesa_receipt().as_deref(), Some("ABC123"));
        assert_eq!(callback.phone_number().as_deref(), Some("254700000001"));
    }

    #[test]
    fn absent_metadata_items_are_none_not_errors() {
        let envelope: CallbackEnvelope = serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "m",
                        "CheckoutRequestID": "ws_x",
                        "ResultCode": 0,
                        "ResultDesc": "ok",
                        "CallbackMetadata": {"Item": []}
                    }
                }
            }"#,
        )
        .unwrap();
        let callback = envelope.body.stk_callback;
        assert!(callback.mpesa_receipt().is_none());
        assert!(callback.transaction_date().is_none());
        assert!(callback.amount().is_none());
    }

    #[test]
    fn parses_failure_callback_without_metadata() {
        let envelope: CallbackEnvelope = serde_json::from_str(
            r#"{
                "Body": {
                    "stkCallback": {
                        "MerchantRequestID": "29115-34620561-1",
                        "CheckoutRequestID": "ws_CO_191220191020363925",
                        "ResultCode": 1032,
                        "ResultDesc": "Request cancelled by user"
                    }
                }
            }"#,
        )
        .unwrap();
        let callback = envelope.body.stk_callback;
        assert!(!callback.is_success());
        assert_eq!(callback.result_code, 1032);
        assert!(callback.callback_metadata.is_none());
        assert!(callback.mpesa_receipt().is_none());
    }
}
