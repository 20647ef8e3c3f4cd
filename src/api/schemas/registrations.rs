use serde::Deserialize;

/// Missing fields deserialize to empty strings so validation reports them like any bad value.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[derive(Debug, Deserialize)]
pub struct DeregisterRequest {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_reads_type_field() {
        let req: RegisterRequest =
            serde_json::from_str(r#"{"token":"abc","topic":"def","type":"apple"}"#).unwrap();
        assert_eq!(req.kind, "apple");
    }

    #[test]
    fn test_deregister_type_is_optional() {
        let req: DeregisterRequest = serde_json::from_str(r#"{"token":"abc","topic":"def"}"#).unwrap();
        assert!(req.kind.is_none());
    }
}
