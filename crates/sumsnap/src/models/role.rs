use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    /// Gemini calls this role `model`; both spellings are accepted on input.
    #[serde(alias = "model")]
    Assistant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_accepts_model_alias() {
        let role: Role = serde_json::from_str("\"model\"").unwrap();
        assert_eq!(role, Role::Assistant);
        assert_eq!(serde_json::to_string(&role).unwrap(), "\"assistant\"");
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(serde_json::from_str::<Role>("\"system\"").is_err());
    }
}
