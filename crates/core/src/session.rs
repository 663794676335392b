use crate::llm::ChatError;

/// Identity of the signed-in user, handed explicitly to every call that
/// talks to the backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub access_token: String,
    pub display_name: Option<String>,
}

impl Session {
    pub fn new<U: Into<String>, T: Into<String>>(user_id: U, access_token: T) -> Result<Self, ChatError> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(ChatError::Auth("missing access token".into()));
        }
        let user_id = user_id.into();
        if user_id.trim().is_empty() {
            return Err(ChatError::Auth("missing user id".into()));
        }
        Ok(Self {
            user_id,
            access_token,
            display_name: None,
        })
    }

    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token.trim())
    }

    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.user_id)
    }
}
