//! Outcome of a single validate() call.

/// Either "redirect to this URL" or "proceed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    redirect_url: Option<String>,
}

impl ValidationResult {
    pub fn redirect(url: impl Into<String>) -> Self {
        Self {
            redirect_url: Some(url.into()),
        }
    }

    pub fn proceed() -> Self {
        Self { redirect_url: None }
    }

    pub fn need_redirect(&self) -> bool {
        self.redirect_url.is_some()
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn into_redirect_url(self) -> Option<String> {
        self.redirect_url
    }
}
