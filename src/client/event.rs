use std::collections::HashMap;

/// An application event to track. The token identifies the event kind at
/// the collector; parameters and revenue are optional.
#[derive(Debug, Clone)]
pub struct Event {
    token: String,
    params: HashMap<String, String>,
    revenue: Option<(f64, String)>,
}

impl Event {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            params: HashMap::new(),
            revenue: None,
        }
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_revenue(mut self, amount: f64, currency: impl Into<String>) -> Self {
        self.revenue = Some((amount, currency.into()));
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.token.trim().is_empty() {
            return Err("event token must not be empty".to_string());
        }
        Ok(())
    }

    pub(crate) fn into_payload(self) -> HashMap<String, String> {
        let mut payload = self.params;
        payload.insert("event_token".to_string(), self.token);
        if let Some((amount, currency)) = self.revenue {
            payload.insert("revenue".to_string(), amount.to_string());
            payload.insert("currency".to_string(), currency);
        }
        payload
    }
}

/// Ad revenue observed by the application, attributed to a mediation
/// source.
#[derive(Debug, Clone)]
pub struct AdRevenue {
    source: String,
    fields: HashMap<String, String>,
}

impl AdRevenue {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            fields: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if self.source.trim().is_empty() {
            return Err("ad revenue source must not be empty".to_string());
        }
        Ok(())
    }

    pub(crate) fn into_payload(self) -> HashMap<String, String> {
        let mut payload = self.fields;
        payload.insert("ad_source".to_string(), self.source);
        payload
    }
}
