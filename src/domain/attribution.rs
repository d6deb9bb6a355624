use serde::{Deserialize, Serialize};

/// Campaign metadata explaining how the user was acquired.
///
/// Every field is optional; the collector only sends what it knows. Change
/// detection is structural equality against the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributionSnapshot {
    pub tracker_token: Option<String>,
    pub tracker_name: Option<String>,
    pub network: Option<String>,
    pub campaign: Option<String>,
    pub adgroup: Option<String>,
    pub creative: Option<String>,
    pub click_label: Option<String>,
}

impl AttributionSnapshot {
    /// True when no field is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracker_token.is_none()
            && self.tracker_name.is_none()
            && self.network.is_none()
            && self.campaign.is_none()
            && self.adgroup.is_none()
            && self.creative.is_none()
            && self.click_label.is_none()
    }
}
