use lazy_static::lazy_static;
use regex::Regex;

// /subscriptions/{sub}/resourceGroups/{rg}/providers/{namespace}/{type}/{name}[/...]
const ARM_ID_RE: &str = r"(?i)^/subscriptions/([^/]+)/resourceGroups/([^/]+)/providers/([^/]+)/([^/]+)/([^/]+)";

/// The parts of an Azure resource identifier the sample needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    pub subscription: String,
    pub resource_group: String,
    pub namespace: String,
    pub resource_type: String,
    pub name: String,
}

impl ResourceId {
    pub fn parse(id: &str) -> Option<Self> {
        lazy_static! {
            static ref ID_RE: Regex = Regex::new(ARM_ID_RE).unwrap();
        }

        let caps = ID_RE.captures(id.trim())?;
        Some(Self {
            subscription: caps[1].to_string(),
            resource_group: caps[2].to_string(),
            namespace: caps[3].to_string(),
            resource_type: caps[4].to_string(),
            name: caps[5].to_string(),
        })
    }

    pub fn format(subscription: &str, resource_group: &str, namespace: &str, resource_type: &str, name: &str) -> String {
        format!("/subscriptions/{}/resourceGroups/{}/providers/{}/{}/{}", subscription, resource_group, namespace, resource_type, name)
    }
}

/// Last path segment of an id, or the input itself if it has none
pub fn name_from_id(id: &str) -> &str {
    id.trim_end_matches('/').rsplit('/').next().unwrap_or(id)
}
