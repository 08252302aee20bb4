//! Vendor security assessment document.
//!
//! The document is produced by an external workflow, so every part of it is optional.
//! Top-level sections are decoded independently: a section that is missing or has an
//! unexpected shape is dropped without affecting the others.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssessmentDocument {
    pub meta: Option<AssessmentMeta>,
    pub vendor_identity: Option<VendorIdentity>,
    pub product_profile: Option<ProductProfile>,
    /// Kept untyped: only numeric entries are shown.
    pub risk_scores: Option<Map<String, Value>>,
    pub alternative_solutions: Option<Vec<AlternativeSolution>>,
    pub security_assessment: Option<SecurityAssessment>,
    pub reputation_signals: Option<ReputationSignals>,
    /// Category → links, in document order.
    pub references: Option<Vec<(String, Vec<ReferenceLink>)>>,
}

impl AssessmentDocument {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            meta: section(obj, "meta"),
            vendor_identity: section(obj, "vendorIdentity"),
            product_profile: section(obj, "productProfile"),
            risk_scores: obj.get("riskScores").and_then(|v| v.as_object()).cloned(),
            alternative_solutions: obj
                .get("alternativeSolutions")
                .and_then(|v| v.as_array())
                .map(|items| lenient_items(items)),
            security_assessment: section(obj, "securityAssessment"),
            reputation_signals: section(obj, "reputationSignals"),
            references: obj.get("references").and_then(|v| v.as_object()).map(|m| {
                m.iter()
                    .filter_map(|(category, links)| {
                        let links = links.as_array()?;
                        Some((category.clone(), lenient_items(links)))
                    })
                    .collect()
            }),
        }
    }

    /// True when none of the known sections were found.
    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn section<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let v = obj.get(key)?;
    if v.is_null() {
        return None;
    }
    match serde_json::from_value(v.clone()) {
        Ok(t) => Some(t),
        Err(e) => {
            tracing::debug!(section = key, error = %e, "ignoring malformed document section");
            None
        }
    }
}

fn lenient_items<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .collect()
}

fn de_lenient_vec<'de, D, T>(d: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::Array(items)) => lenient_items(&items),
        _ => Vec::new(),
    })
}

/// Accept strings, numbers and booleans as display text.
fn de_lenient_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Accept booleans and yes/no style strings; anything else is unknown.
fn de_lenient_bool<'de, D>(d: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| match v {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" => Some(true),
            "false" | "no" | "n" => Some(false),
            _ => None,
        },
        _ => None,
    }))
}

/// Nested object that becomes `None` on a shape mismatch instead of failing its parent.
fn de_lenient_opt<'de, D, T>(d: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| serde_json::from_value(v).ok()))
}

fn de_lenient_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(d)?;
    Ok(v.and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AssessmentMeta {
    #[serde(deserialize_with = "de_lenient_text")]
    pub doc: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub version: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub generated_at: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub ai_model: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorVerification {
    #[serde(deserialize_with = "de_lenient_text")]
    pub status: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub result: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub confidence: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorOwnership {
    #[serde(deserialize_with = "de_lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_lenient_vec")]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorIdentity {
    #[serde(deserialize_with = "de_lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub official_domain: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub legal_entity: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub jurisdiction: Option<String>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub verification: Option<VendorVerification>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub ownership: Option<VendorOwnership>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProductProfile {
    #[serde(deserialize_with = "de_lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub category: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub delivery_model: Option<String>,
    #[serde(deserialize_with = "de_lenient_vec")]
    pub deployment: Vec<String>,
    #[serde(deserialize_with = "de_lenient_vec")]
    pub integrations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AlternativeSolution {
    #[serde(deserialize_with = "de_lenient_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub vendor: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub domain: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityIncident {
    #[serde(deserialize_with = "de_lenient_text")]
    pub year: Option<String>,
    #[serde(rename = "type", deserialize_with = "de_lenient_text")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub description: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub impact: Option<String>,
    #[serde(deserialize_with = "de_lenient_bool")]
    pub verified: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Psirt {
    #[serde(deserialize_with = "de_lenient_bool")]
    pub exists: Option<bool>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BugBounty {
    #[serde(deserialize_with = "de_lenient_bool")]
    pub active: Option<bool>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub platform: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Transparency {
    #[serde(deserialize_with = "de_lenient_bool")]
    pub public_reports: Option<bool>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub report_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VendorPractices {
    #[serde(deserialize_with = "de_lenient_opt")]
    pub psirt: Option<Psirt>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub bug_bounty: Option<BugBounty>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub transparency: Option<Transparency>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SecurityAssessment {
    #[serde(deserialize_with = "de_lenient_vec")]
    pub incidents: Vec<SecurityIncident>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub vendor_practices: Option<VendorPractices>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReputationMetric {
    #[serde(deserialize_with = "de_lenient_f64")]
    pub score: Option<f64>,
    #[serde(deserialize_with = "de_lenient_f64")]
    pub total_reviews: Option<f64>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub last_updated: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReputationSignals {
    #[serde(deserialize_with = "de_lenient_opt")]
    pub g2_rating: Option<ReputationMetric>,
    #[serde(deserialize_with = "de_lenient_opt")]
    pub trustpilot: Option<ReputationMetric>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReferenceLink {
    #[serde(rename = "type", deserialize_with = "de_lenient_text")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "de_lenient_text")]
    pub url: Option<String>,
}
