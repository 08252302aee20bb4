//! Projection of a statistics payload onto display sections.
//!
//! Nothing here scores or validates the document. Each `*_section` function takes an
//! optional part of the document and returns a section, or `None` when there is
//! nothing to show. Presentation layers (TUI, text summary) style the result.

use crate::assessment::{AssessmentDocument, ReferenceLink, ReputationMetric};
use serde_json::{Map, Value};

/// What the dashboard should show for a statistics `json` string.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Parsed into an object: structured view (raw JSON still available).
    Structured {
        value: Value,
        document: AssessmentDocument,
    },
    /// Not JSON, or JSON that is not an object: shown verbatim.
    Raw(String),
}

impl Payload {
    #[cfg(test)]
    pub fn is_structured(&self) -> bool {
        matches!(self, Payload::Structured { .. })
    }

    /// Text for the raw view: pretty JSON when parsed, else the original string.
    pub fn raw_text(&self) -> String {
        match self {
            Payload::Structured { value, .. } => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
            Payload::Raw(s) => s.clone(),
        }
    }

    /// JSON value suitable for export; raw payloads are exported as a string.
    pub fn export_value(&self) -> Value {
        match self {
            Payload::Structured { value, .. } => value.clone(),
            Payload::Raw(s) => Value::String(s.clone()),
        }
    }
}

pub fn parse_payload(raw: &str) -> Payload {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(obj)) => Payload::Structured {
            document: AssessmentDocument::from_object(&obj),
            value: Value::Object(obj),
        },
        Ok(_) => Payload::Raw(raw.to_string()),
        Err(e) => {
            tracing::debug!(error = %e, "statistics payload is not JSON; showing raw text");
            Payload::Raw(raw.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: String,
    pub description: Option<String>,
    pub rows: Vec<Row>,
}

impl Section {
    fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            description: None,
            rows: Vec::new(),
        }
    }

    fn describe(mut self, description: Option<&str>) -> Self {
        self.description = non_empty(description).map(str::to_string);
        self
    }

    fn kv(&mut self, label: &str, value: Option<&str>) {
        if let Some(v) = non_empty(value) {
            self.rows.push(Row::KeyValue {
                label: label.to_string(),
                value: v.to_string(),
            });
        }
    }

    fn tags(&mut self, label: &str, items: &[String]) {
        let items: Vec<String> = items
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !items.is_empty() {
            self.rows.push(Row::Tags {
                label: label.to_string(),
                items,
            });
        }
    }

    fn finish(self) -> Option<Self> {
        (!self.rows.is_empty()).then_some(self)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    KeyValue { label: String, value: String },
    Text(String),
    Tags { label: String, items: Vec<String> },
    /// A 0–100 score.
    Score {
        label: String,
        value: f64,
        description: Option<String>,
    },
    /// A yes/no capability with a helper line (practices, verification).
    Status {
        label: String,
        active: bool,
        detail: String,
    },
    Incident {
        year: Option<String>,
        kind: String,
        verified: bool,
        description: Option<String>,
        impact: Option<String>,
    },
    Link { label: String, url: String },
}

/// All sections for a document, in dashboard order.
pub fn sections(doc: &AssessmentDocument) -> Vec<Section> {
    [
        header_section(doc),
        risk_scores_section(doc.risk_scores.as_ref()),
        identity_section(doc),
        product_section(doc),
        incidents_section(doc),
        practices_section(doc),
        reputation_section(doc),
        alternatives_section(doc),
        quick_signals_section(doc),
        references_section(doc.references.as_deref()),
    ]
    .into_iter()
    .flatten()
    .collect()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

/// Vendor name, badges and document metadata.
pub fn header_section(doc: &AssessmentDocument) -> Option<Section> {
    let identity = doc.vendor_identity.as_ref();
    let product = doc.product_profile.as_ref();
    let meta = doc.meta.as_ref();
    let verification = identity.and_then(|i| i.verification.as_ref());

    let title = identity
        .and_then(|i| non_empty(i.name.as_deref()))
        .or_else(|| product.and_then(|p| non_empty(p.name.as_deref())))
        .unwrap_or("Assessment");
    let mut s = Section::new(title).describe(product.and_then(|p| p.description.as_deref()));

    let badges: Vec<String> = [
        verification.and_then(|v| v.status.clone()),
        product.and_then(|p| p.category.clone()),
        identity.and_then(|i| i.jurisdiction.clone()),
    ]
    .into_iter()
    .flatten()
    .collect();
    s.tags("Tags", &badges);

    if let Some(v) = verification {
        match (non_empty(v.result.as_deref()), non_empty(v.confidence.as_deref())) {
            (Some(result), Some(conf)) => s.rows.push(Row::Text(format!(
                "Verified as {result} · confidence: {conf}"
            ))),
            (Some(result), None) => s.rows.push(Row::Text(format!("Verified as {result}"))),
            _ => {}
        }
    }
    if let Some(m) = meta {
        s.kv("Document", m.doc.as_deref());
        s.kv("Version", m.version.as_deref());
        s.kv(
            "Generated",
            m.generated_at.as_deref().map(format_date).as_deref(),
        );
        s.kv("AI model", m.ai_model.as_deref());
        s.kv(
            "Confidence",
            non_empty(m.confidence.as_deref())
                .map(|c| format!("{c} confidence"))
                .as_deref(),
        );
    }
    s.kv(
        "Official domain",
        identity.and_then(|i| i.official_domain.as_deref()),
    );
    s.finish()
}

struct ScoreLabel {
    key: &'static str,
    label: &'static str,
    description: &'static str,
}

const KNOWN_SCORES: &[ScoreLabel] = &[
    ScoreLabel {
        key: "overallTrust",
        label: "Overall trust",
        description: "Holistic trust posture",
    },
    ScoreLabel {
        key: "securityRisk",
        label: "Security risk",
        description: "Likelihood of security events",
    },
    ScoreLabel {
        key: "controlsMaturity",
        label: "Controls maturity",
        description: "Breadth of security controls",
    },
    ScoreLabel {
        key: "uvssComposite",
        label: "UVSS composite",
        description: "",
    },
];

/// Numeric entries of a risk score map as (key, label, value), known keys first.
pub fn numeric_scores(scores: &Map<String, Value>) -> Vec<(String, String, f64)> {
    let mut out: Vec<(String, String, f64)> = KNOWN_SCORES
        .iter()
        .filter_map(|k| {
            let v = scores.get(k.key)?.as_f64()?;
            Some((k.key.to_string(), k.label.to_string(), v))
        })
        .collect();
    for (key, value) in scores {
        if KNOWN_SCORES.iter().any(|k| k.key == key.as_str()) {
            continue;
        }
        if let Some(v) = value.as_f64() {
            out.push((key.clone(), humanize_key(key), v));
        }
    }
    out
}

pub fn risk_scores_section(scores: Option<&Map<String, Value>>) -> Option<Section> {
    let scores = scores?;
    let linked = scores.get("linkedToUvss").and_then(|v| v.as_bool());
    let mut s = Section::new("Risk scores");
    for (key, label, value) in numeric_scores(scores) {
        let description = match KNOWN_SCORES.iter().find(|k| k.key == key) {
            Some(k) if k.key == "uvssComposite" => linked.map(|l| {
                if l {
                    "Linked to UVSS baseline".to_string()
                } else {
                    "Not linked to UVSS".to_string()
                }
            }),
            Some(k) => Some(k.description.to_string()),
            None => None,
        };
        s.rows.push(Row::Score {
            label,
            value,
            description,
        });
    }
    s.finish()
}

pub fn identity_section(doc: &AssessmentDocument) -> Option<Section> {
    let identity = doc.vendor_identity.as_ref()?;
    let verification = identity.verification.as_ref();
    let mut s =
        Section::new("Vendor identity").describe(verification.and_then(|v| v.notes.as_deref()));
    s.kv("Legal entity", identity.legal_entity.as_deref());
    s.kv("Jurisdiction", identity.jurisdiction.as_deref());
    if let Some(domain) = non_empty(identity.official_domain.as_deref()) {
        s.rows.push(Row::Link {
            label: domain.to_string(),
            url: format!("https://{domain}"),
        });
    }
    if let Some(ownership) = identity.ownership.as_ref() {
        s.kv("Ownership", ownership.description.as_deref());
        s.tags("Ownership events", &ownership.events);
    }
    if let Some(v) = verification {
        if let Some(status) = non_empty(v.status.as_deref()) {
            let mut detail = Vec::new();
            if let Some(r) = non_empty(v.result.as_deref()) {
                detail.push(r.to_string());
            }
            if let Some(c) = non_empty(v.confidence.as_deref()) {
                detail.push(format!("confidence {c}"));
            }
            s.rows.push(Row::Status {
                label: status.to_string(),
                active: true,
                detail: detail.join(" · "),
            });
        }
    }
    s.finish()
}

pub fn product_section(doc: &AssessmentDocument) -> Option<Section> {
    let p = doc.product_profile.as_ref()?;
    let mut s = Section::new("Product profile").describe(p.description.as_deref());
    s.kv("Name", p.name.as_deref());
    s.kv("Category", p.category.as_deref());
    s.kv("Delivery model", p.delivery_model.as_deref());
    s.tags("Deployment", &p.deployment);
    s.tags("Integrations", &p.integrations);
    s.finish()
}

pub fn incidents_section(doc: &AssessmentDocument) -> Option<Section> {
    let assessment = doc.security_assessment.as_ref()?;
    let mut s = Section::new("Security incidents")
        .describe(Some("Recent incidents reported for the vendor."));
    for incident in &assessment.incidents {
        let kind = non_empty(incident.kind.as_deref())
            .or_else(|| non_empty(incident.description.as_deref()))
            .unwrap_or("Incident");
        s.rows.push(Row::Incident {
            year: non_empty(incident.year.as_deref()).map(str::to_string),
            kind: kind.to_string(),
            verified: incident.verified.unwrap_or(false),
            description: non_empty(incident.description.as_deref()).map(str::to_string),
            impact: non_empty(incident.impact.as_deref()).map(str::to_string),
        });
    }
    s.finish()
}

pub fn practices_section(doc: &AssessmentDocument) -> Option<Section> {
    let practices = doc
        .security_assessment
        .as_ref()?
        .vendor_practices
        .as_ref()?;
    let mut s = Section::new("Vendor practices")
        .describe(Some("Proactive security programs maintained by the vendor."));

    let mut push = |label: &str, active: Option<bool>, helper: Option<&str>, url: Option<&str>| {
        let active = active.unwrap_or(false);
        let mut detail = if active {
            non_empty(helper).unwrap_or("Available").to_string()
        } else {
            "Not available".to_string()
        };
        if let Some(url) = non_empty(url) {
            detail.push_str(&format!(" ({url})"));
        }
        s.rows.push(Row::Status {
            label: label.to_string(),
            active,
            detail,
        });
    };
    if let Some(p) = practices.psirt.as_ref() {
        push(
            "PSIRT",
            p.exists,
            Some("Coordinated response"),
            p.url.as_deref(),
        );
    }
    if let Some(b) = practices.bug_bounty.as_ref() {
        push("Bug bounty", b.active, b.platform.as_deref(), b.url.as_deref());
    }
    if let Some(t) = practices.transparency.as_ref() {
        push(
            "Transparency",
            t.public_reports,
            Some("Public reports"),
            t.report_url.as_deref(),
        );
    }
    s.finish()
}

fn reputation_row(label: &str, metric: &ReputationMetric) -> Option<Row> {
    let score = metric.score?;
    let mut value = format!("{score:.1}");
    if let Some(total) = metric.total_reviews {
        value.push_str(&format!(" · {total:.0} reviews"));
    }
    if let Some(updated) = non_empty(metric.last_updated.as_deref()) {
        value.push_str(&format!(" · updated {}", format_date(updated)));
    }
    Some(Row::KeyValue {
        label: label.to_string(),
        value,
    })
}

pub fn reputation_section(doc: &AssessmentDocument) -> Option<Section> {
    let signals = doc.reputation_signals.as_ref()?;
    let mut s = Section::new("Reputation signals")
        .describe(Some("Third-party sentiment across major review platforms."));
    let entries = [
        ("G2 rating", signals.g2_rating.as_ref()),
        ("Trustpilot", signals.trustpilot.as_ref()),
    ];
    for (label, metric) in entries {
        if let Some(row) = metric.and_then(|m| reputation_row(label, m)) {
            s.rows.push(row);
        }
    }
    s.finish()
}

pub fn alternatives_section(doc: &AssessmentDocument) -> Option<Section> {
    let alternatives = doc.alternative_solutions.as_ref()?;
    let mut s = Section::new("Alternative solutions")
        .describe(Some("Comparable platforms to evaluate during procurement."));
    for alt in alternatives {
        let Some(name) = non_empty(alt.name.as_deref()) else {
            continue;
        };
        let mut value = Vec::new();
        if let Some(vendor) = non_empty(alt.vendor.as_deref()) {
            value.push(vendor.to_string());
        }
        if let Some(category) = non_empty(alt.category.as_deref()) {
            value.push(category.to_string());
        }
        if let Some(domain) = non_empty(alt.domain.as_deref()) {
            value.push(domain.to_string());
        }
        s.rows.push(Row::KeyValue {
            label: name.to_string(),
            value: value.join(" · "),
        });
    }
    s.finish()
}

pub fn quick_signals_section(doc: &AssessmentDocument) -> Option<Section> {
    let mut s = Section::new("Quick signals");
    if let Some(scores) = doc.risk_scores.as_ref() {
        if let Some(linked) = scores.get("linkedToUvss").and_then(|v| v.as_bool()) {
            s.kv("Linked to UVSS", Some(if linked { "Yes" } else { "No" }));
        }
        if let Some(uvss) = scores.get("uvssComposite").and_then(|v| v.as_f64()) {
            s.rows.push(Row::Text(format!(
                "UVSS composite score of {} used as reference baseline.",
                format_score(uvss)
            )));
        }
    }
    if let Some(refs) = doc.references.as_ref() {
        s.rows.push(Row::Text(format!(
            "{} reference categories captured for this vendor.",
            refs.len()
        )));
    }
    s.finish()
}

pub fn references_section(references: Option<&[(String, Vec<ReferenceLink>)]>) -> Option<Section> {
    let references = references?;
    let mut s = Section::new("Evidence references")
        .describe(Some("Source material used to construct the assessment."));
    for (category, links) in references {
        let links: Vec<&ReferenceLink> = links
            .iter()
            .filter(|l| non_empty(l.url.as_deref()).is_some())
            .collect();
        if links.is_empty() {
            continue;
        }
        s.rows.push(Row::Text(format!(
            "{} ({} link{})",
            format_category_label(category),
            links.len(),
            if links.len() > 1 { "s" } else { "" }
        )));
        for link in links {
            let url = link.url.as_deref().unwrap_or_default().trim().to_string();
            let label = non_empty(link.kind.as_deref())
                .map(|k| k.replace('_', " "))
                .unwrap_or_else(|| url.clone());
            s.rows.push(Row::Link { label, url });
        }
    }
    s.finish()
}

/// `2025-11-15T12:00:00Z` → `Nov 15, 2025`; anything unparseable is returned as-is.
pub fn format_date(value: &str) -> String {
    use time::format_description::well_known::Rfc3339;
    let parsed = time::OffsetDateTime::parse(value, &Rfc3339).ok().or_else(|| {
        time::Date::parse(value, time::macros::format_description!("[year]-[month]-[day]"))
            .ok()
            .map(|d| d.midnight().assume_utc())
    });
    match parsed {
        Some(dt) => dt
            .format(time::macros::format_description!(
                "[month repr:short] [day padding:none], [year]"
            ))
            .unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

/// `security_pages` → `Security Pages`.
pub fn format_category_label(value: &str) -> String {
    value
        .split('_')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `dataExposure` / `data_exposure` → `Data exposure`.
fn humanize_key(key: &str) -> String {
    let mut out = String::new();
    for (i, c) in key.chars().enumerate() {
        if c == '_' || c == '-' {
            out.push(' ');
        } else if c.is_uppercase() && i > 0 {
            out.push(' ');
            out.extend(c.to_lowercase());
        } else if i == 0 {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
    }
    out
}

pub fn format_score(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}

/// Gauge ratio for a 0–100 score.
pub fn score_ratio(value: f64) -> f64 {
    if value.is_finite() {
        (value / 100.0).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Text gauge, e.g. `█████░░░░░` for 50 at width 10.
pub fn score_bar(value: f64, width: usize) -> String {
    let filled = (score_ratio(value) * width as f64).round() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width.saturating_sub(filled)));
    bar
}
