use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Client, Url};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::config::{Config, Endpoint};
use crate::model::{Assignment, UNKNOWN_COURSE};

pub mod model;

use model::{PlannerItem, RawId, UpcomingEvent};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

/// Anything that can produce the canonical assignment list for a window.
#[async_trait]
pub trait AssignmentSource: Send + Sync {
    async fn fetch(
        &self,
        now: DateTime<Utc>,
        horizon_days: u32,
    ) -> Result<Vec<Assignment>, FetchError>;
}

/// Which response layout a payload follows. Both feed the same normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamShape {
    Planner,
    UpcomingEvents,
}

impl From<Endpoint> for UpstreamShape {
    fn from(endpoint: Endpoint) -> Self {
        match endpoint {
            Endpoint::Planner => UpstreamShape::Planner,
            Endpoint::UpcomingEvents => UpstreamShape::UpcomingEvents,
        }
    }
}

impl UpstreamShape {
    fn path(&self) -> &'static str {
        match self {
            UpstreamShape::Planner => "api/v1/planner/items",
            UpstreamShape::UpcomingEvents => "api/v1/users/self/upcoming_events",
        }
    }
}

#[derive(Clone)]
pub struct CanvasClient {
    http: Client,
    base_url: Url,
    token: String,
    shape: UpstreamShape,
    timeout: Duration,
}

impl fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanvasClient")
            .field("base_url", &self.base_url)
            .field("shape", &self.shape)
            .finish_non_exhaustive()
    }
}

impl CanvasClient {
    pub fn new(
        base_url: &str,
        token: String,
        shape: UpstreamShape,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let base_url = normalize_base(base_url)?;
        let http = Client::builder()
            .user_agent("canvas-watch/0.1")
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url,
            token,
            shape,
            timeout,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, FetchError> {
        Self::new(
            &cfg.canvas.base_url,
            cfg.canvas.token.clone(),
            cfg.canvas.endpoint.into(),
            cfg.fetch_timeout(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build the GET for the `[now, now + horizon_days]` window.
    pub fn build_request(
        &self,
        now: DateTime<Utc>,
        horizon_days: u32,
    ) -> Result<reqwest::Request, FetchError> {
        let mut endpoint = self
            .base_url
            .join(self.shape.path())
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
        let (start, end) = window_dates(now, horizon_days);
        {
            let mut query = endpoint.query_pairs_mut();
            query.append_pair("start_date", &start);
            query.append_pair("end_date", &end);
            if self.shape == UpstreamShape::UpcomingEvents {
                query.append_pair("type", "assignment");
            }
            query.append_pair("per_page", "100");
        }
        self.http
            .get(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/json")
            .build()
            .map_err(|e| FetchError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl AssignmentSource for CanvasClient {
    #[instrument(skip_all, fields(shape = ?self.shape))]
    async fn fetch(
        &self,
        now: DateTime<Utc>,
        horizon_days: u32,
    ) -> Result<Vec<Assignment>, FetchError> {
        let request = self.build_request(now, horizon_days)?;
        debug!(url = %request.url(), "requesting canvas assignments");
        let res = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.classify(e))?;

        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(FetchError::Network(format!(
                "canvas error {}: {}",
                status,
                truncate(&body, 200)
            )));
        }

        let body = res.text().await.map_err(|e| self.classify(e))?;
        let assignments = normalize(self.shape, &body, &self.base_url)?;
        info!(count = assignments.len(), "fetched canvas assignments");
        Ok(assignments)
    }
}

impl CanvasClient {
    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.timeout)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Ensure a trailing slash so `join` appends instead of replacing the last segment.
fn normalize_base(base_url: &str) -> Result<Url, FetchError> {
    let trimmed = base_url.trim().trim_end_matches('/');
    Url::parse(&format!("{}/", trimmed)).map_err(|e| FetchError::InvalidUrl(e.to_string()))
}

/// ISO dates (`YYYY-MM-DD`) bounding the fetch window.
pub fn window_dates(now: DateTime<Utc>, horizon_days: u32) -> (String, String) {
    let end = now + ChronoDuration::days(i64::from(horizon_days));
    (
        now.format("%Y-%m-%d").to_string(),
        end.format("%Y-%m-%d").to_string(),
    )
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shape-independent view of one upstream record.
#[derive(Debug, Default)]
struct Fields {
    id: Option<RawId>,
    name: Option<String>,
    due_at: Option<String>,
    course: Option<String>,
    url: Option<String>,
}

impl PlannerItem {
    fn into_fields(self) -> Option<Fields> {
        if self.plannable_type.as_deref() != Some("assignment") {
            return None;
        }
        let plannable = self.plannable?;
        Some(Fields {
            id: plannable.id,
            name: plannable.title.or(plannable.name),
            due_at: plannable.due_at.or(self.plannable_date),
            course: self.context_name,
            url: self.html_url,
        })
    }
}

impl UpcomingEvent {
    fn into_fields(self) -> Option<Fields> {
        if self.kind.as_deref() != Some("assignment") {
            return None;
        }
        let assignment = self.assignment?;
        Some(Fields {
            id: assignment.id,
            name: assignment.name.or(self.title),
            due_at: assignment.due_at,
            course: self.context_name,
            url: self.html_url.or(assignment.html_url),
        })
    }
}

/// Parse a response body of either shape into canonical assignments.
///
/// Records that are not assignments, or lack an id or a parseable due time,
/// are dropped. Duplicate ids keep the first occurrence.
pub fn normalize(
    shape: UpstreamShape,
    body: &str,
    base_url: &Url,
) -> Result<Vec<Assignment>, FetchError> {
    let fields: Vec<Option<Fields>> = match shape {
        UpstreamShape::Planner => serde_json::from_str::<Vec<PlannerItem>>(body)
            .map_err(|e| FetchError::Parse(e.to_string()))?
            .into_iter()
            .map(PlannerItem::into_fields)
            .collect(),
        UpstreamShape::UpcomingEvents => serde_json::from_str::<Vec<UpcomingEvent>>(body)
            .map_err(|e| FetchError::Parse(e.to_string()))?
            .into_iter()
            .map(UpcomingEvent::into_fields)
            .collect(),
    };

    let total = fields.len();
    let mut seen = HashSet::new();
    let assignments: Vec<Assignment> = fields
        .into_iter()
        .flatten()
        .filter_map(|f| canonicalize(f, base_url))
        .filter(|a| seen.insert(a.id.clone()))
        .collect();
    debug!(
        total,
        kept = assignments.len(),
        "normalized upstream records"
    );
    Ok(assignments)
}

fn canonicalize(fields: Fields, base_url: &Url) -> Option<Assignment> {
    let id = fields.id?.into_key()?;
    let due_at = DateTime::parse_from_rfc3339(fields.due_at?.trim())
        .ok()?
        .with_timezone(&Utc);
    let course_name = fields
        .course
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_COURSE.to_string());
    let url = fields
        .url
        .and_then(|u| base_url.join(u.trim()).ok())
        .unwrap_or_else(|| base_url.clone())
        .to_string();
    Some(Assignment {
        id,
        name: fields.name.unwrap_or_default(),
        course_name,
        due_at,
        url,
    })
}
