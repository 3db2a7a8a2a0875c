//! Raw upstream records as Canvas returns them. Every field is optional so a
//! single odd record never fails the whole payload.
use serde::Deserialize;

/// Canvas ids arrive as numbers from most endpoints and as strings when the
/// account enables `Accept: application/json+canvas-string-ids`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawId {
    Num(i64),
    Str(String),
}

impl RawId {
    pub fn into_key(self) -> Option<String> {
        match self {
            RawId::Num(n) => Some(n.to_string()),
            RawId::Str(s) => {
                let s = s.trim();
                (!s.is_empty()).then(|| s.to_string())
            }
        }
    }
}

/// Item from `GET /api/v1/planner/items`.
#[derive(Deserialize, Debug, Default)]
pub struct PlannerItem {
    pub plannable_type: Option<String>,
    pub plannable: Option<Plannable>,
    pub plannable_date: Option<String>,
    pub context_name: Option<String>,
    pub html_url: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct Plannable {
    pub id: Option<RawId>,
    pub title: Option<String>,
    pub name: Option<String>,
    pub due_at: Option<String>,
}

/// Item from `GET /api/v1/users/self/upcoming_events`.
#[derive(Deserialize, Debug, Default)]
pub struct UpcomingEvent {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub context_name: Option<String>,
    pub html_url: Option<String>,
    pub assignment: Option<EventAssignment>,
}

#[derive(Deserialize, Debug, Default)]
pub struct EventAssignment {
    pub id: Option<RawId>,
    pub name: Option<String>,
    pub due_at: Option<String>,
    pub html_url: Option<String>,
}
