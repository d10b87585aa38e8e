//! Item records
//!
//! An `Item` is one lost or found report. Only `status` and `matched_with`
//! ever change, together and exactly once, when the item is paired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::types::{ItemId, SessionId};

/// Timestamp layout used in item listings
const REPORTED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Which report command created an item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Lost,
    Found,
}

/// Lifecycle status of an item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Lost,
    Found,
    Matched,
}

impl ItemStatus {
    /// Capitalized label used in listings
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Lost => "Lost",
            ItemStatus::Found => "Found",
            ItemStatus::Matched => "Matched",
        }
    }
}

impl From<ReportKind> for ItemStatus {
    fn from(kind: ReportKind) -> Self {
        match kind {
            ReportKind::Lost => ItemStatus::Lost,
            ReportKind::Found => ItemStatus::Found,
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ItemStatus::Lost => "lost",
            ItemStatus::Found => "found",
            ItemStatus::Matched => "matched",
        };
        f.write_str(s)
    }
}

/// JSON payload of a `REPORT_LOST` / `REPORT_FOUND` command
///
/// Every field is optional here so that absence is reported as a
/// validation error rather than a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemReport {
    pub name: Option<String>,
    pub color: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// A report that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewItem {
    pub name: String,
    pub color: String,
    pub location: String,
    pub description: String,
}

impl ItemReport {
    /// Check required fields and the location whitelist
    pub fn validate(self, locations: &[String]) -> Result<NewItem, ValidationError> {
        let name = required(self.name, "name")?;
        let color = required(self.color, "color")?;
        let location = required(self.location, "location")?;
        let description = self
            .description
            .ok_or(ValidationError::MissingField("description"))?;

        if !locations.iter().any(|l| *l == location) {
            return Err(ValidationError::UnknownLocation {
                location,
                allowed: locations.to_vec(),
            });
        }

        Ok(NewItem {
            name,
            color,
            location,
            description: description.trim().to_string(),
        })
    }
}

fn required(value: Option<String>, field: &'static str) -> Result<String, ValidationError> {
    let value = value.ok_or(ValidationError::MissingField(field))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

/// A stored lost/found report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub color: String,
    pub location: String,
    pub description: String,
    pub status: ItemStatus,
    #[serde(rename = "reporter_id")]
    pub reporter: SessionId,
    pub reported_at: DateTime<Utc>,
    pub matched_with: Option<ItemId>,
}

impl Item {
    /// Build a fresh, unmatched item for the given reporter
    pub fn new(kind: ReportKind, report: NewItem, reporter: SessionId) -> Self {
        Self {
            id: ItemId::new(),
            name: report.name,
            color: report.color,
            location: report.location,
            description: report.description,
            status: kind.into(),
            reporter,
            reported_at: Utc::now(),
            matched_with: None,
        }
    }

    pub fn is_matched(&self) -> bool {
        self.matched_with.is_some()
    }

    fn matched_label(&self) -> &'static str {
        if self.is_matched() {
            "Yes"
        } else {
            "No"
        }
    }

    /// One line of a `GET_MY_ITEMS` listing
    pub fn own_summary(&self) -> String {
        format!(
            "ID: {}, Name: {}, Status: {}, Matched: {}",
            self.id,
            self.name,
            self.status,
            self.matched_label()
        )
    }

    /// One line of a `GET_ALL_ITEMS` listing (without the `ITEM: ` prefix)
    pub fn public_summary(&self) -> String {
        format!(
            "Type: {}, Name: {}, Color: {}, Location: {}, Description: {}, Reported: {}, Matched: {}",
            self.status.label(),
            self.name,
            self.color,
            self.location,
            self.description,
            self.reported_at.format(REPORTED_AT_FORMAT),
            self.matched_label()
        )
    }
}
