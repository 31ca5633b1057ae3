//! Domain entities: core data structures
//!
//! Field names serialize in camelCase so ledgers written by earlier browser
//! versions of the tool load unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of the person seeded into every fresh ledger.
pub const ROOT_PERSON_ID: &str = "person-root";
/// Id of the root node seeded into every fresh ledger.
pub const ROOT_NODE_ID: &str = "root";
/// Name of the seeded person and root node.
pub const ORIGINAL_OWNER: &str = "Original Owner";
/// Project name of a fresh ledger.
pub const DEFAULT_PROJECT_NAME: &str = "Untitled Project";

/// A real-world individual or entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Person {
    pub id: String,
    pub primary_name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

/// One inbound conveyance edge into an ownership node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    /// Grantor node of this edge
    pub from_id: String,
    /// Percentage of the grantor's own interest, not of the whole property
    pub percentage: f64,
    #[serde(default)]
    pub document_id: Option<String>,
}

impl Transfer {
    pub fn new(from_id: impl Into<String>, percentage: f64) -> Self {
        Self {
            from_id: from_id.into(),
            percentage,
            document_id: None,
        }
    }

    pub fn with_document(mut self, document_id: Option<String>) -> Self {
        self.document_id = document_id;
        self
    }
}

/// Rendering attributes; never read by the calculator or the layout engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Presentation {
    #[serde(default, rename = "color")]
    pub fill_color: Option<String>,
    #[serde(default)]
    pub border_color: Option<String>,
    #[serde(default)]
    pub line_color: Option<String>,
}

impl Presentation {
    /// Overlay the colors that are set in `other`, keeping ours otherwise.
    pub fn overlay(&self, other: &Presentation) -> Presentation {
        Presentation {
            fill_color: other.fill_color.clone().or_else(|| self.fill_color.clone()),
            border_color: other
                .border_color
                .clone()
                .or_else(|| self.border_color.clone()),
            line_color: other.line_color.clone().or_else(|| self.line_color.clone()),
        }
    }
}

/// One party's position in the ownership chain.
///
/// A node without transfers is a root: the original 100% owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipNode {
    pub id: String,
    #[serde(default)]
    pub person_id: Option<String>,
    #[serde(rename = "name", default)]
    pub display_name: String,
    #[serde(default)]
    pub name_as_written: String,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub transfers: Vec<Transfer>,
    /// Tier fixed at creation; `None` for legacy nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_level: Option<usize>,
    #[serde(default)]
    pub relationship: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    #[serde(flatten)]
    pub presentation: Presentation,
}

impl OwnershipNode {
    /// Create a root node (no transfers) on tier 0.
    pub fn root(id: impl Into<String>, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            person_id: None,
            display_name: name.clone(),
            name_as_written: name,
            notes: String::new(),
            transfers: Vec::new(),
            original_level: Some(0),
            relationship: String::new(),
            source_document_id: None,
            presentation: Presentation::default(),
        }
    }

    /// Create a node receiving its interest through `transfers`.
    ///
    /// `original_level` is left unset; callers that know the tier set it.
    pub fn grantee(
        id: impl Into<String>,
        name: impl Into<String>,
        transfers: Vec<Transfer>,
    ) -> Self {
        let mut node = Self::root(id, name);
        node.transfers = transfers;
        node.original_level = None;
        node
    }

    pub fn with_person(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    pub fn with_level(mut self, level: usize) -> Self {
        self.original_level = Some(level);
        self
    }

    pub fn is_root(&self) -> bool {
        self.transfers.is_empty()
    }

    pub fn has_notes(&self) -> bool {
        !self.notes.trim().is_empty()
    }
}

/// A recorded instrument (deed, will, affidavit) referenced by transfers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub id: String,
    pub instrument_number: String,
    pub book: String,
    pub page: String,
    pub date_recorded: String,
    pub document_date: String,
    pub grantor: String,
    pub document_title: String,
    pub note: String,
}

impl Document {
    /// A document is worth recording only with an instrument number, book, or title.
    pub fn is_identifiable(&self) -> bool {
        !self.instrument_number.trim().is_empty()
            || !self.book.trim().is_empty()
            || !self.document_title.trim().is_empty()
    }

    /// Short label for an edge: `(book/page)`, else instrument number, else title prefix.
    pub fn short_label(&self) -> Option<String> {
        if !self.book.is_empty() && !self.page.is_empty() {
            Some(format!("({}/{})", self.book, self.page))
        } else if !self.instrument_number.is_empty() {
            Some(self.instrument_number.clone())
        } else if !self.document_title.is_empty() {
            Some(self.document_title.chars().take(12).collect())
        } else {
            None
        }
    }
}

/// A 2D diagram coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The persisted snapshot: everything the user has entered for one project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default)]
    pub persons: Vec<Person>,
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub owners: Vec<OwnershipNode>,
    /// Manual positions that override the automatic layout
    #[serde(default)]
    pub node_positions: BTreeMap<String, Point>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<DateTime<Utc>>,
}

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            persons: vec![Person {
                id: ROOT_PERSON_ID.to_string(),
                primary_name: ORIGINAL_OWNER.to_string(),
                aliases: Vec::new(),
            }],
            documents: Vec::new(),
            owners: vec![
                OwnershipNode::root(ROOT_NODE_ID, ORIGINAL_OWNER).with_person(ROOT_PERSON_ID)
            ],
            node_positions: BTreeMap::new(),
            last_saved: None,
        }
    }
}

impl Ledger {
    /// A ledger with no persons and no nodes.
    pub fn empty(project_name: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            persons: Vec::new(),
            documents: Vec::new(),
            owners: Vec::new(),
            node_positions: BTreeMap::new(),
            last_saved: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&OwnershipNode> {
        self.owners.iter().find(|o| o.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut OwnershipNode> {
        self.owners.iter_mut().find(|o| o.id == id)
    }

    pub fn person(&self, id: &str) -> Option<&Person> {
        self.persons.iter().find(|p| p.id == id)
    }

    pub fn person_mut(&mut self, id: &str) -> Option<&mut Person> {
        self.persons.iter_mut().find(|p| p.id == id)
    }

    pub fn document(&self, id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == id)
    }

    pub fn document_mut(&mut self, id: &str) -> Option<&mut Document> {
        self.documents.iter_mut().find(|d| d.id == id)
    }

    /// Find a person by primary name or alias, ignoring case.
    pub fn person_by_name(&self, name: &str) -> Option<&Person> {
        let wanted = name.trim().to_lowercase();
        self.persons.iter().find(|p| {
            p.primary_name.to_lowercase() == wanted
                || p.aliases.iter().any(|a| a.to_lowercase() == wanted)
        })
    }

    /// Whether any id in the ledger (node, person, or document) equals `id`.
    pub fn contains_id(&self, id: &str) -> bool {
        self.node(id).is_some() || self.person(id).is_some() || self.document(id).is_some()
    }
}
