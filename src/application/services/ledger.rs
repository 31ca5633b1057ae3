//! Ledger service
//!
//! Validated mutations of the ownership ledger. Every check runs against a
//! fresh `OwnershipGraph` of the current nodes before anything is changed, so
//! a rejected request leaves the ledger untouched.

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::application::{ApplicationError, ApplicationResult};
use crate::domain::{
    compute_layout, format_fraction, parse_percentage, to_title_case, Document, DomainError,
    LayoutConfig, LayoutDirection, Ledger, OwnershipGraph, OwnershipNode, Person, Point,
    Presentation, Transfer, ROOT_NODE_ID,
};
use crate::infrastructure::traits::LedgerStore;

/// Default slack when comparing a new transfer against the remaining interest.
pub const DEFAULT_ALLOCATION_SLACK: f64 = 0.01;

/// Length of generated ids.
const ID_LENGTH: usize = 9;

/// Who receives an interest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersonRef {
    /// A person already in the ledger
    Existing(String),
    /// A name as typed; a person is created for it
    New(String),
}

/// Which document records a conveyance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DocumentRef {
    #[default]
    None,
    Existing(String),
    /// Recorded only when it carries an instrument number, book, or title
    New(Document),
}

/// Convey part of `parent_id`'s interest to a person.
#[derive(Debug, Clone)]
pub struct GranteeRequest {
    pub parent_id: String,
    pub person: PersonRef,
    pub name_as_written: Option<String>,
    /// Raw percentage input (`"1/4"`, `"0.25"`, `"25"`)
    pub percentage: String,
    pub document: DocumentRef,
    /// Relation to the grantor, e.g. "heir"; shown on edge labels
    pub relationship: String,
    pub presentation: Presentation,
}

/// Add a further source to an existing node.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_id: String,
    pub to_id: String,
    pub percentage: String,
    pub document: DocumentRef,
}

/// Add an unconnected root node.
#[derive(Debug, Clone)]
pub struct StandaloneRequest {
    pub person: PersonRef,
    pub notes: String,
    pub document: DocumentRef,
    pub presentation: Presentation,
}

/// Change to one inbound transfer, addressed by its position on the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferUpdate {
    pub index: usize,
    /// Raw percentage input; `None` keeps the current value
    pub percentage: Option<String>,
    /// `Some(None)` clears the document
    pub document_id: Option<Option<String>>,
}

impl FromStr for TransferUpdate {
    type Err = String;

    /// Parse `<index>=<percentage>[@<document id>]`.
    ///
    /// Either side of `@` may be empty: `0=@d1` only relinks the document,
    /// `0=1/4@` sets the share and clears the document.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (index, change) = s
            .split_once('=')
            .ok_or_else(|| format!("expected <index>=<percentage>[@<doc>], got '{}'", s))?;
        let index = index
            .trim()
            .parse()
            .map_err(|_| format!("invalid transfer index '{}'", index.trim()))?;
        let (percentage, document_id) = match change.split_once('@') {
            Some((pct, doc)) => {
                let doc = doc.trim();
                (pct, Some((!doc.is_empty()).then(|| doc.to_string())))
            }
            None => (change, None),
        };
        let percentage = Some(percentage.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string);
        if percentage.is_none() && document_id.is_none() {
            return Err(format!("nothing to change for transfer #{}", index));
        }
        Ok(Self {
            index,
            percentage,
            document_id,
        })
    }
}

/// Field updates for an existing node; `None` keeps the current value.
#[derive(Debug, Clone, Default)]
pub struct NodeEdit {
    pub name: Option<String>,
    pub name_as_written: Option<String>,
    pub notes: Option<String>,
    pub person_id: Option<String>,
    pub relationship: Option<String>,
    pub presentation: Option<Presentation>,
    /// Applied before `dropped_transfers`; indices refer to the current list
    pub transfer_updates: Vec<TransferUpdate>,
    pub dropped_transfers: Vec<usize>,
}

/// Result of [`LedgerService::add_grantee`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GranteeOutcome {
    /// A new node was created
    Created(String),
    /// The person already had a node; it received an additional transfer
    Extended(String),
}

impl GranteeOutcome {
    pub fn node_id(&self) -> &str {
        match self {
            GranteeOutcome::Created(id) | GranteeOutcome::Extended(id) => id,
        }
    }
}

/// Service for loading, saving, and editing the ledger.
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    allocation_slack: f64,
}

impl LedgerService {
    /// Create a new ledger service.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            allocation_slack: DEFAULT_ALLOCATION_SLACK,
        }
    }

    pub fn with_allocation_slack(mut self, slack: f64) -> Self {
        self.allocation_slack = slack;
        self
    }

    pub fn location(&self) -> PathBuf {
        self.store.location()
    }

    // ============================================================
    // Persistence
    // ============================================================

    /// Load the stored ledger; errors if none has been initialized.
    pub fn load(&self) -> ApplicationResult<Ledger> {
        let location = self.store.location();
        self.store
            .load()
            .map_err(|e| ApplicationError::store("read", &location, e))?
            .ok_or(ApplicationError::LedgerNotInitialized(location))
    }

    /// Load the stored ledger, or a fresh one if none exists.
    pub fn load_or_default(&self) -> ApplicationResult<Ledger> {
        let location = self.store.location();
        Ok(self
            .store
            .load()
            .map_err(|e| ApplicationError::store("read", &location, e))?
            .unwrap_or_default())
    }

    /// Stamp and store the ledger.
    pub fn save(&self, ledger: &mut Ledger) -> ApplicationResult<()> {
        ledger.last_saved = Some(Utc::now());
        let location = self.store.location();
        self.store
            .save(ledger)
            .map_err(|e| ApplicationError::store("write", &location, e))?;
        debug!("saved ledger to {}", location.display());
        Ok(())
    }

    /// Create and store a fresh ledger with the seeded original owner.
    #[instrument(level = "debug", skip(self))]
    pub fn init(&self, project_name: Option<&str>, force: bool) -> ApplicationResult<Ledger> {
        let location = self.store.location();
        let existing = self
            .store
            .load()
            .map_err(|e| ApplicationError::store("read", &location, e))?;
        if existing.is_some() && !force {
            return Err(ApplicationError::LedgerAlreadyExists(location));
        }

        let mut ledger = Ledger::default();
        if let Some(name) = project_name {
            ledger.project_name = name.trim().to_string();
        }
        self.save(&mut ledger)?;
        info!("initialized ledger at {}", location.display());
        Ok(ledger)
    }

    // ============================================================
    // Validation
    // ============================================================

    /// Parse `input` and check it against the remaining interest of `from_id`.
    pub fn validate_percentage(
        &self,
        graph: &OwnershipGraph<'_>,
        from_id: &str,
        input: &str,
    ) -> Result<f64, DomainError> {
        let pct = parse_percentage(input)
            .ok_or_else(|| DomainError::InvalidPercentage(input.to_string()))?;
        let remaining = graph.remaining(from_id);
        if pct <= 0.0 || pct > remaining + self.allocation_slack {
            return Err(DomainError::PercentageOutOfRange {
                requested: pct,
                available: format_fraction(remaining),
            });
        }
        Ok(pct)
    }

    fn check_edge(
        graph: &OwnershipGraph<'_>,
        from_id: &str,
        to_id: &str,
    ) -> Result<(), DomainError> {
        if from_id == to_id {
            return Err(DomainError::SelfTransfer(from_id.to_string()));
        }
        if graph.would_create_cycle(from_id, to_id) {
            return Err(DomainError::CycleWouldForm {
                from: from_id.to_string(),
                to: to_id.to_string(),
            });
        }
        Ok(())
    }

    fn require_node(ledger: &Ledger, id: &str) -> Result<(), DomainError> {
        ledger
            .node(id)
            .map(|_| ())
            .ok_or_else(|| DomainError::NodeNotFound(id.to_string()))
    }

    /// Check a person reference without creating anything.
    fn check_person(ledger: &Ledger, person: &PersonRef) -> Result<(), DomainError> {
        match person {
            PersonRef::Existing(id) => ledger
                .person(id)
                .map(|_| ())
                .ok_or_else(|| DomainError::PersonNotFound(id.clone())),
            PersonRef::New(name) if name.trim().is_empty() => Err(DomainError::EmptyName),
            PersonRef::New(_) => Ok(()),
        }
    }

    fn check_document(ledger: &Ledger, document: &DocumentRef) -> Result<(), DomainError> {
        match document {
            DocumentRef::Existing(id) if ledger.document(id).is_none() => {
                Err(DomainError::DocumentNotFound(id.clone()))
            }
            _ => Ok(()),
        }
    }

    // ============================================================
    // Ids
    // ============================================================

    /// Short random id, unique among nodes, persons, and documents.
    pub fn generate_id(ledger: &Ledger) -> String {
        loop {
            let id: String = Uuid::new_v4()
                .simple()
                .to_string()
                .chars()
                .take(ID_LENGTH)
                .collect();
            if !ledger.contains_id(&id) {
                return id;
            }
        }
    }

    // ============================================================
    // Persons
    // ============================================================

    /// Add a person under the title-cased name; returns the new id.
    #[instrument(level = "debug", skip(self, ledger))]
    pub fn add_person(&self, ledger: &mut Ledger, name: &str) -> ApplicationResult<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyName.into());
        }
        let person = Person {
            id: Self::generate_id(ledger),
            primary_name: to_title_case(name),
            aliases: Vec::new(),
        };
        let id = person.id.clone();
        info!("added person {} ({})", person.primary_name, id);
        ledger.persons.push(person);
        Ok(id)
    }

    pub fn rename_person(
        &self,
        ledger: &mut Ledger,
        person_id: &str,
        name: &str,
    ) -> ApplicationResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyName.into());
        }
        let person = ledger
            .person_mut(person_id)
            .ok_or_else(|| DomainError::PersonNotFound(person_id.to_string()))?;
        person.primary_name = to_title_case(name);
        Ok(())
    }

    /// Add an alias unless the person already carries it.
    pub fn add_alias(
        &self,
        ledger: &mut Ledger,
        person_id: &str,
        alias: &str,
    ) -> ApplicationResult<()> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(DomainError::EmptyName.into());
        }
        let person = ledger
            .person_mut(person_id)
            .ok_or_else(|| DomainError::PersonNotFound(person_id.to_string()))?;
        if !person.aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
            person.aliases.push(alias.to_string());
        }
        Ok(())
    }

    fn resolve_person(&self, ledger: &mut Ledger, person: &PersonRef) -> ApplicationResult<String> {
        match person {
            PersonRef::Existing(id) => {
                Self::check_person(ledger, person)?;
                Ok(id.clone())
            }
            PersonRef::New(name) => self.add_person(ledger, name),
        }
    }

    // ============================================================
    // Documents
    // ============================================================

    /// Record a document; rejects one without instrument number, book, or title.
    #[instrument(level = "debug", skip(self, ledger, document))]
    pub fn add_document(
        &self,
        ledger: &mut Ledger,
        mut document: Document,
    ) -> ApplicationResult<String> {
        if !document.is_identifiable() {
            return Err(DomainError::UnidentifiableDocument.into());
        }
        document.id = Self::generate_id(ledger);
        let id = document.id.clone();
        ledger.documents.push(document);
        info!("added document {}", id);
        Ok(id)
    }

    /// Replace a document's fields, keeping its id.
    pub fn update_document(
        &self,
        ledger: &mut Ledger,
        document_id: &str,
        mut document: Document,
    ) -> ApplicationResult<()> {
        let slot = ledger
            .document_mut(document_id)
            .ok_or_else(|| DomainError::DocumentNotFound(document_id.to_string()))?;
        document.id = document_id.to_string();
        *slot = document;
        Ok(())
    }

    /// Remove a document and clear every reference to it.
    #[instrument(level = "debug", skip(self, ledger))]
    pub fn delete_document(&self, ledger: &mut Ledger, document_id: &str) -> ApplicationResult<()> {
        if ledger.document(document_id).is_none() {
            return Err(DomainError::DocumentNotFound(document_id.to_string()).into());
        }
        ledger.documents.retain(|d| d.id != document_id);
        for node in &mut ledger.owners {
            for transfer in &mut node.transfers {
                if transfer.document_id.as_deref() == Some(document_id) {
                    transfer.document_id = None;
                }
            }
            if node.source_document_id.as_deref() == Some(document_id) {
                node.source_document_id = None;
            }
        }
        info!("deleted document {}", document_id);
        Ok(())
    }

    fn resolve_document(
        &self,
        ledger: &mut Ledger,
        document: &DocumentRef,
    ) -> ApplicationResult<Option<String>> {
        match document {
            DocumentRef::None => Ok(None),
            DocumentRef::Existing(id) => {
                Self::check_document(ledger, document)?;
                Ok(Some(id.clone()))
            }
            DocumentRef::New(doc) if doc.is_identifiable() => {
                self.add_document(ledger, doc.clone()).map(Some)
            }
            DocumentRef::New(_) => Ok(None),
        }
    }

    // ============================================================
    // Conveyances
    // ============================================================

    /// Convey part of a node's interest to a person.
    ///
    /// If the person already has a node (other than the seeded root), that
    /// node receives an extra transfer and keeps its tier. Otherwise a new
    /// node is created one tier below the grantor.
    #[instrument(level = "debug", skip(self, ledger, request), fields(parent = %request.parent_id))]
    pub fn add_grantee(
        &self,
        ledger: &mut Ledger,
        request: GranteeRequest,
    ) -> ApplicationResult<GranteeOutcome> {
        Self::require_node(ledger, &request.parent_id)?;
        Self::check_person(ledger, &request.person)?;
        Self::check_document(ledger, &request.document)?;

        let (pct, parent_level, existing) = {
            let graph = OwnershipGraph::new(&ledger.owners);
            let pct = self.validate_percentage(&graph, &request.parent_id, &request.percentage)?;

            let existing = match &request.person {
                PersonRef::Existing(pid) => ledger
                    .owners
                    .iter()
                    .find(|o| o.person_id.as_deref() == Some(pid.as_str()) && o.id != ROOT_NODE_ID)
                    .map(|o| o.id.clone()),
                PersonRef::New(_) => None,
            };
            if let Some(node_id) = &existing {
                Self::check_edge(&graph, &request.parent_id, node_id)?;
            }
            (pct, graph.node_level(&request.parent_id), existing)
        };

        let typed_name = match &request.person {
            PersonRef::New(name) => name.trim().to_string(),
            PersonRef::Existing(_) => String::new(),
        };
        let person_id = self.resolve_person(ledger, &request.person)?;
        let document_id = self.resolve_document(ledger, &request.document)?;
        let transfer = Transfer::new(request.parent_id.clone(), pct).with_document(document_id);

        if let Some(node_id) = existing {
            let node = ledger
                .node_mut(&node_id)
                .ok_or_else(|| DomainError::NodeNotFound(node_id.clone()))?;
            node.transfers.push(transfer);
            node.presentation = node.presentation.overlay(&request.presentation);
            if !request.relationship.trim().is_empty() {
                node.relationship = request.relationship.trim().to_string();
            }
            info!("added transfer {} -> {} ({}%)", request.parent_id, node_id, pct);
            return Ok(GranteeOutcome::Extended(node_id));
        }

        let display_name = if typed_name.is_empty() {
            ledger
                .person(&person_id)
                .map(|p| p.primary_name.clone())
                .unwrap_or_else(|| "Unknown".to_string())
        } else {
            to_title_case(&typed_name)
        };
        let name_as_written = request
            .name_as_written
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| {
                if typed_name.is_empty() {
                    display_name.clone()
                } else {
                    typed_name.clone()
                }
            });

        let id = Self::generate_id(ledger);
        let mut node = OwnershipNode::grantee(id.clone(), display_name, vec![transfer])
            .with_person(person_id)
            .with_level(parent_level + 1);
        node.name_as_written = name_as_written;
        node.relationship = request.relationship.trim().to_string();
        node.presentation = request.presentation;

        info!(
            "created owner {} ({}) receiving {}% of {}",
            node.display_name, id, pct, request.parent_id
        );
        ledger.owners.push(node);
        Ok(GranteeOutcome::Created(id))
    }

    /// Add another source to an existing node. Its tier does not change.
    #[instrument(
        level = "debug",
        skip(self, ledger, request),
        fields(from = %request.from_id, to = %request.to_id)
    )]
    pub fn add_transfer(
        &self,
        ledger: &mut Ledger,
        request: TransferRequest,
    ) -> ApplicationResult<()> {
        Self::require_node(ledger, &request.to_id)?;
        Self::require_node(ledger, &request.from_id)?;
        Self::check_document(ledger, &request.document)?;

        let pct = {
            let graph = OwnershipGraph::new(&ledger.owners);
            Self::check_edge(&graph, &request.from_id, &request.to_id)?;
            self.validate_percentage(&graph, &request.from_id, &request.percentage)?
        };

        let document_id = self.resolve_document(ledger, &request.document)?;
        let node = ledger
            .node_mut(&request.to_id)
            .ok_or_else(|| DomainError::NodeNotFound(request.to_id.clone()))?;
        node.transfers
            .push(Transfer::new(request.from_id.clone(), pct).with_document(document_id));
        info!("added transfer {} -> {} ({}%)", request.from_id, request.to_id, pct);
        Ok(())
    }

    /// Add a root node that is not connected to any other node.
    #[instrument(level = "debug", skip(self, ledger, request))]
    pub fn add_standalone(
        &self,
        ledger: &mut Ledger,
        request: StandaloneRequest,
    ) -> ApplicationResult<String> {
        Self::check_person(ledger, &request.person)?;
        Self::check_document(ledger, &request.document)?;

        let person_id = self.resolve_person(ledger, &request.person)?;
        let source_document_id = self.resolve_document(ledger, &request.document)?;
        let name = ledger
            .person(&person_id)
            .map(|p| p.primary_name.clone())
            .unwrap_or_else(|| "Unknown".to_string());

        let mut node = OwnershipNode::root(Self::generate_id(ledger), name).with_person(person_id);
        node.notes = request.notes;
        node.presentation = request.presentation;
        node.source_document_id = source_document_id;

        let id = node.id.clone();
        info!("created standalone owner {} ({})", node.display_name, id);
        ledger.owners.push(node);
        Ok(id)
    }

    /// Apply field updates to a node.
    ///
    /// Edited percentages must be positive numbers; they are not checked
    /// against the source's remaining interest.
    #[instrument(level = "debug", skip(self, ledger, edit))]
    pub fn edit_node(
        &self,
        ledger: &mut Ledger,
        node_id: &str,
        edit: NodeEdit,
    ) -> ApplicationResult<()> {
        if let Some(pid) = &edit.person_id {
            if ledger.person(pid).is_none() {
                return Err(DomainError::PersonNotFound(pid.clone()).into());
            }
        }
        if edit.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::EmptyName.into());
        }
        let transfers = {
            let node = ledger
                .node(node_id)
                .ok_or_else(|| DomainError::NodeNotFound(node_id.to_string()))?;
            Self::edited_transfers(ledger, node, &edit)?
        };

        let node = ledger
            .node_mut(node_id)
            .ok_or_else(|| DomainError::NodeNotFound(node_id.to_string()))?;
        if let Some(name) = edit.name {
            node.display_name = to_title_case(name.trim());
        }
        if let Some(written) = edit.name_as_written {
            node.name_as_written = written;
        }
        if let Some(notes) = edit.notes {
            node.notes = notes;
        }
        if let Some(pid) = edit.person_id {
            node.person_id = Some(pid);
        }
        if let Some(relationship) = edit.relationship {
            node.relationship = relationship;
        }
        if let Some(presentation) = edit.presentation {
            node.presentation = presentation;
        }
        if let Some(transfers) = transfers {
            node.transfers = transfers;
        }
        debug!("edited owner {}", node_id);
        Ok(())
    }

    /// The node's transfer list after `edit`, or `None` when it leaves them alone.
    fn edited_transfers(
        ledger: &Ledger,
        node: &OwnershipNode,
        edit: &NodeEdit,
    ) -> Result<Option<Vec<Transfer>>, DomainError> {
        if edit.transfer_updates.is_empty() && edit.dropped_transfers.is_empty() {
            return Ok(None);
        }
        let missing = |index: usize| DomainError::TransferNotFound {
            node: node.id.clone(),
            index,
        };

        let mut transfers = node.transfers.clone();
        for update in &edit.transfer_updates {
            let transfer = transfers
                .get_mut(update.index)
                .ok_or_else(|| missing(update.index))?;
            if let Some(input) = &update.percentage {
                transfer.percentage = parse_percentage(input)
                    .filter(|pct| *pct > 0.0)
                    .ok_or_else(|| DomainError::InvalidPercentage(input.clone()))?;
            }
            if let Some(document_id) = &update.document_id {
                if let Some(id) = document_id {
                    if ledger.document(id).is_none() {
                        return Err(DomainError::DocumentNotFound(id.clone()));
                    }
                }
                transfer.document_id = document_id.clone();
            }
        }

        let mut dropped = edit.dropped_transfers.clone();
        dropped.sort_unstable();
        dropped.dedup();
        if let Some(&index) = dropped.iter().find(|&&i| i >= transfers.len()) {
            return Err(missing(index));
        }
        if !dropped.is_empty() && dropped.len() == transfers.len() {
            return Err(DomainError::LastTransfer(node.id.clone()));
        }
        for index in dropped.into_iter().rev() {
            transfers.remove(index);
        }
        Ok(Some(transfers))
    }

    /// Remove a node, every transfer drawn from it, and its manual position.
    #[instrument(level = "debug", skip(self, ledger))]
    pub fn remove_node(&self, ledger: &mut Ledger, node_id: &str) -> ApplicationResult<()> {
        Self::require_node(ledger, node_id)?;
        for node in &mut ledger.owners {
            node.transfers.retain(|t| t.from_id != node_id);
        }
        ledger.owners.retain(|o| o.id != node_id);
        ledger.node_positions.remove(node_id);
        info!("removed owner {}", node_id);
        Ok(())
    }

    // ============================================================
    // Positions
    // ============================================================

    /// Pin a node to a manual position.
    pub fn set_position(
        &self,
        ledger: &mut Ledger,
        node_id: &str,
        point: Point,
    ) -> ApplicationResult<()> {
        Self::require_node(ledger, node_id)?;
        ledger.node_positions.insert(node_id.to_string(), point);
        Ok(())
    }

    /// Replace all manual positions with the automatic layout.
    pub fn apply_layout(
        &self,
        ledger: &mut Ledger,
        direction: LayoutDirection,
        config: &LayoutConfig,
    ) {
        ledger.node_positions = compute_layout(&ledger.owners, direction, config);
        debug!("stored {} positions", ledger.node_positions.len());
    }

    pub fn rename_project(&self, ledger: &mut Ledger, name: &str) -> ApplicationResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::EmptyName.into());
        }
        ledger.project_name = name.trim().to_string();
        Ok(())
    }
}
