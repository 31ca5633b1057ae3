//! Tests for LedgerService

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rstest::rstest;

use undivided::application::services::{
    DocumentRef, GranteeOutcome, GranteeRequest, LedgerService, NodeEdit, PersonRef,
    StandaloneRequest, TransferRequest, TransferUpdate,
};
use undivided::application::ApplicationError;
use undivided::domain::{
    Document, DomainError, LayoutConfig, LayoutDirection, Ledger, OwnershipGraph, Point,
    Presentation, ROOT_NODE_ID, ROOT_PERSON_ID,
};
use undivided::infrastructure::traits::LedgerStore;
use undivided::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

/// In-memory ledger store.
#[derive(Default)]
struct MockStore {
    ledger: Mutex<Option<Ledger>>,
    saves: Mutex<usize>,
}

impl MockStore {
    fn with(ledger: Ledger) -> Self {
        Self {
            ledger: Mutex::new(Some(ledger)),
            saves: Mutex::new(0),
        }
    }

    fn saves(&self) -> usize {
        *self.saves.lock().unwrap()
    }
}

impl LedgerStore for MockStore {
    fn load(&self) -> io::Result<Option<Ledger>> {
        Ok(self.ledger.lock().unwrap().clone())
    }

    fn save(&self, ledger: &Ledger) -> io::Result<()> {
        *self.ledger.lock().unwrap() = Some(ledger.clone());
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("memory://ledger")
    }
}

/// Store whose every operation fails.
struct BrokenStore;

impl LedgerStore for BrokenStore {
    fn load(&self) -> io::Result<Option<Ledger>> {
        Err(io::Error::new(io::ErrorKind::InvalidData, "garbage"))
    }

    fn save(&self, _ledger: &Ledger) -> io::Result<()> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
    }

    fn location(&self) -> PathBuf {
        PathBuf::from("broken://ledger")
    }
}

fn service() -> LedgerService {
    LedgerService::new(Arc::new(MockStore::default()))
}

fn grant(parent: &str, person: PersonRef, percentage: &str) -> GranteeRequest {
    GranteeRequest {
        parent_id: parent.to_string(),
        person,
        name_as_written: None,
        percentage: percentage.to_string(),
        document: DocumentRef::None,
        relationship: String::new(),
        presentation: Presentation::default(),
    }
}

fn new_person(name: &str) -> PersonRef {
    PersonRef::New(name.to_string())
}

fn created(outcome: GranteeOutcome) -> String {
    match outcome {
        GranteeOutcome::Created(id) => id,
        GranteeOutcome::Extended(id) => panic!("expected a new node, got extension of {}", id),
    }
}

// ============================================================
// Persistence
// ============================================================

#[test]
fn given_empty_store_when_loading_then_not_initialized() {
    let svc = service();

    let result = svc.load();

    assert!(matches!(
        result,
        Err(ApplicationError::LedgerNotInitialized(_))
    ));
    assert_eq!(svc.load_or_default().unwrap(), Ledger::default());
}

#[test]
fn given_empty_store_when_init_then_seeds_original_owner() {
    // Arrange
    let store = Arc::new(MockStore::default());
    let svc = LedgerService::new(store.clone());

    // Act
    let ledger = svc.init(Some("Tract 7"), false).unwrap();

    // Assert
    assert_eq!(ledger.project_name, "Tract 7");
    assert_eq!(ledger.owners.len(), 1);
    assert_eq!(ledger.owners[0].id, ROOT_NODE_ID);
    assert_eq!(ledger.owners[0].person_id.as_deref(), Some(ROOT_PERSON_ID));
    assert_eq!(ledger.owners[0].original_level, Some(0));
    assert!(ledger.last_saved.is_some());
    assert_eq!(store.saves(), 1);
}

#[test]
fn given_existing_ledger_when_init_without_force_then_refuses() {
    let svc = LedgerService::new(Arc::new(MockStore::with(Ledger::default())));

    assert!(matches!(
        svc.init(None, false),
        Err(ApplicationError::LedgerAlreadyExists(_))
    ));
    assert!(svc.init(None, true).is_ok());
}

#[test]
fn given_broken_store_when_loading_then_error_names_location() {
    let svc = LedgerService::new(Arc::new(BrokenStore));

    let err = svc.load().unwrap_err();

    assert!(err.to_string().contains("broken://ledger"), "{}", err);
    let mut ledger = Ledger::default();
    assert!(svc.save(&mut ledger).is_err());
}

// ============================================================
// Grantees
// ============================================================

#[test]
fn given_root_when_granting_new_person_then_creates_node_one_tier_below() {
    // Arrange
    let svc = service();
    let mut ledger = Ledger::default();

    // Act
    let id = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("jane DOE"), "1/4"))
            .unwrap(),
    );

    // Assert
    let node = ledger.node(&id).expect("node created");
    assert_eq!(node.display_name, "Jane Doe");
    assert_eq!(node.name_as_written, "jane DOE");
    assert_eq!(node.original_level, Some(1));
    assert_eq!(node.transfers.len(), 1);
    assert_eq!(node.transfers[0].from_id, ROOT_NODE_ID);
    assert_eq!(node.transfers[0].percentage, 25.0);
    let person = ledger.person(node.person_id.as_deref().unwrap()).unwrap();
    assert_eq!(person.primary_name, "Jane Doe");
    assert_eq!(ledger.persons.len(), 2);
}

#[test]
fn given_person_with_node_when_granting_again_then_extends_existing_node() {
    // Arrange: root → a (grandchild tier) and b; then b grants to a's person
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );
    let b = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Bob"), "50"))
            .unwrap(),
    );
    let ann = ledger.node(&a).unwrap().person_id.clone().unwrap();

    // Act
    let outcome = svc
        .add_grantee(&mut ledger, grant(&b, PersonRef::Existing(ann), "1/2"))
        .unwrap();

    // Assert
    assert_eq!(outcome, GranteeOutcome::Extended(a.clone()));
    let node = ledger.node(&a).unwrap();
    assert_eq!(node.transfers.len(), 2);
    assert_eq!(node.original_level, Some(1));
    let graph = OwnershipGraph::new(&ledger.owners);
    assert_eq!(graph.total_interest(&a), 75.0);
    assert_eq!(ledger.owners.len(), 3);
}

#[test]
fn given_root_person_when_granting_then_root_node_is_not_reused() {
    let svc = service();
    let mut ledger = Ledger::default();

    let outcome = svc
        .add_grantee(
            &mut ledger,
            grant(ROOT_NODE_ID, PersonRef::Existing(ROOT_PERSON_ID.to_string()), "10"),
        )
        .unwrap();

    assert!(matches!(outcome, GranteeOutcome::Created(_)));
    assert_eq!(
        ledger.node(outcome.node_id()).unwrap().display_name,
        "Original Owner"
    );
}

#[test]
fn given_remaining_interest_when_granting_too_much_then_rejects_with_fraction() {
    // Arrange: root already conveyed 3/4
    let svc = service();
    let mut ledger = Ledger::default();
    svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "75"))
        .unwrap();
    let before = ledger.clone();

    // Act
    let err = svc
        .add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Bob"), "1/2"))
        .unwrap_err();

    // Assert
    assert_eq!(err.to_string(), "percentage must be between 0 and 1/4");
    assert_eq!(ledger, before, "rejected request must not mutate");
}

#[test]
fn given_slack_when_granting_marginally_more_than_remaining_then_accepts() {
    let svc = service();
    let mut ledger = Ledger::default();

    let result = svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "100.005"));

    assert!(result.is_ok());
}

#[test]
fn given_invalid_percentage_when_granting_then_rejects() {
    let svc = service();
    let mut ledger = Ledger::default();

    for input in ["abc", "1/0", "0", "-5"] {
        let err = svc
            .add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), input))
            .unwrap_err();
        assert!(
            matches!(
                err,
                ApplicationError::Domain(
                    DomainError::InvalidPercentage(_) | DomainError::PercentageOutOfRange { .. }
                )
            ),
            "input {:?}: {}",
            input,
            err
        );
    }
    assert_eq!(ledger.owners.len(), 1);
    assert_eq!(ledger.persons.len(), 1, "no person created on rejection");
}

#[test]
fn given_unknown_parent_when_granting_then_node_not_found() {
    let svc = service();
    let mut ledger = Ledger::default();

    let err = svc
        .add_grantee(&mut ledger, grant("nope", new_person("Ann"), "10"))
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::NodeNotFound(_))
    ));
}

#[test]
fn given_new_document_when_granting_then_document_is_recorded_and_linked() {
    let svc = service();
    let mut ledger = Ledger::default();
    let mut request = grant(ROOT_NODE_ID, new_person("Ann"), "10");
    request.document = DocumentRef::New(Document {
        book: "12".into(),
        page: "34".into(),
        ..Default::default()
    });

    let id = created(svc.add_grantee(&mut ledger, request).unwrap());

    assert_eq!(ledger.documents.len(), 1);
    let doc_id = ledger.documents[0].id.clone();
    assert_eq!(
        ledger.node(&id).unwrap().transfers[0].document_id,
        Some(doc_id)
    );
}

#[test]
fn given_unidentifiable_document_when_granting_then_no_document_is_recorded() {
    let svc = service();
    let mut ledger = Ledger::default();
    let mut request = grant(ROOT_NODE_ID, new_person("Ann"), "10");
    request.document = DocumentRef::New(Document {
        grantor: "Someone".into(),
        ..Default::default()
    });

    let id = created(svc.add_grantee(&mut ledger, request).unwrap());

    assert!(ledger.documents.is_empty());
    assert_eq!(ledger.node(&id).unwrap().transfers[0].document_id, None);
}

// ============================================================
// Transfers
// ============================================================

#[test]
fn given_two_owners_when_adding_transfer_then_target_gains_source() {
    // Arrange
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );
    let b = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Bob"), "25"))
            .unwrap(),
    );

    // Act
    svc.add_transfer(
        &mut ledger,
        TransferRequest {
            from_id: a.clone(),
            to_id: b.clone(),
            percentage: "0.5".to_string(),
            document: DocumentRef::None,
        },
    )
    .unwrap();

    // Assert
    let graph = OwnershipGraph::new(&ledger.owners);
    assert_eq!(graph.total_interest(&b), 50.0);
    assert_eq!(graph.remaining(&a), 50.0);
    assert_eq!(ledger.node(&b).unwrap().original_level, Some(1));
}

#[test]
fn given_descendant_when_transferring_back_then_cycle_is_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );

    let err = svc
        .add_transfer(
            &mut ledger,
            TransferRequest {
                from_id: a.clone(),
                to_id: ROOT_NODE_ID.to_string(),
                percentage: "10".to_string(),
                document: DocumentRef::None,
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::CycleWouldForm { .. })
    ));
    assert!(ledger.node(ROOT_NODE_ID).unwrap().transfers.is_empty());
}

#[test]
fn given_same_node_when_transferring_to_itself_then_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();

    let err = svc
        .add_transfer(
            &mut ledger,
            TransferRequest {
                from_id: ROOT_NODE_ID.to_string(),
                to_id: ROOT_NODE_ID.to_string(),
                percentage: "10".to_string(),
                document: DocumentRef::None,
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::SelfTransfer(_))
    ));
}

// ============================================================
// Standalone roots, edits, removal
// ============================================================

#[test]
fn given_standalone_request_when_adding_then_creates_tier_zero_root() {
    let svc = service();
    let mut ledger = Ledger::default();

    let id = svc
        .add_standalone(
            &mut ledger,
            StandaloneRequest {
                person: new_person("second family"),
                notes: "adjoining tract".to_string(),
                document: DocumentRef::New(Document {
                    instrument_number: "2020-001".into(),
                    ..Default::default()
                }),
                presentation: Presentation::default(),
            },
        )
        .unwrap();

    let node = ledger.node(&id).unwrap();
    assert!(node.is_root());
    assert_eq!(node.original_level, Some(0));
    assert_eq!(node.display_name, "Second Family");
    assert!(node.source_document_id.is_some());
    assert_eq!(OwnershipGraph::new(&ledger.owners).total_interest(&id), 100.0);
}

#[test]
fn given_node_when_editing_then_fields_change_and_name_is_title_cased() {
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );

    svc.edit_node(
        &mut ledger,
        &a,
        NodeEdit {
            name: Some("ann b. smith".to_string()),
            notes: Some("probate 1998".to_string()),
            relationship: Some("daughter".to_string()),
            ..Default::default()
        },
    )
    .unwrap();

    let node = ledger.node(&a).unwrap();
    assert_eq!(node.display_name, "Ann B. Smith");
    assert_eq!(node.notes, "probate 1998");
    assert_eq!(node.relationship, "daughter");
    assert_eq!(node.name_as_written, "Ann");
}

#[test]
fn given_unknown_person_when_editing_then_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();

    let err = svc
        .edit_node(
            &mut ledger,
            ROOT_NODE_ID,
            NodeEdit {
                person_id: Some("ghost".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::PersonNotFound(_))
    ));
}

#[test]
fn given_node_with_children_when_removing_then_outgoing_transfers_and_position_go() {
    // Arrange: root → a → b, a pinned
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );
    let b = created(
        svc.add_grantee(&mut ledger, grant(&a, new_person("Bob"), "100"))
            .unwrap(),
    );
    svc.set_position(&mut ledger, &a, Point::new(1.0, 2.0)).unwrap();

    // Act
    svc.remove_node(&mut ledger, &a).unwrap();

    // Assert
    assert!(ledger.node(&a).is_none());
    assert!(ledger.node(&b).unwrap().transfers.is_empty());
    assert!(!ledger.node_positions.contains_key(&a));
}

// ============================================================
// Persons and documents
// ============================================================

#[test]
fn given_person_when_adding_alias_then_duplicates_are_ignored() {
    let svc = service();
    let mut ledger = Ledger::default();
    let id = svc.add_person(&mut ledger, "john smith").unwrap();

    svc.add_alias(&mut ledger, &id, "J. Smith").unwrap();
    svc.add_alias(&mut ledger, &id, "j. smith").unwrap();
    svc.rename_person(&mut ledger, &id, "JOHN A SMITH").unwrap();

    let person = ledger.person(&id).unwrap();
    assert_eq!(person.primary_name, "John A Smith");
    assert_eq!(person.aliases, vec!["J. Smith".to_string()]);
    assert_eq!(ledger.person_by_name("j. smith").map(|p| p.id.as_str()), Some(id.as_str()));
}

#[test]
fn given_blank_name_when_adding_person_then_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();

    assert!(matches!(
        svc.add_person(&mut ledger, "   "),
        Err(ApplicationError::Domain(DomainError::EmptyName))
    ));
}

#[test]
fn given_referenced_document_when_deleting_then_references_are_cleared() {
    // Arrange
    let svc = service();
    let mut ledger = Ledger::default();
    let doc = svc
        .add_document(
            &mut ledger,
            Document {
                document_title: "Warranty Deed".into(),
                ..Default::default()
            },
        )
        .unwrap();
    let mut request = grant(ROOT_NODE_ID, new_person("Ann"), "50");
    request.document = DocumentRef::Existing(doc.clone());
    let a = created(svc.add_grantee(&mut ledger, request).unwrap());

    // Act
    svc.delete_document(&mut ledger, &doc).unwrap();

    // Assert
    assert!(ledger.documents.is_empty());
    assert_eq!(ledger.node(&a).unwrap().transfers[0].document_id, None);
}

#[test]
fn given_document_without_identity_when_adding_then_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();

    let err = svc
        .add_document(
            &mut ledger,
            Document {
                page: "7".into(),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::UnidentifiableDocument)
    ));
}

#[test]
fn given_unknown_document_when_granting_then_rejected() {
    let svc = service();
    let mut ledger = Ledger::default();
    let mut request = grant(ROOT_NODE_ID, new_person("Ann"), "50");
    request.document = DocumentRef::Existing("nope".to_string());

    let err = svc.add_grantee(&mut ledger, request).unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::DocumentNotFound(_))
    ));
}

// ============================================================
// Ids and positions
// ============================================================

#[test]
fn given_many_entities_when_generating_ids_then_all_are_unique() {
    let svc = service();
    let mut ledger = Ledger::default();
    for i in 0..50 {
        svc.add_person(&mut ledger, &format!("person {}", i)).unwrap();
    }

    let mut ids: Vec<&str> = ledger.persons.iter().map(|p| p.id.as_str()).collect();
    ids.sort();
    ids.dedup();

    assert_eq!(ids.len(), 51);
    assert!(ledger.persons[1..].iter().all(|p| p.id.len() == 9));
}

#[test]
fn given_ledger_when_applying_layout_then_positions_are_stored() {
    let svc = service();
    let mut ledger = Ledger::default();
    let a = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );

    svc.apply_layout(&mut ledger, LayoutDirection::Vertical, &LayoutConfig::default());

    assert_eq!(ledger.node_positions.len(), 2);
    assert_eq!(ledger.node_positions[&a].y, 330.0);
}

// ============================================================
// Transfer edits
// ============================================================

/// root → Ann (50); root → Bob (25) and Ann → Bob (50).
fn two_source_ledger(svc: &LedgerService) -> (Ledger, String, String) {
    let mut ledger = Ledger::default();
    let ann = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Ann"), "50"))
            .unwrap(),
    );
    let bob = created(
        svc.add_grantee(&mut ledger, grant(ROOT_NODE_ID, new_person("Bob"), "25"))
            .unwrap(),
    );
    svc.add_transfer(
        &mut ledger,
        TransferRequest {
            from_id: ann.clone(),
            to_id: bob.clone(),
            percentage: "50".to_string(),
            document: DocumentRef::None,
        },
    )
    .unwrap();
    (ledger, ann, bob)
}

fn update(
    index: usize,
    percentage: Option<&str>,
    document_id: Option<Option<&str>>,
) -> TransferUpdate {
    TransferUpdate {
        index,
        percentage: percentage.map(str::to_string),
        document_id: document_id.map(|d| d.map(str::to_string)),
    }
}

#[test]
fn given_node_with_two_sources_when_editing_transfers_then_share_and_document_change() {
    // Arrange
    let svc = service();
    let (mut ledger, ann, bob) = two_source_ledger(&svc);
    let doc = svc
        .add_document(
            &mut ledger,
            Document {
                instrument_number: "1999-042".into(),
                ..Default::default()
            },
        )
        .unwrap();

    // Act
    svc.edit_node(
        &mut ledger,
        &bob,
        NodeEdit {
            transfer_updates: vec![update(1, Some("1/4"), Some(Some(doc.as_str())))],
            ..Default::default()
        },
    )
    .unwrap();

    // Assert
    let node = ledger.node(&bob).unwrap();
    assert_eq!(node.transfers[0].percentage, 25.0);
    assert_eq!(node.transfers[1].from_id, ann);
    assert_eq!(node.transfers[1].percentage, 25.0);
    assert_eq!(node.transfers[1].document_id.as_deref(), Some(doc.as_str()));
    let graph = OwnershipGraph::new(&ledger.owners);
    assert_eq!(graph.total_interest(&bob), 37.5);
}

#[test]
fn given_linked_document_when_clearing_it_then_transfer_has_none() {
    let svc = service();
    let (mut ledger, _, bob) = two_source_ledger(&svc);
    ledger.node_mut(&bob).unwrap().transfers[0].document_id = Some("stale".to_string());

    svc.edit_node(
        &mut ledger,
        &bob,
        NodeEdit {
            transfer_updates: vec![update(0, None, Some(None))],
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(ledger.node(&bob).unwrap().transfers[0].document_id, None);
}

#[test]
fn given_node_with_two_sources_when_dropping_one_then_the_other_remains() {
    let svc = service();
    let (mut ledger, ann, bob) = two_source_ledger(&svc);

    svc.edit_node(
        &mut ledger,
        &bob,
        NodeEdit {
            dropped_transfers: vec![0],
            ..Default::default()
        },
    )
    .unwrap();

    let node = ledger.node(&bob).unwrap();
    assert_eq!(node.transfers.len(), 1);
    assert_eq!(node.transfers[0].from_id, ann);
    assert_eq!(OwnershipGraph::new(&ledger.owners).total_interest(&bob), 25.0);
}

#[test]
fn given_update_and_drop_when_editing_then_indices_refer_to_current_list() {
    let svc = service();
    let (mut ledger, ann, bob) = two_source_ledger(&svc);

    svc.edit_node(
        &mut ledger,
        &bob,
        NodeEdit {
            transfer_updates: vec![update(1, Some("10"), None)],
            dropped_transfers: vec![0],
            ..Default::default()
        },
    )
    .unwrap();

    let node = ledger.node(&bob).unwrap();
    assert_eq!(node.transfers.len(), 1);
    assert_eq!(node.transfers[0].from_id, ann);
    assert_eq!(node.transfers[0].percentage, 10.0);
}

#[test]
fn given_every_transfer_when_dropping_then_refuses_and_keeps_node() {
    // Arrange
    let svc = service();
    let (mut ledger, _, bob) = two_source_ledger(&svc);
    let before = ledger.clone();

    // Act
    let err = svc
        .edit_node(
            &mut ledger,
            &bob,
            NodeEdit {
                dropped_transfers: vec![1, 0, 1],
                ..Default::default()
            },
        )
        .unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::LastTransfer(ref id)) if *id == bob
    ));
    assert_eq!(ledger, before);
}

#[rstest]
#[case("abc")]
#[case("0")]
#[case("-5")]
#[case("1/0")]
fn given_bad_percentage_when_editing_transfer_then_invalid_and_unchanged(#[case] input: &str) {
    // Arrange
    let svc = service();
    let (mut ledger, _, bob) = two_source_ledger(&svc);
    let before = ledger.clone();

    // Act
    let err = svc
        .edit_node(
            &mut ledger,
            &bob,
            NodeEdit {
                name: Some("Robert".to_string()),
                transfer_updates: vec![update(0, Some(input), None)],
                ..Default::default()
            },
        )
        .unwrap_err();

    // Assert
    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::InvalidPercentage(_))
    ));
    assert_eq!(ledger, before, "name must not change either");
}

#[test]
fn given_unknown_index_or_document_when_editing_transfer_then_rejected() {
    let svc = service();
    let (mut ledger, _, bob) = two_source_ledger(&svc);

    let out_of_range = svc
        .edit_node(
            &mut ledger,
            &bob,
            NodeEdit {
                transfer_updates: vec![update(2, Some("10"), None)],
                ..Default::default()
            },
        )
        .unwrap_err();
    let dropped_out_of_range = svc
        .edit_node(
            &mut ledger,
            &bob,
            NodeEdit {
                dropped_transfers: vec![5],
                ..Default::default()
            },
        )
        .unwrap_err();
    let unknown_doc = svc
        .edit_node(
            &mut ledger,
            &bob,
            NodeEdit {
                transfer_updates: vec![update(0, None, Some(Some("nope")))],
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        out_of_range,
        ApplicationError::Domain(DomainError::TransferNotFound { index: 2, .. })
    ));
    assert!(matches!(
        dropped_out_of_range,
        ApplicationError::Domain(DomainError::TransferNotFound { index: 5, .. })
    ));
    assert!(matches!(
        unknown_doc,
        ApplicationError::Domain(DomainError::DocumentNotFound(_))
    ));
}

#[test]
fn given_root_when_editing_transfer_then_no_transfer_to_edit() {
    let svc = service();
    let mut ledger = Ledger::default();

    let err = svc
        .edit_node(
            &mut ledger,
            ROOT_NODE_ID,
            NodeEdit {
                dropped_transfers: vec![0],
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(
        err,
        ApplicationError::Domain(DomainError::TransferNotFound { index: 0, .. })
    ));
    assert!(ledger.node(ROOT_NODE_ID).unwrap().is_root());
}

#[rstest]
#[case("0=1/4", update(0, Some("1/4"), None))]
#[case("1=25@d1", update(1, Some("25"), Some(Some("d1"))))]
#[case("2=@d1", update(2, None, Some(Some("d1"))))]
#[case(" 3 = 0.5 @ ", update(3, Some("0.5"), Some(None)))]
fn given_cli_text_when_parsing_transfer_update_then_fields_match(
    #[case] input: &str,
    #[case] expected: TransferUpdate,
) {
    assert_eq!(input.parse::<TransferUpdate>(), Ok(expected));
}

#[rstest]
#[case("25")]
#[case("x=25")]
#[case("0=")]
#[case("-1=25")]
fn given_malformed_cli_text_when_parsing_transfer_update_then_error(#[case] input: &str) {
    assert!(input.parse::<TransferUpdate>().is_err());
}
