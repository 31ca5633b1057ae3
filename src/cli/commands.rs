//! Command dispatch: one handler per subcommand

use std::io;
use std::path::PathBuf;

use clap::CommandFactory;
use clap_complete::{generate, Shell};
use tracing::{debug, instrument};

use crate::application::services::{
    GranteeOutcome, GranteeRequest, LedgerService, NodeEdit, NodeView, PersonRef,
    StandaloneRequest, TransferRequest,
};
use crate::cli::args::{
    Cli, ColorArgs, Commands, ConfigCommands, DocCommands, DocumentArgs, DocumentFields,
    PersonCommands,
};
use crate::cli::output;
use crate::cli::{CliError, CliResult};
use crate::config::{expand_path, global_config_path, project_config_path, Settings};
use crate::domain::{
    format_fraction, parse_percentage, DomainError, LayoutDirection, Ledger, Point,
};
use crate::infrastructure::di::ServiceContainer;
use crate::infrastructure::InfraError;

pub fn execute_command(cli: &Cli) -> CliResult<()> {
    match &cli.command {
        Some(Commands::Parse { input }) => _parse(input),
        Some(Commands::Fraction { percentage }) => _fraction(*percentage),
        Some(Commands::Completion { shell }) => _completion(*shell),
        Some(Commands::Config { command }) => _config(cli, command),
        Some(command) => {
            let container = ServiceContainer::new(load_settings(cli)?);
            debug!("ledger: {}", container.settings.data_file.display());
            dispatch(&container, command)
        }
        None => Cli::command()
            .print_help()
            .map_err(|e| InfraError::io("print help", e).into()),
    }
}

fn dispatch(c: &ServiceContainer, command: &Commands) -> CliResult<()> {
    match command {
        Commands::Init { name, force } => _init(c, name.as_deref(), *force),
        Commands::Show { id } => _show(c, id.as_deref()),
        Commands::Nodes { json } => _nodes(c, *json),
        Commands::Edges { json } => _edges(c, *json),
        Commands::Leaves => _leaves(c),
        Commands::Totals { json } => _totals(c, *json),
        Commands::Layout {
            direction,
            save,
            reset,
            json,
        } => _layout(c, *direction, *save, *reset, *json),
        Commands::Pin { id, x, y } => _pin(c, id, Point::new(*x, *y)),
        Commands::Check => _check(c),
        Commands::Grant {
            parent,
            percentage,
            name,
            person,
            as_written,
            relationship,
            document,
            colors,
        } => _grant(
            c,
            parent,
            percentage,
            name.as_deref(),
            person.as_deref(),
            as_written.clone(),
            relationship,
            document,
            colors,
        ),
        Commands::Transfer {
            from,
            to,
            percentage,
            document,
        } => _transfer(c, from, to, percentage, document),
        Commands::AddRoot {
            name,
            person,
            notes,
            document,
            colors,
        } => _add_root(c, name.as_deref(), person.as_deref(), notes, document, colors),
        Commands::Edit {
            id,
            name,
            as_written,
            notes,
            person,
            relationship,
            transfers,
            drop_transfers,
            colors,
        } => {
            let edit = NodeEdit {
                name: name.clone(),
                name_as_written: as_written.clone(),
                notes: notes.clone(),
                relationship: relationship.clone(),
                transfer_updates: transfers.clone(),
                dropped_transfers: drop_transfers.clone(),
                ..Default::default()
            };
            _edit(c, id, edit, person.as_deref(), colors)
        }
        Commands::Remove { id } => _remove(c, id),
        Commands::RenameProject { name } => {
            with_ledger(c, |svc, ledger| Ok(svc.rename_project(ledger, name)?))?;
            output::success(&format!("Renamed project to {}", name.trim()));
            Ok(())
        }
        Commands::Person { command } => _person(c, command),
        Commands::Doc { command } => _doc(c, command),
        Commands::Parse { .. }
        | Commands::Fraction { .. }
        | Commands::Completion { .. }
        | Commands::Config { .. } => Err(CliError::Usage(
            "command does not operate on a ledger".to_string(),
        )),
    }
}

// ============================================================
// Helpers
// ============================================================

fn project_dir(cli: &Cli) -> CliResult<PathBuf> {
    match &cli.project_dir {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir()
            .map_err(|e| InfraError::io("get current directory", e).into()),
    }
}

fn load_settings(cli: &Cli) -> CliResult<Settings> {
    let dir = project_dir(cli)?;
    let mut settings = Settings::load(Some(&dir))?;
    if let Some(file) = &cli.file {
        settings.data_file = expand_path(file);
    }
    Ok(settings)
}

/// Load the ledger, apply `f`, and save the result.
fn with_ledger<R>(
    c: &ServiceContainer,
    f: impl FnOnce(&LedgerService, &mut Ledger) -> CliResult<R>,
) -> CliResult<R> {
    let mut ledger = c.ledger.load()?;
    let result = f(&c.ledger, &mut ledger)?;
    c.ledger.save(&mut ledger)?;
    Ok(result)
}

/// Find a person by id, then by name or alias.
fn find_person(ledger: &Ledger, key: &str) -> CliResult<String> {
    ledger
        .person(key)
        .or_else(|| ledger.person_by_name(key))
        .map(|p| p.id.clone())
        .ok_or_else(|| DomainError::PersonNotFound(key.to_string()).into())
}

fn person_ref(ledger: &Ledger, name: Option<&str>, person: Option<&str>) -> CliResult<PersonRef> {
    match (name, person) {
        (_, Some(key)) => Ok(PersonRef::Existing(find_person(ledger, key)?)),
        (Some(name), None) => Ok(PersonRef::New(name.to_string())),
        (None, None) => Err(CliError::InvalidArgs(
            "either --name or --person is required".to_string(),
        )),
    }
}

/// `1/4 (25.0000%)`
fn share(pct: f64) -> String {
    format!("{} ({:.4}%)", format_fraction(pct), pct)
}

fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| InfraError::io("serialize output", io::Error::other(e)))?;
    output::info(&json);
    Ok(())
}

fn print_node(view: &NodeView) {
    output::header(&format!("{} [{}]", view.display_name, view.id));
    if !view.name_as_written.is_empty() && view.name_as_written != view.display_name {
        output::detail(&format!("as written: {}", view.name_as_written));
    }
    if let Some(person) = &view.person_name {
        let marker = if view.has_same_person_nodes {
            " (holds through several nodes)"
        } else {
            ""
        };
        output::detail(&format!("person: {}{}", person, marker));
    }
    if !view.relationship.is_empty() {
        output::detail(&format!("relationship: {}", view.relationship));
    }
    output::detail(&format!("tier: {}", view.level));
    output::detail(&format!("received: {}", share(view.total_received)));
    output::detail(&format!("holds: {}", share(view.current_ownership)));
    output::detail(&format!(
        "conveyed: {:.4}% of own interest, {:.4}% remaining",
        view.allocated_out, view.remaining
    ));
    for (idx, line) in view.breakdown.iter().enumerate() {
        output::detail(&format!(
            "#{} from {} [{}]: {}",
            idx, line.from_name, line.from_id, line
        ));
    }
    if view.has_notes {
        output::detail(&format!("notes: {}", view.notes.trim()));
    }
}

// ============================================================
// Ledger commands
// ============================================================

#[instrument(skip(c))]
fn _init(c: &ServiceContainer, name: Option<&str>, force: bool) -> CliResult<()> {
    let ledger = c.ledger.init(name, force)?;
    output::success(&format!(
        "Created ledger '{}' at {}",
        ledger.project_name,
        c.ledger.location().display()
    ));
    Ok(())
}

#[instrument(skip(c))]
fn _show(c: &ServiceContainer, id: Option<&str>) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    match id {
        Some(id) => print_node(&c.report.node_view(&ledger, id)?),
        None => {
            output::info(&c.report.chain_tree(&ledger));
            let findings = c.report.diagnostics(&ledger).len();
            if findings > 0 {
                output::warning(&format!(
                    "{} integrity problem(s); run `undivided check`",
                    findings
                ));
            }
        }
    }
    Ok(())
}

#[instrument(skip(c))]
fn _nodes(c: &ServiceContainer, json: bool) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    let views = c.report.node_views(&ledger);
    if json {
        return print_json(&views);
    }
    for view in &views {
        print_node(view);
    }
    Ok(())
}

#[instrument(skip(c))]
fn _edges(c: &ServiceContainer, json: bool) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    let edges = c.report.edges(&ledger);
    if json {
        return print_json(&edges);
    }
    for edge in &edges {
        output::info(&format!(
            "{} -> {}  {}  {}",
            edge.source,
            edge.target,
            format_fraction(edge.percentage),
            edge.label.as_deref().unwrap_or("")
        ));
    }
    Ok(())
}

#[instrument(skip(c))]
fn _leaves(c: &ServiceContainer) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    for view in c.report.leaf_views(&ledger) {
        output::info(&format!(
            "{:<32} {:<10} {}",
            view.display_name,
            view.id,
            share(view.current_ownership)
        ));
    }
    Ok(())
}

#[instrument(skip(c))]
fn _totals(c: &ServiceContainer, json: bool) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    let totals = c.report.person_totals(&ledger);
    if json {
        return print_json(&totals);
    }
    output::header(&format!("{}: current interest by person", ledger.project_name));
    for total in &totals {
        output::detail(&format!("{:<32} {}", total.name, share(total.total)));
    }
    let sum: f64 = totals.iter().map(|t| t.total).sum();
    output::detail(&format!("{:<32} {}", "total", share(sum)));
    Ok(())
}

#[instrument(skip(c))]
fn _layout(
    c: &ServiceContainer,
    direction: Option<LayoutDirection>,
    save: bool,
    reset: bool,
    json: bool,
) -> CliResult<()> {
    let direction = direction.unwrap_or(c.settings.layout.direction);
    let ledger = if save || reset {
        with_ledger(c, |svc, ledger| {
            if reset {
                ledger.node_positions.clear();
            } else {
                svc.apply_layout(ledger, direction, c.report.layout_config());
            }
            Ok(ledger.clone())
        })?
    } else {
        c.ledger.load()?
    };

    let positions = c.report.positions(&ledger, direction);
    if json {
        return print_json(&positions);
    }
    for (id, point) in &positions {
        let pinned = if ledger.node_positions.contains_key(id) {
            " (pinned)"
        } else {
            ""
        };
        output::info(&format!("{:<10} {:>8.1} {:>8.1}{}", id, point.x, point.y, pinned));
    }
    Ok(())
}

#[instrument(skip(c))]
fn _pin(c: &ServiceContainer, id: &str, point: Point) -> CliResult<()> {
    with_ledger(c, |svc, ledger| Ok(svc.set_position(ledger, id, point)?))?;
    output::success(&format!("Pinned {} at ({}, {})", id, point.x, point.y));
    Ok(())
}

#[instrument(skip(c))]
fn _check(c: &ServiceContainer) -> CliResult<()> {
    let ledger = c.ledger.load()?;
    let findings = c.report.diagnostics(&ledger);
    if findings.is_empty() {
        output::success("Ledger is consistent");
        return Ok(());
    }
    for finding in &findings {
        output::failure(finding);
    }
    Err(CliError::CheckFailed(findings.len()))
}

// ============================================================
// Conveyances
// ============================================================

#[allow(clippy::too_many_arguments)]
#[instrument(skip(c, document, colors))]
fn _grant(
    c: &ServiceContainer,
    parent: &str,
    percentage: &str,
    name: Option<&str>,
    person: Option<&str>,
    as_written: Option<String>,
    relationship: &str,
    document: &DocumentArgs,
    colors: &ColorArgs,
) -> CliResult<()> {
    let (outcome, label) = with_ledger(c, |svc, ledger| {
        let request = GranteeRequest {
            parent_id: parent.to_string(),
            person: person_ref(ledger, name, person)?,
            name_as_written: as_written,
            percentage: percentage.to_string(),
            document: document.to_ref(),
            relationship: relationship.to_string(),
            presentation: colors.to_presentation(),
        };
        let outcome = svc.add_grantee(ledger, request)?;
        let label = ledger
            .node(outcome.node_id())
            .map(|n| n.display_name.clone())
            .unwrap_or_default();
        Ok((outcome, label))
    })?;

    match outcome {
        GranteeOutcome::Created(id) => {
            output::success(&format!("Created {} [{}] from {}", label, id, parent))
        }
        GranteeOutcome::Extended(id) => output::success(&format!(
            "Added transfer from {} to existing owner {} [{}]",
            parent, label, id
        )),
    }
    Ok(())
}

#[instrument(skip(c, document))]
fn _transfer(
    c: &ServiceContainer,
    from: &str,
    to: &str,
    percentage: &str,
    document: &DocumentArgs,
) -> CliResult<()> {
    with_ledger(c, |svc, ledger| {
        let request = TransferRequest {
            from_id: from.to_string(),
            to_id: to.to_string(),
            percentage: percentage.to_string(),
            document: document.to_ref(),
        };
        Ok(svc.add_transfer(ledger, request)?)
    })?;
    output::success(&format!("Added transfer {} -> {}", from, to));
    Ok(())
}

#[instrument(skip(c, document, colors))]
fn _add_root(
    c: &ServiceContainer,
    name: Option<&str>,
    person: Option<&str>,
    notes: &str,
    document: &DocumentArgs,
    colors: &ColorArgs,
) -> CliResult<()> {
    let id = with_ledger(c, |svc, ledger| {
        let request = StandaloneRequest {
            person: person_ref(ledger, name, person)?,
            notes: notes.to_string(),
            document: document.to_ref(),
            presentation: colors.to_presentation(),
        };
        Ok(svc.add_standalone(ledger, request)?)
    })?;
    output::success(&format!("Created root owner [{}]", id));
    Ok(())
}

#[instrument(skip(c, edit, colors))]
fn _edit(
    c: &ServiceContainer,
    id: &str,
    mut edit: NodeEdit,
    person: Option<&str>,
    colors: &ColorArgs,
) -> CliResult<()> {
    with_ledger(c, |svc, ledger| {
        if let Some(key) = person {
            edit.person_id = Some(find_person(ledger, key)?);
        }
        if !colors.is_empty() {
            edit.presentation = ledger
                .node(id)
                .map(|n| n.presentation.overlay(&colors.to_presentation()));
        }
        Ok(svc.edit_node(ledger, id, edit)?)
    })?;
    output::success(&format!("Updated {}", id));
    Ok(())
}

#[instrument(skip(c))]
fn _remove(c: &ServiceContainer, id: &str) -> CliResult<()> {
    with_ledger(c, |svc, ledger| Ok(svc.remove_node(ledger, id)?))?;
    output::success(&format!("Removed {}", id));
    Ok(())
}

// ============================================================
// Persons and documents
// ============================================================

fn _person(c: &ServiceContainer, command: &PersonCommands) -> CliResult<()> {
    match command {
        PersonCommands::Add { name } => {
            let id = with_ledger(c, |svc, ledger| Ok(svc.add_person(ledger, name)?))?;
            output::success(&format!("Added person [{}]", id));
        }
        PersonCommands::List => {
            let ledger = c.ledger.load()?;
            for person in &ledger.persons {
                let aliases = if person.aliases.is_empty() {
                    String::new()
                } else {
                    format!("  aka {}", person.aliases.join(", "))
                };
                output::info(&format!("{:<12} {}{}", person.id, person.primary_name, aliases));
            }
        }
        PersonCommands::Rename { id, name } => {
            with_ledger(c, |svc, ledger| {
                let id = find_person(ledger, id)?;
                Ok(svc.rename_person(ledger, &id, name)?)
            })?;
            output::success(&format!("Renamed {}", id));
        }
        PersonCommands::Alias { id, alias } => {
            with_ledger(c, |svc, ledger| {
                let id = find_person(ledger, id)?;
                Ok(svc.add_alias(ledger, &id, alias)?)
            })?;
            output::success(&format!("Added alias '{}'", alias.trim()));
        }
    }
    Ok(())
}

fn _doc(c: &ServiceContainer, command: &DocCommands) -> CliResult<()> {
    match command {
        DocCommands::Add { fields } => {
            let id = with_ledger(c, |svc, ledger| {
                Ok(svc.add_document(ledger, fields.to_document())?)
            })?;
            output::success(&format!("Recorded document [{}]", id));
        }
        DocCommands::Update { id, fields } => {
            with_ledger(c, |svc, ledger| update_document(svc, ledger, id, fields))?;
            output::success(&format!("Updated document {}", id));
        }
        DocCommands::List => {
            let ledger = c.ledger.load()?;
            for doc in &ledger.documents {
                output::info(&format!(
                    "{:<12} {:<16} {}",
                    doc.id,
                    doc.short_label().unwrap_or_default(),
                    doc.document_title
                ));
            }
        }
        DocCommands::Remove { id } => {
            with_ledger(c, |svc, ledger| Ok(svc.delete_document(ledger, id)?))?;
            output::success(&format!("Removed document {}", id));
        }
        DocCommands::Grantees { id } => {
            let ledger = c.ledger.load()?;
            for grantee in c.report.document_grantees(&ledger, id)? {
                output::info(&format!(
                    "{:<32} {:<10} {} from {}",
                    grantee.name,
                    grantee.node_id,
                    format_fraction(grantee.percentage),
                    grantee.from_id
                ));
            }
        }
    }
    Ok(())
}

fn update_document(
    svc: &LedgerService,
    ledger: &mut Ledger,
    id: &str,
    fields: &DocumentFields,
) -> CliResult<()> {
    let mut document = ledger
        .document(id)
        .cloned()
        .ok_or_else(|| DomainError::DocumentNotFound(id.to_string()))?;
    fields.apply_to(&mut document);
    Ok(svc.update_document(ledger, id, document)?)
}

// ============================================================
// Stateless commands
// ============================================================

fn _parse(input: &str) -> CliResult<()> {
    let pct = parse_percentage(input)
        .ok_or_else(|| DomainError::InvalidPercentage(input.to_string()))?;
    output::info(&share(pct));
    Ok(())
}

fn _fraction(percentage: f64) -> CliResult<()> {
    output::info(&format_fraction(percentage));
    Ok(())
}

fn _completion(shell: Shell) -> CliResult<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

fn _config(cli: &Cli, command: &ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Show => {
            let settings = load_settings(cli)?;
            output::info(&settings.to_toml()?);
        }
        ConfigCommands::Path => {
            let dir = project_dir(cli)?;
            match global_config_path() {
                Some(path) => output::action("global", &path.display()),
                None => output::warning("no config directory on this platform"),
            }
            output::action("project", &project_config_path(&dir).display());
            let settings = load_settings(cli)?;
            output::action("ledger", &settings.data_file.display());
        }
        ConfigCommands::Init { global } => {
            let path = if *global {
                global_config_path().ok_or_else(|| {
                    CliError::Usage("no config directory on this platform".to_string())
                })?
            } else {
                project_config_path(&project_dir(cli)?)
            };
            if path.exists() {
                return Err(CliError::Usage(format!(
                    "config already exists: {}",
                    path.display()
                )));
            }
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| InfraError::io(format!("create {}", parent.display()), e))?;
            }
            std::fs::write(&path, Settings::template())
                .map_err(|e| InfraError::io(format!("write {}", path.display()), e))?;
            output::success(&format!("Created {}", path.display()));
        }
    }
    Ok(())
}
