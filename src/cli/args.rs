//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueHint};

use crate::application::services::{DocumentRef, TransferUpdate};
use crate::domain::{Document, LayoutDirection, Presentation};

/// Fractional ownership chains: who holds what share of an undivided property
#[derive(Parser, Debug)]
#[command(name = "undivided")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Debug level: -d info, -dd debug, -ddd trace
    #[arg(short = 'd', long = "debug", action = ArgAction::Count, global = true)]
    pub debug: u8,

    /// Ledger file (overrides config)
    #[arg(short = 'f', long = "file", global = true, value_hint = ValueHint::FilePath)]
    pub file: Option<PathBuf>,

    /// Project directory holding .undivided.toml (default: cwd)
    #[arg(short = 'C', long, global = true, value_hint = ValueHint::DirPath)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a ledger seeded with the original owner
    Init {
        /// Project name
        #[arg(short, long)]
        name: Option<String>,
        /// Replace an existing ledger
        #[arg(long)]
        force: bool,
    },

    /// Show the ownership chain as a tree, or one owner in detail
    Show {
        /// Owner id
        id: Option<String>,
    },

    /// List every owner with received, held, and conveyed interest
    Nodes {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List conveyance edges with their labels
    Edges {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// List owners that still hold interest
    Leaves,

    /// Current interest per person
    Totals {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compute diagram positions
    Layout {
        /// vertical (tb) or horizontal (lr); default from config
        #[arg(short = 'D', long)]
        direction: Option<LayoutDirection>,
        /// Store the automatic layout as manual positions
        #[arg(long, conflicts_with = "reset")]
        save: bool,
        /// Drop all manual positions
        #[arg(long)]
        reset: bool,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pin an owner to a manual diagram position
    Pin {
        id: String,
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
    },

    /// Report cycles, over-allocation, and dangling references
    Check,

    /// Convey part of an owner's interest to a person
    Grant {
        /// Grantor owner id
        parent: String,
        /// Share of the grantor's interest: 1/4, 0.25, or 25
        #[arg(allow_hyphen_values = true)]
        percentage: String,
        /// New grantee name
        #[arg(short, long, required_unless_present = "person", conflicts_with = "person")]
        name: Option<String>,
        /// Existing person id or name
        #[arg(short, long)]
        person: Option<String>,
        /// Name exactly as written in the instrument
        #[arg(long)]
        as_written: Option<String>,
        /// Relation to the grantor, e.g. "heir"
        #[arg(short, long, default_value = "")]
        relationship: String,
        #[command(flatten)]
        document: DocumentArgs,
        #[command(flatten)]
        colors: ColorArgs,
    },

    /// Add another source of interest to an existing owner
    Transfer {
        /// Grantor owner id
        from: String,
        /// Receiving owner id
        to: String,
        /// Share of the grantor's interest: 1/4, 0.25, or 25
        #[arg(allow_hyphen_values = true)]
        percentage: String,
        #[command(flatten)]
        document: DocumentArgs,
    },

    /// Add an unconnected owner holding 100% of itself
    #[command(name = "add-root")]
    AddRoot {
        /// New person name
        #[arg(short, long, required_unless_present = "person", conflicts_with = "person")]
        name: Option<String>,
        /// Existing person id or name
        #[arg(short, long)]
        person: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
        #[command(flatten)]
        document: DocumentArgs,
        #[command(flatten)]
        colors: ColorArgs,
    },

    /// Edit an owner's fields
    Edit {
        id: String,
        #[arg(short, long)]
        name: Option<String>,
        #[arg(long)]
        as_written: Option<String>,
        #[arg(long)]
        notes: Option<String>,
        /// Person id or name
        #[arg(short, long)]
        person: Option<String>,
        #[arg(short, long)]
        relationship: Option<String>,
        /// Change transfer IDX (see `show <id>`); an empty DOC clears the document
        #[arg(long = "transfer", value_name = "IDX=PCT[@DOC]")]
        transfers: Vec<TransferUpdate>,
        /// Remove transfer IDX; the last transfer cannot be removed
        #[arg(long = "drop-transfer", value_name = "IDX")]
        drop_transfers: Vec<usize>,
        #[command(flatten)]
        colors: ColorArgs,
    },

    /// Remove an owner and every transfer drawn from it
    Remove { id: String },

    /// Rename the project
    #[command(name = "rename-project")]
    RenameProject { name: String },

    /// Manage persons
    Person {
        #[command(subcommand)]
        command: PersonCommands,
    },

    /// Manage recorded documents
    Doc {
        #[command(subcommand)]
        command: DocCommands,
    },

    /// Parse a percentage input the way grant and transfer do
    Parse {
        #[arg(allow_hyphen_values = true)]
        input: String,
    },

    /// Render a percentage as a reduced fraction of the whole
    Fraction {
        #[arg(allow_hyphen_values = true)]
        percentage: f64,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
pub enum PersonCommands {
    /// Add a person
    Add { name: String },
    /// List persons
    List,
    /// Change a person's primary name
    Rename { id: String, name: String },
    /// Add an alternative spelling
    Alias { id: String, alias: String },
}

#[derive(Subcommand, Debug)]
pub enum DocCommands {
    /// Record a document
    Add {
        #[command(flatten)]
        fields: DocumentFields,
    },
    /// Change a document's fields
    Update {
        id: String,
        #[command(flatten)]
        fields: DocumentFields,
    },
    /// List documents
    List,
    /// Remove a document and clear references to it
    Remove { id: String },
    /// Owners that received interest under a document
    Grantees { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show merged config
    Show,

    /// Create config template
    Init {
        /// Create global config
        #[arg(short, long)]
        global: bool,
    },

    /// Show config paths
    Path,
}

/// Recording details of a document.
#[derive(Args, Debug, Default, Clone)]
pub struct DocumentFields {
    /// Instrument number
    #[arg(long)]
    pub instrument: Option<String>,
    #[arg(long)]
    pub book: Option<String>,
    #[arg(long)]
    pub page: Option<String>,
    /// Recording date
    #[arg(long = "recorded")]
    pub date_recorded: Option<String>,
    /// Date of the instrument
    #[arg(long = "dated")]
    pub document_date: Option<String>,
    #[arg(long)]
    pub grantor: Option<String>,
    /// Document title, e.g. "Warranty Deed"
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long = "doc-note")]
    pub note: Option<String>,
}

impl DocumentFields {
    pub fn is_empty(&self) -> bool {
        [
            &self.instrument,
            &self.book,
            &self.page,
            &self.date_recorded,
            &self.document_date,
            &self.grantor,
            &self.title,
            &self.note,
        ]
        .iter()
        .all(|f| f.is_none())
    }

    /// Overwrite the fields that were given on the command line.
    pub fn apply_to(&self, document: &mut Document) {
        let pairs = [
            (&self.instrument, &mut document.instrument_number),
            (&self.book, &mut document.book),
            (&self.page, &mut document.page),
            (&self.date_recorded, &mut document.date_recorded),
            (&self.document_date, &mut document.document_date),
            (&self.grantor, &mut document.grantor),
            (&self.title, &mut document.document_title),
            (&self.note, &mut document.note),
        ];
        for (value, slot) in pairs {
            if let Some(value) = value {
                *slot = value.trim().to_string();
            }
        }
    }

    pub fn to_document(&self) -> Document {
        let mut document = Document::default();
        self.apply_to(&mut document);
        document
    }
}

/// Document reference of a conveyance: an existing id or new recording details.
#[derive(Args, Debug, Default, Clone)]
pub struct DocumentArgs {
    /// Existing document id
    #[arg(long = "doc")]
    pub document_id: Option<String>,
    #[command(flatten)]
    pub fields: DocumentFields,
}

impl DocumentArgs {
    pub fn to_ref(&self) -> DocumentRef {
        match &self.document_id {
            Some(id) => DocumentRef::Existing(id.clone()),
            None if self.fields.is_empty() => DocumentRef::None,
            None => DocumentRef::New(self.fields.to_document()),
        }
    }
}

/// Diagram colors of an owner.
#[derive(Args, Debug, Default, Clone)]
pub struct ColorArgs {
    #[arg(long)]
    pub fill_color: Option<String>,
    #[arg(long)]
    pub border_color: Option<String>,
    #[arg(long)]
    pub line_color: Option<String>,
}

impl ColorArgs {
    pub fn is_empty(&self) -> bool {
        self.fill_color.is_none() && self.border_color.is_none() && self.line_color.is_none()
    }

    pub fn to_presentation(&self) -> Presentation {
        Presentation {
            fill_color: self.fill_color.clone(),
            border_color: self.border_color.clone(),
            line_color: self.line_color.clone(),
        }
    }
}
