//! CLI argument parsing and command dispatch.
//!
//! This module provides the command-line interface for studbook using
//! clap's derive API. Each command has its own argument struct with
//! validation and helpful error messages.
//!
//! # Commands
//!
//! - `coi`: Compute the coefficient of inbreeding for a dog
//! - `tree`: Render a dog's pedigree as an indented tree
//! - `chart`: Render a dog's pedigree as generation columns
//! - `add-parent`: Set a parent slot, creating or linking the ancestor
//! - `edit-parent`: Edit the ancestor occupying a parent slot
//!
//! # Global Flags
//!
//! - `--json`: Output in JSON format (applies to all commands)
//! - `--file`: Path to the registry JSONL file
//!
//! # Example
//!
//! ```bash
//! studbook coi dog-a3f8 --generations 8
//! studbook tree dog-a3f8
//! studbook add-parent dog-a3f8 sire --name "Max" --breed "Whippet"
//! studbook edit-parent dog-a3f8 sire --champion
//! ```

use crate::domain::{ChartTheme, DisplayOptions, DogId, NewParent, ParentType, ParentUpdate};
use crate::output::{self, OutputMode};
use crate::registry::{IdGenerator, InMemoryRegistry};
use crate::session::ChartSession;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

const DEFAULT_REGISTRY_FILE: &str = ".studbook/dogs.jsonl";
const DEFAULT_ID_PREFIX: &str = "dog";

/// Studbook - pedigree analysis for breeding registries
///
/// Build ancestor charts, compute coefficients of inbreeding, and edit
/// pedigrees. Dog records are stored in a JSONL file for easy version
/// control integration.
#[derive(Parser, Debug)]
#[command(name = "studbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output in JSON format for programmatic use
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the registry JSONL file
    #[arg(long, global = true, default_value = DEFAULT_REGISTRY_FILE)]
    pub file: PathBuf,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Compute the coefficient of inbreeding for a dog
    ///
    /// Sums Wright's coefficient over every ancestor shared between the
    /// sire and dam lineages, and lists the shared ancestors with their
    /// contributions.
    Coi(CoiArgs),

    /// Render a dog's pedigree as an indented tree
    Tree(ChartArgs),

    /// Render a dog's pedigree as generation columns
    ///
    /// Shows one section per generation with 2^k slots each; unknown and
    /// beyond-depth ancestors keep their slots so positions line up.
    Chart(ChartArgs),

    /// Set a parent slot of a dog
    ///
    /// Creates a new ancestor record, or links an existing dog when `--id`
    /// is given. An occupied slot is overwritten.
    AddParent(AddParentArgs),

    /// Edit the ancestor occupying a parent slot
    ///
    /// Only provided fields are updated. Applying the same edit twice is
    /// a no-op.
    EditParent(EditParentArgs),
}

// ============================================================================
// Argument Structs
// ============================================================================

/// Arguments for the `coi` command
#[derive(Parser, Debug, Clone)]
pub struct CoiArgs {
    /// ID of the dog to analyze
    pub dog: String,

    /// Generations of ancestry to consider
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=16), default_value = "8")]
    pub generations: u8,
}

/// Arguments for the `tree` and `chart` commands
#[derive(Parser, Debug, Clone)]
pub struct ChartArgs {
    /// ID of the dog at the root of the chart
    pub dog: String,

    /// Generations of ancestry to render
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=16), default_value = "4")]
    pub generations: u8,

    /// Color theme
    #[arg(long, value_enum, default_value = "classic")]
    pub theme: ThemeArg,

    /// Hide championship badges
    #[arg(long)]
    pub no_champions: bool,

    /// Hide health-test markers
    #[arg(long)]
    pub no_health_tests: bool,

    /// Show dates of birth
    #[arg(long)]
    pub dates: bool,

    /// Show owner names
    #[arg(long)]
    pub owners: bool,
}

impl ChartArgs {
    fn display_options(&self) -> DisplayOptions {
        DisplayOptions {
            theme: self.theme.into(),
            show_champions: !self.no_champions,
            show_health_tests: !self.no_health_tests,
            show_dates: self.dates,
            show_owners: self.owners,
        }
    }
}

/// Arguments for the `add-parent` command
#[derive(Parser, Debug, Clone)]
pub struct AddParentArgs {
    /// ID of the dog whose parent slot to set
    pub dog: String,

    /// Which parent slot to set
    #[arg(value_enum)]
    pub parent_type: ParentTypeArg,

    /// Link an existing dog instead of creating a record
    #[arg(long)]
    pub id: Option<String>,

    /// Registered or call name of the new ancestor
    #[arg(long, required_unless_present = "id")]
    pub name: Option<String>,

    /// Breed of the new ancestor
    #[arg(long, default_value = "")]
    pub breed: String,

    /// Date of birth (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub date_of_birth: Option<NaiveDate>,

    /// Mark the ancestor as a champion
    #[arg(long)]
    pub champion: bool,

    /// Mark the ancestor as health tested
    #[arg(long)]
    pub health_tested: bool,

    /// Kennel-club registration number
    #[arg(long)]
    pub registration: Option<String>,

    /// Owner identifier
    #[arg(long)]
    pub owner_id: Option<String>,

    /// Owner display name
    #[arg(long)]
    pub owner_name: Option<String>,

    /// Generations of ancestry to load for validation
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=16), default_value = "8")]
    pub generations: u8,
}

/// Arguments for the `edit-parent` command
#[derive(Parser, Debug, Clone)]
pub struct EditParentArgs {
    /// ID of the dog whose parent to edit
    pub dog: String,

    /// Which parent slot to edit
    #[arg(value_enum)]
    pub parent_type: ParentTypeArg,

    /// New name
    #[arg(long)]
    pub name: Option<String>,

    /// New breed
    #[arg(long)]
    pub breed: Option<String>,

    /// New date of birth (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date, conflicts_with = "clear_date_of_birth")]
    pub date_of_birth: Option<NaiveDate>,

    /// Clear the date of birth
    #[arg(long)]
    pub clear_date_of_birth: bool,

    /// Set or clear the championship flag
    #[arg(long)]
    pub champion: Option<bool>,

    /// Set or clear the health-tested flag
    #[arg(long)]
    pub health_tested: Option<bool>,

    /// New registration number
    #[arg(long, conflicts_with = "clear_registration")]
    pub registration: Option<String>,

    /// Clear the registration number
    #[arg(long)]
    pub clear_registration: bool,

    /// New owner identifier
    #[arg(long)]
    pub owner_id: Option<String>,

    /// New owner display name
    #[arg(long)]
    pub owner_name: Option<String>,

    /// Generations of ancestry to load for validation
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(1..=16), default_value = "8")]
    pub generations: u8,
}

impl EditParentArgs {
    fn update(&self) -> ParentUpdate {
        ParentUpdate {
            name: self.name.clone(),
            breed: self.breed.clone(),
            date_of_birth: if self.clear_date_of_birth {
                Some(None)
            } else {
                self.date_of_birth.map(Some)
            },
            champion: self.champion,
            health_tested: self.health_tested,
            registration_number: if self.clear_registration {
                Some(None)
            } else {
                self.registration.clone().map(Some)
            },
            owner_id: self.owner_id.clone().map(Some),
            owner_name: self.owner_name.clone().map(Some),
        }
    }
}

// ============================================================================
// Value Enums
// ============================================================================

/// Parent slot selector for CLI arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ParentTypeArg {
    /// Male parent
    Sire,
    /// Female parent
    Dam,
}

impl From<ParentTypeArg> for ParentType {
    fn from(arg: ParentTypeArg) -> Self {
        match arg {
            ParentTypeArg::Sire => ParentType::Sire,
            ParentTypeArg::Dam => ParentType::Dam,
        }
    }
}

/// Chart theme selector for CLI arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ThemeArg {
    /// Default light palette
    Classic,
    /// High-contrast dark palette
    Dark,
}

impl From<ThemeArg> for ChartTheme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Classic => ChartTheme::Classic,
            ThemeArg::Dark => ChartTheme::Dark,
        }
    }
}

/// Parse a YYYY-MM-DD date argument.
fn parse_date(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("expected YYYY-MM-DD: {e}"))
}

// ============================================================================
// Execution
// ============================================================================

impl Cli {
    /// Parse CLI arguments from the process environment
    pub fn parse_args() -> Self {
        <Self as Parser>::parse()
    }

    /// Parse CLI arguments from an iterator (for testing)
    pub fn try_parse_from<I, T>(iter: I) -> std::result::Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(iter)
    }

    /// Execute the CLI command
    pub async fn execute(&self) -> Result<()> {
        let mode = if self.json {
            OutputMode::Json
        } else {
            OutputMode::Text
        };

        let (registry, load_warnings) =
            InMemoryRegistry::load_from_jsonl(&self.file, DEFAULT_ID_PREFIX)
                .await
                .with_context(|| format!("failed to load registry from {}", self.file.display()))?;
        for w in &load_warnings {
            warn!("{w}");
        }

        match &self.command {
            Commands::Coi(args) => {
                let mut session = open_session(
                    &registry,
                    &args.dog,
                    usize::from(args.generations),
                    DisplayOptions::default(),
                )
                .await?;
                let snapshot = session.snapshot();
                output::print_coi(&snapshot, mode)?;
            }
            Commands::Tree(args) => {
                let mut session = open_session(
                    &registry,
                    &args.dog,
                    usize::from(args.generations),
                    args.display_options(),
                )
                .await?;
                let snapshot = session.snapshot();
                output::print_pedigree_tree(&snapshot, mode)?;
            }
            Commands::Chart(args) => {
                let mut session = open_session(
                    &registry,
                    &args.dog,
                    usize::from(args.generations),
                    args.display_options(),
                )
                .await?;
                let snapshot = session.snapshot();
                output::print_chart(&snapshot, mode)?;
            }
            Commands::AddParent(args) => {
                let parent_type: ParentType = args.parent_type.into();
                let mut session = open_session(
                    &registry,
                    &args.dog,
                    usize::from(args.generations),
                    DisplayOptions::default(),
                )
                .await?;

                let new_parent = NewParent {
                    id: args.id.clone().map(DogId::new),
                    name: args.name.clone().unwrap_or_default(),
                    sex: parent_type.expected_sex(),
                    breed: args.breed.clone(),
                    date_of_birth: args.date_of_birth,
                    champion: args.champion,
                    health_tested: args.health_tested,
                    registration_number: args.registration.clone(),
                    owner_id: args.owner_id.clone(),
                    owner_name: args.owner_name.clone(),
                };
                let receipt = session
                    .add_parent(&DogId::new(args.dog.clone()), parent_type, new_parent)
                    .await?;

                registry
                    .save_to_jsonl(&self.file)
                    .await
                    .with_context(|| {
                        format!("failed to save registry to {}", self.file.display())
                    })?;

                if self.json {
                    output::print_json(&serde_json::json!({
                        "dog": receipt.dog.as_str(),
                        "parent_type": parent_type,
                        "parent": receipt.parent.as_str(),
                        "created": receipt.created.as_ref().map(DogId::as_str),
                    }))?;
                } else {
                    let verb = if receipt.created.is_some() {
                        "Created"
                    } else {
                        "Linked"
                    };
                    output::print_message(&format!(
                        "{verb} {} as {parent_type} of {}",
                        receipt.parent, receipt.dog
                    ))?;
                }
            }
            Commands::EditParent(args) => {
                let parent_type: ParentType = args.parent_type.into();
                let mut session = open_session(
                    &registry,
                    &args.dog,
                    usize::from(args.generations),
                    DisplayOptions::default(),
                )
                .await?;

                let receipt = session
                    .edit_parent(&DogId::new(args.dog.clone()), parent_type, args.update())
                    .await?;

                if receipt.changed {
                    registry
                        .save_to_jsonl(&self.file)
                        .await
                        .with_context(|| {
                            format!("failed to save registry to {}", self.file.display())
                        })?;
                }

                if self.json {
                    output::print_json(&serde_json::json!({
                        "dog": receipt.dog.as_str(),
                        "parent_type": parent_type,
                        "parent": receipt.parent.as_str(),
                        "changed": receipt.changed,
                    }))?;
                } else if receipt.changed {
                    output::print_message(&format!(
                        "Updated {parent_type} {} of {}",
                        receipt.parent, receipt.dog
                    ))?;
                } else {
                    output::print_message(&format!(
                        "No changes for {parent_type} {} of {}",
                        receipt.parent, receipt.dog
                    ))?;
                }
            }
        }
        Ok(())
    }
}

/// Open a chart session over the registry, with all registry IDs known to
/// the coordinator's ID generator.
async fn open_session(
    registry: &InMemoryRegistry,
    dog: &str,
    max_generations: usize,
    display: DisplayOptions,
) -> Result<ChartSession> {
    let mut ids = IdGenerator::new(registry.id_prefix().await);
    for id in registry.dog_ids().await {
        ids.register_id(&id);
    }
    let session = ChartSession::open(
        registry,
        Arc::new(registry.clone()),
        ids,
        &DogId::new(dog),
        max_generations,
        display,
    )
    .await
    .with_context(|| format!("failed to open pedigree chart for {dog}"))?;
    Ok(session)
}
