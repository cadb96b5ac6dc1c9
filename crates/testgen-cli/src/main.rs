use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use testgen_core::requirement::{RequirementSource, RequirementStatus};
use testgen_core::session::GenerationStep;
use testgen_core::test_case::TestCaseStatus;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::state::{StateOptions, TextOrJson};

#[derive(Parser)]
#[command(name = "testgen")]
#[command(version, about = "TESTGEN - requirement-driven test case generation", long_about = None)]
struct Cli {
    /// Project directory holding the session files (default: current directory)
    #[arg(long, global = true)]
    project_dir: Option<PathBuf>,

    /// Session snapshot file
    #[arg(long, global = true, env = "TESTGEN_STATE_FILE")]
    state_file: Option<PathBuf>,

    /// Signing key file
    #[arg(long, global = true, env = "AI_TEST_GEN_SIGNATURE_KEY")]
    key_file: Option<PathBuf>,

    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the generation session state
    State {
        #[command(subcommand)]
        action: StateAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Create a new session
    New {
        /// Driving agent (claude_code, qwen_code, cursor)
        #[arg(short, long)]
        agent: Option<String>,
        /// Session id (default: current timestamp)
        #[arg(long)]
        session_id: Option<String>,
        /// Replace an existing session
        #[arg(long)]
        force: bool,
    },
    /// Show the session summary
    Show {
        #[arg(short, long, value_enum, default_value_t = TextOrJson::Text)]
        format: TextOrJson,
    },
    /// Print the context dump for a generation agent
    Context,
    /// Add a requirement
    Add {
        text: String,
        #[arg(long, default_value_t = RequirementSource::Manual)]
        source: RequirementSource,
        /// Origin reference such as a file path
        #[arg(long)]
        source_ref: Option<String>,
    },
    /// Attach an analysis to a requirement
    Analyze {
        requirement_id: String,
        #[arg(long = "input")]
        inputs: Vec<String>,
        #[arg(long = "output")]
        outputs: Vec<String>,
        #[arg(long = "rule")]
        business_rules: Vec<String>,
        #[arg(long = "state")]
        states: Vec<String>,
        #[arg(long = "technique")]
        techniques: Vec<String>,
    },
    /// Set a requirement's status
    Status {
        requirement_id: String,
        status: RequirementStatus,
        #[arg(long)]
        error: Option<String>,
    },
    /// Add a test case from a JSON file
    AddTestCase {
        requirement_id: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Set a test case's review status
    TestCaseStatus {
        requirement_id: String,
        test_case_id: String,
        status: TestCaseStatus,
        #[arg(long)]
        feedback: Option<String>,
    },
    /// Approve test cases
    Approve {
        requirement_id: String,
        #[arg(required = true)]
        test_case_ids: Vec<String>,
    },
    /// Record reviewer feedback on a requirement
    Feedback { requirement_id: String, note: String },
    /// Record generation progress
    Progress {
        #[arg(long)]
        step: Option<GenerationStep>,
        #[arg(long)]
        current: Option<String>,
        #[arg(long)]
        action: Option<String>,
    },
    /// Append a note to the session log
    Note { text: String },
    /// Show what to do next
    Resume,
    /// Delete the session state
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },
    /// Check the snapshot's integrity without loading it
    Verify,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = StateOptions {
        project_dir: cli.project_dir,
        state_file: cli.state_file,
        key_file: cli.key_file,
    };
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::State { action } => match action {
            StateAction::New {
                agent,
                session_id,
                force,
            } => commands::state::new(&options, agent, session_id, force, &mut out)?,
            StateAction::Show { format } => commands::state::show(&options, format, &mut out)?,
            StateAction::Context => commands::state::context(&options, &mut out)?,
            StateAction::Add {
                text,
                source,
                source_ref,
            } => commands::state::add(&options, &text, source, source_ref, &mut out)?,
            StateAction::Analyze {
                requirement_id,
                inputs,
                outputs,
                business_rules,
                states,
                techniques,
            } => commands::state::analyze(
                &options,
                &requirement_id,
                testgen_core::requirement::RequirementAnalysis {
                    inputs,
                    outputs,
                    business_rules,
                    states,
                    suggested_techniques: techniques,
                },
                &mut out,
            )?,
            StateAction::Status {
                requirement_id,
                status,
                error,
            } => commands::state::status(&options, &requirement_id, status, error, &mut out)?,
            StateAction::AddTestCase {
                requirement_id,
                file,
            } => commands::state::add_test_case(&options, &requirement_id, &file, &mut out)?,
            StateAction::TestCaseStatus {
                requirement_id,
                test_case_id,
                status,
                feedback,
            } => commands::state::test_case_status(
                &options,
                &requirement_id,
                &test_case_id,
                status,
                feedback,
                &mut out,
            )?,
            StateAction::Approve {
                requirement_id,
                test_case_ids,
            } => commands::state::approve(&options, &requirement_id, &test_case_ids, &mut out)?,
            StateAction::Feedback {
                requirement_id,
                note,
            } => commands::state::feedback(&options, &requirement_id, &note, &mut out)?,
            StateAction::Progress {
                step,
                current,
                action,
            } => commands::state::progress(&options, step, current, action, &mut out)?,
            StateAction::Note { text } => commands::state::note(&options, &text, &mut out)?,
            StateAction::Resume => commands::state::resume(&options, &mut out)?,
            StateAction::Clear { yes } => commands::state::clear(&options, yes, &mut out)?,
            StateAction::Verify => commands::state::verify(&options, &mut out)?,
        },
    }

    Ok(())
}
