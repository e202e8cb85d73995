//! nilefund CLI - milestone-based project financing from the command line

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use nilefund_core::config::Config;
use nilefund_core::domain::admin::MilestoneReview;
use nilefund_core::domain::industry::IndustryCategory;
use nilefund_core::domain::ledger::{FundingRequest, InvestorId, NoSettlementLookup};
use nilefund_core::domain::projects::{MilestoneId, Project, ProjectDraft};
use nilefund_core::domain::repayment::{InstallmentId, LoanAccount};
use nilefund_core::domain::scoring::CreditAssessment;
use nilefund_core::storage::{export_to_jsonl, import_from_jsonl, Database, StateStore, StoredState};
use nilefund_core::FundingEngine;

#[derive(Parser)]
#[command(name = "nilefund")]
#[command(author, version, about = "Milestone-based project financing engine")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Suppress informational logging
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and review funding projects
    Project {
        #[command(subcommand)]
        action: ProjectAction,
    },

    /// Move milestones through escrow
    Milestone {
        #[command(subcommand)]
        action: MilestoneAction,
    },

    /// Record an investor funding a milestone
    Fund {
        /// Project ID
        project: Uuid,
        /// Milestone number within the project
        milestone: u32,
        /// Investor identity
        #[arg(long)]
        investor: String,
        /// Amount to fund
        #[arg(long)]
        amount: Decimal,
        /// Settlement reference of the payment
        #[arg(long)]
        settlement_ref: String,
    },

    /// Admin review queue
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },

    /// Investor portfolio views
    Portfolio {
        #[command(subcommand)]
        action: PortfolioAction,
    },

    /// Loan repayment schedules
    Loan {
        #[command(subcommand)]
        action: LoanAction,
    },

    /// Export or import state as JSONL
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },
}

#[derive(Subcommand)]
enum ProjectAction {
    /// Submit a new project for approval
    Create {
        /// Project title
        #[arg(long)]
        title: String,
        /// Project description
        #[arg(long, default_value = "")]
        description: String,
        /// Industry category (slug or display name)
        #[arg(long, value_parser = parse_industry)]
        industry: IndustryCategory,
        /// Requested amount
        #[arg(long)]
        amount: Decimal,
        /// Milestone as NAME:PERCENT:YYYY-MM-DD (repeatable)
        #[arg(long = "milestone", value_parser = parse_milestone, required = true)]
        milestones: Vec<MilestoneArg>,
        /// Supporting document as NAME=REFERENCE (repeatable)
        #[arg(long = "document", value_parser = parse_document)]
        documents: Vec<(String, String)>,
    },
    /// Approve a pending project
    Approve { id: Uuid },
    /// Reject a pending project
    Reject { id: Uuid },
    /// Show project details
    Show { id: Uuid },
    /// List projects
    List {
        /// Only projects open to investors
        #[arg(long)]
        open: bool,
    },
    /// Show a project's funding history
    History { id: Uuid },
    /// Attach a credit assessment produced by the scoring service
    Score {
        id: Uuid,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        score: u8,
        #[arg(long, default_value = "")]
        explanation: String,
    },
}

#[derive(Subcommand)]
enum MilestoneAction {
    /// Submit a milestone for verification
    Submit {
        project: Uuid,
        milestone: u32,
        /// Reference to the proof of completion (document hash, CID, URL)
        #[arg(long)]
        proof: String,
    },
    /// Verify a submitted milestone and release its funds
    Verify {
        project: Uuid,
        milestone: u32,
        /// Reference to the release settlement
        #[arg(long)]
        release_ref: Option<String>,
    },
    /// Send a submitted milestone back to pending
    Reject { project: Uuid, milestone: u32 },
    /// List milestones awaiting verification
    ListPending,
}

#[derive(Subcommand)]
enum AdminAction {
    /// Show projects and milestones awaiting review
    Queue,
}

#[derive(Subcommand)]
enum PortfolioAction {
    /// Funded-project summaries for an investor
    Summary {
        #[arg(long)]
        investor: String,
    },
    /// Funding totals per industry
    Distribution,
    /// Rebuild the portfolio view from the ledger and check it
    Rebuild,
}

#[derive(Subcommand)]
enum LoanAction {
    /// Open a repayment schedule for a completed project
    Create {
        project: Uuid,
        /// Total amount to repay
        #[arg(long)]
        amount: Decimal,
        /// Number of monthly installments
        #[arg(long)]
        installments: u32,
        /// Start date (first installment is due one month later)
        #[arg(long)]
        start: NaiveDate,
    },
    /// Mark an installment as paid
    Pay { project: Uuid, sequence: u32 },
    /// Show a schedule with overdue status as of a date
    Show {
        project: Uuid,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Persist overdue status for installments past due
    Advance {
        project: Uuid,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[derive(Subcommand)]
enum SyncAction {
    /// Export all state to a directory
    Export { dir: PathBuf },
    /// Replace all state with a previous export
    Import { dir: PathBuf },
}

#[derive(Clone)]
struct MilestoneArg {
    name: String,
    percentage: u8,
    expected_date: NaiveDate,
}

fn parse_industry(s: &str) -> std::result::Result<IndustryCategory, String> {
    IndustryCategory::from_str(s).ok_or_else(|| {
        let known: Vec<&str> = IndustryCategory::ALL.iter().map(|c| c.as_str()).collect();
        format!("unknown industry '{}' (expected one of: {})", s, known.join(", "))
    })
}

fn parse_milestone(s: &str) -> std::result::Result<MilestoneArg, String> {
    let mut parts = s.rsplitn(3, ':');
    let (Some(date), Some(percentage), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(format!("expected NAME:PERCENT:YYYY-MM-DD, got '{}'", s));
    };
    let percentage = percentage
        .trim()
        .parse::<u8>()
        .map_err(|e| format!("invalid percentage '{}': {}", percentage, e))?;
    let expected_date = date
        .trim()
        .parse::<NaiveDate>()
        .map_err(|e| format!("invalid date '{}': {}", date, e))?;
    Ok(MilestoneArg {
        name: name.to_string(),
        percentage,
        expected_date,
    })
}

fn parse_document(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(name, reference)| (name.to_string(), reference.to_string()))
        .ok_or_else(|| format!("expected NAME=REFERENCE, got '{}'", s))
}

/// Loaded engine plus the store it writes back to
///
/// `base` is the state as loaded; saving writes only what the command
/// changed and fails if another process changed the same rows first.
struct Session {
    config: Config,
    engine: FundingEngine,
    store: StateStore,
    base: StoredState,
}

impl Session {
    async fn open(config: Config) -> Result<Self> {
        let path = config.database_path()?;
        tracing::debug!(path = %path.display(), "Opening database");
        let db = Database::open(&path)
            .await
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        let store = StateStore::new(db);
        let engine = FundingEngine::from_config(&config);
        let base = store.load_state().await?;
        engine.restore(base.snapshot.clone()).await?;
        engine.reseed_transactions(base.highest_transaction_id);
        Ok(Self {
            config,
            engine,
            store,
            base,
        })
    }

    async fn save(&self) -> Result<()> {
        let written = self
            .store
            .save_changes(&self.base, &self.engine.snapshot().await?)
            .await?;
        tracing::debug!(written, "Session saved");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.quiet { "nilefund=warn" } else { "nilefund=info" };
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match directive.parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            match error.downcast_ref::<nilefund_core::Error>() {
                Some(domain) => eprintln!("error[{}]: {}", domain.code(), domain),
                None => eprintln!("error: {:#}", error),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let session = Session::open(Config::load()?).await?;
    let format = cli.format;

    match cli.command {
        Commands::Project { action } => cmd_project(&session, format, action).await,
        Commands::Milestone { action } => cmd_milestone(&session, format, action).await,
        Commands::Fund {
            project,
            milestone,
            investor,
            amount,
            settlement_ref,
        } => {
            let request = FundingRequest::new(
                project,
                MilestoneId(milestone),
                InvestorId::new(investor)?,
                amount,
                settlement_ref,
            );
            cmd_fund(&session, format, request).await
        }
        Commands::Admin { action } => cmd_admin(&session, format, action).await,
        Commands::Portfolio { action } => cmd_portfolio(&session, format, action).await,
        Commands::Loan { action } => cmd_loan(&session, format, action).await,
        Commands::Sync { action } => cmd_sync(&session, format, action).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_project(project: &Project) {
    println!("{} ({})", project.title, project.id);
    println!("  Status:    {}", project.status);
    println!("  Industry:  {}", project.industry);
    println!(
        "  Funded:    {} / {} ({}%)",
        project.funded_amount,
        project.requested_amount,
        project.percent_complete()
    );
    if !project.description.is_empty() {
        println!("  About:     {}", project.description);
    }
    if let Some(assessment) = &project.credit_assessment {
        println!("  Credit:    {} - {}", assessment.score, assessment.explanation);
    }
    println!("  Milestones:");
    for milestone in &project.milestones {
        println!(
            "    {}. {} ({}%, due {}) [{}] target {}",
            milestone.id,
            milestone.name,
            milestone.percentage,
            milestone.expected_date,
            milestone.status,
            milestone.target_amount(project.requested_amount)
        );
        if let Some(proof) = &milestone.proof_reference {
            println!("       proof {}", proof);
        }
        if let Some(release) = &milestone.release_reference {
            println!("       released via {}", release);
        }
    }
    for document in &project.documents {
        println!("  Document:  {} -> {}", document.name, document.reference);
    }
}

fn print_review_line(review: &MilestoneReview) {
    println!(
        "  {}  {} / {}. {}  proof: {}",
        review.project_id,
        review.project_title,
        review.milestone.id,
        review.milestone.name,
        review.proof_reference.as_deref().unwrap_or("-")
    );
}

fn print_project_line(project: &Project) {
    println!(
        "  {}  {:<16} {:<28} {} / {}",
        project.id,
        project.status.as_str(),
        project.title,
        project.funded_amount,
        project.requested_amount
    );
}

async fn cmd_project(session: &Session, format: OutputFormat, action: ProjectAction) -> Result<()> {
    let engine = &session.engine;
    match action {
        ProjectAction::Create {
            title,
            description,
            industry,
            amount,
            milestones,
            documents,
        } => {
            let mut draft = ProjectDraft::new(title, description, industry, amount);
            for milestone in milestones {
                draft = draft.milestone(milestone.name, milestone.percentage, milestone.expected_date);
            }
            for (name, reference) in documents {
                draft = draft.document(name, reference);
            }
            let project = engine.create_project(draft).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Text => {
                    println!("Created project {} (pending approval)", project.id);
                    print_project(&project);
                }
            }
        }
        ProjectAction::Approve { id } => {
            let project = engine.approve_project(id).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Text => println!("Approved project '{}', now open for funding", project.title),
            }
        }
        ProjectAction::Reject { id } => {
            let project = engine.reject_project(id).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Text => println!("Rejected project '{}'", project.title),
            }
        }
        ProjectAction::Show { id } => {
            let project = engine.get_project(id).await?;
            match format {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Text => print_project(&project),
            }
        }
        ProjectAction::List { open } => {
            let projects = if open {
                engine.list_open_projects().await?
            } else {
                engine.list_projects().await?
            };
            match format {
                OutputFormat::Json => print_json(&projects)?,
                OutputFormat::Text => {
                    if projects.is_empty() {
                        println!("No projects found.");
                    } else {
                        println!("Projects:");
                        for project in &projects {
                            print_project_line(project);
                        }
                    }
                }
            }
        }
        ProjectAction::History { id } => {
            let history = engine.transaction_history(id, &NoSettlementLookup).await?;
            match format {
                OutputFormat::Json => print_json(&history)?,
                OutputFormat::Text => {
                    if history.is_empty() {
                        println!("No funding recorded.");
                    }
                    for view in &history {
                        let tx = &view.transaction;
                        println!(
                            "  {}  {}  {:<12} {:>12}  milestone {} ({})  ref {}",
                            tx.id,
                            view.display_timestamp.format("%Y-%m-%d %H:%M"),
                            tx.investor,
                            view.display_amount,
                            tx.milestone_id,
                            tx.milestone_name,
                            tx.settlement_ref
                        );
                    }
                }
            }
        }
        ProjectAction::Score { id, score, explanation } => {
            let project = engine
                .attach_credit_assessment(id, CreditAssessment::new(score, explanation))
                .await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&project)?,
                OutputFormat::Text => println!("Credit score {} attached to '{}'", score, project.title),
            }
        }
    }
    Ok(())
}

async fn cmd_milestone(session: &Session, format: OutputFormat, action: MilestoneAction) -> Result<()> {
    let engine = &session.engine;
    let (milestone, verb) = match action {
        MilestoneAction::Submit { project, milestone, proof } => (
            engine.submit_milestone(project, MilestoneId(milestone), &proof).await?,
            "submitted for verification",
        ),
        MilestoneAction::Verify { project, milestone, release_ref } => (
            engine
                .verify_milestone(project, MilestoneId(milestone), release_ref.as_deref())
                .await?,
            "verified and released",
        ),
        MilestoneAction::Reject { project, milestone } => (
            engine.reject_milestone(project, MilestoneId(milestone)).await?,
            "sent back to pending",
        ),
        MilestoneAction::ListPending => {
            let reviews = engine.admin().list_milestones_awaiting_verification().await?;
            match format {
                OutputFormat::Json => print_json(&reviews)?,
                OutputFormat::Text => {
                    if reviews.is_empty() {
                        println!("No milestones awaiting verification.");
                    }
                    for review in &reviews {
                        print_review_line(review);
                    }
                }
            }
            return Ok(());
        }
    };
    session.save().await?;
    match format {
        OutputFormat::Json => print_json(&milestone)?,
        OutputFormat::Text => println!("Milestone {}. {} {}", milestone.id, milestone.name, verb),
    }
    Ok(())
}

async fn cmd_fund(session: &Session, format: OutputFormat, request: FundingRequest) -> Result<()> {
    let receipt = session.engine.record_funding(request).await?;
    session.save().await?;

    let project = &receipt.project;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "transaction": receipt.transaction,
            "funded_amount": project.funded_amount,
            "requested_amount": project.requested_amount,
            "status": project.status,
            "completed_now": receipt.completed_now,
        }))?,
        OutputFormat::Text => {
            println!(
                "Recorded {} of {} to '{}'",
                receipt.transaction.id, receipt.transaction.amount, project.title
            );
            println!(
                "  Funded: {} / {} ({}%)",
                project.funded_amount,
                project.requested_amount,
                project.percent_complete()
            );
            if receipt.completed_now {
                println!("  Project fully funded.");
            }
        }
    }
    Ok(())
}

async fn cmd_admin(session: &Session, format: OutputFormat, action: AdminAction) -> Result<()> {
    match action {
        AdminAction::Queue => {
            let admin = session.engine.admin();
            let projects = admin.list_pending_projects().await?;
            let milestones = admin.list_milestones_awaiting_verification().await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "pending_projects": projects,
                    "milestones_awaiting_verification": milestones,
                }))?,
                OutputFormat::Text => {
                    println!("Projects pending approval: {}", projects.len());
                    for project in &projects {
                        print_project_line(project);
                    }
                    println!("Milestones awaiting verification: {}", milestones.len());
                    for review in &milestones {
                        print_review_line(review);
                    }
                }
            }
        }
    }
    Ok(())
}

async fn cmd_portfolio(session: &Session, format: OutputFormat, action: PortfolioAction) -> Result<()> {
    let engine = &session.engine;
    match action {
        PortfolioAction::Summary { investor } => {
            let investor = InvestorId::new(investor)?;
            let summaries = engine.investor_summaries(&investor).await;
            match format {
                OutputFormat::Json => print_json(&summaries)?,
                OutputFormat::Text => {
                    if summaries.is_empty() {
                        println!("No funded projects for {}.", investor);
                    }
                    for summary in &summaries {
                        println!(
                            "  {:<28} invested {:>12}  {}% complete  [{}]  last {}",
                            summary.project_title,
                            summary.total_invested,
                            summary.percent_complete,
                            summary.status,
                            summary.last_payment.format("%Y-%m-%d")
                        );
                    }
                }
            }
        }
        PortfolioAction::Distribution => {
            let distribution = engine.industry_distribution().await;
            match format {
                OutputFormat::Json => print_json(&distribution)?,
                OutputFormat::Text => {
                    let total: Decimal = distribution.iter().map(|entry| entry.total).sum();
                    for entry in &distribution {
                        println!("  {:<26} {:>14}", entry.industry.display_name(), entry.total);
                    }
                    println!("  {:<26} {:>14}", "Total", total);
                }
            }
        }
        PortfolioAction::Rebuild => {
            engine.rebuild_portfolio().await?;
            let report = engine.verify_consistency().await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "projects": report.projects,
                    "transactions": report.transactions,
                    "total_funded": report.total_funded,
                }))?,
                OutputFormat::Text => println!(
                    "Portfolio rebuilt: {} transactions across {} projects, {} funded",
                    report.transactions, report.projects, report.total_funded
                ),
            }
        }
    }
    Ok(())
}

fn print_loan(loan: &LoanAccount, as_of: NaiveDate) {
    let summary = loan.summary(as_of);
    println!("Loan for project {} (as of {})", loan.project_id, as_of);
    println!(
        "  Principal {}  paid {}  outstanding {}  overdue {}",
        summary.principal, summary.paid, summary.outstanding, summary.overdue_count
    );
    for installment in &loan.installments {
        println!(
            "  #{:<3} due {}  {:>12}  {}",
            installment.sequence,
            installment.due_date,
            installment.amount,
            installment.status.as_str()
        );
    }
}

async fn cmd_loan(session: &Session, format: OutputFormat, action: LoanAction) -> Result<()> {
    let engine = &session.engine;
    let today = Utc::now().date_naive();
    match action {
        LoanAction::Create {
            project,
            amount,
            installments,
            start,
        } => {
            let loan = engine.create_schedule(project, amount, installments, start).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&loan)?,
                OutputFormat::Text => print_loan(&loan, today),
            }
        }
        LoanAction::Pay { project, sequence } => {
            let installment = engine.record_payment(InstallmentId::new(project, sequence)).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&installment)?,
                OutputFormat::Text => println!("Installment #{} of {} paid", installment.sequence, installment.amount),
            }
        }
        LoanAction::Show { project, as_of } => {
            let as_of = as_of.unwrap_or(today);
            let loan = engine.schedule(project, as_of).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "loan": loan,
                    "summary": loan.summary(as_of),
                }))?,
                OutputFormat::Text => print_loan(&loan, as_of),
            }
        }
        LoanAction::Advance { project, as_of } => {
            let as_of = as_of.unwrap_or(today);
            let loan = engine.advance_overdue(project, as_of).await?;
            session.save().await?;
            match format {
                OutputFormat::Json => print_json(&loan)?,
                OutputFormat::Text => print_loan(&loan, as_of),
            }
        }
    }
    Ok(())
}

async fn cmd_sync(session: &Session, format: OutputFormat, action: SyncAction) -> Result<()> {
    match action {
        SyncAction::Export { dir } => {
            let snapshot = session.engine.snapshot().await?;
            let result = export_to_jsonl(&snapshot, &dir)?;
            match format {
                OutputFormat::Json => print_json(&result.metadata)?,
                OutputFormat::Text => {
                    println!(
                        "Exported {} records to {}",
                        result.metadata.total_records,
                        result.sync_dir.display()
                    );
                    for file in &result.files_written {
                        println!("  {}", file.display());
                    }
                }
            }
        }
        SyncAction::Import { dir } => {
            let imported = import_from_jsonl(&dir)?;
            // validate against a fresh engine before touching the database
            let engine = FundingEngine::from_config(&session.config);
            engine.restore(imported.snapshot.clone()).await?;
            session.store.replace_snapshot(&imported.snapshot).await?;
            match format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "total_records": imported.total_records,
                    "projects": imported.snapshot.projects.len(),
                    "loans": imported.snapshot.loans.len(),
                }))?,
                OutputFormat::Text => println!(
                    "Imported {} records from {}",
                    imported.total_records,
                    dir.display()
                ),
            }
        }
    }
    Ok(())
}
