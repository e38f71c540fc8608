//! `tradeflow` command line
//!
//! Parses arguments into a [`Command`] and routes it to the matching
//! handler. Every route yields a [`CommandEnvelope`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use tradeflow_domain::{
    Currency, DeleteMode, EntityKind, NewApprovalRequest, PaymentMethod, Period, QuotationFilter,
    QuotationPayload, QuotationStatus, RecordStatus, ReferenceFilter, ReferenceKind, ReferenceRecord,
    Result, StageName, ThresholdSource, TradeflowError, WorkflowFilter, WorkflowStatus, YearMonth,
};

use crate::commands::approval::DecideApproval;
use crate::commands::payment::RecordPayment;
use crate::commands::rates::ConvertRequest;
use crate::commands::{
    approval, database, effects, events, payment, quotation, rates, reference, reports, workflow,
};
use crate::context::{AppContext, SYSTEM_ACTOR};
use crate::envelope::CommandEnvelope;

#[derive(Debug, Parser)]
#[command(name = "tradeflow")]
#[command(about = "Quotation, approval and order workflow engine")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML or JSON)
    #[arg(long, global = true, env = "TRADEFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Actor recorded on every change
    #[arg(long, global = true, env = "TRADEFLOW_ACTOR", default_value = SYSTEM_ACTOR)]
    pub actor: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create or migrate the database schema
    InitDb,
    /// Probe the database and the effect backlog
    Health,
    /// Load exchange rates from a JSON file
    ImportRates { file: PathBuf },
    /// Convert an amount between currencies on a date
    Convert {
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        from: Currency,
        #[arg(long)]
        to: Currency,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Master data
    #[command(subcommand)]
    Reference(ReferenceCommand),
    #[command(subcommand)]
    Quotation(QuotationCommand),
    #[command(subcommand)]
    Approval(ApprovalCommand),
    #[command(subcommand)]
    Workflow(WorkflowCommand),
    #[command(subcommand)]
    Payment(PaymentCommand),
    /// Side effects of approvals and stage transitions
    #[command(subcommand)]
    Effects(EffectsCommand),
    /// Event log
    Events(EventsArgs),
    /// Read-only reports
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Debug, Subcommand)]
pub enum ReferenceCommand {
    /// Create or replace a record from a JSON file
    Put {
        #[arg(long)]
        file: PathBuf,
    },
    Get { kind: ReferenceKind, id: String },
    List {
        kind: ReferenceKind,
        #[arg(long)]
        status: Option<RecordStatus>,
        #[arg(long)]
        text: Option<String>,
    },
    Delete {
        kind: ReferenceKind,
        id: String,
        /// Remove the row instead of marking it inactive
        #[arg(long)]
        hard: bool,
    },
    SetPassword {
        employee: String,
        #[arg(long, env = "TRADEFLOW_PASSWORD")]
        password: String,
    },
    Login {
        employee: String,
        #[arg(long, env = "TRADEFLOW_PASSWORD")]
        password: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum QuotationCommand {
    /// Create a quotation from a JSON payload and route it for approval
    Submit {
        #[arg(long)]
        file: PathBuf,
        /// Keep it as a draft instead of submitting
        #[arg(long)]
        draft: bool,
    },
    /// Replace a quotation with a new revision
    Supersede {
        id: String,
        #[arg(long)]
        file: PathBuf,
    },
    Approve {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
    Reject {
        id: String,
        #[arg(long)]
        reason: String,
    },
    Show { id: String },
    List {
        #[arg(long)]
        status: Option<QuotationStatus>,
        #[arg(long)]
        customer: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ApprovalCommand {
    /// Submit a request from a JSON file
    Submit {
        #[arg(long)]
        file: PathBuf,
    },
    /// Approve or reject the current step as `--actor`
    Decide {
        id: String,
        #[arg(long)]
        decision: tradeflow_domain::Decision,
        #[arg(long)]
        note: Option<String>,
    },
    Cancel {
        id: String,
        #[arg(long)]
        reason: String,
    },
    Show { id: String },
}

#[derive(Debug, Subcommand)]
pub enum WorkflowCommand {
    Advance {
        id: String,
        #[arg(long)]
        note: Option<String>,
    },
    Skip {
        id: String,
        #[arg(long)]
        reason: String,
    },
    Rewind {
        id: String,
        #[arg(long)]
        reason: String,
    },
    Cancel {
        id: String,
        #[arg(long)]
        reason: String,
    },
    /// Start a workflow for a quotation that bypasses approval
    Start {
        quotation: String,
        #[arg(long)]
        reason: String,
    },
    /// Show a workflow by id, or the one owning `--quotation`
    Show {
        #[arg(required_unless_present = "quotation")]
        id: Option<String>,
        #[arg(long, conflicts_with = "id")]
        quotation: Option<String>,
    },
    List {
        #[arg(long)]
        status: Option<WorkflowStatus>,
        #[arg(long)]
        stage: Option<StageName>,
    },
}

#[derive(Debug, Subcommand)]
pub enum PaymentCommand {
    Record {
        #[arg(long)]
        invoice: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, default_value = "USD")]
        currency: Currency,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long, default_value = "bank")]
        method: PaymentMethod,
        /// Caller key that makes a retried payment a no-op
        #[arg(long)]
        reference: Option<String>,
    },
    /// Mark unpaid invoices past due as overdue
    SweepOverdue {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    Invoice { id: String },
}

#[derive(Debug, Subcommand)]
pub enum EffectsCommand {
    /// Re-run failed and pending effects of a source
    Retry { source: String },
    /// Effects of one source, or all unfinished ones
    List {
        #[arg(long)]
        source: Option<String>,
    },
}

#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Entity kind, used with `--id`
    #[arg(long, requires = "id")]
    pub entity: Option<EntityKind>,
    #[arg(long, requires = "entity")]
    pub id: Option<String>,
    #[arg(long, default_value_t = 50)]
    pub limit: usize,
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Income, expense and net over a period (2025-03, 2025-Q1, 2025, a..b)
    CashSummary { period: Period },
    MonthlyCash { year: i32 },
    Sales { year_month: YearMonth },
    TargetVsActual { year_month: YearMonth },
    Overdue {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Requests waiting on an approver
    Pending { approver: String },
    Stale {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// In-progress workflows per current stage
    Stages,
    Stats { period: Period },
    LowStock {
        /// Fixed threshold instead of each product's reorder level
        #[arg(long)]
        qty: Option<Decimal>,
    },
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => TradeflowError::NotFound(format!("file {}", path.display())),
        _ => TradeflowError::validation(format!("cannot read {}: {err}", path.display())),
    })?;
    serde_json::from_str(&raw)
        .map_err(|err| TradeflowError::validation(format!("{}: {err}", path.display())))
}

/// Envelope for a command whose input could not be read.
async fn with_input<T, F, Fut>(path: &Path, run: F) -> CommandEnvelope
where
    T: DeserializeOwned,
    F: FnOnce(T) -> Fut,
    Fut: std::future::Future<Output = CommandEnvelope>,
{
    match read_json(path).await {
        Ok(input) => run(input).await,
        Err(err) => CommandEnvelope::failure(&err),
    }
}

/// Route a parsed command to its handler.
pub async fn dispatch(ctx: &AppContext, command: Command, actor: &str) -> CommandEnvelope {
    let today = ctx.engine.today();
    match command {
        Command::InitDb => database::init_db(ctx).await,
        Command::Health => database::health(ctx).await,
        Command::ImportRates { file } => rates::import_rates(ctx, &file, actor).await,
        Command::Convert { amount, from, to, date } => {
            rates::convert(ctx, ConvertRequest { amount, from, to, date }).await
        }
        Command::Reference(cmd) => dispatch_reference(ctx, cmd, actor).await,
        Command::Quotation(cmd) => dispatch_quotation(ctx, cmd, actor).await,
        Command::Approval(cmd) => match cmd {
            ApprovalCommand::Submit { file } => {
                with_input(&file, |request: NewApprovalRequest| approval::submit_approval(ctx, request)).await
            }
            ApprovalCommand::Decide { id, decision, note } => {
                let request = DecideApproval { approval_id: id, approver: actor.to_string(), decision, note };
                approval::decide_approval(ctx, request).await
            }
            ApprovalCommand::Cancel { id, reason } => approval::cancel_approval(ctx, &id, actor, &reason).await,
            ApprovalCommand::Show { id } => approval::get_approval(ctx, &id).await,
        },
        Command::Workflow(cmd) => dispatch_workflow(ctx, cmd, actor).await,
        Command::Payment(cmd) => match cmd {
            PaymentCommand::Record { invoice, amount, currency, date, method, reference } => {
                let request = RecordPayment { invoice_id: invoice, amount, currency, date, method, reference };
                payment::record_payment(ctx, request, actor).await
            }
            PaymentCommand::SweepOverdue { as_of } => {
                payment::sweep_overdue(ctx, as_of.unwrap_or(today), actor).await
            }
            PaymentCommand::Invoice { id } => payment::get_invoice(ctx, &id).await,
        },
        Command::Effects(cmd) => match cmd {
            EffectsCommand::Retry { source } => effects::retry_effects(ctx, &source).await,
            EffectsCommand::List { source } => effects::list_effects(ctx, source.as_deref()).await,
        },
        Command::Events(args) => match (args.entity, args.id) {
            (Some(kind), Some(id)) => events::event_history(ctx, kind, &id).await,
            _ => events::recent_events(ctx, args.limit).await,
        },
        Command::Report(cmd) => dispatch_report(ctx, cmd, today).await,
    }
}

async fn dispatch_reference(ctx: &AppContext, cmd: ReferenceCommand, actor: &str) -> CommandEnvelope {
    match cmd {
        ReferenceCommand::Put { file } => {
            with_input(&file, |record: ReferenceRecord| reference::put_reference(ctx, record, actor)).await
        }
        ReferenceCommand::Get { kind, id } => reference::get_reference(ctx, kind, &id).await,
        ReferenceCommand::List { kind, status, text } => {
            reference::list_reference(ctx, kind, ReferenceFilter { status, text }).await
        }
        ReferenceCommand::Delete { kind, id, hard } => {
            let mode = if hard { DeleteMode::Hard } else { DeleteMode::Soft };
            reference::delete_reference(ctx, kind, &id, mode, actor).await
        }
        ReferenceCommand::SetPassword { employee, password } => {
            reference::set_password(ctx, &employee, &password, actor).await
        }
        ReferenceCommand::Login { employee, password } => {
            reference::authenticate(ctx, &employee, &password).await
        }
    }
}

async fn dispatch_quotation(ctx: &AppContext, cmd: QuotationCommand, actor: &str) -> CommandEnvelope {
    match cmd {
        QuotationCommand::Submit { file, draft: false } => {
            with_input(&file, |payload: QuotationPayload| quotation::submit_quotation(ctx, payload, actor)).await
        }
        QuotationCommand::Submit { file, draft: true } => {
            with_input(&file, |payload: QuotationPayload| quotation::draft_quotation(ctx, payload, actor)).await
        }
        QuotationCommand::Supersede { id, file } => {
            with_input(&file, |payload: QuotationPayload| {
                quotation::supersede_quotation(ctx, &id, payload, actor)
            })
            .await
        }
        QuotationCommand::Approve { id, note } => quotation::approve_quotation(ctx, &id, actor, note).await,
        QuotationCommand::Reject { id, reason } => quotation::reject_quotation(ctx, &id, actor, &reason).await,
        QuotationCommand::Show { id } => quotation::get_quotation(ctx, &id).await,
        QuotationCommand::List { status, customer } => {
            quotation::list_quotations(ctx, QuotationFilter { status, customer_ref: customer }).await
        }
    }
}

async fn dispatch_workflow(ctx: &AppContext, cmd: WorkflowCommand, actor: &str) -> CommandEnvelope {
    match cmd {
        WorkflowCommand::Advance { id, note } => workflow::advance_workflow(ctx, &id, actor, note).await,
        WorkflowCommand::Skip { id, reason } => workflow::skip_workflow_stage(ctx, &id, actor, &reason).await,
        WorkflowCommand::Rewind { id, reason } => workflow::rewind_workflow(ctx, &id, actor, &reason).await,
        WorkflowCommand::Cancel { id, reason } => workflow::cancel_workflow(ctx, &id, actor, &reason).await,
        WorkflowCommand::Start { quotation, reason } => {
            workflow::start_workflow_without_approval(ctx, &quotation, actor, &reason).await
        }
        WorkflowCommand::Show { id: Some(id), .. } => workflow::get_workflow(ctx, &id).await,
        WorkflowCommand::Show { quotation, .. } => {
            workflow::workflow_for_quotation(ctx, quotation.as_deref().unwrap_or_default()).await
        }
        WorkflowCommand::List { status, stage } => {
            workflow::list_workflows(ctx, WorkflowFilter { status, stage, ..WorkflowFilter::default() }).await
        }
    }
}

async fn dispatch_report(ctx: &AppContext, cmd: ReportCommand, today: NaiveDate) -> CommandEnvelope {
    match cmd {
        ReportCommand::CashSummary { period } => reports::cash_summary(ctx, period).await,
        ReportCommand::MonthlyCash { year } => reports::monthly_cash(ctx, year).await,
        ReportCommand::Sales { year_month } => reports::sales_by_month(ctx, year_month).await,
        ReportCommand::TargetVsActual { year_month } => reports::target_vs_actual(ctx, year_month).await,
        ReportCommand::Overdue { as_of } => reports::overdue_invoices(ctx, as_of.unwrap_or(today)).await,
        ReportCommand::Pending { approver } => reports::pending_approvals(ctx, &approver).await,
        ReportCommand::Stale { as_of } => reports::stale_approvals(ctx, as_of.unwrap_or(today)).await,
        ReportCommand::Stages => reports::workflows_by_stage(ctx).await,
        ReportCommand::Stats { period } => reports::completion_stats(ctx, period).await,
        ReportCommand::LowStock { qty } => {
            let source = qty.map_or(ThresholdSource::ProductReorderLevel, |qty| ThresholdSource::Fixed { qty });
            reports::low_stock(ctx, source).await
        }
    }
}
