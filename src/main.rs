use bookstore_approvals::application::orchestrator::ApprovalOrchestrator;
use bookstore_approvals::domain::payment::PaymentId;
use bookstore_approvals::domain::ports::{CartStoreBox, WorkflowStoreBox};
use bookstore_approvals::domain::workflow::ApprovalWorkflow;
use bookstore_approvals::error::Result as ApprovalResult;
use bookstore_approvals::infrastructure::http::{HttpBookstoreApi, HttpConfig};
use bookstore_approvals::infrastructure::in_memory::{
    InMemoryInvoiceGenerator, InMemoryNotificationDispatcher, InMemoryPaymentStore,
    InMemoryWorkflowStore,
};
use bookstore_approvals::interfaces::csv::decision_reader::{DecisionAction, DecisionReader};
use bookstore_approvals::interfaces::csv::report_writer::{ReportRow, ReportWriter};
use bookstore_approvals::interfaces::fixture::seed_from_reader;
use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the bookstore API. Uses the HTTP adapters.
    #[arg(long, env = "BOOKSTORE_API_URL", conflicts_with = "fixture", required_unless_present = "fixture")]
    api_url: Option<String>,

    /// JSON fixture of payments and carts. Uses in-memory adapters.
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Path to persistent workflow database (optional). If provided, uses RocksDB.
    #[arg(long, env = "BOOKSTORE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Timeout for each remote call, in milliseconds.
    #[arg(long, env = "BOOKSTORE_STEP_TIMEOUT_MS", default_value_t = 10_000)]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Confirm a payment, create its invoice and email it (resumes failed workflows)
    Approve {
        payment: u64,
        /// Note stored on the payment when it is confirmed
        #[arg(long)]
        note: Option<String>,
    },
    /// Reject a pending payment
    Reject {
        payment: u64,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Show the workflow state and order lines of a payment
    Status { payment: u64 },
    /// Process a CSV of `action, payment, reason` decisions in order
    Batch { input: PathBuf },
}

/// Where workflow progress is kept between steps.
struct Workflows {
    store: WorkflowStoreBox,
    /// False when progress only lives as long as this process.
    persistent: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("BOOKSTORE_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_ansi(io::stderr().is_terminal()),
        )
        .init();
}

fn workflow_store(db_path: Option<&Path>) -> Result<Workflows> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(path) = db_path {
        use bookstore_approvals::infrastructure::rocksdb::RocksDBWorkflowStore;
        let store = RocksDBWorkflowStore::open(path).into_diagnostic()?;
        return Ok(Workflows {
            store: Box::new(store),
            persistent: true,
        });
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        warn!(
            "Persistent workflow storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory storage."
        );
    }

    Ok(Workflows {
        store: Box::new(InMemoryWorkflowStore::new()),
        persistent: false,
    })
}

/// Builds the report line for one call. The resume column stays empty when the
/// workflow it points at will not outlive this process.
async fn report_row(
    orchestrator: &ApprovalOrchestrator,
    persistent: bool,
    payment: PaymentId,
    action: &str,
    result: &ApprovalResult<ApprovalWorkflow>,
) -> ReportRow {
    match result {
        Ok(workflow) => ReportRow::from_workflow(action, workflow),
        Err(e) => {
            error!(payment_id = %payment, action, "{}", e);
            let workflow = orchestrator.workflow(payment).await.ok().flatten();
            let mut row = ReportRow::from_error(payment, action, workflow.as_ref(), e);
            if !persistent && !row.resume.is_empty() {
                warn!(
                    payment_id = %payment,
                    resume = %row.resume,
                    "workflow progress is not persisted, so it cannot be resumed by a later run"
                );
                row.resume.clear();
            }
            row
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let step_timeout = Duration::from_millis(cli.timeout_ms);
    let Workflows {
        store: workflows,
        persistent,
    } = workflow_store(cli.db_path.as_deref())?;

    let (orchestrator, carts): (ApprovalOrchestrator, CartStoreBox) = if let Some(url) = cli.api_url
    {
        if !persistent {
            warn!("Workflow progress is kept in memory; pass --db-path to resume failed approvals in a later run.");
        }
        let api = HttpBookstoreApi::new(HttpConfig::new(url).with_timeout(step_timeout))
            .into_diagnostic()?;
        let orchestrator = ApprovalOrchestrator::new(
            Box::new(api.clone()),
            Box::new(api.clone()),
            Box::new(api.clone()),
            workflows,
            step_timeout,
        );
        let carts: CartStoreBox = Box::new(api);
        (orchestrator, carts)
    } else if let Some(path) = cli.fixture {
        let store = InMemoryPaymentStore::new();
        let file = File::open(path).into_diagnostic()?;
        let seeded = seed_from_reader(file, &store).await.into_diagnostic()?;
        info!(payments = seeded, "seeded in-memory payment store");

        let orchestrator = ApprovalOrchestrator::new(
            Box::new(store.clone()),
            Box::new(InMemoryInvoiceGenerator::new(store.clone())),
            Box::new(InMemoryNotificationDispatcher::new()),
            workflows,
            step_timeout,
        );
        let carts: CartStoreBox = Box::new(store);
        (orchestrator, carts)
    } else {
        miette::bail!("either --api-url or --fixture is required");
    };

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());

    match cli.command {
        Command::Approve { payment, note } => {
            let payment = PaymentId(payment);
            let result = orchestrator.approve_with_note(payment, note.as_deref()).await;
            let row = report_row(&orchestrator, persistent, payment, "approve", &result).await;
            writer.write_row(&row).into_diagnostic()?;
            writer.flush().into_diagnostic()?;
            result.into_diagnostic()?;
        }
        Command::Reject { payment, reason } => {
            let payment = PaymentId(payment);
            let result = orchestrator.reject(payment, &reason).await;
            let row = report_row(&orchestrator, persistent, payment, "reject", &result).await;
            writer.write_row(&row).into_diagnostic()?;
            writer.flush().into_diagnostic()?;
            result.into_diagnostic()?;
        }
        Command::Status { payment } => {
            let payment = PaymentId(payment);
            match carts.items_for_payment(payment).await {
                Ok(items) => {
                    for item in items {
                        info!(
                            book_id = item.book_id,
                            title = %item.title,
                            quantity = item.quantity,
                            subtotal = %item.subtotal(),
                            "order line"
                        );
                    }
                }
                Err(e) => warn!(payment_id = %payment, "could not load cart: {}", e),
            }
            let workflow = orchestrator
                .workflow(payment)
                .await
                .into_diagnostic()?
                .unwrap_or_else(|| ApprovalWorkflow::new(payment));
            writer
                .write_row(&ReportRow::from_workflow("status", &workflow))
                .into_diagnostic()?;
        }
        Command::Batch { input } => {
            let file = File::open(input).into_diagnostic()?;
            for decision in DecisionReader::new(file).decisions() {
                let decision = match decision {
                    Ok(decision) => decision,
                    Err(e) => {
                        error!("Error reading decision: {}", e);
                        continue;
                    }
                };
                let action = decision.action.to_string();
                let result = match decision.action {
                    DecisionAction::Approve => {
                        orchestrator
                            .approve_with_note(decision.payment, decision.reason.as_deref())
                            .await
                    }
                    DecisionAction::Reject => {
                        let reason = decision.reason.unwrap_or_default();
                        orchestrator.reject(decision.payment, &reason).await
                    }
                };
                let row =
                    report_row(&orchestrator, persistent, decision.payment, &action, &result).await;
                writer.write_row(&row).into_diagnostic()?;
            }
        }
    }

    writer.flush().into_diagnostic()?;
    Ok(())
}
