pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use payflow_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use payflow_core::views::approver::DecisionFilter;

#[derive(Debug, Parser)]
#[command(
    name = "payflow",
    about = "Procure-to-pay workflow CLI",
    long_about = "Submit purchase requests, work the approval queue, and reconcile approved \
                  spending against receipts and purchase orders.",
    after_help = "Examples:\n  payflow login amina --password ...\n  payflow staff list\n  payflow approver approve 12 --comments \"ok\"\n  payflow finance po 12"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a payflow.toml config file")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Sign in and persist the session")]
    Login {
        username: String,
        #[arg(long)]
        password: String,
    },
    #[command(about = "Create a staff account and sign in")]
    Register {
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        confirm_password: String,
    },
    #[command(about = "Remove the persisted session")]
    Logout,
    #[command(about = "Show the signed-in identity and its landing route")]
    Whoami,
    #[command(about = "Staff workspace: own requests and their documents")]
    Staff {
        #[command(subcommand)]
        command: StaffCommand,
    },
    #[command(about = "Approver workspace: pending queue and decision history")]
    Approver {
        #[command(subcommand)]
        command: ApproverCommand,
    },
    #[command(about = "Finance workspace: reconciliation queues and purchase orders")]
    Finance {
        #[command(subcommand)]
        command: FinanceCommand,
    },
}

#[derive(Debug, Subcommand)]
enum StaffCommand {
    #[command(about = "List own requests partitioned by status")]
    List,
    #[command(about = "Show one request with its approval timeline and capabilities")]
    Show { id: i64 },
    #[command(about = "Create a purchase request")]
    Create {
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        supplier: Option<String>,
    },
    #[command(about = "Edit an own pending or rejected request")]
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        supplier: Option<String>,
    },
    #[command(about = "Append a comment to an own request")]
    Comment { id: i64, text: String },
    #[command(about = "Upload a proforma into its empty slot (pending requests only)")]
    UploadProforma { id: i64, file: PathBuf },
    #[command(about = "Upload a receipt into its empty slot (pending requests only)")]
    UploadReceipt { id: i64, file: PathBuf },
    #[command(about = "Upload a batch of attachments")]
    Attach {
        id: i64,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

#[derive(Debug, Subcommand)]
enum ApproverCommand {
    #[command(about = "Requests pending at this approver's level")]
    Queue,
    #[command(about = "Own decision history, filterable by outcome")]
    History {
        #[arg(long, default_value = "all")]
        filter: DecisionFilter,
    },
    #[command(about = "Approve a request from the pending queue")]
    Approve {
        id: i64,
        #[arg(long)]
        comments: Option<String>,
    },
    #[command(about = "Reject a request from the pending queue")]
    Reject {
        id: i64,
        #[arg(long)]
        comments: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum FinanceCommand {
    #[command(about = "Approved requests ready for reconciliation")]
    Approved,
    #[command(about = "Rejected requests, view-only")]
    Rejected,
    #[command(about = "Requests still awaiting approval, view-only")]
    Pending,
    #[command(about = "Upload a receipt for an approved request")]
    UploadReceipt { id: i64, file: PathBuf },
    #[command(about = "Append a finance comment to an approved request")]
    Comment { id: i64, text: String },
    #[command(about = "Render a purchase-order document from loaded fields")]
    Po {
        id: i64,
        #[arg(long, help = "Output path; defaults to PO_request_<id>.html")]
        out: Option<PathBuf>,
    },
}

fn init_logging(config: &AppConfig) {
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    // Logs go to stderr so command output on stdout stays machine-readable.
    // A second init (tests, embedding) keeps the first subscriber.
    let builder = tracing_subscriber::fmt().with_target(false).with_max_level(log_level);
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().with_writer(std::io::stderr).try_init(),
        LogFormat::Pretty => builder.pretty().with_writer(std::io::stderr).try_init(),
        LogFormat::Json => builder.json().with_writer(std::io::stderr).try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load(LoadOptions {
        config_path: cli.config,
        overrides: ConfigOverrides::default(),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            let result = commands::CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
            println!("{}", result.output);
            return ExitCode::from(result.exit_code);
        }
    };
    init_logging(&config);

    let result = match cli.command {
        Command::Login { username, password } => {
            commands::auth::login(&config, &username, &password)
        }
        Command::Register { username, email, password, confirm_password } => {
            commands::auth::register(&config, username, email, password, confirm_password)
        }
        Command::Logout => commands::auth::logout(&config),
        Command::Whoami => commands::auth::whoami(&config),
        Command::Staff { command } => match command {
            StaffCommand::List => commands::staff::list(&config),
            StaffCommand::Show { id } => commands::staff::show(&config, id),
            StaffCommand::Create { title, description, amount, supplier } => {
                commands::staff::create(&config, title, description, amount, supplier)
            }
            StaffCommand::Edit { id, title, description, amount, supplier } => {
                commands::staff::edit(&config, id, title, description, amount, supplier)
            }
            StaffCommand::Comment { id, text } => commands::staff::comment(&config, id, &text),
            StaffCommand::UploadProforma { id, file } => {
                commands::staff::upload_proforma(&config, id, &file)
            }
            StaffCommand::UploadReceipt { id, file } => {
                commands::staff::upload_receipt(&config, id, &file)
            }
            StaffCommand::Attach { id, files } => commands::staff::attach(&config, id, &files),
        },
        Command::Approver { command } => match command {
            ApproverCommand::Queue => commands::approver::queue(&config),
            ApproverCommand::History { filter } => commands::approver::history(&config, filter),
            ApproverCommand::Approve { id, comments } => {
                commands::approver::decide_approve(&config, id, comments.as_deref())
            }
            ApproverCommand::Reject { id, comments } => {
                commands::approver::decide_reject(&config, id, comments.as_deref())
            }
        },
        Command::Finance { command } => match command {
            FinanceCommand::Approved => commands::finance::approved(&config),
            FinanceCommand::Rejected => commands::finance::rejected(&config),
            FinanceCommand::Pending => commands::finance::pending(&config),
            FinanceCommand::UploadReceipt { id, file } => {
                commands::finance::upload_receipt(&config, id, &file)
            }
            FinanceCommand::Comment { id, text } => commands::finance::comment(&config, id, &text),
            FinanceCommand::Po { id, out } => commands::finance::po(&config, id, out.as_deref()),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
