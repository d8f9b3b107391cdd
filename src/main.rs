use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ledgerdesk::config::{LedgerConfig, default_data_dir};
use ledgerdesk::db::{CustomerStatus, DocType, Product, Role};
use ledgerdesk::ledger::activity::{self, EventFilter};
use ledgerdesk::ledger::catalog::{self, ProductUpdate};
use ledgerdesk::ledger::users::{self, Page};
use ledgerdesk::ledger::{
    CustomerFilter, CustomerUpdate, InvoiceDraft, Ledger, LineItem, NewCustomer, NewUser, Pricing,
    QuotationDraft, ReceiptRequest, RecordFilter, UserUpdate,
};
use ledgerdesk::settings::Settings;

#[derive(Parser)]
#[command(name = "ledgerdesk", version, about = "Quotations, invoices, receipts, and customers")]
struct Cli {
    /// Directory holding records.csv, customers.csv, products.csv.
    #[arg(long, global = true, env = "LEDGER_DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Business date for new documents (YYYY-MM-DD); today by default.
    #[arg(long, global = true, value_name = "DATE")]
    date: Option<NaiveDate>,

    /// Sign in as the user with this PIN (overrides LEDGER_PIN).
    #[arg(long, global = true, value_name = "PIN")]
    pin: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a quotation.
    Quote(QuoteArgs),
    /// Create an invoice from a quotation or standalone.
    Invoice(InvoiceArgs),
    /// Record a payment against an invoice.
    Receipt(ReceiptArgs),
    /// Balance of one invoice or project.
    Balance {
        #[arg(long, conflicts_with = "project", required_unless_present = "project")]
        invoice: Option<String>,
        #[arg(long)]
        project: Option<String>,
    },
    /// Quoted, invoiced, received, and outstanding totals for a customer.
    Finances {
        #[arg(long, default_value = "")]
        name: String,
        #[arg(long)]
        phone: Option<String>,
    },
    #[command(subcommand)]
    Customer(CustomerCommand),
    #[command(subcommand)]
    Product(ProductCommand),
    #[command(subcommand)]
    Report(ReportCommand),
    /// Render a stored document to HTML.
    Render {
        #[arg(long = "type", value_parser = parse_doc_type)]
        doc_type: DocType,
        number: String,
        #[arg(long, value_name = "PATH")]
        template: Option<PathBuf>,
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    #[command(subcommand)]
    User(UserCommand),
    #[command(subcommand)]
    Log(LogCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
}

#[derive(Args)]
struct PricingArgs {
    /// Catalog line as DEVICE=QTY (QTY defaults to 1). Repeatable.
    #[arg(long = "item", value_name = "DEVICE=QTY")]
    items: Vec<String>,
    /// Single amount instead of catalog lines.
    #[arg(long, conflicts_with = "items")]
    amount: Option<Decimal>,
    #[arg(long, default_value = "0")]
    installation: Decimal,
    #[arg(long, default_value = "0")]
    discount: Decimal,
    #[arg(long, default_value = "0")]
    discount_percent: Decimal,
}

impl PricingArgs {
    fn is_empty(&self) -> bool {
        self.items.is_empty() && self.amount.is_none()
    }
}

#[derive(Args)]
struct RenderTo {
    /// Also render the document to this file.
    #[arg(long, value_name = "PATH")]
    render: Option<PathBuf>,
    #[arg(long, value_name = "PATH", requires = "render")]
    template: Option<PathBuf>,
}

#[derive(Args)]
struct QuoteArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long)]
    number: Option<String>,
    #[arg(long, default_value = "")]
    note: String,
    #[arg(long)]
    prepared_by: Option<String>,
    #[arg(long)]
    approved_by: Option<String>,
    #[command(flatten)]
    pricing: PricingArgs,
    #[command(flatten)]
    output: RenderTo,
}

#[derive(Args)]
struct InvoiceArgs {
    /// Quotation number to convert.
    #[arg(long)]
    from_quotation: Option<String>,
    #[arg(long, default_value = "")]
    name: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    location: String,
    #[arg(long)]
    number: Option<String>,
    #[arg(long, default_value = "")]
    note: String,
    #[command(flatten)]
    pricing: PricingArgs,
    #[command(flatten)]
    output: RenderTo,
}

#[derive(Args)]
struct ReceiptArgs {
    #[arg(long)]
    invoice: String,
    #[arg(long)]
    amount: Decimal,
    #[arg(long)]
    number: Option<String>,
    #[command(flatten)]
    output: RenderTo,
}

#[derive(Subcommand)]
enum CustomerCommand {
    /// Merge client details into the customer table.
    Upsert {
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "New", value_parser = parse_status)]
        status: CustomerStatus,
    },
    /// Create a customer; fails if the name or phone is already known.
    Add {
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, value_parser = parse_status)]
        status: Option<CustomerStatus>,
        #[arg(long, default_value = "")]
        notes: String,
        #[arg(long, default_value = "")]
        tags: String,
        #[arg(long)]
        follow_up: Option<NaiveDate>,
        #[arg(long, default_value = "")]
        assigned_to: String,
    },
    Update {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_parser = parse_status)]
        status: Option<CustomerStatus>,
        #[arg(long)]
        notes: Option<String>,
        #[arg(long)]
        tags: Option<String>,
        #[arg(long, conflicts_with = "clear_follow_up")]
        follow_up: Option<NaiveDate>,
        #[arg(long)]
        clear_follow_up: bool,
        #[arg(long)]
        assigned_to: Option<String>,
    },
    List {
        #[arg(long, value_parser = parse_status)]
        status: Option<CustomerStatus>,
        #[arg(long)]
        query: Option<String>,
    },
    Delete {
        name: String,
    },
    /// Customers marked Follow-up or with a due follow-up date.
    FollowUps,
}

#[derive(Subcommand)]
enum ProductCommand {
    Add {
        device: String,
        #[arg(long)]
        price: Decimal,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value_t = 0)]
        warranty: u32,
        /// Picture to embed in quotations.
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    Update {
        device: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long)]
        price: Option<Decimal>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        warranty: Option<u32>,
        #[arg(long, value_name = "PATH")]
        image: Option<PathBuf>,
    },
    List,
    Search {
        query: String,
    },
    Delete {
        device: String,
    },
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    #[arg(long = "type", value_parser = parse_doc_type)]
    doc_type: Option<DocType>,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    location: Option<String>,
    /// 0 means no lower bound.
    #[arg(long, default_value = "0")]
    min_amount: Decimal,
    /// 0 means no upper bound.
    #[arg(long, default_value = "0")]
    max_amount: Decimal,
}

impl From<FilterArgs> for RecordFilter {
    fn from(args: FilterArgs) -> Self {
        Self {
            start: args.from,
            end: args.to,
            doc_type: args.doc_type,
            name_contains: args.name,
            location: args.location,
            min_amount: args.min_amount,
            max_amount: args.max_amount,
        }
    }
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Matching records.
    Records(FilterArgs),
    Summary(FilterArgs),
    Projects(FilterArgs),
    TopCustomers(FilterArgs),
    Monthly(FilterArgs),
}

#[derive(Subcommand)]
enum UserCommand {
    List,
    Add {
        name: String,
        /// PIN for the new account (4 to 6 digits).
        #[arg(long = "new-pin", value_name = "PIN")]
        new_pin: String,
        #[arg(long, default_value = "viewer", value_parser = parse_role)]
        role: Role,
        /// Comma-separated pages; the role's defaults when omitted.
        #[arg(long, value_delimiter = ',')]
        pages: Option<Vec<String>>,
    },
    Update {
        name: String,
        #[arg(long)]
        rename: Option<String>,
        #[arg(long = "new-pin", value_name = "PIN")]
        new_pin: Option<String>,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long, value_delimiter = ',')]
        pages: Option<Vec<String>>,
    },
    Delete {
        name: String,
    },
    /// Show which account a PIN belongs to, and whether it may use PAGE.
    Check {
        #[arg(value_name = "PIN")]
        candidate: String,
        #[arg(long, value_parser = parse_page)]
        page: Option<Page>,
    },
}

#[derive(Subcommand)]
enum LogCommand {
    List {
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        page: Option<String>,
        #[arg(long)]
        action: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Drop events older than DAYS.
    Prune {
        #[arg(long, default_value_t = 90)]
        days: u32,
    },
    /// Check the hash chain.
    Verify,
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show,
    /// Write settings.toml with the current values.
    Init,
}

fn parse_doc_type(raw: &str) -> Result<DocType, String> {
    match raw.trim().to_lowercase().as_str() {
        "quotation" | "quote" => Ok(DocType::Quotation),
        "invoice" => Ok(DocType::Invoice),
        "receipt" => Ok(DocType::Receipt),
        other => DocType::from_db_value(other)
            .ok_or_else(|| format!("unknown document type '{raw}' (expected q, i, or r)")),
    }
}

fn parse_status(raw: &str) -> Result<CustomerStatus, String> {
    CustomerStatus::from_label(raw).ok_or_else(|| {
        let known: Vec<&str> = CustomerStatus::ALL.iter().map(|s| s.as_str()).collect();
        format!("unknown status '{raw}' (expected one of {})", known.join(", "))
    })
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_label(raw)
        .ok_or_else(|| format!("unknown role '{raw}' (expected admin, staff, or viewer)"))
}

fn parse_page(raw: &str) -> Result<Page, String> {
    Page::from_label(raw).ok_or_else(|| {
        let known: Vec<&str> = Page::ALL.iter().map(|p| p.as_str()).collect();
        format!("unknown page '{raw}' (expected one of {})", known.join(", "))
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LEDGER_LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn pricing_from(ledger: &Ledger, args: &PricingArgs) -> anyhow::Result<Pricing> {
    let mut pricing = match args.amount {
        Some(amount) => Pricing::lump_sum(amount),
        None => Pricing::default(),
    };
    for line in &args.items {
        let (device, qty) = match line.split_once('=') {
            Some((device, qty)) => (
                device.trim(),
                qty.trim()
                    .parse::<Decimal>()
                    .with_context(|| format!("invalid quantity in '{line}'"))?,
            ),
            None => (line.trim(), Decimal::ONE),
        };
        let Some(product) = ledger.find_product(device).await? else {
            bail!("product '{device}' is not in the catalog");
        };
        pricing.items.push(LineItem::from_product(&product, qty));
    }
    pricing.installation = args.installation;
    pricing.discount_value = args.discount;
    pricing.discount_percent = args.discount_percent;
    Ok(pricing)
}

async fn read_template(path: Option<&Path>) -> anyhow::Result<Option<String>> {
    match path {
        Some(path) => Ok(Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read template {}", path.display()))?,
        )),
        None => Ok(None),
    }
}

async fn write_output(path: &Path, html: &str) -> anyhow::Result<()> {
    tokio::fs::write(path, html)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "Rendered document");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let today = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());
    let data_dir = cli.data_dir.unwrap_or_else(default_data_dir);
    let settings = Settings::load_from_dir(&data_dir);
    let mut config = LedgerConfig::resolve(data_dir, &settings)?;
    if cli.pin.is_some() {
        config.pin = cli.pin;
    }

    let command = match cli.command {
        Command::User(UserCommand::Check { candidate, page }) => {
            return check_pin(&config, &candidate, page).await;
        }
        command => command,
    };

    let ledger = Ledger::open(config).await?;
    match command {
        Command::Log(command) => {
            ledger.require_admin()?;
            run_log(ledger.config(), command)
        }
        Command::Settings(command) => {
            ledger.require_admin()?;
            match command {
                SettingsCommand::Show => print_json(&settings),
                SettingsCommand::Init => {
                    let path = settings.save_to_dir(&ledger.config().data_dir)?;
                    println!("{}", path.display());
                    Ok(())
                }
            }
        }
        command => run(&ledger, command, today).await,
    }
}

async fn check_pin(config: &LedgerConfig, pin: &str, page: Option<Page>) -> anyhow::Result<()> {
    let db = ledgerdesk::db::connect_from_config(config).await?;
    let user = users::sign_in(db.as_ref(), pin).await?;
    let allowed = page.map(|page| users::can_access(Some(&user), page));
    print_json(&serde_json::json!({
        "name": user.name,
        "role": user.role,
        "allowed_pages": user.allowed_pages,
        "page": page,
        "allowed": allowed,
    }))
}

async fn run(ledger: &Ledger, command: Command, today: NaiveDate) -> anyhow::Result<()> {
    match command {
        Command::Quote(args) => {
            let pricing = pricing_from(ledger, &args.pricing).await?;
            let outcome = ledger
                .create_quotation(
                    QuotationDraft {
                        client_name: args.name,
                        phone: args.phone,
                        location: args.location,
                        number: args.number,
                        pricing,
                        note: args.note,
                        prepared_by: args.prepared_by,
                        approved_by: args.approved_by,
                    },
                    today,
                )
                .await?;
            if let Some(ref out) = args.output.render {
                let template = read_template(args.output.template.as_deref()).await?;
                let html = ledger.render_quotation(&outcome, template.as_deref())?;
                write_output(out, &html).await?;
            }
            print_json(&outcome)
        }
        Command::Invoice(args) => {
            let pricing = if args.pricing.is_empty() {
                None
            } else {
                Some(pricing_from(ledger, &args.pricing).await?)
            };
            let mut draft = match args.from_quotation {
                Some(number) => InvoiceDraft::from_quotation(number),
                None => {
                    let Some(pricing) = pricing.clone() else {
                        bail!("a standalone invoice needs --amount or --item");
                    };
                    InvoiceDraft::standalone(args.name.clone(), pricing)
                }
            };
            draft.client_name = args.name;
            draft.phone = args.phone;
            draft.location = args.location;
            draft.number = args.number;
            draft.note = args.note;
            draft.pricing = pricing;
            let outcome = ledger.create_invoice(draft, today).await?;
            if let Some(ref out) = args.output.render {
                let template = read_template(args.output.template.as_deref()).await?;
                let html = ledger.render_invoice(&outcome, template.as_deref())?;
                write_output(out, &html).await?;
            }
            print_json(&outcome)
        }
        Command::Receipt(args) => {
            let outcome = ledger
                .record_receipt(
                    ReceiptRequest {
                        invoice_number: args.invoice,
                        amount: args.amount,
                        number: args.number,
                    },
                    today,
                )
                .await?;
            if outcome.capped {
                eprintln!(
                    "Payment capped at the remaining balance: accepted {} {}",
                    ledger.config().currency,
                    outcome.accepted
                );
            }
            if let Some(ref out) = args.output.render {
                let template = read_template(args.output.template.as_deref()).await?;
                let html = ledger.render_receipt(&outcome, template.as_deref())?;
                write_output(out, &html).await?;
            }
            print_json(&outcome)
        }
        Command::Balance { invoice, project } => match (invoice, project) {
            (Some(invoice), _) => print_json(&ledger.invoice_balance(&invoice).await?),
            (None, Some(project)) => print_json(&ledger.project_balance(&project).await?),
            (None, None) => bail!("pass --invoice or --project"),
        },
        Command::Finances { name, phone } => {
            if name.trim().is_empty() && phone.as_deref().is_none_or(|p| p.trim().is_empty()) {
                bail!("pass --name or --phone");
            }
            print_json(&ledger.customer_finances(&name, phone.as_deref()).await?)
        }
        Command::Customer(command) => run_customer(ledger, command, today).await,
        Command::Product(command) => run_product(ledger, command).await,
        Command::Report(command) => match command {
            ReportCommand::Records(filter) => print_json(&ledger.records(&filter.into()).await?),
            ReportCommand::Summary(filter) => print_json(&ledger.summary(&filter.into()).await?),
            ReportCommand::Projects(filter) => {
                print_json(&ledger.project_lifecycle(&filter.into()).await?)
            }
            ReportCommand::TopCustomers(filter) => {
                print_json(&ledger.top_customers(&filter.into()).await?)
            }
            ReportCommand::Monthly(filter) => {
                print_json(&ledger.monthly_totals(&filter.into()).await?)
            }
        },
        Command::Render {
            doc_type,
            number,
            template,
            out,
        } => {
            let template = read_template(template.as_deref()).await?;
            let html = ledger
                .render_stored(doc_type, &number, template.as_deref())
                .await?;
            match out {
                Some(out) => write_output(&out, &html).await,
                None => {
                    println!("{html}");
                    Ok(())
                }
            }
        }
        Command::User(command) => run_user(ledger, command).await,
        Command::Log(_) | Command::Settings(_) => Ok(()),
    }
}

async fn run_customer(
    ledger: &Ledger,
    command: CustomerCommand,
    today: NaiveDate,
) -> anyhow::Result<()> {
    match command {
        CustomerCommand::Upsert {
            name,
            phone,
            location,
            status,
        } => {
            let Some(outcome) = ledger
                .upsert_customer(&name, &phone, &location, status, today)
                .await?
            else {
                bail!("customer name must not be blank");
            };
            print_json(&outcome)
        }
        CustomerCommand::Add {
            name,
            phone,
            location,
            email,
            status,
            notes,
            tags,
            follow_up,
            assigned_to,
        } => {
            let customer = ledger
                .add_customer(
                    NewCustomer {
                        client_name: name,
                        phone,
                        location,
                        email,
                        status,
                        notes,
                        tags,
                        next_follow_up: follow_up,
                        assigned_to,
                    },
                    today,
                )
                .await?;
            print_json(&customer)
        }
        CustomerCommand::Update {
            name,
            rename,
            phone,
            location,
            email,
            status,
            notes,
            tags,
            follow_up,
            clear_follow_up,
            assigned_to,
        } => {
            let next_follow_up = if clear_follow_up {
                Some(None)
            } else {
                follow_up.map(Some)
            };
            let customer = ledger
                .update_customer(
                    &name,
                    CustomerUpdate {
                        client_name: rename,
                        phone,
                        location,
                        email,
                        status,
                        notes,
                        tags,
                        next_follow_up,
                        assigned_to,
                    },
                    today,
                )
                .await?;
            print_json(&customer)
        }
        CustomerCommand::List { status, query } => {
            print_json(&ledger.list_customers(&CustomerFilter { status, query }).await?)
        }
        CustomerCommand::Delete { name } => print_json(&ledger.delete_customer(&name).await?),
        CustomerCommand::FollowUps => print_json(&ledger.follow_ups(today).await?),
    }
}

async fn run_product(ledger: &Ledger, command: ProductCommand) -> anyhow::Result<()> {
    match command {
        ProductCommand::Add {
            device,
            price,
            description,
            warranty,
            image,
        } => {
            let (image_path, image_base64) = match image {
                Some(path) => (path.display().to_string(), catalog::load_image(&path).await?),
                None => (String::new(), String::new()),
            };
            let product = ledger
                .add_product(Product {
                    device,
                    description,
                    unit_price: price,
                    warranty_years: warranty,
                    image_base64,
                    image_path,
                })
                .await?;
            print_json(&product)
        }
        ProductCommand::Update {
            device,
            rename,
            price,
            description,
            warranty,
            image,
        } => {
            let (image_path, image_base64) = match image {
                Some(path) => (
                    Some(path.display().to_string()),
                    Some(catalog::load_image(&path).await?),
                ),
                None => (None, None),
            };
            let product = ledger
                .update_product(
                    &device,
                    ProductUpdate {
                        device: rename,
                        description,
                        unit_price: price,
                        warranty_years: warranty,
                        image_path,
                        image_base64,
                    },
                )
                .await?;
            print_json(&product)
        }
        ProductCommand::List => print_json(&ledger.search_products("").await?),
        ProductCommand::Search { query } => print_json(&ledger.search_products(&query).await?),
        ProductCommand::Delete { device } => print_json(&ledger.delete_product(&device).await?),
    }
}

async fn run_user(ledger: &Ledger, command: UserCommand) -> anyhow::Result<()> {
    match command {
        UserCommand::List => print_json(&ledger.list_users().await?),
        UserCommand::Add {
            name,
            new_pin,
            role,
            pages,
        } => print_json(
            &ledger
                .add_user(NewUser {
                    name,
                    pin: new_pin,
                    role,
                    allowed_pages: pages,
                })
                .await?,
        ),
        UserCommand::Update {
            name,
            rename,
            new_pin,
            role,
            pages,
        } => print_json(
            &ledger
                .update_user(
                    &name,
                    UserUpdate {
                        name: rename,
                        pin: new_pin,
                        role,
                        allowed_pages: pages,
                    },
                )
                .await?,
        ),
        UserCommand::Delete { name } => print_json(&ledger.delete_user(&name).await?),
        UserCommand::Check { .. } => Ok(()),
    }
}

fn run_log(config: &LedgerConfig, command: LogCommand) -> anyhow::Result<()> {
    let path = &config.activity.path;
    match command {
        LogCommand::List {
            user,
            page,
            action,
            limit,
        } => {
            let mut events = activity::load_events(
                path,
                &EventFilter {
                    user,
                    page,
                    action,
                    ..EventFilter::default()
                },
            )?;
            if let Some(limit) = limit {
                events.truncate(limit);
            }
            print_json(&events)
        }
        LogCommand::Prune { days } => {
            let removed = activity::prune_older_than(path, days, Utc::now())?;
            print_json(&serde_json::json!({ "removed": removed, "days": days }))
        }
        LogCommand::Verify => {
            let report = activity::verify_chain(path)?;
            print_json(&report)?;
            if let Some(line) = report.broken_at {
                bail!("activity log hash chain breaks at event {line}");
            }
            Ok(())
        }
    }
}
