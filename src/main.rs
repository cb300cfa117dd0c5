use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use edu_inventory_lib::config::{parse_listen, Config};
use edu_inventory_lib::export::{self, DEFAULT_EXPORT_NAME};
use edu_inventory_lib::local_store::SqliteLocalStore;
use edu_inventory_lib::migrate::{self, LOCAL_MIGRATIONS, REMOTE_MIGRATIONS};
use edu_inventory_lib::mirror::{self, ItemsApiMirror, Mirror, WebhookMirror};
use edu_inventory_lib::remote_table::RemoteTable;
use edu_inventory_lib::validation::{validate_edit, validate_form};
use edu_inventory_lib::{
    db, server, AppError, AssetForm, AssetRecord, AssetRegistry, RegistryError,
};

#[derive(Debug, Parser)]
#[command(name = "edu-inventory", about = "School network equipment inventory", version)]
struct Cli {
    /// Directory holding the databases and logs.
    #[arg(long, value_name = "PATH", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a new item and mirror it.
    Add(FormArgs),
    /// List every registered item.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one item.
    Show { serial: String },
    /// Replace the fields of a registered item. Omitted fields keep their value.
    Update {
        serial: String,
        #[command(flatten)]
        fields: FormArgs,
    },
    /// Remove an item by serial number.
    Delete { serial: String },
    /// Write the inventory to a spreadsheet workbook.
    Export {
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Export, then print a share link referencing the workbook.
    ShareLink {
        #[arg(long, value_name = "PATH")]
        out: Option<PathBuf>,
    },
    /// Run the items HTTP backend.
    Serve {
        #[arg(long, value_name = "ADDR")]
        listen: Option<String>,
    },
    /// Database inspection commands.
    #[command(subcommand)]
    Db(DbCommand),
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    /// Report schema versions and row counts.
    Status {
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Default, Args)]
struct FormArgs {
    #[arg(long)]
    brand: Option<String>,
    #[arg(long = "serial")]
    serial_number: Option<String>,
    #[arg(long)]
    asset_tag: Option<String>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    ram: Option<String>,
    #[arg(long)]
    processor: Option<String>,
    #[arg(long)]
    motherboard: Option<String>,
    #[arg(long)]
    storage: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    sector: Option<String>,
}

impl FormArgs {
    /// Overlay the given flags on `base`.
    fn apply(self, mut base: AssetForm) -> AssetForm {
        let fields = [
            (self.brand, &mut base.brand),
            (self.serial_number, &mut base.serial_number),
            (self.asset_tag, &mut base.asset_tag),
            (self.model, &mut base.model),
            (self.ram, &mut base.ram_spec),
            (self.processor, &mut base.processor),
            (self.motherboard, &mut base.motherboard),
            (self.storage, &mut base.storage),
            (self.location, &mut base.location),
            (self.sector, &mut base.sector),
        ];
        for (value, slot) in fields {
            if let Some(value) = value {
                *slot = value;
            }
        }
        base
    }
}

fn main() {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err}");
            process::exit(1);
        }
    };
    let config = match &cli.data_dir {
        Some(dir) => config.with_data_dir(dir),
        None => config,
    };

    let guard = edu_inventory_lib::init_logging(Some(&config.logs_dir()));
    tracing::debug!(
        target: "edu_inventory",
        event = "cli_start",
        version = env!("CARGO_PKG_VERSION"),
        git = edu_inventory_lib::GIT_HASH
    );

    let code = match run(cli.command, config) {
        Ok(code) => code,
        Err(err) => {
            match err.downcast_ref::<AppError>() {
                Some(app) => eprintln!("Error: [{}] {}", app.code(), app.message()),
                None => eprintln!("Error: {err:#}"),
            }
            1
        }
    };
    drop(guard);
    process::exit(code);
}

fn run(command: Commands, config: Config) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    runtime.block_on(dispatch(command, config))
}

async fn dispatch(command: Commands, config: Config) -> Result<i32> {
    match command {
        Commands::Add(fields) => add(&config, fields).await,
        Commands::List { json } => list(&config, json).await,
        Commands::Show { serial } => show(&config, &serial).await,
        Commands::Update { serial, fields } => update(&config, &serial, fields).await,
        Commands::Delete { serial } => delete(&config, &serial).await,
        Commands::Export { out } => {
            let registry = open_registry(&config, Vec::new()).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_NAME));
            let summary = export::export_workbook(registry.list(), &path)?;
            println!("{} items written to {}", summary.rows, summary.path.display());
            Ok(0)
        }
        Commands::ShareLink { out } => {
            let registry = open_registry(&config, Vec::new()).await?;
            let path = out.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_NAME));
            export::export_workbook(registry.list(), &path)?;
            println!("{}", export::share_link(&file_url(&path)?));
            Ok(0)
        }
        Commands::Serve { listen } => {
            let addr = match listen {
                Some(raw) => parse_listen(&raw)?,
                None => config.listen,
            };
            let table = RemoteTable::open(&config.remote_db_path()).await?;
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("bind {addr}"))?;
            server::serve(listener, table).await?;
            Ok(0)
        }
        Commands::Db(DbCommand::Status { json }) => db_status(&config, json).await,
    }
}

fn http_mirrors(config: &Config) -> Result<Vec<Arc<dyn Mirror>>> {
    let mut mirrors: Vec<Arc<dyn Mirror>> = Vec::new();
    if config.webhook_url.is_none() && config.backend_url.is_none() {
        return Ok(mirrors);
    }
    let client = mirror::http_client(config.mirror_timeout)?;
    if let Some(url) = &config.webhook_url {
        mirrors.push(Arc::new(WebhookMirror::new(client.clone(), url.clone())));
    }
    if let Some(base) = &config.backend_url {
        mirrors.push(Arc::new(ItemsApiMirror::new(client, base)));
    }
    Ok(mirrors)
}

async fn open_registry(config: &Config, mirrors: Vec<Arc<dyn Mirror>>) -> Result<AssetRegistry> {
    let store = SqliteLocalStore::open(&config.local_db_path()).await?;
    Ok(AssetRegistry::open(Arc::new(store), mirrors).await?)
}

fn print_record(record: &AssetRecord) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

async fn add(config: &Config, fields: FormArgs) -> Result<i32> {
    let form = fields.apply(AssetForm::default());
    let input = validate_form(&form).map_err(AppError::from)?;
    let mut registry = open_registry(config, http_mirrors(config)?).await?;
    let outcome = registry.create(input).await.map_err(AppError::from)?;

    print_record(&outcome.record)?;
    for failure in &outcome.mirror_failures {
        eprintln!(
            "Warning: {} mirror did not accept the item: {}",
            failure.sink, failure.error
        );
    }
    Ok(0)
}

async fn list(config: &Config, as_json: bool) -> Result<i32> {
    let registry = open_registry(config, Vec::new()).await?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(registry.list())?);
        return Ok(0);
    }
    for item in registry.list() {
        println!(
            "{:<20} {:>8}  {:<14} {:<12} {}",
            item.serial_number, item.asset_tag, item.model, item.brand, item.location
        );
    }
    println!("{} items", registry.list().len());
    Ok(0)
}

async fn show(config: &Config, serial: &str) -> Result<i32> {
    let registry = open_registry(config, Vec::new()).await?;
    match registry.get(serial) {
        Some(record) => {
            print_record(record)?;
            Ok(0)
        }
        None => {
            eprintln!("No item is registered with serial number {serial}.");
            Ok(1)
        }
    }
}

async fn update(config: &Config, serial: &str, fields: FormArgs) -> Result<i32> {
    let mut registry = open_registry(config, Vec::new()).await?;
    let base = registry
        .get(serial)
        .map(AssetForm::from)
        .ok_or_else(|| AppError::from(RegistryError::NotFound(serial.to_string())))?;
    let form = fields.apply(base);
    let input = validate_edit(serial, &form).map_err(AppError::from)?;
    let record = registry
        .update(serial, input)
        .await
        .map_err(AppError::from)?;
    print_record(&record)?;
    Ok(0)
}

async fn delete(config: &Config, serial: &str) -> Result<i32> {
    let mut registry = open_registry(config, Vec::new()).await?;
    if registry.delete(serial).await.map_err(AppError::from)? {
        println!("Deleted {serial}.");
    } else {
        println!("Nothing registered under {serial}.");
    }
    Ok(0)
}

fn file_url(path: &Path) -> Result<String> {
    let absolute = std::fs::canonicalize(path)
        .with_context(|| format!("resolve {}", path.display()))?;
    Ok(format!("file://{}", absolute.display()))
}

async fn db_status(config: &Config, as_json: bool) -> Result<i32> {
    let local_path = config.local_db_path();
    let store = SqliteLocalStore::open(&local_path).await?;
    let local_version = migrate::schema_version(store.pool(), LOCAL_MIGRATIONS.scope).await?;
    let local_items: i64 = sqlx_count(store.pool(), "SELECT COUNT(*) FROM assets").await?;
    store.close().await;

    let remote_path = config.remote_db_path();
    let remote = if remote_path.exists() {
        let pool = db::open_sqlite_pool(&remote_path).await?;
        let version = migrate::schema_version(&pool, REMOTE_MIGRATIONS.scope).await?;
        let rows = if version > 0 {
            Some(sqlx_count(&pool, "SELECT COUNT(*) FROM items").await?)
        } else {
            None
        };
        pool.close().await;
        Some((version, rows))
    } else {
        None
    };

    if as_json {
        let report = json!({
            "local": {
                "path": local_path.display().to_string(),
                "schemaVersion": local_version,
                "latestVersion": LOCAL_MIGRATIONS.latest_version(),
                "items": local_items,
            },
            "remote": remote.map(|(version, rows)| json!({
                "path": remote_path.display().to_string(),
                "schemaVersion": version,
                "latestVersion": REMOTE_MIGRATIONS.latest_version(),
                "items": rows,
            })),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "local   {}  schema {}/{}  {} items",
            local_path.display(),
            local_version,
            LOCAL_MIGRATIONS.latest_version(),
            local_items
        );
        match remote {
            Some((version, rows)) => println!(
                "remote  {}  schema {}/{}  {} items",
                remote_path.display(),
                version,
                REMOTE_MIGRATIONS.latest_version(),
                rows.map(|n| n.to_string()).unwrap_or_else(|| "-".into())
            ),
            None => println!("remote  {}  not created", remote_path.display()),
        }
    }
    Ok(0)
}

async fn sqlx_count(pool: &sqlx::SqlitePool, sql: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(sql)
        .fetch_one(pool)
        .await
        .map_err(AppError::from)?;
    Ok(count)
}
