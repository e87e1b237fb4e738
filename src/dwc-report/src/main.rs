//! Renders the dynamic content hits chart for a set of
//! recorded deliveries and prints it as JSON.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use campaign_core::config::AppConfig;
use campaign_core::{AnonymousUser, CurrentUser, EventBus, Page, UserContext};
use campaign_dynamic_content::{
    default_messages, DynamicContent, DynamicContentEvent, DynamicContentModel,
    DynamicContentRepository, InMemoryStore, Stat, StatRepository,
};
use campaign_reporting::{ChartFilter, TimeUnit};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use clap::Parser;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "dwc-report")]
#[command(about = "Dynamic content hits chart from recorded deliveries")]
#[command(version)]
struct Cli {
    /// JSON file with `pages`, `contents` and `stats`
    #[arg(long)]
    fixture: PathBuf,

    /// Optional TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bucket unit: i, H, d, W, m, Y (overrides config)
    #[arg(long)]
    unit: Option<String>,

    /// First day of the range (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day of the range, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// strftime label format
    #[arg(long)]
    date_format: Option<String>,

    /// total, unique or total_and_unique
    #[arg(long)]
    flag: Option<String>,

    /// Only count deliveries of this dynamic content
    #[arg(long)]
    content: Option<Uuid>,

    /// Only count deliveries into pages created by this user
    #[arg(long)]
    user: Option<Uuid>,

    /// Table prefix (overrides config)
    #[arg(long, env = "CAMPAIGN_EXPRESS__STORE__TABLE_PREFIX")]
    table_prefix: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Fixture {
    #[serde(default)]
    pages: Vec<Page>,
    #[serde(default)]
    contents: Vec<DynamicContent>,
    #[serde(default)]
    stats: Vec<Stat>,
}

fn load_fixture(store: &InMemoryStore, fixture: Fixture) -> anyhow::Result<()> {
    for page in fixture.pages {
        store.save_page(page);
    }

    // Roots first so variant parent links resolve.
    let (roots, variants): (Vec<_>, Vec<_>) =
        fixture.contents.into_iter().partition(|c| !c.is_variant());
    for content in roots.iter().chain(variants.iter()) {
        DynamicContentRepository::save_entity(store, content)
            .with_context(|| format!("loading dynamic content {}", content.id))?;
    }

    for stat in fixture.stats {
        StatRepository::save_entity(store, stat)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dwc_report=info,campaign_dynamic_content=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load_with_file(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(prefix) = cli.table_prefix {
        config.store.table_prefix = prefix;
    }

    let unit: TimeUnit = cli
        .unit
        .as_deref()
        .unwrap_or(config.reporting.default_unit.as_str())
        .parse()?;
    let to = cli.to.unwrap_or_else(|| Utc::now().date_naive());
    let from = cli
        .from
        .unwrap_or(to - Duration::days(config.reporting.default_range_days));
    let date_from = from.and_time(NaiveTime::MIN).and_utc();
    let date_to = to
        .and_hms_opt(23, 59, 59)
        .context("invalid end of range")?
        .and_utc();

    info!(
        node_id = %config.node_id,
        table_prefix = %config.store.table_prefix,
        ?unit,
        %date_from,
        %date_to,
        "Configuration loaded"
    );

    let raw = std::fs::read_to_string(&cli.fixture)
        .with_context(|| format!("reading {}", cli.fixture.display()))?;
    let fixture: Fixture = serde_json::from_str(&raw)?;

    let store = Arc::new(InMemoryStore::new(config.store.clone()));
    load_fixture(&store, fixture)?;

    let (user, can_view_others): (Arc<dyn UserContext>, bool) = match cli.user {
        Some(id) => (Arc::new(CurrentUser::new(id)), false),
        None => (Arc::new(AnonymousUser), true),
    };
    let model = DynamicContentModel::in_memory(
        store,
        Arc::new(EventBus::<DynamicContentEvent>::new()),
        Arc::new(default_messages()),
        user,
    );

    let mut filter = ChartFilter::new();
    if let Some(flag) = cli.flag {
        filter.insert("flag".into(), flag.as_str().into());
    }
    if let Some(content) = cli.content {
        filter.insert("dynamic_content_id".into(), content.into());
    }

    let chart = model.get_hits_line_chart_data(
        unit,
        date_from,
        date_to,
        cli.date_format.as_deref(),
        filter,
        can_view_others,
    )?;

    println!("{}", serde_json::to_string_pretty(&chart)?);
    Ok(())
}
