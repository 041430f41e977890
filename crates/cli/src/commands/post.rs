//! Post command - select, render, publish and mark products

use anyhow::{Context, Result, bail};
use secrecy::SecretString;
use shopcast_adapters::{
    OriginalImageStory, StubPublisher,
    catalog::{LocalCatalog, ShopifyCatalog},
    meta::{FacebookPublisher, InstagramApi, ThreadsApi},
};
use shopcast_domain::{
    CatalogStore, Platform, PublishOutcome, Publisher, SystemClock,
    usecases::{
        CaptionRenderer, ContainerPublisher, PollConfig, PostingRun, ProductSelector,
        PublishOrchestrator, RenderConfig, RunConfig, RunReport, RunRequest,
    },
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::args::PostArgs;
use crate::config::{AppConfig, load_secret, optional_secret};

pub async fn execute(args: PostArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = AppConfig::load(config_path.as_deref())?;
    let dry_run = args.dry_run || config.general.dry_run;

    let platforms = match args.platforms {
        Some(platforms) => platforms,
        None => config.default_platforms()?,
    };

    tracing::info!(
        dry_run = dry_run,
        count = args.count,
        item = ?args.item,
        partition = ?args.partition,
        platforms = ?platforms,
        "Starting shopcast post"
    );

    let selector = Arc::new(build_selector(&config).await?);
    let renderer = Arc::new(CaptionRenderer::new(render_config(&config)));
    let orchestrator = Arc::new(build_orchestrator(&config, dry_run)?);

    let run = PostingRun::new(
        selector,
        renderer,
        orchestrator,
        Arc::new(SystemClock),
        RunConfig {
            max_posts_per_run: config.general.max_posts_per_run,
            dry_run,
        },
    );

    let report = match args.item.as_deref() {
        Some(item_id) => {
            run.post_item(item_id, args.partition.as_deref(), &platforms)
                .await
        }
        None => {
            run.run(&RunRequest {
                count: args.count,
                partition: args.partition.clone(),
                platforms,
            })
            .await
        }
    }
    .context("Posting run failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.posts.is_empty() {
        bail!("No products available to post");
    }

    Ok(())
}

/// Catalog adapter selected by `catalog.provider`
pub(crate) async fn build_catalog(config: &AppConfig) -> Result<Arc<dyn CatalogStore>> {
    match config.catalog.provider.as_str() {
        "shopify" => {
            if config.catalog.store_url.trim().is_empty() {
                bail!("catalog.store_url is required for the shopify provider");
            }
            let token = load_secret(&config.catalog.access_token_env, "Shopify")?;
            let catalog = ShopifyCatalog::new(config.catalog.store_url.clone(), token)
                .with_aliases(config.catalog.collection_aliases.clone());
            Ok(Arc::new(catalog))
        }
        "fixture" => {
            let path = &config.catalog.fixture_path;
            let catalog = LocalCatalog::open(path)
                .await
                .with_context(|| format!("Failed to open catalog fixture {}", path.display()))?;
            Ok(Arc::new(catalog))
        }
        other => bail!("Unknown catalog provider: {}", other),
    }
}

pub(crate) async fn build_selector(
    config: &AppConfig,
) -> Result<ProductSelector<dyn CatalogStore>> {
    let catalog = build_catalog(config).await?;
    ProductSelector::new(
        catalog,
        config.partitions(),
        config.selector.first_partition.as_deref(),
    )
    .context("Invalid partition configuration")
}

fn render_config(config: &AppConfig) -> RenderConfig {
    let content = &config.content;
    RenderConfig {
        store_url: content
            .store_url
            .clone()
            .unwrap_or_else(|| config.catalog.store_url.clone()),
        header: content.header.clone(),
        hashtags: content.hashtags.clone(),
        keyword_tags: content.keyword_tags.clone(),
        max_description_chars: content.max_description_chars,
        currency_symbol: content.currency_symbol.clone(),
        price_on_request: content.price_on_request.clone(),
    }
}

fn build_orchestrator(config: &AppConfig, dry_run: bool) -> Result<PublishOrchestrator> {
    let publishers = if config.publish.stub {
        tracing::info!("Using stub publishers");
        Platform::ALL
            .iter()
            .map(|p| Arc::new(StubPublisher::new(*p)) as Arc<dyn Publisher>)
            .collect()
    } else {
        build_publishers(config, dry_run)?
    };

    let orchestrator = PublishOrchestrator::new(publishers);
    Ok(if config.publish.stories {
        orchestrator.with_stories(Arc::new(OriginalImageStory))
    } else {
        orchestrator
    })
}

/// Meta publishers; platforms without credentials come back disabled
pub(crate) fn build_publishers(
    config: &AppConfig,
    dry_run: bool,
) -> Result<Vec<Arc<dyn Publisher>>> {
    let poll = PollConfig {
        interval: Duration::from_secs(config.publish.poll_interval_secs),
        timeout: Duration::from_secs(config.publish.poll_timeout_secs),
    };
    if poll.interval.is_zero() || poll.timeout < poll.interval {
        bail!("publish.poll_timeout_secs must be at least publish.poll_interval_secs (> 0)");
    }

    let facebook: Arc<dyn Publisher> = match platform_token(
        &config.facebook.page_id,
        &config.facebook.access_token_env,
        Platform::Facebook,
        dry_run,
    ) {
        Some(token) => Arc::new(FacebookPublisher::new(
            config.facebook.page_id.clone(),
            token,
        )),
        None => Arc::new(FacebookPublisher::disabled()),
    };

    let instagram_token = platform_token(
        &config.instagram.account_id,
        &config.instagram.access_token_env,
        Platform::Instagram,
        dry_run,
    );
    let instagram: Arc<dyn Publisher> = Arc::new(ContainerPublisher::new(
        Arc::new(InstagramApi::new(
            config.instagram.account_id.clone(),
            instagram_token.unwrap_or_else(empty_token),
        )),
        poll,
    ));

    let threads_token = platform_token(
        &config.threads.user_id,
        &config.threads.access_token_env,
        Platform::Threads,
        dry_run,
    );
    let threads: Arc<dyn Publisher> = Arc::new(ContainerPublisher::new(
        Arc::new(ThreadsApi::new(
            config.threads.user_id.clone(),
            threads_token.unwrap_or_else(empty_token),
        )),
        poll,
    ));

    Ok(vec![facebook, instagram, threads])
}

fn platform_token(
    account_id: &str,
    env_var: &str,
    platform: Platform,
    dry_run: bool,
) -> Option<SecretString> {
    if account_id.trim().is_empty() {
        tracing::debug!(platform = %platform, "No account id configured");
        return None;
    }
    let token = optional_secret(env_var);
    if token.is_none() && !dry_run {
        tracing::warn!(platform = %platform, env_var = %env_var, "Access token not set");
    }
    token
}

fn empty_token() -> SecretString {
    SecretString::new("".into())
}

fn print_report(report: &RunReport) {
    let mode = if report.dry_run { " (dry run)" } else { "" };
    println!("Run {}{}", report.run_id, mode);

    if report.posts.is_empty() {
        println!("  nothing to post");
        return;
    }

    for post in &report.posts {
        println!();
        println!("[{}] {} ({})", post.partition, post.title, post.item_id);

        if let Some(preview) = &post.preview {
            println!("  images: {}", preview.image_urls.len());
            for line in preview.caption.lines() {
                println!("  | {}", line);
            }
            continue;
        }

        for (platform, outcome) in post.outcomes.outcomes() {
            match outcome {
                PublishOutcome::Published { post_id } => {
                    println!("  ✓ {}: {}", platform, post_id)
                }
                PublishOutcome::Failed { error } => println!("  ✗ {}: {}", platform, error),
            }
        }
        println!("  marked: {}", if post.marked { "yes" } else { "no" });
    }

    println!();
    println!(
        "{} processed, {} published everywhere",
        report.posts.len(),
        report.succeeded()
    );
}
