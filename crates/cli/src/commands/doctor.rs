//! Doctor command - validate configuration and show status

use anyhow::Result;
use serde::Serialize;
use std::path::PathBuf;

use crate::args::DoctorArgs;
use crate::commands::post::build_selector;
use crate::config::AppConfig;

#[derive(Debug, Serialize)]
struct DoctorReport {
    config: CheckResult,
    catalog: CheckResult,
    partitions: CheckResult,
    facebook: CheckResult,
    instagram: CheckResult,
    threads: CheckResult,
    publishing: CheckResult,
    overall: String,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    status: String,
    message: String,
    details: Option<serde_json::Value>,
}

impl CheckResult {
    fn new(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            message: message.into(),
            details: None,
        }
    }

    fn ok(message: impl Into<String>) -> Self {
        Self::new("ok", message)
    }

    fn warn(message: impl Into<String>) -> Self {
        Self::new("warn", message)
    }

    fn error(message: impl Into<String>) -> Self {
        Self::new("error", message)
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    fn symbol(&self) -> &'static str {
        status_symbol(&self.status)
    }
}

fn status_symbol(status: &str) -> &'static str {
    match status {
        "ok" => "✓",
        "warn" => "⚠",
        _ => "✗",
    }
}

pub async fn execute(args: DoctorArgs, config_path: Option<PathBuf>) -> Result<()> {
    let mut report = DoctorReport {
        config: CheckResult::error("Not checked"),
        catalog: CheckResult::error("Not checked"),
        partitions: CheckResult::error("Not checked"),
        facebook: CheckResult::error("Not checked"),
        instagram: CheckResult::error("Not checked"),
        threads: CheckResult::error("Not checked"),
        publishing: CheckResult::error("Not checked"),
        overall: "error".to_string(),
    };

    let config = match AppConfig::load(config_path.as_deref()) {
        Ok(c) => {
            report.config = CheckResult::ok("Configuration loaded successfully");
            Some(c)
        }
        Err(e) => {
            report.config = CheckResult::error(format!("Failed to load config: {:#}", e));
            None
        }
    };

    if let Some(ref config) = config {
        report.catalog = check_catalog(config);
        report.partitions = check_partitions(config).await;

        let facebook = PlatformCheck::new(
            &config.facebook.page_id,
            &config.facebook.access_token_env,
            "page_id",
        );
        let instagram = PlatformCheck::new(
            &config.instagram.account_id,
            &config.instagram.access_token_env,
            "account_id",
        );
        let threads = PlatformCheck::new(
            &config.threads.user_id,
            &config.threads.access_token_env,
            "user_id",
        );

        let ready = [&facebook, &instagram, &threads]
            .iter()
            .filter(|c| c.is_ready())
            .count();

        report.facebook = facebook.result();
        report.instagram = instagram.result();
        report.threads = threads.result();

        report.publishing = if config.publish.stub {
            CheckResult::warn("Stub publishers enabled; nothing will be posted")
        } else if ready == 0 {
            CheckResult::error("No platform is fully configured")
        } else {
            CheckResult::ok(format!("{} of 3 platforms ready", ready)).with_details(
                serde_json::json!({
                    "dry_run": config.general.dry_run,
                    "stories": config.publish.stories,
                    "default_platforms": config.publish.default_platforms,
                }),
            )
        };
    }

    let checks = [
        &report.config,
        &report.catalog,
        &report.partitions,
        &report.publishing,
    ];

    let has_error = checks.iter().any(|c| c.status == "error");
    let all_ok = checks.iter().all(|c| c.status == "ok");

    report.overall = if has_error {
        "error".to_string()
    } else if all_ok {
        "ok".to_string()
    } else {
        "warn".to_string()
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    if report.overall == "error" {
        std::process::exit(1);
    }

    Ok(())
}

fn check_catalog(config: &AppConfig) -> CheckResult {
    let catalog = &config.catalog;
    match catalog.provider.as_str() {
        "shopify" => {
            if catalog.store_url.trim().is_empty() {
                return CheckResult::error("catalog.store_url is empty");
            }
            if catalog.access_token_env.is_empty() {
                return CheckResult::error("No Shopify token env var configured");
            }
            match std::env::var(&catalog.access_token_env) {
                Ok(val) if !val.is_empty() => CheckResult::ok(format!(
                    "Shopify: {}, token: {} (set)",
                    catalog.store_url, catalog.access_token_env
                )),
                _ => CheckResult::error(format!(
                    "Shopify: {}, token: {} (not set)",
                    catalog.store_url, catalog.access_token_env
                )),
            }
        }
        "fixture" => {
            let path = &catalog.fixture_path;
            if path.is_file() {
                CheckResult::ok(format!("Fixture catalog: {}", path.display()))
            } else {
                CheckResult::error(format!("Fixture catalog not found: {}", path.display()))
            }
        }
        other => CheckResult::error(format!("Unknown catalog provider: {}", other)),
    }
}

async fn check_partitions(config: &AppConfig) -> CheckResult {
    if config.partitions.is_empty() {
        return CheckResult::error("No partitions configured");
    }

    let empty: Vec<&str> = config
        .partitions
        .iter()
        .filter(|p| p.collections.is_empty())
        .map(|p| p.name.as_str())
        .collect();
    if !empty.is_empty() {
        return CheckResult::warn(format!(
            "Partitions without collections: {}",
            empty.join(", ")
        ));
    }

    // Only the fixture catalog is read here; Shopify stats need network access
    if config.catalog.provider != "fixture" {
        return CheckResult::ok(format!("{} partitions", config.partitions.len()));
    }

    let selector = match build_selector(config).await {
        Ok(s) => s,
        Err(e) => return CheckResult::error(format!("{:#}", e)),
    };
    match selector.stats().await {
        Ok(stats) => CheckResult::ok(format!("{} partitions", stats.len()))
            .with_details(serde_json::json!(stats)),
        Err(e) => CheckResult::error(format!("Failed to read rotation stats: {}", e)),
    }
}

struct PlatformCheck<'a> {
    account_id: &'a str,
    env_var: &'a str,
    id_field: &'static str,
    token_set: bool,
}

impl<'a> PlatformCheck<'a> {
    fn new(account_id: &'a str, env_var: &'a str, id_field: &'static str) -> Self {
        let token_set = !env_var.is_empty()
            && std::env::var(env_var)
                .map(|v| !v.is_empty())
                .unwrap_or(false);
        Self {
            account_id,
            env_var,
            id_field,
            token_set,
        }
    }

    fn is_ready(&self) -> bool {
        !self.account_id.trim().is_empty() && self.token_set
    }

    fn result(&self) -> CheckResult {
        if self.account_id.trim().is_empty() {
            return CheckResult::warn(format!("Not configured ({} is empty)", self.id_field));
        }
        let state = if self.token_set { "set" } else { "not set" };
        let message = format!(
            "{}: {}, token: {} ({})",
            self.id_field, self.account_id, self.env_var, state
        );
        if self.token_set {
            CheckResult::ok(message)
        } else {
            CheckResult::warn(message)
        }
    }
}

fn print_report(report: &DoctorReport) {
    println!("shopcast Doctor Report");
    println!("======================");
    println!();

    print_check("Config", &report.config);
    print_check("Catalog", &report.catalog);
    print_check("Partitions", &report.partitions);
    print_check("Facebook", &report.facebook);
    print_check("Instagram", &report.instagram);
    print_check("Threads", &report.threads);
    print_check("Publishing", &report.publishing);

    println!();
    println!(
        "{} Overall: {}",
        status_symbol(&report.overall),
        report.overall.to_uppercase()
    );

    if report.overall == "ok" {
        println!();
        println!("Ready to run! Try: shopcast post --dry-run");
    }
}

fn print_check(name: &str, result: &CheckResult) {
    println!("{} {}: {}", result.symbol(), name, result.message);
}
