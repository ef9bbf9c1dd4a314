//! QMS CLI: administer plans and subscriptions and record usage.
//!
//! Reads DATABASE_URL and the other settings from the environment (or `.env`).

use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use qms_cli::{init_tracing, parse_datetime, report_error, QuotaArg};
use qms_core::models::{NewPlanQuotaDefault, NewPlanRate, NewResourceType, SubscriptionOptions};
use qms_core::{Config, QuotaStore, TransactionContext};
use qms_db::{connect, migrate, PgQuotaStore};
use qms_services::{
    AddonService, CatalogService, NewAddonRequest, NewPlanRequest, OverageService,
    ResourceTypeRef, SubscriptionService, UsageLedger,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "qms", about = "Subscription and quota accounting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Register a resource type
    AddResourceType {
        #[arg(long)]
        name: String,
        #[arg(long)]
        unit: String,
        /// Quota scales with the number of periods purchased
        #[arg(long)]
        consumable: bool,
    },
    /// List resource types
    ResourceTypes,
    /// Create a plan with its quota defaults and an initial rate
    AddPlan {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Quota default as name:unit=value, repeatable
        #[arg(long = "quota")]
        quotas: Vec<QuotaArg>,
        /// Initial rate, effective immediately
        #[arg(long)]
        rate: Option<Decimal>,
    },
    /// Add a rate to a plan's history
    AddRate {
        /// Plan name
        #[arg(long)]
        plan: String,
        #[arg(long)]
        rate: Decimal,
        /// YYYY-MM-DD or RFC 3339; defaults to now
        #[arg(long)]
        effective: Option<String>,
    },
    /// List plans with their defaults and rates
    Plans,
    /// Subscribe a user to a plan, creating the user if needed
    Subscribe {
        /// Username
        #[arg(long)]
        user: String,
        /// Plan name
        #[arg(long)]
        plan: String,
        #[arg(long)]
        periods: Option<i32>,
        #[arg(long)]
        paid: bool,
        /// YYYY-MM-DD or RFC 3339; defaults to one year from now
        #[arg(long)]
        end: Option<String>,
    },
    /// Show the user's active subscription
    Active {
        /// Username
        #[arg(long)]
        user: String,
    },
    /// Show a subscription with quotas, usages and add-ons
    Details {
        subscription: Uuid,
    },
    /// Apply a usage update (ADD or SET)
    Usage {
        #[arg(long)]
        subscription: Uuid,
        /// Resource type name
        #[arg(long)]
        resource: String,
        /// Resource type unit
        #[arg(long)]
        unit: String,
        #[arg(long, default_value = "ADD")]
        op: String,
        #[arg(long, allow_hyphen_values = true)]
        amount: f64,
    },
    /// Report usage against quota for a subscription
    Overages {
        subscription: Uuid,
        /// Only list resource types over quota
        #[arg(long)]
        exceeded: bool,
    },
    /// Add an add-on to the catalog
    AddAddon {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: String,
        /// Resource type name or UUID
        #[arg(long)]
        resource_type: String,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        unpaid: bool,
    },
    /// List the add-on catalog
    Addons,
    /// Attach an add-on to a subscription
    AttachAddon {
        #[arg(long)]
        subscription: Uuid,
        #[arg(long)]
        addon: Uuid,
        /// Overrides the add-on's default amount
        #[arg(long)]
        amount: Option<f64>,
    },
    /// Remove an add-on from a subscription
    DetachAddon {
        /// Subscription add-on UUID
        id: Uuid,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.validate()?;
    init_tracing(config.log_format);
    tracing::debug!(environment = %config.environment, "Configuration loaded");

    match run(cli, &config).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            eprintln!("Error: {}", report_error(&err));
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let pool = connect(config).await?;
    if let Commands::Migrate = cli.command {
        return migrate(&pool).await;
    }
    let store = PgQuotaStore::new(pool);

    let catalog = CatalogService::new();
    let subscriptions = SubscriptionService::from_config(config);
    let ledger = UsageLedger::from_config(config);
    let addons = AddonService::new();

    match cli.command {
        Commands::Migrate => {}
        Commands::AddResourceType {
            name,
            unit,
            consumable,
        } => {
            let mut ctx = store.autocommit().await?;
            let created = catalog
                .add_resource_type(
                    &mut ctx,
                    NewResourceType {
                        name,
                        unit,
                        consumable,
                    },
                )
                .await?;
            print_json(&created)?;
        }
        Commands::ResourceTypes => {
            let mut ctx = store.autocommit().await?;
            print_json(&catalog.list_resource_types(&mut ctx).await?)?;
        }
        Commands::AddPlan {
            name,
            description,
            quotas,
            rate,
        } => {
            let now = Utc::now();
            let mut tx = store.begin().await?;

            let mut quota_defaults = Vec::with_capacity(quotas.len());
            for quota in quotas {
                let resource_type = catalog
                    .find_resource_type(&mut tx, &quota.name, &quota.unit)
                    .await?
                    .with_context(|| {
                        format!("Unknown resource type {} ({})", quota.name, quota.unit)
                    })?;
                quota_defaults.push(NewPlanQuotaDefault {
                    resource_type_id: resource_type.id,
                    quota_value: quota.value,
                    effective_date: now,
                });
            }
            let rates = rate
                .map(|rate| NewPlanRate {
                    effective_date: now,
                    rate,
                })
                .into_iter()
                .collect();

            let plan = catalog
                .add_plan(
                    &mut tx,
                    NewPlanRequest {
                        name,
                        description,
                        quota_defaults,
                        rates,
                    },
                )
                .await?;
            tx.commit().await?;
            print_json(&plan)?;
        }
        Commands::AddRate {
            plan,
            rate,
            effective,
        } => {
            let effective_date = match effective {
                Some(s) => parse_datetime(&s)?,
                None => Utc::now(),
            };
            let mut tx = store.begin().await?;
            let plan = catalog.find_plan_by_name(&mut tx, &plan).await?;
            let created = catalog
                .add_plan_rate(
                    &mut tx,
                    plan.id,
                    NewPlanRate {
                        effective_date,
                        rate,
                    },
                )
                .await?;
            tx.commit().await?;
            print_json(&created)?;
        }
        Commands::Plans => {
            let mut ctx = store.autocommit().await?;
            print_json(&catalog.list_plans(&mut ctx).await?)?;
        }
        Commands::Subscribe {
            user,
            plan,
            periods,
            paid,
            end,
        } => {
            let defaults = subscriptions.default_options();
            let options = SubscriptionOptions {
                paid,
                periods: periods.unwrap_or(defaults.periods),
                end_date: match end {
                    Some(s) => Some(parse_datetime(&s)?),
                    None => defaults.end_date,
                },
            };

            let mut tx = store.begin().await?;
            let user = subscriptions.ensure_user(&mut tx, &user).await?;
            let plan = catalog.find_plan_by_name(&mut tx, &plan).await?;
            let subscription = subscriptions
                .create_subscription(&mut tx, user.id, plan.id, options)
                .await?;
            tx.commit().await?;
            print_json(&subscription)?;
        }
        Commands::Active { user } => {
            let mut ctx = store.autocommit().await?;
            let user = subscriptions
                .find_user_by_username(&mut ctx, &user)
                .await?
                .with_context(|| format!("Unknown user {}", user))?;
            match subscriptions.get_active_subscription(&mut ctx, user.id).await? {
                Some(subscription) => print_json(&subscription)?,
                None => println!("{} has no active subscription", user.username),
            }
        }
        Commands::Details { subscription } => {
            let mut ctx = store.autocommit().await?;
            print_json(
                &subscriptions
                    .subscription_details(&mut ctx, subscription)
                    .await?,
            )?;
        }
        Commands::Usage {
            subscription,
            resource,
            unit,
            op,
            amount,
        } => {
            let value = ledger
                .apply_usage_update_with_retry(
                    &store,
                    config.usage_update_max_attempts,
                    subscription,
                    &resource,
                    &unit,
                    &op,
                    amount,
                )
                .await?;
            println!("{} {} = {}", resource, unit, value);
        }
        Commands::Overages {
            subscription,
            exceeded,
        } => {
            let mut ctx = store.autocommit().await?;
            let mut overages = OverageService::new()
                .list_overages(&mut ctx, subscription)
                .await?;
            if exceeded {
                overages.retain(|o| o.is_exceeded());
            }
            print_json(&overages)?;
        }
        Commands::AddAddon {
            name,
            description,
            resource_type,
            amount,
            unpaid,
        } => {
            let resource_type = match resource_type.parse::<Uuid>() {
                Ok(id) => ResourceTypeRef::Id(id),
                Err(_) => ResourceTypeRef::Name(resource_type),
            };
            let mut tx = store.begin().await?;
            let addon = addons
                .add_addon(
                    &mut tx,
                    NewAddonRequest {
                        name,
                        description,
                        resource_type,
                        default_amount: amount,
                        paid: !unpaid,
                    },
                )
                .await?;
            tx.commit().await?;
            print_json(&addon)?;
        }
        Commands::Addons => {
            let mut ctx = store.autocommit().await?;
            print_json(&addons.list_addons(&mut ctx).await?)?;
        }
        Commands::AttachAddon {
            subscription,
            addon,
            amount,
        } => {
            let mut tx = store.begin().await?;
            let attached = addons.attach(&mut tx, subscription, addon, amount).await?;
            tx.commit().await?;
            print_json(&attached)?;
        }
        Commands::DetachAddon { id } => {
            let mut ctx = store.autocommit().await?;
            addons.detach(&mut ctx, id).await?;
            println!("Detached {}", id);
        }
    }

    Ok(())
}
