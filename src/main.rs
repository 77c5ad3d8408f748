use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use storefront::api::ApiError;
use storefront::config::Config;
use storefront::controllers::{CartTotals, ProductQuery};
use storefront::logging::init_tracing;
use storefront::{Resource, Storefront};

#[derive(Parser, Debug)]
#[command(name = "storefront", version, about = "Command-line client for the storefront API")]
struct Cli {
    /// Config file (default: ~/.config/storefront/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session token
    Login {
        #[arg(long)]
        email: String,
        /// Falls back to STOREFRONT_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List products
    Products {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        category: Option<u64>,
    },
    /// Show the cart and its totals
    Cart,
    /// List orders
    Orders {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 10)]
        page_size: u32,
    },
    /// Print push events until interrupted
    Listen {
        /// Only print these event names (repeatable)
        #[arg(long = "event")]
        events: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            let mut config = Config::load_from(path)?;
            config.apply_env_overrides();
            config
        }
        None => Config::load()?,
    };
    let app = Storefront::with_session_file(config).context("Failed to initialise client")?;

    match cli.command {
        Command::Login { email, password } => {
            let password = match password.or_else(|| std::env::var("STOREFRONT_PASSWORD").ok()) {
                Some(password) => password,
                None => bail!("--password or STOREFRONT_PASSWORD is required"),
            };
            let role = settle(app.auth().login(&email, &password).await)?;
            println!("Signed in as {} ({:?})", email, role);
        }
        Command::Logout => {
            app.auth().logout();
            println!("Signed out");
        }
        Command::Whoami => {
            let auth = app.auth();
            if !auth.is_authenticated() {
                bail!("Not signed in");
            }
            let profile = settle(auth.load_profile().await)?;
            println!(
                "{} <{}> role={}",
                profile.full_name.as_deref().unwrap_or("-"),
                profile.email,
                profile.role.as_deref().unwrap_or("-")
            );
        }
        Command::Products {
            page,
            page_size,
            search,
            category,
        } => {
            let products = app.products();
            let page = settle(
                products
                    .load(ProductQuery {
                        page,
                        page_size,
                        search,
                        category_id: category,
                    })
                    .await,
            )?;
            for product in &page.items {
                let price = match product.sale_price {
                    Some(sale) => format!("{:.2} (was {:.2})", sale, product.price),
                    None => format!("{:.2}", product.price),
                };
                println!("{:>6}  {:<40}  {}", product.id, product.name, price);
            }
            println!(
                "page {}/{} ({} products)",
                page.pagination.current_page, page.pagination.total_pages, page.pagination.total_items
            );
        }
        Command::Cart => {
            let cart = app.cart();
            let contents = settle(cart.load().await)?;
            for item in &contents.items {
                println!(
                    "{:>3} x {:<40} {:>10.2}",
                    item.quantity,
                    item.product_name,
                    item.line_total()
                );
            }
            let totals = cart
                .totals()
                .unwrap_or_else(|| CartTotals::compute(&contents.items, 0.0, 0.0));
            println!("subtotal {:.2}  total {:.2}", totals.subtotal, totals.total);
        }
        Command::Orders { page, page_size } => {
            let orders = app.orders();
            let page = settle(orders.load(page, page_size).await)?;
            for order in &page.items {
                println!(
                    "{:>6}  {:<12}  {:>10.2}  {}",
                    order.id,
                    order.status,
                    order.total_amount,
                    order.created_at.as_deref().unwrap_or("")
                );
            }
        }
        Command::Listen { events } => listen(&app, &events).await?,
    }

    Ok(())
}

/// Turn a settled resource into the data or a user-facing error.
fn settle<T>(resource: Resource<T>) -> Result<T> {
    match resource {
        Resource::Success(data) => Ok(data),
        Resource::Error(err) => Err(describe(err)),
        Resource::Loading => bail!("request did not complete"),
    }
}

fn describe(err: ApiError) -> anyhow::Error {
    if err.requires_login() {
        anyhow::anyhow!("{} (run `storefront login`)", err.user_message())
    } else {
        anyhow::anyhow!(err.user_message())
    }
}

async fn listen(app: &Storefront, filter: &[String]) -> Result<()> {
    let connection = app.connection().clone();
    let mut events = connection.events();
    let mut closed = connection.closed_events();
    let supervisor = app.hub().supervise();

    connection
        .start()
        .await
        .context("Failed to connect to the push channel")?;
    eprintln!("Listening, press Ctrl-C to stop");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => {
                    if filter.is_empty() || filter.iter().any(|name| name.eq_ignore_ascii_case(&event.name)) {
                        println!("{} {}", event.name, serde_json::Value::Array(event.arguments));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Output fell behind, events skipped");
                }
                Err(RecvError::Closed) => break,
            },
            lost = closed.recv() => {
                if let Ok(lost) = lost {
                    if supervisor.is_none() {
                        bail!("Connection closed: {}", lost.error.unwrap_or_else(|| "no reason given".to_string()));
                    }
                    eprintln!("Connection lost, reconnecting");
                }
            }
        }
    }

    connection.stop().await;
    Ok(())
}
