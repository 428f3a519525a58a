#![deny(warnings)]

//! Headless storefront CLI for pricing carts against the discount catalog.

mod config;

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use config::ShopConfig;
use persistence::JsonStore;
use rust_decimal::Decimal;
use shop_core::{validate_cart, Cart, CustomerId, OrderId, OrderRecord};
use shop_pricing::{redeem, DiscountEngine, PricingContext, Quote};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
usage: shop <command> [flags]

commands:
  quote     --cart FILE [--code CODE] [--customer ID] [--shipping AMOUNT]
            [--at DATETIME] [--json] [--commit [--order-id ID]]
  check     --code CODE --cart FILE [--customer ID] [--shipping AMOUNT] [--at DATETIME]
  list      print the discount catalog
  validate  validate every store file

global flags:
  --config FILE   settings file (default: ./shop.yaml when present)
  --data DIR      data directory, overrides the config
  --version";

#[derive(Debug, Default, PartialEq)]
struct Args {
    command: Option<String>,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    cart: Option<PathBuf>,
    code: Option<String>,
    customer: Option<u64>,
    shipping: Option<Decimal>,
    at: Option<NaiveDateTime>,
    order_id: Option<u64>,
    commit: bool,
    json: bool,
    version: bool,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
    let mut out = Args::default();
    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().with_context(|| format!("{flag} needs a value"));
        match arg.as_str() {
            "--config" => out.config = Some(value("--config")?.into()),
            "--data" => out.data_dir = Some(value("--data")?.into()),
            "--cart" => out.cart = Some(value("--cart")?.into()),
            "--code" => out.code = Some(value("--code")?),
            "--customer" => {
                out.customer = Some(value("--customer")?.parse().context("--customer")?)
            }
            "--shipping" => {
                let cost: Decimal = value("--shipping")?.parse().context("--shipping")?;
                if cost < Decimal::ZERO {
                    bail!("--shipping must be >= 0, got {cost}");
                }
                out.shipping = Some(cost)
            }
            "--at" => {
                out.at = Some(shop_core::timestamp::parse(&value("--at")?).context("--at")?)
            }
            "--order-id" => {
                out.order_id = Some(value("--order-id")?.parse().context("--order-id")?)
            }
            "--commit" => out.commit = true,
            "--json" => out.json = true,
            "--version" | "-V" => out.version = true,
            s if s.starts_with('-') => bail!("unknown flag {s}\n\n{USAGE}"),
            s if out.command.is_none() => out.command = Some(s.to_string()),
            s => bail!("unexpected argument {s}\n\n{USAGE}"),
        }
    }
    Ok(out)
}

fn load_cart(args: &Args) -> Result<Cart> {
    let path = args.cart.as_ref().context("--cart is required")?;
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let cart: Cart =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    validate_cart(&cart)?;
    Ok(cart)
}

fn print_quote(out: &mut impl Write, cfg: &ShopConfig, quote: &Quote) -> Result<()> {
    writeln!(
        out,
        "Cart | items: {} | subtotal: {}",
        quote.item_count,
        cfg.money(quote.subtotal)
    )?;
    for a in &quote.applied {
        writeln!(
            out,
            "  - {} [{}{}] p{}: -{}",
            a.code,
            a.kind,
            if a.auto_applied { ", auto" } else { "" },
            a.priority,
            cfg.money(a.amount)
        )?;
    }
    if let Some(r) = &quote.rejected_code {
        writeln!(out, "  ! {}: {}", r.code, r.message)?;
    }
    writeln!(
        out,
        "Total | discount: {} | shipping: {} | total: {}",
        cfg.money(quote.discount_total),
        cfg.money(quote.shipping),
        cfg.money(quote.total)
    )?;
    Ok(())
}

fn run(args: Args, out: &mut impl Write) -> Result<()> {
    let mut cfg = ShopConfig::load(args.config.as_deref())?;
    if let Some(dir) = &args.data_dir {
        cfg.data_dir = dir.clone();
    }
    let store = JsonStore::open(&cfg.data_dir)?;
    let mut snap = store.load()?;

    let now = args.at.unwrap_or_else(|| chrono::Local::now().naive_local());
    let customer = match args.customer {
        Some(id) => Some(
            snap.customer(CustomerId(id))
                .cloned()
                .with_context(|| format!("unknown customer {id}"))?,
        ),
        None => None,
    };
    let mut ctx =
        PricingContext::guest(now).with_shipping(args.shipping.unwrap_or(cfg.shipping_cost));
    if let Some(c) = &customer {
        ctx = ctx.with_customer(c);
    }

    match args.command.as_deref() {
        Some("quote") => {
            let cart = load_cart(&args)?;
            let quote = DiscountEngine::new(&snap.catalog, &snap).quote(
                &cart,
                args.code.as_deref(),
                &ctx,
            );
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&quote)?)?;
            } else {
                print_quote(out, &cfg, &quote)?;
            }
            if args.commit {
                let order_id = args.order_id.map(OrderId).unwrap_or_else(|| snap.next_order_id());
                if snap.orders.iter().any(|o| o.id == order_id) {
                    bail!("order {} already exists", order_id.0);
                }
                let customer_id = customer.as_ref().map(|c| c.id);
                let usages = redeem(&mut snap.catalog, &quote, customer_id, order_id, now)?;
                let order = OrderRecord {
                    id: order_id,
                    customer_id,
                    total: quote.total,
                    created_at: now,
                };
                store.record_redemption(&mut snap, order, usages)?;
                info!(order = order_id.0, "order committed");
                writeln!(out, "Committed order {}", order_id.0)?;
            }
        }
        Some("check") => {
            let cart = load_cart(&args)?;
            let code = args.code.as_deref().context("--code is required")?;
            let v = DiscountEngine::new(&snap.catalog, &snap).validate_code(code, &cart, &ctx);
            if args.json {
                writeln!(out, "{}", serde_json::to_string_pretty(&v)?)?;
            } else if v.valid {
                writeln!(out, "{} OK | {} | -{}", v.code, v.message, cfg.money(v.amount))?;
            } else {
                writeln!(out, "{} rejected | {}", v.code, v.message)?;
            }
        }
        Some("list") => {
            for d in snap.catalog.iter() {
                writeln!(
                    out,
                    "{:<16} {:<14} p{:<4} {}{}{} used {}/{}",
                    d.code.as_str(),
                    d.kind.label(),
                    d.priority,
                    if d.active { "active" } else { "inactive" },
                    if d.auto_apply { " auto" } else { "" },
                    if d.combinable { " combinable" } else { "" },
                    d.used_count,
                    if d.max_uses == 0 {
                        "∞".to_string()
                    } else {
                        d.max_uses.to_string()
                    }
                )?;
            }
        }
        Some("validate") => {
            // load() already validated the catalog
            writeln!(
                out,
                "Store OK | discounts: {} | customers: {} | orders: {} | usage rows: {}",
                snap.catalog.len(),
                snap.customers.len(),
                snap.orders.len(),
                snap.usage.len()
            )?;
        }
        Some(other) => bail!("unknown command {other}\n\n{USAGE}"),
        None => bail!("missing command\n\n{USAGE}"),
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.version {
        println!(
            "shop {} ({} {})",
            env!("CARGO_PKG_VERSION"),
            env!("GIT_SHA"),
            env!("BUILD_DATE")
        );
        return Ok(());
    }

    // Logging setup
    let cfg_log = ShopConfig::load(args.config.as_deref())
        .map(|c| c.log)
        .unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg_log));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(command = ?args.command, "starting CLI");
    run(args, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_quote_flags() {
        let a = args(&[
            "quote",
            "--cart",
            "cart.json",
            "--code",
            "summer",
            "--customer",
            "12",
            "--shipping",
            "4.99",
            "--at",
            "2024-06-01 10:00:00",
            "--commit",
        ])
        .unwrap();
        assert_eq!(a.command.as_deref(), Some("quote"));
        assert_eq!(a.cart, Some(PathBuf::from("cart.json")));
        assert_eq!(a.code.as_deref(), Some("summer"));
        assert_eq!(a.customer, Some(12));
        assert_eq!(a.shipping, Some(Decimal::new(499, 2)));
        assert!(a.at.is_some());
        assert!(a.commit);
        assert!(!a.json);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&["quote", "--customer", "abc"]).is_err());
        assert!(args(&["quote", "--cart"]).is_err());
        assert!(args(&["quote", "--bogus"]).is_err());
        assert!(args(&["quote", "list"]).is_err());
        assert!(args(&["quote", "--shipping", "-1"]).is_err());
        assert!(args(&["quote", "--shipping", "0"]).is_ok());
    }

    #[test]
    fn quote_and_commit_against_store() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(persistence::DISCOUNTS_FILE),
            r#"[
                {"code": "LIMITED", "type": "percentage", "value": 20, "auto_apply": true,
                 "combinable": true, "priority": 10, "max_uses": 1},
                {"code": "TENOFF", "type": "fixed", "value": 10, "combinable": true, "priority": 5}
            ]"#,
        )
        .unwrap();
        let cart_path = dir.path().join("cart.json");
        std::fs::write(
            &cart_path,
            r#"{"items": [{"product_id": 1, "unit_price": "100.00", "quantity": 1}]}"#,
        )
        .unwrap();

        let base = |extra: &[&str]| {
            let mut v = vec![
                "quote".to_string(),
                "--data".to_string(),
                dir.path().display().to_string(),
                "--cart".to_string(),
                cart_path.display().to_string(),
                "--code".to_string(),
                "tenoff".to_string(),
                "--at".to_string(),
                "2024-01-01 00:00:00".to_string(),
            ];
            v.extend(extra.iter().map(|s| s.to_string()));
            parse_args(v).unwrap()
        };

        run(base(&["--commit"]), &mut Vec::new()).unwrap();
        let snap = JsonStore::open(dir.path()).unwrap().load().unwrap();
        assert_eq!(snap.orders.len(), 1);
        assert_eq!(snap.orders[0].total, Decimal::new(70, 0));
        assert_eq!(snap.usage.len(), 2);
        assert_eq!(snap.catalog.find("limited").map(|d| d.used_count), Some(1));

        // LIMITED is now exhausted; only the manual code applies
        run(base(&["--commit", "--order-id", "5"]), &mut Vec::new()).unwrap();
        let snap = JsonStore::open(dir.path()).unwrap().load().unwrap();
        assert_eq!(snap.orders.len(), 2);
        assert_eq!(snap.orders[1].id, OrderId(5));
        assert_eq!(snap.orders[1].total, Decimal::new(90, 0));
        assert!(run(base(&["--commit", "--order-id", "5"]), &mut Vec::new()).is_err());
    }

    fn sample_store() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(persistence::DISCOUNTS_FILE),
            r#"[
                {"code": "HALF", "type": "percentage", "value": 50, "min_purchase": 80},
                {"code": "SHIPFREE", "type": "free_shipping", "auto_apply": true,
                 "combinable": true, "max_uses": 10}
            ]"#,
        )
        .unwrap();
        let cart = dir.path().join("cart.json");
        std::fs::write(
            &cart,
            r#"{"items": [{"product_id": 3, "unit_price": "25.00", "quantity": 2}]}"#,
        )
        .unwrap();
        (dir, cart)
    }

    fn output(dir: &tempfile::TempDir, list: &[&str]) -> String {
        let mut v = vec!["--data".to_string(), dir.path().display().to_string()];
        v.extend(list.iter().map(|s| s.to_string()));
        let mut out = Vec::new();
        run(parse_args(v).unwrap(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn list_prints_every_discount() {
        let (dir, _) = sample_store();
        let text = output(&dir, &["list"]);
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains("HALF"));
        assert!(text.contains("SHIPFREE") && text.contains("used 0/10"));
    }

    #[test]
    fn check_reports_minimum_purchase() {
        let (dir, cart) = sample_store();
        let cart = cart.to_str().unwrap();
        let text = output(&dir, &["check", "--code", "HALF", "--cart", cart]);
        assert!(text.starts_with("HALF rejected"), "{text}");
        assert!(text.contains("minimum purchase"));

        let text = output(
            &dir,
            &["check", "--code", "shipfree", "--cart", cart, "--shipping", "4.5"],
        );
        assert!(text.starts_with("SHIPFREE OK"), "{text}");
    }

    #[test]
    fn quote_json_is_machine_readable() {
        let (dir, cart) = sample_store();
        let cart = cart.to_str().unwrap();
        let text = output(
            &dir,
            &[
                "quote",
                "--cart",
                cart,
                "--shipping",
                "5",
                "--at",
                "2024-01-01 00:00:00",
                "--json",
            ],
        );
        let v: serde_json::Value = serde_json::from_str(&text).unwrap();
        let money = |key: &str| v[key].as_str().and_then(|s| s.parse::<Decimal>().ok());
        assert_eq!(money("subtotal"), Some(Decimal::new(50, 0)));
        assert_eq!(money("shipping"), Some(Decimal::new(5, 0)));
        assert_eq!(money("total"), Some(Decimal::new(50, 0)));
        assert_eq!(v["applied"][0]["code"], "SHIPFREE");
    }
}
