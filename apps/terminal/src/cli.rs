//! Argument definitions and the `CODE:NAME:...` item parsers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use tableside_core::{GramRate, ItemSpec, Money, PaymentMethod, StoreScope, Weight};

#[derive(Debug, Parser)]
#[command(name = "tableside", version, about = "Restaurant table sales terminal")]
pub struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Store to operate on (1 or 2); overrides the config
    #[arg(long, global = true)]
    pub store: Option<StoreScope>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List active tables with their status badge and open sale
    Tables,

    /// Seat guests at a free table
    Open {
        /// Table number or id
        table: String,

        /// Operator recorded on the sale; defaults to the configured one
        #[arg(long)]
        operator: Option<String>,
    },

    /// Add items to a table's open sale and finalize it
    Sell(SellArgs),

    /// Mark a table awaiting payment as being cleaned
    Clean {
        /// Table number or id
        table: String,
    },

    /// Free a table that is awaiting payment or being cleaned
    Release {
        /// Table number or id
        table: String,
    },

    /// Insert the demo floor plan into the live database
    Seed,
}

#[derive(Debug, Args)]
pub struct SellArgs {
    /// Table number or id; a free table is opened first
    pub table: String,

    /// Unit-priced line, CODE:NAME:QTY:PRICE_CENTS (repeatable)
    #[arg(long = "item", value_parser = parse_unit_item)]
    pub items: Vec<ItemSpec>,

    /// Weighed line, CODE:NAME:GRAMS:CENTS_PER_KG (repeatable)
    #[arg(long = "weighed", value_parser = parse_weighed_item)]
    pub weighed: Vec<ItemSpec>,

    /// Discount in cents
    #[arg(long, default_value_t = 0)]
    pub discount: i64,

    /// Change handed back, in cents
    #[arg(long, default_value_t = 0)]
    pub change: i64,

    /// cash, pix, credit, debit, voucher or mixed
    #[arg(long, default_value = "cash")]
    pub payment: PaymentMethod,

    #[arg(long)]
    pub customer: Option<String>,

    /// Number of guests
    #[arg(long, default_value_t = tableside_core::DEFAULT_CUSTOMER_COUNT)]
    pub guests: i64,

    #[arg(long)]
    pub notes: Option<String>,
}

impl SellArgs {
    /// Unit lines first, then weighed lines, each in command-line order.
    pub fn all_items(&self) -> impl Iterator<Item = &ItemSpec> {
        self.items.iter().chain(self.weighed.iter())
    }
}

/// Splits `CODE:NAME:A:B`. The name may itself contain colons.
fn split_item(raw: &str) -> Result<(String, String, i64, i64), String> {
    let mut tail = raw.rsplitn(3, ':');
    let second = tail.next();
    let first = tail.next();
    let head = tail.next();

    let (head, first, second) = match (head, first, second) {
        (Some(h), Some(f), Some(s)) => (h, f, s),
        _ => return Err(format!("expected CODE:NAME:A:B, got '{}'", raw)),
    };

    let (code, name) = head
        .split_once(':')
        .ok_or_else(|| format!("expected CODE:NAME:A:B, got '{}'", raw))?;

    let first = first
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a whole number", first))?;
    let second = second
        .trim()
        .parse::<i64>()
        .map_err(|_| format!("'{}' is not a whole number", second))?;

    Ok((code.trim().to_string(), name.trim().to_string(), first, second))
}

/// `CODE:NAME:QTY:PRICE_CENTS`
pub fn parse_unit_item(raw: &str) -> Result<ItemSpec, String> {
    let (code, name, quantity, cents) = split_item(raw)?;
    Ok(ItemSpec::unit(code, name, quantity, Money::from_cents(cents)))
}

/// `CODE:NAME:GRAMS:CENTS_PER_KG`
pub fn parse_weighed_item(raw: &str) -> Result<ItemSpec, String> {
    let (code, name, grams, cents_per_kg) = split_item(raw)?;
    Ok(ItemSpec::weighed(
        code,
        name,
        Weight::from_grams(grams),
        GramRate::from_price_per_kg(Money::from_cents(cents_per_kg)),
    ))
}
