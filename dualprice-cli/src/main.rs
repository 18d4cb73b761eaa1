//! Command-line front end for the dual-currency annotation engine
//!
//! Thin wrapper over dualprice-core: annotate a JSON payload the way the
//! REST dispatch hook would, inject content into a markup fragment the way
//! the render-block hook would, or convert a raw minor-units amount.

use std::fs;
use std::io::Read;
use std::process;
use std::rc::Rc;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;

use dualprice_core::config::PricingConfig;
use dualprice_core::convert::{Converter, CurrencyFormatter, FixedLocaleFormatter, SymbolPlacement};
use dualprice_core::hooks::default_route_table;
use dualprice_core::markup::inject_before_closing;

mod cli;

use cli::{Cli, Commands, ConvertArgs, MarkupArgs, PayloadArgs};

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    if let Err(error) = run(&cli) {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    match &cli.command {
        Commands::Payload(args) => run_payload(config, args),
        Commands::Markup(args) => run_markup(args),
        Commands::Convert(args) => run_convert(config, args),
    }
}

fn load_config(cli: &Cli) -> Result<PricingConfig> {
    match &cli.config {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            PricingConfig::from_json_str(&raw).context("parsing config")
        }
        None => Ok(PricingConfig::default()),
    }
}

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("reading stdin")?;
        Ok(buffer)
    } else {
        fs::read_to_string(input).with_context(|| format!("reading {}", input))
    }
}

fn secondary_formatter(config: &PricingConfig) -> Rc<dyn CurrencyFormatter> {
    Rc::new(FixedLocaleFormatter::new(config.secondary_marker.clone(), SymbolPlacement::Prefix))
}

fn run_payload(config: PricingConfig, args: &PayloadArgs) -> Result<()> {
    let raw = read_input(&args.input)?;
    let mut payload: serde_json::Value =
        serde_json::from_str(&raw).context("parsing payload JSON")?;

    let rate = config.rate;
    let formatter = secondary_formatter(&config);
    let routes = default_route_table(Rc::new(config), Rc::new(Converter::new(rate)), formatter);
    routes.dispatch(&args.route, &mut payload);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&payload)?
    } else {
        serde_json::to_string(&payload)?
    };
    println!("{}", rendered);
    Ok(())
}

fn run_markup(args: &MarkupArgs) -> Result<()> {
    let fragment = read_input(&args.input)?;
    print!("{}", inject_before_closing(fragment.trim_end(), &args.tag, &args.content));
    println!();
    Ok(())
}

fn run_convert(config: PricingConfig, args: &ConvertArgs) -> Result<()> {
    let rate = match &args.rate {
        Some(raw) => Decimal::from_str(raw).with_context(|| format!("invalid rate {:?}", raw))?,
        None => config.rate,
    };
    let converter = Converter::new(rate);
    let formatter = secondary_formatter(&config);
    match converter.secondary_display(args.amount, formatter.as_ref()) {
        Some(display) => println!("{}", display),
        None => log::debug!("amount {} has no secondary display", args.amount),
    }
    Ok(())
}
