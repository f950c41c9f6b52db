//! CLI entry point for local inspection of the wallet core.
//!
//! # Responsibility
//! - Verify `walletpass_core` linkage (`ping`, `version`).
//! - Print field catalogs and starter templates as JSON for editors.
//! - Check that a wallet database opens and migrates cleanly.

use std::process::ExitCode;
use walletpass_core::schema::{fields_for, instance_fields_for, template_for};
use walletpass_core::ClassType;

const USAGE: &str = "usage: walletpass_cli [ping | fields <type> | instance-fields <type> | template <type> [path=value ...] | db-check <path>]";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match run(&args) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(message) => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<String, String> {
    let command = args.first().map(String::as_str).unwrap_or("ping");
    match command {
        "ping" | "version" => Ok(format!(
            "walletpass_core ping={} version={}",
            walletpass_core::ping(),
            walletpass_core::core_version()
        )),
        "fields" => to_json(&fields_for(class_type_arg(args)?)),
        "instance-fields" => to_json(&instance_fields_for(class_type_arg(args)?)),
        "template" => {
            let class_type = class_type_arg(args)?;
            let overrides = args[2..]
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .ok_or_else(|| format!("override `{pair}` must look like path=value"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            to_json(&template_for(class_type, &overrides))
        }
        "db-check" => {
            let path = args.get(1).ok_or_else(|| USAGE.to_string())?;
            let conn = walletpass_core::open_db(path).map_err(|err| err.to_string())?;
            walletpass_core::health_check(&conn).map_err(|err| err.to_string())?;
            Ok(format!("db={path} status=ok"))
        }
        _ => Err(USAGE.to_string()),
    }
}

fn class_type_arg(args: &[String]) -> Result<ClassType, String> {
    let raw = args.get(1).ok_or_else(|| USAGE.to_string())?;
    ClassType::parse(raw).ok_or_else(|| format!("unknown pass type `{raw}`"))
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|err| err.to_string())
}
