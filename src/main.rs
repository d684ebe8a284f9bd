use anyhow::{anyhow, Context, Result};
use clap::{App, Arg};
use env_logger::Env;
use futures::{pin_mut, StreamExt};
use log::{debug, error, info};
use regex::Regex;
use reqwest::Url;
use std::path::Path;

mod range;
mod report;
mod scanner;
mod transport;

use report::ProbeRecord;
use scanner::{Encoding, Scanner, ScannerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let matches = App::new("cdn_scanner")
        .version("0.1.0")
        .about("Probes backend origins through a misconfigured CloudFront distribution")
        .arg(
            Arg::with_name("cdn")
                .short("c")
                .long("cdn")
                .takes_value(true)
                .required(true)
                .validator(validate_url_prefix)
                .help("Base URL of the distribution to route probes through"),
        )
        .arg(
            Arg::with_name("host")
                .short("H")
                .long("host")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("Host header override sent to every origin (at most one)"),
        )
        .arg(
            Arg::with_name("encoding")
                .short("e")
                .long("encoding")
                .takes_value(true)
                .default_value("header")
                .validator(validate_encoding)
                .help("How the routing fields are carried: \"header\" or \"query\""),
        )
        .arg(
            Arg::with_name("workers")
                .short("w")
                .long("workers")
                .takes_value(true)
                .default_value("10")
                .validator(validate_workers)
                .help("Maximum number of probes in flight"),
        )
        .arg(
            Arg::with_name("output")
                .short("o")
                .long("output")
                .takes_value(true)
                .default_value("table")
                .validator(validate_output),
        )
        .arg(
            Arg::with_name("targets")
                .multiple(true)
                .required(true)
                .help("IPv4 address, CIDR block, hostname, or file with one target per line"),
        )
        .get_matches();

    debug!("{:#?}", matches);

    let endpoint = Url::parse(matches.value_of("cdn").unwrap()).context("parsing --cdn")?;
    let hostnames: Vec<String> = matches
        .values_of("host")
        .map(|values| values.map(str::to_string).collect())
        .unwrap_or_default();
    let encoding: Encoding = matches
        .value_of("encoding")
        .unwrap()
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let workers = matches
        .value_of("workers")
        .unwrap()
        .parse::<usize>()
        .context("parsing --workers")?;
    let output = matches.value_of("output").unwrap();

    let mut targets = Vec::new();
    for arg in matches.values_of("targets").unwrap() {
        collect_targets(arg, &mut targets).await?;
    }
    info!("scanning {} targets through {}", targets.len(), endpoint);

    let scanner = Scanner::new(ScannerConfig {
        endpoint,
        hostnames,
        encoding,
        workers,
    })?;

    let results = scanner.scan(targets);
    pin_mut!(results);

    let mut records = Vec::new();
    while let Some(result) = results.next().await {
        match &result.outcome {
            Ok(response) => info!("{} -> {}", result.origin, response.status),
            Err(err) => error!("{} -> {}", result.origin, err),
        }
        records.push(ProbeRecord::from(&result));
    }

    match output {
        "json" => println!("{}", report::render_json(&records)?),
        _ => {
            report::render_table(&records).printstd();
        }
    }

    Ok(())
}

/// A target argument is either something shaped like an address or range, a
/// file holding one target per line, or a hostname passed through as-is.
async fn collect_targets(arg: &str, targets: &mut Vec<String>) -> Result<()> {
    if looks_like_range(arg) {
        targets.extend(range::expand(arg)?.iter().map(|a| a.to_string()));
    } else if Path::new(arg).is_file() {
        let contents = tokio::fs::read_to_string(arg)
            .await
            .with_context(|| format!("reading targets from {}", arg))?;
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if looks_like_range(line) {
                targets.extend(range::expand(line)?.iter().map(|a| a.to_string()));
            } else {
                targets.push(line.to_string());
            }
        }
    } else {
        targets.push(arg.to_string());
    }

    Ok(())
}

fn looks_like_range(val: &str) -> bool {
    let re = Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}(/\d{1,2})?$").unwrap();
    re.is_match(val)
}

fn validate_url_prefix(val: String) -> Result<(), String> {
    if val.starts_with("http://") || val.starts_with("https://") {
        Ok(())
    } else {
        Err(String::from(
            "the cdn endpoint needs to start with http:// or https://",
        ))
    }
}

fn validate_encoding(val: String) -> Result<(), String> {
    val.parse::<Encoding>().map(|_| ())
}

fn validate_workers(val: String) -> Result<(), String> {
    match val.parse::<usize>() {
        Ok(n) if n > 0 => Ok(()),
        _ => Err(String::from("workers needs to be a positive number")),
    }
}

fn validate_output(val: String) -> Result<(), String> {
    if !val.is_empty() && val.ne("json") && val.ne("table") {
        return Err(String::from(
            "The only allowed formats are \"json\" and \"table\"",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_shapes_are_recognized() {
        assert!(looks_like_range("1.1.1.2"));
        assert!(looks_like_range("10.0.0.0/16"));
        assert!(!looks_like_range("example.com"));
        assert!(!looks_like_range("targets.txt"));
    }

    #[tokio::test]
    async fn hostname_arguments_pass_through() {
        let mut targets = Vec::new();
        collect_targets("origin.example.com", &mut targets)
            .await
            .unwrap();
        assert_eq!(targets, vec!["origin.example.com"]);
    }

    #[tokio::test]
    async fn range_arguments_expand() {
        let mut targets = Vec::new();
        collect_targets("192.168.1.0/30", &mut targets).await.unwrap();
        assert_eq!(
            targets,
            vec!["192.168.1.0", "192.168.1.1", "192.168.1.2", "192.168.1.3"]
        );
    }

    #[tokio::test]
    async fn ip_shaped_garbage_is_rejected_not_treated_as_hostname() {
        let mut targets = Vec::new();
        let result = collect_targets("1.1.1.300", &mut targets).await;
        assert!(result.is_err());
        assert!(targets.is_empty());
    }
}
