mod generate;
mod serve;

use std::path::PathBuf;

use anyhow::Result;
use console::style;

use crate::core::pipeline::CATALOG;
use crate::core::terminal::{self, GuideSection, print_error};


const DEFAULT_API_PORT: u16 = 17980;

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Server")
        .command("serve", "Start the HTTP API (--api-host, --api-port)")
        .print();

    GuideSection::new("Generation")
        .command("generate", "Generate a deck from --prompt and print or save it")
        .command("frameworks", "List the narrative frameworks")
        .print();

    GuideSection::new("Options")
        .command("--config <file>", "Config file (default: ./slidesmith.toml)")
        .command("--type <type>", "business, technical, process, transformation, pov, custom")
        .command("--slides <n>", "Number of slides, 3 to 30")
        .command("--audience <text>", "Who the deck is for")
        .command("--tone <tone>", "professional, conversational, technical, executive")
        .command("--format <fmt>", "json or markdown")
        .command("--out <file>", "Write the deck to a file instead of stdout")
        .command("--verbose", "Show pipeline logs while generating")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("slidesmith").green()
    );
}

/// Value of `--config` anywhere after `start`.
pub(crate) fn parse_config_flag(args: &[String], start: usize) -> Option<PathBuf> {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    return Some(PathBuf::from(&args[i + 1]));
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    None
}

pub(crate) fn parse_api_server_flags(
    args: &[String],
    start: usize,
    mut api_host: String,
    mut api_port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--api-port" => {
                if i + 1 < args.len() {
                    api_port = args[i + 1].parse().unwrap_or(DEFAULT_API_PORT);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--api-host" => {
                if i + 1 < args.len() {
                    api_host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (api_host, api_port)
}

fn print_frameworks() {
    for framework in CATALOG.iter() {
        terminal::print_step(&format!("{} ({})", framework.name, framework.id));
        println!("   {}", style(framework.description).dim());
        let steps: Vec<&str> = framework.steps.iter().map(|s| s.label).collect();
        terminal::print_status("Steps", &steps.join(" > "));
        terminal::print_status("Best for", &framework.best_for.join(", "));
        println!();
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cmd) = args.get(1) else {
        print_help();
        return Ok(());
    };

    match cmd.as_str() {
        "serve" => serve::run(&args).await,
        "generate" => {
            let parsed = generate::parse_generate_args(&args, 2);
            if parsed.prompt.trim().is_empty() {
                print_error("Error: --prompt is required for generate.");
                print_help();
                return Ok(());
            }
            generate::run(parsed, parse_config_flag(&args, 2)).await
        }
        "frameworks" => {
            print_frameworks();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        other => {
            print_error(&format!("Unknown command '{}'.", other));
            print_help();
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{parse_api_server_flags, parse_config_flag};
    use std::path::PathBuf;

    fn argv(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_api_server_flags_reads_host_and_port() {
        let args = argv(&[
            "slidesmith",
            "serve",
            "--api-host",
            "0.0.0.0",
            "--api-port",
            "19000",
        ]);
        let (host, port) = parse_api_server_flags(&args, 2, "127.0.0.1".to_string(), 17980);
        assert_eq!(host, "0.0.0.0");
        assert_eq!(port, 19000);
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        let args = argv(&["slidesmith", "serve", "--api-port", "http"]);
        let (host, port) = parse_api_server_flags(&args, 2, "localhost".to_string(), 1);
        assert_eq!(host, "localhost");
        assert_eq!(port, 17980);
    }

    #[test]
    fn config_flag_is_found_anywhere() {
        let args = argv(&["slidesmith", "serve", "--api-port", "1", "--config", "deck.toml"]);
        assert_eq!(parse_config_flag(&args, 2), Some(PathBuf::from("deck.toml")));
        assert_eq!(parse_config_flag(&argv(&["slidesmith", "serve", "--config"]), 2), None);
    }
}
