mod input;
mod report;

use std::path::{Path, PathBuf};
use std::process;

use bridge_eval::{CaseMode, RuleEvaluator};
use bridge_parser::{Config, parse_config, parse_config_file, parse_rule};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use input::{RuleSource, decode_base64, decode_rule_sources, read_rule_sources};
use report::{Report, output_file_name, render_plain};

#[derive(Parser)]
#[command(name = "bridge")]
#[command(about = "Translate Sigma detection rules into Splunk search queries")]
#[command(version)]
struct Cli {
    /// Sigma rule file or directory of rules
    #[arg(value_name = "FILEPATH", conflicts_with_all = ["filepath", "filecontent"])]
    rules_arg: Option<PathBuf>,

    /// Backend configuration file
    #[arg(value_name = "CONFIG", conflicts_with_all = ["config", "configcontent"])]
    config_arg: Option<PathBuf>,

    /// Sigma rule file or directory of rules
    #[arg(long, conflicts_with = "filecontent")]
    filepath: Option<PathBuf>,

    /// Backend configuration file
    #[arg(long, conflicts_with = "configcontent")]
    config: Option<PathBuf>,

    /// Base64-encoded rule; several rules may be given one per line
    #[arg(long)]
    filecontent: Option<String>,

    /// Base64-encoded backend configuration
    #[arg(long)]
    configcontent: Option<String>,

    /// Emit a JSON report per rule instead of plain queries
    #[arg(long)]
    json: bool,

    /// Write each rule's output to <DIR>/<title>.json
    #[arg(long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Keep the case of values instead of lower-casing them
    #[arg(long)]
    cs: bool,
}

impl Cli {
    fn rule_sources(&self) -> Option<Vec<RuleSource>> {
        if let Some(path) = self.rules_arg.as_ref().or(self.filepath.as_ref()) {
            return match read_rule_sources(path) {
                Ok(sources) => Some(sources),
                Err(e) => {
                    eprintln!("Error reading rules from {}: {e}", path.display());
                    process::exit(1);
                }
            };
        }
        self.filecontent.as_deref().map(decode_rule_sources)
    }

    fn load_config(&self) -> Option<Config> {
        let loaded = if let Some(path) = self.config_arg.as_ref().or(self.config.as_ref()) {
            parse_config_file(path).map_err(|e| format!("{}: {e}", path.display()))
        } else {
            let encoded = self.configcontent.as_deref()?;
            decode_base64(encoded)
                .map_err(|e| e.to_string())
                .and_then(|yaml| parse_config(&yaml).map_err(|e| e.to_string()))
        };

        match loaded {
            Ok(config) => Some(config),
            Err(e) => {
                eprintln!("Error loading config {e}");
                process::exit(1);
            }
        }
    }

    fn case_mode(&self) -> CaseMode {
        if self.cs {
            CaseMode::Sensitive
        } else {
            CaseMode::Insensitive
        }
    }
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let (Some(sources), Some(config)) = (cli.rule_sources(), cli.load_config()) else {
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "provide a rule source (FILEPATH, --filepath or --filecontent) \
                 and a config source (CONFIG, --config or --configcontent)",
            )
            .exit();
    };

    let mut failures = 0usize;
    for source in &sources {
        if let Err(e) = translate_source(&cli, &config, source) {
            eprintln!("Error translating {}: {e}", source.name);
            failures += 1;
        }
    }

    log::debug!("translated {} of {} rule(s)", sources.len() - failures, sources.len());
    if failures > 0 {
        process::exit(1);
    }
}

fn translate_source(
    cli: &Cli,
    config: &Config,
    source: &RuleSource,
) -> Result<(), Box<dyn std::error::Error>> {
    let content = source.content.as_ref().map_err(|e| e.to_string())?;
    let rule = parse_rule(content)?;
    let queries = RuleEvaluator::new(&rule, config, cli.case_mode()).bridges()?;

    let output = if cli.json {
        let mut json = Report::new(&rule, &queries, chrono::Utc::now()).to_json()?;
        json.push('\n');
        json
    } else {
        render_plain(&queries)
    };

    match &cli.output {
        Some(dir) => write_output(dir, &rule.title, &output)?,
        None => print!("{}\n{output}", rule.title),
    }
    Ok(())
}

fn write_output(dir: &Path, title: &str, output: &str) -> std::io::Result<()> {
    let path = dir.join(output_file_name(title));
    std::fs::write(&path, output)?;
    println!("Output for rule '{title}' written to file: {}", path.display());
    Ok(())
}
