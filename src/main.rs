use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use tokio::sync::mpsc;

use recipe_recorder::driver::{self, web::BrowserType};
use recipe_recorder::recipe::RecipeStore;
use recipe_recorder::recorder::{self, ControlCommand, Document, NodePath, RecordOptions, Recorder};
use recipe_recorder::runner::{self, overrides};
use recipe_recorder::utils::Config;

#[derive(Parser)]
#[command(name = "recipe")]
#[command(version = "0.1.0")]
#[command(about = "Record browser interactions as replayable recipes", long_about = None)]
struct Cli {
    /// Recipe store file (default: $RECIPE_STORE or recipes.json)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, global = true)]
    headless: bool,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long, global = true)]
    browser: Option<BrowserType>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record a new recipe in a browser window
    Record {
        /// Recipe name (asked for when omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Recipe description
        #[arg(short, long)]
        description: Option<String>,

        /// Starting URL (asked for when omitted)
        #[arg(short, long)]
        url: Option<String>,
    },

    /// Replay a stored recipe
    Run {
        /// Recipe name
        name: String,

        /// Override a fill value: --set 'selector=value'. Can be repeated.
        #[arg(short, long = "set", value_name = "SELECTOR=VALUE")]
        set: Vec<String>,

        /// JSON file mapping selectors to values
        #[arg(short, long)]
        overrides: Option<PathBuf>,

        /// Ask for every fill value before running
        #[arg(short, long)]
        interactive: bool,

        /// Write a JSON run report
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Pause before closing the browser (ms)
        #[arg(long)]
        close_delay: Option<u64>,
    },

    /// List stored recipes
    List,

    /// Print a stored recipe as JSON
    Show {
        /// Recipe name
        name: String,
    },

    /// Print the selector synthesized for an element of an XHTML snapshot
    Selector {
        /// Snapshot file
        #[arg(long)]
        html: PathBuf,

        /// Child-index path of the element, e.g. 1,0,2
        #[arg(long)]
        path: NodePath,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(store) = cli.store {
        config.store_path = store;
    }
    if cli.headless {
        config.headless = true;
    }
    if let Some(browser) = cli.browser {
        config.browser = browser;
    }

    match cli.command {
        Commands::Record {
            name,
            description,
            url,
        } => {
            println!("{}", "🎬 Web Automation Recipe Recorder".green().bold());

            let name = match name {
                Some(name) => name,
                None => ask("Enter recipe name", None)?,
            };
            let description = match description {
                Some(description) => description,
                None => ask("Enter description (optional)", Some(""))?,
            };
            if name.trim().is_empty() {
                anyhow::bail!("Recipe name must not be empty");
            }
            let start_url = match url {
                Some(url) => url,
                None => ask("Enter starting URL", None)?,
            };

            println!("{} Recording recipe: {}", "🔴".red(), name.cyan());
            println!("{}", "Instructions:".yellow());
            println!("• Navigate and interact with the webpage normally");
            println!("• Type 'stop' in console to finish recording");
            println!("• Type ':prompt Your message' to insert a prompt step");
            println!("• Use placeholders like {{name}}, {{email}} for dynamic data");

            let browser = driver::launch(&config).await?;

            let (commands_tx, commands_rx) = mpsc::unbounded_channel();
            let interrupt_tx = commands_tx.clone();
            ctrlc::set_handler(move || {
                let _ = interrupt_tx.send(ControlCommand::Interrupt);
            })?;
            recorder::spawn_command_reader(std::io::BufReader::new(std::io::stdin()), commands_tx);

            let options = RecordOptions {
                name,
                description,
                start_url,
            };
            let outcome = Recorder::new(browser.as_ref(), &config.store_path)
                .record(options, commands_rx)
                .await?;

            println!(
                "{} Recipe '{}' saved successfully!",
                "✅".green(),
                outcome.recipe.name
            );
            println!(
                "{}",
                format!(
                    "Total steps recorded: {} (reduced from {})",
                    outcome.recipe.steps().len(),
                    outcome.raw_count
                )
                .cyan()
            );
            if !outcome.recipe.placeholders().is_empty() {
                let names: Vec<&str> =
                    outcome.recipe.placeholders().iter().map(String::as_str).collect();
                println!("  Placeholders: {}", names.join(", ").yellow());
            }
            println!(
                "  Store: {} ({} recipes)",
                config.store_path.display(),
                outcome.stored_count
            );
        }

        Commands::Run {
            name,
            set,
            overrides: overrides_file,
            interactive,
            report,
            close_delay,
        } => {
            if let Some(delay) = close_delay {
                config.close_delay_ms = delay;
            }

            let recipe = runner::load_recipe(&config.store_path, &name)?;

            let mut values = match overrides_file {
                Some(path) => overrides::load_overrides_file(&path)?,
                None => runner::Overrides::new(),
            };
            for assignment in &set {
                let (selector, value) = overrides::parse_assignment(assignment)?;
                values.insert(selector, value);
            }
            if interactive && !recipe.fill_fields().is_empty() {
                println!("{} Enter inputs (empty keeps the value shown)", "✏️".blue());
                let stdin = std::io::stdin();
                let mut input = stdin.lock();
                let mut output = std::io::stdout();
                values = overrides::prompt_overrides(&recipe, &values, &mut input, &mut output)?;
            }

            runner::replay(&config, &recipe, &values, report.as_deref()).await?;
        }

        Commands::List => {
            let store = RecipeStore::open(&config.store_path)?;
            if store.unreadable_count() > 0 {
                println!(
                    "{} {} stored entries could not be read and are not listed",
                    "⚠️".yellow(),
                    store.unreadable_count()
                );
            }
            if store.is_empty() {
                println!(
                    "{} No recipes in {}",
                    "ℹ".blue(),
                    config.store_path.display()
                );
                return Ok(());
            }

            println!(
                "{} Loaded {} recipes from {}",
                "📚".blue(),
                store.len(),
                config.store_path.display()
            );
            for recipe in store.recipes() {
                println!(
                    "  {} {} ({} steps, created {})",
                    "•".cyan(),
                    recipe.name.white().bold(),
                    recipe.steps().len(),
                    recipe.created
                );
                if !recipe.description.is_empty() {
                    println!("      {}", recipe.description.dimmed());
                }
                if !recipe.placeholders().is_empty() {
                    let names: Vec<&str> =
                        recipe.placeholders().iter().map(String::as_str).collect();
                    println!("      placeholders: {}", names.join(", ").yellow());
                }
            }
        }

        Commands::Show { name } => {
            let recipe = runner::load_recipe(&config.store_path, &name)?;
            println!("{}", serde_json::to_string_pretty(&recipe)?);
        }

        Commands::Selector { html, path } => {
            let markup = std::fs::read_to_string(&html)
                .with_context(|| format!("Failed to read {}", html.display()))?;
            let document = Document::from_markup(&markup)?;
            let selector = recorder::SelectorSynthesizer::new(&document)
                .synthesize(&path)
                .with_context(|| format!("No element at path {}", path))?;
            println!("{}", selector);
        }
    }

    Ok(())
}

/// Ask a question on stdin. An empty answer takes `default` when there is one.
fn ask(label: &str, default: Option<&str>) -> anyhow::Result<String> {
    let stdin = std::io::stdin();
    loop {
        match default {
            Some(d) if !d.is_empty() => print!("{} [{}]: ", label, d),
            _ => print!("{}: ", label),
        }
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            anyhow::bail!("Input closed while waiting for: {}", label);
        }

        let answer = line.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
        if let Some(d) = default {
            return Ok(d.to_string());
        }
    }
}
