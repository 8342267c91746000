use anyhow::{Context, Result};
use chatmgr::{
    Chat, Config, ResponseCache,
    core::{chat::estimate_cost, tokens::TokenCounter},
    logger,
};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "chatmgr",
    version,
    about = "Chat with an LLM while tracking history, cost and cached replies"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a config file (defaults to the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Chat model to use for this run
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Do not load or save cache shards
    #[arg(long, global = true)]
    no_cache: bool,

    /// Write JSON debug logs to this file instead of the console
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a single message
    Ask {
        message: String,
        #[arg(short, long, default_value_t = 0.0)]
        temperature: f32,
        /// Keep the conversation history even if the config is non-interactive
        #[arg(short, long)]
        interactive: bool,
    },
    /// Interactive conversation on stdin
    Repl {
        #[arg(short, long, default_value_t = 0.0)]
        temperature: f32,
    },
    /// Print embedding dimension and cost for one or more texts
    Embed {
        #[arg(required = true)]
        texts: Vec<String>,
    },
    /// Estimate the cost of sending a message
    Estimate { message: String },
    /// Show cached response statistics
    Cache,
}

fn build_chat(config: &Config) -> Result<Chat> {
    let provider = config.provider().context("Failed to build provider")?;
    Chat::new(Box::new(provider), config.chat_options()).context("Failed to initialize chat")
}

async fn run_repl(chat: &mut Chat, temperature: f32) -> Result<()> {
    println!(
        "{}",
        "Commands: /reset /history /summarize /fee /quit".dimmed()
    );
    let stdin = io::stdin();
    loop {
        print!("{} ", ">".cyan().bold());
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line {
            "/quit" | "/exit" => break,
            "/reset" => {
                chat.reset();
                println!("{}", "History cleared".green());
            }
            "/history" => println!("{chat}"),
            "/fee" => println!("Total: ${:.6}", chat.fee()),
            "/summarize" => match chat.summarize_and_clear_history().await {
                Ok(reply) => println!("{}", reply.content),
                Err(e) => eprintln!("{}", format!("Error: {e}").red()),
            },
            message => match chat.send(message, temperature, true).await {
                Ok(reply) => {
                    println!("{}", reply.content);
                    println!("{}", format!("${:.6}", reply.price).dimmed());
                }
                Err(e) => eprintln!("{}", format!("Error: {e}").red()),
            },
        }
    }
    println!("Total: ${:.6}", chat.fee());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => logger::init_tracing_to_file(path),
        None => logger::init_logger(),
    }

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.model_name = model;
    }
    if cli.no_cache {
        config.auto_saveload = false;
    }

    match cli.command {
        Commands::Ask {
            message,
            temperature,
            interactive,
        } => {
            let mut chat = build_chat(&config)?;
            let reply = chat.send(message, temperature, interactive).await?;
            println!("{}", reply.content);
            let cost = format!("${:.6}", reply.price);
            if reply.cached {
                println!("{} {}", cost.dimmed(), "(cached)".green());
            } else {
                println!("{}", cost.dimmed());
            }
        }
        Commands::Repl { temperature } => {
            let mut chat = build_chat(&config)?;
            run_repl(&mut chat, temperature).await?;
        }
        Commands::Embed { texts } => {
            let mut chat = build_chat(&config)?;
            let (vectors, price) = chat.embeddings(texts.as_slice()).await?;
            for (text, vector) in texts.iter().zip(&vectors) {
                println!("{}: {} dimensions", text.cyan(), vector.len());
            }
            println!("{}", format!("${price:.8}").dimmed());
        }
        Commands::Estimate { message } => {
            let counter = TokenCounter::new();
            match estimate_cost(&config.pricing_table(), &config.model_name, &counter, &message) {
                Some(cost) => println!("~${cost:.6} with {}", config.model_name),
                None => println!(
                    "{}",
                    format!("No pricing known for {}", config.model_name).yellow()
                ),
            }
        }
        Commands::Cache => {
            let mut cache = ResponseCache::new();
            let shards = cache.load_dir(&config.cache_dir)?;
            println!(
                "{} cached responses in {} shards at {}",
                cache.len(),
                shards,
                config.cache_dir.display()
            );
        }
    }

    Ok(())
}
