use anyhow::Result;
use clap::{Parser, Subcommand};
use log::warn;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use worksheet2walkthrough::config::Config;
use worksheet2walkthrough::pipeline;
use worksheet2walkthrough::setup;
use worksheet2walkthrough::store::{mime_for, Library};
use worksheet2walkthrough::tts::create_tts_client;
use worksheet2walkthrough::vision::{create_vision_client, placeholder_analysis, VisionClient};
use worksheet2walkthrough::walkthrough::celebration::SurfaceSize;
use worksheet2walkthrough::walkthrough::narration::{Narrator, TimedSink};
use worksheet2walkthrough::walkthrough::session::{ConsoleView, Session};

#[derive(Parser)]
#[command(about = "Worksheet feedback walkthroughs powered by a multimodal model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a worksheet image and store the result in the library
    Analyze { image: PathBuf },
    /// Pre-synthesize narration audio for a stored analysis
    Narrate { id: String },
    /// Play a stored analysis as an autoplaying walkthrough
    Play {
        id: String,
        /// Pace steps with a fixed delay instead of narration
        #[arg(long)]
        no_voice: bool,
    },
    /// List stored analyses, newest first
    Library,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    config.ensure_directories()?;
    let library = Library::open(&config)?;

    match cli.command {
        Command::Analyze { image } => {
            let id = library.import_image(&image)?;
            let analysis = if config.has_api_key() {
                let mime = mime_for(&image).unwrap_or("image/png");
                let bytes = fs::read(&image)?;
                create_vision_client(&config).analyze(&bytes, mime).await?
            } else {
                warn!("no API key configured; storing placeholder analysis");
                placeholder_analysis()
            };
            library.save_analysis(&id, &analysis)?;
            println!("{}  {} ({} steps)", id, analysis.title, analysis.steps.len());
        }

        Command::Narrate { id } => {
            setup::run_setup(&mut config)?;
            let record = library.load(&id)?;
            let tts = create_tts_client(&config);
            let track =
                pipeline::synthesize_narration(&library, &id, &record.analysis, tts.as_ref())
                    .await?;
            println!("Narration track: {}", track.display());
        }

        Command::Play { id, no_voice } => {
            if !no_voice {
                setup::run_setup(&mut config)?;
            }
            let record = library.load(&id)?;

            let narrator = Narrator::new(
                create_tts_client(&config),
                Box::new(TimedSink),
                None,
                Duration::from_secs(config.narration.tts_timeout_secs),
            );
            narrator.set_enabled(!no_voice);

            println!("{}", record.analysis.title);
            if !record.analysis.summary.is_empty() {
                println!("{}", record.analysis.summary);
            }
            println!("Image: {}", record.image_path.display());
            println!();

            let mut session = Session::new(
                Arc::new(narrator),
                Box::new(ConsoleView),
                SurfaceSize {
                    width: 1280.0,
                    height: 960.0,
                },
            );
            session.load(record.analysis.steps)?;
            session.run_auto_play().await?;
        }

        Command::Library => {
            let items = library.list()?;
            if items.is_empty() {
                println!("Library is empty. Run `analyze` on a worksheet image first.");
            }
            for item in items {
                println!(
                    "{}  {}  {}",
                    item.created_at.format("%Y-%m-%d %H:%M"),
                    item.id,
                    item.title
                );
            }
        }
    }

    Ok(())
}
