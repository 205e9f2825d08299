use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use raw2ready::config::Settings;
use raw2ready::error::WorkflowError;
use raw2ready::models::PresentationDeck;
use raw2ready::server;
use raw2ready::workflow::{
    ApiClient, Card, DeckInputs, FileStore, FormField, FormStage, GeneratorChoice,
    KeyValueStore, NavPayload, PitchStage, ResultsStage, ResultsView, Stage, VideoInputs,
    WorkflowRouter,
};

const SERVER_LOG_FILTER: &str = "raw2ready=debug,graph_flow=info";
const CLIENT_LOG_FILTER: &str = "raw2ready=warn";

/// Turn a raw business idea into a pitch deck or video
#[derive(Parser)]
#[command(name = "raw2ready")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Backend URL used by the workflow commands
    #[arg(long, global = true, env = "RAW2READY_API_URL")]
    api_url: Option<String>,

    /// Directory holding the saved workflow state
    #[arg(long, global = true, env = "RAW2READY_PROFILE")]
    profile: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP backend
    Serve {
        /// Address to listen on
        #[arg(long, env = "RAW2READY_BIND")]
        bind: Option<SocketAddr>,
    },

    /// List the models the backend can use
    Models,

    /// Check that the backend is up
    Health,

    #[command(flatten)]
    Workflow(WorkflowCommand),
}

#[derive(Subcommand)]
enum WorkflowCommand {
    /// Fill in and submit the business form
    Form {
        #[command(subcommand)]
        operation: FormOperation,
    },

    /// Show the market analysis
    Results {
        /// Card to expand (revenue, locations, audience, addons, competitor-N)
        #[arg(long)]
        expand: Option<Card>,

        /// Continue to the pitch stage
        #[arg(long)]
        proceed: bool,
    },

    /// Pick between the deck and video generators
    Pitch {
        #[command(subcommand)]
        operation: PitchOperation,
    },

    /// Generate, browse and edit the slide deck
    Deck {
        #[command(subcommand)]
        operation: DeckOperation,
    },

    /// Generate and download a short pitch video
    Video {
        #[command(subcommand)]
        operation: VideoOperation,
    },

    /// Go back one stage
    Back,

    /// Show where the workflow stands
    Status,
}

#[derive(Subcommand)]
enum FormOperation {
    /// Print the saved form
    Show,

    /// Set one field
    Set {
        /// Field name, e.g. country or raw_idea
        field: FormField,
        value: String,
    },

    /// Accept (or with --revoke, withdraw) the terms
    AcceptTerms {
        #[arg(long)]
        revoke: bool,
    },

    /// Forget everything entered so far
    Clear,

    /// Validate and send the form for analysis
    Submit {
        /// Text file whose content is sent along with this submission
        #[arg(long)]
        attach: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum PitchOperation {
    /// Select the generator to work with
    Choose { choice: GeneratorChoice },
}

#[derive(Subcommand)]
enum DeckOperation {
    /// Generate a new deck
    Generate {
        /// Number of slides (5-15)
        #[arg(long)]
        slides: Option<u32>,

        /// Talk length in minutes (3-15)
        #[arg(long)]
        minutes: Option<u32>,
    },

    /// Print the current slide
    Show,

    /// Next slide
    Next,

    /// Previous slide
    Prev,

    /// Jump to a slide, counted from 1
    Goto { number: usize },

    /// Rewrite the deck from an instruction
    Edit { instruction: String },

    /// Export the deck into a directory
    Export {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },

    /// Discard the deck
    Reset,
}

#[derive(Subcommand)]
enum VideoOperation {
    /// Generate a clip
    Generate {
        #[arg(long)]
        prompt: Option<String>,

        /// Clip length in seconds (6-10)
        #[arg(long)]
        seconds: Option<u32>,
    },

    /// Print the current video
    Show,

    /// Download the current video into a directory
    Download {
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(&cli);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<WorkflowError>() {
            Some(WorkflowError::Invalid(validation)) => {
                eprintln!("Please fix the following:");
                for (field, message) in validation.field_errors() {
                    eprintln!("  {field}: {message}");
                }
            }
            _ => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

fn init_tracing(cli: &Cli) {
    let default = match (&cli.command, cli.verbose) {
        (Commands::Serve { .. }, _) | (_, true) => SERVER_LOG_FILTER,
        _ => CLIENT_LOG_FILTER,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut settings = Settings::from_env()?;
    if let Some(url) = cli.api_url {
        settings.api_url = url;
    }
    if let Some(dir) = cli.profile {
        settings.profile_dir = dir;
    }

    let api = ApiClient::new(settings.api_url.clone());

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                settings.bind = bind;
            }
            server::serve(&settings).await
        }
        Commands::Models => {
            for model in api.models().await?.models {
                println!("{:<22} {:<8} {}", model.id, model.provider, model.model_id);
            }
            Ok(())
        }
        Commands::Health => {
            let health = api.health().await?;
            println!("{} is {}", api.base_url(), health.status);
            Ok(())
        }
        Commands::Workflow(command) => {
            let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&settings.profile_dir)?);
            workflow(command, &api, store).await
        }
    }
}

async fn workflow(command: WorkflowCommand, api: &ApiClient, store: Arc<dyn KeyValueStore>) -> Result<()> {
    let mut router = WorkflowRouter::open(store.clone());

    match command {
        WorkflowCommand::Form { operation } => form(operation, api, &store, &mut router).await?,
        WorkflowCommand::Results { expand, proceed } => {
            let submission = router.results_payload();
            let mut stage = ResultsStage::new(submission.result, submission.context);
            if let Some(card) = expand {
                stage.expand(card);
                if stage.expanded() != Some(card) {
                    println!("Card {card} has nothing to show");
                }
            }
            print_results(&stage.render());

            if proceed {
                if router.current() != Stage::Results {
                    bail!("Submit the form before moving on (current stage: {})", router.current());
                }
                router.advance(NavPayload::Pitch(stage.proceed()))?;
                println!("\nNext: `raw2ready deck generate` or `raw2ready pitch choose video`");
            }
        }
        WorkflowCommand::Pitch {
            operation: PitchOperation::Choose { choice },
        } => {
            require_pitch(&router)?;
            PitchStage::open(store.clone()).choose(choice);
            println!("Using the {choice} generator");
        }
        WorkflowCommand::Deck { operation } => {
            require_pitch(&router)?;
            deck(operation, api, &store, &router).await?;
        }
        WorkflowCommand::Video { operation } => {
            require_pitch(&router)?;
            video(operation, api, &store, &router).await?;
        }
        WorkflowCommand::Back => println!("Now at {}", router.back()),
        WorkflowCommand::Status => status(&store, &router),
    }

    Ok(())
}

async fn form(
    operation: FormOperation,
    api: &ApiClient,
    store: &Arc<dyn KeyValueStore>,
    router: &mut WorkflowRouter,
) -> Result<()> {
    let mut stage = FormStage::open(store.clone());

    match operation {
        FormOperation::Show => {
            for field in FormField::ALL {
                println!("{:<16} {}", field.as_str(), stage.form().value(field));
            }
            println!("{:<16} {}", "terms_accepted", stage.terms_accepted());
        }
        FormOperation::Set { field, value } => stage.set_field(field, &value)?,
        FormOperation::AcceptTerms { revoke } => stage.set_terms_accepted(!revoke),
        FormOperation::Clear => stage.clear(),
        FormOperation::Submit { attach } => {
            if let Some(path) = attach {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                stage.attach_file_text(text)?;
            }

            stage.validate().into_result()?;
            println!("Analyzing...");
            let submission = router.submit(&mut stage, api).await?;
            print_results(&ResultsStage::new(submission.result, submission.context).render());
        }
    }
    Ok(())
}

async fn deck(
    operation: DeckOperation,
    api: &ApiClient,
    store: &Arc<dyn KeyValueStore>,
    router: &WorkflowRouter,
) -> Result<()> {
    let mut pitch = PitchStage::open(store.clone());
    pitch.choose(GeneratorChoice::Deck);
    let flow = pitch.deck_mut();

    match operation {
        DeckOperation::Generate { slides, minutes } => {
            let current = flow.inputs();
            flow.set_inputs(DeckInputs {
                num_slides: slides.unwrap_or(current.num_slides),
                duration_minutes: minutes.unwrap_or(current.duration_minutes),
            });
            println!("Generating presentation...");
            let context = router.pitch_context();
            let deck = flow.generate(api, &context).await?;
            print_deck_summary(deck);
        }
        DeckOperation::Show => {}
        DeckOperation::Next => {
            flow.next();
        }
        DeckOperation::Prev => {
            flow.prev();
        }
        DeckOperation::Goto { number } => {
            flow.go_to(number.saturating_sub(1));
        }
        DeckOperation::Edit { instruction } => {
            flow.begin_edit()?;
            flow.set_edit_instruction(instruction);
            println!("Applying edit...");
            let context = router.pitch_context();
            flow.apply_edit(api, &context).await?;
        }
        DeckOperation::Export { out } => {
            let context = router.pitch_context();
            let file = flow.export(api, &context.business_name).await?;
            let path = file.save_into(&out)?;
            println!("Saved {}", path.display());
            return Ok(());
        }
        DeckOperation::Reset => {
            flow.reset();
            println!("Deck discarded");
            return Ok(());
        }
    }

    let Some(deck) = flow.deck() else {
        bail!(WorkflowError::NoDeck);
    };
    if let Some(slide) = flow.current_slide() {
        println!("\nSlide {} of {}: {}", flow.slide_index() + 1, deck.slide_count(), slide.title);
        if let Some(subtitle) = &slide.subtitle {
            println!("{subtitle}");
        }
        for line in &slide.content {
            println!("  - {line}");
        }
        if let Some(notes) = &slide.speaker_notes {
            println!("\nNotes: {notes}");
        }
    }
    Ok(())
}

async fn video(
    operation: VideoOperation,
    api: &ApiClient,
    store: &Arc<dyn KeyValueStore>,
    router: &WorkflowRouter,
) -> Result<()> {
    let mut pitch = PitchStage::open(store.clone());
    pitch.choose(GeneratorChoice::Video);
    let flow = pitch.video_mut();

    match operation {
        VideoOperation::Generate { prompt, seconds } => {
            let current = flow.inputs().clone();
            flow.set_inputs(VideoInputs {
                prompt: prompt.unwrap_or(current.prompt),
                duration_seconds: seconds.unwrap_or(current.duration_seconds),
            });
            println!("Generating video...");
            let context = router.pitch_context();
            let video = flow.generate(api, &context).await?;
            println!("Video ready: {}", video.video_url);
        }
        VideoOperation::Show => match flow.video() {
            Some(video) => println!(
                "{} ({}s, {})\n{}",
                video.video_url, video.duration_seconds, video.generated_at, video.prompt
            ),
            None => println!("No video yet"),
        },
        VideoOperation::Download { out } => {
            let file = flow.download(api).await?;
            let path = file.save_into(&out)?;
            println!("Saved {}", path.display());
        }
    }
    Ok(())
}

fn require_pitch(router: &WorkflowRouter) -> Result<()> {
    if router.current() != Stage::Pitch {
        bail!(
            "The pitch stage is not open yet (current stage: {}). Run `raw2ready results --proceed` first",
            router.current()
        );
    }
    Ok(())
}

fn status(store: &Arc<dyn KeyValueStore>, router: &WorkflowRouter) {
    println!("Stage: {}", router.current());
    let form = FormStage::open(store.clone());
    println!("Form valid: {}", form.validate().is_valid());

    let pitch = PitchStage::open(store.clone());
    println!("Generator: {}", pitch.choice());
    match pitch.deck().deck() {
        Some(deck) => println!(
            "Deck: {} slides, on slide {}",
            deck.slide_count(),
            pitch.deck().slide_index() + 1
        ),
        None => println!("Deck: none"),
    }
    match pitch.video().video() {
        Some(video) => println!("Video: {}", video.video_url),
        None => println!("Video: none"),
    }
}

fn print_results(view: &ResultsView) {
    println!("\n{}", view.display_name);
    for card in &view.cards {
        println!("[{}] {}: {}", card.card, card.title, card.summary);
        if let Some(detail) = &card.detail {
            for line in detail {
                println!("    {line}");
            }
        }
    }
    if let Some(disclaimer) = &view.disclaimer {
        println!("\n{disclaimer}");
    }
}

fn print_deck_summary(deck: &PresentationDeck) {
    println!(
        "{} ({} slides, {} min)",
        deck.presentation_title,
        deck.slide_count(),
        deck.total_duration_minutes
    );
    if let Some(tagline) = &deck.generated_tagline {
        println!("{tagline}");
    }
}
