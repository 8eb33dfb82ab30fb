mod config;

use crate::config::Config;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use intona_core::api::ApiClient;
use intona_core::audio::{AudioSessionManager, AudioState};
use intona_core::catalog;
use intona_core::models::User;
use intona_core::practice::{PASS_THRESHOLD, PracticeError, PracticeOrchestrator};
use intona_core::progress::ProgressLedger;
use intona_core::store::CredentialStore;
use intona_core::session::UserSession;
use intona_native_utils::CpalAudioBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::fmt::time::ChronoLocal;

#[derive(Parser)]
#[command(name = "intona-trainer", about = "Intonation practice from the terminal")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create an account; a verification code is sent to your email
    Register {
        username: String,
        email: String,
        password: String,
    },
    /// Confirm a registration with the emailed code
    Verify { email: String, code: String },
    /// Log in with your username or email
    Login { identifier: String, password: String },
    /// Show the current account and local progress
    Profile,
    /// Change the account password
    ChangePassword { current: String, new: String },
    /// Log out and reset local progress
    Logout,
    /// List the available constructions and levels
    Constructions,
    /// Play a level's reference pronunciation
    Listen { construction: String, level: String },
    /// Record an attempt for a level and have it scored
    Practice { construction: String, level: String },
    /// List the available audio devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    let args = Cli::parse();

    let store = CredentialStore::new(&config.data_dir);
    let api = ApiClient::new(&config.server_url, Arc::new(store.clone()))
        .context("Failed to build API client")?;
    let mut session = UserSession::new(api.clone(), store);
    let ledger = ProgressLedger::new(&config.data_dir);

    match args.command {
        Command::Register {
            username,
            email,
            password,
        } => {
            let response = session.register(&username, &email, &password).await?;
            println!("{}", response.message);
            if let Some(code) = response.verification_code {
                println!("Verification code: {code}");
            }
            println!("Verify with: intona-trainer verify {email} <code>");
        }
        Command::Verify { email, code } => {
            let response = session.verify(&email, &code).await?;
            println!("{}", response.message);
            println!("You can now log in.");
        }
        Command::Login {
            identifier,
            password,
        } => {
            let user = session.login(&identifier, &password).await?;
            println!("Logged in as {} <{}>", user.username, user.email);
        }
        Command::Profile => match session.current_user().await {
            Some(user) => print_profile(&user, &ledger).await,
            None => println!("Not logged in."),
        },
        Command::ChangePassword { current, new } => {
            let response = session.change_password(&current, &new).await?;
            println!("{}", response.message);
        }
        Command::Logout => {
            session.logout().await;
            // A logout is a full account reset, passed levels included.
            ledger.clear().await?;
            println!("Logged out.");
        }
        Command::Constructions => {
            for construction in catalog::CONSTRUCTIONS {
                let level_ids: Vec<&str> = construction.levels.iter().map(|l| l.id).collect();
                let passed = ledger.passed_count_for(&level_ids).await;
                println!(
                    "{}: {} ({passed}/{} passed)",
                    construction.id,
                    construction.title,
                    construction.levels.len()
                );
                for level in construction.levels {
                    let marker = if ledger.is_passed(level.id).await { "*" } else { " " };
                    println!(
                        "  [{marker}] {} ({:?}): {}",
                        level.id, level.difficulty, level.phrase
                    );
                }
            }
        }
        Command::Listen {
            construction,
            level,
        } => {
            let (_, level) = catalog::level_by_id(&construction, &level)
                .context("Unknown construction or level")?;
            let manager =
                AudioSessionManager::new(CpalAudioBackend::new(), config.recordings_dir());
            let reference = config.assets_dir().join(level.reference_audio);
            manager.play(&reference).await?;
            println!("Playing reference for \"{}\"...", level.phrase);
            while manager.state().await == AudioState::Playing {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        Command::Practice {
            construction,
            level,
        } => {
            run_practice(&config, &mut session, api, ledger, &construction, &level).await?;
        }
        Command::Devices => {
            println!(
                "Input devices:\n{}",
                intona_native_utils::device::available_inputs()?
            );
            println!(
                "Output devices:\n{}",
                intona_native_utils::device::available_outputs()?
            );
        }
    }
    Ok(())
}

async fn run_practice(
    config: &Config,
    session: &mut UserSession<ApiClient>,
    api: ApiClient,
    ledger: ProgressLedger,
    construction_id: &str,
    level_id: &str,
) -> Result<()> {
    let (construction, level) = catalog::level_by_id(construction_id, level_id)
        .context("Unknown construction or level")?;

    if session.current_user().await.is_none() {
        println!("Log in first: intona-trainer login <identifier> <password>");
        return Ok(());
    }

    let audio = AudioSessionManager::new(CpalAudioBackend::new(), config.recordings_dir());
    let orchestrator = PracticeOrchestrator::new(api, audio, ledger);

    println!("Phrase: {}", level.phrase);
    println!("Recording... press Enter to stop.");
    orchestrator.start_recording().await?;
    read_line().await?;
    orchestrator.stop_recording().await?;

    // Let the user hear their attempt before it is spent on an analysis.
    loop {
        println!("Enter = analyze, p = play your recording first.");
        if read_line().await?.trim() != "p" {
            break;
        }
        if let Some(recording) = orchestrator.audio().recording().await {
            orchestrator.audio().play(&recording.file_path).await?;
            while orchestrator.audio().state().await == AudioState::Playing {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
    }

    println!("Analyzing...");
    match orchestrator.analyze(level).await {
        Ok(outcome) => {
            println!("{}", outcome.feedback);
            if outcome.passed {
                println!("Level passed!");
            } else {
                println!("Below {PASS_THRESHOLD}, keep practicing.");
            }
            println!("Contour graph: {}", outcome.graph_url);
            if let Some(expected) = &outcome.expected_phrase {
                println!("The server expected: {expected}");
            }
            if let Some(user) =
                session.update_progress(construction.id, &outcome.level_id, outcome.score)
            {
                if let Some(progress) = user.progress.get(construction.id) {
                    println!(
                        "Average for {}: {:.2}",
                        construction.title, progress.average_score
                    );
                }
            }
        }
        Err(PracticeError::PhraseMismatch) => {
            println!("The phrase did not match, try recording again.");
        }
        Err(PracticeError::NothingRecorded) => {
            println!("Nothing was recorded.");
        }
        Err(error) => {
            tracing::warn!(%error, "analysis attempt failed");
            println!("Something went wrong, try again later.");
        }
    }
    Ok(())
}

async fn print_profile(user: &User, ledger: &ProgressLedger) {
    println!("{} <{}>", user.username, user.email);
    for construction in catalog::CONSTRUCTIONS {
        let level_ids: Vec<&str> = construction.levels.iter().map(|l| l.id).collect();
        let passed = ledger.passed_count_for(&level_ids).await;
        match user.progress.get(construction.id) {
            Some(progress) => println!(
                "  {}: {passed}/{} passed, average {:.2}",
                construction.title,
                construction.levels.len(),
                progress.average_score
            ),
            None => println!(
                "  {}: {passed}/{} passed",
                construction.title,
                construction.levels.len()
            ),
        }
    }
    if !user.achievements.is_empty() {
        println!("Achievements:");
        for achievement in &user.achievements {
            let marker = if achievement.is_unlocked { "*" } else { " " };
            println!("  [{marker}] {}: {}", achievement.title, achievement.description);
        }
    }
}

async fn read_line() -> Result<String> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    Ok(line)
}
