use std::{
    io::{self, BufRead, Write},
    sync::Arc,
    thread,
};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select, Text};
use tracing::{debug, info};
use weather_core::{Config, Units, WeatherRecord, client_from_config};

use crate::screen::{FetchMode, ScreenMsg, ScreenState, WeatherScreen, parse_command};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather for one city")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure the API key, city and units.
    Configure,

    /// Fetch once and print temperature, pressure and humidity.
    Show {
        /// Call form used for the fetch.
        #[arg(long, value_enum, default_value_t = FetchMode::Async)]
        mode: FetchMode,
    },

    /// Interactive screen: `s` fetches synchronously, `a` asynchronously, `q` quits.
    Screen,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Show { mode } => show(mode).await,
            Command::Screen => screen().await,
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    if api_key.trim().is_empty() {
        return Err(anyhow!("API key must not be empty"));
    }
    config.set_api_key(api_key.trim().to_string());

    config.city = Text::new("City:")
        .with_default(&config.city)
        .prompt()
        .context("Failed to read city")?;

    let start = Units::all().iter().position(|u| *u == config.units).unwrap_or_default();
    config.units = Select::new("Units:", Units::all().to_vec())
        .with_starting_cursor(start)
        .prompt()
        .context("Failed to read units")?;

    let path = config.save()?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}

fn load_screen() -> anyhow::Result<WeatherScreen> {
    let config = Config::load()?;
    let client = client_from_config(&config)?;
    info!(city = %config.city, units = %config.units, "weather client ready");

    Ok(WeatherScreen::new(Arc::new(client), config.units.temperature_label()))
}

async fn show(mode: FetchMode) -> anyhow::Result<()> {
    let mut screen = load_screen()?;
    screen.run_once(mode).await;

    if let ScreenState::Shown(record) = screen.state() {
        print_heading(record);
    }

    let view = screen.view();
    match (view.fields, view.notice) {
        (Some(fields), _) => {
            for line in fields {
                println!("{line}");
            }
            Ok(())
        }
        (None, Some(notice)) => Err(anyhow!(notice)),
        (None, None) => Err(anyhow!("Fetch did not complete")),
    }
}

fn print_heading(record: &WeatherRecord) {
    let observed = record.observed_at().map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string());
    match (record.location(), observed) {
        (Some(location), Some(at)) => println!("{location} ({at})"),
        (Some(location), None) => println!("{location}"),
        (None, Some(at)) => println!("Observed {at}"),
        (None, None) => {}
    }
}

async fn screen() -> anyhow::Result<()> {
    let mut screen = load_screen()?;
    let tx = screen.sender();

    // Input thread: forwards keyboard lines into the screen's queue.
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match parse_command(&line) {
                Some(msg) => {
                    let quit = matches!(msg, ScreenMsg::Quit);
                    if tx.send(msg).is_err() || quit {
                        return;
                    }
                }
                None => debug!(input = %line.trim(), "unrecognised input"),
            }
        }
        let _ = tx.send(ScreenMsg::Quit);
    });

    let mut out = io::stdout();
    screen.run(&mut out).await.context("Failed to draw screen")?;
    out.flush()?;
    Ok(())
}
