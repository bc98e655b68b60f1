use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::collections::HashSet;

use weather_core::{Config, ListFilter, WeatherClient, WeatherError, WeatherObservation, WeatherStore};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Weather CLI - fetch and manage weather data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch current weather for a city, using the cache when fresh.
    Fetch {
        /// City name.
        city: String,

        /// Country code (e.g. US, GB).
        #[arg(short, long)]
        country: Option<String>,

        /// Skip the cache and fetch fresh data.
        #[arg(long)]
        no_cache: bool,
    },

    /// Fetch a multi-day forecast for a city.
    Forecast {
        /// City name.
        city: String,

        /// Country code (e.g. US, GB).
        #[arg(short, long)]
        country: Option<String>,

        /// Number of forecast days.
        #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(u8).range(1..=5))]
        days: u8,
    },

    /// List stored weather records with optional filtering.
    List {
        /// Filter by city name (partial match).
        #[arg(short, long)]
        city: Option<String>,

        /// Filter by country code (exact match).
        #[arg(long)]
        country: Option<String>,

        /// Minimum temperature filter.
        #[arg(long)]
        min_temp: Option<f64>,

        /// Maximum temperature filter.
        #[arg(long)]
        max_temp: Option<f64>,

        /// Maximum number of records.
        #[arg(short, long, default_value_t = 50)]
        limit: u32,
    },

    /// Show one stored weather record by id.
    Show {
        /// Weather record id.
        id: i64,
    },

    /// Display database statistics.
    Info,

    /// Store the OpenWeather API key interactively.
    Configure,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Fetch { city, country, no_cache } => {
                let store = open_store()?;

                if !no_cache {
                    if let Some(cached) = store.lookup_fresh(&city, country.as_deref())? {
                        println!("✓ Using cached data (less than 30 minutes old)");
                        print_detail(&cached);
                        return Ok(());
                    }
                }

                let client = build_client()?;
                println!("Fetching weather for {city}...");
                let mut obs = client.fetch_current(&city, country.as_deref()).await?;
                obs.id = Some(store.upsert(&obs)?);

                println!("✓ Weather data fetched and saved successfully!");
                print_detail(&obs);
            }

            Command::Forecast { city, country, days } => {
                let store = open_store()?;
                let client = build_client()?;

                println!("Fetching {days}-day forecast for {city}...");
                let mut observations =
                    client.fetch_forecast(&city, country.as_deref(), days).await?;
                for obs in &mut observations {
                    obs.id = Some(store.upsert(obs)?);
                }

                println!(
                    "✓ Saved {} forecast intervals for {}, {}",
                    observations.len(),
                    observations[0].city,
                    observations[0].country
                );
                print_forecast_table(&observations);
            }

            Command::List { city, country, min_temp, max_temp, limit } => {
                let store = open_store()?;
                let records = store.list(&ListFilter { city, country, min_temp, max_temp, limit })?;
                print_table(&records);
            }

            Command::Show { id } => {
                let store = open_store()?;
                match store.find_by_id(id)? {
                    Some(obs) => print_detail(&obs),
                    None => bail!("No weather record found with id: {id}"),
                }
            }

            Command::Info => {
                let store = open_store()?;
                let records = store.list(&ListFilter { limit: 10_000, ..Default::default() })?;

                if records.is_empty() {
                    println!("No weather records in database yet.");
                    return Ok(());
                }

                let locations: HashSet<_> =
                    records.iter().map(|w| (w.city.as_str(), w.country.as_str())).collect();
                let avg_temp =
                    records.iter().map(|w| w.temperature).sum::<f64>() / records.len() as f64;

                println!("Total records:       {}", records.len());
                println!("Unique locations:    {}", locations.len());
                println!("Average temperature: {avg_temp:.1}°C");
                println!("Database path:       {}", Config::database_path()?.display());
                println!("Cache duration:      30 minutes");
            }

            Command::Configure => {
                let api_key = inquire::Text::new("OpenWeather API key:")
                    .prompt()
                    .context("Failed to read API key")?;
                if api_key.trim().is_empty() {
                    bail!("API key must not be empty");
                }

                let mut config = Config::load()?;
                config.api_key = Some(api_key.trim().to_string());
                config.save()?;

                println!("✓ API key saved to {}", Config::config_file_path()?.display());
            }
        }

        Ok(())
    }
}

fn open_store() -> anyhow::Result<WeatherStore> {
    let path = Config::database_path()?;
    let store = WeatherStore::open(&path)
        .with_context(|| format!("Failed to open database: {}", path.display()))?;
    Ok(store)
}

fn build_client() -> anyhow::Result<WeatherClient> {
    let config = Config::load()?;
    let api_key = config.resolve_api_key().ok_or(WeatherError::MissingCredential)?;
    Ok(WeatherClient::new(api_key)?)
}

fn print_detail(obs: &WeatherObservation) {
    let id = obs.id.map_or_else(|| "-".to_string(), |id| id.to_string());

    println!();
    println!("Weather Details (id: {id})");
    println!("  Location:     {}, {}", obs.city, obs.country);
    println!(
        "  Temperature:  {:.1}°C (feels like {:.1}°C)",
        obs.temperature, obs.feels_like
    );
    println!("  Range:        {:.1}°C to {:.1}°C", obs.temp_min, obs.temp_max);
    println!("  Description:  {}", title_case(&obs.description));
    println!("  Humidity:     {}%", obs.humidity);
    println!("  Pressure:     {} hPa", obs.pressure);
    println!("  Wind speed:   {} m/s", obs.wind_speed);
    println!("  Cloud cover:  {}%", obs.clouds);
    if let Some(target) = obs.forecast_at {
        println!("  Forecast for: {}", target.format("%Y-%m-%d %H:%M"));
    }
    println!("  Last updated: {}", obs.fetched_at.format("%Y-%m-%d %H:%M:%S"));
}

fn print_table(records: &[WeatherObservation]) {
    if records.is_empty() {
        println!("No weather records found.");
        return;
    }

    println!(
        "{:<6} {:<18} {:<8} {:>9} {:<22} {:>9}  {}",
        "ID", "City", "Country", "Temp(°C)", "Description", "Humidity", "Timestamp"
    );
    for w in records {
        let id = w.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!(
            "{:<6} {:<18} {:<8} {:>9.1} {:<22} {:>8}%  {}",
            id,
            w.city,
            w.country,
            w.temperature,
            title_case(&w.description),
            w.humidity,
            w.fetched_at.format("%Y-%m-%d %H:%M"),
        );
    }
}

fn print_forecast_table(records: &[WeatherObservation]) {
    println!(
        "{:<18} {:>9} {:<22} {:>9}  {}",
        "Forecast time", "Temp(°C)", "Description", "Humidity", "Wind(m/s)"
    );
    for w in records {
        let target = w
            .forecast_at
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string());
        println!(
            "{:<18} {:>9.1} {:<22} {:>8}%  {:>9.1}",
            target,
            w.temperature,
            title_case(&w.description),
            w.humidity,
            w.wind_speed,
        );
    }
}

/// Title-case the upstream condition description for display; the core
/// stores it verbatim as upstream sent it.
fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
