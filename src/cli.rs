// Cinelog CLI binary

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use cinelog_lib::catalog::{self, MovieFilter};
use cinelog_lib::constants::{DEFAULT_USER_NAME, MAX_SUGGESTIONS, RATING_MAX, RATING_MIN, YEAR_MAX, YEAR_MIN};
use cinelog_lib::db::resolve_db_path;
use cinelog_lib::{Movie, MovieList, MovieUpdate, NewMovie, Store, User};

#[derive(Parser)]
#[command(name = "cinelog")]
#[command(about = "Cinelog - a personal movie catalog", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (defaults to $CINELOG_DB_PATH, then ~/.cinelog/movies.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all users
    Users,

    /// Select a user, creating it if needed
    User {
        /// User name
        #[arg(value_parser = parse_user_name)]
        name: String,
    },

    /// List a user's movies
    List {
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
        /// Sort order
        #[arg(long, value_enum, default_value_t = SortKey::Title)]
        sort: SortKey,
        /// Reverse the order (Z-A, lowest rating first, newest first)
        #[arg(long, visible_alias = "desc")]
        reverse: bool,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Add a movie
    Add {
        title: String,
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
        #[arg(long, value_parser = parse_year)]
        year: i64,
        #[arg(long, value_parser = parse_rating)]
        rating: f64,
        /// Poster image URL
        #[arg(long)]
        poster: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Identifier in an external film database
        #[arg(long)]
        external_id: Option<String>,
    },

    /// Delete a movie
    Delete {
        title: String,
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
    },

    /// Change selected fields of a movie
    Update {
        title: String,
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
        #[arg(long, value_parser = parse_rating)]
        rating: Option<f64>,
        #[arg(long, value_parser = parse_year)]
        year: Option<i64>,
        #[arg(long, conflicts_with = "clear_poster")]
        poster: Option<String>,
        #[arg(long, conflicts_with = "clear_note")]
        note: Option<String>,
        #[arg(long, conflicts_with = "clear_external_id")]
        external_id: Option<String>,
        #[arg(long)]
        clear_poster: bool,
        #[arg(long)]
        clear_note: bool,
        #[arg(long)]
        clear_external_id: bool,
    },

    /// Show one movie
    Show {
        title: String,
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
    },

    /// Average, median, best and worst rating
    Stats {
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
    },

    /// Print a random movie
    Random {
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
    },

    /// Search titles by keyword
    Search {
        keyword: String,
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
    },

    /// Filter by minimum rating and year range
    Filter {
        #[arg(short, long, default_value = DEFAULT_USER_NAME, value_parser = parse_user_name)]
        user: String,
        #[arg(long, value_parser = parse_rating)]
        min_rating: Option<f64>,
        /// First year (inclusive)
        #[arg(long)]
        from: Option<i64>,
        /// Last year (inclusive)
        #[arg(long)]
        to: Option<i64>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum SortKey {
    Title,
    Rating,
    Year,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let db_path = resolve_db_path(cli.db.as_deref())?;
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open movie database at {}", db_path.display()))?;

    match cli.command {
        Commands::Users => cmd_users(&store),
        Commands::User { name } => cmd_user(&store, &name),
        Commands::List { user, sort, reverse, json } => cmd_list(&store, &user, sort, reverse, json),
        Commands::Add { title, user, year, rating, poster, note, external_id } => {
            let movie = NewMovie {
                title,
                year,
                rating,
                poster_url: poster,
                note,
                external_id,
            };
            cmd_add(&store, &user, &movie)
        }
        Commands::Delete { title, user } => cmd_delete(&store, &user, &title),
        Commands::Update {
            title,
            user,
            rating,
            year,
            poster,
            note,
            external_id,
            clear_poster,
            clear_note,
            clear_external_id,
        } => {
            let updates = MovieUpdate {
                rating,
                year,
                poster_url: nullable_update(poster, clear_poster),
                note: nullable_update(note, clear_note),
                external_id: nullable_update(external_id, clear_external_id),
            };
            cmd_update(&store, &user, &title, &updates)
        }
        Commands::Show { title, user } => cmd_show(&store, &user, &title),
        Commands::Stats { user } => cmd_stats(&store, &user),
        Commands::Random { user } => cmd_random(&store, &user),
        Commands::Search { keyword, user } => cmd_search(&store, &user, &keyword),
        Commands::Filter { user, min_rating, from, to } => {
            let criteria = MovieFilter {
                min_rating,
                start_year: from,
                end_year: to,
            };
            cmd_filter(&store, &user, &criteria)
        }
    }
}

fn cmd_users(store: &Store) -> Result<()> {
    let users = store.list_users()?;
    if users.is_empty() {
        println!("No users yet. Use 'cinelog user <name>' to create one.");
        return Ok(());
    }

    println!("{:>5}  {}", "ID", "Name");
    println!("{}", "-".repeat(30));
    for user in users {
        println!("{:>5}  {}", user.id, user.name);
    }
    Ok(())
}

fn cmd_user(store: &Store, name: &str) -> Result<()> {
    let existed = store.get_user(name)?.is_some();
    let user = store.get_or_create_user(name)?;
    if existed {
        println!("Welcome back, {}! (id {})", user.name, user.id);
    } else {
        println!("Welcome, {}! (id {})", user.name, user.id);
    }
    Ok(())
}

fn cmd_list(store: &Store, user_name: &str, sort: SortKey, reverse: bool, json: bool) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movies = store.list_movies(user.id)?;
    let ordered = ordered_movies(&movies, sort, reverse);

    if json {
        println!("{}", serde_json::to_string_pretty(&ordered)?);
        return Ok(());
    }

    println!("{} movies in {}'s collection", movies.len(), user.name);
    if ordered.is_empty() {
        println!();
        println!("No movies yet. Use 'cinelog add <title> --year <year> --rating <rating>' to add one.");
        return Ok(());
    }

    println!();
    print_table(&ordered);
    Ok(())
}

fn cmd_add(store: &Store, user_name: &str, movie: &NewMovie) -> Result<()> {
    let user = store.get_or_create_user(user_name)?;
    store.add_movie(user.id, movie)?;

    println!("Movie '{}' added to {}'s collection!", movie.title, user.name);
    if let Some(ref poster) = movie.poster_url {
        println!("Poster: {}", poster);
    }
    Ok(())
}

fn cmd_delete(store: &Store, user_name: &str, title: &str) -> Result<()> {
    let user = require_user(store, user_name)?;
    store.delete_movie(user.id, title)?;
    println!("Movie '{}' deleted from {}'s collection.", title, user.name);
    Ok(())
}

fn cmd_update(store: &Store, user_name: &str, title: &str, updates: &MovieUpdate) -> Result<()> {
    if updates.is_empty() {
        println!("No changes applied.");
        return Ok(());
    }

    let user = require_user(store, user_name)?;
    store.update_movie(user.id, title, updates)?;
    println!("Movie '{}' updated for {}.", title, user.name);
    Ok(())
}

fn cmd_show(store: &Store, user_name: &str, title: &str) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movie = store
        .get_movie(user.id, title)?
        .ok_or_else(|| anyhow::anyhow!("Movie '{}' not found for {}", title, user.name))?;

    println!("{}", movie.title);
    println!();
    println!("Year:        {}", movie.year);
    println!("Rating:      {:.1}/10", movie.rating);
    if let Some(ref poster) = movie.poster_url {
        println!("Poster:      {}", poster);
    }
    if let Some(ref external_id) = movie.external_id {
        println!("External ID: {}", external_id);
    }
    if let Some(ref note) = movie.note {
        println!("Note:        {}", note);
    }
    Ok(())
}

fn cmd_stats(store: &Store, user_name: &str) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movies = store.list_movies(user.id)?;

    let Some(stats) = catalog::stats(&movies) else {
        println!("No movies to analyze.");
        return Ok(());
    };

    println!("Movies:   {}", stats.count);
    println!("Average:  {:.1}", stats.average);
    println!("Median:   {:.1}", stats.median);
    println!("Best:     {}", stats.best.join(", "));
    println!("Worst:    {}", stats.worst.join(", "));
    Ok(())
}

fn cmd_random(store: &Store, user_name: &str) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movies = store.list_movies(user.id)?;

    match catalog::pick_random(&movies, &mut rand::thread_rng()) {
        Some(movie) => println!("Random movie: {} ({}) - {:.1}/10", movie.title, movie.year, movie.rating),
        None => println!("No movies available."),
    }
    Ok(())
}

fn cmd_search(store: &Store, user_name: &str, keyword: &str) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movies = store.list_movies(user.id)?;
    let found = catalog::search(&movies, keyword);

    if found.is_empty() {
        let close = catalog::suggest(&movies, keyword, MAX_SUGGESTIONS);
        if close.is_empty() {
            println!("No matching movies found.");
        } else {
            println!("No exact match found. Did you mean:");
            println!();
            print_table(&close);
        }
        return Ok(());
    }
    print_table(&found);
    Ok(())
}

fn cmd_filter(store: &Store, user_name: &str, criteria: &MovieFilter) -> Result<()> {
    let user = require_user(store, user_name)?;
    let movies = store.list_movies(user.id)?;
    let filtered = catalog::filter(&movies, criteria);

    if filtered.is_empty() {
        println!("No movies matched the given criteria.");
        return Ok(());
    }
    println!("Filtered movies for {}:", user.name);
    println!();
    print_table(&filtered);
    Ok(())
}

// --- Helper Functions ---

fn ordered_movies(movies: &MovieList, sort: SortKey, reverse: bool) -> Vec<&Movie> {
    let mut ordered: Vec<&Movie> = match sort {
        SortKey::Title => movies.iter().collect(),
        SortKey::Rating => catalog::sorted_by_rating(movies),
        // Keeps title order within a year in both directions
        SortKey::Year => return catalog::sorted_by_year(movies, reverse),
    };
    if reverse {
        ordered.reverse();
    }
    ordered
}

fn require_user(store: &Store, name: &str) -> Result<User> {
    store
        .require_user(name)
        .with_context(|| format!("Use 'cinelog user {}' to create it.", name))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    // RUST_LOG wins over -v
    builder.parse_default_env();
    builder.init();
}

fn nullable_update(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.map(Some)
    }
}

/// User names are compared exactly, so surrounding whitespace is dropped here once.
fn parse_user_name(s: &str) -> std::result::Result<String, String> {
    let name = s.trim();
    if name.is_empty() {
        return Err("user name cannot be empty".to_string());
    }
    Ok(name.to_string())
}

fn parse_rating(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.trim().parse().map_err(|_| format!("'{}' is not a number", s))?;
    if !(RATING_MIN..=RATING_MAX).contains(&value) {
        return Err(format!("rating must be between {} and {}", RATING_MIN, RATING_MAX));
    }
    Ok(value)
}

fn parse_year(s: &str) -> std::result::Result<i64, String> {
    let value: i64 = s.trim().parse().map_err(|_| format!("'{}' is not an integer", s))?;
    if !(YEAR_MIN..=YEAR_MAX).contains(&value) {
        return Err(format!("year must be between {} and {}", YEAR_MIN, YEAR_MAX));
    }
    Ok(value)
}

fn print_table(movies: &[&Movie]) {
    println!("{:>4}  {:>6}  {:>6}  {}", "#", "Year", "Rating", "Title");
    println!("{}", "-".repeat(60));

    for (idx, movie) in movies.iter().enumerate() {
        let title = if movie.title.chars().count() > 40 {
            format!("{}...", movie.title.chars().take(37).collect::<String>())
        } else {
            movie.title.clone()
        };
        println!("{:>4}  {:>6}  {:>6.1}  {}", idx + 1, movie.year, movie.rating, title);
    }
}
