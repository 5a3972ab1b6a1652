use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lccrm_student::api::types::{LessonsQuery, PageQuery, PictureSource, ProfileChanges};
use lccrm_student::commands::{self, ListKind};
use lccrm_student::{AppState, Language, PortalConfig};

#[derive(Parser, Debug)]
#[command(name = "lccrm-student", about = "Student portal client")]
struct Args {
    /// API host, e.g. https://lccrm.uz (overrides LCCRM_API_HOST)
    #[arg(long)]
    host: Option<String>,

    /// Interface language: uz, ru or en (overrides LCCRM_LANGUAGE)
    #[arg(long)]
    language: Option<Language>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct Page {
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    offset: Option<u32>,
    #[arg(long)]
    ordering: Option<String>,
}

impl From<Page> for PageQuery {
    fn from(page: Page) -> Self {
        PageQuery {
            limit: page.limit,
            offset: page.offset,
            ordering: page.ordering,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        username: String,
        /// Falls back to LCCRM_PASSWORD
        #[arg(long)]
        password: Option<String>,
    },
    /// Log out and clear the stored session
    Logout,
    /// Resume the stored session (refreshes tokens)
    Restore,
    /// Exchange the refresh token for a new pair
    Refresh,
    /// Show the student profile
    Profile,
    /// Update profile fields and/or picture
    UpdateProfile {
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        /// Local image file to upload
        #[arg(long, conflicts_with = "picture_url")]
        picture: Option<PathBuf>,
        /// Already-hosted picture URL
        #[arg(long)]
        picture_url: Option<String>,
    },
    Coins(Page),
    Notifications(Page),
    /// Mark notifications as read
    MarkRead(Page),
    Ratings(Page),
    Groups(Page),
    /// Group details with its lessons
    Group { group_id: i64 },
    /// Lesson materials
    Lesson { group_id: i64, lesson_id: i64 },
    /// Lessons for a month
    Lessons {
        #[arg(long)]
        month: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
        #[command(flatten)]
        page: Page,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    env_logger::init();

    let args = Args::parse();

    let mut config = match PortalConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(2);
        }
    };
    if let Some(host) = args.host {
        config.api_host = host.trim_end_matches('/').to_string();
    }
    if let Some(language) = args.language {
        config.language = language;
    }

    log::debug!("Using {} ({})", config.api_host, config.language);
    let state = AppState::new(&config);

    match run(&state, args.command).await {
        Ok(output) => match serde_json::to_string_pretty(&output) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                log::error!("Failed to print result: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            log::error!("{}", e);
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run(state: &AppState, command: Command) -> Result<serde_json::Value, String> {
    match command {
        Command::Login { username, password } => {
            let password = password
                .or_else(|| std::env::var("LCCRM_PASSWORD").ok())
                .ok_or_else(|| "Password required (--password or LCCRM_PASSWORD)".to_string())?;
            commands::login(state, &username, &password).await
        }
        Command::Logout => commands::logout(state).await,
        Command::Restore => commands::try_silent_refresh(state).await,
        Command::Refresh => commands::refresh(state).await,
        Command::Profile => commands::profile(state).await,
        Command::UpdateProfile {
            first_name,
            last_name,
            email,
            phone,
            picture,
            picture_url,
        } => {
            let changes = ProfileChanges {
                first_name,
                last_name,
                email,
                phone,
                picture: picture
                    .map(PictureSource::File)
                    .or(picture_url.map(PictureSource::Url)),
            };
            commands::update_profile(state, &changes).await
        }
        Command::Coins(page) => commands::list(state, ListKind::Coins, &page.into()).await,
        Command::Notifications(page) => {
            commands::list(state, ListKind::Notifications, &page.into()).await
        }
        Command::MarkRead(page) => commands::list(state, ListKind::MarkRead, &page.into()).await,
        Command::Ratings(page) => commands::list(state, ListKind::Ratings, &page.into()).await,
        Command::Groups(page) => commands::list(state, ListKind::Groups, &page.into()).await,
        Command::Group { group_id } => commands::group(state, group_id).await,
        Command::Lesson {
            group_id,
            lesson_id,
        } => commands::lesson(state, group_id, lesson_id).await,
        Command::Lessons { month, year, page } => {
            let query = LessonsQuery {
                page: page.into(),
                month,
                year,
            };
            commands::lessons(state, &query).await
        }
    }
}
