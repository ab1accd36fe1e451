use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use smartdoor::{
    matcher::FaceImage,
    storage::{AccessStore, NewUser, Role},
    SmartDoorConfig,
};
use tracing::info;

/// Create users and enroll reference faces in the smartdoor database.
#[derive(Parser, Debug)]
#[command(name = "enrolltool")]
#[command(about = "Create smartdoor users and enroll their reference face images")]
struct Args {
    /// Path to smartdoor configuration file (for the database location)
    #[arg(short = 'c', long, default_value = "smartdoor.toml")]
    config: PathBuf,

    /// Username to enroll
    #[arg(short, long, required_unless_present = "list")]
    username: Option<String>,

    /// Display name announced on the status feed
    #[arg(short, long)]
    name: Option<String>,

    /// Reference face image (JPEG or PNG)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Identifier of the enrolled face
    #[arg(long, default_value = "primary")]
    face_id: String,

    /// Create the user when it does not exist yet
    #[arg(long)]
    create: bool,

    /// Create the user as an administrator
    #[arg(long, requires = "create")]
    admin: bool,

    /// Access level for a new administrator
    #[arg(long, requires = "admin")]
    access: Option<String>,

    /// Phone number for a new user
    #[arg(long, requires = "create")]
    phone: Option<String>,

    /// List enrolled identities and exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let config = SmartDoorConfig::load_from_file(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let store = AccessStore::open(&config.storage.database_path, config.timezone())
        .with_context(|| format!("opening {}", config.storage.database_path))?;

    if args.list {
        for identity in store.load_identities()? {
            println!(
                "{}\tuser {}\t{} bytes",
                identity.name,
                identity.user_id,
                identity.face_image.len()
            );
        }
        return Ok(());
    }

    let username = args
        .username
        .clone()
        .ok_or_else(|| anyhow!("--username is required"))?;

    let user_id = match store.find_user_by_username(&username)? {
        Some(user) => {
            if args.create {
                info!("User '{}' already exists (id {})", username, user.id);
            }
            user.id
        }
        None if args.create => {
            let role = if args.admin {
                Role::Admin {
                    access: args.access.clone(),
                }
            } else {
                Role::default()
            };
            let user_id = store.create_user(&NewUser {
                username: username.clone(),
                name: args.name.clone(),
                account: None,
                phone: args.phone.clone(),
                role,
            })?;
            let kind = if args.admin { "admin" } else { "normal" };
            println!("Created {} user '{}' (id {})", kind, username, user_id);
            user_id
        }
        None => bail!("User '{}' does not exist; pass --create to add it", username),
    };

    let Some(image_path) = &args.image else {
        return Ok(());
    };

    let bytes = std::fs::read(image_path)
        .with_context(|| format!("reading {}", image_path.display()))?;
    let face = FaceImage::decode(bytes)
        .with_context(|| format!("{} is not a readable image", image_path.display()))?;

    let identity_id =
        store.enroll_identity(user_id, &args.face_id, args.name.as_deref(), &face.bytes)?;
    println!(
        "Enrolled {}x{} {:?} face for '{}' (identity {})",
        face.width, face.height, face.format, username, identity_id
    );

    Ok(())
}
