use academy::auth::hash_password;
use academy::error::AppResult;
use academy::model::entity::{Course, UserCreate, UserEntity};
use academy::model::{CrudRepository, DatabaseError, DbConnection, ModelManager};
use academy::web::UserRole;
use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(about = "Administration tool for the academy database", long_about = None)]
pub struct Cli {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Manage courses
    Course {
        #[command(subcommand)]
        action: CourseCommands,
    },
}

/// User management
#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// Admins cannot register through the API, this is how they are made.
    CreateAdmin {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    SetRole {
        #[arg(long)]
        email: String,
        #[arg(long, value_enum)]
        role: Role,
    },
}

/// Course management
#[derive(Subcommand, Debug)]
pub enum CourseCommands {
    /// Approves and publishes a course waiting for review
    Approve {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Role {
    Student,
    Instructor,
    Admin,
}

impl From<Role> for UserRole {
    fn from(role: Role) -> Self {
        match role {
            Role::Student => UserRole::Student,
            Role::Instructor => UserRole::Instructor,
            Role::Admin => UserRole::Admin,
        }
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    let _ = dotenvy::dotenv();
    let args = Cli::parse();

    let db_con = DbConnection::connect(&args.database_url)?;
    let mm = ModelManager::new(db_con);

    match args.command {
        Commands::User { action } => match action {
            UserCommands::CreateAdmin {
                name,
                email,
                password,
            } => {
                let user = UserEntity::create(
                    &mm,
                    UserCreate {
                        name,
                        email: email.trim().to_lowercase(),
                        password_hash: Some(hash_password(&password)?),
                        role: UserRole::Admin,
                        google_id: None,
                        avatar_url: None,
                    },
                )
                .await?;
                println!("Admin created: {} <{}>", user.id(), user.email());
            }
            UserCommands::SetRole { email, role } => {
                let user = UserEntity::find_by_email(&mm, &email)
                    .await?
                    .ok_or(DatabaseError::NotFound)?;
                let updated = UserEntity::set_role(&mm, user.id(), role.into())
                    .await?
                    .ok_or(DatabaseError::NotFound)?;
                println!("{} is now {}", updated.email(), updated.role());
            }
        },

        Commands::Course { action } => match action {
            CourseCommands::Approve { id } => {
                let course = Course::approve(&mm, id).await?;
                println!("Course approved: {} ({})", course.title(), course.id());
            }
        },
    }

    mm.close().await;
    Ok(())
}
