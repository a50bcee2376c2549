//! the `invites` subcommand - manage signup invites from the shell.

use clap::{Args, Subcommand};
use color_eyre::eyre::{Context, Result, bail};
use groundwave_db::{Database, GroundwaveDb};
use groundwave_types::{DatabaseConfig, Invite, InviteId, InviteToken, Role};
use secrecy::SecretString;

use crate::handlers::invites::invite_url;

/// manage invites
#[derive(Subcommand, Debug)]
pub enum InvitesCommand {
    /// create a new invite
    Create(CreateArgs),

    /// list all invites
    List(ListArgs),
}

/// database connection arguments
#[derive(Args, Debug)]
pub struct DbArgs {
    /// database url (sqlite:// or postgres://)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: String,

    /// public url of this instance, for invite links
    #[arg(long, env = "GROUNDWAVE_BASE_URL", default_value = "http://localhost:8080")]
    base_url: String,
}

impl DbArgs {
    async fn connect(&self) -> Result<GroundwaveDb> {
        let config = DatabaseConfig {
            url: Some(SecretString::from(self.database_url.clone())),
            max_connections: Some(1),
        };
        let db = GroundwaveDb::new(&config)
            .await
            .context("failed to connect to database")?;
        db.migrate()
            .await
            .context("failed to run database migrations")?;
        Ok(db)
    }
}

/// create an invite
#[derive(Args, Debug)]
pub struct CreateArgs {
    #[command(flatten)]
    db: DbArgs,

    /// role of the invited user (admin or member)
    #[arg(long, default_value = "member")]
    role: Role,
}

/// list invites
#[derive(Args, Debug)]
pub struct ListArgs {
    #[command(flatten)]
    db: DbArgs,

    /// output format (table, json)
    #[arg(short, long, default_value = "table")]
    output: String,
}

impl InvitesCommand {
    /// run the invites command
    pub async fn run(self) -> Result<()> {
        match self {
            InvitesCommand::Create(args) => create(args).await,
            InvitesCommand::List(args) => list(args).await,
        }
    }
}

async fn create(args: CreateArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let Some(admin) = db
        .list_users()
        .await
        .context("failed to list users")?
        .into_iter()
        .find(|u| u.is_admin)
    else {
        bail!("no administrator exists yet; finish setup in the browser first");
    };

    let invite = Invite {
        id: InviteId(0),
        token: InviteToken::generate(),
        created_by: admin.id,
        target_role: args.role,
        created_at: chrono::Utc::now(),
        consumed_at: None,
        consumed_by: None,
    };
    let invite = db
        .create_invite(&invite)
        .await
        .context("failed to create invite")?;

    println!("{}", invite_url(&args.db.base_url, invite.token.as_str()));
    Ok(())
}

async fn list(args: ListArgs) -> Result<()> {
    let db = args.db.connect().await?;
    let invites = db.list_invites().await.context("failed to list invites")?;

    if args.output == "json" {
        println!("{}", serde_json::to_string_pretty(&invites)?);
        return Ok(());
    }

    println!("{:<6} {:<8} {:<10} {:<25}", "ID", "ROLE", "STATUS", "CREATED");
    for invite in &invites {
        let status = if invite.is_consumed() { "used" } else { "open" };
        println!(
            "{:<6} {:<8} {:<10} {:<25}",
            invite.id,
            invite.target_role,
            status,
            invite.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
