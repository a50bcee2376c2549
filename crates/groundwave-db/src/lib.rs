//! database layer for groundwave.
//!
//! this crate provides persistent storage for:
//! - users, passkeys and invites
//! - browser sessions
//! - contacts and their chat history
//! - zettels and the zettel link graph
//! - the qso logbook
//! - the linked whatsapp device

#![warn(missing_docs)]

mod entity;
mod error;
mod migration;
mod records;

pub use error::Error;
pub use records::{
    PasskeyRecord, QsoImport, Registration, SessionRecord, WhatsAppDeviceRecord, ZettelRecord,
};

use std::collections::BTreeSet;
use std::future::Future;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database as SeaOrmDatabase,
    DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use secrecy::ExposeSecret;
use tracing::debug;

use groundwave_adif::Qso;
use groundwave_types::{
    ChatEntry, Contact, ContactId, DatabaseConfig, Invite, InviteId, InviteToken, NewChatEntry,
    User, UserId,
};

/// result type for database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// rows per insert statement when rewriting the link tables.
const LINK_BATCH: usize = 500;

/// the whatsapp device table holds a single row with this id.
const WHATSAPP_DEVICE_ROW: i64 = 1;

/// database trait for groundwave storage operations.
///
/// this trait abstracts over the database backend (postgresql in
/// production, sqlite in tests). multi-row invariants (setup only once,
/// invites consumed once, never deleting a user's last passkey, back links
/// mirroring forward links) are enforced inside transactions here.
pub trait Database: Send + Sync {
    // ─── Health Check ─────────────────────────────────────────────────────────

    /// ping the database to verify connectivity.
    fn ping(&self) -> impl Future<Output = Result<()>> + Send;

    // ─── Users & Passkeys ────────────────────────────────────────────────────

    /// number of users; zero means setup mode.
    fn count_users(&self) -> impl Future<Output = Result<u64>> + Send;

    /// get a user by id.
    fn get_user(&self, id: UserId) -> impl Future<Output = Result<Option<User>>> + Send;

    /// get a user by webauthn user handle.
    fn get_user_by_handle(
        &self,
        handle: uuid::Uuid,
    ) -> impl Future<Output = Result<Option<User>>> + Send;

    /// list all users.
    fn list_users(&self) -> impl Future<Output = Result<Vec<User>>> + Send;

    /// create a user and their first passkey, consuming the invite if any.
    ///
    /// fails with [`Error::Conflict`] when setup is already done or the
    /// invite was consumed in the meantime.
    fn register_user(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<(User, PasskeyRecord)>> + Send;

    /// add another passkey to an existing user.
    fn create_passkey(
        &self,
        passkey: &PasskeyRecord,
    ) -> impl Future<Output = Result<PasskeyRecord>> + Send;

    /// list a user's passkeys, oldest first.
    fn list_passkeys(
        &self,
        user_id: UserId,
    ) -> impl Future<Output = Result<Vec<PasskeyRecord>>> + Send;

    /// every passkey of every user.
    fn list_all_passkeys(&self) -> impl Future<Output = Result<Vec<PasskeyRecord>>> + Send;

    /// find a passkey by its base64url credential id.
    fn get_passkey_by_credential_id(
        &self,
        credential_id: &str,
    ) -> impl Future<Output = Result<Option<PasskeyRecord>>> + Send;

    /// store the credential state and sign count after a successful assertion.
    fn record_passkey_use(
        &self,
        id: u64,
        credential: &str,
        sign_count: u32,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// rename one of the user's passkeys.
    fn rename_passkey(
        &self,
        user_id: UserId,
        id: u64,
        name: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    /// delete one of the user's passkeys; the last one is refused.
    fn delete_passkey(&self, user_id: UserId, id: u64) -> impl Future<Output = Result<()>> + Send;

    // ─── Invites ─────────────────────────────────────────────────────────────

    /// create an invite. returns it with its assigned id.
    fn create_invite(&self, invite: &Invite) -> impl Future<Output = Result<Invite>> + Send;

    /// get an invite by id.
    fn get_invite(&self, id: InviteId) -> impl Future<Output = Result<Option<Invite>>> + Send;

    /// get an invite by token.
    fn get_invite_by_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<Option<Invite>>> + Send;

    /// list all invites, newest first.
    fn list_invites(&self) -> impl Future<Output = Result<Vec<Invite>>> + Send;

    /// replace the token of an unconsumed invite.
    fn regenerate_invite(
        &self,
        id: InviteId,
        token: &InviteToken,
    ) -> impl Future<Output = Result<Invite>> + Send;

    /// delete an unconsumed invite.
    fn delete_invite(&self, id: InviteId) -> impl Future<Output = Result<()>> + Send;

    // ─── Sessions ────────────────────────────────────────────────────────────

    /// insert a new session.
    fn create_session(&self, session: &SessionRecord) -> impl Future<Output = Result<()>> + Send;

    /// get a session by id, expired ones included.
    fn get_session(&self, id: &str) -> impl Future<Output = Result<Option<SessionRecord>>> + Send;

    /// overwrite a session.
    fn save_session(&self, session: &SessionRecord) -> impl Future<Output = Result<()>> + Send;

    /// record device, ip and activity time.
    fn touch_session(
        &self,
        id: &str,
        device: &str,
        ip: &str,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// delete a session.
    fn delete_session(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// swap session `old_id` for `session` (a new id) in one transaction.
    fn replace_session(
        &self,
        old_id: &str,
        session: &SessionRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// a user's unexpired sessions, most recently active first.
    fn list_user_sessions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<SessionRecord>>> + Send;

    /// delete every session of the user except `keep`. returns how many went.
    fn delete_user_sessions_except(
        &self,
        user_id: UserId,
        keep: &str,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// delete sessions past their absolute expiry. returns how many went.
    fn delete_expired_sessions(&self, now: DateTime<Utc>)
    -> impl Future<Output = Result<u64>> + Send;

    // ─── Contacts ────────────────────────────────────────────────────────────

    /// create a contact. returns it with its assigned id.
    fn create_contact(&self, contact: &Contact) -> impl Future<Output = Result<Contact>> + Send;

    /// get a contact by id.
    fn get_contact(&self, id: ContactId) -> impl Future<Output = Result<Option<Contact>>> + Send;

    /// list all contacts by name.
    fn list_contacts(&self) -> impl Future<Output = Result<Vec<Contact>>> + Send;

    /// raise `last_auto_contact_at` to `at` unless it is already later.
    ///
    /// returns whether the row changed.
    fn record_auto_contact(
        &self,
        id: ContactId,
        at: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// append a chat message to a contact's history.
    fn add_chat_entry(&self, entry: &NewChatEntry) -> impl Future<Output = Result<ChatEntry>> + Send;

    /// a contact's chat history, oldest first.
    fn list_chat_entries(
        &self,
        contact_id: ContactId,
    ) -> impl Future<Output = Result<Vec<ChatEntry>>> + Send;

    // ─── Zettels ─────────────────────────────────────────────────────────────

    /// get a zettel by id.
    fn get_zettel(&self, id: &str) -> impl Future<Output = Result<Option<ZettelRecord>>> + Send;

    /// list all zettels by title.
    fn list_zettels(&self) -> impl Future<Output = Result<Vec<ZettelRecord>>> + Send;

    /// upsert one zettel and its forward links, then refresh the back links
    /// of the note and of every note it links or used to link to.
    fn ingest_zettel(
        &self,
        zettel: &ZettelRecord,
        targets: &BTreeSet<String>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// rewrite the whole link graph: forward links as given, back links as
    /// their exact inverse.
    fn rebuild_links(
        &self,
        links: &[(String, BTreeSet<String>)],
    ) -> impl Future<Output = Result<()>> + Send;

    /// every (source, target) forward link.
    fn list_forward_links(&self) -> impl Future<Output = Result<Vec<(String, String)>>> + Send;

    /// every (target, source) back link.
    fn list_back_links(&self) -> impl Future<Output = Result<Vec<(String, String)>>> + Send;

    // ─── QSOs ────────────────────────────────────────────────────────────────

    /// insert qsos not yet in the log.
    fn import_qsos(&self, qsos: &[Qso]) -> impl Future<Output = Result<QsoImport>> + Send;

    /// the whole log, newest first.
    fn list_qsos(&self) -> impl Future<Output = Result<Vec<Qso>>> + Send;

    // ─── WhatsApp ────────────────────────────────────────────────────────────

    /// the stored device, if one was ever saved.
    fn load_whatsapp_device(
        &self,
    ) -> impl Future<Output = Result<Option<WhatsAppDeviceRecord>>> + Send;

    /// store the device, replacing any previous one.
    fn save_whatsapp_device(
        &self,
        device: &WhatsAppDeviceRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// forget the device.
    fn delete_whatsapp_device(&self) -> impl Future<Output = Result<()>> + Send;
}

/// the main database implementation using sea-orm.
#[derive(Clone)]
pub struct GroundwaveDb {
    conn: DatabaseConnection,
}

impl GroundwaveDb {
    /// connect using the configured url and run migrations.
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_ref()
            .ok_or_else(|| Error::Connection("no database url configured".to_string()))?;
        let url = Self::build_connection_url(url.expose_secret())?;

        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(max) = config.max_connections {
            options.max_connections(max);
        }

        let conn = SeaOrmDatabase::connect(options)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// normalise a database url for sea-orm.
    fn build_connection_url(url: &str) -> Result<String> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(url.to_string())
        } else if url.starts_with("sqlite:") {
            // create the file if it doesn't exist
            if url.contains('?') || url.contains(":memory:") {
                Ok(url.to_string())
            } else {
                Ok(format!("{}?mode=rwc", url))
            }
        } else {
            Err(Error::Connection(
                "unsupported database url, expected postgres:// or sqlite:".to_string(),
            ))
        }
    }

    /// create an in-memory sqlite database for testing.
    pub async fn new_in_memory() -> Result<Self> {
        let conn: DatabaseConnection = SeaOrmDatabase::connect("sqlite::memory:")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        let db = Self { conn };
        db.migrate().await?;
        Ok(db)
    }

    /// run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        migration::Migrator::up(&self.conn, None)
            .await
            .map_err(|e| Error::Migration(e.to_string()))?;
        debug!("database schema is current");
        Ok(())
    }
}

/// rebuild the back links pointing at `targets` from the forward table.
async fn refresh_back_links<C: ConnectionTrait>(conn: &C, targets: &BTreeSet<String>) -> Result<()> {
    use entity::{zettel_back_link as back, zettel_forward_link as fwd};

    if targets.is_empty() {
        return Ok(());
    }
    let targets: Vec<String> = targets.iter().cloned().collect();

    back::Entity::delete_many()
        .filter(back::Column::TargetId.is_in(targets.clone()))
        .exec(conn)
        .await?;

    let sources = fwd::Entity::find()
        .filter(fwd::Column::TargetId.is_in(targets))
        .all(conn)
        .await?;
    insert_back_links(conn, sources.into_iter().map(|l| (l.source_id, l.target_id))).await
}

async fn insert_forward_links<C, I>(conn: &C, links: I) -> Result<()>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = (String, String)>,
{
    use entity::zettel_forward_link as fwd;

    let rows: Vec<fwd::ActiveModel> = links
        .into_iter()
        .map(|(source_id, target_id)| fwd::ActiveModel {
            source_id: Set(source_id),
            target_id: Set(target_id),
        })
        .collect();
    for chunk in rows.chunks(LINK_BATCH) {
        fwd::Entity::insert_many(chunk.to_vec()).exec(conn).await?;
    }
    Ok(())
}

/// insert back links for the given (source, target) forward pairs.
async fn insert_back_links<C, I>(conn: &C, links: I) -> Result<()>
where
    C: ConnectionTrait,
    I: IntoIterator<Item = (String, String)>,
{
    use entity::zettel_back_link as back;

    let rows: Vec<back::ActiveModel> = links
        .into_iter()
        .map(|(source_id, target_id)| back::ActiveModel {
            target_id: Set(target_id),
            source_id: Set(source_id),
        })
        .collect();
    for chunk in rows.chunks(LINK_BATCH) {
        back::Entity::insert_many(chunk.to_vec()).exec(conn).await?;
    }
    Ok(())
}

impl Database for GroundwaveDb {
    // health check

    async fn ping(&self) -> Result<()> {
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(())
    }

    // users & passkeys

    async fn count_users(&self) -> Result<u64> {
        Ok(entity::user::Entity::find().count(&self.conn).await?)
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        let result = entity::user::Entity::find_by_id(id.0 as i64)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn get_user_by_handle(&self, handle: uuid::Uuid) -> Result<Option<User>> {
        let result = entity::user::Entity::find()
            .filter(entity::user::Column::WebauthnHandle.eq(handle))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_users(&self) -> Result<Vec<User>> {
        let results = entity::user::Entity::find()
            .order_by_asc(entity::user::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn register_user(&self, registration: &Registration) -> Result<(User, PasskeyRecord)> {
        use entity::invite;

        let txn = self.conn.begin().await?;

        if registration.invite.is_none() && entity::user::Entity::find().count(&txn).await? > 0 {
            return Err(Error::Conflict("setup has already been completed".to_string()));
        }

        let model: entity::user::ActiveModel = (&registration.user).into();
        let user: User = model.insert(&txn).await?.into();

        if let Some(invite_id) = registration.invite {
            let result = invite::Entity::update_many()
                .col_expr(invite::Column::ConsumedAt, Expr::value(Utc::now()))
                .col_expr(invite::Column::ConsumedBy, Expr::value(user.id.0 as i64))
                .filter(invite::Column::Id.eq(invite_id.0 as i64))
                .filter(invite::Column::ConsumedAt.is_null())
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(Error::Conflict("invite is no longer valid".to_string()));
            }
        }

        let mut passkey = registration.passkey.clone();
        passkey.id = 0;
        passkey.user_id = user.id;
        let model: entity::passkey::ActiveModel = (&passkey).into();
        let passkey: PasskeyRecord = model.insert(&txn).await?.into();

        txn.commit().await?;
        Ok((user, passkey))
    }

    async fn create_passkey(&self, passkey: &PasskeyRecord) -> Result<PasskeyRecord> {
        let mut passkey = passkey.clone();
        passkey.id = 0;
        let model: entity::passkey::ActiveModel = (&passkey).into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn list_passkeys(&self, user_id: UserId) -> Result<Vec<PasskeyRecord>> {
        let results = entity::passkey::Entity::find()
            .filter(entity::passkey::Column::UserId.eq(user_id.0 as i64))
            .order_by_asc(entity::passkey::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn list_all_passkeys(&self) -> Result<Vec<PasskeyRecord>> {
        let results = entity::passkey::Entity::find()
            .order_by_asc(entity::passkey::Column::Id)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn get_passkey_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<PasskeyRecord>> {
        let result = entity::passkey::Entity::find()
            .filter(entity::passkey::Column::CredentialId.eq(credential_id))
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn record_passkey_use(
        &self,
        id: u64,
        credential: &str,
        sign_count: u32,
        at: DateTime<Utc>,
    ) -> Result<()> {
        use entity::passkey;

        passkey::Entity::update_many()
            .col_expr(passkey::Column::Credential, Expr::value(credential))
            .col_expr(passkey::Column::SignCount, Expr::value(i64::from(sign_count)))
            .col_expr(passkey::Column::LastUsedAt, Expr::value(at))
            .filter(passkey::Column::Id.eq(id as i64))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn rename_passkey(&self, user_id: UserId, id: u64, name: &str) -> Result<()> {
        use entity::passkey;

        let result = passkey::Entity::update_many()
            .col_expr(passkey::Column::Name, Expr::value(name))
            .filter(passkey::Column::Id.eq(id as i64))
            .filter(passkey::Column::UserId.eq(user_id.0 as i64))
            .exec(&self.conn)
            .await?;
        if result.rows_affected == 0 {
            return Err(Error::NotFound("passkey"));
        }
        Ok(())
    }

    async fn delete_passkey(&self, user_id: UserId, id: u64) -> Result<()> {
        use entity::passkey;

        let txn = self.conn.begin().await?;
        let owned = passkey::Entity::find()
            .filter(passkey::Column::UserId.eq(user_id.0 as i64))
            .all(&txn)
            .await?;
        if !owned.iter().any(|k| k.id == id as i64) {
            return Err(Error::NotFound("passkey"));
        }
        if owned.len() <= 1 {
            return Err(Error::Conflict("cannot delete your last passkey".to_string()));
        }
        passkey::Entity::delete_by_id(id as i64).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    // invites

    async fn create_invite(&self, invite: &Invite) -> Result<Invite> {
        let model: entity::invite::ActiveModel = invite.into();
        let result = model.insert(&self.conn).await?;
        result.try_into()
    }

    async fn get_invite(&self, id: InviteId) -> Result<Option<Invite>> {
        entity::invite::Entity::find_by_id(id.0 as i64)
            .one(&self.conn)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn get_invite_by_token(&self, token: &str) -> Result<Option<Invite>> {
        entity::invite::Entity::find()
            .filter(entity::invite::Column::Token.eq(token))
            .one(&self.conn)
            .await?
            .map(TryInto::try_into)
            .transpose()
    }

    async fn list_invites(&self) -> Result<Vec<Invite>> {
        entity::invite::Entity::find()
            .order_by_desc(entity::invite::Column::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    async fn regenerate_invite(&self, id: InviteId, token: &InviteToken) -> Result<Invite> {
        use entity::invite;

        let txn = self.conn.begin().await?;
        let existing = invite::Entity::find_by_id(id.0 as i64)
            .one(&txn)
            .await?
            .ok_or(Error::NotFound("invite"))?;
        if existing.consumed_at.is_some() {
            return Err(Error::Conflict("invite has already been used".to_string()));
        }
        let mut model: invite::ActiveModel = existing.into();
        model.token = Set(token.as_str().to_string());
        let updated = model.update(&txn).await?;
        txn.commit().await?;
        updated.try_into()
    }

    async fn delete_invite(&self, id: InviteId) -> Result<()> {
        use entity::invite;

        let txn = self.conn.begin().await?;
        let existing = invite::Entity::find_by_id(id.0 as i64)
            .one(&txn)
            .await?
            .ok_or(Error::NotFound("invite"))?;
        if existing.consumed_at.is_some() {
            return Err(Error::Conflict("invite has already been used".to_string()));
        }
        invite::Entity::delete_by_id(existing.id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    // sessions

    async fn create_session(&self, session: &SessionRecord) -> Result<()> {
        let model: entity::session::ActiveModel = session.into();
        model.insert(&self.conn).await?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>> {
        let result = entity::session::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn save_session(&self, session: &SessionRecord) -> Result<()> {
        let model: entity::session::ActiveModel = session.into();
        model.update(&self.conn).await?;
        Ok(())
    }

    async fn touch_session(&self, id: &str, device: &str, ip: &str, at: DateTime<Utc>) -> Result<()> {
        use entity::session;

        session::Entity::update_many()
            .col_expr(session::Column::Device, Expr::value(device))
            .col_expr(session::Column::Ip, Expr::value(ip))
            .col_expr(session::Column::LastActivityAt, Expr::value(at))
            .filter(session::Column::Id.eq(id))
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        entity::session::Entity::delete_by_id(id.to_string())
            .exec(&self.conn)
            .await?;
        Ok(())
    }

    async fn replace_session(&self, old_id: &str, session: &SessionRecord) -> Result<()> {
        let txn = self.conn.begin().await?;
        entity::session::Entity::delete_by_id(old_id.to_string())
            .exec(&txn)
            .await?;
        let model: entity::session::ActiveModel = session.into();
        model.insert(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn list_user_sessions(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        use entity::session;

        let results = session::Entity::find()
            .filter(session::Column::UserId.eq(user_id.0 as i64))
            .filter(session::Column::AbsoluteExpiresAt.gt(now))
            .order_by_desc(session::Column::LastActivityAt)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn delete_user_sessions_except(&self, user_id: UserId, keep: &str) -> Result<u64> {
        use entity::session;

        let result = session::Entity::delete_many()
            .filter(session::Column::UserId.eq(user_id.0 as i64))
            .filter(session::Column::Id.ne(keep))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        use entity::session;

        let result = session::Entity::delete_many()
            .filter(session::Column::AbsoluteExpiresAt.lte(now))
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected)
    }

    // contacts

    async fn create_contact(&self, contact: &Contact) -> Result<Contact> {
        let model: entity::contact::ActiveModel = contact.into();
        let result = model.insert(&self.conn).await?;
        Ok(result.into())
    }

    async fn get_contact(&self, id: ContactId) -> Result<Option<Contact>> {
        let result = entity::contact::Entity::find_by_id(id.0 as i64)
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>> {
        let results = entity::contact::Entity::find()
            .order_by_asc(entity::contact::Column::Name)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn record_auto_contact(&self, id: ContactId, at: DateTime<Utc>) -> Result<bool> {
        use entity::contact;
        use sea_orm::Condition;

        let result = contact::Entity::update_many()
            .col_expr(contact::Column::LastAutoContactAt, Expr::value(at))
            .filter(contact::Column::Id.eq(id.0 as i64))
            .filter(
                Condition::any()
                    .add(contact::Column::LastAutoContactAt.is_null())
                    .add(contact::Column::LastAutoContactAt.lt(at)),
            )
            .exec(&self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn add_chat_entry(&self, entry: &NewChatEntry) -> Result<ChatEntry> {
        let model: entity::chat_entry::ActiveModel = entry.into();
        let result = model.insert(&self.conn).await?;
        result.try_into()
    }

    async fn list_chat_entries(&self, contact_id: ContactId) -> Result<Vec<ChatEntry>> {
        use entity::chat_entry;

        chat_entry::Entity::find()
            .filter(chat_entry::Column::ContactId.eq(contact_id.0 as i64))
            .order_by_asc(chat_entry::Column::SentAt)
            .order_by_asc(chat_entry::Column::Id)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    // zettels

    async fn get_zettel(&self, id: &str) -> Result<Option<ZettelRecord>> {
        let result = entity::zettel::Entity::find_by_id(id.to_string())
            .one(&self.conn)
            .await?;
        Ok(result.map(Into::into))
    }

    async fn list_zettels(&self) -> Result<Vec<ZettelRecord>> {
        let results = entity::zettel::Entity::find()
            .order_by_asc(entity::zettel::Column::Title)
            .all(&self.conn)
            .await?;
        Ok(results.into_iter().map(Into::into).collect())
    }

    async fn ingest_zettel(&self, zettel: &ZettelRecord, targets: &BTreeSet<String>) -> Result<()> {
        use entity::{zettel as note, zettel_forward_link as fwd};

        let txn = self.conn.begin().await?;

        let model: note::ActiveModel = zettel.into();
        if note::Entity::find_by_id(zettel.id.clone())
            .one(&txn)
            .await?
            .is_some()
        {
            model.update(&txn).await?;
        } else {
            model.insert(&txn).await?;
        }

        let previous: BTreeSet<String> = fwd::Entity::find()
            .filter(fwd::Column::SourceId.eq(zettel.id.as_str()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|l| l.target_id)
            .collect();

        fwd::Entity::delete_many()
            .filter(fwd::Column::SourceId.eq(zettel.id.as_str()))
            .exec(&txn)
            .await?;
        insert_forward_links(&txn, targets.iter().map(|t| (zettel.id.clone(), t.clone())))
            .await?;

        let mut affected: BTreeSet<String> = previous;
        affected.extend(targets.iter().cloned());
        affected.insert(zettel.id.clone());
        refresh_back_links(&txn, &affected).await?;

        txn.commit().await?;
        Ok(())
    }

    async fn rebuild_links(&self, links: &[(String, BTreeSet<String>)]) -> Result<()> {
        use entity::{zettel_back_link as back, zettel_forward_link as fwd};

        let pairs: Vec<(String, String)> = links
            .iter()
            .flat_map(|(source, targets)| targets.iter().map(|t| (source.clone(), t.clone())))
            .collect();

        let txn = self.conn.begin().await?;
        fwd::Entity::delete_many().exec(&txn).await?;
        back::Entity::delete_many().exec(&txn).await?;
        insert_forward_links(&txn, pairs.iter().cloned()).await?;
        insert_back_links(&txn, pairs).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn list_forward_links(&self) -> Result<Vec<(String, String)>> {
        let results = entity::zettel_forward_link::Entity::find()
            .all(&self.conn)
            .await?;
        Ok(results
            .into_iter()
            .map(|l| (l.source_id, l.target_id))
            .collect())
    }

    async fn list_back_links(&self) -> Result<Vec<(String, String)>> {
        let results = entity::zettel_back_link::Entity::find()
            .all(&self.conn)
            .await?;
        Ok(results
            .into_iter()
            .map(|l| (l.target_id, l.source_id))
            .collect())
    }

    // qsos

    async fn import_qsos(&self, qsos: &[Qso]) -> Result<QsoImport> {
        use entity::qso;

        let txn = self.conn.begin().await?;
        let mut outcome = QsoImport::default();
        for q in qsos {
            let exists = qso::Entity::find()
                .filter(qso::Column::Call.eq(q.call.as_str()))
                .filter(qso::Column::Timestamp.eq(q.timestamp))
                .count(&txn)
                .await?
                > 0;
            if exists {
                outcome.skipped += 1;
                continue;
            }
            let model = qso::ActiveModel::try_from(q)?;
            model.insert(&txn).await?;
            outcome.inserted += 1;
        }
        txn.commit().await?;
        Ok(outcome)
    }

    async fn list_qsos(&self) -> Result<Vec<Qso>> {
        entity::qso::Entity::find()
            .order_by_desc(entity::qso::Column::Timestamp)
            .all(&self.conn)
            .await?
            .into_iter()
            .map(TryInto::try_into)
            .collect()
    }

    // whatsapp

    async fn load_whatsapp_device(&self) -> Result<Option<WhatsAppDeviceRecord>> {
        let result = entity::whatsapp_device::Entity::find_by_id(WHATSAPP_DEVICE_ROW)
            .one(&self.conn)
            .await?;
        Ok(result.map(|m| WhatsAppDeviceRecord {
            jid: m.jid,
            initialized: m.initialized,
            session: m.session,
        }))
    }

    async fn save_whatsapp_device(&self, device: &WhatsAppDeviceRecord) -> Result<()> {
        use entity::whatsapp_device;

        let model = whatsapp_device::ActiveModel {
            id: Set(WHATSAPP_DEVICE_ROW),
            jid: Set(device.jid.clone()),
            initialized: Set(device.initialized),
            session: Set(device.session.clone()),
            updated_at: Set(Utc::now()),
        };
        let txn = self.conn.begin().await?;
        if whatsapp_device::Entity::find_by_id(WHATSAPP_DEVICE_ROW)
            .one(&txn)
            .await?
            .is_some()
        {
            model.update(&txn).await?;
        } else {
            model.insert(&txn).await?;
        }
        txn.commit().await?;
        Ok(())
    }

    async fn delete_whatsapp_device(&self) -> Result<()> {
        entity::whatsapp_device::Entity::delete_by_id(WHATSAPP_DEVICE_ROW)
            .exec(&self.conn)
            .await?;
        Ok(())
    }
}
